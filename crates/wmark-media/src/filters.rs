//! FFmpeg filter definitions for the blot-and-brand pass.

use std::path::Path;

use wmark_models::{BrandStyle, CompositingJob, Rect};

/// Shrink `rect` so it never touches the frame border.
///
/// `delogo` interpolates from the pixels around the box and rejects areas
/// that reach the edge, so a 1px band is kept on every side.
pub fn delogo_rect(rect: Rect, frame_width: u32, frame_height: u32) -> Option<Rect> {
    let x = rect.x.max(1);
    let y = rect.y.max(1);
    let right = (rect.right()).min(frame_width.saturating_sub(1) as u64);
    let bottom = (rect.bottom()).min(frame_height.saturating_sub(1) as u64);

    let width = right.checked_sub(x as u64).filter(|w| *w > 0)?;
    let height = bottom.checked_sub(y as u64).filter(|h| *h > 0)?;
    Some(Rect::new(x, y, width as u32, height as u32))
}

/// In-painting blot over `rect`. `show=0` synthesises the area from its
/// surroundings instead of drawing a box.
pub fn filter_delogo(rect: Rect) -> String {
    format!(
        "delogo=x={}:y={}:w={}:h={}:show=0",
        rect.x, rect.y, rect.width, rect.height
    )
}

/// Escape text for a `drawtext` `text=` value inside single quotes.
///
/// The value passes three parsers (graph, option, text expansion), so `%`
/// and `\\` need two escape levels and `:` one. Apostrophes would close
/// the quote and are replaced with a typographic one.
pub fn escape_drawtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\\\\\"),
            '\'' => escaped.push('\u{2019}'),
            ':' => escaped.push_str("\\:"),
            '%' => escaped.push_str("\\\\%"),
            '\n' | '\r' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Brand text overlay with a semi-opaque box behind it.
pub fn filter_drawtext(text: &str, x: u32, y: u32, font_size: u32, style: &BrandStyle) -> String {
    let mut filter = String::from("drawtext=");
    if let Some(font) = &style.font_file {
        filter.push_str(&format!("fontfile='{}':", escape_filter_path(font)));
    }
    filter.push_str(&format!(
        "text='{}':x={}:y={}:fontsize={}:fontcolor={}:box=1:boxcolor={}@{:.2}:boxborderw=5",
        escape_drawtext(text),
        x,
        y,
        font_size,
        style.font_color,
        style.box_color,
        style.box_opacity.clamp(0.0, 1.0),
    ));
    filter
}

/// Full single-input filter graph for a job: blot first, then brand.
///
/// The brand position is kept inside the frame; the blot is skipped only
/// when the frame is too small for `delogo` to have any interior.
pub fn build_filter_graph(job: &CompositingJob, style: &BrandStyle) -> String {
    let mut chain = Vec::with_capacity(2);

    if let Some(rect) = delogo_rect(job.location.region.rect, job.frame_width, job.frame_height) {
        chain.push(filter_delogo(rect));
    }

    let x = job.brand_x.min(job.frame_width.saturating_sub(1));
    let y = job.brand_y.min(job.frame_height.saturating_sub(1));
    chain.push(filter_drawtext(&job.brand_text, x, y, job.font_size, style));

    chain.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wmark_models::{Decision, Orientation, RegionCandidate, SelectedLocation};

    fn job(rect: Rect, width: u32, height: u32) -> CompositingJob {
        let location = SelectedLocation {
            region: RegionCandidate::new("bottom-left", rect, 0.9),
            max_score: 1.0,
            decision: Decision::Detected,
        };
        CompositingJob::new(
            "in.mp4",
            "out.mp4",
            location,
            Orientation::from_dimensions(width, height),
            width,
            height,
            &BrandStyle::default(),
            true,
        )
    }

    #[test]
    fn test_delogo_rect_inside_frame_is_unchanged() {
        let rect = Rect::new(20, 1020, 150, 40);
        assert_eq!(delogo_rect(rect, 1920, 1080), Some(rect));
    }

    #[test]
    fn test_delogo_rect_pulls_off_edges() {
        let rect = delogo_rect(Rect::new(0, 0, 1920, 1080), 1920, 1080).unwrap();
        assert_eq!(rect, Rect::new(1, 1, 1918, 1078));
        assert!(delogo_rect(Rect::new(0, 0, 1, 1), 2, 2).is_none());
    }

    #[test]
    fn test_filter_graph_blots_then_brands() {
        let job = job(Rect::new(20, 1020, 150, 40), 1920, 1080);
        let graph = build_filter_graph(&job, &BrandStyle::default());
        let (blot, brand) = graph.split_once(",drawtext=").unwrap();
        assert_eq!(blot, "delogo=x=20:y=1020:w=150:h=40:show=0");
        assert!(brand.contains("x=25:y=1025"));
        assert!(brand.contains("fontsize=16"));
        assert!(brand.contains("box=1"));
        assert!(brand.contains("@0.60"));
    }

    #[test]
    fn test_portrait_font_size() {
        let job = job(Rect::new(925, 1870, 140, 35), 1080, 1920);
        let graph = build_filter_graph(&job, &BrandStyle::default());
        assert!(graph.contains("fontsize=14"));
    }

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("site.ai"), "site.ai");
        assert_eq!(escape_drawtext("a:b"), "a\\:b");
        assert_eq!(escape_drawtext("it's"), "it\u{2019}s");
        assert_eq!(escape_drawtext("100%"), "100\\\\%");
    }

    #[test]
    fn test_font_file_is_included() {
        let style = BrandStyle::default().with_font_file("/fonts/Inter.ttf");
        let filter = filter_drawtext("x", 1, 1, 16, &style);
        assert!(filter.starts_with("drawtext=fontfile='/fonts/Inter.ttf':text='x'"));
    }
}
