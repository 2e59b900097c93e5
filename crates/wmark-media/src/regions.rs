//! Region candidate catalogue.
//!
//! Candidates are a pure function of frame dimensions: the orientation picks
//! a fixed slot table, box sizes scale with the frame up to a cap, and any
//! slot whose box would leave the frame is dropped rather than clipped.

use wmark_models::{Orientation, Rect, RegionCandidate};

/// Where a slot's box is anchored inside the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Anchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    /// Left edge, box centred on the given fraction of frame height
    LeftAt(f64),
    /// Right edge, box centred on the given fraction of frame height
    RightAt(f64),
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    label: &'static str,
    anchor: Anchor,
    prior: f64,
}

const fn slot(label: &'static str, anchor: Anchor, prior: f64) -> Slot {
    Slot {
        label,
        anchor,
        prior,
    }
}

/// Box sizing for one orientation class.
#[derive(Debug, Clone, Copy)]
struct BoxSpec {
    width_ratio: f64,
    height_ratio: f64,
    max_width: u32,
    max_height: u32,
    margin: u32,
}

const LANDSCAPE_BOX: BoxSpec = BoxSpec {
    width_ratio: 0.10,
    height_ratio: 0.05,
    max_width: 150,
    max_height: 40,
    margin: 20,
};

const PORTRAIT_BOX: BoxSpec = BoxSpec {
    width_ratio: 0.13,
    height_ratio: 0.025,
    max_width: 140,
    max_height: 35,
    margin: 15,
};

const LANDSCAPE_SLOTS: &[Slot] = &[
    slot("bottom-left", Anchor::BottomLeft, 0.90),
    slot("bottom-right", Anchor::BottomRight, 0.90),
    slot("bottom-center", Anchor::BottomCenter, 0.70),
    slot("top-left", Anchor::TopLeft, 0.50),
    slot("top-right", Anchor::TopRight, 0.50),
];

const PORTRAIT_SLOTS: &[Slot] = &[
    slot("vertical-bottom-left", Anchor::BottomLeft, 0.85),
    slot("vertical-bottom-right", Anchor::BottomRight, 0.90),
    slot("vertical-bottom-center", Anchor::BottomCenter, 0.70),
    slot("vertical-mid-left", Anchor::LeftAt(0.8), 0.60),
    slot("vertical-mid-right", Anchor::RightAt(0.8), 0.60),
    slot("vertical-top-left", Anchor::TopLeft, 0.30),
    slot("vertical-top-right", Anchor::TopRight, 0.30),
];

/// Label of the orientation default used when detection is not trusted.
pub fn fallback_label(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Portrait => "vertical-bottom-right",
        Orientation::Landscape => "bottom-left",
    }
}

fn catalogue(orientation: Orientation) -> (&'static [Slot], BoxSpec) {
    match orientation {
        Orientation::Portrait => (PORTRAIT_SLOTS, PORTRAIT_BOX),
        Orientation::Landscape => (LANDSCAPE_SLOTS, LANDSCAPE_BOX),
    }
}

fn box_size(spec: &BoxSpec, width: u32, height: u32) -> (u32, u32) {
    let w = ((width as f64 * spec.width_ratio).round() as u32).clamp(1, spec.max_width);
    let h = ((height as f64 * spec.height_ratio).round() as u32).clamp(1, spec.max_height);
    (w, h)
}

/// Top-left corner for a box of `bw` x `bh`. May be negative on tiny frames.
fn place(anchor: Anchor, margin: u32, bw: u32, bh: u32, width: u32, height: u32) -> (i64, i64) {
    let (w, h, bw, bh, m) = (width as i64, height as i64, bw as i64, bh as i64, margin as i64);
    let right = w - bw - m;
    let bottom = h - bh - m;
    match anchor {
        Anchor::TopLeft => (m, m),
        Anchor::TopRight => (right, m),
        Anchor::BottomLeft => (m, bottom),
        Anchor::BottomCenter => ((w - bw) / 2, bottom),
        Anchor::BottomRight => (right, bottom),
        Anchor::LeftAt(fraction) => (m, (h as f64 * fraction).round() as i64 - bh / 2),
        Anchor::RightAt(fraction) => (right, (h as f64 * fraction).round() as i64 - bh / 2),
    }
}

fn slot_rect(slot: &Slot, spec: &BoxSpec, width: u32, height: u32) -> Option<Rect> {
    let (bw, bh) = box_size(spec, width, height);
    let (x, y) = place(slot.anchor, spec.margin, bw, bh, width, height);
    if x < 0 || y < 0 {
        return None;
    }
    let rect = Rect::new(u32::try_from(x).ok()?, u32::try_from(y).ok()?, bw, bh);
    rect.fits_within(width, height).then_some(rect)
}

/// The candidate catalogue for a `width` x `height` frame, in fixed order.
///
/// Every returned rectangle lies fully inside the frame.
pub fn regions(width: u32, height: u32) -> Vec<RegionCandidate> {
    let (slots, spec) = catalogue(Orientation::from_dimensions(width, height));
    slots
        .iter()
        .filter_map(|slot| {
            slot_rect(slot, &spec, width, height)
                .map(|rect| RegionCandidate::new(slot.label, rect, slot.prior))
        })
        .collect()
}

/// The orientation default: bottom-right for portrait, bottom-left for
/// landscape.
///
/// Uses the catalogue geometry when it fits; on frames too small for the
/// margin the box is pulled inside the frame instead, so the caller always
/// gets an actionable region.
pub fn fallback_region(width: u32, height: u32) -> RegionCandidate {
    let orientation = Orientation::from_dimensions(width, height);
    let (slots, spec) = catalogue(orientation);
    let label = fallback_label(orientation);
    let slot = slots
        .iter()
        .find(|s| s.label == label)
        .copied()
        .unwrap_or(Slot {
            label,
            anchor: Anchor::BottomRight,
            prior: 0.0,
        });

    if let Some(rect) = slot_rect(&slot, &spec, width, height) {
        return RegionCandidate::new(label, rect, slot.prior);
    }

    let (bw, bh) = box_size(&spec, width, height);
    let bw = bw.min(width.max(1));
    let bh = bh.min(height.max(1));
    let y = height.saturating_sub(bh);
    let x = match orientation {
        Orientation::Portrait => width.saturating_sub(bw),
        Orientation::Landscape => 0,
    };
    RegionCandidate::new(label, Rect::new(x, y, bw, bh), slot.prior)
}
