//! FFmpeg invocation.
//!
//! Two command shapes run through here: single-frame grabs for sampling and
//! the blot-and-brand encode. [`FfmpegCommand`] assembles the argument list,
//! [`FfmpegRunner`] spawns it under an optional deadline.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};

/// Diagnostic stderr lines attached to a failure.
const STDERR_TAIL_LINES: usize = 20;

/// Argument list for one ffmpeg run with a single input and a single output.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    pre_input: Vec<String>,
    post_input: Vec<String>,
    report_progress: bool,
}

impl FfmpegCommand {
    /// Overwrites `output` and reports progress on stderr. ffmpeg logs errors only.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            pre_input: Vec::new(),
            post_input: Vec::new(),
            report_progress: true,
        }
    }

    pub fn before_input(mut self, arg: impl Into<String>) -> Self {
        self.pre_input.push(arg.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.post_input.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.post_input.extend(args.into_iter().map(Into::into));
        self
    }

    /// Keyframe seek on the input side. Good enough for sampling stills.
    pub fn seek(self, seconds: f64) -> Self {
        self.before_input("-ss").before_input(format!("{:.3}", seconds))
    }

    pub fn video_filter(self, graph: impl Into<String>) -> Self {
        self.arg("-vf").arg(graph)
    }

    pub fn map_first_video(self) -> Self {
        self.arg("-map").arg("0:v:0")
    }

    /// First video stream, plus the first audio stream when there is one.
    pub fn map_streams(self, with_audio: bool) -> Self {
        let cmd = self.map_first_video();
        if with_audio {
            cmd.arg("-map").arg("0:a:0?")
        } else {
            cmd
        }
    }

    pub fn copy_audio(self) -> Self {
        self.arg("-c:a").arg("copy")
    }

    pub fn no_audio(self) -> Self {
        self.arg("-an")
    }

    /// moov atom up front so the output plays while downloading.
    pub fn faststart(self) -> Self {
        self.arg("-movflags").arg("+faststart")
    }

    pub fn single_frame(self) -> Self {
        self.arg("-frames:v").arg("1")
    }

    /// Frame grabs finish too fast for progress to be worth parsing.
    pub fn without_progress(mut self) -> Self {
        self.report_progress = false;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-v", "error"]
            .map(String::from)
            .to_vec();
        if self.report_progress {
            args.extend(["-progress", "pipe:2", "-nostats"].map(String::from));
        }
        args.extend(self.pre_input.iter().cloned());
        args.push("-i".into());
        args.push(self.input.to_string_lossy().into_owned());
        args.extend(self.post_input.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Last few diagnostic lines ffmpeg printed, with progress lines filtered out.
#[derive(Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
}

impl StderrTail {
    fn push(&mut self, line: String) {
        if line.trim().is_empty() {
            return;
        }
        if self.lines.len() == STDERR_TAIL_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn into_text(self) -> Option<String> {
        if self.lines.is_empty() {
            None
        } else {
            Some(Vec::from(self.lines).join("\n"))
        }
    }
}

/// Spawns ffmpeg and waits for it, killing it past the deadline.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run `cmd`, handing each completed progress block to `on_progress`.
    ///
    /// A non-zero exit carries the stderr tail in the error.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, on_progress: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;

        let args = cmd.to_args();
        debug!(output = %cmd.output().display(), "ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("ffmpeg stderr not captured", None, None))?;

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut block = FfmpegProgress::default();
            let mut tail = StderrTail::default();
            while let Ok(Some(line)) = lines.next_line().await {
                if !is_progress_line(&line) {
                    tail.push(line);
                } else if let Some(progress) = parse_progress_line(&line, &mut block) {
                    on_progress(progress);
                }
            }
            tail
        });

        let status = self.wait(&mut child).await;
        let tail = reader.await.unwrap_or_default();

        let status = status?;
        if status.success() {
            return Ok(());
        }
        Err(MediaError::ffmpeg_failed(
            format!("ffmpeg exited with {}", status),
            tail.into_text(),
            status.code(),
        ))
    }

    async fn wait(&self, child: &mut Child) -> MediaResult<ExitStatus> {
        let Some(limit) = self.timeout else {
            return Ok(child.wait().await?);
        };
        match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!(secs = limit.as_secs(), "ffmpeg exceeded its deadline, killing it");
                let _ = child.kill().await;
                Err(MediaError::Timeout(limit.as_secs()))
            }
        }
    }
}

pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

/// Both tools must resolve on PATH before any asset runs.
pub fn check_environment() -> MediaResult<()> {
    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    debug!(ffmpeg = %ffmpeg.display(), ffprobe = %ffprobe.display(), "External tools found");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_pair(args: &[String], a: &str, b: &str) -> bool {
        args.windows(2).any(|w| w[0] == a && w[1] == b)
    }

    #[test]
    fn test_frame_grab_seeks_before_input() {
        let args = FfmpegCommand::new("input.mp4", "frame.png")
            .without_progress()
            .seek(10.0)
            .map_first_video()
            .single_frame()
            .to_args();

        let seek = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(seek < input);
        assert_eq!(args[seek + 1], "10.000");
        assert!(!args.iter().any(|a| a == "-progress"));
        assert_eq!(args.last().map(String::as_str), Some("frame.png"));
    }

    #[test]
    fn test_encode_keeps_audio_untouched() {
        let args = FfmpegCommand::new("in.mp4", "out.partial.mp4")
            .video_filter("delogo=x=1:y=1:w=10:h=10")
            .map_streams(true)
            .copy_audio()
            .faststart()
            .to_args();

        assert!(has_pair(&args, "-c:a", "copy"));
        assert!(has_pair(&args, "-map", "0:a:0?"));
        assert!(has_pair(&args, "-progress", "pipe:2"));
        assert_eq!(args[0], "-y");
    }

    #[test]
    fn test_silent_input_drops_audio() {
        let args = FfmpegCommand::new("in.mp4", "out.mp4")
            .map_streams(false)
            .no_audio()
            .to_args();
        assert!(!args.iter().any(|a| a.starts_with("0:a")));
        assert!(args.iter().any(|a| a == "-an"));
    }

    #[test]
    fn test_stderr_tail_is_bounded() {
        let mut tail = StderrTail::default();
        assert!(tail.lines.is_empty());
        for i in 0..(STDERR_TAIL_LINES + 5) {
            tail.push(format!("line {}", i));
        }
        tail.push("   ".to_string());
        let text = tail.into_text().unwrap();
        assert_eq!(text.lines().count(), STDERR_TAIL_LINES);
        assert!(text.starts_with("line 5"));
        assert!(StderrTail::default().into_text().is_none());
    }
}
