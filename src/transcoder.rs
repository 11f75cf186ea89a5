/*!
 * Time-coded frame extraction through an external transcoder.
 *
 * `Transcoder` is the seam to the external tool: probing a video's
 * duration and writing one still image at a timestamp with a given
 * seek strategy. `FfmpegTranscoder` drives ffmpeg/ffprobe, while
 * `FrameExtractor` layers the extraction policy on top: direct seek,
 * decode-window fallback, output validation and one retry slightly earlier.
 */

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::TranscoderConfig;
use crate::errors::TranscoderError;
use crate::file_utils::FileManager;

/// How far before a failed timestamp the single retry is attempted
pub const RETRY_BACKOFF_SECS: f64 = 0.2;

/// Length of the window decoded by the fallback strategy
pub const DECODE_WINDOW_SECS: f64 = 0.1;

/// Sample rate applied inside the fallback decode window
pub const DECODE_WINDOW_FPS: u32 = 30;

/// How the transcoder reaches the requested timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStrategy {
    /// Seek straight to the timestamp and decode one frame
    Direct,
    /// Decode a short window from the timestamp and keep its first frame
    DecodeWindow,
}

/// External transcoder used for probing and frame grabs
#[async_trait]
pub trait Transcoder: Send + Sync + Debug {
    /// Duration of the video in seconds
    async fn probe_duration(&self, video: &Path) -> Result<f64, TranscoderError>;

    /// Write a single JPEG frame taken at `timestamp` to `output`,
    /// overwriting any existing file
    async fn grab_frame(
        &self,
        video: &Path,
        timestamp: f64,
        output: &Path,
        strategy: SeekStrategy,
    ) -> Result<(), TranscoderError>;
}

/// ffmpeg / ffprobe backed transcoder
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    /// Create a transcoder from configuration
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// ffmpeg arguments for one frame grab
    pub fn frame_args(video: &Path, timestamp: f64, output: &Path, strategy: SeekStrategy) -> Vec<String> {
        let t = timestamp.max(0.0);
        let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];

        match strategy {
            SeekStrategy::Direct => {
                args.extend(["-ss".into(), format!("{:.3}", t)]);
                args.extend(["-i".into(), video.to_string_lossy().to_string()]);
            }
            SeekStrategy::DecodeWindow => {
                args.extend(["-i".into(), video.to_string_lossy().to_string()]);
                args.extend([
                    "-vf".into(),
                    format!(
                        "fps={},trim=start={:.3}:end={:.3},setpts=PTS-STARTPTS",
                        DECODE_WINDOW_FPS,
                        t,
                        t + DECODE_WINDOW_SECS
                    ),
                ]);
            }
        }

        args.extend([
            "-frames:v".into(),
            "1".into(),
            "-q:v".into(),
            "2".into(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }

    /// Read the duration from ffprobe JSON: the container duration first,
    /// then the first video stream that reports one
    pub fn parse_probe_duration(json: &Value) -> Option<f64> {
        let from_format = json
            .get("format")
            .and_then(|f| f.get("duration"))
            .and_then(Self::as_seconds);
        if from_format.is_some() {
            return from_format;
        }

        json.get("streams")
            .and_then(|s| s.as_array())
            .into_iter()
            .flatten()
            .filter(|stream| stream.get("codec_type").and_then(|c| c.as_str()) == Some("video"))
            .find_map(|stream| stream.get("duration").and_then(Self::as_seconds))
    }

    fn as_seconds(value: &Value) -> Option<f64> {
        let seconds = match value {
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        };
        seconds.filter(|d| d.is_finite() && *d > 0.0)
    }

    async fn run(&self, program: &str, args: &[String], timeout: Option<u64>) -> Result<Output, TranscoderError> {
        let future = Command::new(program).args(args).kill_on_drop(true).output();

        let output = match timeout {
            Some(seconds) => {
                tokio::select! {
                    result = future => result,
                    _ = tokio::time::sleep(Duration::from_secs(seconds)) => {
                        return Err(TranscoderError::TimedOut { program: program.to_string(), seconds });
                    }
                }
            }
            None => future.await,
        }
        .map_err(|source| TranscoderError::Spawn {
            program: program.to_string(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscoderError::Failed {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr: filter_ffmpeg_stderr(&stderr),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe_duration(&self, video: &Path) -> Result<f64, TranscoderError> {
        let args: Vec<String> = vec![
            "-v".into(),
            "error".into(),
            "-print_format".into(),
            "json".into(),
            "-show_format".into(),
            "-show_streams".into(),
            video.to_string_lossy().to_string(),
        ];

        let output = self
            .run(&self.config.ffprobe_path, &args, Some(self.config.probe_timeout_secs))
            .await?;

        let json: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| TranscoderError::InvalidProbe(e.to_string()))?;

        Self::parse_probe_duration(&json)
            .ok_or_else(|| TranscoderError::InvalidProbe("no duration reported".to_string()))
    }

    async fn grab_frame(
        &self,
        video: &Path,
        timestamp: f64,
        output: &Path,
        strategy: SeekStrategy,
    ) -> Result<(), TranscoderError> {
        let args = Self::frame_args(video, timestamp, output, strategy);
        self.run(&self.config.ffmpeg_path, &args, self.config.frame_timeout_secs)
            .await
            .map(|_| ())
    }
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "ffprobe version",
        "built with",
        "configuration:",
        "libav",
        "libsw",
        "libpostproc",
        "Input #",
        "Metadata:",
        "Duration:",
        "Stream #",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}

/// Result of trying to extract one frame
#[derive(Debug)]
pub enum ExtractionOutcome {
    /// A non-empty image was written
    Extracted {
        /// Timestamp actually used (may be the retry timestamp)
        timestamp: f64,
        /// Strategy that produced the frame
        strategy: SeekStrategy,
    },
    /// Every attempt failed; the last error is kept
    Failed(TranscoderError),
}

impl ExtractionOutcome {
    /// Whether a frame was written
    pub fn is_extracted(&self) -> bool {
        matches!(self, ExtractionOutcome::Extracted { .. })
    }
}

/// Frame extraction policy on top of a `Transcoder`
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    transcoder: Arc<dyn Transcoder>,
}

impl FrameExtractor {
    /// Create an extractor over the given transcoder
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self { transcoder }
    }

    /// Video duration in seconds, or `0.0` when it cannot be determined
    pub async fn duration(&self, video: &Path) -> f64 {
        match self.transcoder.probe_duration(video).await {
            Ok(duration) => duration,
            Err(e) => {
                warn!("Could not determine duration of {:?}: {}", video, e);
                0.0
            }
        }
    }

    /// Extract one frame at `timestamp`, retrying once at
    /// `max(0, timestamp - RETRY_BACKOFF_SECS)` if the first attempt fails
    ///
    /// On failure no file is left at `output`, and directories created for
    /// it are removed again if they are still empty.
    pub async fn extract(&self, video: &Path, timestamp: f64, output: &Path) -> ExtractionOutcome {
        let created_from = output.parent().and_then(first_missing_ancestor);
        let outcome = self.extract_with_retry(video, timestamp, output).await;
        if !outcome.is_extracted() {
            discard_output(output, created_from.as_deref());
        }
        outcome
    }

    async fn extract_with_retry(&self, video: &Path, timestamp: f64, output: &Path) -> ExtractionOutcome {
        let first = self.attempt(video, timestamp, output).await;
        match first {
            Ok(strategy) => ExtractionOutcome::Extracted { timestamp, strategy },
            Err(e) if timestamp > 0.0 => {
                let retry_at = (timestamp - RETRY_BACKOFF_SECS).max(0.0);
                debug!(
                    "Frame at {:.3}s of {:?} failed ({}), retrying at {:.3}s",
                    timestamp, video, e, retry_at
                );
                match self.attempt(video, retry_at, output).await {
                    Ok(strategy) => ExtractionOutcome::Extracted {
                        timestamp: retry_at,
                        strategy,
                    },
                    Err(e) => ExtractionOutcome::Failed(e),
                }
            }
            Err(e) => ExtractionOutcome::Failed(e),
        }
    }

    /// One attempt: direct seek, falling back to the decode window only if
    /// the direct invocation fails
    async fn attempt(&self, video: &Path, timestamp: f64, output: &Path) -> Result<SeekStrategy, TranscoderError> {
        let timestamp = timestamp.max(0.0);
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TranscoderError::OutputDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let strategy = match self
            .transcoder
            .grab_frame(video, timestamp, output, SeekStrategy::Direct)
            .await
        {
            Ok(()) => SeekStrategy::Direct,
            Err(e) => {
                debug!("Direct seek failed for {:?} at {:.3}s: {}", video, timestamp, e);
                self.transcoder
                    .grab_frame(video, timestamp, output, SeekStrategy::DecodeWindow)
                    .await?;
                SeekStrategy::DecodeWindow
            }
        };

        if FileManager::non_empty_file(output) {
            Ok(strategy)
        } else {
            Err(TranscoderError::EmptyOutput(PathBuf::from(output)))
        }
    }
}

/// Outermost ancestor of `dir` (itself included) that does not exist yet
fn first_missing_ancestor(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .take_while(|a| !a.as_os_str().is_empty() && !a.exists())
        .last()
        .map(Path::to_path_buf)
}

// Best effort: a leftover file or directory is logged, not fatal
fn discard_output(output: &Path, created_from: Option<&Path>) {
    if let Err(e) = FileManager::remove_file_if_exists(output) {
        warn!("Could not remove failed frame {:?}: {:#}", output, e);
    }
    let Some(top) = created_from else {
        return;
    };
    for dir in output.ancestors().skip(1) {
        if std::fs::remove_dir(dir).is_err() || dir == top {
            break;
        }
    }
}
