/*!
 * Per-video sampling driver.
 *
 * For one (video, subtitle) pair this parses the subtitles, probes the
 * video duration, plans start/mid/end sample points for every entry past
 * the warm-up window, extracts each frame in order and keeps only frames
 * that are not near-duplicates of a frame already kept for the same video.
 *
 * Extraction within a video is strictly sequential: the keep/drop decision
 * for a frame depends on every frame accepted before it.
 */

use anyhow::{Context, Result};
use log::{info, warn};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::SamplingConfig;
use crate::errors::FingerprintError;
use crate::file_utils::FileManager;
use crate::fingerprint::{FilterDecision, Fingerprint, SimilarityFilter};
use crate::output_paths;
use crate::subtitle_processor::{SubtitleCollection, SubtitleEntry};
use crate::transcoder::{ExtractionOutcome, FrameExtractor};

/// Gap kept between the last sample point and the probed end of the video
pub const END_MARGIN_SECS: f64 = 0.01;

/// Position of a frame within its subtitle entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameRole {
    Start,
    Mid,
    End,
}

impl FrameRole {
    /// Suffix used in frame file names
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameRole::Start => "start",
            FrameRole::Mid => "mid",
            FrameRole::End => "end",
        }
    }
}

impl fmt::Display for FrameRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One planned frame extraction
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePoint {
    /// Index of the subtitle entry in the parsed file
    pub entry_index: usize,
    /// Clamped timestamp in seconds
    pub timestamp: f64,
    /// Role within the entry
    pub role: FrameRole,
}

impl SamplePoint {
    /// File name for the frame, e.g. `00-01-23-456_mid.jpg`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.jpg",
            SubtitleEntry::format_filename_timestamp(self.timestamp),
            self.role
        )
    }
}

/// Plan the sample points for a parsed subtitle file.
///
/// Only the first `max_entries` entries are considered when it is non-zero.
/// Timestamps are clamped to `[0, duration - END_MARGIN_SECS]` when the
/// duration is known, otherwise to the entry's own end. Entries whose
/// clamped start falls inside the warm-up window produce no points.
pub fn plan_sample_points(
    entries: &[SubtitleEntry],
    duration: f64,
    max_entries: usize,
    warmup_secs: f64,
) -> Vec<SamplePoint> {
    let limit = if max_entries == 0 { entries.len() } else { max_entries.min(entries.len()) };
    let mut points = Vec::with_capacity(limit * 3);

    for (entry_index, entry) in entries.iter().take(limit).enumerate() {
        let safe_end = if duration > 0.0 {
            (duration - END_MARGIN_SECS).max(0.0)
        } else {
            entry.end.max(entry.start)
        };
        let clamp = |t: f64| t.min(safe_end).max(0.0);

        let start = clamp(entry.start);
        let end = clamp(entry.end);
        let mid = clamp((start + end) / 2.0);

        if start < warmup_secs {
            continue;
        }

        for (timestamp, role) in [(start, FrameRole::Start), (mid, FrameRole::Mid), (end, FrameRole::End)] {
            points.push(SamplePoint { entry_index, timestamp, role });
        }
    }

    points
}

/// What happened to one planned frame
#[derive(Debug)]
pub enum FrameOutcome {
    /// Frame kept; no fingerprint if hashing failed
    Saved(Option<Fingerprint>),
    /// Frame deleted as a near-duplicate
    Duplicate { distance: u32 },
    /// Frame name already produced for this video; not extracted again
    AlreadyPresent,
    /// Extraction failed, no file left behind
    Missing(String),
}

/// Progress signal for one frame
#[derive(Debug)]
pub struct FrameReport<'a> {
    /// Video being sampled
    pub video: &'a Path,
    /// Planned point
    pub point: &'a SamplePoint,
    /// Full path of the frame file
    pub path: &'a Path,
    /// Result
    pub outcome: &'a FrameOutcome,
}

/// How a video's sampling ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStatus {
    /// All planned points were attempted
    Completed,
    /// The subtitle file contained no entries
    NoSubtitles,
}

/// Per-video counts
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingSummary {
    pub video: PathBuf,
    pub frame_dir: PathBuf,
    pub status: SamplingStatus,
    /// Probed duration, 0.0 if unknown
    pub duration: f64,
    pub entries_total: usize,
    pub entries_considered: usize,
    pub frames_planned: usize,
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SamplingSummary {
    fn new(video: &Path, frame_dir: PathBuf) -> Self {
        Self {
            video: video.to_path_buf(),
            frame_dir,
            status: SamplingStatus::Completed,
            duration: 0.0,
            entries_total: 0,
            entries_considered: 0,
            frames_planned: 0,
            saved: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

/// Receives progress and summary signals while a video is sampled.
/// Called from worker tasks, so implementations must be thread-safe.
pub trait SamplingObserver: Send + Sync {
    /// A planned frame was resolved
    fn on_frame(&self, _report: &FrameReport<'_>) {}

    /// A video finished
    fn on_summary(&self, _summary: &SamplingSummary) {}
}

/// Observer that writes one log line per signal
#[derive(Debug, Default)]
pub struct LogObserver;

impl SamplingObserver for LogObserver {
    fn on_frame(&self, report: &FrameReport<'_>) {
        let name = video_label(report.video);
        let file = report.point.file_name();
        match report.outcome {
            FrameOutcome::Saved(Some(_)) => info!("  [save] {} | {}", name, file),
            FrameOutcome::Saved(None) => warn!("  [save] {} | {} (kept without fingerprint)", name, file),
            FrameOutcome::Duplicate { distance } => {
                info!("  [skip] {} | {} (distance {})", name, file, distance)
            }
            FrameOutcome::AlreadyPresent => info!("  [skip] {} | {} (already sampled)", name, file),
            FrameOutcome::Missing(reason) => warn!("  [miss] {} | {}: {}", name, file, reason),
        }
    }

    fn on_summary(&self, summary: &SamplingSummary) {
        let name = video_label(&summary.video);
        match summary.status {
            SamplingStatus::NoSubtitles => info!("[skip] {} | no subtitle entries", name),
            SamplingStatus::Completed => info!(
                "  [summary] {} | saved {} frames, skipped {} similar, {} failed",
                name, summary.saved, summary.skipped, summary.failed
            ),
        }
    }
}

fn video_label(video: &Path) -> String {
    video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| video.to_string_lossy().to_string())
}

/// Text overlay hook for kept frames. Frames are stored untouched.
pub fn annotate_frame(_frame: &Path, _entry: &SubtitleEntry) -> Result<()> {
    Ok(())
}

async fn fingerprint_frame(path: PathBuf) -> Result<Fingerprint, FingerprintError> {
    tokio::task::spawn_blocking(move || Fingerprint::of_file(&path))
        .await
        .map_err(|e| FingerprintError::Task(e.to_string()))?
}

/// Samples one video end-to-end
#[derive(Clone)]
pub struct VideoSampler {
    extractor: FrameExtractor,
    options: SamplingConfig,
    output_root: PathBuf,
    observer: Arc<dyn SamplingObserver>,
}

impl VideoSampler {
    /// Create a sampler writing under `output_root`
    pub fn new(extractor: FrameExtractor, options: SamplingConfig, output_root: PathBuf) -> Self {
        Self {
            extractor,
            options,
            output_root,
            observer: Arc::new(LogObserver),
        }
    }

    /// Replace the default logging observer
    pub fn with_observer(mut self, observer: Arc<dyn SamplingObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Root directory for frames
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Sampling options in use
    pub fn options(&self) -> &SamplingConfig {
        &self.options
    }

    /// Frame directory this sampler uses for `video`
    pub fn frame_dir(&self, video: &Path) -> PathBuf {
        output_paths::frame_dir_for_video(&self.output_root, video)
    }

    /// Sample one video. Unreadable or unsupported subtitle files are
    /// returned as errors; everything below video level is recovered from.
    pub async fn process(&self, video: &Path, subtitle: &Path) -> Result<SamplingSummary> {
        let frame_dir = self.frame_dir(video);
        let mut summary = SamplingSummary::new(video, frame_dir.clone());

        let subtitles = SubtitleCollection::from_file(subtitle)
            .with_context(|| format!("Failed to load subtitles for {:?}", video))?;
        summary.entries_total = subtitles.len();

        if subtitles.is_empty() {
            summary.status = SamplingStatus::NoSubtitles;
            self.observer.on_summary(&summary);
            return Ok(summary);
        }

        let duration = self.extractor.duration(video).await;
        if duration <= 0.0 {
            warn!(
                "[warn] {} | duration unknown, sampling raw subtitle times",
                video_label(video)
            );
        }
        summary.duration = duration;

        let max_entries = self.options.max_entries;
        summary.entries_considered = if max_entries == 0 {
            subtitles.len()
        } else {
            max_entries.min(subtitles.len())
        };

        let points = plan_sample_points(&subtitles.entries, duration, max_entries, self.options.warmup_secs);
        summary.frames_planned = points.len();

        info!(
            "Processing {} | entries {}/{} | duration {:.2}s | threshold {}",
            video_label(video),
            summary.entries_considered,
            summary.entries_total,
            duration,
            self.options.similarity_threshold
        );

        let mut filter = SimilarityFilter::new(self.options.similarity_threshold);
        let mut kept_files: HashSet<String> = HashSet::new();

        for point in &points {
            let file_name = point.file_name();
            let path = frame_dir.join(&file_name);

            let outcome = if kept_files.contains(&file_name) {
                summary.skipped += 1;
                FrameOutcome::AlreadyPresent
            } else {
                match self.extractor.extract(video, point.timestamp, &path).await {
                    ExtractionOutcome::Failed(e) => {
                        summary.failed += 1;
                        FrameOutcome::Missing(e.to_string())
                    }
                    ExtractionOutcome::Extracted { .. } => {
                        let fingerprint = fingerprint_frame(path.clone()).await;
                        match filter.classify(fingerprint) {
                            FilterDecision::Duplicate { distance, .. } => {
                                FileManager::remove_file_if_exists(&path)?;
                                summary.skipped += 1;
                                FrameOutcome::Duplicate { distance }
                            }
                            FilterDecision::Novel(fp) => {
                                annotate_frame(&path, &subtitles.entries[point.entry_index])?;
                                kept_files.insert(file_name);
                                summary.saved += 1;
                                FrameOutcome::Saved(Some(fp))
                            }
                            FilterDecision::Unhashable(e) => {
                                warn!("Fingerprint failed for {:?}: {}", path, e);
                                kept_files.insert(file_name);
                                summary.saved += 1;
                                FrameOutcome::Saved(None)
                            }
                        }
                    }
                }
            };

            self.observer.on_frame(&FrameReport {
                video,
                point,
                path: &path,
                outcome: &outcome,
            });
        }

        self.observer.on_summary(&summary);
        Ok(summary)
    }
}
