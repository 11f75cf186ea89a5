/*!
 * Concurrent batch processing of manifest records.
 *
 * Every (video, subtitle) pair becomes one task running the full
 * per-video sampling pipeline. Tasks run on the tokio worker threads,
 * at most `workers` at a time, and share nothing mutable: each owns its
 * own similarity filter. A failing or panicking task is recorded in the
 * report and never affects its siblings; the batch returns only once
 * every task has resolved.
 */

use anyhow::{Context, Result};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::manifest::{self, ManifestRecord};
use crate::sampler::{SamplingSummary, VideoSampler};

/// One unit of concurrent work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTask {
    pub video: PathBuf,
    pub subtitle: PathBuf,
}

/// A task that did not complete
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub video: PathBuf,
    pub error: String,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Summaries of completed tasks, in submission order
    pub completed: Vec<SamplingSummary>,
    /// Failed tasks
    pub failed: Vec<TaskFailure>,
}

impl BatchReport {
    /// Number of tasks that ran
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }

    /// Frames kept across all videos
    pub fn frames_saved(&self) -> usize {
        self.completed.iter().map(|s| s.saved).sum()
    }

    /// Frames suppressed as duplicates across all videos
    pub fn frames_skipped(&self) -> usize {
        self.completed.iter().map(|s| s.skipped).sum()
    }
}

/// Build the task list from manifest records.
///
/// Records missing a path, whose files are not both on disk, or whose
/// video file name does not contain `only_video` are left out.
pub fn build_tasks(records: &[ManifestRecord], only_video: Option<&str>) -> Vec<VideoTask> {
    let filter = only_video.filter(|f| !f.is_empty());

    records
        .iter()
        .filter_map(|record| record.paths())
        .filter(|(video, _)| match filter {
            Some(needle) => video
                .file_name()
                .map(|name| name.to_string_lossy().contains(needle))
                .unwrap_or(false),
            None => true,
        })
        .filter(|(video, subtitle)| video.is_file() && subtitle.is_file())
        .map(|(video, subtitle)| VideoTask {
            video: video.to_path_buf(),
            subtitle: subtitle.to_path_buf(),
        })
        .collect()
}

/// Runs the sampler over many videos with a bounded worker pool
pub struct BatchRunner {
    sampler: VideoSampler,
    workers: usize,
}

impl BatchRunner {
    /// Create a runner; `workers` is raised to at least one
    pub fn new(sampler: VideoSampler, workers: usize) -> Self {
        Self {
            sampler,
            workers: workers.max(1),
        }
    }

    /// Maximum number of videos processed at once
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Load the manifest, build tasks and run them
    pub async fn run_manifest(&self, manifest_path: &Path, only_video: Option<&str>) -> Result<BatchReport> {
        let records = manifest::load_manifest(manifest_path)
            .with_context(|| format!("Failed to load manifest {:?}", manifest_path))?;
        if records.is_empty() {
            info!("No records to process.");
            return Ok(BatchReport::default());
        }

        let tasks = build_tasks(&records, only_video);
        if tasks.is_empty() {
            info!("No matching videos in {} manifest record(s).", records.len());
            return Ok(BatchReport::default());
        }

        Ok(self.run_tasks(tasks).await)
    }

    /// Run every task to completion and collect outcomes
    pub async fn run_tasks(&self, tasks: Vec<VideoTask>) -> BatchReport {
        info!(
            "Sampling {} video(s) with {} worker(s)",
            tasks.len(),
            self.workers
        );

        let progress_bar = ProgressBar::new(tasks.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} videos {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style);

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let sampler = self.sampler.clone();
            let semaphore = semaphore.clone();
            let progress_bar = progress_bar.clone();
            let video = task.video.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("Worker pool closed")?;
                let result = sampler.process(&task.video, &task.subtitle).await;
                progress_bar.inc(1);
                result
            });
            handles.push((video, handle));
        }

        let (videos, handles): (Vec<PathBuf>, Vec<_>) = handles.into_iter().unzip();
        let outcomes = join_all(handles).await;

        let mut report = BatchReport::default();
        for (video, outcome) in videos.into_iter().zip(outcomes) {
            match outcome {
                Ok(Ok(summary)) => report.completed.push(summary),
                Ok(Err(e)) => {
                    error!("[error] Sampling failed for {:?}: {:#}", video, e);
                    report.failed.push(TaskFailure {
                        video,
                        error: format!("{:#}", e),
                    });
                }
                Err(join_error) => {
                    error!("[error] Sampling task for {:?} aborted: {}", video, join_error);
                    report.failed.push(TaskFailure {
                        video,
                        error: join_error.to_string(),
                    });
                }
            }
        }

        progress_bar.finish_and_clear();

        if report.failed.is_empty() {
            info!(
                "All sampling tasks finished: {} video(s), {} frames saved, {} skipped.",
                report.completed.len(),
                report.frames_saved(),
                report.frames_skipped()
            );
        } else {
            warn!(
                "Sampling finished with {} failure(s) out of {} video(s).",
                report.failed.len(),
                report.total()
            );
        }

        report
    }
}
