/*!
 * Incremental pipeline: acquisition, sampling of new records, packaging.
 *
 * One tick records its start time, runs the acquisition service, then
 * picks up only the manifest records created at or after that moment.
 * Each new video is sampled and its frame directory is archived into the
 * per-video folder beside the video. The `schedule` loop runs one tick per
 * local midnight and never lets a failed or panicking tick stop the loop.
 */

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::acquisition::AcquisitionService;
use crate::archive;
use crate::file_utils::FileManager;
use crate::manifest;
use crate::sampler::VideoSampler;

/// Result of one pipeline tick
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    /// New manifest records seen in this tick
    pub new_records: usize,
    /// Videos sampled without error
    pub processed: usize,
    /// Archives written
    pub archived: Vec<PathBuf>,
    /// Videos skipped or failed, with a reason
    pub skipped: Vec<(PathBuf, String)>,
}

/// Runs acquisition, sampling and packaging for new records
pub struct PipelineOrchestrator {
    sampler: VideoSampler,
    acquisition: Arc<dyn AcquisitionService>,
    manifest_path: PathBuf,
}

impl PipelineOrchestrator {
    pub fn new(sampler: VideoSampler, acquisition: Arc<dyn AcquisitionService>, manifest_path: PathBuf) -> Self {
        Self {
            sampler,
            acquisition,
            manifest_path,
        }
    }

    /// One tick. Errors from acquisition or manifest reading abort the
    /// tick; per-video failures are logged and the next video proceeds.
    pub async fn run_once(&self) -> Result<TickReport> {
        let started_at = Local::now().timestamp();
        info!("Pipeline tick started at {}", started_at);

        self.acquisition.run().await.context("Acquisition failed")?;

        let records = manifest::load_records_since(&self.manifest_path, started_at)
            .with_context(|| format!("Failed to read manifest {:?}", self.manifest_path))?;

        let mut report = TickReport {
            new_records: records.len(),
            ..TickReport::default()
        };

        if records.is_empty() {
            info!("No new downloads. Nothing to process.");
            return Ok(report);
        }

        info!("{} new record(s) since {}", records.len(), started_at);

        for record in &records {
            let Some((video, subtitle)) = record.paths() else {
                warn!("[skip] manifest record without video or subtitle path");
                continue;
            };
            if !record.files_present() {
                warn!("[skip] missing video or subtitle file: {:?}, {:?}", video, subtitle);
                report
                    .skipped
                    .push((video.to_path_buf(), "video or subtitle file missing".to_string()));
                continue;
            }
            self.process_video(video, subtitle, &mut report).await;
        }

        info!(
            "Pipeline tick done: {} processed, {} archived, {} skipped",
            report.processed,
            report.archived.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    async fn process_video(&self, video: &Path, subtitle: &Path, report: &mut TickReport) {
        if let Err(e) = self.sampler.process(video, subtitle).await {
            error!("[error] {:?}: {:#}", video, e);
            report.skipped.push((video.to_path_buf(), format!("{:#}", e)));
            return;
        }
        report.processed += 1;

        let frames_dir = self.sampler.frame_dir(video);
        if !FileManager::dir_exists(&frames_dir) {
            info!("[skip] frames directory not found for {:?}: {:?}", video, frames_dir);
            report
                .skipped
                .push((video.to_path_buf(), "no frames directory".to_string()));
            return;
        }

        match archive::package_video(video, &frames_dir) {
            Ok(zip_path) => report.archived.push(zip_path),
            Err(e) => {
                error!("[error] packaging {:?} failed: {}", video, e);
                report.skipped.push((video.to_path_buf(), e.to_string()));
            }
        }
    }

    /// One tick with every failure caught and logged with its full chain
    pub async fn run_tick(&self) -> Option<TickReport> {
        match self.run_once().await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Pipeline tick failed: {:?}", e);
                None
            }
        }
    }

    /// One tick on its own task, so a panic inside it is logged like an
    /// error instead of unwinding into the caller
    pub async fn run_isolated_tick(self: &Arc<Self>) -> Option<TickReport> {
        let orchestrator = Arc::clone(self);
        match tokio::spawn(async move { orchestrator.run_tick().await }).await {
            Ok(report) => report,
            Err(join_error) => {
                error!("Pipeline tick aborted: {}", join_error);
                None
            }
        }
    }

    /// Run a tick at every local midnight, forever
    pub async fn run_schedule(self: Arc<Self>) -> Result<()> {
        loop {
            let wait = duration_until_next_midnight(Local::now());
            info!(
                "Next pipeline run in {:.0} minute(s)",
                wait.as_secs_f64() / 60.0
            );
            tokio::time::sleep(wait).await;
            self.run_isolated_tick().await;
        }
    }
}

/// Time left until the next local midnight after `now`
pub fn duration_until_next_midnight<Tz: TimeZone>(now: DateTime<Tz>) -> Duration {
    let fallback = now.clone() + ChronoDuration::days(1);
    let next = now
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest())
        .unwrap_or(fallback);

    (next - now).to_std().unwrap_or(Duration::from_secs(60))
}
