/*!
 * Integration tests for concurrent batch runs
 */

use anyhow::Result;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::common;
use crate::common::mock_transcoder::{FrameSource, MockTranscoder};
use subframes::app_config::SamplingConfig;
use subframes::batch::{BatchRunner, VideoTask, build_tasks};
use subframes::manifest::load_manifest;
use subframes::sampler::VideoSampler;
use subframes::transcoder::FrameExtractor;

fn runner_with(mock: MockTranscoder, root: &Path, workers: usize) -> BatchRunner {
    let sampler = VideoSampler::new(
        FrameExtractor::new(Arc::new(mock)),
        SamplingConfig::default(),
        root.to_path_buf(),
    );
    BatchRunner::new(sampler, workers)
}

fn manifest_line(video: &Path, subtitle: &Path) -> String {
    serde_json::json!({
        "video_path": video,
        "subtitle_path": subtitle,
        "created_at": 1,
    })
    .to_string()
}

/// Only records whose files exist and whose name matches become tasks
#[test]
fn test_build_tasks_withFilters_shouldSelectMatchingRecords() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    let (a_video, a_sub) = common::create_video_pair(dir, "chan", "interview one", "WEBVTT\n")?;
    let (b_video, b_sub) = common::create_video_pair(dir, "chan", "lecture", "WEBVTT\n")?;
    let missing_video = dir.join("chan").join("gone.mp4");

    let lines = [
        manifest_line(&a_video, &a_sub),
        manifest_line(&b_video, &b_sub),
        manifest_line(&missing_video, &a_sub),
        r#"{"video_path":"/only/video.mp4"}"#.to_string(),
    ];
    let manifest = common::create_test_file(dir, "manifest.jsonl", &lines.join("\n"))?;
    let records = load_manifest(&manifest)?;
    assert_eq!(records.len(), 4);

    let all = build_tasks(&records, None);
    assert_eq!(
        all,
        vec![
            VideoTask { video: a_video.clone(), subtitle: a_sub.clone() },
            VideoTask { video: b_video.clone(), subtitle: b_sub.clone() },
        ]
    );

    let filtered = build_tasks(&records, Some("interview"));
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].video, a_video);

    assert_eq!(build_tasks(&records, Some("")).len(), 2);
    assert!(build_tasks(&records, Some("nothing")).is_empty());
    Ok(())
}

/// One failing and one panicking video do not affect the others
#[tokio::test]
async fn test_run_tasks_withFailingVideos_shouldIsolateFailures() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    let cues = common::vtt_with_cues(&[12, 20]);

    let (good_a, good_a_sub) = common::create_video_pair(dir, "chan", "good a", &cues)?;
    let (good_b, good_b_sub) = common::create_video_pair(dir, "other", "good b", &cues)?;
    let (crash, crash_sub) = common::create_video_pair(dir, "chan", "crash", &cues)?;
    let bad_video = common::create_test_file(dir, "chan/bad.mp4", "v")?;
    let bad_sub = common::create_test_file(dir, "chan/bad.ass", "[Script Info]")?;

    let mut mock = MockTranscoder::new(Some(60.0), FrameSource::PerTimestamp);
    mock.panic_on = Some("crash".to_string());
    let root = dir.join("frames");
    let runner = runner_with(mock, &root, 2);

    let tasks = vec![
        VideoTask { video: good_a.clone(), subtitle: good_a_sub },
        VideoTask { video: crash.clone(), subtitle: crash_sub },
        VideoTask { video: bad_video.clone(), subtitle: bad_sub },
        VideoTask { video: good_b.clone(), subtitle: good_b_sub },
    ];
    let report = runner.run_tasks(tasks).await;

    assert_eq!(report.total(), 4);
    assert_eq!(report.completed.len(), 2);
    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.frames_saved(), 12);

    let failed: Vec<_> = report.failed.iter().map(|f| f.video.clone()).collect();
    assert!(failed.contains(&crash));
    assert!(failed.contains(&bad_video));

    assert_eq!(common::file_names(&root.join("chan").join("good a")).len(), 6);
    assert_eq!(common::file_names(&root.join("other").join("good b")).len(), 6);
    Ok(())
}

/// Many videos on a small pool all complete
#[tokio::test]
async fn test_run_manifest_withMoreVideosThanWorkers_shouldProcessAll() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    let cues = common::vtt_with_cues(&[15]);

    let mut lines = Vec::new();
    for i in 0..6 {
        let (video, subtitle) = common::create_video_pair(dir, "chan", &format!("video {}", i), &cues)?;
        lines.push(manifest_line(&video, &subtitle));
    }
    let manifest = common::create_test_file(dir, "manifest.jsonl", &lines.join("\n"))?;

    let root = dir.join("frames");
    let runner = runner_with(MockTranscoder::new(Some(60.0), FrameSource::Static(5)), &root, 2);
    let report = runner.run_manifest(&manifest, None).await?;

    assert_eq!(report.completed.len(), 6);
    assert!(report.failed.is_empty());
    // each video keeps its own first frame: no state shared across videos
    assert!(report.completed.iter().all(|s| s.saved == 1 && s.skipped == 2));
    assert_eq!(fs::read_dir(root.join("chan"))?.count(), 6);
    Ok(())
}

/// A missing manifest is an empty batch
#[tokio::test]
async fn test_run_manifest_withMissingManifest_shouldReturnEmptyReport() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let runner = runner_with(MockTranscoder::new(Some(60.0), FrameSource::Static(1)), temp_dir.path(), 3);

    let report = runner.run_manifest(&temp_dir.path().join("none.jsonl"), None).await?;
    assert_eq!(report.total(), 0);
    Ok(())
}

/// The pool always has at least one worker
#[test]
fn test_runner_withZeroWorkers_shouldUseOne() {
    let runner = runner_with(MockTranscoder::new(None, FrameSource::Static(1)), Path::new("out"), 0);
    assert_eq!(runner.workers(), 1);
}
