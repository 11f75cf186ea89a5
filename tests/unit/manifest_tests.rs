/*!
 * Tests for manifest reading
 */

use anyhow::Result;
use std::path::Path;

use crate::common;
use subframes::manifest::{load_manifest, load_records_since, parse_line};

const MANIFEST: &str = r#"{"video_path":"/v/a.mp4","subtitle_path":"/v/a.vtt","created_at":100,"title":"A","uploader":"chan"}
this line is not json
{"video_path":"/v/b.mp4","subtitle_path":"/v/b.vtt","created_at":200}

{"video_path":"/v/c.mp4","created_at":300}
{"video_path":"/v/d.mp4","subtitle_path":"/v/d.srt","created_at":300,"format":"mp4","extra":{"k":1}}
"#;

/// Malformed and blank lines are skipped, the rest are kept in order
#[test]
fn test_load_manifest_withMalformedLines_shouldSkipThem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "manifest.jsonl", MANIFEST)?;

    let records = load_manifest(&path)?;
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].title.as_deref(), Some("A"));
    assert_eq!(records[0].uploader.as_deref(), Some("chan"));
    assert_eq!(records[1].created_at, 200);
    assert!(records[2].paths().is_none());
    assert_eq!(
        records[3].paths(),
        Some((Path::new("/v/d.mp4"), Path::new("/v/d.srt")))
    );
    assert!(records[3].extra.contains_key("format"));
    Ok(())
}

/// A missing manifest is an empty manifest
#[test]
fn test_load_manifest_withMissingFile_shouldBeEmpty() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let records = load_manifest(temp_dir.path().join("absent.jsonl"))?;
    assert!(records.is_empty());
    Ok(())
}

/// The incremental filter keeps records created at or after the mark
#[test]
fn test_load_records_since_withMark_shouldBeInclusive() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "manifest.jsonl", MANIFEST)?;

    let records = load_records_since(&path, 200)?;
    let created: Vec<i64> = records.iter().map(|r| r.created_at).collect();
    assert_eq!(created, vec![200, 300, 300]);

    assert!(load_records_since(&path, 301)?.is_empty());
    Ok(())
}

/// Records without created_at default to zero
#[test]
fn test_parse_line_withoutCreatedAt_shouldDefaultToZero() {
    let record = parse_line(r#"{"video_path":"x.mp4","subtitle_path":"x.vtt"}"#).unwrap();
    assert_eq!(record.created_at, 0);
    assert!(record.title.is_none());
}

/// Referenced files must both exist to count as present
#[test]
fn test_files_present_withPartialFiles_shouldBeFalse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_file(temp_dir.path(), "a.mp4", "v")?;
    let line = format!(
        r#"{{"video_path":{:?},"subtitle_path":{:?}}}"#,
        video.to_string_lossy(),
        temp_dir.path().join("a.vtt").to_string_lossy()
    );
    let record = parse_line(&line).unwrap();
    assert!(!record.files_present());

    common::create_test_file(temp_dir.path(), "a.vtt", "WEBVTT")?;
    assert!(record.files_present());
    Ok(())
}

/// Invalid UTF-8 in a line does not abort the read
#[test]
fn test_load_manifest_withInvalidUtf8_shouldContinue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("manifest.jsonl");
    let mut bytes = b"{\"video_path\":\"/v/\xff.mp4\",\"subtitle_path\":\"/v/a.vtt\"}\n".to_vec();
    bytes.extend_from_slice(b"{\"video_path\":\"/v/b.mp4\",\"subtitle_path\":\"/v/b.vtt\"}\n");
    std::fs::write(&path, bytes)?;

    let records = load_manifest(&path)?;
    assert_eq!(records.len(), 2);
    Ok(())
}
