use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::errors::ManifestError;

// @module: Reader for the acquisition service's append-only manifest

/// One acquired asset as recorded by the acquisition service.
/// Unknown fields are carried along untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestRecord {
    #[serde(default)]
    pub video_path: Option<PathBuf>,

    #[serde(default)]
    pub subtitle_path: Option<PathBuf>,

    /// Acquisition time in epoch seconds
    #[serde(default, deserialize_with = "lenient_epoch")]
    pub created_at: i64,

    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub uploader: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ManifestRecord {
    /// Video and subtitle paths, if the record names both
    pub fn paths(&self) -> Option<(&Path, &Path)> {
        match (&self.video_path, &self.subtitle_path) {
            (Some(video), Some(subtitle)) => Some((video.as_path(), subtitle.as_path())),
            _ => None,
        }
    }

    /// Whether both referenced files exist on disk
    pub fn files_present(&self) -> bool {
        self.paths()
            .map(|(video, subtitle)| video.is_file() && subtitle.is_file())
            .unwrap_or(false)
    }
}

// Accepts integers, floats and numeric strings; anything else counts as 0
fn lenient_epoch<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
        _ => 0,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Parse one manifest line, `None` for blank or malformed lines
pub fn parse_line(line: &str) -> Option<ManifestRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<ManifestRecord>(line) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!("Skipping malformed manifest line: {}", e);
            None
        }
    }
}

/// Load every well-formed record. A missing manifest yields no records.
pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<ManifestRecord>, ManifestError> {
    let path = path.as_ref();
    if !path.exists() {
        warn!("Manifest not found: {:?}", path);
        return Ok(Vec::new());
    }

    let file = File::open(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in BufReader::new(file).split(b'\n') {
        let bytes = line.map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        if text.trim().is_empty() {
            continue;
        }
        match parse_line(&text) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Skipped {} malformed line(s) in {:?}", skipped, path);
    }
    Ok(records)
}

/// Records created at or after `since` (epoch seconds)
pub fn load_records_since<P: AsRef<Path>>(path: P, since: i64) -> Result<Vec<ManifestRecord>, ManifestError> {
    Ok(load_manifest(path)?
        .into_iter()
        .filter(|record| record.created_at >= since)
        .collect())
}
