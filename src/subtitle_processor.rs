use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use regex::Regex;
use once_cell::sync::Lazy;
use log::debug;

use crate::errors::SubtitleError;

// @module: Subtitle parsing for WebVTT and SRT files

// @const: WebVTT cue timing line, hours optional, 1-3 fractional digits
static VTT_TIME_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}:)?\d{2}:\d{2}[.,]\d{1,3} --> (\d{1,2}:)?\d{2}:\d{2}[.,]\d{1,3}").unwrap()
});

// @const: SRT block separator (one or more blank lines)
static SRT_BLOCK_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\r?\n){2,}").unwrap()
});

/// Span given to entries whose end does not come after their start
pub const MIN_ENTRY_SPAN_SECS: f64 = 0.5;

const UTF8_BOM: char = '\u{feff}';

// @struct: Single timed subtitle entry
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    // @field: Start time in seconds
    pub start: f64,

    // @field: End time in seconds, always greater than start
    pub end: f64,

    // @field: Subtitle text, lines joined with '\n'
    pub text: String,
}

impl SubtitleEntry {
    /// Creates a new entry, widening zero-length or inverted spans to
    /// `MIN_ENTRY_SPAN_SECS` instead of rejecting them
    pub fn new(start: f64, end: f64, text: String) -> Self {
        let end = if end <= start { start + MIN_ENTRY_SPAN_SECS } else { end };
        SubtitleEntry { start, end, text }
    }

    /// Parse a subtitle timestamp to seconds.
    ///
    /// Accepts `H:M:S`, `M:S` and raw seconds, with either `.` or `,` as the
    /// decimal separator. Malformed input yields `0.0`.
    pub fn parse_timestamp(timestamp: &str) -> f64 {
        let normalized = timestamp.trim().replace(',', ".");
        let parts: Vec<&str> = normalized.split(':').collect();

        let parsed = match parts.as_slice() {
            [h, m, s] => Self::parse_hms(Some(h), m, s),
            [m, s] => Self::parse_hms(None, m, s),
            _ => normalized.parse::<f64>().ok(),
        };

        parsed.unwrap_or(0.0)
    }

    fn parse_hms(hours: Option<&str>, minutes: &str, seconds: &str) -> Option<f64> {
        let h = match hours {
            Some(h) => h.trim().parse::<i64>().ok()?,
            None => 0,
        };
        let m = minutes.trim().parse::<i64>().ok()?;
        let s = seconds.trim().parse::<f64>().ok()?;
        Some((h * 3600 + m * 60) as f64 + s)
    }

    /// Format seconds for frame file names (`HH-MM-SS-mmm`)
    pub fn format_filename_timestamp(seconds: f64) -> String {
        let (h, m, s, ms) = Self::split_timestamp(seconds);
        format!("{:02}-{:02}-{:02}-{:03}", h, m, s, ms)
    }

    /// Format seconds for log output (`HH:MM:SS.mmm`)
    pub fn format_display_timestamp(seconds: f64) -> String {
        let (h, m, s, ms) = Self::split_timestamp(seconds);
        format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
    }

    fn split_timestamp(seconds: f64) -> (u64, u64, u64, u64) {
        let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let secs = (total_ms % 60_000) / 1_000;
        let millis = total_ms % 1_000;
        (hours, minutes, secs, millis)
    }

    /// Duration of the entry in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{} --> {}] {}",
            Self::format_display_timestamp(self.start),
            Self::format_display_timestamp(self.end),
            self.text
        )
    }
}

/// Supported subtitle file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    /// WebVTT cue blocks (`.vtt`)
    WebVtt,
    /// SubRip numbered blocks (`.srt`)
    Srt,
}

impl SubtitleFormat {
    /// Detect the format from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self, SubtitleError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "vtt" => Ok(SubtitleFormat::WebVtt),
            "srt" => Ok(SubtitleFormat::Srt),
            _ => Err(SubtitleError::UnsupportedFormat {
                extension,
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Parsed subtitle file
#[derive(Debug)]
pub struct SubtitleCollection {
    /// Source filename
    pub source_file: PathBuf,

    /// Detected format
    pub format: SubtitleFormat,

    /// Entries in file order
    pub entries: Vec<SubtitleEntry>,
}

impl SubtitleCollection {
    /// Read and parse a subtitle file, picking the parser by extension.
    /// Invalid UTF-8 sequences are replaced rather than rejected.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SubtitleError> {
        let path = path.as_ref();
        let format = SubtitleFormat::from_path(path)?;

        let bytes = fs::read(path).map_err(|source| SubtitleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let content = String::from_utf8_lossy(&bytes);

        let entries = match format {
            SubtitleFormat::WebVtt => Self::parse_vtt_string(&content),
            SubtitleFormat::Srt => Self::parse_srt_string(&content),
        };
        debug!("Parsed {} entries from {:?}", entries.len(), path);

        Ok(SubtitleCollection {
            source_file: path.to_path_buf(),
            format,
            entries,
        })
    }

    /// Parse WebVTT content.
    ///
    /// Anything before the first valid timing line (the `WEBVTT` header,
    /// `NOTE`/`STYLE` blocks, cue identifiers) is skipped. Cue settings
    /// after the end time are ignored.
    pub fn parse_vtt_string(content: &str) -> Vec<SubtitleEntry> {
        let lines: Vec<&str> = content.lines().collect();
        let mut entries = Vec::new();

        let mut i = 0;
        if let Some(first) = lines.first() {
            if first.trim().trim_start_matches(UTF8_BOM).to_uppercase().starts_with("WEBVTT") {
                i = 1;
            }
        }

        while i < lines.len() {
            if !VTT_TIME_LINE_REGEX.is_match(lines[i]) {
                i += 1;
                continue;
            }

            let time_line = lines[i];
            i += 1;

            let Some((left, right)) = time_line.split_once("-->") else {
                continue;
            };
            let start = SubtitleEntry::parse_timestamp(left);
            let end_token = right.trim().split(' ').next().unwrap_or_default();
            let end = SubtitleEntry::parse_timestamp(end_token);

            let mut text_lines = Vec::new();
            while i < lines.len() && !lines[i].trim().is_empty() {
                text_lines.push(lines[i]);
                i += 1;
            }
            while i < lines.len() && lines[i].trim().is_empty() {
                i += 1;
            }

            let text = text_lines.join("\n").trim().to_string();
            entries.push(SubtitleEntry::new(start, end, text));
        }

        entries
    }

    /// Parse SRT content.
    ///
    /// Blocks are separated by blank lines; the leading index line is
    /// optional and recognised by being all digits.
    pub fn parse_srt_string(content: &str) -> Vec<SubtitleEntry> {
        let mut entries = Vec::new();

        for block in SRT_BLOCK_SEPARATOR.split(content) {
            let lines: Vec<&str> = block
                .lines()
                .map(|line| line.trim_matches(UTF8_BOM))
                .filter(|line| !line.trim().is_empty())
                .collect();

            if lines.is_empty() {
                continue;
            }

            let time_idx = if lines[0].chars().all(|c| c.is_ascii_digit()) { 1 } else { 0 };
            let Some(time_line) = lines.get(time_idx) else {
                continue;
            };
            let Some((left, right)) = time_line.split_once("-->") else {
                continue;
            };

            let start = SubtitleEntry::parse_timestamp(left);
            let end = SubtitleEntry::parse_timestamp(right);
            let text = lines[time_idx + 1..].join("\n").trim().to_string();

            entries.push(SubtitleEntry::new(start, end, text));
        }

        entries
    }

    /// Number of parsed entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the file held no usable entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for SubtitleCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}
