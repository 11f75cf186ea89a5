use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

// @module: Deterministic, filesystem-safe frame directory derivation

// @const: Characters rejected by common filesystem path grammars
static ILLEGAL_PATH_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Longest uploader segment kept
pub const MAX_UPLOADER_LEN: usize = 40;

/// Longest video base-name segment kept
pub const MAX_BASE_NAME_LEN: usize = 80;

/// Composed paths longer than this fall back to a hashed base name
pub const MAX_PATH_LEN: usize = 230;

/// Make a name usable as a single path segment.
///
/// Illegal characters become `_`, whitespace runs collapse to one space,
/// trailing spaces and dots are dropped and the result is cut to
/// `max_len` characters.
pub fn sanitize_name(name: &str, max_len: usize) -> String {
    let cleaned = ILLEGAL_PATH_CHARS.replace_all(name, "_");
    let cleaned = WHITESPACE_RUN.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim().trim_end_matches(&[' ', '.'][..]);
    cleaned.chars().take(max_len).collect()
}

/// First eight hex digits of the MD5 of `input`
pub fn short_hash(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
}

/// Frame directory for one video: `root/uploader/base_name`, or
/// `root/uploader/vid_<hash8>` when the composed path would be too long.
/// Pure: performs no I/O.
pub fn resolve_frame_dir(root: &Path, uploader: &str, base_name: &str) -> PathBuf {
    let uploader_segment = sanitize_name(uploader, MAX_UPLOADER_LEN);
    let base_segment = sanitize_name(base_name, MAX_BASE_NAME_LEN);

    let dir = root.join(&uploader_segment).join(&base_segment);
    if dir.to_string_lossy().chars().count() <= MAX_PATH_LEN {
        return dir;
    }

    let key = format!("{}{}{}", root.to_string_lossy(), uploader, base_name);
    root.join(uploader_segment).join(format!("vid_{}", short_hash(&key)))
}

/// Frame directory for a video file, keyed by its parent directory name
/// (the uploader folder written by the acquisition service) and file stem
pub fn frame_dir_for_video(root: &Path, video_path: &Path) -> PathBuf {
    let uploader = video_path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let base_name = video_path
        .file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    resolve_frame_dir(root, &uploader, &base_name)
}
