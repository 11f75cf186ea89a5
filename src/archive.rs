use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::ArchiveError;
use crate::file_utils::FileManager;

// @module: Per-video packaging of sampled frames

/// Archive name inside each per-video folder
pub const FRAMES_ARCHIVE_NAME: &str = "frames.zip";

/// Extensions that survive pruning of a per-video folder
pub const KEPT_EXTENSIONS: [&str; 2] = ["zip", "txt"];

/// Folder next to the video, named after its stem
pub fn video_folder(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    match video.parent() {
        Some(parent) => parent.join(stem),
        None => PathBuf::from(stem),
    }
}

/// Transcript file sitting beside the video (`<stem>.txt`)
pub fn transcript_path(video: &Path) -> PathBuf {
    video.with_extension("txt")
}

/// Create the per-video folder and move the transcript into it,
/// replacing an older copy. A missing transcript is not an error.
pub fn prepare_video_folder(video: &Path) -> Result<PathBuf, ArchiveError> {
    let folder = video_folder(video);
    fs::create_dir_all(&folder).map_err(|source| ArchiveError::Io {
        path: folder.clone(),
        source,
    })?;

    let transcript = transcript_path(video);
    if transcript.is_file() {
        let file_name = transcript.file_name().unwrap_or_default();
        let target = folder.join(file_name);
        FileManager::move_file(&transcript, &target).map_err(|e| ArchiveError::Io {
            path: transcript.clone(),
            source: io::Error::other(format!("{:#}", e)),
        })?;
        debug!("Moved transcript {:?} -> {:?}", transcript, target);
    }

    Ok(folder)
}

/// Zip every file under `frames_dir` into `zip_path` with flattened
/// entry names. An existing archive is replaced. Returns the entry count.
pub fn zip_frames_dir(frames_dir: &Path, zip_path: &Path) -> Result<usize, ArchiveError> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(frames_dir).min_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();

    FileManager::remove_file_if_exists(zip_path).map_err(|e| ArchiveError::Io {
        path: zip_path.to_path_buf(),
        source: io::Error::other(format!("{:#}", e)),
    })?;

    let output = File::create(zip_path).map_err(|source| ArchiveError::Io {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let mut writer = ZipWriter::new(BufWriter::new(output));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut written = 0usize;
    for path in &files {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        writer.start_file(name, options)?;
        let mut input = File::open(path).map_err(|source| ArchiveError::Io {
            path: path.clone(),
            source,
        })?;
        io::copy(&mut input, &mut writer).map_err(|source| ArchiveError::Io {
            path: path.clone(),
            source,
        })?;
        written += 1;
    }

    writer.finish()?;
    Ok(written)
}

/// Remove everything in the per-video folder except `.zip` and `.txt` files
pub fn prune_video_folder(folder: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    FileManager::prune_dir(folder, |path| {
        path.is_file()
            && KEPT_EXTENSIONS
                .iter()
                .any(|ext| FileManager::has_extension(path, ext))
    })
    .map_err(|e| ArchiveError::Io {
        path: folder.to_path_buf(),
        source: io::Error::other(format!("{:#}", e)),
    })
}

/// Full packaging step for one processed video: folder, transcript,
/// archive of its frame directory, then pruning.
pub fn package_video(video: &Path, frames_dir: &Path) -> Result<PathBuf, ArchiveError> {
    let folder = prepare_video_folder(video)?;
    let zip_path = folder.join(FRAMES_ARCHIVE_NAME);
    let count = zip_frames_dir(frames_dir, &zip_path)?;
    let removed = prune_video_folder(&folder)?;
    info!(
        "[zip] {:?} ({} frame(s), pruned {} entr{})",
        zip_path,
        count,
        removed.len(),
        if removed.len() == 1 { "y" } else { "ies" }
    );
    Ok(zip_path)
}
