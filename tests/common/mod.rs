/*!
 * Common test utilities for the subframes test suite
 */

use anyhow::Result;
use image::{ImageBuffer, Rgb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;


/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Surface log output in test runs
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Encoded JPEG of seeded random noise; equal seeds give identical bytes
pub fn noise_jpeg(seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let image = ImageBuffer::from_fn(64, 64, |_, _| Rgb([rng.random::<u8>(), rng.random::<u8>(), rng.random::<u8>()]));

    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Jpeg(90))
        .expect("encode test jpeg");
    bytes
}

/// Write a noise JPEG to `path`
pub fn write_noise_jpeg(path: &Path, seed: u64) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, noise_jpeg(seed))?;
    Ok(())
}

/// WebVTT file whose cues start at the given second marks, each 2s long
pub fn vtt_with_cues(starts: &[u32]) -> String {
    let mut content = String::from("WEBVTT\n\n");
    for (i, start) in starts.iter().enumerate() {
        content.push_str(&format!(
            "{}\n00:{:02}:{:02}.000 --> 00:{:02}:{:02}.000\nLine {}\n\n",
            i + 1,
            start / 60,
            start % 60,
            (start + 2) / 60,
            (start + 2) % 60,
            i + 1
        ));
    }
    content
}

/// Creates a video placeholder and a matching subtitle file under
/// `dir/uploader/`. The mock transcoder never reads the video bytes.
pub fn create_video_pair(dir: &Path, uploader: &str, stem: &str, subtitle: &str) -> Result<(PathBuf, PathBuf)> {
    let video = create_test_file(&dir.join(uploader), &format!("{}.mp4", stem), "not really a video")?;
    let subtitle = create_test_file(&dir.join(uploader), &format!("{}.vtt", stem), subtitle)?;
    Ok((video, subtitle))
}

/// Names of the files directly inside `dir`, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
