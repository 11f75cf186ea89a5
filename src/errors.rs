/*!
 * Error types for the subframes application.
 *
 * This module contains custom error types for the different stages of the
 * sampling pipeline, using the thiserror crate for ergonomic error definitions.
 * Most of them are recovered from at the smallest possible scope (one line,
 * one frame, one video); only `AppError` ever reaches the binary.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading subtitle files
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// The file extension is neither `.vtt` nor `.srt`
    #[error("Unsupported subtitle format: {extension:?} ({path})")]
    UnsupportedFormat {
        /// Offending extension, empty if the file had none
        extension: String,
        /// Path of the subtitle file
        path: PathBuf,
    },

    /// The subtitle file could not be read
    #[error("Failed to read subtitle file {path}: {source}")]
    Io {
        /// Path of the subtitle file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by the external transcoder
#[derive(Error, Debug)]
pub enum TranscoderError {
    /// The transcoder binary could not be started
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        /// Program that was invoked
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The transcoder exited with a failure status
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        /// Program that was invoked
        program: String,
        /// Exit status as reported by the OS
        status: String,
        /// Filtered stderr output
        stderr: String,
    },

    /// The invocation exceeded its configured timeout
    #[error("{program} timed out after {seconds}s")]
    TimedOut {
        /// Program that was invoked
        program: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// The directory for the output frame could not be created
    #[error("Failed to create frame directory {path}: {source}")]
    OutputDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The transcoder reported success but produced no usable output file
    #[error("No frame written to {0}")]
    EmptyOutput(PathBuf),

    /// Probe output could not be interpreted
    #[error("Invalid probe output: {0}")]
    InvalidProbe(String),
}

/// Errors that can occur while fingerprinting an image
#[derive(Error, Debug)]
pub enum FingerprintError {
    /// The image could not be decoded
    #[error("Failed to decode image {path}: {source}")]
    Decode {
        /// Image path
        path: PathBuf,
        /// Decoder error
        #[source]
        source: image::ImageError,
    },

    /// The encoded fingerprint string is malformed
    #[error("Invalid fingerprint encoding: {0}")]
    InvalidEncoding(String),

    /// Fingerprinting task was aborted
    #[error("Fingerprint task failed: {0}")]
    Task(String),
}

/// Errors that can occur while packaging a frame directory
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Filesystem failure while packaging
    #[error("Archive I/O error on {path}: {source}")]
    Io {
        /// Path being processed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Zip writer failure
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Frame directory walk failure
    #[error("Failed to walk frame directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Errors that can occur while reading the manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest could not be opened or read
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        /// Manifest path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from the transcoder
    #[error("Transcoder error: {0}")]
    Transcoder(#[from] TranscoderError),

    /// Error from fingerprinting
    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    /// Error from packaging
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Error from manifest reading
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(format!("{:#}", error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
