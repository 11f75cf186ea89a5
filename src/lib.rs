/*!
 * # subframes - subtitle-driven frame sampling
 *
 * A Rust library that turns downloaded videos with subtitle tracks into a
 * deduplicated set of representative still frames per video.
 *
 * ## Features
 *
 * - WebVTT and SRT subtitle parsing
 * - Start/mid/end frame extraction per subtitle entry through ffmpeg,
 *   with a decode-window fallback and one retry
 * - Perceptual-hash (DCT pHash) near-duplicate suppression with a
 *   tunable threshold
 * - Filesystem-safe output directories under platform path limits
 * - Concurrent batch processing with per-video isolation
 * - Incremental pipeline: acquisition, sampling of new records,
 *   per-video `frames.zip` packaging
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `subtitle_processor`: Subtitle file parsing
 * - `transcoder`: Duration probing and frame extraction
 * - `fingerprint`: Perceptual hashing and similarity filtering
 * - `output_paths`: Output directory derivation
 * - `sampler`: Per-video sampling driver
 * - `manifest`: Manifest reading
 * - `batch`: Concurrent batch runner
 * - `archive`: Per-video packaging
 * - `acquisition`: Acquisition service seam
 * - `pipeline`: Incremental pipeline and scheduling
 * - `file_utils`: File system operations
 * - `logger`: Console logger
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod errors;
pub mod logger;
pub mod file_utils;
pub mod subtitle_processor;
pub mod transcoder;
pub mod fingerprint;
pub mod output_paths;
pub mod sampler;
pub mod manifest;
pub mod batch;
pub mod archive;
pub mod acquisition;
pub mod pipeline;

// Re-export main types for easier usage
pub use app_config::Config;
pub use batch::{BatchReport, BatchRunner};
pub use fingerprint::{Fingerprint, SimilarityFilter};
pub use pipeline::PipelineOrchestrator;
pub use sampler::{SamplingSummary, VideoSampler};
pub use subtitle_processor::{SubtitleCollection, SubtitleEntry};
pub use transcoder::{FfmpegTranscoder, FrameExtractor, Transcoder};
