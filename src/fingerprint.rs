/*!
 * Perceptual fingerprints and near-duplicate suppression.
 *
 * A fingerprint is the classic 64-bit DCT perceptual hash: the image is
 * normalised to RGB, reduced to a 32x32 grayscale thumbnail, transformed
 * with a 2D DCT-II, and the top-left 8x8 low-frequency block is
 * thresholded against its median. It is encoded as 16 lowercase hex
 * digits, most significant bit first.
 *
 * Distances are counted per hex digit of the encoding, so two
 * fingerprints are between 0 and 16 apart.
 */

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::imageops::FilterType;
use image::DynamicImage;
use rustdct::DctPlanner;

use crate::errors::FingerprintError;

/// Side of the low-frequency block kept from the DCT
const HASH_SIZE: usize = 8;

/// Side of the grayscale thumbnail fed to the DCT
const THUMBNAIL_SIZE: usize = HASH_SIZE * 4;

/// Number of hex digits in an encoded fingerprint
pub const ENCODED_LEN: usize = 16;

/// Perceptual hash of one extracted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Wrap raw hash bits
    pub fn from_bits(bits: u64) -> Self {
        Fingerprint(bits)
    }

    /// Raw hash bits
    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Fixed-width hex encoding
    pub fn encode(&self) -> String {
        format!("{:016x}", self.0)
    }

    /// Number of differing hex digits between the two encodings
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        let diff = self.0 ^ other.0;
        (0..ENCODED_LEN)
            .filter(|nibble| (diff >> (nibble * 4)) & 0xF != 0)
            .count() as u32
    }

    /// Fingerprint an in-memory image
    pub fn of_image(image: &DynamicImage) -> Self {
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let thumbnail = rgb
            .grayscale()
            .resize_exact(THUMBNAIL_SIZE as u32, THUMBNAIL_SIZE as u32, FilterType::Lanczos3)
            .to_luma8();

        let mut coefficients: Vec<f64> = thumbnail.pixels().map(|p| p[0] as f64).collect();
        dct_2d(&mut coefficients, THUMBNAIL_SIZE);

        let low_freq: Vec<f64> = (0..HASH_SIZE)
            .flat_map(|row| {
                let coefficients = &coefficients;
                (0..HASH_SIZE).map(move |col| coefficients[row * THUMBNAIL_SIZE + col])
            })
            .collect();
        let median = median(&low_freq);

        let bits = low_freq
            .iter()
            .enumerate()
            .filter(|(_, value)| **value > median)
            .fold(0u64, |acc, (i, _)| acc | (1u64 << (63 - i)));

        Fingerprint(bits)
    }

    /// Decode and fingerprint an image file
    pub fn of_file<P: AsRef<Path>>(path: P) -> Result<Self, FingerprintError> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|source| FingerprintError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::of_image(&image))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ENCODED_LEN {
            return Err(FingerprintError::InvalidEncoding(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Fingerprint)
            .map_err(|_| FingerprintError::InvalidEncoding(s.to_string()))
    }
}

/// Count differing characters between two encoded fingerprints.
/// Characters past the shorter string are not compared.
pub fn hamming_distance(a: &str, b: &str) -> u32 {
    a.chars().zip(b.chars()).filter(|(x, y)| x != y).count() as u32
}

/// Whether `candidate` lies within `threshold` of any prior fingerprint
pub fn is_similar<'a, I>(candidate: &Fingerprint, prior: I, threshold: u32) -> bool
where
    I: IntoIterator<Item = &'a Fingerprint>,
{
    prior.into_iter().any(|p| candidate.distance(p) <= threshold)
}

fn dct_2d(buffer: &mut [f64], size: usize) {
    let mut planner = DctPlanner::new();
    let dct = planner.plan_dct2(size);

    for row in buffer.chunks_exact_mut(size) {
        dct.process_dct2(row);
    }

    let mut column = vec![0.0; size];
    for col in 0..size {
        for row in 0..size {
            column[row] = buffer[row * size + col];
        }
        dct.process_dct2(&mut column);
        for row in 0..size {
            buffer[row * size + col] = column[row];
        }
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Outcome of running one frame through the filter
#[derive(Debug)]
pub enum FilterDecision {
    /// Frame differs from everything kept so far; its fingerprint was recorded
    Novel(Fingerprint),
    /// Frame is within the threshold of an accepted frame
    Duplicate {
        /// Fingerprint of the rejected frame
        fingerprint: Fingerprint,
        /// Smallest distance to an accepted fingerprint
        distance: u32,
    },
    /// Fingerprinting failed; the frame is kept anyway
    Unhashable(FingerprintError),
}

/// Per-video set of accepted fingerprints.
///
/// Lives for one video only and is never shared between tasks.
#[derive(Debug)]
pub struct SimilarityFilter {
    saved: HashSet<Fingerprint>,
    threshold: u32,
}

impl SimilarityFilter {
    /// Create an empty filter
    pub fn new(threshold: u32) -> Self {
        Self {
            saved: HashSet::new(),
            threshold,
        }
    }

    /// Configured threshold
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Whether the fingerprint is close to any accepted one
    pub fn is_similar(&self, candidate: &Fingerprint) -> bool {
        is_similar(candidate, &self.saved, self.threshold)
    }

    /// Smallest distance to an accepted fingerprint, if any was accepted
    pub fn nearest_distance(&self, candidate: &Fingerprint) -> Option<u32> {
        self.saved.iter().map(|p| candidate.distance(p)).min()
    }

    /// Classify a fingerprint result, recording it when novel.
    /// A failed fingerprint is never treated as a duplicate.
    pub fn classify(&mut self, fingerprint: Result<Fingerprint, FingerprintError>) -> FilterDecision {
        match fingerprint {
            Ok(fp) => match self.nearest_distance(&fp) {
                Some(distance) if distance <= self.threshold => FilterDecision::Duplicate {
                    fingerprint: fp,
                    distance,
                },
                _ => {
                    self.saved.insert(fp);
                    FilterDecision::Novel(fp)
                }
            },
            Err(e) => FilterDecision::Unhashable(e),
        }
    }

    /// Number of distinct accepted fingerprints
    pub fn len(&self) -> usize {
        self.saved.len()
    }

    /// Whether nothing has been accepted yet
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}
