/*!
 * Tests for perceptual fingerprints and the similarity filter
 */

use anyhow::Result;
use image::{DynamicImage, ImageBuffer, Luma};

use crate::common;
use subframes::errors::FingerprintError;
use subframes::fingerprint::{
    ENCODED_LEN, FilterDecision, Fingerprint, SimilarityFilter, hamming_distance, is_similar,
};

/// Identical images hash identically, so their distance is zero
#[test]
fn test_fingerprint_withIdenticalImages_shouldHaveZeroDistance() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let a = temp_dir.path().join("a.jpg");
    let b = temp_dir.path().join("b.jpg");
    common::write_noise_jpeg(&a, 7)?;
    common::write_noise_jpeg(&b, 7)?;

    let fa = Fingerprint::of_file(&a)?;
    let fb = Fingerprint::of_file(&b)?;
    assert_eq!(fa, fb);
    assert_eq!(fa.distance(&fb), 0);
    Ok(())
}

/// Unrelated noise images are far apart
#[test]
fn test_fingerprint_withUnrelatedImages_shouldBeFarApart() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let a = temp_dir.path().join("a.jpg");
    let b = temp_dir.path().join("b.jpg");
    common::write_noise_jpeg(&a, 1)?;
    common::write_noise_jpeg(&b, 2)?;

    let distance = Fingerprint::of_file(&a)?.distance(&Fingerprint::of_file(&b)?);
    assert!(distance > 5, "distance was {}", distance);
    Ok(())
}

/// The encoding is 16 lowercase hex digits
#[test]
fn test_encode_withAnyImage_shouldBeSixteenHexDigits() {
    let gradient: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_fn(48, 48, |x, y| Luma([((x * 5 + y * 2) % 256) as u8]));
    let fp = Fingerprint::of_image(&DynamicImage::ImageLuma8(gradient));
    let encoded = fp.encode();

    assert_eq!(encoded.len(), ENCODED_LEN);
    assert!(encoded.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(encoded.parse::<Fingerprint>().unwrap(), fp);
}

/// Grayscale and RGB versions of the same picture hash the same
#[test]
fn test_of_image_withColorModes_shouldNormalise() {
    let gray: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_fn(40, 40, |x, y| Luma([if (x / 8 + y / 8) % 2 == 0 { 20 } else { 230 }]));
    let gray = DynamicImage::ImageLuma8(gray);
    let rgb = DynamicImage::ImageRgb8(gray.to_rgb8());

    assert_eq!(Fingerprint::of_image(&gray), Fingerprint::of_image(&rgb));
}

/// Hamming distance counts differing characters
#[test]
fn test_hamming_distance_withStrings_shouldCountCharacters() {
    assert_eq!(hamming_distance("0000000000000000", "0000000000000000"), 0);
    assert_eq!(hamming_distance("0000000000000000", "f00000000000000f"), 2);
    assert_eq!(hamming_distance("abcdef0123456789", "abcdef0123456780"), 1);
}

/// A distance equal to the threshold counts as similar, one more does not
#[test]
fn test_is_similar_atThresholdBoundary_shouldBeInclusive() {
    let base = Fingerprint::from_bits(0);
    // five differing hex digits
    let five = Fingerprint::from_bits(0x1111_1000_0000_0000);
    // six differing hex digits
    let six = Fingerprint::from_bits(0x1111_1100_0000_0000);
    assert_eq!(base.distance(&five), 5);
    assert_eq!(base.distance(&six), 6);

    assert!(is_similar(&five, [&base], 5));
    assert!(!is_similar(&six, [&base], 5));
    assert!(!is_similar(&five, std::iter::empty(), 5));
}

/// Threshold zero only suppresses exact matches
#[test]
fn test_filter_withZeroThreshold_shouldOnlyRejectExactMatches() {
    let mut filter = SimilarityFilter::new(0);
    let a = Fingerprint::from_bits(0xabcd_0000_0000_0000);
    let b = Fingerprint::from_bits(0xabcd_0000_0000_0001);

    assert!(matches!(filter.classify(Ok(a)), FilterDecision::Novel(_)));
    assert!(matches!(filter.classify(Ok(b)), FilterDecision::Novel(_)));
    assert!(matches!(filter.classify(Ok(a)), FilterDecision::Duplicate { distance: 0, .. }));
    assert_eq!(filter.len(), 2);
}

/// Duplicates are not recorded, so they cannot chain
#[test]
fn test_filter_withDuplicate_shouldNotRecordIt() {
    let mut filter = SimilarityFilter::new(1);
    let a = Fingerprint::from_bits(0x0000_0000_0000_0000);
    let near = Fingerprint::from_bits(0x0000_0000_0000_0001);
    let further = Fingerprint::from_bits(0x0000_0000_0000_0011);

    assert!(matches!(filter.classify(Ok(a)), FilterDecision::Novel(_)));
    assert!(matches!(filter.classify(Ok(near)), FilterDecision::Duplicate { distance: 1, .. }));
    // two digits away from `a`; would be one away from `near` had it been kept
    assert!(matches!(filter.classify(Ok(further)), FilterDecision::Novel(_)));
    assert_eq!(filter.nearest_distance(&near), Some(1));
    assert!(filter.is_similar(&near));
}

/// Hash failures are kept (fail-open) and leave the set untouched
#[test]
fn test_filter_withHashFailure_shouldFailOpen() {
    let mut filter = SimilarityFilter::new(64);
    let decision = filter.classify(Err(FingerprintError::InvalidEncoding("zz".to_string())));
    assert!(matches!(decision, FilterDecision::Unhashable(_)));
    assert!(filter.is_empty());
}

/// Decoding a non-image is a decode error
#[test]
fn test_of_file_withCorruptFile_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "frame.jpg", "not a jpeg")?;
    assert!(matches!(Fingerprint::of_file(&path), Err(FingerprintError::Decode { .. })));
    Ok(())
}

/// Invalid encodings are rejected
#[test]
fn test_from_str_withBadInput_shouldFail() {
    assert!("123".parse::<Fingerprint>().is_err());
    assert!("zzzzzzzzzzzzzzzz".parse::<Fingerprint>().is_err());
}
