//! Content sniffing and decoding with the `image` crate

use image::{ImageError, ImageFormat, ImageReader, Limits};
use std::io::Cursor;

/// MIME reported for content no decoder recognises
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Format detected from magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffedFormat {
    pub format: Option<ImageFormat>,
    pub mime_type: &'static str,
}

impl SniffedFormat {
    /// Canonical file extension, `bin` for unknown content
    pub fn extension(&self) -> &'static str {
        self.format
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

/// Detect the format from the content, ignoring any client-supplied name or type.
pub fn sniff(data: &[u8]) -> SniffedFormat {
    match image::guess_format(data) {
        Ok(format) => SniffedFormat {
            format: Some(format),
            mime_type: format.to_mime_type(),
        },
        Err(_) => SniffedFormat {
            format: None,
            mime_type: UNKNOWN_MIME,
        },
    }
}

/// Bytes per pixel of the widest layout a decoder may produce (`Rgba32F`)
const MAX_BYTES_PER_PIXEL: u64 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Not decodable at all
    Corrupt(String),
    /// Refused by the decoder limits; header dimensions when they could be read
    TooLarge(Option<(u32, u32)>),
}

/// Decoder limits for images up to `max_width` x `max_height`.
///
/// The allocation cap covers the full pixel buffer of the largest accepted image in
/// any sample layout, so every in-range image can be decoded.
pub fn decode_limits(max_width: u32, max_height: u32) -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(max_width);
    limits.max_image_height = Some(max_height);
    limits.max_alloc = u64::from(max_width)
        .checked_mul(u64::from(max_height))
        .and_then(|pixels| pixels.checked_mul(MAX_BYTES_PER_PIXEL));
    limits
}

/// Fully decode `data` and return its pixel dimensions.
///
/// Images wider or taller than the given maximums are refused before their pixel
/// buffer is allocated. CPU heavy: call from a blocking thread.
pub fn decode_dimensions(
    data: &[u8],
    max_width: u32,
    max_height: u32,
) -> Result<(u32, u32), DecodeFailure> {
    decode_with_limits(data, decode_limits(max_width, max_height))
}

fn decode_with_limits(data: &[u8], limits: Limits) -> Result<(u32, u32), DecodeFailure> {
    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| DecodeFailure::Corrupt(e.to_string()))?;
    reader.limits(limits);

    match reader.decode() {
        Ok(img) => Ok((img.width(), img.height())),
        Err(ImageError::Limits(_)) => Err(DecodeFailure::TooLarge(header_dimensions(data))),
        Err(e) => Err(DecodeFailure::Corrupt(e.to_string())),
    }
}

fn header_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage, Rgba};

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 10, 10]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        buffer
    }

    #[test]
    fn test_sniff_ignores_names_and_uses_magic_bytes() {
        assert_eq!(sniff(&encode(10, 10, ImageFormat::Png)).mime_type, "image/png");
        assert_eq!(sniff(&encode(10, 10, ImageFormat::Jpeg)).mime_type, "image/jpeg");
        assert_eq!(sniff(&encode(10, 10, ImageFormat::Gif)).extension(), "gif");
        let text = sniff(b"<?php echo 'hi'; ?>");
        assert_eq!(text.mime_type, UNKNOWN_MIME);
        assert_eq!(text.extension(), "bin");
    }

    #[test]
    fn test_decode_dimensions() {
        let png = encode(120, 80, ImageFormat::Png);
        assert_eq!(decode_dimensions(&png, 1000, 1000), Ok((120, 80)));
    }

    #[test]
    fn test_decode_respects_limits() {
        let png = encode(120, 80, ImageFormat::Png);
        assert_eq!(
            decode_dimensions(&png, 100, 1000),
            Err(DecodeFailure::TooLarge(Some((120, 80))))
        );
    }

    #[test]
    fn test_allocation_cap_covers_deep_images_in_range() {
        let limits = decode_limits(10_000, 10_000);
        // 16-bit RGBA at 9000x9000 needs 648 MB, above the crate default of 512 MiB
        assert!(limits.max_alloc.unwrap() >= 9_000 * 9_000 * 8);
        assert_eq!(limits.max_alloc, Some(10_000 * 10_000 * 16));
        assert_eq!(decode_limits(u32::MAX, u32::MAX).max_alloc, None);
    }

    #[test]
    fn test_allocation_limit_reports_header_dimensions() {
        let png = encode(200, 200, ImageFormat::Png);
        let mut limits = decode_limits(1000, 1000);
        limits.max_alloc = Some(1024);
        assert_eq!(
            decode_with_limits(&png, limits),
            Err(DecodeFailure::TooLarge(Some((200, 200))))
        );
    }

    #[test]
    fn test_sixteen_bit_image_decodes() {
        let img =
            ImageBuffer::<Rgba<u16>, Vec<u16>>::from_pixel(300, 200, Rgba([40_000, 2, 3, 65_535]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        assert_eq!(decode_dimensions(&png, 1000, 1000), Ok((300, 200)));
    }

    #[test]
    #[ignore] // Allocates about 1.3 GB
    fn test_large_sixteen_bit_image_in_range_decodes() {
        let img = ImageBuffer::<Rgba<u16>, Vec<u16>>::new(9_000, 9_000);
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        drop(img);
        assert_eq!(decode_dimensions(&png, 10_000, 10_000), Ok((9_000, 9_000)));
    }

    #[test]
    fn test_truncated_image_is_corrupt() {
        let png = encode(120, 80, ImageFormat::Png);
        let truncated = &png[..png.len() / 2];
        assert!(matches!(
            decode_dimensions(truncated, 1000, 1000),
            Err(DecodeFailure::Corrupt(_))
        ));
    }
}
