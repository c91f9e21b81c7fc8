//! # Artwork Normalisation
//!
//! Prepares cover art for embedding into files headed for the device.
//!
//! Images larger than the configured bound are scaled down with their aspect
//! ratio preserved; smaller images are never upscaled. The result is always
//! re-encoded as baseline JPEG, with any alpha channel flattened onto white,
//! since many portable players only decode JPEG covers.

use crate::error::{MetadataError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

/// JPEG quality used for re-encoded covers.
pub const JPEG_QUALITY: u8 = 95;

/// Default longest edge, in pixels.
pub const DEFAULT_ARTWORK_SIZE: u32 = 1000;

/// Resize `data` to fit within `max_dimension` and re-encode it as JPEG.
///
/// # Errors
///
/// Returns an error if the bytes are not a recognised image or cannot be decoded.
pub fn resize_artwork(data: &[u8], max_dimension: u32) -> Result<Vec<u8>> {
    if detect_mime_type(data).is_none() {
        return Err(MetadataError::ArtworkError(
            "Unrecognised image data".to_string(),
        ));
    }

    let img = image::load_from_memory(data)
        .map_err(|e| MetadataError::ImageError(format!("Failed to decode image: {}", e)))?;

    let (width, height) = img.dimensions();
    let img = if width > max_dimension || height > max_dimension {
        img.thumbnail(max_dimension, max_dimension)
    } else {
        img
    };

    encode_jpeg(&flatten_onto_white(&img))
}

/// Drop transparency by compositing onto a white background.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

fn encode_jpeg(img: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    img.write_with_encoder(encoder)
        .map_err(|e| MetadataError::ImageError(format!("Failed to encode image: {}", e)))?;
    Ok(buffer)
}

/// Detect MIME type from magic bytes
pub fn detect_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.len() < 12 {
        return None;
    }

    match &data[0..4] {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, _] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38] => Some("image/gif"),
        // WEBP: 52 49 46 46 ... 57 45 42 50
        [0x52, 0x49, 0x46, 0x46] if &data[8..12] == b"WEBP" => Some("image/webp"),
        // BMP: 42 4D
        [0x42, 0x4D, _, _] => Some("image/bmp"),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_resize_preserves_aspect_ratio() {
        let source = png_bytes(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            400,
            200,
            Rgb([255, 0, 0]),
        )));

        let resized = resize_artwork(&source, 100).unwrap();
        assert_eq!(detect_mime_type(&resized), Some("image/jpeg"));

        let decoded = image::load_from_memory(&resized).unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
    }

    #[test]
    fn test_small_images_are_not_upscaled() {
        let source = png_bytes(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            64,
            64,
            Rgb([0, 0, 255]),
        )));

        let resized = resize_artwork(&source, 1000).unwrap();
        let decoded = image::load_from_memory(&resized).unwrap();
        assert_eq!(decoded.dimensions(), (64, 64));
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let source = png_bytes(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            32,
            32,
            Rgba([0, 0, 0, 0]),
        )));

        let resized = resize_artwork(&source, 1000).unwrap();
        let decoded = image::load_from_memory(&resized).unwrap().to_rgb8();
        let pixel = decoded.get_pixel(16, 16).0;
        assert!(pixel.iter().all(|&c| c > 240), "expected white, got {:?}", pixel);
    }

    #[test]
    fn test_rejects_non_image_data() {
        let err = resize_artwork(b"definitely not an image", 100).unwrap_err();
        assert!(matches!(err, MetadataError::ArtworkError(_)));
    }

    #[test]
    fn test_detect_mime_type() {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
        jpeg.extend_from_slice(&[0; 8]);
        assert_eq!(detect_mime_type(&jpeg), Some("image/jpeg"));

        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&[0; 4]);
        webp.extend_from_slice(b"WEBP");
        assert_eq!(detect_mime_type(&webp), Some("image/webp"));

        assert_eq!(detect_mime_type(b"short"), None);
    }
}
