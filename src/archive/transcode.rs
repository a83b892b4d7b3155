//! Baseline-JPEG normalization for archive entries.
//!
//! Entries are always named `NNN.jpg`, so PNG/WebP/GIF payloads are decoded
//! and re-encoded as JPEG. Payloads that are already JPEG pass through
//! untouched, and payloads the decoder cannot read are stored as received.

use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, warn};

/// Quality used when re-encoding to JPEG.
pub const JPEG_QUALITY: u8 = 90;

/// Returns a JPEG rendition of `bytes`, or `bytes` unchanged when it is
/// already JPEG or cannot be decoded.
#[must_use]
pub fn normalize_to_jpeg(bytes: Vec<u8>) -> Vec<u8> {
    match image::guess_format(&bytes) {
        Ok(ImageFormat::Jpeg) => return bytes,
        Ok(format) => debug!(?format, "re-encoding image as jpeg"),
        Err(error) => {
            debug!(error = %error, "unrecognized image payload, storing as-is");
            return bytes;
        }
    }

    let decoded = match image::load_from_memory(&bytes) {
        Ok(decoded) => decoded,
        Err(error) => {
            warn!(error = %error, "image decode failed, storing original bytes");
            return bytes;
        }
    };

    let rgb = decoded.to_rgb8();
    let mut out = Vec::with_capacity(bytes.len());
    let encoded = {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
        encoder.encode_image(&rgb)
    };
    match encoded {
        Ok(()) => out,
        Err(error) => {
            warn!(error = %error, "jpeg encode failed, storing original bytes");
            bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_fn(4, 4, |x, y| Rgba([(x * 60) as u8, (y * 60) as u8, 128, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png)
            .unwrap_or_else(|e| panic!("png encode: {e}"));
        out.into_inner()
    }

    #[test]
    fn test_png_is_reencoded_as_jpeg() {
        let jpeg = normalize_to_jpeg(png_bytes());
        assert!(matches!(image::guess_format(&jpeg), Ok(ImageFormat::Jpeg)));
    }

    #[test]
    fn test_jpeg_passes_through_unchanged() {
        let jpeg = normalize_to_jpeg(png_bytes());
        let again = normalize_to_jpeg(jpeg.clone());
        assert_eq!(again, jpeg);
    }

    #[test]
    fn test_garbage_is_stored_as_is() {
        let garbage = b"definitely not an image".to_vec();
        assert_eq!(normalize_to_jpeg(garbage.clone()), garbage);
    }
}
