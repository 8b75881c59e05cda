use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat};

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

fn is_image_bytes(data: &[u8]) -> bool {
    detect_mime_type(data)
        .map(|mime| mime.starts_with("image/"))
        .unwrap_or(false)
}

/// Decodes an inline-image payload that may arrive either as raw binary or
/// as base64 text. Raw image bytes pass through untouched; anything else is
/// treated as base64.
pub fn decode_inline_payload(data: &[u8]) -> Result<Vec<u8>> {
    if is_image_bytes(data) {
        return Ok(data.to_vec());
    }

    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();
    let decoded = general_purpose::STANDARD
        .decode(&compact)
        .context("inline payload is neither raw image bytes nor valid base64")?;
    if !is_image_bytes(&decoded) {
        return Err(anyhow!("base64 inline payload does not decode to an image"));
    }
    Ok(decoded)
}

/// Decodes a stored base64 image, tolerating a `data:image/...;base64,`
/// prefix.
pub fn decode_base64_image(value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("empty base64 image payload"));
    }
    let payload = match trimmed.split_once(',') {
        Some((_, rest)) => rest,
        None => trimmed,
    };
    let compact: String = payload.chars().filter(|ch| !ch.is_whitespace()).collect();
    general_purpose::STANDARD
        .decode(compact.as_bytes())
        .context("invalid base64 image payload")
}

pub fn encode_base64(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(&mut buffer, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(buffer.into_inner())
}

/// Prepares an uploaded reference image for a generation call: decode,
/// convert to RGB, bound the longest side at `max_dimension`, re-encode PNG.
pub fn prepare_reference(data: &[u8], max_dimension: u32) -> Result<Vec<u8>> {
    let decoded =
        image::load_from_memory(data).context("unsupported or corrupt reference image")?;
    let bounded = if decoded.width() > max_dimension || decoded.height() > max_dimension {
        decoded.thumbnail(max_dimension, max_dimension)
    } else {
        decoded
    };
    encode_png(&bounded)
}

/// Normalizes a generated image to RGB PNG before it is handed to storage.
pub fn normalize_artifact_png(data: &[u8]) -> Result<Vec<u8>> {
    let decoded =
        image::load_from_memory(data).context("unsupported or corrupt generated image")?;
    encode_png(&decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn sample_png() -> Vec<u8> {
        let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(4, 4, |x, y| Rgb([x as u8 * 50, y as u8 * 50, 128]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn raw_and_base64_inline_payloads_decode_to_identical_bytes() {
        let png = sample_png();
        let encoded = general_purpose::STANDARD.encode(&png);

        let from_raw = decode_inline_payload(&png).unwrap();
        let from_base64 = decode_inline_payload(encoded.as_bytes()).unwrap();

        assert_eq!(from_raw, from_base64);
        assert_eq!(from_raw, png);
    }

    #[test]
    fn garbage_inline_payload_is_rejected() {
        assert!(decode_inline_payload(b"definitely not an image !!!").is_err());
    }

    #[test]
    fn data_uri_prefix_is_tolerated() {
        let png = sample_png();
        let stored = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(&png)
        );
        assert_eq!(decode_base64_image(&stored).unwrap(), png);
    }

    #[test]
    fn oversized_references_are_bounded() {
        let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(64, 32, Rgb([10, 20, 30]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();

        let prepared = prepare_reference(&bytes.into_inner(), 16).unwrap();
        let reloaded = image::load_from_memory(&prepared).unwrap();
        assert!(reloaded.width() <= 16 && reloaded.height() <= 16);
    }

    #[test]
    fn normalization_produces_png_output() {
        let png = sample_png();
        let normalized = normalize_artifact_png(&png).unwrap();
        assert_eq!(detect_mime_type(&normalized).as_deref(), Some("image/png"));
    }
}
