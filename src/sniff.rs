//! Image format detection from magic bytes
//!
//! Identifies a candidate image from the leading bytes of its content
//! without decoding it.

use crate::input::read_input_bytes;
use crate::models::{ImageInput, ImageMetadata, ValidationResult};
use crate::validation::SUPPORTED_FORMATS;
use crate::{Error, Result};
use image::{ImageDecoder, ImageReader};
use serde::Serialize;
use std::fmt;
use std::io::Cursor;

/// Bytes a caller must supply before sniffing is meaningful.
pub const MIN_SNIFF_LEN: usize = 12;

const WEBP_MARKER: &[u8] = b"WEBP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Tiff,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Checked in order. A RIFF prefix only counts as WebP when the marker at
// bytes 8..12 matches as well.
const SIGNATURES: &[(ImageFormat, &[u8])] = &[
    (ImageFormat::Png, &[0x89, 0x50, 0x4E, 0x47]),
    (ImageFormat::Jpeg, &[0xFF, 0xD8, 0xFF]),
    (ImageFormat::Gif, &[0x47, 0x49, 0x46]),
    (ImageFormat::Webp, &[0x52, 0x49, 0x46, 0x46]),
    (ImageFormat::Bmp, &[0x42, 0x4D]),
    (ImageFormat::Tiff, &[0x49, 0x49, 0x2A, 0x00]),
    (ImageFormat::Tiff, &[0x4D, 0x4D, 0x00, 0x2A]),
];

/// Detect the format of `bytes` from its signature, if any matches.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    SIGNATURES
        .iter()
        .filter(|(_, signature)| bytes.starts_with(signature))
        .find(|(format, _)| *format != ImageFormat::Webp || bytes.get(8..12) == Some(WEBP_MARKER))
        .map(|(format, _)| *format)
}

/// Like [`detect_format`], but an unknown signature is an error.
pub fn ensure_supported(bytes: &[u8]) -> Result<ImageFormat> {
    detect_format(bytes).ok_or_else(|| Error::unsupported_format("unknown", &SUPPORTED_FORMATS))
}

fn read_metadata(bytes: &[u8], format: ImageFormat) -> Option<ImageMetadata> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let decoder = reader.into_decoder().ok()?;
    let (width, height) = decoder.dimensions();

    Some(ImageMetadata {
        width,
        height,
        format,
        size: bytes.len(),
        has_alpha: decoder.color_type().has_alpha(),
    })
}

/// Check that `input` looks like a supported image. Never fails; problems
/// are reported through [`ValidationResult::error`].
pub async fn validate_image(input: impl Into<ImageInput>) -> ValidationResult {
    let bytes = match read_input_bytes(input.into()).await {
        Ok(bytes) => bytes,
        Err(e) => return ValidationResult::invalid(e.to_string()),
    };

    if bytes.len() < MIN_SNIFF_LEN {
        return ValidationResult::invalid("File is too small to be a valid image");
    }

    match ensure_supported(&bytes) {
        Ok(format) => ValidationResult::valid(read_metadata(&bytes, format)),
        Err(_) => ValidationResult::invalid(format!(
            "Unsupported format. Supported: {}",
            SUPPORTED_FORMATS.join(", ")
        )),
    }
}
