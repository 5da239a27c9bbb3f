use super::{EncodedImage, WebpEncoder};
use crate::input::Runtime;
use crate::models::ResolvedOptions;
use crate::resize::{apply_native, plan_native};
use crate::sniff::{detect_format, ImageFormat};
use crate::{Error, Result};
use async_trait::async_trait;
use image::DynamicImage;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use std::io;
use webp::WebPConfig;

/// Headless backend: `image` decodes, libwebp encodes.
#[derive(Debug)]
pub struct NativeEncoder {
    _codec: (),
}

impl NativeEncoder {
    /// Fails when libwebp cannot produce an encoder configuration, so a
    /// broken codec surfaces when the converter is built rather than mid-batch.
    pub fn new() -> Result<Self> {
        WebPConfig::new().map_err(|_| Error::conversion("libwebp is unavailable"))?;
        Ok(Self { _codec: () })
    }

    fn encode_sync(data: Vec<u8>, options: ResolvedOptions) -> Result<EncodedImage> {
        let image = image::load_from_memory(&data).map_err(|e| {
            Error::conversion_with_source(format!("Conversion failed: {}", e), e)
        })?;

        let image = match options
            .resize
            .as_ref()
            .and_then(|spec| plan_native(image.width(), image.height(), spec))
        {
            Some(plan) => apply_native(image, &plan),
            None => image,
        };

        let (width, height) = (image.width(), image.height());
        let mut encoded = encode_pixels(&image, &options)?;

        if options.preserve_metadata {
            let has_alpha = image.color().has_alpha();
            match copy_exif(&data, &encoded, (width, height), has_alpha) {
                Ok(Some(with_exif)) => encoded = with_exif,
                Ok(None) => tracing::debug!("No EXIF to carry over"),
                Err(e) => tracing::warn!("Failed to carry EXIF into WebP output: {}", e),
            }
        }

        Ok(EncodedImage {
            data: encoded,
            width,
            height,
        })
    }
}

fn encode_pixels(image: &DynamicImage, options: &ResolvedOptions) -> Result<Vec<u8>> {
    let mut config =
        WebPConfig::new().map_err(|_| Error::conversion("Failed to initialise libwebp config"))?;
    config.lossless = i32::from(options.lossless);
    config.quality = f32::from(options.quality);
    config.method = options.method.effort();

    let encoded = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
        encoder.encode_advanced(&config).map(|memory| memory.to_vec())
    } else {
        let rgb = image.to_rgb8();
        let encoder = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height());
        encoder.encode_advanced(&config).map(|memory| memory.to_vec())
    };

    encoded.map_err(|e| Error::conversion(format!("Conversion failed: libwebp error {:?}", e)))
}

fn exif_container(format: ImageFormat) -> Option<FileExtension> {
    match format {
        ImageFormat::Jpeg => Some(FileExtension::JPEG),
        ImageFormat::Png => Some(FileExtension::PNG {
            as_zTXt_chunk: true,
        }),
        ImageFormat::Tiff => Some(FileExtension::TIFF),
        ImageFormat::Webp => Some(FileExtension::WEBP),
        ImageFormat::Gif | ImageFormat::Bmp => None,
    }
}

const VP8X_ALPHA: u8 = 0x10;

/// Rewrite a simple-format WebP (`VP8 ` or `VP8L` first chunk) into the
/// extended layout by inserting a `VP8X` header. Extended files are returned
/// as-is.
fn to_extended_format(
    webp: &[u8],
    (width, height): (u32, u32),
    has_alpha: bool,
) -> io::Result<Vec<u8>> {
    let invalid = |msg: &str| io::Error::new(io::ErrorKind::InvalidData, msg.to_string());

    if webp.len() < 20 || &webp[0..4] != b"RIFF" || &webp[8..12] != b"WEBP" {
        return Err(invalid("not a RIFF/WEBP container"));
    }
    match &webp[12..16] {
        b"VP8X" => return Ok(webp.to_vec()),
        b"VP8 " | b"VP8L" => {}
        _ => return Err(invalid("unexpected first WebP chunk")),
    }
    if width == 0 || height == 0 || width > 1 << 24 || height > 1 << 24 {
        return Err(invalid("canvas size out of range"));
    }

    // Canvas dimensions are stored minus one, 24 bits each.
    let mut chunk = Vec::with_capacity(18);
    chunk.extend_from_slice(b"VP8X");
    chunk.extend_from_slice(&10u32.to_le_bytes());
    chunk.extend_from_slice(&[if has_alpha { VP8X_ALPHA } else { 0 }, 0, 0, 0]);
    chunk.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
    chunk.extend_from_slice(&(height - 1).to_le_bytes()[..3]);

    let mut out = Vec::with_capacity(webp.len() + chunk.len());
    out.extend_from_slice(&webp[..12]);
    out.extend_from_slice(&chunk);
    out.extend_from_slice(&webp[12..]);

    let riff_size = u32::from_le_bytes([webp[4], webp[5], webp[6], webp[7]]) + chunk.len() as u32;
    out[4..8].copy_from_slice(&riff_size.to_le_bytes());
    Ok(out)
}

/// EXIF from `source` written into a copy of `encoded`. `None` when the
/// source carries nothing to copy; `encoded` itself is never touched.
fn copy_exif(
    source: &[u8],
    encoded: &[u8],
    dimensions: (u32, u32),
    has_alpha: bool,
) -> io::Result<Option<Vec<u8>>> {
    let Some(container) = detect_format(source).and_then(exif_container) else {
        return Ok(None);
    };
    let metadata = match Metadata::new_from_vec(&source.to_vec(), container) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::debug!("Source EXIF unreadable: {}", e);
            return Ok(None);
        }
    };
    if (&metadata).into_iter().next().is_none() {
        return Ok(None);
    }

    let mut target = to_extended_format(encoded, dimensions, has_alpha)?;
    metadata.write_to_vec(&mut target, FileExtension::WEBP)?;
    Ok(Some(target))
}

#[async_trait]
impl WebpEncoder for NativeEncoder {
    fn runtime(&self) -> Runtime {
        Runtime::Headless
    }

    async fn encode(&self, data: Vec<u8>, options: &ResolvedOptions) -> Result<EncodedImage> {
        tracing::debug!(
            "Encoding {} bytes (quality {}, lossless {}, method {})",
            data.len(),
            options.quality,
            options.lossless,
            options.method
        );

        tokio::task::spawn_blocking({
            let options = options.clone();
            move || Self::encode_sync(data, options)
        })
        .await
        .map_err(|e| Error::conversion_with_source("Image processing task join error", e))?
    }
}
