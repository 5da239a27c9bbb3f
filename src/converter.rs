//! Single-image conversion
//!
//! A [`Converter`] owns one encoder backend, chosen when it is built, and
//! optional default options that per-call options are merged over.

use crate::encoder::{CanvasEncoder, CanvasHost, NativeEncoder, WebpEncoder};
use crate::input::{ensure_accepted, normalize_input, Runtime};
use crate::models::{ConversionOptions, ConversionResult, ImageInput};
use crate::{Error, Result};
use tracing::debug;

pub struct Converter {
    encoder: Box<dyn WebpEncoder>,
    defaults: ConversionOptions,
}

impl Converter {
    pub fn new(encoder: Box<dyn WebpEncoder>) -> Self {
        Self::with_defaults(encoder, ConversionOptions::default())
    }

    /// Build a converter whose calls start from `defaults`.
    pub fn with_defaults(encoder: Box<dyn WebpEncoder>, defaults: ConversionOptions) -> Self {
        Self { encoder, defaults }
    }

    /// Converter backed by libwebp. Fails if the codec is unusable.
    pub fn headless() -> Result<Self> {
        Ok(Self::new(Box::new(NativeEncoder::new()?)))
    }

    /// Converter backed by a drawing-surface host.
    pub fn browser<H: CanvasHost + 'static>(host: H) -> Self {
        Self::new(Box::new(CanvasEncoder::new(host)))
    }

    pub fn default_options(&self) -> ConversionOptions {
        self.defaults.clone()
    }

    pub fn runtime(&self) -> Runtime {
        self.encoder.runtime()
    }

    /// Convert one image to WebP.
    ///
    /// Input shape is checked first, then options, then the input is read.
    /// Encoder failures come back as `ConversionFailed` wrapping the cause;
    /// every other error propagates unchanged.
    pub async fn convert(
        &self,
        input: impl Into<ImageInput>,
        options: Option<&ConversionOptions>,
    ) -> Result<ConversionResult> {
        let input = input.into();
        let runtime = self.encoder.runtime();
        ensure_accepted(&input, runtime)?;

        let options = match options {
            Some(options) => options.merged_over(&self.defaults),
            None => self.defaults.clone(),
        };
        options.validate()?;

        let data = normalize_input(input, runtime).await?;
        let original_size = data.len();
        let resolved = options.resolve();

        let encoded = self
            .encoder
            .encode(data, &resolved)
            .await
            .map_err(|e| match e {
                Error::ConversionFailed { .. } => e,
                other => Error::conversion_with_source(format!("Conversion failed: {}", other), other),
            })?;

        debug!(
            "Converted {} bytes into {} bytes ({}x{})",
            original_size,
            encoded.data.len(),
            encoded.width,
            encoded.height
        );

        Ok(ConversionResult::new(
            encoded.data,
            original_size,
            encoded.width,
            encoded.height,
        ))
    }
}

/// Convert one image with the headless backend.
pub async fn convert_to_webp(
    input: impl Into<ImageInput>,
    options: Option<&ConversionOptions>,
) -> Result<ConversionResult> {
    Converter::headless()?.convert(input, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{MockCanvasHost, MockEncoder};
    use crate::models::{Blob, CompressionMethod, ResizeSpec};
    use crate::ErrorKind;
    use std::error::Error as _;

    #[tokio::test]
    async fn test_rejects_invalid_quality() {
        let converter = Converter::new(Box::new(MockEncoder::new()));
        let options = ConversionOptions::default().with_quality(150);

        let err = converter
            .convert(vec![0x89, 0x50, 0x4E, 0x47], Some(&options))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOptions);
    }

    #[tokio::test]
    async fn test_rejects_zero_resize_width() {
        let converter = Converter::new(Box::new(MockEncoder::new()));
        let options = ConversionOptions::default().with_resize(ResizeSpec::width(0));

        let err = converter
            .convert(vec![0x89, 0x50, 0x4E, 0x47], Some(&options))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOptions);
    }

    #[tokio::test]
    async fn test_missing_file_is_file_not_found() {
        let encoder = MockEncoder::new();
        let converter = Converter::new(Box::new(encoder.clone()));

        let err = converter.convert("./non-existent.png", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(encoder.get_encode_count(), 0);
    }

    #[tokio::test]
    async fn test_shape_checked_before_options() {
        let converter = Converter::new(Box::new(MockEncoder::new()));
        let options = ConversionOptions::default().with_quality(0);

        let err = converter
            .convert(Blob::new(vec![1]), Some(&options))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_encoder_errors_are_wrapped() {
        let converter = Converter::new(Box::new(MockEncoder::new().with_failure(true)));

        let err = converter.convert(vec![1, 2, 3], None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionFailed);
        assert!(err.to_string().starts_with("Conversion failed"));
        assert_eq!(err.source().unwrap().to_string(), "IO error: Mock failure");
    }

    #[tokio::test]
    async fn test_metrics_and_defaults() {
        let encoder = MockEncoder::new().with_dimensions(10, 20);
        let converter = Converter::with_defaults(
            Box::new(encoder.clone()),
            ConversionOptions::default().with_quality(90),
        );

        let options = ConversionOptions::default().with_method(CompressionMethod::Best);
        let result = converter.convert(vec![0; 200], Some(&options)).await.unwrap();

        assert_eq!(result.original_size, 200);
        assert_eq!(result.converted_size, 100);
        assert_eq!(result.compression_ratio, 0.5);
        assert_eq!((result.width, result.height), (10, 20));
        assert_eq!(result.format, "webp");

        let seen = &encoder.get_seen_options()[0];
        assert_eq!(seen.quality, 90);
        assert_eq!(seen.method, CompressionMethod::Best);
        assert_eq!(
            converter.default_options(),
            ConversionOptions::default().with_quality(90)
        );
    }

    #[tokio::test]
    async fn test_repeat_conversion_is_stable() {
        let converter = Converter::new(Box::new(MockEncoder::new()));
        let first = converter.convert(vec![7; 64], None).await.unwrap();
        let second = converter.convert(vec![7; 64], None).await.unwrap();

        assert_eq!(first.converted_size, second.converted_size);
        assert_eq!((first.width, first.height), (second.width, second.height));
    }

    #[tokio::test]
    async fn test_browser_converter_accepts_blobs_only() {
        let converter = Converter::browser(MockCanvasHost::new().with_source_size(40, 20));
        assert_eq!(converter.runtime(), Runtime::Browser);

        let result = converter
            .convert(Blob::file("a.png", vec![0; 500], "image/png"), None)
            .await
            .unwrap();
        assert_eq!((result.width, result.height), (40, 20));
        assert_eq!(result.original_size, 500);

        let err = converter.convert("a.png", None).await.unwrap_err();
        match err {
            Error::InvalidInput { received_type, .. } => assert_eq!(received_type, "path"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_backend_runtime_decides_accepted_inputs() {
        let encoder = MockEncoder::new().with_runtime(Runtime::Browser);
        let converter = Converter::new(Box::new(encoder.clone()));

        let err = converter.convert(vec![1, 2, 3], None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.to_string(), "Input must be File or Blob in browser");

        converter.convert(Blob::new(vec![1, 2, 3]), None).await.unwrap();
        assert_eq!(encoder.get_encode_count(), 1);
    }

    #[tokio::test]
    async fn test_browser_failures_keep_message() {
        let converter = Converter::browser(MockCanvasHost::new().with_load_failure());

        let err = converter.convert(Blob::new(vec![1]), None).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to load image");
    }
}
