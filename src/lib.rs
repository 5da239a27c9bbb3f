//! Image to WebP conversion
//!
//! Converts PNG, JPEG, GIF, BMP, TIFF and WebP inputs to WebP, one at a
//! time or in ordered batches with progress reporting. Encoding is delegated
//! to a backend chosen at construction: libwebp for headless use, or a
//! drawing-surface pipeline that mirrors what a browser canvas does.

pub mod batch;
pub mod cli;
pub mod converter;
pub mod encoder;
pub mod error;
pub mod input;
pub mod models;
pub mod resize;
pub mod sniff;
pub mod validation;

pub use batch::{batch_convert, BatchOptions};
pub use converter::{convert_to_webp, Converter};
pub use error::{Error, ErrorKind, Result};
pub use input::format_bytes;
pub use models::{
    BatchItem, BatchProgress, Blob, CompressionMethod, ConversionOptions, ConversionResult,
    ImageInput, ProgressStatus, ResizeFit, ResizeSpec,
};
pub use sniff::{detect_format, validate_image, ImageFormat};
pub use validation::SUPPORTED_FORMATS;
