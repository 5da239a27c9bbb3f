//! WebP encoding backends
//!
//! The converter never encodes pixels itself. It hands the normalized bytes
//! to a [`WebpEncoder`] chosen when the converter is built: the native
//! libwebp backend for headless use, or the canvas backend that mirrors a
//! browser drawing surface.

pub mod canvas;
pub mod mock;
pub mod native;

pub use canvas::{CanvasEncoder, CanvasHost, HostImage, MockCanvasHost, SoftwareCanvas, Surface};
pub use mock::MockEncoder;
pub use native::NativeEncoder;

use crate::input::Runtime;
use crate::models::ResolvedOptions;
use crate::Result;
use async_trait::async_trait;

/// Encoded output plus its pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait WebpEncoder: Send + Sync {
    /// Runtime this backend belongs to; decides which inputs are accepted.
    fn runtime(&self) -> Runtime;

    /// Decode `data`, apply the resize policy and encode as WebP.
    async fn encode(&self, data: Vec<u8>, options: &ResolvedOptions) -> Result<EncodedImage>;
}
