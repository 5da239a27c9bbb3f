//! Browser-style backend built on a drawing surface
//!
//! The conversion goes through the same steps a page would take: wrap the
//! blob in an object URL, let the host decode it, draw it onto an off-screen
//! surface at the target size and serialize the surface as WebP. The host
//! side is abstracted behind [`CanvasHost`] so the pipeline runs anywhere;
//! [`SoftwareCanvas`] is a host backed by the `image` and `webp` crates.

use super::{EncodedImage, WebpEncoder};
use crate::input::Runtime;
use crate::models::ResolvedOptions;
use crate::resize::plan_canvas;
use crate::{Error, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A decoded image as the host hands it back.
#[derive(Debug, Clone)]
pub struct HostImage {
    pub image: DynamicImage,
}

impl HostImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Pixels drawn onto an off-screen surface.
#[derive(Debug, Clone)]
pub struct Surface {
    pub pixels: RgbaImage,
}

#[async_trait]
pub trait CanvasHost: Send + Sync {
    fn create_object_url(&self, data: Vec<u8>) -> String;

    fn revoke_object_url(&self, url: &str);

    async fn load_image(&self, url: &str) -> Result<HostImage>;

    /// `None` when no 2D context can be obtained.
    fn draw(&self, image: &HostImage, width: u32, height: u32) -> Option<Surface>;

    /// `None` when the surface cannot be serialized. `quality` is in 0..=1.
    async fn to_webp(&self, surface: &Surface, quality: f32) -> Option<Vec<u8>>;
}

/// Object URL that is revoked when dropped, on every exit path.
struct ObjectUrl<'a, H: CanvasHost + ?Sized> {
    host: &'a H,
    url: String,
}

impl<'a, H: CanvasHost + ?Sized> ObjectUrl<'a, H> {
    fn create(host: &'a H, data: Vec<u8>) -> Self {
        let url = host.create_object_url(data);
        Self { host, url }
    }

    fn as_str(&self) -> &str {
        &self.url
    }
}

impl<H: CanvasHost + ?Sized> Drop for ObjectUrl<'_, H> {
    fn drop(&mut self) {
        self.host.revoke_object_url(&self.url);
    }
}

pub struct CanvasEncoder<H> {
    host: H,
}

impl<H: CanvasHost> CanvasEncoder<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }
}

#[async_trait]
impl<H: CanvasHost> WebpEncoder for CanvasEncoder<H> {
    fn runtime(&self) -> Runtime {
        Runtime::Browser
    }

    async fn encode(&self, data: Vec<u8>, options: &ResolvedOptions) -> Result<EncodedImage> {
        let url = ObjectUrl::create(&self.host, data);
        let image = self
            .host
            .load_image(url.as_str())
            .await
            .map_err(|e| Error::conversion_with_source("Failed to load image", e))?;
        // The decoded image no longer needs the URL.
        drop(url);

        let (width, height) = plan_canvas(image.width(), image.height(), options.resize.as_ref());
        tracing::debug!(
            "Drawing {}x{} source onto {}x{} surface",
            image.width(),
            image.height(),
            width,
            height
        );

        let surface = self
            .host
            .draw(&image, width, height)
            .ok_or_else(|| Error::conversion("Failed to get canvas context"))?;

        let data = self
            .host
            .to_webp(&surface, f32::from(options.quality) / 100.0)
            .await
            .ok_or_else(|| Error::conversion("Failed to convert to WebP"))?;

        Ok(EncodedImage {
            data,
            width,
            height,
        })
    }
}

/// Host implemented in software, with an in-memory object URL registry.
#[derive(Clone, Default)]
pub struct SoftwareCanvas {
    urls: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl SoftwareCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Object URLs created and not yet revoked.
    pub fn live_urls(&self) -> usize {
        self.urls.lock().map(|urls| urls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CanvasHost for SoftwareCanvas {
    fn create_object_url(&self, data: Vec<u8>) -> String {
        let url = format!("blob:{}", Uuid::new_v4());
        if let Ok(mut urls) = self.urls.lock() {
            urls.insert(url.clone(), data);
        }
        url
    }

    fn revoke_object_url(&self, url: &str) {
        if let Ok(mut urls) = self.urls.lock() {
            urls.remove(url);
        }
    }

    async fn load_image(&self, url: &str) -> Result<HostImage> {
        let data = self
            .urls
            .lock()
            .ok()
            .and_then(|urls| urls.get(url).cloned())
            .ok_or_else(|| Error::conversion(format!("No blob registered for {}", url)))?;

        tokio::task::spawn_blocking(move || image::load_from_memory(&data))
            .await
            .map_err(|e| Error::conversion_with_source("Image decoding task join error", e))?
            .map(|image| HostImage { image })
            .map_err(|e| Error::conversion_with_source(e.to_string(), e))
    }

    fn draw(&self, image: &HostImage, width: u32, height: u32) -> Option<Surface> {
        if width == 0 || height == 0 {
            return None;
        }
        let pixels = if (image.width(), image.height()) == (width, height) {
            image.image.to_rgba8()
        } else {
            image
                .image
                .resize_exact(width, height, FilterType::Triangle)
                .to_rgba8()
        };
        Some(Surface { pixels })
    }

    async fn to_webp(&self, surface: &Surface, quality: f32) -> Option<Vec<u8>> {
        let pixels = surface.pixels.clone();
        let quality = (quality * 100.0).clamp(0.0, 100.0);

        tokio::task::spawn_blocking(move || {
            let encoder = webp::Encoder::from_rgba(pixels.as_raw(), pixels.width(), pixels.height());
            encoder.encode(quality).to_vec()
        })
        .await
        .ok()
    }
}

/// Scripted host that records object URL traffic.
#[derive(Clone)]
pub struct MockCanvasHost {
    source_size: (u32, u32),
    fail_load: bool,
    fail_context: bool,
    fail_encode: bool,
    created: Arc<Mutex<Vec<String>>>,
    revoked: Arc<Mutex<Vec<String>>>,
    qualities: Arc<Mutex<Vec<f32>>>,
}

impl MockCanvasHost {
    pub fn new() -> Self {
        Self {
            source_size: (100, 50),
            fail_load: false,
            fail_context: false,
            fail_encode: false,
            created: Arc::new(Mutex::new(Vec::new())),
            revoked: Arc::new(Mutex::new(Vec::new())),
            qualities: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_source_size(mut self, width: u32, height: u32) -> Self {
        self.source_size = (width, height);
        self
    }

    pub fn with_load_failure(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn with_context_failure(mut self) -> Self {
        self.fail_context = true;
        self
    }

    pub fn with_encode_failure(mut self) -> Self {
        self.fail_encode = true;
        self
    }

    pub fn get_created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn get_revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }

    pub fn get_qualities(&self) -> Vec<f32> {
        self.qualities.lock().unwrap().clone()
    }
}

impl Default for MockCanvasHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CanvasHost for MockCanvasHost {
    fn create_object_url(&self, _data: Vec<u8>) -> String {
        let mut created = self.created.lock().unwrap();
        let url = format!("blob:mock-{}", created.len());
        created.push(url.clone());
        url
    }

    fn revoke_object_url(&self, url: &str) {
        self.revoked.lock().unwrap().push(url.to_string());
    }

    async fn load_image(&self, _url: &str) -> Result<HostImage> {
        if self.fail_load {
            return Err(Error::conversion("Mock decode failure"));
        }
        let (width, height) = self.source_size;
        Ok(HostImage {
            image: DynamicImage::new_rgba8(width, height),
        })
    }

    fn draw(&self, _image: &HostImage, width: u32, height: u32) -> Option<Surface> {
        if self.fail_context {
            return None;
        }
        Some(Surface {
            pixels: RgbaImage::new(width, height),
        })
    }

    async fn to_webp(&self, surface: &Surface, quality: f32) -> Option<Vec<u8>> {
        self.qualities.lock().unwrap().push(quality);
        if self.fail_encode {
            return None;
        }
        let len = (surface.pixels.width() * surface.pixels.height() / 10).max(1);
        Some(vec![0u8; len as usize])
    }
}
