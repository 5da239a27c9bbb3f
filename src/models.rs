//! Data models and structures
//!
//! Defines conversion options, inputs, results and the batch progress
//! types shared by both runtime backends, plus environment configuration.

use crate::sniff::ImageFormat;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_QUALITY: u8 = 80;
pub const QUALITY_MIN: u8 = 1;
pub const QUALITY_MAX: u8 = 100;
/// Largest width or height libwebp can encode.
pub const MAX_DIMENSION: u32 = 16383;

/// Policy for reconciling the source aspect ratio with a requested box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFit {
    #[default]
    Cover,
    Contain,
    Fill,
    Inside,
    Outside,
}

impl ResizeFit {
    pub const ALL: [ResizeFit; 5] = [
        ResizeFit::Cover,
        ResizeFit::Contain,
        ResizeFit::Fill,
        ResizeFit::Inside,
        ResizeFit::Outside,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeFit::Cover => "cover",
            ResizeFit::Contain => "contain",
            ResizeFit::Fill => "fill",
            ResizeFit::Inside => "inside",
            ResizeFit::Outside => "outside",
        }
    }
}

impl fmt::Display for ResizeFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResizeFit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|fit| fit.as_str() == s)
            .ok_or_else(|| Error::invalid_options("resize.fit", s, expected_one_of(&Self::ALL)))
    }
}

/// Coarse encoder speed/quality trade-off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    #[default]
    Default,
    Fast,
    Best,
}

impl CompressionMethod {
    pub const ALL: [CompressionMethod; 3] = [
        CompressionMethod::Default,
        CompressionMethod::Fast,
        CompressionMethod::Best,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionMethod::Default => "default",
            CompressionMethod::Fast => "fast",
            CompressionMethod::Best => "best",
        }
    }

    /// libwebp effort level (0 = fastest, 6 = slowest).
    pub fn effort(&self) -> i32 {
        match self {
            CompressionMethod::Fast => 1,
            CompressionMethod::Default => 4,
            CompressionMethod::Best => 6,
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| Error::invalid_options("method", s, expected_one_of(&Self::ALL)))
    }
}

pub(crate) fn expected_one_of<T: fmt::Display>(values: &[T]) -> String {
    let names: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("one of: {}", names.join(", "))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub fit: ResizeFit,
    #[serde(default)]
    pub allow_upscale: bool,
}

impl ResizeSpec {
    pub fn width(width: u32) -> Self {
        Self {
            width: Some(width),
            ..Self::default()
        }
    }

    pub fn height(height: u32) -> Self {
        Self {
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn exact(width: u32, height: u32, fit: ResizeFit) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            fit,
            allow_upscale: false,
        }
    }

    pub fn with_upscale(mut self, allow_upscale: bool) -> Self {
        self.allow_upscale = allow_upscale;
        self
    }
}

/// Per-call conversion options. Absent fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lossless: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize: Option<ResizeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_metadata: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<CompressionMethod>,
}

impl ConversionOptions {
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_lossless(mut self, lossless: bool) -> Self {
        self.lossless = Some(lossless);
        self
    }

    pub fn with_resize(mut self, resize: ResizeSpec) -> Self {
        self.resize = Some(resize);
        self
    }

    pub fn with_preserve_metadata(mut self, preserve: bool) -> Self {
        self.preserve_metadata = Some(preserve);
        self
    }

    pub fn with_method(mut self, method: CompressionMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Field-wise merge where values set on `self` win over `base`.
    pub fn merged_over(&self, base: &ConversionOptions) -> ConversionOptions {
        ConversionOptions {
            quality: self.quality.or(base.quality),
            lossless: self.lossless.or(base.lossless),
            resize: self.resize.clone().or_else(|| base.resize.clone()),
            preserve_metadata: self.preserve_metadata.or(base.preserve_metadata),
            method: self.method.or(base.method),
        }
    }

    /// Apply built-in defaults to every absent field.
    pub fn resolve(&self) -> ResolvedOptions {
        ResolvedOptions {
            quality: self.quality.unwrap_or(DEFAULT_QUALITY),
            lossless: self.lossless.unwrap_or(false),
            resize: self.resize.clone(),
            preserve_metadata: self.preserve_metadata.unwrap_or(false),
            method: self.method.unwrap_or_default(),
        }
    }
}

/// Options with every default applied; what encoders actually receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub quality: u8,
    pub lossless: bool,
    pub resize: Option<ResizeSpec>,
    pub preserve_metadata: bool,
    pub method: CompressionMethod,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        ConversionOptions::default().resolve()
    }
}

/// An in-memory image handed over by a browser host, optionally named (a File).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub mime_type: Option<String>,
    pub name: Option<String>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn file(name: impl Into<String>, data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: Some(mime_type.into()),
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    Path(PathBuf),
    Buffer(Vec<u8>),
    Blob(Blob),
}

impl ImageInput {
    /// Shape name reported in `InvalidInput` errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            ImageInput::Path(_) => "path",
            ImageInput::Buffer(_) => "buffer",
            ImageInput::Blob(blob) if blob.name.is_some() => "file",
            ImageInput::Blob(_) => "blob",
        }
    }

    /// Identifier used in batch progress: the path itself, or `buffer-<index>`.
    pub fn identifier(&self, index: usize) -> String {
        match self {
            ImageInput::Path(path) => path.display().to_string(),
            _ => format!("buffer-{}", index),
        }
    }
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        ImageInput::Path(path)
    }
}

impl From<&Path> for ImageInput {
    fn from(path: &Path) -> Self {
        ImageInput::Path(path.to_path_buf())
    }
}

impl From<&str> for ImageInput {
    fn from(path: &str) -> Self {
        ImageInput::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        ImageInput::Buffer(bytes)
    }
}

impl From<Blob> for ImageInput {
    fn from(blob: Blob) -> Self {
        ImageInput::Blob(blob)
    }
}

pub const OUTPUT_FORMAT: &str = "webp";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub original_size: usize,
    pub converted_size: usize,
    pub compression_ratio: f64,
    pub width: u32,
    pub height: u32,
    pub format: &'static str,
}

impl ConversionResult {
    pub fn new(data: Vec<u8>, original_size: usize, width: u32, height: u32) -> Self {
        let converted_size = data.len();
        Self {
            data,
            original_size,
            converted_size,
            compression_ratio: 1.0 - converted_size as f64 / original_size as f64,
            width,
            height,
            format: OUTPUT_FORMAT,
        }
    }

    /// Bytes saved relative to the input; negative when the output grew.
    pub fn bytes_saved(&self) -> i64 {
        self.original_size as i64 - self.converted_size as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
    pub identifier: String,
    pub status: ProgressStatus,
}

/// Outcome of one batch entry. Success and payload, or failure and cause.
#[derive(Debug)]
pub struct BatchItem {
    pub identifier: String,
    pub outcome: Result<ConversionResult>,
}

impl BatchItem {
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn result(&self) -> Option<&ConversionResult> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&Error> {
        self.outcome.as_ref().err()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub size: usize,
    pub has_alpha: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ImageMetadata>,
}

impl ValidationResult {
    pub fn valid(metadata: Option<ImageMetadata>) -> Self {
        Self {
            valid: true,
            error: None,
            metadata,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            metadata: None,
        }
    }
}

// Configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub quality: Option<u8>,
    pub method: Option<CompressionMethod>,
    pub lossless: Option<bool>,
    pub preserve_metadata: Option<bool>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut raw = serde_json::Map::new();

        if let Some(quality) = lookup("WEBP_CONVERT_QUALITY") {
            let value = quality
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::String(quality));
            raw.insert("quality".to_string(), value);
        }
        if let Some(method) = lookup("WEBP_CONVERT_METHOD") {
            raw.insert("method".to_string(), serde_json::Value::String(method));
        }
        if let Some(lossless) = lookup("WEBP_CONVERT_LOSSLESS") {
            raw.insert("lossless".to_string(), parse_env_bool(lossless));
        }
        if let Some(preserve) = lookup("WEBP_CONVERT_PRESERVE_METADATA") {
            raw.insert("preserveMetadata".to_string(), parse_env_bool(preserve));
        }

        let options = ConversionOptions::from_value(&serde_json::Value::Object(raw))?;

        Ok(Self {
            quality: options.quality,
            method: options.method,
            lossless: options.lossless,
            preserve_metadata: options.preserve_metadata,
        })
    }

    pub fn defaults(&self) -> ConversionOptions {
        ConversionOptions {
            quality: self.quality,
            lossless: self.lossless,
            resize: None,
            preserve_metadata: self.preserve_metadata,
            method: self.method,
        }
    }
}

fn parse_env_bool(raw: String) -> serde_json::Value {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => serde_json::Value::Bool(true),
        "0" | "false" | "no" | "off" => serde_json::Value::Bool(false),
        _ => serde_json::Value::String(raw),
    }
}
