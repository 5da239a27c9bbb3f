//! Conversion option validation
//!
//! Options can arrive typed ([`ConversionOptions`]) or untyped (a JSON
//! document, environment variables). Both paths raise
//! [`Error::InvalidOptions`] naming the offending field, the received value
//! and what was expected. The first violation encountered is reported.

use crate::models::{
    expected_one_of, CompressionMethod, ConversionOptions, ResizeFit, ResizeSpec, MAX_DIMENSION,
    QUALITY_MAX, QUALITY_MIN,
};
use crate::{Error, Result};
use serde_json::{Map, Value};

/// Input file extensions accepted for conversion.
pub const SUPPORTED_FORMATS: [&str; 7] = ["jpeg", "jpg", "png", "gif", "bmp", "tiff", "webp"];

fn range_description() -> String {
    format!("number between {} and {}", QUALITY_MIN, QUALITY_MAX)
}

fn dimension_limit() -> String {
    format!("positive number up to {}", MAX_DIMENSION)
}

fn integer_description() -> String {
    format!("integer between {} and {}", QUALITY_MIN, QUALITY_MAX)
}

/// Validate a quality value of unknown type.
pub fn validate_quality(quality: &Value) -> Result<()> {
    let Some(number) = quality.as_f64() else {
        return Err(Error::invalid_options("quality", quality.clone(), "number"));
    };
    if number.fract() != 0.0 {
        return Err(Error::invalid_options(
            "quality",
            quality.clone(),
            integer_description(),
        ));
    }
    if number < f64::from(QUALITY_MIN) || number > f64::from(QUALITY_MAX) {
        return Err(Error::invalid_options(
            "quality",
            quality.clone(),
            range_description(),
        ));
    }
    Ok(())
}

fn validate_dimension(field: &str, value: Option<&Value>) -> Result<()> {
    match value {
        None => Ok(()),
        Some(v) => match v.as_f64() {
            Some(n) if n > 0.0 && n.round() <= f64::from(MAX_DIMENSION) => Ok(()),
            Some(n) if n > 0.0 => Err(Error::invalid_options(
                field,
                v.clone(),
                dimension_limit(),
            )),
            _ => Err(Error::invalid_options(field, v.clone(), "positive number")),
        },
    }
}

fn validate_enum<T: std::fmt::Display>(field: &str, value: Option<&Value>, allowed: &[T]) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    let matches = value
        .as_str()
        .is_some_and(|s| allowed.iter().any(|a| a.to_string() == s));
    if matches {
        Ok(())
    } else {
        Err(Error::invalid_options(field, value.clone(), expected_one_of(allowed)))
    }
}

fn validate_bool(field: &str, value: Option<&Value>) -> Result<()> {
    match value {
        Some(v) if !v.is_boolean() => Err(Error::invalid_options(field, v.clone(), "boolean")),
        _ => Ok(()),
    }
}

/// Validate a resize spec of unknown shape.
pub fn validate_resize_options(resize: &Value) -> Result<()> {
    let Some(fields) = resize.as_object() else {
        return Err(Error::invalid_options("resize", resize.clone(), "object"));
    };

    validate_dimension("resize.width", present(fields, "width"))?;
    validate_dimension("resize.height", present(fields, "height"))?;
    validate_enum("resize.fit", present(fields, "fit"), &ResizeFit::ALL)?;
    validate_bool("resize.allowUpscale", present(fields, "allowUpscale"))?;
    Ok(())
}

// `null` counts as absent, matching an omitted key.
fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

/// Validate an untyped options document. `null` means "no options".
pub fn validate_options(options: &Value) -> Result<()> {
    if options.is_null() {
        return Ok(());
    }
    let Some(fields) = options.as_object() else {
        return Err(Error::invalid_options("options", options.clone(), "object"));
    };

    if let Some(quality) = present(fields, "quality") {
        validate_quality(quality)?;
    }
    validate_bool("lossless", present(fields, "lossless"))?;
    if let Some(resize) = present(fields, "resize") {
        validate_resize_options(resize)?;
    }
    validate_bool("preserveMetadata", present(fields, "preserveMetadata"))?;
    validate_enum("method", present(fields, "method"), &CompressionMethod::ALL)?;
    Ok(())
}

fn dimension(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(Value::as_f64)
        .map(|n| (n.round() as u32).max(1))
}

impl ConversionOptions {
    /// Validate an untyped document and build typed options from it.
    ///
    /// Fractional resize dimensions are rounded to the nearest pixel.
    pub fn from_value(options: &Value) -> Result<Self> {
        validate_options(options)?;
        let Some(fields) = options.as_object() else {
            return Ok(Self::default());
        };

        let resize = present(fields, "resize").and_then(Value::as_object).map(|r| ResizeSpec {
            width: dimension(present(r, "width")),
            height: dimension(present(r, "height")),
            fit: present(r, "fit")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            allow_upscale: present(r, "allowUpscale")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        });

        Ok(Self {
            quality: present(fields, "quality")
                .and_then(Value::as_f64)
                .map(|q| q as u8),
            lossless: present(fields, "lossless").and_then(Value::as_bool),
            resize,
            preserve_metadata: present(fields, "preserveMetadata").and_then(Value::as_bool),
            method: present(fields, "method")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
        })
    }

    /// Check the constraints the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        if let Some(quality) = self.quality {
            if !(QUALITY_MIN..=QUALITY_MAX).contains(&quality) {
                return Err(Error::invalid_options(
                    "quality",
                    quality,
                    range_description(),
                ));
            }
        }
        if let Some(resize) = &self.resize {
            let dimensions = [("resize.width", resize.width), ("resize.height", resize.height)];
            for (field, value) in dimensions {
                match value {
                    Some(0) => return Err(Error::invalid_options(field, 0, "positive number")),
                    Some(n) if n > MAX_DIMENSION => {
                        return Err(Error::invalid_options(field, n, dimension_limit()))
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

/// Look up a supported format from a file name's extension, case-insensitively.
pub fn detect_format_from_extension(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit('.').next()?.to_ascii_lowercase();
    SUPPORTED_FORMATS.iter().copied().find(|f| *f == ext)
}
