//! Filesystem helpers and input normalization
//!
//! Resolves the different input shapes into a single byte payload and
//! provides the small path utilities the CLI relies on.

use crate::models::ImageInput;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Which runtime a backend emulates. Determines the input shapes it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    /// Native codec; accepts file paths and byte buffers.
    Headless,
    /// Canvas rasterization; accepts blobs and files.
    Browser,
}

pub fn file_exists(path: &Path) -> bool {
    path.exists()
}

pub fn file_size(path: &Path) -> Result<u64> {
    if !file_exists(path) {
        return Err(Error::file_not_found(path));
    }
    Ok(std::fs::metadata(path)?.len())
}

/// Lowercase extension without the leading dot, or an empty string.
pub fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn to_absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

pub async fn read_file_as_buffer(path: &Path) -> Result<Vec<u8>> {
    let absolute = to_absolute_path(path)?;
    match tokio::fs::read(&absolute).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::file_not_found(absolute)),
        Err(e) => Err(e.into()),
    }
}

/// Fail with `InvalidInput` unless `runtime` accepts this input shape.
pub fn ensure_accepted(input: &ImageInput, runtime: Runtime) -> Result<()> {
    match (runtime, input) {
        (Runtime::Headless, ImageInput::Path(_) | ImageInput::Buffer(_)) => Ok(()),
        (Runtime::Browser, ImageInput::Blob(_)) => Ok(()),
        (Runtime::Headless, other) => Err(Error::invalid_input(
            "Input must be a file path or byte buffer",
            other.type_name(),
        )),
        (Runtime::Browser, other) => Err(Error::invalid_input(
            "Input must be File or Blob in browser",
            other.type_name(),
        )),
    }
}

/// Turn `input` into bytes, rejecting shapes the `runtime` does not accept.
pub async fn normalize_input(input: ImageInput, runtime: Runtime) -> Result<Vec<u8>> {
    ensure_accepted(&input, runtime)?;
    read_input_bytes(input).await
}

/// Read any input shape; used by validation, which runs on either runtime.
pub async fn read_input_bytes(input: ImageInput) -> Result<Vec<u8>> {
    match input {
        ImageInput::Path(path) => read_file_as_buffer(&path).await,
        ImageInput::Buffer(bytes) => Ok(bytes),
        ImageInput::Blob(blob) => Ok(blob.data),
    }
}

/// `<stem>.webp`, placed in `output_dir` when given.
pub fn output_file_name(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = format!("{}.webp", stem);
    match output_dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Human-readable byte count using 1024-based units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Blob;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_normalize_buffer_passes_through() {
        let bytes = normalize_input(ImageInput::Buffer(vec![1, 2, 3]), Runtime::Headless)
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_normalize_reads_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("img.png");
        std::fs::write(&path, b"pixels").unwrap();

        let bytes = normalize_input(ImageInput::Path(path), Runtime::Headless)
            .await
            .unwrap();
        assert_eq!(bytes, b"pixels");
    }

    #[tokio::test]
    async fn test_normalize_missing_path_is_file_not_found() {
        let err = normalize_input(ImageInput::from("./non-existent.png"), Runtime::Headless)
            .await
            .unwrap_err();
        match err {
            Error::FileNotFound { path } => {
                assert!(path.is_absolute());
                assert!(path.ends_with("non-existent.png"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_normalize_rejects_wrong_shape_per_runtime() {
        let err = normalize_input(ImageInput::Blob(Blob::new(vec![1])), Runtime::Headless)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let err = normalize_input(ImageInput::Buffer(vec![1]), Runtime::Browser)
            .await
            .unwrap_err();
        match err {
            Error::InvalidInput { received_type, .. } => assert_eq!(received_type, "buffer"),
            other => panic!("unexpected error: {other:?}"),
        }

        let bytes = normalize_input(ImageInput::Blob(Blob::new(vec![9])), Runtime::Browser)
            .await
            .unwrap();
        assert_eq!(bytes, vec![9]);
    }

    #[test]
    fn test_file_size_and_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Photo.JPG");
        std::fs::write(&path, [0u8; 10]).unwrap();

        assert_eq!(file_size(&path).unwrap(), 10);
        assert_eq!(extension(&path), "jpg");
        assert_eq!(extension(Path::new("noext")), "");
        assert_eq!(
            file_size(&dir.path().join("missing")).unwrap_err().code(),
            "FILE_NOT_FOUND"
        );
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(Path::new("a/b/photo.png"), None),
            PathBuf::from("photo.webp")
        );
        assert_eq!(
            output_file_name(Path::new("photo.tar.png"), Some(Path::new("out"))),
            PathBuf::from("out/photo.tar.webp")
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(500), "500 Bytes");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024 * 3), "3 MB");
        assert_eq!(format_bytes(1024u64.pow(4)), "1024 GB");
    }
}
