//! Command-line front end
//!
//! Resolves the input file or directory, builds conversion options from
//! flags layered over environment defaults, runs a batch and writes the
//! outputs next to the inputs or into the requested location.

use crate::batch::BatchOptions;
use crate::converter::Converter;
use crate::encoder::NativeEncoder;
use crate::input::{extension, format_bytes, output_file_name};
use crate::models::{
    BatchProgress, CompressionMethod, Config, ConversionOptions, ProgressStatus, ResizeFit,
    ResizeSpec,
};
use crate::validation::detect_format_from_extension;
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Parser)]
#[command(name = "webp-convert", version)]
#[command(about = "Convert images to WebP format")]
pub struct CliArgs {
    /// Input file or directory.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file or directory.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Quality (1-100). Defaults to WEBP_CONVERT_QUALITY or 80.
    #[arg(short, long, value_name = "NUMBER")]
    pub quality: Option<String>,

    /// Enable lossless compression.
    #[arg(short, long)]
    pub lossless: bool,

    /// Process directories recursively.
    #[arg(short, long)]
    pub recursive: bool,

    /// Resize image, e.g. 800x600, 800 or x600.
    #[arg(long, value_name = "WxH")]
    pub resize: Option<String>,

    /// Resize fit mode.
    #[arg(long, value_name = "MODE", default_value = "cover")]
    pub fit: String,

    /// Preserve metadata.
    #[arg(long)]
    pub preserve_metadata: bool,

    /// Compression method: default, fast or best.
    #[arg(long, value_name = "TYPE")]
    pub method: Option<String>,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Show what would be converted.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files: usize,
    pub converted: usize,
    pub failed: usize,
    pub bytes_saved: i64,
}

pub fn parse_quality(input: &str) -> Result<u8> {
    input
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|q| (1..=100).contains(q))
        .ok_or_else(|| anyhow!("Quality must be 1-100"))
}

/// Parse `WxH`, `W`, `Wx` or `xH` into width/height.
pub fn parse_resize(input: &str) -> Result<ResizeSpec> {
    let lower = input.to_lowercase();
    let (w, h) = lower.split_once('x').unwrap_or((lower.as_str(), ""));

    let parse = |part: &str| -> Result<Option<u32>> {
        let part = part.trim();
        if part.is_empty() {
            return Ok(None);
        }
        part.parse::<u32>()
            .map(Some)
            .with_context(|| format!("Invalid resize value '{}'. Expected WxH", input))
    };

    let spec = ResizeSpec {
        width: parse(w)?,
        height: parse(h)?,
        ..ResizeSpec::default()
    };
    if spec.width.is_none() && spec.height.is_none() {
        bail!("Invalid resize value '{}'. Expected WxH", input);
    }
    Ok(spec)
}

/// Image files in `dir` with a supported extension, sorted by name.
pub fn collect_image_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let walker = WalkDir::new(dir).min_depth(1).sort_by_file_name();
    let walker = if recursive { walker } else { walker.max_depth(1) };

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file()
            && detect_format_from_extension(&extension(entry.path())).is_some()
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Where the WebP for `input` goes.
///
/// Without `-o` it sits next to the input. An existing directory, or a
/// path without an extension, is treated as a directory. Anything else is
/// used as the output file itself.
pub fn output_path(input: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        None => {
            let dir = input.parent().unwrap_or_else(|| Path::new(""));
            output_file_name(input, Some(dir))
        }
        Some(out) if out.is_dir() || out.extension().is_none() => {
            output_file_name(input, Some(out))
        }
        Some(out) => out.to_path_buf(),
    }
}

impl CliArgs {
    /// Options given on the command line; unset flags stay `None`.
    pub fn conversion_options(&self) -> Result<ConversionOptions> {
        let quality = self.quality.as_deref().map(parse_quality).transpose()?;
        let method = self
            .method
            .as_deref()
            .map(str::parse::<CompressionMethod>)
            .transpose()?;
        let resize = match &self.resize {
            Some(raw) => {
                let mut spec = parse_resize(raw)?;
                spec.fit = self.fit.parse::<ResizeFit>()?;
                Some(spec)
            }
            None => None,
        };

        let options = ConversionOptions {
            quality,
            lossless: self.lossless.then_some(true),
            resize,
            preserve_metadata: self.preserve_metadata.then_some(true),
            method,
        };
        options.validate()?;
        Ok(options)
    }

    fn input_files(&self) -> Result<Vec<PathBuf>> {
        if !self.input.exists() {
            bail!("Input not found: {}", self.input.display());
        }
        let files = if self.input.is_dir() {
            collect_image_files(&self.input, self.recursive)?
        } else {
            vec![self.input.clone()]
        };
        if files.is_empty() {
            bail!("No image files found");
        }
        Ok(files)
    }
}

/// Console line for a progress event. Pending events only show with `-v`.
pub fn progress_line(progress: &BatchProgress, verbose: bool) -> Option<String> {
    let icon = match progress.status {
        ProgressStatus::Completed => "✅",
        ProgressStatus::Failed => "❌",
        ProgressStatus::Processing => "⏳",
        ProgressStatus::Pending if verbose => "⏳",
        ProgressStatus::Pending => return None,
    };
    Some(format!(
        "{} [{}/{}] {}",
        icon, progress.current, progress.total, progress.identifier
    ))
}

/// Run the CLI with the headless backend and environment defaults.
pub async fn run(args: &CliArgs) -> Result<RunSummary> {
    let config = Config::from_env()?;
    let encoder = NativeEncoder::new()?;
    let converter = Converter::with_defaults(Box::new(encoder), config.defaults());
    execute(&converter, args).await
}

/// Run the CLI against an already-built converter.
pub async fn execute(converter: &Converter, args: &CliArgs) -> Result<RunSummary> {
    let options = args.conversion_options()?;
    let files = args.input_files()?;
    let output = args.output.as_deref();

    if args.dry_run {
        println!("\n📋 Dry run:\n");
        for file in &files {
            println!("  {} → {}", file.display(), output_path(file, output).display());
        }
        return Ok(RunSummary {
            files: files.len(),
            ..RunSummary::default()
        });
    }

    println!("\n🚀 Starting conversion...\n");
    let verbose = args.verbose;
    let batch = BatchOptions::new(options).on_progress(move |p| {
        if let Some(line) = progress_line(p, verbose) {
            println!("{}", line);
        }
    });
    let results = converter.batch_convert(files.clone(), batch).await?;

    let mut summary = RunSummary {
        files: files.len(),
        ..RunSummary::default()
    };
    for (file, item) in files.iter().zip(&results) {
        match item.result() {
            Some(result) => {
                let out = output_path(file, output);
                if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&out, &result.data)
                    .await
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                summary.converted += 1;
                summary.bytes_saved += result.bytes_saved();
            }
            None => summary.failed += 1,
        }
    }

    let saved = u64::try_from(summary.bytes_saved).unwrap_or(0);
    println!("\n📊 Done! Saved: {}", format_bytes(saved));
    if summary.failed > 0 {
        println!("   {} file(s) failed", summary.failed);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::MockEncoder;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn args(input: &Path) -> CliArgs {
        CliArgs::parse_from(["webp-convert", input.to_str().unwrap()])
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!(parse_quality("80").unwrap(), 80);
        assert_eq!(parse_quality("1").unwrap(), 1);
        for bad in ["0", "101", "abc", "-3", ""] {
            let err = parse_quality(bad).unwrap_err();
            assert_eq!(err.to_string(), "Quality must be 1-100");
        }
    }

    #[test]
    fn test_parse_resize() {
        assert_eq!(parse_resize("800x600").unwrap(), ResizeSpec {
            width: Some(800),
            height: Some(600),
            ..ResizeSpec::default()
        });
        assert_eq!(parse_resize("800").unwrap(), ResizeSpec::width(800));
        assert_eq!(parse_resize("X600").unwrap(), ResizeSpec::height(600));
        assert!(parse_resize("x").is_err());
        assert!(parse_resize("axb").is_err());
    }

    #[test]
    fn test_conversion_options_from_flags() {
        let args = CliArgs::parse_from([
            "webp-convert",
            "in.png",
            "-q",
            "70",
            "--resize",
            "100x50",
            "--fit",
            "contain",
            "--method",
            "best",
            "-l",
        ]);
        let options = args.conversion_options().unwrap();

        assert_eq!(options.quality, Some(70));
        assert_eq!(options.lossless, Some(true));
        assert_eq!(options.preserve_metadata, None);
        assert_eq!(options.method, Some(CompressionMethod::Best));
        assert_eq!(options.resize.unwrap().fit, ResizeFit::Contain);
    }

    #[test]
    fn test_invalid_flags_are_errors() {
        let bad_fit = CliArgs::parse_from(["webp-convert", "a.png", "--resize", "10", "--fit", "zoom"]);
        assert!(bad_fit.conversion_options().is_err());

        let bad_method = CliArgs::parse_from(["webp-convert", "a.png", "--method", "turbo"]);
        assert!(bad_method.conversion_options().is_err());

        let zero = CliArgs::parse_from(["webp-convert", "a.png", "--resize", "0x10"]);
        assert!(zero.conversion_options().is_err());
    }

    #[test]
    fn test_collect_image_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.PNG"), b"x").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("png"), b"x").unwrap();
        std::fs::write(dir.path().join("archive.png.bak"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.gif"), b"x").unwrap();

        let flat = collect_image_files(dir.path(), false).unwrap();
        assert_eq!(
            flat,
            vec![dir.path().join("a.jpg"), dir.path().join("b.PNG")]
        );

        let deep = collect_image_files(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 3);
        assert!(deep.contains(&dir.path().join("nested").join("c.gif")));
    }

    #[test]
    fn test_progress_lines() {
        let event = |status| BatchProgress {
            current: 1,
            total: 3,
            identifier: "a.png".to_string(),
            status,
        };

        assert_eq!(
            progress_line(&event(ProgressStatus::Processing), false).as_deref(),
            Some("⏳ [1/3] a.png")
        );
        assert_eq!(
            progress_line(&event(ProgressStatus::Completed), false).as_deref(),
            Some("✅ [1/3] a.png")
        );
        assert_eq!(
            progress_line(&event(ProgressStatus::Failed), false).as_deref(),
            Some("❌ [1/3] a.png")
        );
        assert_eq!(progress_line(&event(ProgressStatus::Pending), false), None);
        assert!(progress_line(&event(ProgressStatus::Pending), true).is_some());
    }

    #[test]
    fn test_output_path() {
        let dir = TempDir::new().unwrap();
        let input = Path::new("photos/cat.png");

        assert_eq!(output_path(input, None), PathBuf::from("photos/cat.webp"));
        assert_eq!(
            output_path(input, Some(dir.path())),
            dir.path().join("cat.webp")
        );
        assert_eq!(
            output_path(input, Some(Path::new("out/converted"))),
            PathBuf::from("out/converted/cat.webp")
        );
        assert_eq!(
            output_path(input, Some(Path::new("final.webp"))),
            PathBuf::from("final.webp")
        );
    }

    #[tokio::test]
    async fn test_missing_input_and_empty_dir() {
        let converter = Converter::new(Box::new(MockEncoder::new()));
        let dir = TempDir::new().unwrap();

        let err = execute(&converter, &args(&dir.path().join("nope.png")))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Input not found"));

        let err = execute(&converter, &args(dir.path())).await.unwrap_err();
        assert_eq!(err.to_string(), "No image files found");
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let encoder = MockEncoder::new();
        let converter = Converter::new(Box::new(encoder.clone()));
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.png"), [0u8; 32]).unwrap();

        let mut cli = args(dir.path());
        cli.dry_run = true;
        let summary = execute(&converter, &cli).await.unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(encoder.get_encode_count(), 0);
        assert!(!dir.path().join("a.webp").exists());
    }

    #[tokio::test]
    async fn test_execute_writes_outputs_and_counts_failures() {
        let converter = Converter::new(Box::new(MockEncoder::new().with_failure_on_call(2)));
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        for name in ["a.png", "b.png", "c.png"] {
            std::fs::write(dir.path().join(name), [0u8; 100]).unwrap();
        }

        let mut cli = args(dir.path());
        cli.output = Some(out.clone());
        let summary = execute(&converter, &cli).await.unwrap();

        assert_eq!(summary, RunSummary {
            files: 3,
            converted: 2,
            failed: 1,
            bytes_saved: 100,
        });
        assert!(out.join("a.webp").exists());
        assert!(!out.join("b.webp").exists());
        assert!(out.join("c.webp").exists());
    }
}
