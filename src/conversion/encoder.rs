//! Codec plugins and the batch encoder that drives them.
//!
//! A plugin turns the bytes of one source file into the bytes of the target
//! format. The batch encoder fans a list of sources out over a worker pool and
//! writes each result into the destination directory under the *source* file
//! name, so `photo.jpg` becomes `output/photo.jpg` holding WebP data. Fixing the
//! extension is the renamer's job.

use anyhow::{Context, Result};
use console::style;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use super::{ConversionJob, EncoderOptions};
use crate::utils::{
    build_worker_pool, create_progress_bar, display_name, validate_range, verbose_println,
};

/// Converts the bytes of a single image
pub trait EncoderPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-line description of the configured options
    fn describe(&self) -> String;

    fn encode(&self, input: &[u8]) -> Result<PluginOutput>;
}

/// Encoded bytes plus an optional verbose detail line
#[derive(Debug, Clone, Default)]
pub struct PluginOutput {
    pub data: Vec<u8>,
    pub note: Option<String>,
}

impl From<Vec<u8>> for PluginOutput {
    fn from(data: Vec<u8>) -> Self {
        Self { data, note: None }
    }
}

/// Output of the batch encoder for one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFile {
    pub source_path: PathBuf,
    /// Where the encoder wrote the data, still carrying the source extension
    pub destination_path: PathBuf,
}

/// Converts a whole set of files into a destination directory
pub trait BatchEncoder: Send + Sync {
    fn name(&self) -> String;

    fn convert(&self, sources: &[PathBuf], destination: &Path) -> Result<Vec<EncodedFile>>;
}

/// Lossy WebP encoding of JPEG and PNG sources
#[derive(Debug, Clone)]
pub struct WebpPlugin {
    pub quality: f32,
    pub method: u8,
    pub alpha_quality: u8,
}

impl WebpPlugin {
    fn config(&self) -> webpx::EncoderConfig {
        webpx::EncoderConfig::new()
            .quality(self.quality)
            .method(self.method)
            .alpha_quality(self.alpha_quality)
    }

    fn validate(&self) -> Result<()> {
        validate_range("Quality", self.quality, 0.0, 100.0)?;
        validate_range("Method", self.method, 0, 6)?;
        validate_range("Alpha quality", self.alpha_quality, 0, 100)?;
        self.config()
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid WebP encoder configuration: {:?}", e))
    }
}

impl EncoderPlugin for WebpPlugin {
    fn name(&self) -> &'static str {
        "webp"
    }

    fn describe(&self) -> String {
        format!(
            "quality={} method={} alpha_quality={}",
            self.quality, self.method, self.alpha_quality
        )
    }

    fn encode(&self, input: &[u8]) -> Result<PluginOutput> {
        let img = image::load_from_memory(input).context("Failed to decode source image")?;
        let (width, height) = (img.width(), img.height());
        let config = self.config();

        let encoded = if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            config.encode_rgba(rgba.as_raw(), width, height, webpx::Unstoppable)
        } else {
            let rgb = img.to_rgb8();
            config.encode_rgb(rgb.as_raw(), width, height, webpx::Unstoppable)
        };

        encoded
            .map(PluginOutput::from)
            .map_err(|e| anyhow::anyhow!("WebP encoding failed: {:?}", e))
    }
}

/// Lossless PNG output for WebP sources, squeezed with oxipng
#[derive(Debug, Clone)]
pub struct PngPlugin {
    pub strategy: u8,
    pub verbose: bool,
}

impl PngPlugin {
    /// Map the 0 (most aggressive) .. 4 (fastest) strategy scale onto oxipng presets
    pub fn oxipng_preset(&self) -> u8 {
        match self.strategy {
            0 => 6,
            1 => 4,
            2 => 2,
            3 => 1,
            _ => 0,
        }
    }

    fn validate(&self) -> Result<()> {
        validate_range("Strategy", self.strategy, 0, 4)
    }
}

impl EncoderPlugin for PngPlugin {
    fn name(&self) -> &'static str {
        "png"
    }

    fn describe(&self) -> String {
        format!(
            "strategy={} (oxipng preset {})",
            self.strategy,
            self.oxipng_preset()
        )
    }

    fn encode(&self, input: &[u8]) -> Result<PluginOutput> {
        let (pixels, width, height) = webpx::decode_rgba(input)
            .map_err(|e| anyhow::anyhow!("Failed to decode WebP data: {:?}", e))?;

        let mut png = Vec::new();
        PngEncoder::new_with_quality(&mut png, CompressionType::Best, FilterType::Adaptive)
            .write_image(&pixels, width, height, ExtendedColorType::Rgba8)
            .context("Failed to write PNG data")?;

        let options = oxipng::Options::from_preset(self.oxipng_preset());
        let optimized = oxipng::optimize_from_memory(&png, &options)
            .map_err(|e| anyhow::anyhow!("PNG optimization failed: {}", e))?;

        let note = self.verbose.then(|| {
            format!(
                "oxipng: {} -> {} bytes ({}x{})",
                png.len(),
                optimized.len(),
                width,
                height
            )
        });
        let data = if optimized.len() < png.len() {
            optimized
        } else {
            png
        };

        Ok(PluginOutput { data, note })
    }
}

/// Runs a plugin over every source on a dedicated worker pool
pub struct ParallelBatchEncoder {
    plugin: Box<dyn EncoderPlugin>,
    jobs: usize,
}

impl ParallelBatchEncoder {
    pub fn new(plugin: Box<dyn EncoderPlugin>, jobs: usize) -> Self {
        Self { plugin, jobs }
    }

    fn encode_one(
        &self,
        source: &Path,
        destination: &Path,
        progress: &ProgressBar,
    ) -> Result<EncodedFile> {
        let file_name = source
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Source has no file name: {}", source.display()))?;

        let input = fs::read(source)
            .with_context(|| format!("Failed to read {}", source.display()))?;
        let output = self
            .plugin
            .encode(&input)
            .with_context(|| format!("Failed to convert {}", source.display()))?;

        let destination_path = destination.join(file_name);
        if let Some(note) = &output.note {
            progress.println(format!("{} {}", style("[VERBOSE]").dim(), note));
        }
        fs::write(&destination_path, &output.data)
            .with_context(|| format!("Failed to write {}", destination_path.display()))?;

        Ok(EncodedFile {
            source_path: source.to_path_buf(),
            destination_path,
        })
    }
}

impl BatchEncoder for ParallelBatchEncoder {
    fn name(&self) -> String {
        format!("{} ({})", self.plugin.name(), self.plugin.describe())
    }

    fn convert(&self, sources: &[PathBuf], destination: &Path) -> Result<Vec<EncodedFile>> {
        let pool = build_worker_pool(self.jobs)?;

        let progress = create_progress_bar(sources.len() as u64);
        progress.set_message("Converting");

        let results: Result<Vec<EncodedFile>> = pool.install(|| {
            sources
                .par_iter()
                .map(|source| {
                    progress.set_message(display_name(source));
                    let result = self.encode_one(source, destination, &progress);
                    progress.inc(1);
                    result
                })
                .collect()
        });

        match &results {
            Ok(files) => progress.finish_with_message(format!("✓ Converted {} files", files.len())),
            Err(_) => progress.abandon_with_message("✗ Conversion stopped"),
        }
        results
    }
}

/// Build the encoder for a job, validating its options once up front
pub fn resolve_encoder(job: &ConversionJob) -> Result<Box<dyn BatchEncoder>> {
    let plugin: Box<dyn EncoderPlugin> = match &job.encoder {
        EncoderOptions::Webp {
            quality,
            method,
            alpha_quality,
        } => {
            let plugin = WebpPlugin {
                quality: *quality,
                method: *method,
                alpha_quality: *alpha_quality,
            };
            plugin.validate()?;
            Box::new(plugin)
        }
        EncoderOptions::Png { strategy, verbose } => {
            let plugin = PngPlugin {
                strategy: *strategy,
                verbose: *verbose,
            };
            plugin.validate()?;
            Box::new(plugin)
        }
    };

    let (major, minor, patch) = webpx::version();
    verbose_println(
        job.verbose,
        &format!(
            "Using: {} encoder, {} (libwebp {}.{}.{})",
            plugin.name(),
            plugin.describe(),
            major,
            minor,
            patch
        ),
    );

    Ok(Box::new(ParallelBatchEncoder::new(plugin, job.jobs)))
}
