use anyhow::Result;
use clap::{Args, Parser};
use std::path::PathBuf;

use crate::conversion::{ConversionJob, EncoderOptions, PipelineKind};
use crate::utils::{validate_jobs, validate_range};

pub const DEFAULT_QUALITY: f32 = 75.0;
pub const DEFAULT_METHOD: u8 = 6;
pub const DEFAULT_ALPHA_QUALITY: u8 = 75;
pub const DEFAULT_STRATEGY: u8 = 0;

/// Options shared by both converters
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Input directory (defaults to the converter's stock folder)
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Output directory (defaults to the converter's stock folder)
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of parallel encoding jobs (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Display a table with every converted file at the end
    #[arg(long = "report")]
    pub report: bool,

    /// JSON configuration file; command-line values take precedence
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

impl CommonArgs {
    fn apply(&self, job: &mut ConversionJob) {
        if let Some(input) = &self.input_dir {
            job.input_dir = input.clone();
        }
        if let Some(output) = &self.output_dir {
            job.output_dir = output.clone();
        }
        job.jobs = self.jobs;
        job.verbose = self.verbose;
        job.report = self.report;
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "images-to-webp",
    about = "Compress JPG, JPEG and PNG images into WebP",
    long_about = "
Compress every JPG, JPEG and PNG image in a folder into WebP, aiming for a much
smaller file size while keeping the image quality.

Files are read from images/ and written to output/ unless told otherwise. Use
webp-to-png afterwards to turn the WebP files back into PNG.

Example Usage:
  # Stock layout: images/ -> output/
  images-to-webp

  # Custom folders, higher quality, show a per-file table
  images-to-webp -i ~/Photos -o ~/Photos/webp --quality 85 --report"
)]
pub struct WebpArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// WebP quality (0-100)
    #[arg(long = "quality", default_value_t = DEFAULT_QUALITY, value_name = "Q")]
    pub quality: f32,

    /// Compression method (0 = fastest, 6 = smallest)
    #[arg(long = "method", default_value_t = DEFAULT_METHOD, value_name = "M")]
    pub method: u8,

    /// Quality of the alpha channel (0-100)
    #[arg(long = "alpha-quality", default_value_t = DEFAULT_ALPHA_QUALITY, value_name = "Q")]
    pub alpha_quality: u8,

    /// Print a source vs WebP size comparison at the end
    #[arg(long = "compare-sizes")]
    pub compare_sizes: bool,
}

impl WebpArgs {
    pub fn validate(&self) -> Result<()> {
        validate_range("Quality", self.quality, 0.0, 100.0)?;
        validate_range("Method", self.method, 0, 6)?;
        validate_range("Alpha quality", self.alpha_quality, 0, 100)?;
        validate_jobs(self.common.jobs)
    }

    pub fn to_job(&self) -> ConversionJob {
        let mut job = ConversionJob::new(PipelineKind::ToWebp);
        self.common.apply(&mut job);
        job.encoder = EncoderOptions::Webp {
            quality: self.quality,
            method: self.method,
            alpha_quality: self.alpha_quality,
        };
        job.compare_sizes = self.compare_sizes;
        job
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "webp-to-png",
    about = "Convert WebP images to PNG with maximum lossless compression",
    long_about = "
Convert every WebP image in a folder to PNG. The PNG output is lossless and is
recompressed as hard as the chosen strategy allows.

Files are read from output/ and written to outputpng/ unless told otherwise. A
size comparison between the two folders is printed at the end.

Example Usage:
  # Stock layout: output/ -> outputpng/
  webp-to-png

  # Faster, less aggressive compression
  webp-to-png --strategy 3 --verbose"
)]
pub struct PngArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Lossless strategy (0 = most aggressive, 4 = fastest)
    #[arg(long = "strategy", default_value_t = DEFAULT_STRATEGY, value_name = "S")]
    pub strategy: u8,
}

impl PngArgs {
    pub fn validate(&self) -> Result<()> {
        validate_range("Strategy", self.strategy, 0, 4)?;
        validate_jobs(self.common.jobs)
    }

    pub fn to_job(&self) -> ConversionJob {
        let mut job = ConversionJob::new(PipelineKind::ToPng);
        self.common.apply(&mut job);
        job.encoder = EncoderOptions::Png {
            strategy: self.strategy,
            verbose: self.common.verbose,
        };
        job
    }
}
