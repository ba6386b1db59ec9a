use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::{
    CommonArgs, PngArgs, WebpArgs, DEFAULT_ALPHA_QUALITY, DEFAULT_METHOD, DEFAULT_QUALITY,
    DEFAULT_STRATEGY,
};

/// On-disk configuration shared by both converters
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub name: Option<String>,
    pub config: ConversionConfigJson,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionConfigJson {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub quality: Option<f32>,
    pub method: Option<u8>,
    pub alpha_quality: Option<u8>,
    pub compare_sizes: Option<bool>,
    pub strategy: Option<u8>,
    pub jobs: Option<usize>,
    pub verbose: Option<bool>,
    pub report: Option<bool>,
}

pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {:?}", path))
}

impl CommonArgs {
    /// Values still at their defaults are taken from the file
    fn merge_from_config(&mut self, config: &ConversionConfigJson) {
        if self.input_dir.is_none() {
            self.input_dir = config.input_path.as_ref().map(PathBuf::from);
        }
        if self.output_dir.is_none() {
            self.output_dir = config.output_path.as_ref().map(PathBuf::from);
        }
        if self.jobs == 0 {
            if let Some(jobs) = config.jobs {
                self.jobs = jobs;
            }
        }
        if !self.verbose {
            self.verbose = config.verbose.unwrap_or(false);
        }
        if !self.report {
            self.report = config.report.unwrap_or(false);
        }
    }

    fn load_config(&self) -> Result<Option<ConfigFile>> {
        match &self.config_file {
            Some(path) => {
                let config = read_config_file(path)?;
                if self.verbose {
                    eprintln!("Loaded configuration from: {:?}", path);
                }
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }
}

impl WebpArgs {
    /// Load `--config` if given and merge it under the command line
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        if let Some(file) = self.common.load_config()? {
            self.merge_from_config(&file.config);
        }
        Ok(())
    }

    fn merge_from_config(&mut self, config: &ConversionConfigJson) {
        self.common.merge_from_config(config);

        if self.quality == DEFAULT_QUALITY {
            if let Some(quality) = config.quality {
                self.quality = quality;
            }
        }
        if self.method == DEFAULT_METHOD {
            if let Some(method) = config.method {
                self.method = method;
            }
        }
        if self.alpha_quality == DEFAULT_ALPHA_QUALITY {
            if let Some(alpha_quality) = config.alpha_quality {
                self.alpha_quality = alpha_quality;
            }
        }
        if !self.compare_sizes {
            self.compare_sizes = config.compare_sizes.unwrap_or(false);
        }
    }
}

impl PngArgs {
    /// Load `--config` if given and merge it under the command line
    pub fn load_and_merge_config(&mut self) -> Result<()> {
        if let Some(file) = self.common.load_config()? {
            self.merge_from_config(&file.config);
        }
        Ok(())
    }

    fn merge_from_config(&mut self, config: &ConversionConfigJson) {
        self.common.merge_from_config(config);

        if self.strategy == DEFAULT_STRATEGY {
            if let Some(strategy) = config.strategy {
                self.strategy = strategy;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::EncoderOptions;
    use clap::Parser;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "name": "archive",
        "config": {
            "inputPath": "scans",
            "outputPath": "scans-webp",
            "quality": 60,
            "method": 4,
            "alphaQuality": 90,
            "strategy": 2,
            "jobs": 4,
            "report": true
        }
    }"#;

    fn write_sample(dir: &Path) -> PathBuf {
        let path = dir.join("convert.json");
        fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn test_config_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = write_sample(tmp.path());
        let mut args = WebpArgs::parse_from([
            "images-to-webp",
            "--config",
            path.to_str().unwrap(),
        ]);

        args.load_and_merge_config().unwrap();
        let job = args.to_job();

        assert_eq!(job.input_dir, PathBuf::from("scans"));
        assert_eq!(job.output_dir, PathBuf::from("scans-webp"));
        assert_eq!(job.jobs, 4);
        assert!(job.report);
        assert_eq!(
            job.encoder,
            EncoderOptions::Webp {
                quality: 60.0,
                method: 4,
                alpha_quality: 90
            }
        );
    }

    #[test]
    fn test_command_line_wins() {
        let tmp = TempDir::new().unwrap();
        let path = write_sample(tmp.path());
        let mut args = PngArgs::parse_from([
            "webp-to-png",
            "--config",
            path.to_str().unwrap(),
            "-i",
            "webp",
            "--strategy",
            "1",
        ]);

        args.load_and_merge_config().unwrap();
        let job = args.to_job();

        assert_eq!(job.input_dir, PathBuf::from("webp"));
        assert_eq!(job.output_dir, PathBuf::from("scans-webp"));
        assert_eq!(
            job.encoder,
            EncoderOptions::Png {
                strategy: 1,
                verbose: false
            }
        );
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let tmp = TempDir::new().unwrap();
        assert!(read_config_file(&tmp.path().join("nope.json")).is_err());

        let broken = tmp.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(read_config_file(&broken).is_err());
    }

    #[test]
    fn test_no_config_is_a_no_op() {
        let mut args = WebpArgs::parse_from(["images-to-webp"]);
        args.load_and_merge_config().unwrap();
        assert_eq!(args.quality, DEFAULT_QUALITY);
        assert!(args.common.input_dir.is_none());
    }
}
