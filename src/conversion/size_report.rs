use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::utils::has_valid_extension;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeChange {
    Larger,
    Smaller,
    Same,
}

impl SizeChange {
    pub fn label(&self) -> &'static str {
        match self {
            SizeChange::Larger => "larger",
            SizeChange::Smaller => "smaller",
            SizeChange::Same => "same size",
        }
    }
}

/// Total sizes of the source and converted sets
#[derive(Debug, Clone, PartialEq)]
pub struct SizeReport {
    pub total_source_bytes: u64,
    pub total_converted_bytes: u64,
    /// |converted - source| / source * 100, zero when there are no source bytes
    pub delta_percent: f64,
    pub source_files: usize,
    pub converted_files: usize,
}

impl SizeReport {
    pub fn new(
        total_source_bytes: u64,
        total_converted_bytes: u64,
        source_files: usize,
        converted_files: usize,
    ) -> Self {
        let delta_percent = if total_source_bytes == 0 {
            0.0
        } else {
            total_source_bytes.abs_diff(total_converted_bytes) as f64 / total_source_bytes as f64
                * 100.0
        };

        Self {
            total_source_bytes,
            total_converted_bytes,
            delta_percent,
            source_files,
            converted_files,
        }
    }

    pub fn change(&self) -> SizeChange {
        use std::cmp::Ordering;
        match self.total_converted_bytes.cmp(&self.total_source_bytes) {
            Ordering::Greater => SizeChange::Larger,
            Ordering::Less => SizeChange::Smaller,
            Ordering::Equal => SizeChange::Same,
        }
    }

    /// Absolute difference in bytes
    pub fn delta_bytes(&self) -> u64 {
        self.total_source_bytes.abs_diff(self.total_converted_bytes)
    }

    /// Percentage rounded to one decimal place
    pub fn rounded_percent(&self) -> f64 {
        (self.delta_percent * 10.0).round() / 10.0
    }

    pub fn has_baseline(&self) -> bool {
        self.total_source_bytes > 0
    }
}

/// Sum the sizes of files in `dir` matching `extensions`.
///
/// Entries that cannot be stat'ed are skipped. Returns (bytes, file count).
pub fn directory_size(dir: &Path, extensions: &[&str]) -> Result<(u64, usize)> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut total = 0u64;
    let mut count = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        if !has_valid_extension(&path, extensions) {
            continue;
        }
        if let Ok(metadata) = fs::metadata(&path) {
            if metadata.is_file() {
                total += metadata.len();
                count += 1;
            }
        }
    }
    Ok((total, count))
}

/// Compare the source set in `input_dir` against the converted set in `output_dir`
pub fn compare(
    input_dir: &Path,
    source_extensions: &[&str],
    output_dir: &Path,
    target_extension: &str,
) -> Result<SizeReport> {
    let (source_bytes, source_files) = directory_size(input_dir, source_extensions)?;
    let (converted_bytes, converted_files) = directory_size(output_dir, &[target_extension])?;
    Ok(SizeReport::new(
        source_bytes,
        converted_bytes,
        source_files,
        converted_files,
    ))
}
