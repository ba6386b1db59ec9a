use anyhow::{Context, Result};
use rayon::prelude::*;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use super::{EncodedFile, PipelineKind, Reporter};
use crate::utils::build_worker_pool;

/// A converted file after its extension has been corrected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub final_path: PathBuf,
}

#[derive(Debug)]
pub enum RenameOutcome {
    Renamed(ConvertedFile),
    /// The encoder already used the target extension
    Unchanged(ConvertedFile),
    Failed {
        file: EncodedFile,
        target: PathBuf,
        error: String,
    },
}

impl RenameOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RenameOutcome::Failed { .. })
    }

    pub fn into_converted(self) -> Option<ConvertedFile> {
        match self {
            RenameOutcome::Renamed(file) | RenameOutcome::Unchanged(file) => Some(file),
            RenameOutcome::Failed { .. } => None,
        }
    }
}

/// Rewrites a trailing source extension (any case) to the target extension
pub struct ExtensionRewriter {
    pattern: Regex,
    replacement: String,
}

impl ExtensionRewriter {
    pub fn new(source_extensions: &[&str], target_extension: &str) -> Result<Self> {
        let alternatives: Vec<String> = source_extensions.iter().map(|e| regex::escape(e)).collect();
        let pattern = Regex::new(&format!(r"(?i)\.(?:{})$", alternatives.join("|")))
            .context("Failed to build extension pattern")?;

        Ok(Self {
            pattern,
            replacement: format!(".{}", target_extension),
        })
    }

    pub fn for_kind(kind: PipelineKind) -> Result<Self> {
        Self::new(kind.source_extensions(), kind.target_extension())
    }

    /// Final path for an encoder output; paths without a known extension are returned as-is
    pub fn rewrite(&self, path: &Path) -> PathBuf {
        match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => {
                let renamed = self.pattern.replace(name, regex::NoExpand(self.replacement.as_str()));
                path.with_file_name(renamed.as_ref())
            }
            None => path.to_path_buf(),
        }
    }
}

/// Give every encoder output its target extension.
///
/// Renames run concurrently on a pool of `jobs` workers (0 = one per CPU core),
/// the same size as the encoding pool. A failed rename is reported and recorded in the
/// returned outcomes; it never stops the other renames and completed renames are
/// not rolled back.
pub fn rename_all(
    files: &[EncodedFile],
    kind: PipelineKind,
    jobs: usize,
    reporter: &dyn Reporter,
) -> Result<Vec<RenameOutcome>> {
    let rewriter = ExtensionRewriter::for_kind(kind)?;
    let pool = build_worker_pool(jobs)?;

    let outcomes: Vec<RenameOutcome> = pool.install(|| {
        files
            .par_iter()
            .map(|file| rename_one(file, &rewriter, reporter))
            .collect()
    });

    Ok(outcomes)
}

fn rename_one(file: &EncodedFile, rewriter: &ExtensionRewriter, reporter: &dyn Reporter) -> RenameOutcome {
    let old_path = &file.destination_path;
    let new_path = rewriter.rewrite(old_path);

    let converted = ConvertedFile {
        source_path: file.source_path.clone(),
        destination_path: old_path.clone(),
        final_path: new_path.clone(),
    };

    if *old_path == new_path {
        return RenameOutcome::Unchanged(converted);
    }

    match fs::rename(old_path, &new_path) {
        Ok(()) => {
            reporter.renamed(old_path, &new_path);
            RenameOutcome::Renamed(converted)
        }
        Err(e) => {
            let error = e.to_string();
            reporter.rename_failed(old_path, &error);
            RenameOutcome::Failed {
                file: file.clone(),
                target: new_path,
                error,
            }
        }
    }
}
