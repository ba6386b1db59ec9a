use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::utils::has_valid_extension;

/// Two sources that would land on the same output name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub kept: PathBuf,
    pub skipped: PathBuf,
}

#[derive(Debug, Default)]
pub struct SourceListing {
    pub files: Vec<PathBuf>,
    pub skipped: Vec<Collision>,
}

/// List the files directly inside `input_dir` whose extension is one of `extensions`.
///
/// Files are ordered by case-insensitive file name. When several sources share a
/// stem (`a.jpg`, `a.png`) only the first one is converted; the rest are returned
/// in `skipped` so the caller can report them.
pub fn enumerate(input_dir: &Path, extensions: &[&str]) -> Result<SourceListing> {
    let mut candidates = Vec::new();

    let walker = WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false);

    for entry in walker {
        let entry = entry.with_context(|| {
            format!("Failed to read directory entry in {}", input_dir.display())
        })?;
        let path = entry.path();

        if path.is_file() && has_valid_extension(path, extensions) {
            candidates.push(path.to_path_buf());
        }
    }

    candidates.sort_by_key(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (name.to_lowercase(), name)
    });

    let mut listing = SourceListing::default();
    let mut by_stem: HashMap<String, PathBuf> = HashMap::new();

    for path in candidates {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match by_stem.get(&stem) {
            Some(kept) => listing.skipped.push(Collision {
                kept: kept.clone(),
                skipped: path,
            }),
            None => {
                by_stem.insert(stem, path.clone());
                listing.files.push(path);
            }
        }
    }

    Ok(listing)
}
