use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::{AbortReason, PipelineKind};

/// Check the input directory before anything is written.
///
/// Returns `Ok(Some(reason))` when the run should end quietly: the input directory
/// is missing, or input and output resolve to the same directory.
pub fn check_input(
    input_dir: &Path,
    output_dir: &Path,
    kind: PipelineKind,
) -> Result<Option<AbortReason>> {
    if !input_dir.is_dir() {
        return Ok(Some(AbortReason::MissingInput {
            dir: input_dir.to_path_buf(),
            kind,
        }));
    }

    // A missing output directory cannot alias an existing input
    if output_dir.exists() {
        let input = fs::canonicalize(input_dir)
            .with_context(|| format!("Failed to resolve {}", input_dir.display()))?;
        let output = fs::canonicalize(output_dir)
            .with_context(|| format!("Failed to resolve {}", output_dir.display()))?;
        if input == output {
            return Ok(Some(AbortReason::SameDirectory(input_dir.to_path_buf())));
        }
    }

    Ok(None)
}

/// Create the output directory (and parents) if needed.
///
/// Returns `true` when the directory was created by this call.
pub fn ensure_output_dir(output_dir: &Path) -> Result<bool> {
    if output_dir.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_dir.display()
        )
    })?;
    Ok(true)
}
