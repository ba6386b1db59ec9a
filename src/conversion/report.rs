//! Human-facing progress and result messages.

use console::style;
use prettytable::{format, Cell, Row, Table};
use std::fs;
use std::path::Path;

use super::{
    display_dir, AbortReason, ConversionJob, ConvertedFile, PipelineKind, RunSummary, SizeChange,
    SizeReport, Stage,
};
use crate::utils::{
    display_name, error_println, format_duration, format_size, verbose_println, warn_println,
};

/// Receives pipeline events. Implementations must tolerate calls from several
/// threads at once (renames are reported concurrently).
pub trait Reporter: Send + Sync {
    fn stage_changed(&self, from: Stage, to: Stage);
    fn created_output_dir(&self, dir: &Path);
    fn found_files(&self, count: usize, kind: PipelineKind);
    fn skipped_collision(&self, skipped: &Path, kept: &Path);
    fn encoding_started(&self, pattern: &str, encoder: &str);
    fn renamed(&self, from: &Path, to: &Path);
    fn rename_failed(&self, from: &Path, error: &str);
    fn completed(&self, summary: &RunSummary);
    fn file_table(&self, files: &[ConvertedFile]);
    fn size_report(&self, report: &SizeReport, job: &ConversionJob);
    fn warning(&self, message: &str);
    fn aborted(&self, reason: &AbortReason);
}

/// Prints to stdout/stderr
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Reporter for ConsoleReporter {
    fn stage_changed(&self, from: Stage, to: Stage) {
        verbose_println(self.verbose, &format!("Stage: {} -> {}", from, to));
    }

    fn created_output_dir(&self, dir: &Path) {
        println!("Created {} folder", display_dir(dir));
    }

    fn found_files(&self, count: usize, kind: PipelineKind) {
        let noun = match kind {
            PipelineKind::ToWebp => "images",
            PipelineKind::ToPng => "WebP files",
        };
        println!("Found {} {} to convert.", style(count).bold().cyan(), noun);
    }

    fn skipped_collision(&self, skipped: &Path, kept: &Path) {
        warn_println(&format!(
            "Skipping {}: {} converts to the same name",
            display_name(skipped),
            display_name(kept)
        ));
    }

    fn encoding_started(&self, pattern: &str, encoder: &str) {
        println!("{}", style("Starting image conversion...").bold());
        verbose_println(self.verbose, &format!("Pattern: {}", pattern));
        verbose_println(self.verbose, &format!("Encoder: {}", encoder));
    }

    fn renamed(&self, from: &Path, to: &Path) {
        println!(
            "{} {} → {}",
            style("✓").green(),
            display_name(from),
            display_name(to)
        );
    }

    fn rename_failed(&self, from: &Path, error: &str) {
        error_println(&format!("Error renaming {}: {}", from.display(), error));
    }

    fn completed(&self, summary: &RunSummary) {
        let headline = match summary.kind {
            PipelineKind::ToWebp => format!(
                "🎉 Successfully converted {} images to WebP format!",
                summary.converted
            ),
            PipelineKind::ToPng => format!(
                "🎉 Successfully converted {} WebP files → PNG!",
                summary.converted
            ),
        };
        println!();
        println!("{}", style(headline).bold().green());
        if summary.rename_failures > 0 {
            println!(
                "  {}",
                style(format!(
                    "{} files kept their original extension (rename failed)",
                    summary.rename_failures
                ))
                .yellow()
            );
        }
        println!(
            "📁 {} files saved in: {}",
            summary.kind.target_label(),
            display_dir(&summary.output_dir)
        );
        verbose_println(
            self.verbose,
            &format!("Elapsed: {}", format_duration(summary.elapsed)),
        );
    }

    fn file_table(&self, files: &[ConvertedFile]) {
        println!();
        build_file_table(files).printstd();
    }

    fn size_report(&self, report: &SizeReport, job: &ConversionJob) {
        println!();
        println!("{}", style("📊 SIZE COMPARISON:").bold().blue());
        println!(
            "{}",
            size_line(
                job.kind.source_label(),
                &job.input_dir,
                report.source_files,
                report.total_source_bytes
            )
        );
        println!(
            "{}",
            size_line(
                job.kind.target_label(),
                &job.output_dir,
                report.converted_files,
                report.total_converted_bytes
            )
        );

        let target = job.kind.target_label();
        if !report.has_baseline() {
            println!("  No {} bytes to compare against.", job.kind.source_label());
            return;
        }
        match report.change() {
            SizeChange::Larger => println!(
                "📈 {}s are larger by {:.1}% ({})",
                target,
                report.rounded_percent(),
                format_size(report.delta_bytes())
            ),
            SizeChange::Smaller => println!(
                "📉 {}s are smaller by {:.1}% ({})",
                target,
                report.rounded_percent(),
                format_size(report.delta_bytes())
            ),
            SizeChange::Same => println!("{}s are the same size as the sources", target),
        }

        if job.kind == PipelineKind::ToPng {
            println!();
            println!(
                "{}",
                style("💡 PNGs keep every pixel of the WebP sources with maximum lossless compression.")
                    .dim()
            );
        }
    }

    fn warning(&self, message: &str) {
        warn_println(message);
    }

    fn aborted(&self, reason: &AbortReason) {
        println!("{} {}", style("❌").red(), reason);
        if let Some(hint) = abort_hint(reason) {
            println!("  {}", hint);
        }
    }
}

/// Follow-up advice printed under an abort message
pub fn abort_hint(reason: &AbortReason) -> Option<&'static str> {
    match reason {
        AbortReason::MissingInput {
            kind: PipelineKind::ToPng,
            ..
        } => Some("Check the folder name, or run images-to-webp first to produce WebP files."),
        AbortReason::MissingInput {
            kind: PipelineKind::ToWebp,
            ..
        } => Some("Check the folder name, or create it and put your JPG/PNG images inside."),
        _ => None,
    }
}

/// One side of the size comparison, e.g. `🔸 WebP (output/, 3 files): 1.20 MB`
pub fn size_line(label: &str, dir: &Path, files: usize, bytes: u64) -> String {
    let noun = if files == 1 { "file" } else { "files" };
    format!(
        "🔸 {} ({}, {} {}): {}",
        label,
        display_dir(dir),
        files,
        noun,
        format_size(bytes)
    )
}

fn file_size_cell(path: &Path) -> (Option<u64>, Cell) {
    match fs::metadata(path) {
        Ok(metadata) => (Some(metadata.len()), Cell::new(&format_size(metadata.len()))),
        Err(_) => (None, Cell::new("-")),
    }
}

/// Per-file table: source, output, sizes, change
pub fn build_file_table(files: &[ConvertedFile]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);

    table.add_row(Row::new(vec![
        Cell::new("Source"),
        Cell::new("Output"),
        Cell::new("Source size"),
        Cell::new("Output size"),
        Cell::new("Change"),
    ]));

    for file in files {
        let (source_size, source_cell) = file_size_cell(&file.source_path);
        let (output_size, output_cell) = file_size_cell(&file.final_path);

        let change = match (source_size, output_size) {
            (Some(src), Some(out)) if src > 0 => {
                format!("{:+.1}%", (out as f64 - src as f64) / src as f64 * 100.0)
            }
            _ => "-".to_string(),
        };

        table.add_row(Row::new(vec![
            Cell::new(&display_name(&file.source_path)),
            Cell::new(&display_name(&file.final_path)),
            source_cell,
            output_cell,
            Cell::new(&change),
        ]));
    }

    table
}
