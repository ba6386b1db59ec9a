pub mod discover;
pub mod encoder;
pub mod prepare;
pub mod rename;
pub mod report;
pub mod size_report;

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub use encoder::{resolve_encoder, BatchEncoder, EncodedFile, EncoderPlugin};
pub use rename::{ConvertedFile, RenameOutcome};
pub use report::{ConsoleReporter, Reporter};
pub use size_report::{SizeChange, SizeReport};

/// Which of the two batch conversions a job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// JPG/JPEG/PNG images compressed to lossy WebP
    ToWebp,
    /// WebP images expanded to losslessly compressed PNG
    ToPng,
}

impl PipelineKind {
    /// Lowercase extensions the enumerator accepts as sources
    pub fn source_extensions(&self) -> &'static [&'static str] {
        match self {
            PipelineKind::ToWebp => &["jpg", "jpeg", "png"],
            PipelineKind::ToPng => &["webp"],
        }
    }

    pub fn target_extension(&self) -> &'static str {
        match self {
            PipelineKind::ToWebp => "webp",
            PipelineKind::ToPng => "png",
        }
    }

    pub fn default_input_dir(&self) -> &'static str {
        match self {
            PipelineKind::ToWebp => "images",
            PipelineKind::ToPng => "output",
        }
    }

    pub fn default_output_dir(&self) -> &'static str {
        match self {
            PipelineKind::ToWebp => "output",
            PipelineKind::ToPng => "outputpng",
        }
    }

    /// Human label for the source set
    pub fn source_label(&self) -> &'static str {
        match self {
            PipelineKind::ToWebp => "Images",
            PipelineKind::ToPng => "WebP",
        }
    }

    /// Human label for the converted set
    pub fn target_label(&self) -> &'static str {
        match self {
            PipelineKind::ToWebp => "WebP",
            PipelineKind::ToPng => "PNG",
        }
    }
}

/// Encoder options handed to the codec plugin
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderOptions {
    Webp {
        quality: f32,
        method: u8,
        alpha_quality: u8,
    },
    Png {
        /// 0 is the most aggressive lossless strategy, 4 the fastest
        strategy: u8,
        verbose: bool,
    },
}

impl EncoderOptions {
    pub fn default_for(kind: PipelineKind) -> Self {
        match kind {
            PipelineKind::ToWebp => EncoderOptions::Webp {
                quality: 75.0,
                method: 6,
                alpha_quality: 75,
            },
            PipelineKind::ToPng => EncoderOptions::Png {
                strategy: 0,
                verbose: false,
            },
        }
    }
}

/// A single batch conversion, fixed for the whole run
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub kind: PipelineKind,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub encoder: EncoderOptions,
    pub jobs: usize,
    pub verbose: bool,
    pub report: bool,
    pub compare_sizes: bool,
}

impl ConversionJob {
    /// Job with the stock directories and encoder settings for `kind`
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            kind,
            input_dir: PathBuf::from(kind.default_input_dir()),
            output_dir: PathBuf::from(kind.default_output_dir()),
            encoder: EncoderOptions::default_for(kind),
            jobs: 0,
            verbose: false,
            report: false,
            compare_sizes: kind == PipelineKind::ToPng,
        }
    }

    pub fn with_dirs(mut self, input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        self.input_dir = input_dir.into();
        self.output_dir = output_dir.into();
        self
    }

    /// Glob describing the source files, e.g. `images/*.{jpg,jpeg,png}`
    pub fn file_pattern(&self) -> String {
        let exts = self.kind.source_extensions();
        let ext_part = if exts.len() == 1 {
            exts[0].to_string()
        } else {
            format!("{{{}}}", exts.join(","))
        };
        format!("{}/*.{}", self.input_dir.display(), ext_part)
    }
}

/// Where a pipeline run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ValidatingInput,
    Enumerating,
    PreparingOutput,
    Encoding,
    Renaming,
    Reporting,
    Done,
    Aborted,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::ValidatingInput => "validating input",
            Stage::Enumerating => "enumerating files",
            Stage::PreparingOutput => "preparing output",
            Stage::Encoding => "encoding",
            Stage::Renaming => "renaming",
            Stage::Reporting => "reporting",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Benign reasons for ending a run early; the process still exits 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    MissingInput { dir: PathBuf, kind: PipelineKind },
    SameDirectory(PathBuf),
    NoMatchingFiles { dir: PathBuf, kind: PipelineKind },
    NothingConverted,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::MissingInput { dir, .. } => {
                write!(f, "The {}/ folder does not exist!", dir.display())
            }
            AbortReason::SameDirectory(dir) => write!(
                f,
                "Input and output both point to {}/; refusing to convert in place.",
                dir.display()
            ),
            AbortReason::NoMatchingFiles { dir, kind } => match kind {
                PipelineKind::ToWebp => write!(
                    f,
                    "No images found for conversion in {}/ folder.",
                    dir.display()
                ),
                PipelineKind::ToPng => {
                    write!(f, "No WebP files found in the {}/ folder.", dir.display())
                }
            },
            AbortReason::NothingConverted => write!(f, "Failed to convert any files."),
        }
    }
}

/// Aggregate result of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub kind: PipelineKind,
    pub converted: usize,
    pub renamed: usize,
    pub rename_failures: usize,
    pub output_dir: PathBuf,
    pub files: Vec<ConvertedFile>,
    pub size_report: Option<SizeReport>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Completed(RunSummary),
    Aborted(AbortReason),
}

impl PipelineOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, PipelineOutcome::Aborted(_))
    }
}

/// Run one conversion job end to end.
///
/// Preconditions that are not met end the run with [`PipelineOutcome::Aborted`]
/// before anything is written. Rename and size-comparison failures are reported
/// and absorbed. Any other error is returned with the stage it happened in.
pub fn run_pipeline(
    job: &ConversionJob,
    encoder: &dyn BatchEncoder,
    reporter: &dyn Reporter,
) -> Result<PipelineOutcome> {
    let start_time = Instant::now();
    let mut tracker = StageTracker::new(reporter);

    match execute(job, encoder, reporter, &mut tracker, start_time) {
        Ok(outcome) => {
            match &outcome {
                PipelineOutcome::Completed(_) => tracker.enter(Stage::Done),
                PipelineOutcome::Aborted(reason) => {
                    reporter.aborted(reason);
                    tracker.enter(Stage::Aborted);
                }
            }
            Ok(outcome)
        }
        Err(e) => {
            let failed_in = tracker.current;
            tracker.enter(Stage::Failed);
            Err(e.context(format!("Conversion failed while {}", failed_in)))
        }
    }
}

fn execute(
    job: &ConversionJob,
    encoder: &dyn BatchEncoder,
    reporter: &dyn Reporter,
    tracker: &mut StageTracker<'_>,
    start_time: Instant,
) -> Result<PipelineOutcome> {
    tracker.enter(Stage::ValidatingInput);
    if let Some(reason) = prepare::check_input(&job.input_dir, &job.output_dir, job.kind)? {
        return Ok(PipelineOutcome::Aborted(reason));
    }

    tracker.enter(Stage::Enumerating);
    let listing = discover::enumerate(&job.input_dir, job.kind.source_extensions())?;
    for collision in &listing.skipped {
        reporter.skipped_collision(&collision.skipped, &collision.kept);
    }
    if listing.files.is_empty() {
        return Ok(PipelineOutcome::Aborted(AbortReason::NoMatchingFiles {
            dir: job.input_dir.clone(),
            kind: job.kind,
        }));
    }
    reporter.found_files(listing.files.len(), job.kind);

    tracker.enter(Stage::PreparingOutput);
    if prepare::ensure_output_dir(&job.output_dir)? {
        reporter.created_output_dir(&job.output_dir);
    }

    tracker.enter(Stage::Encoding);
    reporter.encoding_started(&job.file_pattern(), encoder.name().as_str());
    let encoded = encoder.convert(&listing.files, &job.output_dir)?;
    if encoded.is_empty() {
        return Ok(PipelineOutcome::Aborted(AbortReason::NothingConverted));
    }

    tracker.enter(Stage::Renaming);
    let outcomes = rename::rename_all(&encoded, job.kind, job.jobs, reporter)?;
    let rename_failures = outcomes.iter().filter(|o| o.is_failure()).count();
    let renamed = outcomes
        .iter()
        .filter(|o| matches!(o, RenameOutcome::Renamed(_)))
        .count();
    let files: Vec<ConvertedFile> = outcomes
        .into_iter()
        .filter_map(RenameOutcome::into_converted)
        .collect();

    tracker.enter(Stage::Reporting);
    let mut summary = RunSummary {
        kind: job.kind,
        converted: encoded.len(),
        renamed,
        rename_failures,
        output_dir: job.output_dir.clone(),
        files,
        size_report: None,
        elapsed: start_time.elapsed(),
    };
    reporter.completed(&summary);

    if job.report {
        reporter.file_table(&summary.files);
    }

    if job.compare_sizes {
        summary.size_report = compare_sizes(job, reporter);
    }

    Ok(PipelineOutcome::Completed(summary))
}

/// Resolve the encoder for `job` and run it with console output
pub fn run_job(job: &ConversionJob) -> Result<PipelineOutcome> {
    let encoder = resolve_encoder(job)?;
    let reporter = ConsoleReporter::new(job.verbose);
    run_pipeline(job, encoder.as_ref(), &reporter)
}

/// Size comparison never affects the run; its failures become a warning
fn compare_sizes(job: &ConversionJob, reporter: &dyn Reporter) -> Option<SizeReport> {
    match size_report::compare(
        &job.input_dir,
        job.kind.source_extensions(),
        &job.output_dir,
        job.kind.target_extension(),
    ) {
        Ok(report) => {
            reporter.size_report(&report, job);
            Some(report)
        }
        Err(e) => {
            reporter.warning(&format!("Could not compare file sizes: {:#}", e));
            None
        }
    }
}

struct StageTracker<'a> {
    current: Stage,
    reporter: &'a dyn Reporter,
}

impl<'a> StageTracker<'a> {
    fn new(reporter: &'a dyn Reporter) -> Self {
        Self {
            current: Stage::Idle,
            reporter,
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.reporter.stage_changed(self.current, stage);
        self.current = stage;
    }
}

/// Directory with a trailing slash, as shown in console messages
pub fn display_dir(dir: &Path) -> String {
    format!("{}/", dir.display())
}


#[cfg(test)]
mod tests {
    use super::test_support::{CopyEncoder, RecordingReporter};
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_bytes(path: &Path, len: usize) {
        fs::write(path, vec![7u8; len]).unwrap();
    }

    #[test]
    fn test_file_pattern() {
        let job = ConversionJob::new(PipelineKind::ToWebp);
        assert_eq!(job.file_pattern(), "images/*.{jpg,jpeg,png}");
        let job = ConversionJob::new(PipelineKind::ToPng);
        assert_eq!(job.file_pattern(), "output/*.webp");
    }

    #[test]
    fn test_default_jobs_match_fixed_layout() {
        let to_webp = ConversionJob::new(PipelineKind::ToWebp);
        assert_eq!(to_webp.input_dir, PathBuf::from("images"));
        assert_eq!(to_webp.output_dir, PathBuf::from("output"));
        assert!(!to_webp.compare_sizes);
        assert_eq!(
            to_webp.encoder,
            EncoderOptions::Webp {
                quality: 75.0,
                method: 6,
                alpha_quality: 75
            }
        );

        let to_png = ConversionJob::new(PipelineKind::ToPng);
        assert_eq!(to_png.input_dir, PathBuf::from("output"));
        assert_eq!(to_png.output_dir, PathBuf::from("outputpng"));
        assert!(to_png.compare_sizes);
    }

    #[test]
    fn test_missing_input_aborts_without_writes() {
        let tmp = TempDir::new().unwrap();
        let job = ConversionJob::new(PipelineKind::ToWebp)
            .with_dirs(tmp.path().join("images"), tmp.path().join("output"));
        let reporter = RecordingReporter::default();

        let outcome = run_pipeline(&job, &CopyEncoder::new(), &reporter).unwrap();

        assert!(matches!(
            outcome,
            PipelineOutcome::Aborted(AbortReason::MissingInput { .. })
        ));
        assert!(!tmp.path().join("output").exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
        assert!(reporter.contains("stage:aborted"));
    }

    #[test]
    fn test_no_matching_files_does_not_create_output() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        fs::create_dir(&images).unwrap();
        write_bytes(&images.join("notes.txt"), 10);
        write_bytes(&images.join("anim.gif"), 10);

        let job = ConversionJob::new(PipelineKind::ToWebp)
            .with_dirs(&images, tmp.path().join("output"));
        let reporter = RecordingReporter::default();
        let outcome = run_pipeline(&job, &CopyEncoder::new(), &reporter).unwrap();

        assert!(matches!(
            outcome,
            PipelineOutcome::Aborted(AbortReason::NoMatchingFiles { .. })
        ));
        assert!(!tmp.path().join("output").exists());
        assert!(!reporter.contains("encoding:"));
    }

    #[test]
    fn test_same_directory_is_refused() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        fs::create_dir(&images).unwrap();
        write_bytes(&images.join("a.jpg"), 10);

        let job = ConversionJob::new(PipelineKind::ToWebp).with_dirs(&images, &images);
        let outcome = run_pipeline(&job, &CopyEncoder::new(), &RecordingReporter::default()).unwrap();

        assert!(matches!(
            outcome,
            PipelineOutcome::Aborted(AbortReason::SameDirectory(_))
        ));
        assert!(images.join("a.jpg").exists());
        assert_eq!(fs::read_dir(&images).unwrap().count(), 1);
    }

    #[test]
    fn test_to_webp_renames_every_output() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        let output = tmp.path().join("output");
        fs::create_dir(&images).unwrap();
        write_bytes(&images.join("a.jpg"), 100_000);
        write_bytes(&images.join("b.png"), 50_000);
        write_bytes(&images.join("c.JPEG"), 10);

        let job = ConversionJob::new(PipelineKind::ToWebp).with_dirs(&images, &output);
        let reporter = RecordingReporter::default();
        let outcome = run_pipeline(&job, &CopyEncoder::new(), &reporter).unwrap();

        let summary = match outcome {
            PipelineOutcome::Completed(summary) => summary,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(summary.converted, 3);
        assert_eq!(summary.renamed, 3);
        assert_eq!(summary.rename_failures, 0);
        assert!(summary.size_report.is_none());
        assert!(output.join("a.webp").exists());
        assert!(output.join("b.webp").exists());
        assert!(output.join("c.webp").exists());

        let leftovers: Vec<_> = fs::read_dir(&output)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| crate::utils::has_valid_extension(p, &["jpg", "jpeg", "png"]))
            .collect();
        assert!(leftovers.is_empty());
        // inputs are never touched
        assert!(images.join("a.jpg").exists());
        assert!(reporter.contains("created:"));
        assert!(reporter.contains("stage:done"));
    }

    #[test]
    fn test_to_png_reports_size_growth() {
        let tmp = TempDir::new().unwrap();
        let webp_dir = tmp.path().join("output");
        let png_dir = tmp.path().join("outputpng");
        fs::create_dir(&webp_dir).unwrap();
        write_bytes(&webp_dir.join("a.webp"), 40_000);

        let job = ConversionJob::new(PipelineKind::ToPng).with_dirs(&webp_dir, &png_dir);
        let encoder = CopyEncoder {
            padding: 20_000,
            ..CopyEncoder::new()
        };
        let reporter = RecordingReporter::default();
        let outcome = run_pipeline(&job, &encoder, &reporter).unwrap();

        let summary = match outcome {
            PipelineOutcome::Completed(summary) => summary,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert!(png_dir.join("a.png").exists());
        assert!(!png_dir.join("a.webp").exists());
        let sizes = summary.size_report.unwrap();
        assert_eq!(sizes.total_source_bytes, 40_000);
        assert_eq!(sizes.total_converted_bytes, 60_000);
        assert_eq!(sizes.change(), SizeChange::Larger);
        assert!(reporter.contains("sizes:larger:50.0"));
    }

    #[test]
    fn test_size_comparison_failure_is_only_a_warning() {
        let tmp = TempDir::new().unwrap();
        let webp_dir = tmp.path().join("output");
        let png_dir = tmp.path().join("outputpng");
        fs::create_dir(&webp_dir).unwrap();
        write_bytes(&webp_dir.join("a.webp"), 1_000);
        write_bytes(&webp_dir.join("b.webp"), 1_000);

        let job = ConversionJob::new(PipelineKind::ToPng).with_dirs(&webp_dir, &png_dir);
        let encoder = CopyEncoder {
            remove_sources_after: true,
            ..CopyEncoder::new()
        };
        let reporter = RecordingReporter::default();
        let outcome = run_pipeline(&job, &encoder, &reporter).unwrap();

        let summary = match outcome {
            PipelineOutcome::Completed(summary) => summary,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert!(!webp_dir.exists());
        assert_eq!(summary.renamed, 2);
        assert!(summary.size_report.is_none());
        assert!(png_dir.join("a.png").exists());
        assert!(reporter.contains("warning:Could not compare file sizes"));
        assert!(!reporter.contains("sizes:"));
        assert!(reporter.contains("stage:done"));
    }

    #[test]
    fn test_encoder_failure_escalates_with_stage() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        fs::create_dir(&images).unwrap();
        write_bytes(&images.join("a.jpg"), 10);
        write_bytes(&images.join("b.jpg"), 10);

        let job = ConversionJob::new(PipelineKind::ToWebp)
            .with_dirs(&images, tmp.path().join("output"));
        let encoder = CopyEncoder {
            fail_on: Some("b.jpg".to_string()),
            ..CopyEncoder::new()
        };
        let reporter = RecordingReporter::default();
        let err = run_pipeline(&job, &encoder, &reporter).unwrap_err();

        let message = format!("{:#}", err);
        assert!(message.contains("while encoding"), "{}", message);
        assert!(message.contains("b.jpg"), "{}", message);
        assert!(reporter.contains("stage:failed"));
    }

    #[test]
    fn test_report_flag_prints_table() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        fs::create_dir(&images).unwrap();
        write_bytes(&images.join("a.png"), 10);

        let mut job = ConversionJob::new(PipelineKind::ToWebp)
            .with_dirs(&images, tmp.path().join("output"));
        job.report = true;
        let reporter = RecordingReporter::default();
        run_pipeline(&job, &CopyEncoder::new(), &reporter).unwrap();

        assert!(reporter.contains("table:1"));
    }

    #[test]
    fn test_stage_order() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        fs::create_dir(&images).unwrap();
        write_bytes(&images.join("a.png"), 10);

        let job = ConversionJob::new(PipelineKind::ToWebp)
            .with_dirs(&images, tmp.path().join("output"));
        let reporter = RecordingReporter::default();
        run_pipeline(&job, &CopyEncoder::new(), &reporter).unwrap();

        let stages: Vec<String> = reporter
            .events()
            .into_iter()
            .filter(|e| e.starts_with("stage:"))
            .collect();
        assert_eq!(
            stages,
            vec![
                "stage:validating input",
                "stage:enumerating files",
                "stage:preparing output",
                "stage:encoding",
                "stage:renaming",
                "stage:reporting",
                "stage:done",
            ]
        );
    }

    #[test]
    fn test_round_trip_with_real_codecs() {
        use image::{Rgb, RgbImage, Rgba, RgbaImage};

        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        let output = tmp.path().join("output");
        let outputpng = tmp.path().join("outputpng");
        fs::create_dir(&images).unwrap();
        RgbImage::from_fn(40, 30, |x, y| Rgb([x as u8 * 6, y as u8 * 8, 90]))
            .save(images.join("a.jpg"))
            .unwrap();
        RgbaImage::from_fn(20, 20, |x, y| Rgba([200, x as u8 * 12, y as u8 * 12, 255]))
            .save(images.join("b.png"))
            .unwrap();

        let to_webp = ConversionJob::new(PipelineKind::ToWebp).with_dirs(&images, &output);
        let encoder = resolve_encoder(&to_webp).unwrap();
        let outcome = run_pipeline(&to_webp, encoder.as_ref(), &RecordingReporter::default()).unwrap();
        assert!(!outcome.is_aborted());
        assert!(output.join("a.webp").exists());
        assert!(output.join("b.webp").exists());
        assert!(!output.join("a.jpg").exists());
        assert!(!output.join("b.png").exists());

        let to_png = ConversionJob::new(PipelineKind::ToPng).with_dirs(&output, &outputpng);
        let encoder = resolve_encoder(&to_png).unwrap();
        let reporter = RecordingReporter::default();
        let outcome = run_pipeline(&to_png, encoder.as_ref(), &reporter).unwrap();

        let summary = match outcome {
            PipelineOutcome::Completed(summary) => summary,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(summary.converted, 2);
        assert!(summary.size_report.is_some());
        assert!(reporter.contains("sizes:"));
        let png = image::open(outputpng.join("a.png")).unwrap();
        assert_eq!((png.width(), png.height()), (40, 30));
        assert!(outputpng.join("b.png").exists());
        assert!(!outputpng.join("a.webp").exists());
    }
}
