// Library exports shared by the images-to-webp and webp-to-png binaries
pub mod cli;
pub mod config_file;
pub mod conversion;
pub mod utils;

// Re-export commonly used types
pub use cli::{PngArgs, WebpArgs};
pub use conversion::{
    resolve_encoder, run_job, run_pipeline, ConsoleReporter, ConversionJob, PipelineKind, PipelineOutcome,
    Reporter,
};
