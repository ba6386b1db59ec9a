use anyhow::Result;
use clap::Parser;
use console::style;

use webp_batch::conversion::run_job;
use webp_batch::utils::error_println;
use webp_batch::PngArgs;

fn main() -> Result<()> {
    let mut args = PngArgs::parse();
    args.load_and_merge_config()?;
    args.validate()?;

    println!(
        "{}",
        style("WebP → PNG conversion with maximum lossless compression")
            .bold()
            .blue()
    );
    println!();

    let job = args.to_job();
    if let Err(e) = run_job(&job) {
        error_println(&format!("An error occurred during conversion: {:#}", e));
        eprintln!("Full error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
