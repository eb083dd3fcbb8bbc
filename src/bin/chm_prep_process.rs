//! Per-file entry point: repairs a single CHM and writes `<stem>_prep.<ext>` to `dest_dir`.

use anyhow::{Context, Result};
use chm_prep::{logging, ChmPreprocessor, PipelineConfig, DEFAULT_CONFIG_FILE};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "chm_prep_process")]
#[command(version, about = "Remove cavities and spikes from a single CHM")]
struct Cli {
    /// Input CHM raster
    input: PathBuf,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::from_file(&cli.config)?;
    let processor = ChmPreprocessor::new(config);
    processor
        .process_file(&cli.input)
        .with_context(|| format!("Processing {} failed", cli.input.display()))?;
    Ok(())
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            log::error!("Program halted");
            ExitCode::from(1)
        }
    }
}
