//! Batch entry point: processes every CHM in `source_dir`, each in its own process.

use anyhow::{Context, Result};
use chm_prep::batch::{run_batch, HostPlatform, SubprocessRunner};
use chm_prep::{logging, PipelineConfig, DEFAULT_CONFIG_FILE};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "chm_prep")]
#[command(version, about = "Remove cavities and spikes from every CHM in the source directory")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::from_file(&cli.config)?;
    let platform = HostPlatform::detect()?;
    let runner = SubprocessRunner::beside_current_exe(platform, cli.config.clone())?;
    log::debug!("Worker executable: {}", runner.worker().display());

    run_batch(&config, &runner)
        .with_context(|| format!("Batch over {} failed", config.source_dir.display()))?;
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
