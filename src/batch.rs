//! Batch driver: one freshly spawned worker process per input raster
//!
//! Each CHM is processed by a separate `chm_prep_process` process so that any
//! memory held by the repair kernel is released when that file is done.

use crate::config::PipelineConfig;
use crate::types::{ChmError, ChmResult};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Raster extensions picked up from the source directory (case-insensitive)
pub const RASTER_EXTENSIONS: [&str; 2] = ["tif", "tiff"];

/// Host platforms with a known worker executable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Linux,
    Windows,
}

impl HostPlatform {
    /// Map a platform identifier (as in `std::env::consts::OS`)
    pub fn from_os_id(os_id: &str) -> ChmResult<Self> {
        match os_id {
            "linux" => Ok(HostPlatform::Linux),
            "windows" => Ok(HostPlatform::Windows),
            other => Err(ChmError::UnsupportedPlatform(other.to_string())),
        }
    }

    pub fn detect() -> ChmResult<Self> {
        Self::from_os_id(std::env::consts::OS)
    }

    /// File name of the per-file worker executable on this platform
    pub fn worker_file_name(&self) -> &'static str {
        match self {
            HostPlatform::Linux => "chm_prep_process",
            HostPlatform::Windows => "chm_prep_process.exe",
        }
    }
}

/// List the raster files directly inside `source_dir`, sorted by path
pub fn scan_input_rasters(source_dir: &Path) -> ChmResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(source_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_raster = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                RASTER_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);
        if is_raster {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(ChmError::EmptyInputSet(source_dir.to_path_buf()));
    }

    files.sort();
    Ok(files)
}

/// Runs the per-file pipeline for a single input
pub trait FileRunner {
    /// `Ok(true)` when the file was processed successfully
    fn run(&self, input: &Path) -> ChmResult<bool>;
}

/// Launches the worker executable once per file
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    worker: PathBuf,
    config_path: PathBuf,
}

impl SubprocessRunner {
    pub fn new(worker: PathBuf, config_path: PathBuf) -> Self {
        Self { worker, config_path }
    }

    /// Worker executable located next to the running binary
    pub fn beside_current_exe(platform: HostPlatform, config_path: PathBuf) -> ChmResult<Self> {
        let exe = std::env::current_exe()?;
        let dir = exe.parent().ok_or_else(|| {
            ChmError::Processing(format!("Cannot locate directory of {}", exe.display()))
        })?;
        Ok(Self::new(dir.join(platform.worker_file_name()), config_path))
    }

    pub fn worker(&self) -> &Path {
        &self.worker
    }
}

impl FileRunner for SubprocessRunner {
    fn run(&self, input: &Path) -> ChmResult<bool> {
        let mut cmd = Command::new(&self.worker);
        cmd.arg("--config").arg(&self.config_path).arg(input);
        log::debug!("Command: {:?}", cmd);

        let status = cmd.status().map_err(|source| ChmError::WorkerSpawn {
            path: input.to_path_buf(),
            source,
        })?;

        if !status.success() {
            log::warn!("Processing of {} failed ({})", input.display(), status);
        }
        Ok(status.success())
    }
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Scan the source directory and hand every raster to `runner`, one at a time.
///
/// A failing file is recorded and the batch moves on.
pub fn run_batch<F: FileRunner + ?Sized>(config: &PipelineConfig, runner: &F) -> ChmResult<BatchSummary> {
    let inputs = scan_input_rasters(&config.source_dir)?;
    let total = inputs.len();
    let mut summary = BatchSummary::default();

    for (index, chm_file) in inputs.into_iter().enumerate() {
        log::info!("Processing CHM {} of {}: {}", index + 1, total, chm_file.display());

        let ok = match runner.run(&chm_file) {
            Ok(ok) => ok,
            Err(e) => {
                log::error!("{}", e);
                false
            }
        };

        if ok {
            summary.processed.push(chm_file);
        } else {
            summary.failed.push(chm_file);
        }
    }

    if summary.failed.is_empty() {
        log::info!("Batch complete: {} CHM(s) processed", summary.processed.len());
    } else {
        log::warn!(
            "Batch complete: {} processed, {} failed",
            summary.processed.len(),
            summary.failed.len()
        );
    }
    Ok(summary)
}
