//! chm_prep: cavity and spike removal for lidar Canopy Height Models
//!
//! Each raster goes through a fixed pipeline: no-data masking, one or two
//! Laplacian detect/dilate/median-fill repair passes, value clamping and
//! no-data reconciliation. The batch driver runs every file in its own
//! process.

pub mod types;
pub mod config;
pub mod io;
pub mod core;
pub mod batch;
pub mod logging;

// Re-export main types and functions for easier access
pub use types::{ChmError, ChmGrid, ChmRaster, ChmResult, GeoReference, NoDataMask};
pub use config::{NoDataPolicy, PassParameters, PipelineConfig, DEFAULT_CONFIG_FILE};
pub use core::{ChmPreprocessor, LaplacianRepairer, Repairer};
pub use batch::{run_batch, FileRunner, HostPlatform, SubprocessRunner};
