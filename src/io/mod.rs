//! Raster I/O for canopy height models

pub mod raster;

pub use raster::{output_path_for, read_chm, write_chm, OUTPUT_SUFFIX};
