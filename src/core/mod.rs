//! Core CHM repair modules

pub mod nodata_mask;
pub mod repair;
pub mod passes;
pub mod post_process;
pub mod pipeline;

// Re-export main types
pub use nodata_mask::{build_nodata_mask, fill_small_holes, MaskedGrid};
pub use repair::{dilate_mask, LaplacianRepairer, Repairer};
pub use passes::{PassExecutor, MAX_PASSES};
pub use post_process::{clamp_max, clamp_min, PostProcessor};
pub use pipeline::ChmPreprocessor;
