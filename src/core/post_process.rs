use crate::config::{NoDataPolicy, PipelineConfig};
use crate::types::{ChmError, ChmGrid, ChmResult, ChmValue, NoDataMask};
use ndarray::Zip;

/// Value clamping and no-data reconciliation applied after the repair passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessor {
    pub min_clamp: Option<ChmValue>,
    pub max_clamp: Option<ChmValue>,
    pub nodata_policy: NoDataPolicy,
    pub output_nodata_val: f64,
}

impl PostProcessor {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            min_clamp: config.min_clamp,
            max_clamp: config.max_clamp,
            nodata_policy: config.nodata_policy,
            output_nodata_val: config.output_nodata_val,
        }
    }

    /// Clamp, then re-stamp masked cells with the output no-data value.
    ///
    /// Re-stamping runs after clamping, so no-data cells never take a clamp
    /// bound. Nothing is re-stamped when the input had no no-data value or the
    /// policy is `SetToZero`.
    pub fn apply(&self, mut grid: ChmGrid, mask: &NoDataMask, has_nodata: bool) -> ChmResult<ChmGrid> {
        if grid.dim() != mask.dim() {
            return Err(ChmError::Processing(format!(
                "No-data mask is {}x{} but the grid is {}x{}",
                mask.nrows(),
                mask.ncols(),
                grid.nrows(),
                grid.ncols()
            )));
        }

        if let Some(min_val) = self.min_clamp {
            clamp_min(&mut grid, min_val);
        }
        if let Some(max_val) = self.max_clamp {
            clamp_max(&mut grid, max_val);
        }

        if has_nodata && self.nodata_policy.restamps_nodata() {
            let stamp = self.output_nodata_val as ChmValue;
            let mut stamped = 0usize;
            Zip::from(&mut grid).and(mask).for_each(|v, &masked| {
                if masked {
                    *v = stamp;
                    stamped += 1;
                }
            });
            log::debug!(
                "Set {} pixels to output no-data value {}",
                stamped,
                self.output_nodata_val
            );
        }

        Ok(grid)
    }
}

/// Raise values below `min_val`. NaN is left alone.
pub fn clamp_min(grid: &mut ChmGrid, min_val: ChmValue) {
    grid.mapv_inplace(|v| if v < min_val { min_val } else { v });
}

/// Lower values above `max_val`. NaN is left alone.
pub fn clamp_max(grid: &mut ChmGrid, max_val: ChmValue) {
    grid.mapv_inplace(|v| if v > max_val { max_val } else { v });
}
