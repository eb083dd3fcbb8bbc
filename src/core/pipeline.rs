use crate::config::PipelineConfig;
use crate::core::nodata_mask::build_nodata_mask;
use crate::core::passes::PassExecutor;
use crate::core::post_process::PostProcessor;
use crate::core::repair::{LaplacianRepairer, Repairer};
use crate::io::raster::{output_path_for, read_chm, write_chm};
use crate::types::{ChmGrid, ChmResult};
use std::path::{Path, PathBuf};

/// Per-raster pipeline: mask, repair passes, post-processing
pub struct ChmPreprocessor<R: Repairer = LaplacianRepairer> {
    config: PipelineConfig,
    repairer: R,
}

impl ChmPreprocessor<LaplacianRepairer> {
    /// Pipeline backed by the built-in Laplacian kernel
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_repairer(config, LaplacianRepairer::new())
    }
}

impl<R: Repairer> ChmPreprocessor<R> {
    pub fn with_repairer(config: PipelineConfig, repairer: R) -> Self {
        Self { config, repairer }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn repairer(&self) -> &R {
        &self.repairer
    }

    /// Run the full pipeline on an in-memory grid.
    ///
    /// `nodata` is the input's declared no-data value, `None` if it has none.
    pub fn process_grid(&self, grid: ChmGrid, nodata: Option<f64>) -> ChmResult<ChmGrid> {
        let masked = build_nodata_mask(grid, nodata, self.config.nodata_policy);

        let repaired = PassExecutor::new(&self.repairer).run(&masked.working, &self.config.passes)?;

        PostProcessor::from_config(&self.config).apply(repaired, &masked.mask, masked.has_nodata)
    }

    /// Process one raster file into `dest_dir`, returning the output path
    pub fn process_file<P: AsRef<Path>>(&self, input: P) -> ChmResult<PathBuf> {
        let input = input.as_ref();
        log::info!("Processing CHM: {}", input.display());

        let raster = read_chm(input)?;
        log::debug!(
            "No-data policy: {}, input no-data value: {:?}",
            self.config.nodata_policy.name(),
            raster.nodata
        );

        if !self.config.dest_dir.exists() {
            log::info!("Creating output directory: {}", self.config.dest_dir.display());
            std::fs::create_dir_all(&self.config.dest_dir)?;
        }
        let output = output_path_for(input, &self.config.dest_dir);

        let result = self.process_grid(raster.data, raster.nodata)?;
        write_chm(&output, &result, &raster.georef, self.config.output_nodata_val)?;

        log::info!("Output written to {}", output.display());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NoDataPolicy, PassParameters};
    use ndarray::{array, Array2};

    fn config(policy: NoDataPolicy, passes: Vec<PassParameters>) -> PipelineConfig {
        PipelineConfig {
            source_dir: PathBuf::from("in"),
            dest_dir: PathBuf::from("out"),
            passes,
            nodata_policy: policy,
            output_nodata_val: -9999.0,
            min_clamp: None,
            max_clamp: None,
        }
    }

    fn unreachable_pass() -> PassParameters {
        PassParameters {
            lap_size: 3,
            thr_lap: f32::MAX,
            thr_spk: f32::MAX,
            med_size: 3,
            dil_radius: 1,
        }
    }

    #[test]
    fn test_nan_cell_restamped_with_transfer() {
        let mut grid = Array2::<f32>::from_shape_fn((4, 4), |(i, j)| (i * 4 + j) as f32 + 1.0);
        grid[[1, 2]] = f32::NAN;

        let processor =
            ChmPreprocessor::new(config(NoDataPolicy::Transfer, vec![unreachable_pass()]));
        let out = processor.process_grid(grid.clone(), Some(f64::NAN)).unwrap();

        for ((i, j), &v) in out.indexed_iter() {
            if (i, j) == (1, 2) {
                assert_eq!(v, -9999.0);
            } else {
                assert_eq!(v, grid[[i, j]]);
            }
        }
    }

    #[test]
    fn test_set_to_zero_lets_kernel_fill_hole() {
        let mut grid = Array2::<f32>::from_elem((7, 7), 12.0);
        grid[[3, 3]] = -1.0;
        let pass = PassParameters {
            lap_size: 3,
            thr_lap: 5.0,
            thr_spk: 5.0,
            med_size: 3,
            dil_radius: 0,
        };

        let processor = ChmPreprocessor::new(config(NoDataPolicy::SetToZero, vec![pass]));
        let out = processor.process_grid(grid, Some(-1.0)).unwrap();

        assert!(out.iter().all(|&v| v == 12.0));
    }

    #[test]
    fn test_clamp_then_restamp() {
        let grid = array![[-3.0, 2.0], [5.0, f32::NAN]];
        let mut cfg = config(NoDataPolicy::Transfer, vec![unreachable_pass()]);
        cfg.min_clamp = Some(0.0);
        cfg.max_clamp = Some(4.0);

        let out = ChmPreprocessor::new(cfg)
            .process_grid(grid, Some(f64::NAN))
            .unwrap();

        assert_eq!(out, array![[0.0, 2.0], [4.0, -9999.0]]);
    }
}
