use crate::config::PassParameters;
use crate::core::repair::Repairer;
use crate::types::{ChmError, ChmGrid, ChmResult};

/// Maximum number of repair passes per raster
pub const MAX_PASSES: usize = 2;

/// Runs the configured repair passes in order
pub struct PassExecutor<'a, R: Repairer + ?Sized> {
    repairer: &'a R,
}

impl<'a, R: Repairer + ?Sized> PassExecutor<'a, R> {
    pub fn new(repairer: &'a R) -> Self {
        Self { repairer }
    }

    /// Apply every pass, each one to the previous pass's output.
    ///
    /// The kernel always receives a freshly copied buffer. No detection runs
    /// after the last configured pass.
    pub fn run(&self, working: &ChmGrid, passes: &[PassParameters]) -> ChmResult<ChmGrid> {
        if passes.is_empty() || passes.len() > MAX_PASSES {
            return Err(ChmError::Processing(format!(
                "Expected 1 to {} repair passes, got {}",
                MAX_PASSES,
                passes.len()
            )));
        }

        let shape = working.dim();
        let mut current = working.to_owned();

        for (index, params) in passes.iter().enumerate() {
            log::info!("    Pass {} of {}", index + 1, passes.len());
            log::debug!("Pass parameters: {:?}", params);

            let buffer = current.clone();
            let repaired = self.repairer.repair(buffer, params)?;

            if repaired.dim() != shape {
                return Err(ChmError::Processing(format!(
                    "Repair kernel '{}' returned a {}x{} grid for a {}x{} input",
                    self.repairer.name(),
                    repaired.nrows(),
                    repaired.ncols(),
                    shape.0,
                    shape.1
                )));
            }
            current = repaired;
        }

        Ok(current)
    }
}
