use crate::config::PassParameters;
use crate::types::{ChmGrid, ChmResult};
use ndarray::Array2;

/// Cavity and spike repair kernel.
///
/// `repair` takes ownership of a buffer and returns a grid of the same shape.
/// Implementations may reuse the buffer's memory for the result.
pub trait Repairer {
    fn name(&self) -> &'static str;

    fn repair(&self, buffer: ChmGrid, params: &PassParameters) -> ChmResult<ChmGrid>;
}

/// Laplacian detector with median replacement.
///
/// For each pass:
/// 1. response `r = z - mean(neighbours)` over a square window of half-width
///    `max(1, lap_size / 2)`, finite neighbours only
/// 2. cavity where `-r > thr_lap`, spike where `r > thr_spk`
/// 3. flagged cells grown by a disc of radius `dil_radius`
/// 4. flagged cells replaced by the median of the unflagged, finite input
///    values in a window of half-width `max(1, med_size / 2)`, widened by the
///    same step until at least one value is found
///
/// Unflagged cells are passed through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaplacianRepairer;

impl LaplacianRepairer {
    pub fn new() -> Self {
        Self
    }

    /// Centre minus neighbourhood mean. NaN where the centre is not finite.
    pub fn laplacian_response(&self, grid: &ChmGrid, lap_size: usize) -> Array2<f32> {
        let (rows, cols) = grid.dim();
        let half = (lap_size / 2).max(1) as isize;
        let mut response = Array2::<f32>::zeros((rows, cols));

        for i in 0..rows {
            for j in 0..cols {
                let centre = grid[[i, j]];
                if !centre.is_finite() {
                    response[[i, j]] = f32::NAN;
                    continue;
                }

                let mut sum = 0.0f64;
                let mut count = 0usize;
                for di in -half..=half {
                    for dj in -half..=half {
                        if di == 0 && dj == 0 {
                            continue;
                        }
                        let ii = i as isize + di;
                        let jj = j as isize + dj;
                        if ii < 0 || jj < 0 || ii >= rows as isize || jj >= cols as isize {
                            continue;
                        }
                        let v = grid[[ii as usize, jj as usize]];
                        if v.is_finite() {
                            sum += v as f64;
                            count += 1;
                        }
                    }
                }

                if count > 0 {
                    response[[i, j]] = (centre as f64 - sum / count as f64) as f32;
                }
            }
        }

        response
    }

    /// Cells whose response crosses the cavity or spike threshold
    pub fn detect(&self, grid: &ChmGrid, params: &PassParameters) -> Array2<bool> {
        let response = self.laplacian_response(grid, params.lap_size);

        let mut cavities = 0usize;
        let mut spikes = 0usize;
        let flagged = response.mapv(|r| {
            if -r > params.thr_lap {
                cavities += 1;
                true
            } else if r > params.thr_spk {
                spikes += 1;
                true
            } else {
                false
            }
        });

        log::debug!("Detected {} cavity and {} spike pixels", cavities, spikes);
        flagged
    }

    fn fill_flagged(&self, mut grid: ChmGrid, flagged: &Array2<bool>, med_size: usize) -> ChmGrid {
        let (rows, cols) = grid.dim();
        let step = (med_size / 2).max(1);

        let has_source = grid
            .iter()
            .zip(flagged.iter())
            .any(|(v, &is_flagged)| !is_flagged && v.is_finite());
        if !has_source {
            log::warn!("Every pixel is flagged, no replacement values available");
            return grid;
        }

        let mut replacements: Vec<((usize, usize), f32)> = Vec::new();
        let mut window_values: Vec<f32> = Vec::new();

        for ((i, j), &is_flagged) in flagged.indexed_iter() {
            if !is_flagged {
                continue;
            }

            let mut half = step;
            loop {
                window_values.clear();
                let r0 = i.saturating_sub(half);
                let r1 = (i + half).min(rows - 1);
                let c0 = j.saturating_sub(half);
                let c1 = (j + half).min(cols - 1);

                for ii in r0..=r1 {
                    for jj in c0..=c1 {
                        let v = grid[[ii, jj]];
                        if !flagged[[ii, jj]] && v.is_finite() {
                            window_values.push(v);
                        }
                    }
                }

                if let Some(median) = median(&mut window_values) {
                    replacements.push(((i, j), median));
                    break;
                }
                if r0 == 0 && c0 == 0 && r1 == rows - 1 && c1 == cols - 1 {
                    break;
                }
                half += step;
            }
        }

        log::debug!("Replacing {} flagged pixels", replacements.len());
        for ((i, j), value) in replacements {
            grid[[i, j]] = value;
        }
        grid
    }
}

impl Repairer for LaplacianRepairer {
    fn name(&self) -> &'static str {
        "laplacian-median"
    }

    fn repair(&self, buffer: ChmGrid, params: &PassParameters) -> ChmResult<ChmGrid> {
        let (rows, cols) = buffer.dim();
        if rows == 0 || cols == 0 {
            return Ok(buffer);
        }

        let flagged = self.detect(&buffer, params);
        let flagged = dilate_mask(&flagged, params.dil_radius);
        Ok(self.fill_flagged(buffer, &flagged, params.med_size))
    }
}

/// Grow `mask` by a disc of the given radius
pub fn dilate_mask(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    if radius == 0 {
        return mask.clone();
    }

    let (rows, cols) = mask.dim();
    let r = radius as isize;
    let offsets: Vec<(isize, isize)> = (-r..=r)
        .flat_map(|di| (-r..=r).map(move |dj| (di, dj)))
        .filter(|&(di, dj)| di * di + dj * dj <= r * r)
        .collect();

    let mut grown = mask.clone();
    for ((i, j), &set) in mask.indexed_iter() {
        if !set {
            continue;
        }
        for &(di, dj) in &offsets {
            let ii = i as isize + di;
            let jj = j as isize + dj;
            if ii >= 0 && jj >= 0 && ii < rows as isize && jj < cols as isize {
                grown[[ii as usize, jj as usize]] = true;
            }
        }
    }
    grown
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
