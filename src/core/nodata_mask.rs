use crate::config::NoDataPolicy;
use crate::types::{ChmGrid, NoDataMask};
use ndarray::{Array2, Zip};
use std::collections::VecDeque;

/// 4-connected neighbour offsets (N, W, E, S)
const NEIGHBOURS_4: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];

/// Result of masking the input grid
#[derive(Debug, Clone)]
pub struct MaskedGrid {
    /// Grid handed to the repair passes, masked cells set to 0
    pub working: ChmGrid,
    /// Cells to re-stamp with the output no-data value
    pub mask: NoDataMask,
    /// Whether the input declared a no-data value at all
    pub has_nodata: bool,
}

/// Build the no-data mask for `grid` and neutralize the masked cells.
///
/// With no sentinel the mask is all-false and the grid is returned unchanged.
/// A NaN sentinel matches by `is_nan()`, any other sentinel by exact equality
/// after narrowing it to the grid's `f32` element type.
/// Every policy zeroes the masked cells so the repair kernel never sees the
/// sentinel; `RemoveSmallHoles` additionally drops masked regions smaller
/// than the threshold from the mask (4-connectivity).
pub fn build_nodata_mask(grid: ChmGrid, nodata: Option<f64>, policy: NoDataPolicy) -> MaskedGrid {
    let (rows, cols) = grid.dim();

    let sentinel = match nodata {
        Some(value) => value,
        None => {
            log::debug!("No input no-data value defined, mask left empty");
            return MaskedGrid {
                working: grid,
                mask: Array2::from_elem((rows, cols), false),
                has_nodata: false,
            };
        }
    };

    let mask = if sentinel.is_nan() {
        grid.mapv(|v| v.is_nan())
    } else {
        // Compare in the grid's precision; the declared value may not be exact in f32
        let sentinel = sentinel as f32;
        grid.mapv(|v| v == sentinel)
    };

    let mut working = grid;
    Zip::from(&mut working).and(&mask).for_each(|v, &masked| {
        if masked {
            *v = 0.0;
        }
    });

    let masked_count = mask.iter().filter(|&&m| m).count();
    log::info!(
        "No-data value {}: {} of {} pixels masked",
        sentinel,
        masked_count,
        rows * cols
    );

    let mask = match policy {
        NoDataPolicy::RemoveSmallHoles { hole_size_thr } => {
            // Small masked regions are holes in the valid area
            let shrunk = invert(&fill_small_holes(&invert(&mask), hole_size_thr));
            let kept = shrunk.iter().filter(|&&m| m).count();
            log::info!(
                "Removed {} no-data pixels in regions smaller than {} pixels",
                masked_count - kept,
                hole_size_thr
            );
            shrunk
        }
        NoDataPolicy::Transfer | NoDataPolicy::SetToZero => mask,
    };

    MaskedGrid {
        working,
        mask,
        has_nodata: true,
    }
}

/// Set every `false` region of `valid` with fewer than `area_threshold` pixels
/// to `true`. Regions are 4-connected; regions touching the border count too.
pub fn fill_small_holes(valid: &Array2<bool>, area_threshold: usize) -> Array2<bool> {
    let mut filled = valid.clone();
    if area_threshold == 0 {
        return filled;
    }

    let (rows, cols) = valid.dim();
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    let mut region: Vec<(usize, usize)> = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if valid[[row, col]] || visited[[row, col]] {
                continue;
            }

            region.clear();
            visited[[row, col]] = true;
            queue.push_back((row, col));

            while let Some((r, c)) = queue.pop_front() {
                region.push((r, c));
                for &(dr, dc) in NEIGHBOURS_4.iter() {
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                        continue;
                    }
                    let (nr, nc) = (nr as usize, nc as usize);
                    if !valid[[nr, nc]] && !visited[[nr, nc]] {
                        visited[[nr, nc]] = true;
                        queue.push_back((nr, nc));
                    }
                }
            }

            if region.len() < area_threshold {
                for &(r, c) in &region {
                    filled[[r, c]] = true;
                }
            }
        }
    }

    filled
}

fn invert(mask: &Array2<bool>) -> Array2<bool> {
    mask.mapv(|m| !m)
}
