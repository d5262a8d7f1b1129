// file: src/metrics/fwhm.rs
// description: full-width-half-maximum beam size through the grid centre
// reference: beam profile summary metrics

use crate::record::{Grid2, Mesh};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fwhm {
    pub x: f64,
    pub y: f64,
}

/// Width of the part of `slice` strictly above half its maximum, in units of
/// `spacing`. A slice whose maximum is not positive has zero width.
pub fn width_above_half_max(slice: &[f64], spacing: f64) -> f64 {
    let max = slice.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > 0.0) {
        return 0.0;
    }
    let half = max / 2.0;
    let count = slice.iter().filter(|&&v| v > half).count();
    count as f64 * spacing
}

/// FWHM along x (centre row) and y (centre column) of a slice-summed grid.
pub fn calculate_fwhm(intensity: &Grid2, mesh: &Mesh) -> Fwhm {
    let x_slice = intensity.row(intensity.ny / 2);
    let y_slice = intensity.column(intensity.nx / 2);

    Fwhm {
        x: width_above_half_max(x_slice, mesh.dx()),
        y: width_above_half_max(&y_slice, mesh.dy()),
    }
}
