// file: src/metrics/spectrum.rs
// description: normalized on-axis spectrum of a wavefront
// reference: beam profile summary metrics

use crate::record::{IntensityGrid, Mesh};

/// Rows of `[slice coordinate, normalized on-axis intensity]`.
///
/// The intensity is divided by the maximum over the whole grid, so a
/// spectrum taken before and after propagation stays comparable.
pub fn on_axis_spectrum(intensity: &IntensityGrid, mesh: &Mesh) -> Vec<Vec<f64>> {
    let peak = intensity.max();
    let axis = linspace(mesh.slice_min, mesh.slice_max, mesh.n_slices);

    axis.into_iter()
        .zip(intensity.on_axis())
        .map(|(z, value)| {
            let normalized = if peak > 0.0 { value / peak } else { 0.0 };
            vec![z, normalized]
        })
        .collect()
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
