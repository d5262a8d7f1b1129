// file: src/metrics/mod.rs
// description: summary metric module exports
// reference: internal module structure

mod fwhm;
mod spectrum;

pub use fwhm::{Fwhm, calculate_fwhm, width_above_half_max};
pub use spectrum::on_axis_spectrum;
