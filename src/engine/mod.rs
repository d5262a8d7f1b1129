// file: src/engine/mod.rs
// description: capability interface to the numerical propagation engine
// reference: internal module structure

mod container_engine;

pub use container_engine::ContainerEngine;

use crate::beamline::Stage;
use crate::config::ResizeConfig;
use crate::error::Result;
use crate::record::{Domain, IntensityGrid, Polarization, Wavefront};
use std::path::Path;

/// Everything the propagator needs from a numerical backend.
///
/// An engine handles one record at a time and may keep state between calls.
/// Batch runs build one engine per worker instead of sharing one.
pub trait Engine: Send {
    fn load(&self, path: &Path) -> Result<Wavefront>;

    fn store(&self, wavefront: &Wavefront, path: &Path) -> Result<()>;

    fn set_representation(&self, wavefront: &mut Wavefront, domain: Domain) -> Result<()>;

    fn apply_stage(&self, wavefront: &mut Wavefront, stage: &Stage) -> Result<()>;

    fn resize(&self, wavefront: &mut Wavefront, spec: &ResizeSpec) -> Result<()>;

    fn intensity(&self, wavefront: &Wavefront, polarization: Polarization)
    -> Result<IntensityGrid>;
}

/// Fractional window and resampling factors for the transverse axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeSpec {
    pub use_fft: bool,
    pub x_range: f64,
    pub x_resolution: f64,
    pub y_range: f64,
    pub y_resolution: f64,
}

impl ResizeSpec {
    pub fn from_config(config: &ResizeConfig) -> Option<Self> {
        config.enabled.then_some(Self {
            use_fft: config.use_fft,
            x_range: config.x_range,
            x_resolution: config.x_resolution,
            y_range: config.y_range,
            y_resolution: config.y_resolution,
        })
    }

    /// `[method, x range, x resolution, y range, y resolution]`
    pub fn to_array(&self) -> [f64; 5] {
        [
            if self.use_fft { 1.0 } else { 0.0 },
            self.x_range,
            self.x_resolution,
            self.y_range,
            self.y_resolution,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_spec_from_config() {
        let config = ResizeConfig::default();
        let spec = ResizeSpec::from_config(&config).unwrap();
        assert_eq!(spec.to_array(), [0.0, 0.25, 1.0, 0.25, 1.0]);

        let disabled = ResizeConfig {
            enabled: false,
            ..config
        };
        assert!(ResizeSpec::from_config(&disabled).is_none());
    }
}
