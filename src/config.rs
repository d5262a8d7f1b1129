// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::beamline::BeamlineLayout;
use crate::error::{PropagationError, Result};
use crate::utils::Validator;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub batch: BatchConfig,
    pub beamline: BeamlineConfig,
    pub resize: ResizeConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    pub input_prefix: String,
    pub output_prefix: String,
    pub extension: String,
    /// Falls back to half the available hardware parallelism.
    pub workers: Option<usize>,
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BeamlineConfig {
    #[serde(default)]
    pub layout: BeamlineLayout,
    pub distance: f64,
    pub focal_length: f64,
    pub f_hfm: f64,
    pub f_vfm: f64,
    pub theta_kb: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResizeConfig {
    pub enabled: bool,
    #[serde(default)]
    pub use_fft: bool,
    pub x_range: f64,
    pub x_resolution: f64,
    pub y_range: f64,
    pub y_resolution: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    pub record_spectrum: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    pub contact: Vec<String>,
    pub data_description: String,
    pub method_description: String,
    pub package_version: String,
}

fn default_true() -> bool {
    true
}

/// Half the available parallelism, rounded up, never below one.
pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.div_ceil(2).max(1)
}

impl Default for BeamlineConfig {
    fn default() -> Self {
        Self {
            layout: BeamlineLayout::KbMirrors,
            distance: 300.0,
            focal_length: 2.0,
            f_hfm: 3.0,
            f_vfm: 1.9,
            theta_kb: 3.5e-3,
        }
    }
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_fft: false,
            x_range: 0.25,
            x_resolution: 1.0,
            y_range: 0.25,
            y_resolution: 1.0,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            record_spectrum: true,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            contact: vec![
                "Name: Liubov Samoylova".to_string(),
                "Email: liubov.samoylova@xfel.eu".to_string(),
                "Name: Alexey Buzmakov".to_string(),
                "Email: buzmakov@gmail.com".to_string(),
            ],
            data_description: "This dataset contains information about wavefront propagated through beamline (WPG and SRW frameworks).".to_string(),
            method_description: "WPG, WaveProperGator (http://github.com/samoylv/WPG) is an interactive simulation framework for coherent X-ray wavefront propagation.\nSRW, Synchrotron Radiation Workshop (http://github.com/ochubar/SRW), is a physical optics computer code for simulation of the radiation wavefront propagation through optical systems of beamlines as well as detailed characteristics of Synchrotron Radiation (SR) generated by relativistic electrons in magnetic fields of arbitrary configuration.".to_string(),
            package_version: "2014.1".to_string(),
        }
    }
}

impl BatchConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count)
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("WAVEFRONT_PROP")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PropagationError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PropagationError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            batch: BatchConfig {
                input_prefix: "FELsource_out".to_string(),
                output_prefix: "prop_out".to_string(),
                extension: "h5".to_string(),
                workers: None,
                show_progress: true,
            },
            beamline: BeamlineConfig::default(),
            resize: ResizeConfig::default(),
            metrics: MetricsConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.batch.workers {
            Validator::validate_worker_count(workers)?;
        }

        Validator::validate_prefixes(&self.batch.input_prefix, &self.batch.output_prefix)?;

        if self.batch.extension.trim().is_empty() {
            return Err(PropagationError::Config(
                "extension must not be empty".to_string(),
            ));
        }

        let beamline = &self.beamline;
        for (name, value) in [
            ("distance", beamline.distance),
            ("focal_length", beamline.focal_length),
            ("f_hfm", beamline.f_hfm),
            ("f_vfm", beamline.f_vfm),
        ] {
            if !(value > 0.0) {
                return Err(PropagationError::Config(format!(
                    "beamline.{} must be greater than 0",
                    name
                )));
            }
        }

        if self.resize.enabled {
            for (name, value) in [
                ("x_range", self.resize.x_range),
                ("x_resolution", self.resize.x_resolution),
                ("y_range", self.resize.y_range),
                ("y_resolution", self.resize.y_resolution),
            ] {
                if !(value > 0.0) {
                    return Err(PropagationError::Config(format!(
                        "resize.{} must be greater than 0",
                        name
                    )));
                }
            }
        }

        Ok(())
    }
}
