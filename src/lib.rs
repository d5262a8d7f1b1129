// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod beamline;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod lineage;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod utils;

pub use beamline::{Beamline, BeamlineBuilder, BeamlineLayout, Element, Stage, TreatmentParams};
pub use config::{BatchConfig, BeamlineConfig, Config, MetadataConfig, ResizeConfig};
pub use container::{ContainerError, ContainerFile, Group, MetaValue, Node};
pub use engine::{ContainerEngine, Engine, ResizeSpec};
pub use error::{ErrorKind, PropagationError, Result};
pub use lineage::LineageMerger;
pub use metrics::{Fwhm, calculate_fwhm};
pub use pipeline::{
    BatchCoordinator, BatchNaming, BatchReport, BatchStats, ItemOutcome, ItemStatus, Propagator,
};
pub use record::{Domain, Mesh, Polarization, Wavefront};
pub use utils::Validator;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let config = Config::default_config();
        let propagator = Propagator::from_config(ContainerEngine::new(), &config).unwrap();
        assert_eq!(propagator.beamline().len(), 6);
        let _naming = BatchNaming::from_config(&config.batch);
    }
}
