// file: src/beamline/mod.rs
// description: ordered, immutable beamline of propagation stages
// reference: internal module structure

mod builder;
mod element;

pub use builder::{BeamlineBuilder, BeamlineLayout};
pub use element::{ApertureKind, ApertureShape, Element, EllipticalMirror, TreatmentParams};

use std::fmt;

/// One element paired with the treatment the engine should apply to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub element: Element,
    pub params: TreatmentParams,
}

impl Stage {
    pub fn new(element: Element, params: TreatmentParams) -> Self {
        Self { element, params }
    }
}

/// Stage order is fixed at construction; there is no API to reorder or
/// extend a built beamline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Beamline {
    stages: Vec<Stage>,
}

impl Beamline {
    pub fn from_stages(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stage> {
        self.stages.iter()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Display for Beamline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stage in &self.stages {
            write!(f, "{}", stage.element)?;
            writeln!(f, "{}", stage.params)?;
            writeln!(f)?;
        }
        Ok(())
    }
}
