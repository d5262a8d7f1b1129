// file: src/beamline/element.rs
// description: optical elements and per-stage numerical treatment parameters
// reference: internal data structures

use crate::error::{PropagationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApertureShape {
    Rectangular,
    Circular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApertureKind {
    /// transmits inside the opening
    Aperture,
    /// blocks inside the opening
    Obstacle,
}

/// Grazing-incidence elliptical mirror.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipticalMirror {
    /// distance from the source to the mirror centre
    pub p: f64,
    /// distance from the mirror centre to the focus
    pub q: f64,
    pub grazing_angle: f64,
    pub sagittal_radius: f64,
    pub tangential_size: f64,
    /// central surface normal
    pub normal: [f64; 3],
    /// central tangential vector (x, y)
    pub tangent: [f64; 2],
    /// mirror centre offset (x, y)
    pub offset: [f64; 2],
    pub treat_in_out: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Drift {
        length: f64,
    },
    Lens {
        focal_x: f64,
        focal_y: f64,
    },
    Aperture {
        shape: ApertureShape,
        kind: ApertureKind,
        half_width_x: f64,
        half_width_y: f64,
        offset_x: f64,
        offset_y: f64,
    },
    EllipticalMirror(EllipticalMirror),
}

impl Element {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Drift { .. } => "Drift",
            Self::Lens { .. } => "Lens",
            Self::Aperture { .. } => "Aperture",
            Self::EllipticalMirror(_) => "EllipticalMirror",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optical Element: {}", self.name())?;
        match self {
            Self::Drift { length } => writeln!(f, "\tlength = {}", length),
            Self::Lens { focal_x, focal_y } => {
                writeln!(f, "\tfocal_x = {}", focal_x)?;
                writeln!(f, "\tfocal_y = {}", focal_y)
            }
            Self::Aperture {
                shape,
                kind,
                half_width_x,
                half_width_y,
                offset_x,
                offset_y,
            } => {
                writeln!(f, "\tshape = {:?}", shape)?;
                writeln!(f, "\tkind = {:?}", kind)?;
                writeln!(f, "\thalf_width = ({}, {})", half_width_x, half_width_y)?;
                writeln!(f, "\toffset = ({}, {})", offset_x, offset_y)
            }
            Self::EllipticalMirror(m) => {
                writeln!(f, "\tp = {}", m.p)?;
                writeln!(f, "\tq = {}", m.q)?;
                writeln!(f, "\tgrazing_angle = {}", m.grazing_angle)?;
                writeln!(f, "\tsagittal_radius = {}", m.sagittal_radius)?;
                writeln!(f, "\ttangential_size = {}", m.tangential_size)?;
                writeln!(f, "\tnormal = {:?}", m.normal)?;
                writeln!(f, "\ttangent = {:?}", m.tangent)?;
                writeln!(f, "\toffset = {:?}", m.offset)?;
                writeln!(f, "\ttreat_in_out = {}", m.treat_in_out)
            }
        }
    }
}

/// Numerical treatment knobs handed to the engine along with an element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TreatmentParams {
    semi_analytical: bool,
    zoom: f64,
    sampling: f64,
}

impl Default for TreatmentParams {
    fn default() -> Self {
        Self {
            semi_analytical: false,
            zoom: 1.0,
            sampling: 1.0,
        }
    }
}

impl TreatmentParams {
    pub fn new(semi_analytical: bool, zoom: f64, sampling: f64) -> Result<Self> {
        if !(zoom > 0.0) || !zoom.is_finite() {
            return Err(PropagationError::Config(format!(
                "zoom must be strictly positive, got {}",
                zoom
            )));
        }
        if !(sampling > 0.0) || !sampling.is_finite() {
            return Err(PropagationError::Config(format!(
                "sampling must be strictly positive, got {}",
                sampling
            )));
        }
        Ok(Self {
            semi_analytical,
            zoom,
            sampling,
        })
    }

    pub fn semi_analytical() -> Self {
        Self {
            semi_analytical: true,
            ..Self::default()
        }
    }

    pub fn is_semi_analytical(&self) -> bool {
        self.semi_analytical
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn sampling(&self) -> f64 {
        self.sampling
    }
}

impl fmt::Display for TreatmentParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Prop. parameters = [semi_analytical={}, zoom={}, sampling={}]",
            self.semi_analytical, self.zoom, self.sampling
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_treatment_params_reject_non_positive() {
        assert!(TreatmentParams::new(false, 0.0, 1.0).is_err());
        assert!(TreatmentParams::new(false, 1.0, -2.0).is_err());
        assert!(TreatmentParams::new(false, f64::NAN, 1.0).is_err());
        assert!(TreatmentParams::new(false, 1.0, f64::INFINITY).is_err());

        let params = TreatmentParams::new(true, 14.4, 0.5).unwrap();
        assert!(params.is_semi_analytical());
        assert_eq!(params.zoom(), 14.4);
        assert_eq!(params.sampling(), 0.5);
    }

    #[test]
    fn test_defaults() {
        let params = TreatmentParams::default();
        assert!(!params.is_semi_analytical());
        assert_eq!((params.zoom(), params.sampling()), (1.0, 1.0));
        assert!(TreatmentParams::semi_analytical().is_semi_analytical());
    }

    #[test]
    fn test_element_printout() {
        let drift = Element::Drift { length: 300.0 };
        assert_eq!(drift.to_string(), "Optical Element: Drift\n\tlength = 300\n");
        assert_eq!(
            TreatmentParams::default().to_string(),
            "Prop. parameters = [semi_analytical=false, zoom=1, sampling=1]"
        );
    }
}
