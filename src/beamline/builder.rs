// file: src/beamline/builder.rs
// description: builds the ordered stage list for the configured beamline layout
// reference: fixed beamline layouts assembled from physical parameters

use super::element::{ApertureKind, ApertureShape, Element, EllipticalMirror, TreatmentParams};
use super::{Beamline, Stage};
use crate::config::BeamlineConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeamlineLayout {
    /// drift, aperture and a Kirkpatrick-Baez mirror pair focusing to the sample
    #[default]
    KbMirrors,
    /// drift, thin lens, drift to the image plane
    ThinLens,
    /// single free-space drift
    Drift,
}

pub struct BeamlineBuilder {
    config: BeamlineConfig,
}

impl BeamlineBuilder {
    pub fn new(config: BeamlineConfig) -> Self {
        Self { config }
    }

    /// Pure construction; optical feasibility of the parameters is the
    /// caller's concern.
    pub fn build(&self) -> Result<Beamline> {
        let stages = match self.config.layout {
            BeamlineLayout::KbMirrors => self.kb_mirrors()?,
            BeamlineLayout::ThinLens => self.thin_lens()?,
            BeamlineLayout::Drift => self.single_drift()?,
        };
        Ok(Beamline::from_stages(stages))
    }

    fn kb_mirrors(&self) -> Result<Vec<Stage>> {
        let cfg = &self.config;
        let theta = cfg.theta_kb;
        let distance_hfm_vfm = cfg.f_hfm - cfg.f_vfm;
        let distance_foc = 1.0 / (1.0 / cfg.f_vfm + 1.0 / (cfg.distance + distance_hfm_vfm));

        let hfm = EllipticalMirror {
            p: cfg.distance,
            q: distance_hfm_vfm + distance_foc,
            grazing_angle: theta,
            sagittal_radius: 1.0e40,
            tangential_size: 0.9,
            normal: [theta.cos(), 0.0, -theta.sin()],
            tangent: [-theta.sin(), 0.0],
            offset: [0.0, 0.0],
            treat_in_out: true,
        };
        let vfm = EllipticalMirror {
            p: cfg.distance + distance_hfm_vfm,
            q: distance_foc,
            normal: [0.0, theta.cos(), -theta.sin()],
            tangent: [0.0, -theta.sin()],
            ..hfm
        };

        Ok(vec![
            Stage::new(
                Element::Drift {
                    length: cfg.distance,
                },
                TreatmentParams::new(false, 14.4, 0.5)?,
            ),
            Stage::new(
                Element::Aperture {
                    shape: ApertureShape::Rectangular,
                    kind: ApertureKind::Aperture,
                    half_width_x: 0.45 * theta,
                    half_width_y: 0.45 * theta,
                    offset_x: 0.0,
                    offset_y: 0.0,
                },
                TreatmentParams::new(false, 3.6, 0.2)?,
            ),
            Stage::new(Element::EllipticalMirror(hfm), TreatmentParams::default()),
            Stage::new(
                Element::Drift {
                    length: distance_hfm_vfm,
                },
                TreatmentParams::semi_analytical(),
            ),
            Stage::new(Element::EllipticalMirror(vfm), TreatmentParams::default()),
            Stage::new(
                Element::Drift {
                    length: distance_foc,
                },
                TreatmentParams::semi_analytical(),
            ),
        ])
    }

    fn thin_lens(&self) -> Result<Vec<Stage>> {
        let cfg = &self.config;
        let focal = cfg.focal_length;
        let image_distance = 1.0 / (1.0 / focal - 1.0 / cfg.distance);

        Ok(vec![
            Stage::new(
                Element::Drift {
                    length: cfg.distance,
                },
                TreatmentParams::new(true, 0.5, 8.0)?,
            ),
            Stage::new(
                Element::Lens {
                    focal_x: focal,
                    focal_y: focal,
                },
                TreatmentParams::default(),
            ),
            Stage::new(
                Element::Drift {
                    length: image_distance,
                },
                TreatmentParams::new(true, 4.2, 0.5)?,
            ),
        ])
    }

    fn single_drift(&self) -> Result<Vec<Stage>> {
        Ok(vec![Stage::new(
            Element::Drift {
                length: self.config.distance,
            },
            TreatmentParams::new(true, 0.1, 4.0)?,
        )])
    }
}
