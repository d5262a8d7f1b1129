// file: src/engine/container_engine.rs
// description: reference engine backed by container files with identity stages
// reference: stateless engine operating on one owned record per call

use super::{Engine, ResizeSpec};
use crate::beamline::Stage;
use crate::container::ContainerFile;
use crate::error::{PropagationError, Result};
use crate::record::{Domain, FieldData, IntensityGrid, Mesh, Polarization, Wavefront};
use std::path::Path;
use tracing::debug;

/// Engine that persists records through [`ContainerFile`] and treats every
/// optical stage as the identity. A numerical backend is plugged in by
/// implementing [`Engine`] for it; this one keeps the pipeline runnable and
/// testable without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerEngine;

impl ContainerEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for ContainerEngine {
    fn load(&self, path: &Path) -> Result<Wavefront> {
        let load_error = |reason: String| PropagationError::Load {
            path: path.to_path_buf(),
            reason,
        };

        let file = ContainerFile::open(path).map_err(|e| load_error(e.to_string()))?;
        let wavefront = Wavefront::from_tree(file.root()).map_err(load_error)?;

        debug!(
            "Loaded {} ({}x{}x{}, {})",
            path.display(),
            wavefront.mesh.nx,
            wavefront.mesh.ny,
            wavefront.mesh.n_slices,
            wavefront.domain
        );
        Ok(wavefront)
    }

    fn store(&self, wavefront: &Wavefront, path: &Path) -> Result<()> {
        let store_error = |reason: String| PropagationError::Store {
            path: path.to_path_buf(),
            reason,
        };

        let tree = wavefront.to_tree().map_err(|e| store_error(e.to_string()))?;
        ContainerFile::create(path, tree)
            .save()
            .map_err(|e| store_error(e.to_string()))
    }

    fn set_representation(&self, wavefront: &mut Wavefront, domain: Domain) -> Result<()> {
        if wavefront.domain != domain {
            debug!("Switching representation {} -> {}", wavefront.domain, domain);
            wavefront.domain = domain;
        }
        Ok(())
    }

    fn apply_stage(&self, _wavefront: &mut Wavefront, stage: &Stage) -> Result<()> {
        debug!("Identity stage: {} ({})", stage.element.name(), stage.params);
        Ok(())
    }

    fn resize(&self, wavefront: &mut Wavefront, spec: &ResizeSpec) -> Result<()> {
        for (name, value) in [
            ("x_range", spec.x_range),
            ("x_resolution", spec.x_resolution),
            ("y_range", spec.y_range),
            ("y_resolution", spec.y_resolution),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(PropagationError::engine(
                    "resize",
                    format!("{} must be positive, got {}", name, value),
                ));
            }
        }

        let mesh = wavefront.mesh;
        let x = AxisResample::new(mesh.x_min, mesh.x_max, mesh.nx, spec.x_range, spec.x_resolution)?;
        let y = AxisResample::new(mesh.y_min, mesh.y_max, mesh.ny, spec.y_range, spec.y_resolution)?;

        let new_mesh = Mesh {
            x_min: x.min,
            x_max: x.max,
            nx: x.sources.len(),
            y_min: y.min,
            y_max: y.max,
            ny: y.sources.len(),
            ..mesh
        };

        let samples = new_mesh
            .sample_count()
            .filter(|&n| n <= MAX_RESIZED_SAMPLES)
            .ok_or_else(|| {
                PropagationError::engine(
                    "resize",
                    format!(
                        "resized grid {}x{}x{} exceeds {} samples",
                        new_mesh.nx, new_mesh.ny, new_mesh.n_slices, MAX_RESIZED_SAMPLES
                    ),
                )
            })?;

        let nz = mesh.n_slices;
        let mut field = FieldData::zeros(samples);
        for (iy, src_y) in y.sources.iter().enumerate() {
            for (ix, src_x) in x.sources.iter().enumerate() {
                let (Some(sy), Some(sx)) = (*src_y, *src_x) else {
                    continue;
                };
                for iz in 0..nz {
                    let dst = ((iy * new_mesh.nx + ix) * nz + iz) * 2;
                    let src = ((sy * mesh.nx + sx) * nz + iz) * 2;
                    field.horizontal[dst..dst + 2]
                        .copy_from_slice(&wavefront.field.horizontal[src..src + 2]);
                    field.vertical[dst..dst + 2]
                        .copy_from_slice(&wavefront.field.vertical[src..src + 2]);
                }
            }
        }

        debug!(
            "Resized {}x{} -> {}x{}",
            mesh.nx, mesh.ny, new_mesh.nx, new_mesh.ny
        );
        wavefront.mesh = new_mesh;
        wavefront.field = field;
        Ok(())
    }

    fn intensity(
        &self,
        wavefront: &Wavefront,
        polarization: Polarization,
    ) -> Result<IntensityGrid> {
        Ok(wavefront.intensity(polarization))
    }
}

/// Upper bound on the samples per axis produced by a resize.
const MAX_AXIS_SAMPLES: usize = 1 << 20;
/// Upper bound on the samples per polarization produced by a resize.
const MAX_RESIZED_SAMPLES: usize = 1 << 27;

/// Nearest-sample mapping of a centred window onto one axis.
struct AxisResample {
    min: f64,
    max: f64,
    sources: Vec<Option<usize>>,
}

impl AxisResample {
    fn new(min: f64, max: f64, n: usize, range: f64, resolution: f64) -> Result<Self> {
        let centre = (min + max) / 2.0;
        let half = (max - min) * range / 2.0;
        let (new_min, new_max) = (centre - half, centre + half);
        let target = ((n as f64) * range * resolution).round().max(1.0);
        if !(target <= MAX_AXIS_SAMPLES as f64) {
            return Err(PropagationError::engine(
                "resize",
                format!(
                    "{} samples per axis requested, at most {} allowed",
                    target, MAX_AXIS_SAMPLES
                ),
            ));
        }
        let new_n = target as usize;

        let src_step = (max - min) / n as f64;
        let dst_step = (new_max - new_min) / new_n as f64;

        let sources = (0..new_n)
            .map(|j| {
                let centre_j = new_min + (j as f64 + 0.5) * dst_step;
                let pos = (centre_j - min) / src_step;
                (pos >= 0.0 && pos < n as f64).then(|| pos.floor() as usize)
            })
            .collect();

        Ok(Self {
            min: new_min,
            max: new_max,
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beamline::{Element, TreatmentParams};
    use crate::container::MetaValue;
    use tempfile::TempDir;

    fn ramp() -> Wavefront {
        let mesh = Mesh::transverse((-1.0, 1.0), 4, (-1.0, 1.0), 4);
        Wavefront::from_amplitude(mesh, Domain::Time, |ix, iy, _| (iy * 4 + ix) as f64).unwrap()
    }

    fn spec(range: f64, resolution: f64) -> ResizeSpec {
        ResizeSpec {
            use_fft: false,
            x_range: range,
            x_resolution: resolution,
            y_range: range,
            y_resolution: resolution,
        }
    }

    #[test]
    fn test_resize_crops_centre() {
        let engine = ContainerEngine::new();
        let mut wf = ramp();

        engine.resize(&mut wf, &spec(0.5, 1.0)).unwrap();

        assert_eq!((wf.mesh.nx, wf.mesh.ny), (2, 2));
        assert_eq!((wf.mesh.x_min, wf.mesh.x_max), (-0.5, 0.5));
        let intensity = wf.intensity(Polarization::Horizontal);
        // original pixels (1,1) (2,1) (1,2) (2,2) hold amplitudes 5 6 9 10
        assert_eq!(intensity.get(0, 0, 0), 25.0);
        assert_eq!(intensity.get(1, 0, 0), 36.0);
        assert_eq!(intensity.get(0, 1, 0), 81.0);
        assert_eq!(intensity.get(1, 1, 0), 100.0);
    }

    #[test]
    fn test_resize_enlarging_pads_with_zeros() {
        let engine = ContainerEngine::new();
        let mut wf = ramp();

        engine.resize(&mut wf, &spec(2.0, 1.0)).unwrap();

        assert_eq!((wf.mesh.nx, wf.mesh.ny), (8, 8));
        assert_eq!((wf.mesh.x_min, wf.mesh.x_max), (-2.0, 2.0));
        let intensity = wf.intensity(Polarization::Total);
        assert_eq!(intensity.get(0, 0, 0), 0.0);
        assert_eq!(intensity.get(3, 3, 0), 25.0);
        assert!(wf.validate().is_ok());
    }

    #[test]
    fn test_resize_rejects_non_positive_fraction() {
        let engine = ContainerEngine::new();
        let mut wf = ramp();
        let err = engine.resize(&mut wf, &spec(0.0, 1.0)).unwrap_err();
        assert!(matches!(err, PropagationError::Engine { .. }));
        assert_eq!(wf, ramp());
    }

    #[test]
    fn test_resize_rejects_oversized_target() {
        let engine = ContainerEngine::new();
        let mut wf = ramp();

        let err = engine.resize(&mut wf, &spec(1.0e12, 1.0)).unwrap_err();
        assert!(matches!(err, PropagationError::Engine { .. }));

        // each axis fits on its own, the product does not
        let err = engine
            .resize(&mut wf, &spec(100_000.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, PropagationError::Engine { .. }));
        assert_eq!(wf, ramp());
    }

    #[test]
    fn test_stages_and_representation_keep_payload() {
        let engine = ContainerEngine::new();
        let mut wf = ramp();
        let stage = Stage::new(Element::Drift { length: 1.0 }, TreatmentParams::default());

        engine.set_representation(&mut wf, Domain::Frequency).unwrap();
        engine.apply_stage(&mut wf, &stage).unwrap();
        assert_eq!(wf.domain, Domain::Frequency);
        engine.set_representation(&mut wf, Domain::Time).unwrap();
        assert_eq!(wf, ramp());
    }

    #[test]
    fn test_store_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("prop_out_0000001.h5");
        let engine = ContainerEngine::new();

        engine.store(&ramp(), &path).unwrap();
        assert_eq!(engine.load(&path).unwrap(), ramp());

        let err = engine.load(&temp.path().join("missing.h5")).unwrap_err();
        assert!(matches!(err, PropagationError::Load { .. }));

        let err = engine
            .store(&ramp(), &temp.path().join("no/such/dir/out.h5"))
            .unwrap_err();
        assert!(matches!(err, PropagationError::Store { .. }));
    }

    #[test]
    fn test_store_rejects_non_finite_payload() {
        let temp = TempDir::new().unwrap();
        let engine = ContainerEngine::new();

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let path = temp.path().join("prop_out_nan.h5");
            let mut wf = ramp();
            wf.field.horizontal[3] = bad;

            let err = engine.store(&wf, &path).unwrap_err();
            assert!(matches!(err, PropagationError::Store { .. }), "{}", bad);
            assert!(!path.exists());
        }

        // what is stored can always be loaded back
        let path = temp.path().join("prop_out_ok.h5");
        let mut wf = ramp();
        wf.field.vertical[5] = -1.5e-300;
        engine.store(&wf, &path).unwrap();
        assert_eq!(engine.load(&path).unwrap(), wf);
    }

    #[test]
    fn test_load_rejects_overflowing_mesh_without_panicking() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("FELsource_out_huge.h5");

        let mut tree = ramp().to_tree().unwrap();
        tree.insert("data/arrEhor", MetaValue::FloatArray(vec![])).unwrap();
        tree.insert("data/arrEver", MetaValue::FloatArray(vec![])).unwrap();
        tree.insert("params/Mesh/nx", MetaValue::Int(1 << 32)).unwrap();
        tree.insert("params/Mesh/ny", MetaValue::Int(1 << 32)).unwrap();
        ContainerFile::create(&path, tree).save().unwrap();

        let err = ContainerEngine::new().load(&path).unwrap_err();
        assert!(matches!(err, PropagationError::Load { .. }));
    }
}
