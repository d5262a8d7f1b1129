// file: src/pipeline/propagator.rs
// description: propagates one wavefront record end-to-end and attaches its lineage
// reference: loads a record, runs the beamline through the engine, stores and merges history

use crate::beamline::{Beamline, BeamlineBuilder};
use crate::config::{Config, MetadataConfig};
use crate::container::MetaValue;
use crate::engine::{Engine, ResizeSpec};
use crate::error::{PropagationError, Result};
use crate::lineage::LineageMerger;
use crate::metrics::{Fwhm, calculate_fwhm, on_axis_spectrum};
use crate::record::{Domain, Polarization, Wavefront};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub const SPECTRUM_BEFORE_FIELD: &str = "/misc/spectrum0";
pub const SPECTRUM_AFTER_FIELD: &str = "/misc/spectrum1";
pub const X_FWHM_FIELD: &str = "/misc/xFWHM";
pub const Y_FWHM_FIELD: &str = "/misc/yFWHM";
pub const PRINTOUT_FIELD: &str = "/params/beamline/printout";
pub const CONTACT_FIELD: &str = "/info/contact";
pub const DATA_DESCRIPTION_FIELD: &str = "/info/data_description";
pub const METHOD_DESCRIPTION_FIELD: &str = "/info/method_description";
pub const PACKAGE_VERSION_FIELD: &str = "/info/package_version";

pub struct Propagator<E: Engine> {
    engine: E,
    beamline: Beamline,
    merger: LineageMerger,
    resize: Option<ResizeSpec>,
    record_spectrum: bool,
    metadata: MetadataConfig,
}

impl<E: Engine> Propagator<E> {
    /// A propagator with no resize step, no spectrum recording and the
    /// default descriptive metadata.
    pub fn new(engine: E, beamline: Beamline) -> Self {
        Self {
            engine,
            beamline,
            merger: LineageMerger::new(),
            resize: None,
            record_spectrum: false,
            metadata: MetadataConfig::default(),
        }
    }

    pub fn from_config(engine: E, config: &Config) -> Result<Self> {
        let beamline = BeamlineBuilder::new(config.beamline.clone()).build()?;
        Ok(Self::new(engine, beamline)
            .with_resize(ResizeSpec::from_config(&config.resize))
            .with_spectrum(config.metrics.record_spectrum)
            .with_metadata(config.metadata.clone()))
    }

    pub fn with_resize(mut self, resize: Option<ResizeSpec>) -> Self {
        self.resize = resize;
        self
    }

    pub fn with_spectrum(mut self, record_spectrum: bool) -> Self {
        self.record_spectrum = record_spectrum;
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataConfig) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn beamline(&self) -> &Beamline {
        &self.beamline
    }

    /// Loads `input`, propagates it through the beamline and writes the
    /// result with its lineage to `output`.
    ///
    /// Nothing is written unless every engine step succeeds. If the lineage
    /// merge fails, the stored output is kept without a `history` branch.
    pub fn propagate(&self, input: &Path, output: &Path) -> Result<()> {
        info!("Start propagating: {}", input.display());

        let mut wavefront = self.engine.load(input)?;
        self.transform(&mut wavefront)?;
        let fwhm = self.fwhm(&wavefront)?;
        self.attach_metadata(fwhm, &mut wavefront);

        info!(
            "Saving the wavefront data after propagation: {}",
            output.display()
        );
        ensure_parent_dir(output)?;
        self.engine.store(&wavefront, output)?;

        if let Err(e) = self.merger.merge(output, input) {
            warn!(
                "Stored {} but could not attach lineage: {}",
                output.display(),
                e
            );
            return Err(e);
        }

        Ok(())
    }

    fn transform(&self, wavefront: &mut Wavefront) -> Result<()> {
        let original = wavefront.domain;
        self.engine
            .set_representation(wavefront, Domain::Frequency)?;

        if self.record_spectrum {
            self.record_on_axis_spectrum(wavefront, SPECTRUM_BEFORE_FIELD)?;
        }

        for (idx, stage) in self.beamline.iter().enumerate() {
            debug!("Stage {}/{}: {}", idx + 1, self.beamline.len(), stage.element.name());
            self.engine.apply_stage(wavefront, stage)?;
        }

        if self.record_spectrum {
            self.record_on_axis_spectrum(wavefront, SPECTRUM_AFTER_FIELD)?;
        }

        self.engine.set_representation(wavefront, original)?;

        if let Some(spec) = &self.resize {
            self.engine.resize(wavefront, spec)?;
        }

        Ok(())
    }

    fn record_on_axis_spectrum(&self, wavefront: &mut Wavefront, field: &str) -> Result<()> {
        let intensity = self
            .engine
            .intensity(wavefront, Polarization::Horizontal)?;
        let spectrum = on_axis_spectrum(&intensity, &wavefront.mesh);
        wavefront.set_custom_field(field, MetaValue::Matrix(spectrum));
        Ok(())
    }

    fn fwhm(&self, wavefront: &Wavefront) -> Result<Fwhm> {
        let intensity = self.engine.intensity(wavefront, Polarization::Total)?;
        let fwhm = calculate_fwhm(&intensity.sum_slices(), &wavefront.mesh);
        debug!("FWHM x = {:e}, y = {:e}", fwhm.x, fwhm.y);
        Ok(fwhm)
    }

    fn attach_metadata(&self, fwhm: Fwhm, wavefront: &mut Wavefront) {
        let meta = &self.metadata;
        let fields = [
            (X_FWHM_FIELD, MetaValue::Float(fwhm.x)),
            (Y_FWHM_FIELD, MetaValue::Float(fwhm.y)),
            (PRINTOUT_FIELD, MetaValue::Text(self.beamline.to_string())),
            (CONTACT_FIELD, MetaValue::TextArray(meta.contact.clone())),
            (
                DATA_DESCRIPTION_FIELD,
                MetaValue::Text(meta.data_description.clone()),
            ),
            (
                METHOD_DESCRIPTION_FIELD,
                MetaValue::Text(meta.method_description.clone()),
            ),
            (
                PACKAGE_VERSION_FIELD,
                MetaValue::Text(meta.package_version.clone()),
            ),
        ];
        for (path, value) in fields {
            wavefront.set_custom_field(path, value);
        }
    }
}

fn ensure_parent_dir(output: &Path) -> Result<()> {
    match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| PropagationError::Store {
                path: output.to_path_buf(),
                reason: format!("cannot create {}: {}", dir.display(), e),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beamline::{Element, Stage, TreatmentParams};
    use crate::container::{ContainerFile, Node};
    use crate::engine::ContainerEngine;
    use crate::record::{IntensityGrid, Mesh};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// 4 x 4 grid over [-1, 1]^2 with a 2 x 2 bright centre.
    fn centred_square() -> Wavefront {
        let mesh = Mesh::transverse((-1.0, 1.0), 4, (-1.0, 1.0), 4);
        Wavefront::from_amplitude(mesh, Domain::Time, |ix, iy, _| {
            if (1..3).contains(&ix) && (1..3).contains(&iy) {
                1.0
            } else {
                0.0
            }
        })
        .unwrap()
    }

    fn write_input(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        ContainerEngine::new().store(&centred_square(), &path).unwrap();
        path
    }

    fn two_stage_beamline() -> Beamline {
        Beamline::from_stages(vec![
            Stage::new(Element::Drift { length: 1.0 }, TreatmentParams::default()),
            Stage::new(
                Element::Lens {
                    focal_x: 2.0,
                    focal_y: 2.0,
                },
                TreatmentParams::default(),
            ),
        ])
    }

    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingEngine {
        fn failing_on(call: &'static str) -> Self {
            Self {
                fail_on: Some(call),
                ..Self::default()
            }
        }

        fn record(&self, call: String) -> Result<()> {
            let failed = self.fail_on.is_some_and(|f| call.starts_with(f));
            self.calls.lock().unwrap().push(call.clone());
            if failed {
                return Err(PropagationError::engine(&call, "injected failure"));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Engine for RecordingEngine {
        fn load(&self, _path: &Path) -> Result<Wavefront> {
            self.record("load".into())?;
            Ok(centred_square())
        }

        fn store(&self, wavefront: &Wavefront, path: &Path) -> Result<()> {
            self.record("store".into())?;
            ContainerEngine::new().store(wavefront, path)
        }

        fn set_representation(&self, wavefront: &mut Wavefront, domain: Domain) -> Result<()> {
            self.record(format!("repr:{}", domain))?;
            wavefront.domain = domain;
            Ok(())
        }

        fn apply_stage(&self, _wavefront: &mut Wavefront, stage: &Stage) -> Result<()> {
            self.record(format!("stage:{}", stage.element.name()))
        }

        fn resize(&self, _wavefront: &mut Wavefront, spec: &ResizeSpec) -> Result<()> {
            self.record(format!("resize:{:?}", spec.to_array()))
        }

        fn intensity(
            &self,
            wavefront: &Wavefront,
            polarization: Polarization,
        ) -> Result<IntensityGrid> {
            self.record(format!("intensity:{:?}", polarization))?;
            Ok(wavefront.intensity(polarization))
        }
    }

    #[test]
    fn test_identity_propagation_reports_fwhm() {
        let temp = TempDir::new().unwrap();
        let input = write_input(&temp, "FELsource_out_0000001.h5");
        let output = temp.path().join("prop/prop_out_0000001.h5");

        Propagator::new(ContainerEngine::new(), Beamline::empty())
            .propagate(&input, &output)
            .unwrap();

        let stored = ContainerEngine::new().load(&output).unwrap();
        assert_eq!(stored.custom_field(X_FWHM_FIELD), Some(&MetaValue::Float(1.0)));
        assert_eq!(stored.custom_field(Y_FWHM_FIELD), Some(&MetaValue::Float(1.0)));
        assert_eq!(
            stored.custom_field(PACKAGE_VERSION_FIELD),
            Some(&MetaValue::Text("2014.1".into()))
        );
        assert_eq!(stored.domain, Domain::Time);

        let file = ContainerFile::open(&output).unwrap();
        assert!(matches!(
            file.root().get("history/detail/data"),
            Some(Node::Link { .. })
        ));
    }

    #[test]
    fn test_engine_call_order() {
        let temp = TempDir::new().unwrap();
        let engine = RecordingEngine::default();
        let input = write_input(&temp, "in.h5");
        let output = temp.path().join("out.h5");

        let propagator = Propagator::new(engine, two_stage_beamline())
            .with_spectrum(true)
            .with_resize(Some(ResizeSpec {
                use_fft: false,
                x_range: 1.0,
                x_resolution: 1.0,
                y_range: 1.0,
                y_resolution: 1.0,
            }));
        propagator.propagate(&input, &output).unwrap();

        assert_eq!(
            propagator.engine.calls(),
            vec![
                "load",
                "repr:frequency",
                "intensity:Horizontal",
                "stage:Drift",
                "stage:Lens",
                "intensity:Horizontal",
                "repr:time",
                "resize:[0.0, 1.0, 1.0, 1.0, 1.0]",
                "intensity:Total",
                "store",
            ]
        );

        let stored = ContainerEngine::new().load(&output).unwrap();
        assert!(matches!(
            stored.custom_field(SPECTRUM_BEFORE_FIELD),
            Some(MetaValue::Matrix(rows)) if rows.len() == 1
        ));
        assert!(stored.custom_field(SPECTRUM_AFTER_FIELD).is_some());
        let printout = stored.custom_field(PRINTOUT_FIELD).unwrap().as_str().unwrap();
        assert!(printout.contains("Optical Element: Lens"));
    }

    #[test]
    fn test_engine_failure_writes_nothing() {
        for failing in ["repr:frequency", "stage:Lens", "resize", "intensity:Total"] {
            let temp = TempDir::new().unwrap();
            let input = write_input(&temp, "in.h5");
            let output = temp.path().join("out/out.h5");

            let propagator = Propagator::new(RecordingEngine::failing_on(failing), two_stage_beamline())
                .with_resize(ResizeSpec::from_config(&Default::default()));
            let err = propagator.propagate(&input, &output).unwrap_err();

            assert!(matches!(err, PropagationError::Engine { .. }), "{}", failing);
            assert!(!output.exists(), "output written after {} failed", failing);
            assert!(!propagator.engine.calls().contains(&"store".to_string()));
        }
    }

    #[test]
    fn test_first_stage_failure_skips_later_stages() {
        let temp = TempDir::new().unwrap();
        let input = write_input(&temp, "in.h5");
        let propagator =
            Propagator::new(RecordingEngine::failing_on("stage:Drift"), two_stage_beamline());

        assert!(propagator.propagate(&input, &temp.path().join("out.h5")).is_err());
        assert!(!propagator.engine.calls().contains(&"stage:Lens".to_string()));
    }

    #[test]
    fn test_missing_input_is_load_error() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("out.h5");

        let err = Propagator::new(ContainerEngine::new(), Beamline::empty())
            .propagate(&temp.path().join("FELsource_out_missing.h5"), &output)
            .unwrap_err();

        assert!(matches!(err, PropagationError::Load { .. }));
        assert!(!output.exists());
    }

    #[test]
    fn test_merge_failure_keeps_stored_output() {
        let temp = TempDir::new().unwrap();
        // the recording engine loads from memory, so the parent file never exists
        let input = temp.path().join("phantom.h5");
        let output = temp.path().join("out.h5");

        let err = Propagator::new(RecordingEngine::default(), Beamline::empty())
            .propagate(&input, &output)
            .unwrap_err();

        assert!(matches!(err, PropagationError::Merge { .. }));
        let stored = ContainerFile::open(&output).unwrap();
        assert!(!stored.root().contains("history"));
    }

    #[test]
    fn test_repeated_propagation_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let input = write_input(&temp, "in.h5");
        let output = temp.path().join("out.h5");
        let propagator = Propagator::from_config(ContainerEngine::new(), &Config::default_config())
            .unwrap();

        propagator.propagate(&input, &output).unwrap();
        let first = fs::read(&output).unwrap();
        propagator.propagate(&input, &output).unwrap();
        let second = fs::read(&output).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_store_failure_is_store_error() {
        let temp = TempDir::new().unwrap();
        let input = write_input(&temp, "in.h5");
        // a regular file where the output directory should be
        let blocker = temp.path().join("blocked");
        fs::write(&blocker, "").unwrap();

        let err = Propagator::new(ContainerEngine::new(), Beamline::empty())
            .propagate(&input, &blocker.join("out.h5"))
            .unwrap_err();
        assert!(matches!(err, PropagationError::Store { .. }));
    }
}
