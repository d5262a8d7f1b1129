// file: src/record/wavefront.rs
// description: in-memory wavefront record with mesh, field payload and custom fields
// reference: internal data structures

use super::intensity::{IntensityGrid, Polarization};
use crate::container::{Group, MetaValue, Node};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DATA_BRANCH: &str = "data";
pub const HISTORY_BRANCH: &str = "history";

const HORIZONTAL_FIELD: &str = "data/arrEhor";
const VERTICAL_FIELD: &str = "data/arrEver";
const MESH_GROUP: &str = "params/Mesh";
const DOMAIN_FIELD: &str = "params/wDomain";

/// Representation of the field payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Frequency,
    Time,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frequency => "frequency",
            Self::Time => "time",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "frequency" | "f" => Some(Self::Frequency),
            "time" | "t" => Some(Self::Time),
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling grid: two transverse axes and one spectral/temporal axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub x_min: f64,
    pub x_max: f64,
    pub nx: usize,
    pub y_min: f64,
    pub y_max: f64,
    pub ny: usize,
    pub slice_min: f64,
    pub slice_max: f64,
    pub n_slices: usize,
}

impl Mesh {
    pub fn transverse(x: (f64, f64), nx: usize, y: (f64, f64), ny: usize) -> Self {
        Self {
            x_min: x.0,
            x_max: x.1,
            nx,
            y_min: y.0,
            y_max: y.1,
            ny,
            slice_min: 0.0,
            slice_max: 0.0,
            n_slices: 1,
        }
    }

    pub fn dx(&self) -> f64 {
        (self.x_max - self.x_min) / self.nx as f64
    }

    pub fn dy(&self) -> f64 {
        (self.y_max - self.y_min) / self.ny as f64
    }

    /// Samples per polarization, or `None` when the grid (with its re/im
    /// interleaving) cannot be addressed.
    pub fn sample_count(&self) -> Option<usize> {
        let samples = self.nx.checked_mul(self.ny)?.checked_mul(self.n_slices)?;
        samples.checked_mul(2)?;
        Some(samples)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.nx == 0 || self.ny == 0 || self.n_slices == 0 {
            return Err(format!(
                "sample counts must be positive (nx={}, ny={}, nSlices={})",
                self.nx, self.ny, self.n_slices
            ));
        }
        if self.sample_count().is_none() {
            return Err(format!(
                "grid of {} x {} x {} samples is too large",
                self.nx, self.ny, self.n_slices
            ));
        }
        if !(self.x_min < self.x_max) {
            return Err(format!("xMin {} must be below xMax {}", self.x_min, self.x_max));
        }
        if !(self.y_min < self.y_max) {
            return Err(format!("yMin {} must be below yMax {}", self.y_min, self.y_max));
        }
        // a single slice may sit on one photon energy / instant
        let slices_ok = if self.n_slices == 1 {
            self.slice_min <= self.slice_max
        } else {
            self.slice_min < self.slice_max
        };
        if !slices_ok {
            return Err(format!(
                "sliceMin {} must be below sliceMax {}",
                self.slice_min, self.slice_max
            ));
        }
        Ok(())
    }
}

/// Complex field samples for both polarizations, interleaved re/im with
/// index `((iy * nx + ix) * n_slices + is)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldData {
    pub horizontal: Vec<f64>,
    pub vertical: Vec<f64>,
}

impl FieldData {
    pub fn zeros(samples: usize) -> Self {
        Self {
            horizontal: vec![0.0; samples * 2],
            vertical: vec![0.0; samples * 2],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Wavefront {
    pub mesh: Mesh,
    pub field: FieldData,
    pub domain: Domain,
    pub custom_fields: BTreeMap<String, MetaValue>,
}

impl Wavefront {
    pub fn new(mesh: Mesh, field: FieldData, domain: Domain) -> Result<Self, String> {
        let wavefront = Self {
            mesh,
            field,
            domain,
            custom_fields: BTreeMap::new(),
        };
        wavefront.validate()?;
        Ok(wavefront)
    }

    /// Builds a horizontally polarized, real-valued wavefront from an
    /// amplitude function of `(ix, iy, is)`.
    pub fn from_amplitude<F>(mesh: Mesh, domain: Domain, amplitude: F) -> Result<Self, String>
    where
        F: Fn(usize, usize, usize) -> f64,
    {
        mesh.validate()?;
        let samples = mesh
            .sample_count()
            .ok_or_else(|| "grid is too large".to_string())?;
        let mut field = FieldData::zeros(samples);
        for iy in 0..mesh.ny {
            for ix in 0..mesh.nx {
                for is in 0..mesh.n_slices {
                    let idx = (iy * mesh.nx + ix) * mesh.n_slices + is;
                    field.horizontal[2 * idx] = amplitude(ix, iy, is);
                }
            }
        }
        Self::new(mesh, field, domain)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.mesh.validate()?;
        let expected = self
            .mesh
            .sample_count()
            .and_then(|n| n.checked_mul(2))
            .ok_or_else(|| "grid is too large".to_string())?;
        if self.field.horizontal.len() != expected || self.field.vertical.len() != expected {
            return Err(format!(
                "field length mismatch: expected {} values per polarization, found {} / {}",
                expected,
                self.field.horizontal.len(),
                self.field.vertical.len()
            ));
        }
        Ok(())
    }

    pub fn set_custom_field(&mut self, path: &str, value: MetaValue) {
        self.custom_fields.insert(normalize_path(path), value);
    }

    pub fn custom_field(&self, path: &str) -> Option<&MetaValue> {
        self.custom_fields.get(&normalize_path(path))
    }

    pub fn intensity(&self, polarization: Polarization) -> IntensityGrid {
        let mesh = &self.mesh;
        let samples = self.field.horizontal.len() / 2;
        let power = |arr: &[f64], idx: usize| arr[2 * idx].powi(2) + arr[2 * idx + 1].powi(2);

        let values = (0..samples)
            .map(|idx| match polarization {
                Polarization::Horizontal => power(&self.field.horizontal, idx),
                Polarization::Vertical => power(&self.field.vertical, idx),
                Polarization::Total => {
                    power(&self.field.horizontal, idx) + power(&self.field.vertical, idx)
                }
            })
            .collect();

        IntensityGrid::new(mesh.nx, mesh.ny, mesh.n_slices, values)
    }

    pub fn to_tree(&self) -> Result<Group, crate::container::ContainerError> {
        let mut root = Group::new();
        let m = &self.mesh;

        root.insert(HORIZONTAL_FIELD, MetaValue::FloatArray(self.field.horizontal.clone()))?;
        root.insert(VERTICAL_FIELD, MetaValue::FloatArray(self.field.vertical.clone()))?;

        let mesh = root.ensure_group(MESH_GROUP)?;
        for (name, value) in [
            ("xMin", MetaValue::Float(m.x_min)),
            ("xMax", MetaValue::Float(m.x_max)),
            ("nx", MetaValue::Int(m.nx as i64)),
            ("yMin", MetaValue::Float(m.y_min)),
            ("yMax", MetaValue::Float(m.y_max)),
            ("ny", MetaValue::Int(m.ny as i64)),
            ("sliceMin", MetaValue::Float(m.slice_min)),
            ("sliceMax", MetaValue::Float(m.slice_max)),
            ("nSlices", MetaValue::Int(m.n_slices as i64)),
        ] {
            mesh.insert(name, value)?;
        }
        root.insert(DOMAIN_FIELD, MetaValue::Text(self.domain.as_str().to_string()))?;

        for (path, value) in &self.custom_fields {
            root.insert(path, value.clone())?;
        }

        Ok(root)
    }

    /// Decodes a record tree. Any `history` branch is ignored; lineage is
    /// attached separately after the record is stored.
    pub fn from_tree(root: &Group) -> Result<Self, String> {
        let float_array = |path: &str| {
            root.get_value(path)
                .and_then(MetaValue::as_float_array)
                .map(<[f64]>::to_vec)
                .ok_or_else(|| format!("missing float array /{}", path))
        };
        let mesh_group = root
            .get_group(MESH_GROUP)
            .ok_or_else(|| format!("missing group /{}", MESH_GROUP))?;
        let number = |name: &str| {
            mesh_group
                .get_value(name)
                .and_then(MetaValue::as_f64)
                .ok_or_else(|| format!("missing mesh parameter {}", name))
        };
        let count = |name: &str| -> Result<usize, String> {
            match mesh_group.get_value(name) {
                Some(MetaValue::Int(n)) if *n > 0 => usize::try_from(*n)
                    .map_err(|_| format!("mesh parameter {} is too large: {}", name, n)),
                Some(other) => Err(format!("mesh parameter {} is not a positive count: {:?}", name, other)),
                None => Err(format!("missing mesh parameter {}", name)),
            }
        };

        let mesh = Mesh {
            x_min: number("xMin")?,
            x_max: number("xMax")?,
            nx: count("nx")?,
            y_min: number("yMin")?,
            y_max: number("yMax")?,
            ny: count("ny")?,
            slice_min: number("sliceMin")?,
            slice_max: number("sliceMax")?,
            n_slices: count("nSlices")?,
        };

        let domain_tag = root
            .get_value(DOMAIN_FIELD)
            .and_then(MetaValue::as_str)
            .ok_or_else(|| format!("missing /{}", DOMAIN_FIELD))?;
        let domain = Domain::parse(domain_tag)
            .ok_or_else(|| format!("unknown representation {:?}", domain_tag))?;

        let field = FieldData {
            horizontal: float_array(HORIZONTAL_FIELD)?,
            vertical: float_array(VERTICAL_FIELD)?,
        };

        let mut wavefront = Self::new(mesh, field, domain)?;

        for (path, node) in root.leaves() {
            if is_reserved(&path) {
                continue;
            }
            if let Node::Value(value) = node {
                wavefront.custom_fields.insert(path, value.clone());
            }
        }

        Ok(wavefront)
    }
}

fn normalize_path(path: &str) -> String {
    let joined: Vec<&str> = crate::container::segments(path).collect();
    format!("/{}", joined.join("/"))
}

fn is_reserved(path: &str) -> bool {
    let trimmed = path.trim_start_matches('/');
    trimmed.starts_with("data/")
        || trimmed.starts_with("history/")
        || trimmed.starts_with("params/Mesh/")
        || trimmed == DOMAIN_FIELD
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_mesh() -> Mesh {
        Mesh::transverse((-1.0, 1.0), 4, (-1.0, 1.0), 4)
    }

    #[test]
    fn test_mesh_spacing_and_validation() {
        let mesh = sample_mesh();
        assert_eq!(mesh.dx(), 0.5);
        assert_eq!(mesh.dy(), 0.5);
        assert!(mesh.validate().is_ok());

        let mut inverted = mesh;
        inverted.x_min = 2.0;
        assert!(inverted.validate().is_err());

        let mut empty = mesh;
        empty.ny = 0;
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_oversized_mesh_is_rejected() {
        let huge = Mesh::transverse((-1.0, 1.0), 1 << 32, (-1.0, 1.0), 1 << 32);
        assert_eq!(huge.sample_count(), None);
        assert!(huge.validate().unwrap_err().contains("too large"));
        assert_eq!(sample_mesh().sample_count(), Some(16));
    }

    #[test]
    fn test_from_tree_rejects_overflowing_counts() {
        let mut tree = Wavefront::from_amplitude(sample_mesh(), Domain::Time, |_, _, _| 1.0)
            .unwrap()
            .to_tree()
            .unwrap();
        tree.insert("data/arrEhor", MetaValue::FloatArray(vec![])).unwrap();
        tree.insert("data/arrEver", MetaValue::FloatArray(vec![])).unwrap();
        tree.insert("params/Mesh/nx", MetaValue::Int(1 << 32)).unwrap();
        tree.insert("params/Mesh/ny", MetaValue::Int(1 << 32)).unwrap();

        let err = Wavefront::from_tree(&tree).unwrap_err();
        assert!(err.contains("too large"), "{}", err);
    }

    #[test]
    fn test_field_length_must_match_mesh() {
        let result = Wavefront::new(sample_mesh(), FieldData::zeros(3), Domain::Time);
        assert!(result.is_err());
    }

    #[test]
    fn test_tree_round_trip_keeps_custom_fields() {
        let mut wf =
            Wavefront::from_amplitude(sample_mesh(), Domain::Time, |ix, iy, _| (ix + iy) as f64)
                .unwrap();
        wf.set_custom_field("misc/xFWHM", MetaValue::Float(1.0));
        wf.set_custom_field("/params/beamline/printout", MetaValue::Text("drift".into()));

        let mut tree = wf.to_tree().unwrap();
        tree.insert("history/parent/misc/old", MetaValue::Int(1)).unwrap();

        let decoded = Wavefront::from_tree(&tree).unwrap();
        assert_eq!(decoded, wf);
        assert_eq!(
            decoded.custom_field("/misc/xFWHM"),
            Some(&MetaValue::Float(1.0))
        );
        assert!(decoded.custom_field("/history/parent/misc/old").is_none());
    }

    #[test]
    fn test_from_tree_reports_missing_mesh() {
        let mut tree = Group::new();
        tree.insert("data/arrEhor", MetaValue::FloatArray(vec![])).unwrap();

        let err = Wavefront::from_tree(&tree).unwrap_err();
        assert!(err.contains("params/Mesh"));
    }

    #[test]
    fn test_intensity_sums_polarizations() {
        let mut wf = Wavefront::from_amplitude(sample_mesh(), Domain::Time, |_, _, _| 1.0).unwrap();
        wf.field.vertical[1] = 2.0;

        let total = wf.intensity(Polarization::Total);
        let horizontal = wf.intensity(Polarization::Horizontal);
        assert_eq!(total.get(0, 0, 0), 5.0);
        assert_eq!(horizontal.get(0, 0, 0), 1.0);
        assert_eq!(wf.intensity(Polarization::Vertical).get(1, 0, 0), 0.0);
    }
}
