// file: src/record/mod.rs
// description: wavefront record model exports
// reference: internal module structure

pub mod intensity;
pub mod wavefront;

pub use intensity::{Grid2, IntensityGrid, Polarization};
pub use wavefront::{DATA_BRANCH, Domain, FieldData, HISTORY_BRANCH, Mesh, Wavefront};
