// file: src/record/intensity.rs
// description: intensity grids derived from the field payload
// reference: internal data structures

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarization {
    Horizontal,
    Vertical,
    Total,
}

/// Intensity over `(ix, iy, iz)`, stored with the slice index fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityGrid {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    values: Vec<f64>,
}

impl IntensityGrid {
    pub fn new(nx: usize, ny: usize, nz: usize, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), nx * ny * nz);
        Self { nx, ny, nz, values }
    }

    pub fn get(&self, ix: usize, iy: usize, iz: usize) -> f64 {
        self.values[(iy * self.nx + ix) * self.nz + iz]
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    pub fn sum_slices(&self) -> Grid2 {
        let values = self
            .values
            .chunks(self.nz)
            .map(|pixel| pixel.iter().sum())
            .collect();
        Grid2::new(self.nx, self.ny, values)
    }

    /// Intensity along the slice axis through the centre pixel.
    pub fn on_axis(&self) -> Vec<f64> {
        let (cx, cy) = (self.nx / 2, self.ny / 2);
        (0..self.nz).map(|iz| self.get(cx, cy, iz)).collect()
    }
}

/// Row-major 2D grid: rows run along y, columns along x.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2 {
    pub nx: usize,
    pub ny: usize,
    values: Vec<f64>,
}

impl Grid2 {
    pub fn new(nx: usize, ny: usize, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), nx * ny);
        Self { nx, ny, values }
    }

    pub fn row(&self, iy: usize) -> &[f64] {
        &self.values[iy * self.nx..(iy + 1) * self.nx]
    }

    pub fn column(&self, ix: usize) -> Vec<f64> {
        (0..self.ny).map(|iy| self.values[iy * self.nx + ix]).collect()
    }
}
