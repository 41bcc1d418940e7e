//! Baked signed distance field: a voxel grid plus one sample per voxel centre.

use glam::{UVec3, Vec3};
use render_api::RenderError;

use crate::grid::VoxelGrid;
use crate::sampler::VolumeSampler;

/// Negative inside the source mesh, positive outside. Immutable once built.
#[derive(Clone, Debug)]
pub struct DistanceField {
    grid: VoxelGrid,
    samples: Vec<f32>,
}

impl DistanceField {
    pub fn new(grid: VoxelGrid, samples: Vec<f32>) -> Result<Self, RenderError> {
        if samples.len() != grid.voxel_count() {
            return Err(RenderError::corrupt(format!(
                "{} samples for a {} grid ({} voxels)",
                samples.len(),
                grid.dimensions(),
                grid.voxel_count()
            )));
        }
        Ok(Self { grid, samples })
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn origin(&self) -> Vec3 {
        self.grid.origin()
    }

    pub fn spacing(&self) -> f32 {
        self.grid.spacing()
    }

    pub fn dimensions(&self) -> UVec3 {
        self.grid.dimensions()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Stored value at voxel `(i, j, k)`, or `None` outside the grid.
    pub fn get(&self, i: u32, j: u32, k: u32) -> Option<f32> {
        let d = self.grid.dimensions();
        if i >= d.x || j >= d.y || k >= d.z {
            return None;
        }
        Some(self.samples[self.grid.linear_index(i, j, k)])
    }

    /// Trilinear, edge-clamped lookup in the field's local space.
    pub fn sample(&self, p: Vec3) -> f32 {
        VolumeSampler::new(self).sample(p)
    }

    /// Smallest and largest stored values.
    pub fn value_range(&self) -> (f32, f32) {
        self.samples
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_must_match_grid() {
        let grid = VoxelGrid::new(Vec3::ZERO, 1.0, UVec3::new(2, 2, 2)).unwrap();
        assert!(matches!(DistanceField::new(grid, vec![0.0; 7]), Err(RenderError::CorruptAsset(_))));
        let field = DistanceField::new(grid, (0..8).map(|v| v as f32).collect()).unwrap();
        assert_eq!(field.get(1, 1, 1), Some(7.0));
        assert_eq!(field.get(1, 0, 0), Some(1.0));
        assert_eq!(field.get(2, 0, 0), None);
        assert_eq!(field.value_range(), (0.0, 7.0));
    }
}
