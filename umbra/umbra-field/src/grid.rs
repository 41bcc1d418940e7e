//! Voxel grid: maps voxel indices to world-space voxel centres.

use glam::{UVec3, Vec3};
use render_api::RenderError;

use crate::bake::MAX_VOXELS;

/// Regular grid of voxel centres. `origin` is the centre of voxel (0, 0, 0).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelGrid {
    origin: Vec3,
    spacing: f32,
    dimensions: UVec3,
}

impl VoxelGrid {
    pub fn new(origin: Vec3, spacing: f32, dimensions: UVec3) -> Result<Self, RenderError> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(RenderError::geometry(format!("voxel spacing must be > 0, got {}", spacing)));
        }
        if !origin.is_finite() {
            return Err(RenderError::geometry("grid origin is not finite"));
        }
        if dimensions.min_element() == 0 {
            return Err(RenderError::geometry(format!("grid dimensions must be >= 1, got {}", dimensions)));
        }
        let count = (dimensions.x as u64) * (dimensions.y as u64) * (dimensions.z as u64);
        if count > MAX_VOXELS as u64 {
            return Err(RenderError::geometry(format!(
                "grid {} has {} voxels, limit is {}",
                dimensions, count, MAX_VOXELS
            )));
        }
        Ok(Self { origin, spacing, dimensions })
    }

    /// Grid covering `[min, max]` expanded by `padding` voxels on every side.
    /// Dimensions are `ceil(padded extent / spacing)`; the origin sits half a voxel inside
    /// the padded minimum so that voxel centres are sampled.
    pub fn enclosing(min: Vec3, max: Vec3, spacing: f32, padding: u32) -> Result<Self, RenderError> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(RenderError::geometry(format!("voxel spacing must be > 0, got {}", spacing)));
        }
        if !(min.is_finite() && max.is_finite()) || min.cmpgt(max).any() {
            return Err(RenderError::geometry(format!("invalid extents {} .. {}", min, max)));
        }
        let pad = Vec3::splat(padding as f32 * spacing);
        let padded_min = min - pad;
        let padded_max = max + pad;
        let cells = ((padded_max - padded_min) / spacing).ceil().max(Vec3::ONE);
        if cells.max_element() > u32::MAX as f32 {
            return Err(RenderError::geometry("grid dimensions overflow"));
        }
        let dimensions = cells.as_uvec3();
        Self::new(padded_min + Vec3::splat(0.5 * spacing), spacing, dimensions)
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn dimensions(&self) -> UVec3 {
        self.dimensions
    }

    pub fn voxel_count(&self) -> usize {
        self.dimensions.x as usize * self.dimensions.y as usize * self.dimensions.z as usize
    }

    /// Linear sample index, x fastest, then y, then z.
    #[inline]
    pub fn linear_index(&self, i: u32, j: u32, k: u32) -> usize {
        let d = self.dimensions;
        i as usize + d.x as usize * (j as usize + d.y as usize * k as usize)
    }

    /// Inverse of [`linear_index`](Self::linear_index).
    #[inline]
    pub fn voxel_coords(&self, index: usize) -> UVec3 {
        let dx = self.dimensions.x as usize;
        let dy = self.dimensions.y as usize;
        UVec3::new((index % dx) as u32, ((index / dx) % dy) as u32, (index / (dx * dy)) as u32)
    }

    #[inline]
    pub fn voxel_center(&self, i: u32, j: u32, k: u32) -> Vec3 {
        self.origin + self.spacing * Vec3::new(i as f32, j as f32, k as f32)
    }

    /// Continuous voxel coordinates of a point in the field's space (unclamped).
    #[inline]
    pub fn to_voxel_space(&self, p: Vec3) -> Vec3 {
        (p - self.origin) / self.spacing
    }

    /// Box spanned by the first and last voxel centres.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let last = (self.dimensions - UVec3::ONE).as_vec3();
        (self.origin, self.origin + self.spacing * last)
    }
}
