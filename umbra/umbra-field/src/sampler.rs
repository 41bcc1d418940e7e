//! Trilinear lookup into a [`DistanceField`], clamped to the outermost voxel centres.
//! `composite.wgsl` implements the same arithmetic with `textureLoad`.

use glam::{UVec3, Vec3};

use crate::field::DistanceField;

#[derive(Clone, Copy)]
pub struct VolumeSampler<'a> {
    field: &'a DistanceField,
}

impl<'a> VolumeSampler<'a> {
    pub fn new(field: &'a DistanceField) -> Self {
        Self { field }
    }

    /// Box spanned by the first and last voxel centres. Queries outside it are clamped.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.field.grid().bounds()
    }

    pub fn sample(&self, p: Vec3) -> f32 {
        let grid = self.field.grid();
        let dims = grid.dimensions();
        let max_coord = (dims - UVec3::ONE).as_vec3();
        let c = grid.to_voxel_space(p).clamp(Vec3::ZERO, max_coord);
        // NaN input clamps to NaN; pin it to voxel 0 instead of indexing with it
        let c = Vec3::select(c.is_nan_mask(), Vec3::ZERO, c);

        let base_limit = dims.saturating_sub(UVec3::splat(2));
        let base = c.floor().as_uvec3().min(base_limit);
        let t = (c - base.as_vec3()).min(Vec3::ONE);
        let next = (base + UVec3::ONE).min(dims - UVec3::ONE);

        let samples = self.field.samples();
        let at = |i: u32, j: u32, k: u32| samples[grid.linear_index(i, j, k)];

        let c00 = lerp(at(base.x, base.y, base.z), at(next.x, base.y, base.z), t.x);
        let c10 = lerp(at(base.x, next.y, base.z), at(next.x, next.y, base.z), t.x);
        let c01 = lerp(at(base.x, base.y, next.z), at(next.x, base.y, next.z), t.x);
        let c11 = lerp(at(base.x, next.y, next.z), at(next.x, next.y, next.z), t.x);
        let c0 = lerp(c00, c10, t.y);
        let c1 = lerp(c01, c11, t.y);
        lerp(c0, c1, t.z)
    }
}

/// `a*(1-t) + b*t`: exact at both ends, unlike `a + (b-a)*t`.
#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::VoxelGrid;

    fn ramp() -> DistanceField {
        // value = 1*i + 10*j + 100*k
        let grid = VoxelGrid::new(Vec3::new(-1.0, 0.0, 2.0), 0.5, UVec3::new(4, 3, 2)).unwrap();
        let samples = (0..grid.voxel_count())
            .map(|n| {
                let c = grid.voxel_coords(n);
                c.x as f32 + 10.0 * c.y as f32 + 100.0 * c.z as f32
            })
            .collect();
        DistanceField::new(grid, samples).unwrap()
    }

    #[test]
    fn voxel_centres_are_exact() {
        let field = ramp();
        let s = VolumeSampler::new(&field);
        for n in 0..field.grid().voxel_count() {
            let c = field.grid().voxel_coords(n);
            let p = field.grid().voxel_center(c.x, c.y, c.z);
            assert_eq!(s.sample(p), field.samples()[n]);
        }
    }

    #[test]
    fn interpolates_linear_data_exactly() {
        let field = ramp();
        let s = VolumeSampler::new(&field);
        // voxel coords (1.5, 0.25, 0.5)
        let p = Vec3::new(-1.0 + 0.75, 0.125, 2.25);
        assert!((s.sample(p) - (1.5 + 2.5 + 50.0)).abs() < 1e-4);
    }

    #[test]
    fn outside_queries_clamp_to_the_edge() {
        let field = ramp();
        let s = VolumeSampler::new(&field);
        let (lo, hi) = s.bounds();
        assert_eq!(s.sample(lo - Vec3::splat(10.0)), 0.0);
        assert_eq!(s.sample(hi + Vec3::splat(10.0)), 3.0 + 20.0 + 100.0);
        let p = Vec3::new(lo.x - 3.0, 0.5, 2.0);
        assert!((s.sample(p) - 10.0).abs() < 1e-5);
        assert_eq!(s.sample(Vec3::NAN), 0.0);
    }

    #[test]
    fn continuous_across_cell_boundaries() {
        let field = ramp();
        let s = VolumeSampler::new(&field);
        let x = -1.0 + 0.5; // voxel 1 boundary
        let a = s.sample(Vec3::new(x - 1e-4, 0.3, 2.2));
        let b = s.sample(Vec3::new(x + 1e-4, 0.3, 2.2));
        assert!((a - b).abs() < 1e-2);
    }

    #[test]
    fn single_voxel_axes_are_constant() {
        let grid = VoxelGrid::new(Vec3::ZERO, 1.0, UVec3::new(1, 1, 2)).unwrap();
        let field = DistanceField::new(grid, vec![3.0, 5.0]).unwrap();
        let s = VolumeSampler::new(&field);
        assert_eq!(s.sample(Vec3::new(7.0, -2.0, 0.5)), 4.0);
    }
}
