//! CPU distance field baker.
//!
//! Brute force: every voxel centre is tested against every triangle, in parallel over voxels
//! with rayon. The magnitude is the exact point-to-triangle distance; the sign comes from the
//! generalized winding number, so closed meshes get negative values inside.

use std::f32::consts::PI;
use std::time::Instant;

use glam::Vec3;
use rayon::prelude::*;
use render_api::RenderError;

use crate::field::DistanceField;
use crate::grid::VoxelGrid;
use crate::mesh::Mesh;

/// Empty voxels added around the mesh bounds on every side.
pub const DEFAULT_PADDING: u32 = 4;

/// Largest grid the bakers accept (2^28 voxels, 1 GiB of samples).
pub const MAX_VOXELS: usize = 1 << 28;

/// Checks the mesh and builds the padded grid both bakers write into.
pub fn grid_for_mesh(mesh: &Mesh, spacing: f32, padding: u32) -> Result<VoxelGrid, RenderError> {
    if mesh.triangle_count() == 0 {
        return Err(RenderError::geometry("mesh has no triangles"));
    }
    VoxelGrid::enclosing(mesh.min_extents(), mesh.max_extents(), spacing, padding)
}

/// Bakes a signed distance field with voxel size `spacing` and `padding` empty voxels per side.
pub fn bake(mesh: &Mesh, spacing: f32, padding: u32) -> Result<DistanceField, RenderError> {
    let grid = grid_for_mesh(mesh, spacing, padding)?;
    bake_grid(mesh, grid)
}

/// Bakes into a caller-supplied grid.
pub fn bake_grid(mesh: &Mesh, grid: VoxelGrid) -> Result<DistanceField, RenderError> {
    if mesh.triangle_count() == 0 {
        return Err(RenderError::geometry("mesh has no triangles"));
    }
    let triangles: Vec<[Vec3; 3]> = mesh.triangles().collect();
    let start = Instant::now();
    log::info!(
        "baking distance field: {} triangles into {} grid ({} voxels, spacing {})",
        triangles.len(),
        grid.dimensions(),
        grid.voxel_count(),
        grid.spacing()
    );

    let samples: Vec<f32> = (0..grid.voxel_count())
        .into_par_iter()
        .map(|index| {
            let c = grid.voxel_coords(index);
            signed_distance(grid.voxel_center(c.x, c.y, c.z), &triangles)
        })
        .collect();

    log::info!("distance field baked in {:.2?}", start.elapsed());
    DistanceField::new(grid, samples)
}

/// Signed distance from `p` to a closed triangle soup.
pub fn signed_distance(p: Vec3, triangles: &[[Vec3; 3]]) -> f32 {
    let mut best = f32::INFINITY;
    let mut winding = 0.0f32;
    for &[a, b, c] in triangles {
        best = best.min(point_triangle_distance(p, a, b, c));
        winding += solid_angle(p, a, b, c);
    }
    if (winding / (4.0 * PI)).abs() > 0.5 {
        -best
    } else {
        best
    }
}

#[inline]
pub fn point_triangle_distance(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (p - closest_point_on_triangle(p, a, b, c)).length()
}

/// Closest point to `p` on triangle `abc`, by Voronoi region of the triangle's features.
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = va + vb + vc;
    if denom.abs() <= f32::EPSILON {
        // degenerate (zero-area) triangle that fell through every edge test
        return a;
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}

/// Signed solid angle subtended by triangle `abc` seen from `p` (Van Oosterom and Strackee).
/// Summed over a closed, outward-wound mesh this is `4π` inside and `0` outside.
pub fn solid_angle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> f32 {
    let a = a - p;
    let b = b - p;
    let c = c - p;
    let (la, lb, lc) = (a.length(), b.length(), c.length());
    if la == 0.0 || lb == 0.0 || lc == 0.0 {
        return 0.0;
    }
    let det = a.dot(b.cross(c));
    let den = la * lb * lc + a.dot(b) * lc + b.dot(c) * la + c.dot(a) * lb;
    2.0 * det.atan2(den)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;

    fn tri() -> (Vec3, Vec3, Vec3) {
        (Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0))
    }

    #[test]
    fn closest_point_covers_every_region() {
        let (a, b, c) = tri();
        // vertex regions
        assert_eq!(closest_point_on_triangle(Vec3::new(-1.0, -1.0, 0.5), a, b, c), a);
        assert_eq!(closest_point_on_triangle(Vec3::new(3.0, -0.5, 0.0), a, b, c), b);
        assert_eq!(closest_point_on_triangle(Vec3::new(-0.5, 3.0, 0.0), a, b, c), c);
        // edge regions
        assert!((closest_point_on_triangle(Vec3::new(1.0, -1.0, 0.0), a, b, c) - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
        assert!((closest_point_on_triangle(Vec3::new(-1.0, 1.0, 0.0), a, b, c) - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-6);
        assert!((closest_point_on_triangle(Vec3::new(2.0, 2.0, 0.0), a, b, c) - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
        // face region
        assert!((closest_point_on_triangle(Vec3::new(0.5, 0.5, 3.0), a, b, c) - Vec3::new(0.5, 0.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn degenerate_triangle_does_not_produce_nan() {
        let p = closest_point_on_triangle(Vec3::new(0.3, 1.0, 0.0), Vec3::ZERO, Vec3::X, Vec3::X * 2.0);
        assert!(p.is_finite());
        let d = point_triangle_distance(Vec3::ONE, Vec3::ONE, Vec3::ONE, Vec3::ONE);
        assert_eq!(d, 0.0);
    }

    #[test]
    fn winding_number_of_closed_cube() {
        let cube = Mesh::cuboid(Vec3::ZERO, Vec3::ONE).unwrap();
        let tris: Vec<_> = cube.triangles().collect();
        let total = |p: Vec3| tris.iter().map(|&[a, b, c]| solid_angle(p, a, b, c)).sum::<f32>() / (4.0 * PI);
        assert!((total(Vec3::new(0.2, -0.3, 0.1)) - 1.0).abs() < 1e-4);
        assert!(total(Vec3::new(3.0, 0.5, 0.0)).abs() < 1e-4);
    }

    #[test]
    fn sphere_field_is_signed_and_near_exact() {
        let sphere = Mesh::uv_sphere(Vec3::ZERO, 2.0, 32, 16).unwrap();
        let field = bake(&sphere, 0.5, DEFAULT_PADDING).unwrap();
        // extent 4 + 2 * 4 * 0.5 = 8 -> 16 voxels per axis
        assert_eq!(field.dimensions(), UVec3::splat(16));
        let grid = *field.grid();
        for (index, &d) in field.samples().iter().enumerate() {
            let c = grid.voxel_coords(index);
            let p = grid.voxel_center(c.x, c.y, c.z);
            let analytic = p.length() - 2.0;
            // tessellation error of a 32x16 sphere of radius 2 stays below 0.05
            assert!((d - analytic).abs() < 0.05, "voxel {} at {}: {} vs {}", index, p, d, analytic);
        }
    }

    #[test]
    fn matches_brute_force_on_every_voxel() {
        let cube = Mesh::cuboid(Vec3::new(0.5, 0.0, -0.25), Vec3::new(1.0, 0.5, 0.75)).unwrap();
        let field = bake(&cube, 0.25, 2).unwrap();
        let tris: Vec<_> = cube.triangles().collect();
        let grid = *field.grid();
        for (index, &d) in field.samples().iter().enumerate() {
            let c = grid.voxel_coords(index);
            let p = grid.voxel_center(c.x, c.y, c.z);
            let unsigned = tris
                .iter()
                .map(|&[a, b, c]| point_triangle_distance(p, a, b, c))
                .fold(f32::INFINITY, f32::min);
            assert!((d.abs() - unsigned).abs() < 1e-6);
            let local = (p - Vec3::new(0.5, 0.0, -0.25)).abs();
            let inside = local.cmplt(Vec3::new(1.0, 0.5, 0.75)).all();
            if unsigned > 1e-4 {
                assert_eq!(d < 0.0, inside, "voxel {} at {}", index, p);
            }
        }
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let empty = Mesh::new(vec![Vec3::ZERO], vec![]).unwrap();
        assert!(matches!(bake(&empty, 0.1, 4), Err(RenderError::InvalidGeometry(_))));
        let cube = Mesh::cuboid(Vec3::ZERO, Vec3::ONE).unwrap();
        assert!(matches!(bake(&cube, 0.0, 4), Err(RenderError::InvalidGeometry(_))));
        assert!(matches!(bake(&cube, -1.0, 4), Err(RenderError::InvalidGeometry(_))));
        // 2 / 1e-3 = 2000 voxels per axis = 8e9 voxels
        assert!(matches!(bake(&cube, 1e-3, 0), Err(RenderError::InvalidGeometry(_))));
    }
}
