//! Triangle meshes: OBJ loading (tobj), procedural shapes and the derived data the baker
//! and the renderer need (triangles, extents, interleaved vertex stream).

use std::f32::consts::PI;
use std::path::Path;

use glam::{Mat3, Mat4, Vec3};
use render_api::RenderError;

/// Contiguous index range drawn with one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubMesh {
    pub base_index: u32,
    pub index_count: u32,
}

/// Immutable indexed triangle mesh. Extents are computed once at construction.
#[derive(Clone, Debug)]
pub struct Mesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    indices: Vec<u32>,
    submeshes: Vec<SubMesh>,
    min_extents: Vec3,
    max_extents: Vec3,
}

/// Bytes per vertex in [`Mesh::interleaved_vertices`]: position + normal.
pub const VERTEX_STRIDE: usize = 24;

impl Mesh {
    /// Builds a mesh with smooth normals computed from the triangles.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Result<Self, RenderError> {
        let normals = compute_normals(&positions, &indices);
        let count = indices.len() as u32;
        Self::with_normals(positions, normals, indices, vec![SubMesh { base_index: 0, index_count: count }])
    }

    pub fn with_normals(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        indices: Vec<u32>,
        submeshes: Vec<SubMesh>,
    ) -> Result<Self, RenderError> {
        if indices.len() % 3 != 0 {
            return Err(RenderError::geometry(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if normals.len() != positions.len() {
            return Err(RenderError::geometry(format!(
                "{} normals for {} positions",
                normals.len(),
                positions.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(RenderError::geometry(format!(
                "index {} out of range for {} vertices",
                bad,
                positions.len()
            )));
        }
        if positions.iter().any(|p| !p.is_finite()) {
            return Err(RenderError::geometry("non-finite vertex position"));
        }
        for s in &submeshes {
            if s.base_index as usize + s.index_count as usize > indices.len() {
                return Err(RenderError::geometry(format!(
                    "submesh {}..{} exceeds {} indices",
                    s.base_index,
                    s.base_index + s.index_count,
                    indices.len()
                )));
            }
        }
        let (min_extents, max_extents) = if positions.is_empty() {
            (Vec3::ZERO, Vec3::ZERO)
        } else {
            positions
                .iter()
                .fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(lo, hi), &p| (lo.min(p), hi.max(p)))
        };
        Ok(Self { positions, normals, indices, submeshes, min_extents, max_extents })
    }

    /// Loads every model of an OBJ file into one mesh, one submesh per model.
    /// Faces are triangulated and attributes are re-indexed to a single index stream.
    pub fn load_obj(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let (models, _) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)
            .map_err(|e| RenderError::mesh_load(path, e))?;
        if models.is_empty() {
            return Err(RenderError::mesh_load(path, "no mesh in OBJ"));
        }

        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut indices = Vec::new();
        let mut submeshes = Vec::with_capacity(models.len());
        let mut missing_normals = false;
        for model in models {
            let mesh = model.mesh;
            let base_vertex = positions.len() as u32;
            let vertex_count = mesh.positions.len() / 3;
            positions.extend(mesh.positions.chunks_exact(3).map(|c| Vec3::new(c[0], c[1], c[2])));
            if mesh.normals.len() == mesh.positions.len() {
                normals.extend(mesh.normals.chunks_exact(3).map(|c| Vec3::new(c[0], c[1], c[2])));
            } else {
                missing_normals = true;
                normals.extend(std::iter::repeat(Vec3::ZERO).take(vertex_count));
            }
            submeshes.push(SubMesh { base_index: indices.len() as u32, index_count: mesh.indices.len() as u32 });
            indices.extend(mesh.indices.iter().map(|&i| i + base_vertex));
        }
        if missing_normals {
            normals = compute_normals(&positions, &indices);
        }

        let mesh = Self::with_normals(positions, normals, indices, submeshes)
            .map_err(|e| RenderError::mesh_load(path, e))?;
        log::info!(
            "loaded {}: {} vertices, {} triangles, extents {} .. {}",
            path.display(),
            mesh.vertex_count(),
            mesh.triangle_count(),
            mesh.min_extents,
            mesh.max_extents
        );
        Ok(mesh)
    }

    /// Closed UV sphere. `segments` around the equator, `rings` pole to pole.
    pub fn uv_sphere(center: Vec3, radius: f32, segments: u32, rings: u32) -> Result<Self, RenderError> {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut indices = Vec::new();

        positions.push(center + Vec3::Y * radius);
        normals.push(Vec3::Y);
        for r in 1..rings {
            let phi = PI * r as f32 / rings as f32;
            for s in 0..segments {
                let theta = 2.0 * PI * s as f32 / segments as f32;
                let n = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                positions.push(center + n * radius);
                normals.push(n);
            }
        }
        positions.push(center - Vec3::Y * radius);
        normals.push(-Vec3::Y);

        let south = positions.len() as u32 - 1;
        let ring_start = |r: u32| 1 + (r - 1) * segments;
        for s in 0..segments {
            let next = (s + 1) % segments;
            indices.extend_from_slice(&[0, ring_start(1) + next, ring_start(1) + s]);
        }
        for r in 1..rings - 1 {
            let a = ring_start(r);
            let b = ring_start(r + 1);
            for s in 0..segments {
                let next = (s + 1) % segments;
                indices.extend_from_slice(&[a + s, a + next, b + s]);
                indices.extend_from_slice(&[a + next, b + next, b + s]);
            }
        }
        let last = ring_start(rings - 1);
        for s in 0..segments {
            let next = (s + 1) % segments;
            indices.extend_from_slice(&[south, last + s, last + next]);
        }

        let count = indices.len() as u32;
        Self::with_normals(positions, normals, indices, vec![SubMesh { base_index: 0, index_count: count }])
    }

    /// Axis-aligned box with flat-shaded faces (24 vertices).
    pub fn cuboid(center: Vec3, half_extents: Vec3) -> Result<Self, RenderError> {
        let faces = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (-Vec3::X, Vec3::Y, -Vec3::Z),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (-Vec3::Y, Vec3::Z, -Vec3::X),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, Vec3::X, -Vec3::Y),
        ];
        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (n, u, v) in faces {
            // u x v == n, so (0, 1, 2) winds counter-clockwise seen from outside
            let base = positions.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                positions.push(center + (n + u * su + v * sv) * half_extents);
                normals.push(n);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::with_normals(positions, normals, indices, vec![SubMesh { base_index: 0, index_count: 36 }])
    }

    /// Horizontal quad at height `y`, facing +Y.
    pub fn plane(y: f32, half_size: f32) -> Result<Self, RenderError> {
        let h = half_size;
        let positions = vec![
            Vec3::new(-h, y, -h),
            Vec3::new(-h, y, h),
            Vec3::new(h, y, h),
            Vec3::new(h, y, -h),
        ];
        let normals = vec![Vec3::Y; 4];
        Self::with_normals(positions, normals, vec![0, 1, 2, 0, 2, 3], vec![SubMesh { base_index: 0, index_count: 6 }])
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn submeshes(&self) -> &[SubMesh] {
        &self.submeshes
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn min_extents(&self) -> Vec3 {
        self.min_extents
    }

    pub fn max_extents(&self) -> Vec3 {
        self.max_extents
    }

    pub fn center(&self) -> Vec3 {
        0.5 * (self.min_extents + self.max_extents)
    }

    pub fn half_extents(&self) -> Vec3 {
        0.5 * (self.max_extents - self.min_extents)
    }

    /// Copy with `transform` baked into positions and normals. A mirroring transform flips
    /// triangle winding so faces stay outward.
    pub fn transformed(&self, transform: Mat4) -> Result<Self, RenderError> {
        let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();
        let positions = self.positions.iter().map(|&p| transform.transform_point3(p)).collect();
        let normals = self.normals.iter().map(|&n| (normal_matrix * n).normalize_or(Vec3::Y)).collect();
        let mut indices = self.indices.clone();
        if transform.determinant() < 0.0 {
            for t in indices.chunks_exact_mut(3) {
                t.swap(1, 2);
            }
        }
        Self::with_normals(positions, normals, indices, self.submeshes.clone())
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |t| {
            [self.positions[t[0] as usize], self.positions[t[1] as usize], self.positions[t[2] as usize]]
        })
    }

    /// Flat `[px, py, pz, nx, ny, nz]` per vertex, matching the renderer's vertex layout.
    pub fn interleaved_vertices(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.positions.len() * 6);
        for (p, n) in self.positions.iter().zip(&self.normals) {
            out.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z]);
        }
        out
    }
}

fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for t in indices.chunks_exact(3) {
        let [a, b, c] = [t[0] as usize, t[1] as usize, t[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        // unnormalized cross product weights by area
        let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    normals.into_iter().map(|n| n.normalize_or(Vec3::Y)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_and_out_of_range_indices() {
        let p = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        assert!(matches!(Mesh::new(p.clone(), vec![0, 1]), Err(RenderError::InvalidGeometry(_))));
        assert!(matches!(Mesh::new(p, vec![0, 1, 3]), Err(RenderError::InvalidGeometry(_))));
    }

    #[test]
    fn sphere_is_closed_and_bounded() {
        let sphere = Mesh::uv_sphere(Vec3::new(1.0, 2.0, 3.0), 5.0, 24, 12).unwrap();
        assert_eq!(sphere.triangle_count(), 2 * 24 * 11);
        assert!((sphere.max_extents().y - 7.0).abs() < 1e-5);
        assert!((sphere.min_extents().y + 3.0).abs() < 1e-5);
        for p in sphere.positions() {
            assert!(((*p - Vec3::new(1.0, 2.0, 3.0)).length() - 5.0).abs() < 1e-4);
        }
        // every edge shared by exactly two triangles
        let mut edges = std::collections::HashMap::new();
        for t in sphere.indices().chunks_exact(3) {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                *edges.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        assert!(edges.values().all(|&n| n == 2));
    }

    #[test]
    fn sphere_winds_outward() {
        let sphere = Mesh::uv_sphere(Vec3::ZERO, 1.0, 16, 8).unwrap();
        for [a, b, c] in sphere.triangles() {
            let n = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(n.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn cuboid_winds_outward() {
        let cube = Mesh::cuboid(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(cube.triangle_count(), 12);
        assert_eq!(cube.max_extents(), Vec3::new(1.0, 2.0, 3.0));
        for [a, b, c] in cube.triangles() {
            let n = (b - a).cross(c - a);
            assert!(n.dot((a + b + c) / 3.0) > 0.0);
        }
    }

    #[test]
    fn interleaved_stream_matches_stride() {
        let plane = Mesh::plane(0.0, 10.0).unwrap();
        let v = plane.interleaved_vertices();
        assert_eq!(v.len() * 4, plane.vertex_count() * VERTEX_STRIDE);
        assert_eq!(&v[3..6], &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn transform_scales_extents_and_keeps_winding() {
        let cube = Mesh::cuboid(Vec3::ZERO, Vec3::ONE).unwrap();
        let scaled = cube.transformed(Mat4::from_scale(Vec3::splat(7.0))).unwrap();
        assert!((scaled.max_extents() - Vec3::splat(7.0)).length() < 1e-5);

        let mirrored = cube.transformed(Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0))).unwrap();
        for (t, n) in mirrored.triangles().zip(mirrored.indices().chunks_exact(3)) {
            let face = (t[1] - t[0]).cross(t[2] - t[0]).normalize();
            assert!(face.dot(mirrored.normals()[n[0] as usize]) > 0.9);
        }
    }

    #[test]
    fn loads_obj_without_normals() {
        let path = std::env::temp_dir().join(format!("umbra_mesh_{}.obj", std::process::id()));
        std::fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 0 0 1\nf 1 3 2\nf 1 2 4\nf 1 4 3\nf 2 3 4\n",
        )
        .unwrap();
        let mesh = Mesh::load_obj(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.max_extents(), Vec3::ONE);
        assert!(mesh.normals().iter().all(|n| (n.length() - 1.0).abs() < 1e-5));
    }

    #[test]
    fn missing_obj_is_a_load_error() {
        let err = Mesh::load_obj("/nonexistent/umbra/lucy.obj").unwrap_err();
        assert!(matches!(err, RenderError::MeshLoadFailed { .. }));
    }
}
