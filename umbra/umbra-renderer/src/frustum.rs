//! Light frustum overlay: the light's view volume drawn as a red wireframe over the lit image.

use glam::{Mat4, Vec3, Vec4};
use render_api::RenderError;
use wgpu::CommandEncoder;

use crate::resources::{FrameResources, DEPTH_FORMAT};

const FRUSTUM_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/frustum.wgsl"));

/// Corner `i` has x from bit 0, y from bit 1 and z (near 0, far 1) from bit 2.
pub const FRUSTUM_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

pub const FRUSTUM_VERTICES: usize = FRUSTUM_EDGES.len() * 2;

/// World-space corners of the volume `view_proj` maps onto the wgpu clip cube
/// (x, y in [-1, 1], z in [0, 1]). `None` when the matrix cannot be inverted.
pub fn frustum_corners(view_proj: Mat4) -> Option<[Vec3; 8]> {
    let det = view_proj.determinant();
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    let inv = view_proj.inverse();
    let mut corners = [Vec3::ZERO; 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let ndc = Vec4::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { 0.0 } else { 1.0 },
            1.0,
        );
        let p = inv * ndc;
        let c = p.truncate() / p.w;
        if !c.is_finite() {
            return None;
        }
        *corner = c;
    }
    Some(corners)
}

/// Line-list endpoints of the 12 frustum edges, already in the camera's clip space.
pub fn frustum_lines(light_view_proj: Mat4, camera_view_proj: Mat4) -> Option<[[f32; 4]; FRUSTUM_VERTICES]> {
    let corners = frustum_corners(light_view_proj)?;
    let mut out = [[0.0; 4]; FRUSTUM_VERTICES];
    for (n, (a, b)) in FRUSTUM_EDGES.iter().enumerate() {
        out[2 * n] = (camera_view_proj * corners[*a].extend(1.0)).to_array();
        out[2 * n + 1] = (camera_view_proj * corners[*b].extend(1.0)).to_array();
    }
    Some(out)
}

pub struct FrustumPass {
    pipeline: wgpu::RenderPipeline,
    vertices: wgpu::Buffer,
}

impl FrustumPass {
    pub fn new(device: &wgpu::Device, format_output: wgpu::TextureFormat) -> Result<Self, RenderError> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("frustum_shader"),
            source: wgpu::ShaderSource::Wgsl(FRUSTUM_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("frustum_pipeline_layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("frustum_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x4],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: format_output,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        let vertices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frustum_vertices"),
            size: (FRUSTUM_VERTICES * std::mem::size_of::<[f32; 4]>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(Self { pipeline, vertices })
    }

    /// Draws the frustum of `light_view_proj` on top of the composite output, depth tested
    /// against the scene. A singular light matrix draws nothing.
    pub fn encode(
        &self,
        encoder: &mut CommandEncoder,
        queue: &wgpu::Queue,
        frame: &FrameResources,
        output_view: &wgpu::TextureView,
        light_view_proj: Mat4,
        camera_view_proj: Mat4,
    ) {
        let Some(lines) = frustum_lines(light_view_proj, camera_view_proj) else {
            log::debug!("light matrix is singular, frustum skipped");
            return;
        };
        queue.write_buffer(&self.vertices, 0, bytemuck::cast_slice(&lines));
        let depth_view = frame.depth_view();
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frustum_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output_view,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Discard }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(&self.pipeline);
        rp.set_vertex_buffer(0, self.vertices.slice(..));
        rp.draw(0..FRUSTUM_VERTICES as u32, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ortho_corners_match_the_box() {
        let proj = Mat4::orthographic_rh(-75.0, 75.0, -75.0, 75.0, 120.0, 250.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 200.0, 0.0), Vec3::ZERO, Vec3::Z);
        let corners = frustum_corners(proj * view).unwrap();
        for c in corners {
            assert!((c.x.abs() - 75.0).abs() < 1e-2, "{:?}", c);
            assert!((c.z.abs() - 75.0).abs() < 1e-2, "{:?}", c);
        }
        // near plane 120 below the eye, far plane 250 below it
        assert!((corners[0].y - 80.0).abs() < 1e-2);
        assert!((corners[7].y + 50.0).abs() < 1e-2);
    }

    #[test]
    fn perspective_far_face_is_wider() {
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 1.0, 10.0);
        let corners = frustum_corners(proj).unwrap();
        let near_width = (corners[1] - corners[0]).length();
        let far_width = (corners[5] - corners[4]).length();
        assert!((far_width / near_width - 10.0).abs() < 1e-3);
        assert!((corners[0].z + 1.0).abs() < 1e-4);
        assert!((corners[4].z + 10.0).abs() < 1e-3);
    }

    #[test]
    fn edges_join_corners_differing_in_one_axis() {
        for (a, b) in FRUSTUM_EDGES {
            assert_eq!((a ^ b).count_ones(), 1);
        }
        let mut seen = FRUSTUM_EDGES.to_vec();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn singular_matrix_has_no_frustum() {
        assert!(frustum_corners(Mat4::ZERO).is_none());
        assert!(frustum_lines(Mat4::ZERO, Mat4::IDENTITY).is_none());
        let lines = frustum_lines(Mat4::IDENTITY, Mat4::IDENTITY).unwrap();
        assert_eq!(lines[0], [-1.0, -1.0, 0.0, 1.0]);
        assert_eq!(lines[1], [1.0, -1.0, 0.0, 1.0]);
    }
}
