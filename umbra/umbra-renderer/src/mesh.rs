//! GPU-side meshes and per-draw state shared by the depth and composite passes.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use render_api::RenderError;
use umbra_field::mesh::{Mesh, SubMesh, VERTEX_STRIDE};
use wgpu::util::DeviceExt;

use crate::uniforms::{DrawUniforms, UniformBuffer};

pub const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

/// Position + normal, matching `Mesh::interleaved_vertices`.
pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: VERTEX_STRIDE as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

pub struct GpuMesh {
    pub vertex_buf: wgpu::Buffer,
    pub index_buf: wgpu::Buffer,
    pub index_count: u32,
    pub submeshes: Vec<SubMesh>,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Result<Self, RenderError> {
        if mesh.triangle_count() == 0 {
            return Err(RenderError::geometry(format!("{}: mesh has no triangles", label)));
        }
        let vertices = mesh.interleaved_vertices();
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(mesh.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        Ok(Self {
            vertex_buf,
            index_buf,
            index_count: mesh.indices().len() as u32,
            submeshes: mesh.submeshes().to_vec(),
        })
    }
}

/// Group 1 of both render pipelines: the draw's model matrix and colour.
pub fn draw_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("draw_bind_group_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: UniformBuffer::<DrawUniforms>::min_binding_size(),
            },
            count: None,
        }],
    })
}

/// One drawable: shared geometry plus its own uniform buffer and bind group.
pub struct MeshDraw {
    pub mesh: Arc<GpuMesh>,
    uniforms: UniformBuffer<DrawUniforms>,
    bind_group: wgpu::BindGroup,
}

impl MeshDraw {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, mesh: Arc<GpuMesh>) -> Self {
        let uniforms = UniformBuffer::<DrawUniforms>::new(device, "draw_uniforms");
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw_bind_group"),
            layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: uniforms.binding() }],
        });
        Self { mesh, uniforms, bind_group }
    }

    pub fn update(&self, queue: &wgpu::Queue, model: Mat4, color: Vec3) -> Result<(), RenderError> {
        self.uniforms.write(queue, &DrawUniforms::new(model, color))
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub(crate) fn record(&self, rp: &mut wgpu::RenderPass<'_>) {
        rp.set_bind_group(1, &self.bind_group, &[]);
        rp.set_vertex_buffer(0, self.mesh.vertex_buf.slice(..));
        rp.set_index_buffer(self.mesh.index_buf.slice(..), wgpu::IndexFormat::Uint32);
        for sub in &self.mesh.submeshes {
            rp.draw_indexed(sub.base_index..sub.base_index + sub.index_count, 0, 0..1);
        }
    }
}
