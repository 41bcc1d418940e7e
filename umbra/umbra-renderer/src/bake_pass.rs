//! GPU distance field bake: a compute pass writing straight into the field's 3-D texture.
//! Grid construction and validation are shared with the CPU baker, so both produce the same grid.

use bytemuck::{Pod, Zeroable};
use render_api::RenderError;
use umbra_field::bake::grid_for_mesh;
use umbra_field::{Mesh, VoxelGrid};
use wgpu::util::DeviceExt;

use crate::volume::{FieldVolume, FIELD_FORMAT};

const BAKE_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/sdf_bake.wgsl"));

const WORKGROUP: u32 = 4;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct BakeParams {
    origin_spacing: [f32; 4],
    dims: [u32; 4],
}

pub struct DistanceFieldBakePass {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl DistanceFieldBakePass {
    pub fn new(device: &wgpu::Device) -> Result<Self, RenderError> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sdf_bake_shader"),
            source: wgpu::ShaderSource::Wgsl(BAKE_SHADER.into()),
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sdf_bake_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<BakeParams>() as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: FIELD_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D3,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sdf_bake_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("sdf_bake_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("bake"),
            compilation_options: Default::default(),
            cache: None,
        });
        Ok(Self { pipeline, bind_group_layout })
    }

    /// Bakes `mesh` into a new volume and waits for the GPU to finish.
    pub fn bake(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mesh: &Mesh,
        spacing: f32,
        padding: u32,
        label: &str,
    ) -> Result<FieldVolume, RenderError> {
        let grid = grid_for_mesh(mesh, spacing, padding)?;
        let volume = FieldVolume::allocate(device, grid, label)?;
        let vertices: Vec<[f32; 4]> = mesh.triangles().flatten().map(|v| v.extend(0.0).to_array()).collect();
        let vertex_bytes = (vertices.len() * 16) as u64;
        let limits = device.limits();
        if vertex_bytes > limits.max_storage_buffer_binding_size as u64 {
            return Err(RenderError::resource(format!(
                "{}: {} triangles exceed the storage buffer limit",
                label,
                mesh.triangle_count()
            )));
        }
        let groups = dispatch_size(&grid);
        if groups.iter().any(|&g| g > limits.max_compute_workgroups_per_dimension) {
            return Err(RenderError::resource(format!("{}: dispatch {:?} exceeds device limits", label, groups)));
        }

        let dims = grid.dimensions();
        let params = BakeParams {
            origin_spacing: grid.origin().extend(grid.spacing()).to_array(),
            dims: [dims.x, dims.y, dims.z, mesh.triangle_count() as u32],
        };
        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sdf_bake_params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sdf_bake_triangles"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sdf_bake_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: vertex_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(volume.view()) },
            ],
        });

        let start = std::time::Instant::now();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("sdf_bake") });
        {
            let mut cp = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("sdf_bake_pass"),
                timestamp_writes: None,
            });
            cp.set_pipeline(&self.pipeline);
            cp.set_bind_group(0, &bind_group, &[]);
            cp.dispatch_workgroups(groups[0], groups[1], groups[2]);
        }
        queue.submit(std::iter::once(encoder.finish()));
        // full barrier: the field is sampled by later submissions only after this returns
        device.poll(wgpu::Maintain::Wait);
        log::info!(
            "GPU baked {}: {} triangles into {} grid in {:.2?}",
            label,
            mesh.triangle_count(),
            dims,
            start.elapsed()
        );
        Ok(volume)
    }
}

fn dispatch_size(grid: &VoxelGrid) -> [u32; 3] {
    let d = grid.dimensions();
    [d.x.div_ceil(WORKGROUP), d.y.div_ceil(WORKGROUP), d.z.div_ceil(WORKGROUP)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{UVec3, Vec3};

    #[test]
    fn dispatch_covers_every_voxel() {
        let grid = VoxelGrid::new(Vec3::ZERO, 1.0, UVec3::new(28, 4, 9)).unwrap();
        assert_eq!(dispatch_size(&grid), [7, 1, 3]);
        let grid = VoxelGrid::new(Vec3::ZERO, 1.0, UVec3::ONE).unwrap();
        assert_eq!(dispatch_size(&grid), [1, 1, 1]);
    }

    #[test]
    fn params_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<BakeParams>(), 32);
    }
}
