//! Composite pass: forward lighting with per-fragment visibility from the light depth map
//! (PCSS) or from sphere tracing the resident distance fields.

use render_api::RenderError;
use wgpu::CommandEncoder;

use crate::mesh::{vertex_layout, MeshDraw};
use crate::resources::{FrameResources, ShadowMap, DEPTH_FORMAT};
use crate::uniforms::{GlobalUniforms, InstanceBlock, TapUniforms, UniformBuffer, MAX_FIELD_SLOTS};
use crate::volume::FieldTable;

const COMPOSITE_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/composite.wgsl"));

const FIELD_BINDING_BASE: u32 = 4;

pub const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.02, g: 0.02, b: 0.03, a: 1.0 };

/// Uniform buffers read by the composite shader.
pub struct CompositeInputs<'a> {
    pub globals: &'a UniformBuffer<GlobalUniforms>,
    pub instances: &'a UniformBuffer<InstanceBlock>,
    pub taps: &'a UniformBuffer<TapUniforms>,
}

pub struct CompositePass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
}

impl CompositePass {
    pub fn new(
        device: &wgpu::Device,
        format_output: wgpu::TextureFormat,
        draw_layout: &wgpu::BindGroupLayout,
    ) -> Result<Self, RenderError> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("composite_shader"),
            source: wgpu::ShaderSource::Wgsl(COMPOSITE_SHADER.into()),
        });

        let uniform_entry = |binding: u32, size: Option<wgpu::BufferSize>| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: size,
            },
            count: None,
        };
        let mut entries = vec![
            uniform_entry(0, UniformBuffer::<GlobalUniforms>::min_binding_size()),
            uniform_entry(1, UniformBuffer::<InstanceBlock>::min_binding_size()),
            uniform_entry(2, UniformBuffer::<TapUniforms>::min_binding_size()),
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
        ];
        entries.extend((0..MAX_FIELD_SLOTS as u32).map(|slot| wgpu::BindGroupLayoutEntry {
            binding: FIELD_BINDING_BASE + slot,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D3,
                multisampled: false,
            },
            count: None,
        }));
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite_bind_group_layout"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("composite_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout, draw_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("composite_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[vertex_layout()],
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
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        Ok(Self { pipeline, bind_group_layout, bind_group: None })
    }

    /// Rebuilds the group 0 bind group. Needed after the field table gains a slot.
    pub fn rebind(&mut self, device: &wgpu::Device, inputs: &CompositeInputs<'_>, shadow_map: &ShadowMap, fields: &FieldTable) {
        let views = fields.views();
        let mut entries = vec![
            wgpu::BindGroupEntry { binding: 0, resource: inputs.globals.binding() },
            wgpu::BindGroupEntry { binding: 1, resource: inputs.instances.binding() },
            wgpu::BindGroupEntry { binding: 2, resource: inputs.taps.binding() },
            wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::TextureView(shadow_map.view()) },
        ];
        entries.extend(views.iter().enumerate().map(|(slot, view)| wgpu::BindGroupEntry {
            binding: FIELD_BINDING_BASE + slot as u32,
            resource: wgpu::BindingResource::TextureView(view),
        }));
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite_bind_group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        }));
    }

    pub fn encode(
        &self,
        encoder: &mut CommandEncoder,
        frame: &FrameResources,
        output_view: &wgpu::TextureView,
        meshes: &[&MeshDraw],
    ) -> Result<(), RenderError> {
        let bind_group = self
            .bind_group
            .as_ref()
            .ok_or_else(|| RenderError::resource("composite pass encoded before rebind"))?;
        let depth_view = frame.depth_view();
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("composite_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(&self.pipeline);
        rp.set_bind_group(0, bind_group, &[]);
        for mesh in meshes {
            mesh.record(&mut rp);
        }
        Ok(())
    }
}
