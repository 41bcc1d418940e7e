//! Umbra Renderer: wgpu light depth pass, GPU distance field bake and a forward composite
//! that shades with either PCSS or distance field soft shadows.

pub mod bake_pass;
pub mod composite;
pub mod config;
pub mod frustum;
pub mod mesh;
pub mod resources;
pub mod shadows;
pub mod uniforms;
pub mod volume;

use std::sync::Arc;

pub use bake_pass::DistanceFieldBakePass;
pub use composite::CompositePass;
pub use config::{ShadowSettings, ShadowTechnique, Tunable, UmbraConfig, Visualization};
pub use frustum::FrustumPass;
pub use mesh::{GpuMesh, MeshDraw};
pub use resources::{FrameResources, ShadowMap};
pub use shadows::ShadowPass;
pub use uniforms::{FrameView, GlobalUniforms, InstanceBlock, InstanceUniforms, TapUniforms, UniformBuffer, MAX_FIELD_SLOTS, MAX_INSTANCES};
pub use volume::{FieldHandle, FieldTable, FieldVolume};

use composite::CompositeInputs;
use render_api::RenderError;
use umbra_field::{DistanceField, Mesh, SampleCount};

pub struct ShadowRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: UmbraConfig,
    globals: UniformBuffer<GlobalUniforms>,
    instances: UniformBuffer<InstanceBlock>,
    taps: UniformBuffer<TapUniforms>,
    tap_counts: (SampleCount, SampleCount),
    draw_layout: wgpu::BindGroupLayout,
    shadow_map: ShadowMap,
    shadow_pass: ShadowPass,
    composite_pass: CompositePass,
    frustum_pass: FrustumPass,
    bake_pass: Option<DistanceFieldBakePass>,
    fields: FieldTable,
    frame_resources: Option<FrameResources>,
}

impl ShadowRenderer {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, RenderError> {
        Self::new_with_config(device, queue, UmbraConfig::default())
    }

    pub fn new_with_config(device: wgpu::Device, queue: wgpu::Queue, config: UmbraConfig) -> Result<Self, RenderError> {
        let globals = UniformBuffer::<GlobalUniforms>::new(&device, "global_uniforms");
        let instances = UniformBuffer::<InstanceBlock>::new(&device, "instance_uniforms");
        let taps = UniformBuffer::<TapUniforms>::new(&device, "tap_uniforms");
        let tap_counts = (SampleCount::S128, SampleCount::S128);
        globals.write(&queue, &GlobalUniforms::default())?;
        instances.write(&queue, &InstanceBlock::default())?;
        taps.write(&queue, &TapUniforms::new(tap_counts.0, tap_counts.1))?;

        let draw_layout = mesh::draw_bind_group_layout(&device);
        let shadow_map = ShadowMap::new(&device, config.shadow_map_size)?;
        let shadow_pass = ShadowPass::new(&device, &globals, &draw_layout)?;
        let mut composite_pass = CompositePass::new(&device, config.surface_format, &draw_layout)?;
        let frustum_pass = FrustumPass::new(&device, config.surface_format)?;
        let fields = FieldTable::new(&device, &queue)?;
        composite_pass.rebind(
            &device,
            &CompositeInputs { globals: &globals, instances: &instances, taps: &taps },
            &shadow_map,
            &fields,
        );
        log::info!(
            "umbra renderer ready: {:?} output, {size}x{size} shadow map",
            config.surface_format,
            size = config.shadow_map_size
        );
        Ok(Self {
            device,
            queue,
            config,
            globals,
            instances,
            taps,
            tap_counts,
            draw_layout,
            shadow_map,
            shadow_pass,
            composite_pass,
            frustum_pass,
            bake_pass: None,
            fields,
            frame_resources: None,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn config(&self) -> &UmbraConfig {
        &self.config
    }

    pub fn shadow_map_size(&self) -> u32 {
        self.shadow_map.size()
    }

    /// Fields currently bound to composite slots.
    pub fn resident_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn upload_mesh(&self, mesh: &Mesh, label: &str) -> Result<Arc<GpuMesh>, RenderError> {
        Ok(Arc::new(GpuMesh::upload(&self.device, mesh, label)?))
    }

    pub fn create_draw(&self, mesh: Arc<GpuMesh>) -> MeshDraw {
        MeshDraw::new(&self.device, &self.draw_layout, mesh)
    }

    /// Bakes `mesh` on the GPU and makes it resident. Spacing comes from
    /// [`UmbraConfig::spacing_for`] the mesh's extent.
    pub fn bake_field(&mut self, mesh: &Mesh, label: &str) -> Result<FieldHandle, RenderError> {
        let volume = self.bake_volume(mesh, label)?;
        self.make_resident(volume)
    }

    /// GPU bake without making the result resident (offline tooling reads it back).
    pub fn bake_volume(&mut self, mesh: &Mesh, label: &str) -> Result<FieldVolume, RenderError> {
        if self.bake_pass.is_none() {
            self.bake_pass = Some(DistanceFieldBakePass::new(&self.device)?);
        }
        let pass = self.bake_pass.as_ref().ok_or_else(|| RenderError::resource("bake pass unavailable"))?;
        let spacing = self.config.spacing_for(mesh.max_extents() - mesh.min_extents());
        pass.bake(&self.device, &self.queue, mesh, spacing, self.config.sdf_padding, label)
    }

    /// Uploads a CPU-baked or deserialized field and makes it resident.
    pub fn upload_field(&mut self, field: &DistanceField, label: &str) -> Result<FieldHandle, RenderError> {
        let volume = FieldVolume::upload(&self.device, &self.queue, field, label)?;
        self.make_resident(volume)
    }

    pub fn read_back_field(&self, handle: &FieldHandle) -> Result<DistanceField, RenderError> {
        handle.volume().read_back(&self.device, &self.queue)
    }

    fn make_resident(&mut self, volume: FieldVolume) -> Result<FieldHandle, RenderError> {
        let handle = self.fields.insert(volume)?;
        self.rebind();
        Ok(handle)
    }

    fn rebind(&mut self) {
        let inputs = CompositeInputs { globals: &self.globals, instances: &self.instances, taps: &self.taps };
        self.composite_pass.rebind(&self.device, &inputs, &self.shadow_map, &self.fields);
    }

    /// Regenerates the disk taps when either preset changed.
    pub fn set_sample_counts(&mut self, blocker: SampleCount, pcf: SampleCount) -> Result<(), RenderError> {
        if self.tap_counts == (blocker, pcf) {
            return Ok(());
        }
        self.taps.write(&self.queue, &TapUniforms::new(blocker, pcf))?;
        self.tap_counts = (blocker, pcf);
        log::debug!("taps regenerated: {} blocker, {} pcf", blocker.count(), pcf.count());
        Ok(())
    }

    pub fn ensure_frame_resources(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let existing = self.frame_resources.take();
        let new_res = FrameResources::ensure_size(&self.device, existing, width, height)?;
        self.frame_resources = Some(new_res);
        Ok(())
    }

    /// Writes this frame's uniforms and encodes the depth pass (shadow map technique only),
    /// the composite pass into `output_view`, and the light frustum overlay when enabled.
    pub fn render(
        &mut self,
        output_view: &wgpu::TextureView,
        width: u32,
        height: u32,
        view: &FrameView,
        settings: &ShadowSettings,
        casters: &[InstanceUniforms],
        meshes: &[&MeshDraw],
    ) -> Result<wgpu::CommandBuffer, RenderError> {
        if casters.len() > MAX_INSTANCES {
            return Err(RenderError::resource(format!(
                "{} casters exceed the {} instance slots",
                casters.len(),
                MAX_INSTANCES
            )));
        }
        self.ensure_frame_resources(width, height)?;
        self.set_sample_counts(settings.pcss.blocker_samples, settings.pcss.pcf_samples)?;

        let globals = GlobalUniforms::new(view, settings, casters.len() as u32, self.shadow_map.size());
        self.globals.write(&self.queue, &globals)?;
        let mut block = InstanceBlock::default();
        block.instances[..casters.len()].copy_from_slice(casters);
        self.instances.write(&self.queue, &block)?;

        let frame = self
            .frame_resources
            .as_ref()
            .ok_or_else(|| RenderError::resource("render: no frame resources"))?;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("umbra_frame") });
        if settings.technique == ShadowTechnique::ShadowMap {
            self.shadow_pass.encode(&mut encoder, &self.shadow_map, meshes);
        }
        self.composite_pass.encode(&mut encoder, frame, output_view, meshes)?;
        if settings.show_light_frustum {
            self.frustum_pass.encode(&mut encoder, &self.queue, frame, output_view, view.light_view_proj, view.view_proj);
        }
        Ok(encoder.finish())
    }

    pub fn submit(&self, command_buffers: impl IntoIterator<Item = wgpu::CommandBuffer>) {
        self.queue.submit(command_buffers);
    }
}
