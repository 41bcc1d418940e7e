//! GPU uniform layouts shared with the WGSL shaders, and the typed buffer that writes them.
//!
//! Every struct is built from 16-byte columns so the Rust layout matches WGSL uniform layout
//! without implicit padding.

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec3, Vec3};
use render_api::RenderError;
use umbra_field::pcss::{disk_taps, SampleCount};

use crate::config::ShadowSettings;

/// Field slots (and therefore caster instances) the composite shader can address.
pub const MAX_FIELD_SLOTS: usize = 8;

/// Caster instances per frame. Bounded by the number of field slots.
pub const MAX_INSTANCES: usize = MAX_FIELD_SLOTS;

const TAP_VEC4S: usize = SampleCount::MAX as usize / 2;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GlobalUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    /// xyz camera position.
    pub cam_pos: [f32; 4],
    /// xyz direction the light travels (normalized).
    pub light_dir: [f32; 4],
    /// rgb light colour, w ambient.
    pub light_color: [f32; 4],
    /// instance count, technique, visualization, orthographic flag.
    pub counts: [u32; 4],
    /// t_min, t_max, softness_k, epsilon.
    pub march: [f32; 4],
    /// max march steps, blocker taps, pcf taps, shadow map size.
    pub limits: [u32; 4],
    /// light near, light far, light size, depth bias.
    pub pcss: [f32; 4],
    /// blocker search scale, unused x3.
    pub pcss_ext: [f32; 4],
}

/// Per-frame camera and light state that feeds [`GlobalUniforms`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameView {
    pub view_proj: Mat4,
    pub light_view_proj: Mat4,
    pub camera_position: Vec3,
    /// Direction the light travels.
    pub light_direction: Vec3,
    pub light_color: Vec3,
}

impl GlobalUniforms {
    pub fn new(view: &FrameView, settings: &ShadowSettings, instance_count: u32, shadow_map_size: u32) -> Self {
        let march = &settings.march;
        let pcss = &settings.pcss;
        Self {
            view_proj: view.view_proj.to_cols_array_2d(),
            light_view_proj: view.light_view_proj.to_cols_array_2d(),
            cam_pos: view.camera_position.extend(1.0).to_array(),
            light_dir: view.light_direction.normalize_or_zero().extend(0.0).to_array(),
            light_color: view.light_color.extend(settings.ambient).to_array(),
            counts: [
                instance_count,
                settings.technique.index(),
                settings.visualization.index(),
                settings.is_orthographic() as u32,
            ],
            march: [march.t_min, march.t_max, march.clamped_softness(), march.epsilon],
            limits: [march.max_steps, pcss.blocker_samples.count(), pcss.pcf_samples.count(), shadow_map_size],
            pcss: [pcss.near, pcss.far, pcss.light_size, pcss.depth_bias],
            pcss_ext: [pcss.blocker_search_scale, 0.0, 0.0, 0.0],
        }
    }
}

impl Default for GlobalUniforms {
    fn default() -> Self {
        let mut u = Self::zeroed();
        u.view_proj = Mat4::IDENTITY.to_cols_array_2d();
        u.light_view_proj = Mat4::IDENTITY.to_cols_array_2d();
        u
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct InstanceUniforms {
    pub world_to_local: [[f32; 4]; 4],
    /// xyz box centre in local space.
    pub box_center: [f32; 4],
    /// xyz box half extents, w near margin.
    pub box_half_extents: [f32; 4],
    /// xyz field origin, w voxel spacing.
    pub field_origin: [f32; 4],
    /// xyz field dimensions, w field slot.
    pub field_dims: [u32; 4],
}

impl InstanceUniforms {
    pub fn new(world_to_local: Mat4, box_center: Vec3, box_half_extents: Vec3, margin: f32, origin: Vec3, spacing: f32, dims: UVec3, slot: u32) -> Self {
        Self {
            world_to_local: world_to_local.to_cols_array_2d(),
            box_center: box_center.extend(0.0).to_array(),
            box_half_extents: box_half_extents.extend(margin).to_array(),
            field_origin: origin.extend(spacing).to_array(),
            field_dims: dims.extend(slot).to_array(),
        }
    }
}

/// Fixed array of instances, only the first `counts.x` are read.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct InstanceBlock {
    pub instances: [InstanceUniforms; MAX_INSTANCES],
}

impl Default for InstanceBlock {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DrawUniforms {
    pub model: [[f32; 4]; 4],
    /// rgb albedo, w unused.
    pub color: [f32; 4],
}

impl DrawUniforms {
    pub fn new(model: Mat4, color: Vec3) -> Self {
        Self { model: model.to_cols_array_2d(), color: color.extend(1.0).to_array() }
    }
}

/// Unit-disk taps for the blocker search and the PCF filter, two taps per vec4.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct TapUniforms {
    pub blocker: [[f32; 4]; TAP_VEC4S],
    pub pcf: [[f32; 4]; TAP_VEC4S],
}

impl TapUniforms {
    pub fn new(blocker: SampleCount, pcf: SampleCount) -> Self {
        Self { blocker: pack_taps(blocker), pcf: pack_taps(pcf) }
    }
}

fn pack_taps(count: SampleCount) -> [[f32; 4]; TAP_VEC4S] {
    let mut packed = [[0.0f32; 4]; TAP_VEC4S];
    for (i, tap) in disk_taps(count.count()).into_iter().enumerate() {
        let slot = &mut packed[i / 2];
        let offset = (i % 2) * 2;
        slot[offset] = tap.x;
        slot[offset + 1] = tap.y;
    }
    packed
}

/// Uniform buffer holding exactly one `T`.
pub struct UniformBuffer<T: Pod> {
    buffer: wgpu::Buffer,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    pub fn new(device: &wgpu::Device, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<T>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer, _marker: PhantomData }
    }

    /// Copies `value` into a queue-owned staging view. The view is released when it drops,
    /// including on early return, and the copy is ordered before the next submission.
    pub fn write(&self, queue: &wgpu::Queue, value: &T) -> Result<(), RenderError> {
        let size = wgpu::BufferSize::new(std::mem::size_of::<T>() as u64)
            .ok_or_else(|| RenderError::resource("zero-sized uniform"))?;
        let mut view = queue
            .write_buffer_with(&self.buffer, 0, size)
            .ok_or_else(|| RenderError::resource("uniform staging write rejected"))?;
        view.copy_from_slice(bytemuck::bytes_of(value));
        Ok(())
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }

    pub fn min_binding_size() -> Option<wgpu::BufferSize> {
        wgpu::BufferSize::new(std::mem::size_of::<T>() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_wgsl_layouts() {
        assert_eq!(std::mem::size_of::<GlobalUniforms>(), 256);
        assert_eq!(std::mem::size_of::<InstanceUniforms>(), 128);
        assert_eq!(std::mem::size_of::<InstanceBlock>(), 128 * MAX_INSTANCES);
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 80);
        assert_eq!(std::mem::size_of::<TapUniforms>(), 2 * 64 * 16);
    }

    #[test]
    fn globals_pack_settings() {
        let mut settings = ShadowSettings::default();
        settings.technique = crate::config::ShadowTechnique::DistanceField;
        settings.toggle_projection();
        let view = FrameView {
            view_proj: Mat4::IDENTITY,
            light_view_proj: Mat4::IDENTITY,
            camera_position: Vec3::new(50.0, 20.0, 0.0),
            light_direction: Vec3::new(0.0, -2.0, 0.0),
            light_color: Vec3::ONE,
        };
        let g = GlobalUniforms::new(&view, &settings, 3, 2048);
        assert_eq!(g.counts, [3, 1, 0, 0]);
        assert_eq!(g.light_dir, [0.0, -1.0, 0.0, 0.0]);
        assert_eq!(g.limits, [128, 128, 128, 2048]);
        assert_eq!(g.pcss, [120.0, 250.0, 0.07, 0.008]);
        assert_eq!(g.light_color[3], settings.ambient);
    }

    #[test]
    fn instance_packs_slot_and_margin() {
        let u = InstanceUniforms::new(
            Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0)),
            Vec3::ZERO,
            Vec3::splat(6.75),
            0.5,
            Vec3::splat(-6.75),
            0.5,
            UVec3::splat(28),
            3,
        );
        assert_eq!(u.field_dims, [28, 28, 28, 3]);
        assert_eq!(u.box_half_extents[3], 0.5);
        assert_eq!(u.field_origin[3], 0.5);
        assert_eq!(u.world_to_local[3][0], -1.0);
    }

    #[test]
    fn taps_are_packed_in_pairs() {
        let taps = TapUniforms::new(SampleCount::S25, SampleCount::S128);
        let expected = disk_taps(25);
        assert_eq!(taps.blocker[0][0], expected[0].x);
        assert_eq!(taps.blocker[0][3], expected[1].y);
        assert_eq!(taps.blocker[12][0], expected[24].x);
        assert_eq!(taps.blocker[12][2], 0.0);
        assert!(taps.pcf.iter().flatten().all(|v| v.abs() <= 1.0));
    }
}
