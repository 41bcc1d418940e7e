//! Resident distance field volumes and the slot table the composite shader indexes.

use std::sync::Arc;

use futures_intrusive::channel::shared::oneshot_channel;
use glam::{Mat4, UVec3};
use render_api::RenderError;
use umbra_field::{DistanceField, VoxelGrid};

use crate::uniforms::{InstanceUniforms, MAX_FIELD_SLOTS};

pub const FIELD_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// A distance field resident in a 3-D `R32Float` texture, with the grid needed to address it.
pub struct FieldVolume {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    grid: VoxelGrid,
}

impl FieldVolume {
    /// Allocates an uninitialized volume that a compute pass can write into.
    pub fn allocate(device: &wgpu::Device, grid: VoxelGrid, label: &str) -> Result<Self, RenderError> {
        let dims = grid.dimensions();
        let max = device.limits().max_texture_dimension_3d;
        if dims.max_element() > max {
            return Err(RenderError::resource(format!(
                "{}: field {} exceeds the 3-D texture limit {}",
                label, dims, max
            )));
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(dims),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: FIELD_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });
        Ok(Self { texture, view, grid })
    }

    /// Uploads a CPU-baked or deserialized field.
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, field: &DistanceField, label: &str) -> Result<Self, RenderError> {
        let volume = Self::allocate(device, *field.grid(), label)?;
        let dims = field.dimensions();
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &volume.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(field.samples()),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(dims.x * 4),
                rows_per_image: Some(dims.y),
            },
            extent(dims),
        );
        log::info!("uploaded {} ({} voxels)", label, field.grid().voxel_count());
        Ok(volume)
    }

    /// Copies the volume back to the CPU. Blocks on the device.
    pub fn read_back(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<DistanceField, RenderError> {
        let dims = self.grid.dimensions();
        let tight_bpr = dims.x as usize * 4;
        let padded_bpr = align_bpr(tight_bpr);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("field_readback_staging"),
            size: (padded_bpr * dims.y as usize * dims.z as usize) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("field_readback") });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr as u32),
                    rows_per_image: Some(dims.y),
                },
            },
            extent(dims),
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        pollster::block_on(receiver.receive())
            .ok_or_else(|| RenderError::resource("field readback channel dropped"))?
            .map_err(|e| RenderError::resource(format!("field readback map failed: {}", e)))?;

        let data = slice.get_mapped_range();
        let samples = unpad_rows(&data, tight_bpr, padded_bpr, dims.y as usize * dims.z as usize);
        drop(data);
        staging.unmap();
        DistanceField::new(self.grid, samples)
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

fn extent(dims: UVec3) -> wgpu::Extent3d {
    wgpu::Extent3d { width: dims.x, height: dims.y, depth_or_array_layers: dims.z }
}

fn align_bpr(value: usize) -> usize {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    value.div_ceil(align) * align
}

/// Strips row padding from a buffer of `rows` rows of `padded_bpr` bytes holding f32 texels.
fn unpad_rows(data: &[u8], tight_bpr: usize, padded_bpr: usize, rows: usize) -> Vec<f32> {
    let mut samples = Vec::with_capacity(rows * tight_bpr / 4);
    for row in 0..rows {
        let start = row * padded_bpr;
        samples.extend(
            data[start..start + tight_bpr]
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        );
    }
    samples
}

/// Opaque token for a resident field. Holding it keeps the GPU volume alive, so the slot it
/// names is valid for as long as the handle exists.
#[derive(Clone)]
pub struct FieldHandle {
    slot: u32,
    volume: Arc<FieldVolume>,
}

impl FieldHandle {
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn volume(&self) -> &FieldVolume {
        &self.volume
    }

    /// Shader-side description of this field placed with `world_to_local`. The bounding box
    /// spans the voxel centres and the near margin is one voxel.
    pub fn instance(&self, world_to_local: Mat4) -> InstanceUniforms {
        instance_for_grid(self.volume.grid(), world_to_local, self.slot)
    }
}

fn instance_for_grid(grid: &VoxelGrid, world_to_local: Mat4, slot: u32) -> InstanceUniforms {
    let (lo, hi) = grid.bounds();
    InstanceUniforms::new(
        world_to_local,
        0.5 * (lo + hi),
        0.5 * (hi - lo),
        grid.spacing(),
        grid.origin(),
        grid.spacing(),
        grid.dimensions(),
        slot,
    )
}

impl std::fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldHandle")
            .field("slot", &self.slot)
            .field("dims", &self.volume.grid.dimensions())
            .finish()
    }
}

/// Slot table bound to the composite shader. Empty slots point at a 1x1x1 placeholder.
pub struct FieldTable {
    placeholder: FieldVolume,
    slots: Vec<Arc<FieldVolume>>,
}

impl FieldTable {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Self, RenderError> {
        let grid = VoxelGrid::new(glam::Vec3::ZERO, 1.0, UVec3::ONE)?;
        let placeholder = FieldVolume::upload(device, queue, &DistanceField::new(grid, vec![f32::MAX])?, "field_placeholder")?;
        Ok(Self { placeholder, slots: Vec::with_capacity(MAX_FIELD_SLOTS) })
    }

    /// Makes `volume` resident in the next free slot.
    pub fn insert(&mut self, volume: FieldVolume) -> Result<FieldHandle, RenderError> {
        if self.slots.len() >= MAX_FIELD_SLOTS {
            return Err(RenderError::resource(format!("all {} field slots are in use", MAX_FIELD_SLOTS)));
        }
        let volume = Arc::new(volume);
        let slot = self.slots.len() as u32;
        self.slots.push(volume.clone());
        log::debug!("field slot {} <- {} grid", slot, volume.grid.dimensions());
        Ok(FieldHandle { slot, volume })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// One view per slot, placeholder-filled to `MAX_FIELD_SLOTS`.
    pub fn views(&self) -> [&wgpu::TextureView; MAX_FIELD_SLOTS] {
        std::array::from_fn(|i| self.slots.get(i).map(|v| &v.view).unwrap_or(&self.placeholder.view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_align_to_copy_pitch() {
        assert_eq!(align_bpr(4), 256);
        assert_eq!(align_bpr(256), 256);
        assert_eq!(align_bpr(28 * 4), 256);
        assert_eq!(align_bpr(100 * 4), 512);
    }

    #[test]
    fn instance_box_matches_cpu_caster() {
        let grid = VoxelGrid::new(glam::Vec3::splat(-6.75), 0.5, UVec3::splat(28)).unwrap();
        let field = DistanceField::new(grid, vec![1.0; grid.voxel_count()]).unwrap();
        let caster = umbra_field::ShadowCaster::at(&field, glam::Vec3::ZERO);
        let inst = instance_for_grid(&grid, Mat4::IDENTITY, 2);
        assert_eq!(inst.box_center[..3], caster.box_center().to_array());
        assert_eq!(inst.box_half_extents[..3], caster.box_half_extents().to_array());
        assert_eq!(inst.box_half_extents[3], caster.margin());
        assert_eq!(inst.field_dims, [28, 28, 28, 2]);
    }

    #[test]
    fn unpad_drops_row_tails() {
        let mut data = vec![0u8; 2 * 16];
        data[0..4].copy_from_slice(&1.5f32.to_le_bytes());
        data[4..8].copy_from_slice(&2.5f32.to_le_bytes());
        data[16..20].copy_from_slice(&(-3.0f32).to_le_bytes());
        data[20..24].copy_from_slice(&4.0f32.to_le_bytes());
        assert_eq!(unpad_rows(&data, 8, 16, 2), vec![1.5, 2.5, -3.0, 4.0]);
    }
}
