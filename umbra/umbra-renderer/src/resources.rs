//! Frame resources: camera depth target (resized with the window) and the light depth map.

use render_api::RenderError;
use wgpu::TextureView;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct FrameResources {
    pub depth: wgpu::Texture,
    width: u32,
    height: u32,
}

impl FrameResources {
    pub fn ensure_size(device: &wgpu::Device, existing: Option<Self>, width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::resource("FrameResources: width and height must be > 0"));
        }
        if let Some(r) = existing {
            if r.width == width && r.height == height { return Ok(r); }
        }
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("camera_depth"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        log::debug!("camera depth target {}x{}", width, height);
        Ok(Self { depth, width, height })
    }
    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn depth_view(&self) -> TextureView { self.depth.create_view(&Default::default()) }
}

/// Square light-space depth map, rendered by `ShadowPass` and read with `textureLoad`.
pub struct ShadowMap {
    texture: wgpu::Texture,
    view: TextureView,
    size: u32,
}

impl ShadowMap {
    pub fn new(device: &wgpu::Device, size: u32) -> Result<Self, RenderError> {
        let max = device.limits().max_texture_dimension_2d;
        if size == 0 || size > max {
            return Err(RenderError::resource(format!("shadow map size {} outside 1..={}", size, max)));
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow_map"),
            size: wgpu::Extent3d { width: size, height: size, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&Default::default());
        Ok(Self { texture, view, size })
    }

    pub fn size(&self) -> u32 { self.size }
    pub fn view(&self) -> &TextureView { &self.view }
    pub fn texture(&self) -> &wgpu::Texture { &self.texture }
}
