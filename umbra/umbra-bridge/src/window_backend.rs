//! Device creation and the presentation surface.

use std::sync::Arc;

use render_api::RenderError;
use umbra_renderer::{ShadowRenderer, UmbraConfig};

/// Swapchain for one window. Outdated or lost surfaces are reconfigured once per acquire.
pub struct WindowSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl WindowSurface {
    /// Creates the surface, picks an adapter able to present to it, and builds the renderer
    /// with the surface's preferred sRGB format.
    pub fn create<W>(window: Arc<W>, width: u32, height: u32, config: UmbraConfig) -> Result<(Self, ShadowRenderer), RenderError>
    where
        W: wgpu::WindowHandle + 'static,
    {
        pollster::block_on(Self::create_async(window, width, height, config))
    }

    async fn create_async<W>(
        window: Arc<W>,
        width: u32,
        height: u32,
        mut config: UmbraConfig,
    ) -> Result<(Self, ShadowRenderer), RenderError>
    where
        W: wgpu::WindowHandle + 'static,
    {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window).map_err(|e| RenderError::Surface(e.to_string()))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::resource("no adapter can present to this window"))?;
        let (device, queue) = request_device(&adapter).await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Surface("surface reports no formats".into()))?;
        config.surface_format = format;
        let surface_config = surface_config(format, width, height);
        surface.configure(&device, &surface_config);
        log::info!("surface {}x{} {:?} on {}", width, height, format, adapter.get_info().name);

        let renderer = ShadowRenderer::new_with_config(device, queue, config)?;
        Ok((Self { surface, config: surface_config }, renderer))
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(device, &self.config);
    }

    pub fn acquire(&mut self, device: &wgpu::Device) -> Result<wgpu::SurfaceTexture, RenderError> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(e @ (wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost)) => {
                log::warn!("surface {}, reconfiguring", e);
                self.surface.configure(device, &self.config);
                self.surface.get_current_texture().map_err(|e| RenderError::Surface(e.to_string()))
            }
            Err(e) => Err(RenderError::Surface(e.to_string())),
        }
    }
}

/// Renderer without a window, for offline baking.
pub fn headless_renderer(config: UmbraConfig) -> Result<ShadowRenderer, RenderError> {
    pollster::block_on(async {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok_or_else(|| RenderError::resource("no adapter"))?;
        let (device, queue) = request_device(&adapter).await?;
        ShadowRenderer::new_with_config(device, queue, config)
    })
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), RenderError> {
    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("umbra_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )
        .await
        .map_err(|e| RenderError::resource(e.to_string()))
}

fn surface_config(format: wgpu::TextureFormat, width: u32, height: u32) -> wgpu::SurfaceConfiguration {
    wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: width.max(1),
        height: height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: wgpu::CompositeAlphaMode::Opaque,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_config_never_zero_sized() {
        let c = surface_config(wgpu::TextureFormat::Bgra8UnormSrgb, 0, 0);
        assert_eq!((c.width, c.height), (1, 1));
        assert_eq!(c.present_mode, wgpu::PresentMode::Fifo);
    }
}
