//! SceneCompositor: the `render_api::Renderer` driving one demo window.

use std::path::PathBuf;
use std::sync::Arc;

use render_api::{Key, KeyState, MouseButton, RenderError, Renderer};
use umbra_field::load_field;
use umbra_renderer::{FrameView, ShadowRenderer, ShadowSettings, ShadowTechnique, UmbraConfig};

use crate::camera::FlyCamera;
use crate::frame_state::{Command, FrameState};
use crate::light::DirectionalLight;
use crate::scene::{Instance, Placement, Scene, SceneKind, SceneMeshes, DEFAULT_COLOR};
use crate::window_backend::WindowSurface;

/// Where each caster's distance field comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldSource {
    /// No fields; shadow map only.
    None,
    /// Baked on the GPU at startup.
    GpuBake,
    /// `<preset>.usdf` blobs in this directory.
    Precomputed(PathBuf),
}

#[derive(Clone, Debug)]
pub struct DemoOptions {
    pub fields: FieldSource,
    /// Directory holding the OBJ assets; procedural meshes when `None`.
    pub mesh_dir: Option<PathBuf>,
    pub scene: SceneKind,
}

pub struct SceneCompositor {
    surface: WindowSurface,
    renderer: ShadowRenderer,
    camera: FlyCamera,
    light: DirectionalLight,
    scene: Scene,
    settings: ShadowSettings,
    frame: FrameState,
    report: bool,
}

impl SceneCompositor {
    /// Sets up the surface, device, meshes and fields. Any failure here is fatal for the demo.
    pub fn new<W>(window: Arc<W>, width: u32, height: u32, options: &DemoOptions) -> Result<Self, RenderError>
    where
        W: wgpu::WindowHandle + 'static,
    {
        let mut config = UmbraConfig::from_env();
        config.technique = match options.fields {
            FieldSource::None => ShadowTechnique::ShadowMap,
            _ => ShadowTechnique::DistanceField,
        };
        let (surface, mut renderer) = WindowSurface::create(window, width, height, config)?;
        let scene = build_scene(&mut renderer, options)?;
        let settings = ShadowSettings { technique: renderer.config().technique, ..ShadowSettings::default() };
        log::info!("{}", settings.summary());
        Ok(Self {
            surface,
            renderer,
            camera: FlyCamera::demo(width as f32 / height.max(1) as f32),
            light: DirectionalLight::default(),
            scene,
            settings,
            frame: FrameState::default(),
            report: false,
        })
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::ToggleReport => {
                self.report = !self.report;
                if self.report {
                    log::info!("{}", self.settings.summary());
                }
            }
            Command::LightPitch(degrees) => {
                self.light.adjust_elevation(degrees);
                log::info!("light elevation {:.1} deg", self.light.elevation());
            }
            Command::SelectScene(kind) => self.scene.set_active(kind),
            Command::SelectTunable(tunable) => {
                log::info!("adjusting {:?} (now {:.4}) with , and .", tunable, self.settings.value(tunable));
            }
            Command::NudgeCaster(delta) => match self.scene.nudge_active(delta) {
                Some(p) => log::info!("{} caster at ({:.1}, {:.1}, {:.1})", self.scene.active().name(), p.x, p.y, p.z),
                None => log::warn!("{} preset has no caster to move", self.scene.active().name()),
            },
            other => {
                if apply_settings_command(&mut self.settings, other) && self.report {
                    log::info!("{}", self.settings.summary());
                }
                if let Command::Adjust(tunable, _) = other {
                    log::info!("{:?} = {:.4}", tunable, self.settings.value(tunable));
                }
                if other == Command::ToggleTechnique
                    && self.settings.technique == ShadowTechnique::DistanceField
                    && self.renderer.resident_fields() == 0
                {
                    log::warn!("no distance fields resident, every fragment is lit");
                }
            }
        }
    }
}

/// Applies a command that only touches shadow settings. Returns whether it did.
pub fn apply_settings_command(settings: &mut ShadowSettings, command: Command) -> bool {
    match command {
        Command::ToggleTechnique => settings.technique = settings.technique.toggled(),
        Command::ToggleProjection => settings.toggle_projection(),
        Command::ScaleSoftness(factor) => settings.scale_softness(factor),
        Command::CycleBlockerSamples => settings.set_blocker_samples(settings.pcss.blocker_samples.next()),
        Command::CyclePcfSamples => settings.set_pcf_samples(settings.pcss.pcf_samples.next()),
        Command::CycleVisualization => settings.visualization = settings.visualization.next(),
        Command::ToggleLightFrustum => settings.show_light_frustum = !settings.show_light_frustum,
        Command::Adjust(tunable, presses) => settings.adjust(tunable, presses),
        Command::ToggleReport
        | Command::LightPitch(_)
        | Command::SelectScene(_)
        | Command::SelectTunable(_)
        | Command::NudgeCaster(_) => return false,
    }
    true
}

fn build_scene(renderer: &mut ShadowRenderer, options: &DemoOptions) -> Result<Scene, RenderError> {
    let meshes = SceneMeshes::load(options.mesh_dir.as_deref())?;
    let mut scene = Scene::new(options.scene);

    let ground = renderer.upload_mesh(&meshes.ground, "ground")?;
    scene.push(Instance {
        draw: renderer.create_draw(ground),
        field: None,
        placement: Placement::fixed(glam::Vec3::ZERO),
        color: DEFAULT_COLOR,
        kind: None,
    });

    for kind in SceneKind::ALL {
        let mesh = meshes.caster(kind);
        let gpu = renderer.upload_mesh(mesh, kind.name())?;
        let field = match &options.fields {
            FieldSource::None => None,
            FieldSource::GpuBake => Some(renderer.bake_field(mesh, kind.name())?),
            FieldSource::Precomputed(dir) => {
                let path = dir.join(kind.field_file());
                let field = load_field(&path).inspect_err(|_| {
                    log::error!("cannot load {}, create it with `bake_sdf --preset {}`", path.display(), kind.name())
                })?;
                Some(renderer.upload_field(&field, kind.name())?)
            }
        };
        scene.push(Instance {
            draw: renderer.create_draw(gpu),
            field,
            placement: SceneMeshes::placement(kind),
            color: DEFAULT_COLOR,
            kind: Some(kind),
        });
    }
    Ok(scene)
}

impl Renderer for SceneCompositor {
    fn on_frame(&mut self, dt: f32) -> Result<(), RenderError> {
        let (forward, right, look) = self.frame.take(dt);
        self.camera.update(forward, right, look);
        self.scene.advance(dt);

        for inst in self.scene.visible() {
            inst.draw.update(self.renderer.queue(), inst.placement.model(), inst.color)?;
        }
        let casters = self.scene.casters();
        let draws: Vec<_> = self.scene.visible().map(|i| &i.draw).collect();
        let view = FrameView {
            view_proj: self.camera.view_proj(),
            light_view_proj: self.light.view_proj(&self.settings.pcss),
            camera_position: self.camera.position(),
            light_direction: self.light.direction(),
            light_color: self.light.color,
        };

        let frame = self.surface.acquire(self.renderer.device())?;
        let target = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let (width, height) = self.surface.size();
        let commands = self.renderer.render(&target, width, height, &view, &self.settings, &casters, &draws)?;
        self.renderer.submit([commands]);
        frame.present();
        log::debug!("frame dt {:.4}s, {} casters", dt, casters.len());
        Ok(())
    }

    fn on_key(&mut self, key: Key, state: KeyState) {
        if let Some(command) = self.frame.on_key(key, state) {
            self.apply(command);
        }
    }

    fn on_resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.surface.resize(self.renderer.device(), width, height);
        self.camera.set_aspect(width, height);
        self.renderer.ensure_frame_resources(width, height)
    }

    fn on_mouse_button(&mut self, button: MouseButton, state: KeyState) {
        self.frame.on_mouse_button(button, state);
    }

    fn on_mouse_motion(&mut self, dx: f32, dy: f32) {
        self.frame.on_mouse_motion(dx, dy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_field::SampleCount;
    use umbra_renderer::{Tunable, Visualization};

    #[test]
    fn settings_commands_cycle_and_clamp() {
        let mut s = ShadowSettings::default();
        assert!(apply_settings_command(&mut s, Command::ToggleTechnique));
        assert_eq!(s.technique, ShadowTechnique::DistanceField);
        assert!(apply_settings_command(&mut s, Command::CycleBlockerSamples));
        assert_eq!(s.pcss.blocker_samples, SampleCount::S25);
        assert!(apply_settings_command(&mut s, Command::CycleVisualization));
        assert_eq!(s.visualization, Visualization::NumBlockers);
        for _ in 0..100 {
            apply_settings_command(&mut s, Command::ScaleSoftness(2.0));
        }
        assert_eq!(s.march.softness_k, ShadowSettings::SOFTNESS_RANGE.1);
        assert!(apply_settings_command(&mut s, Command::ToggleProjection));
        assert!(!s.is_orthographic());
    }

    #[test]
    fn scene_commands_are_not_settings() {
        let mut s = ShadowSettings::default();
        assert!(!apply_settings_command(&mut s, Command::SelectScene(SceneKind::Pillar)));
        assert!(!apply_settings_command(&mut s, Command::LightPitch(2.0)));
        assert!(!apply_settings_command(&mut s, Command::NudgeCaster(glam::Vec3::X)));
        assert!(!apply_settings_command(&mut s, Command::SelectTunable(Tunable::LightFar)));
        assert_eq!(s, ShadowSettings::default());
    }

    #[test]
    fn runtime_tunables_reach_the_settings() {
        let mut s = ShadowSettings::default();
        assert!(apply_settings_command(&mut s, Command::Adjust(Tunable::LightNear, 2.0)));
        assert_eq!(s.pcss.near, 130.0);
        assert!(apply_settings_command(&mut s, Command::Adjust(Tunable::MarchEnd, -4.0)));
        assert_eq!(s.march.t_max, 80.0);
        assert!(apply_settings_command(&mut s, Command::Adjust(Tunable::DepthBias, 1e6)));
        assert_eq!(s.pcss.depth_bias, ShadowSettings::BIAS_RANGE.1);
        assert!(apply_settings_command(&mut s, Command::ToggleLightFrustum));
        assert!(s.show_light_frustum);
    }
}
