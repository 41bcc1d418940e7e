//! Demo shell shared by the three windowed variants: a winit event loop that forwards input
//! and redraws to a `render_api::Renderer`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use render_api::{Key, KeyState, MouseButton, RenderError, Renderer};
use umbra_bridge::{DemoOptions, FieldSource, SceneCompositor, SceneKind};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Command line shared by the windowed demos.
#[derive(clap::Args, Clone, Debug)]
pub struct ShellArgs {
    /// Directory with lucy.obj, pillar.obj, sphere.obj and plane.obj; procedural meshes when omitted
    #[arg(long)]
    pub mesh_dir: Option<PathBuf>,
    /// Initial scene preset
    #[arg(long, default_value = "model", value_parser = parse_scene)]
    pub scene: SceneKind,
    #[arg(long, default_value_t = 1280)]
    pub width: u32,
    #[arg(long, default_value_t = 720)]
    pub height: u32,
}

impl ShellArgs {
    pub fn options(&self, fields: FieldSource) -> DemoOptions {
        DemoOptions { fields, mesh_dir: self.mesh_dir.clone(), scene: self.scene }
    }
}

pub fn parse_scene(name: &str) -> Result<SceneKind, String> {
    SceneKind::from_name(name).ok_or_else(|| format!("unknown scene '{}', expected model, pillar or sphere", name))
}

/// `RUST_LOG` filtering with `info` as the default level.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Runs the shell and exits the process with status 1 on failure.
pub fn run_or_exit(title: &str, args: &ShellArgs, fields: FieldSource) {
    if let Err(e) = run(title, args, fields) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

pub fn run(title: &str, args: &ShellArgs, fields: FieldSource) -> Result<(), RenderError> {
    let event_loop = EventLoop::new().map_err(|e| RenderError::Surface(e.to_string()))?;
    let mut app = App {
        title: title.to_string(),
        size: (args.width.max(1), args.height.max(1)),
        options: args.options(fields),
        window: None,
        compositor: None,
        last_frame: None,
        error: None,
    };
    event_loop.run_app(&mut app).map_err(|e| RenderError::Surface(e.to_string()))?;
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct App {
    title: String,
    size: (u32, u32),
    options: DemoOptions,
    window: Option<Arc<Window>>,
    compositor: Option<SceneCompositor>,
    last_frame: Option<Instant>,
    error: Option<RenderError>,
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: RenderError) {
        self.error = Some(error);
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), RenderError> {
        let attrs = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(self.size.0, self.size.1));
        let window = Arc::new(event_loop.create_window(attrs).map_err(|e| RenderError::Surface(e.to_string()))?);
        let phys = window.inner_size();
        self.size = (phys.width.max(1), phys.height.max(1));
        let compositor = SceneCompositor::new(window.clone(), self.size.0, self.size.1, &self.options)?;
        self.compositor = Some(compositor);
        self.window = Some(window);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(compositor) = self.compositor.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                self.size = (size.width, size.height);
                if let Err(e) = compositor.on_resize(size.width, size.height) {
                    self.fail(event_loop, e);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                let state = key_state(event.state);
                if code == KeyCode::Escape && state == KeyState::Pressed {
                    event_loop.exit();
                } else if !event.repeat {
                    compositor.on_key(map_key(code), state);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                compositor.on_mouse_button(map_button(button), key_state(state));
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = self.last_frame.map_or(0.0, |t| now.duration_since(t).as_secs_f32());
                self.last_frame = Some(now);
                if let Err(e) = compositor.on_frame(dt) {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let (Some(compositor), DeviceEvent::MouseMotion { delta: (dx, dy) }) = (self.compositor.as_mut(), event) {
            compositor.on_mouse_motion(dx as f32, dy as f32);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn key_state(state: ElementState) -> KeyState {
    match state {
        ElementState::Pressed => KeyState::Pressed,
        ElementState::Released => KeyState::Released,
    }
}

pub fn map_key(code: KeyCode) -> Key {
    match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::Space => Key::Space,
        KeyCode::KeyG => Key::G,
        KeyCode::KeyT => Key::T,
        KeyCode::KeyO => Key::O,
        KeyCode::KeyB => Key::B,
        KeyCode::KeyP => Key::P,
        KeyCode::KeyV => Key::V,
        KeyCode::Digit1 => Key::Digit1,
        KeyCode::Digit2 => Key::Digit2,
        KeyCode::Digit3 => Key::Digit3,
        KeyCode::BracketLeft => Key::BracketLeft,
        KeyCode::BracketRight => Key::BracketRight,
        KeyCode::Minus => Key::Minus,
        KeyCode::Equal => Key::Equal,
        KeyCode::KeyF => Key::F,
        KeyCode::Tab => Key::Tab,
        KeyCode::Comma => Key::Comma,
        KeyCode::Period => Key::Period,
        KeyCode::ArrowUp => Key::ArrowUp,
        KeyCode::ArrowDown => Key::ArrowDown,
        KeyCode::ArrowLeft => Key::ArrowLeft,
        KeyCode::ArrowRight => Key::ArrowRight,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Escape => Key::Escape,
        _ => Key::Other,
    }
}

fn map_button(button: winit::event::MouseButton) -> MouseButton {
    match button {
        winit::event::MouseButton::Left => MouseButton::Left,
        winit::event::MouseButton::Right => MouseButton::Right,
        winit::event::MouseButton::Middle => MouseButton::Middle,
        _ => MouseButton::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_demo_controls() {
        assert_eq!(map_key(KeyCode::KeyW), Key::W);
        assert_eq!(map_key(KeyCode::BracketRight), Key::BracketRight);
        assert_eq!(map_key(KeyCode::PageDown), Key::PageDown);
        assert_eq!(map_key(KeyCode::Tab), Key::Tab);
        assert_eq!(map_key(KeyCode::F1), Key::Other);
        assert_eq!(map_button(winit::event::MouseButton::Right), MouseButton::Right);
    }

    #[test]
    fn scene_names_parse() {
        assert_eq!(parse_scene("pillar"), Ok(SceneKind::Pillar));
        assert!(parse_scene("lucy").is_err());
    }
}
