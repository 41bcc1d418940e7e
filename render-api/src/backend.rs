//! Trait for demo renderers. The host event loop drives one implementation per demo variant.

use crate::{Key, KeyState, MouseButton, RenderError};

/// Event-driven renderer capability. The host calls `on_frame` once per redraw and forwards
/// input and resize events in between; implementations only stage input and consume it in
/// the next `on_frame`.
pub trait Renderer {
    /// Advance one frame (`dt` in seconds): update camera and uniforms, encode and submit
    /// the shadow and lit passes, present.
    fn on_frame(&mut self, dt: f32) -> Result<(), RenderError>;

    /// Keyboard event.
    fn on_key(&mut self, key: Key, state: KeyState);

    /// Window resized (physical pixels). Called with the new size before the next frame.
    fn on_resize(&mut self, width: u32, height: u32) -> Result<(), RenderError>;

    /// Mouse button event.
    fn on_mouse_button(&mut self, _button: MouseButton, _state: KeyState) {}

    /// Relative mouse motion in pixels since the last event.
    fn on_mouse_motion(&mut self, _dx: f32, _dy: f32) {}
}
