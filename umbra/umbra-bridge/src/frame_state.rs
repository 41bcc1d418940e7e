//! Input staged between frames. Event callbacks only write here; `on_frame` consumes it.

use glam::{Vec2, Vec3};
use render_api::{Key, KeyState, MouseButton};
use umbra_renderer::Tunable;

use crate::scene::SceneKind;

/// Fly speed in world units per second.
pub const CAMERA_SPEED: f32 = 50.0;

/// Softness multiplier applied per `[` / `]` press.
pub const SOFTNESS_STEP: f32 = 1.25;

/// Light elevation change per `-` / `=` press, degrees.
pub const LIGHT_PITCH_STEP: f32 = 2.0;

/// Caster movement per arrow / page key press, world units.
pub const CASTER_NUDGE: f32 = 1.0;

/// Discrete actions triggered by a key press.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    ToggleReport,
    ToggleTechnique,
    ToggleProjection,
    ScaleSoftness(f32),
    LightPitch(f32),
    CycleBlockerSamples,
    CyclePcfSamples,
    CycleVisualization,
    SelectScene(SceneKind),
    ToggleLightFrustum,
    /// Tab: the tunable `,` / `.` now step.
    SelectTunable(Tunable),
    /// Step a tunable by this many increments.
    Adjust(Tunable, f32),
    /// Move the active preset's casters.
    NudgeCaster(Vec3),
}

#[derive(Clone, Debug, Default)]
pub struct FrameState {
    heading: f32,
    sideways: f32,
    look_key: bool,
    look_button: bool,
    mouse_delta: Vec2,
    tunable: Tunable,
}

impl FrameState {
    /// Stages movement keys and returns the command bound to a pressed key, if any.
    pub fn on_key(&mut self, key: Key, state: KeyState) -> Option<Command> {
        let pressed = state == KeyState::Pressed;
        match (key, pressed) {
            (Key::W, true) => self.heading = CAMERA_SPEED,
            (Key::S, true) => self.heading = -CAMERA_SPEED,
            (Key::W | Key::S, false) => self.heading = 0.0,
            (Key::D, true) => self.sideways = CAMERA_SPEED,
            (Key::A, true) => self.sideways = -CAMERA_SPEED,
            (Key::A | Key::D, false) => self.sideways = 0.0,
            (Key::Space, _) => self.look_key = pressed,
            (Key::Tab, true) => {
                self.tunable = self.tunable.next();
                return Some(Command::SelectTunable(self.tunable));
            }
            (Key::Comma, true) => return Some(Command::Adjust(self.tunable, -1.0)),
            (Key::Period, true) => return Some(Command::Adjust(self.tunable, 1.0)),
            (_, false) => {}
            (key, true) => return command_for(key),
        }
        None
    }

    pub fn on_mouse_button(&mut self, button: MouseButton, state: KeyState) {
        if button == MouseButton::Right {
            self.look_button = state == KeyState::Pressed;
        }
    }

    pub fn on_mouse_motion(&mut self, dx: f32, dy: f32) {
        if dx.is_finite() && dy.is_finite() {
            self.mouse_delta += Vec2::new(dx, dy);
        }
    }

    pub fn tunable(&self) -> Tunable {
        self.tunable
    }

    pub fn mouse_look(&self) -> bool {
        self.look_key || self.look_button
    }

    /// Movement for a frame of `dt` seconds as (forward, right) distances, plus the mouse
    /// delta when mouse look is active. The accumulated delta is cleared either way.
    pub fn take(&mut self, dt: f32) -> (f32, f32, Option<Vec2>) {
        let delta = std::mem::take(&mut self.mouse_delta);
        let look = self.mouse_look().then_some(delta);
        (self.heading * dt, self.sideways * dt, look)
    }
}

fn command_for(key: Key) -> Option<Command> {
    let command = match key {
        Key::G => Command::ToggleReport,
        Key::T => Command::ToggleTechnique,
        Key::O => Command::ToggleProjection,
        Key::BracketLeft => Command::ScaleSoftness(1.0 / SOFTNESS_STEP),
        Key::BracketRight => Command::ScaleSoftness(SOFTNESS_STEP),
        Key::Minus => Command::LightPitch(-LIGHT_PITCH_STEP),
        Key::Equal => Command::LightPitch(LIGHT_PITCH_STEP),
        Key::B => Command::CycleBlockerSamples,
        Key::P => Command::CyclePcfSamples,
        Key::V => Command::CycleVisualization,
        Key::Digit1 => Command::SelectScene(SceneKind::Model),
        Key::Digit2 => Command::SelectScene(SceneKind::Pillar),
        Key::Digit3 => Command::SelectScene(SceneKind::Animated),
        Key::F => Command::ToggleLightFrustum,
        Key::ArrowLeft => Command::NudgeCaster(Vec3::NEG_X * CASTER_NUDGE),
        Key::ArrowRight => Command::NudgeCaster(Vec3::X * CASTER_NUDGE),
        Key::ArrowUp => Command::NudgeCaster(Vec3::NEG_Z * CASTER_NUDGE),
        Key::ArrowDown => Command::NudgeCaster(Vec3::Z * CASTER_NUDGE),
        Key::PageUp => Command::NudgeCaster(Vec3::Y * CASTER_NUDGE),
        Key::PageDown => Command::NudgeCaster(Vec3::NEG_Y * CASTER_NUDGE),
        _ => return None,
    };
    Some(command)
}
