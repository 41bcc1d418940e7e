//! Umbra bridge: scene, camera and light state plus the `render_api::Renderer` implementation
//! that drives umbra-renderer for the demo shells.

pub mod camera;
pub mod compositor;
pub mod frame_state;
pub mod light;
pub mod scene;
mod window_backend;

pub use camera::FlyCamera;
pub use compositor::{DemoOptions, FieldSource, SceneCompositor};
pub use frame_state::{Command, FrameState};
pub use light::DirectionalLight;
pub use scene::{SceneKind, SceneMeshes};
pub use window_backend::{headless_renderer, WindowSurface};
