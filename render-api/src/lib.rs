//! Shared render API for the Umbra shadow demos.
//! Defines the event-driven Renderer capability, the input events the host forwards to it,
//! and the error taxonomy every crate in the workspace reports through.

mod backend;
mod error;
mod input;

pub use backend::Renderer;
pub use error::RenderError;
pub use input::{Key, KeyState, MouseButton};
