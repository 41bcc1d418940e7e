//! Error taxonomy shared by the field baker, the GPU renderer and the demo shells.

use std::path::PathBuf;

/// Every failure the demos can report. All of them are fatal at startup; the
/// per-frame path only surfaces `Surface` errors that survived one reconfigure.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// Shader, pipeline, buffer or texture could not be created (or exceeds device limits).
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A mesh asset could not be loaded.
    #[error("failed to load mesh {path}: {reason}")]
    MeshLoadFailed { path: PathBuf, reason: String },

    /// Degenerate input to the baker (no triangles, bad spacing, grid too large).
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Malformed precomputed distance field blob.
    #[error("corrupt asset: {0}")]
    CorruptAsset(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Presentation surface failure that could not be recovered by reconfiguring.
    #[error("surface error: {0}")]
    Surface(String),
}

impl RenderError {
    pub fn resource<T: ToString>(msg: T) -> Self {
        RenderError::ResourceCreationFailed(msg.to_string())
    }

    pub fn geometry<T: ToString>(msg: T) -> Self {
        RenderError::InvalidGeometry(msg.to_string())
    }

    pub fn corrupt<T: ToString>(msg: T) -> Self {
        RenderError::CorruptAsset(msg.to_string())
    }

    pub fn mesh_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        RenderError::MeshLoadFailed { path: path.into(), reason: reason.to_string() }
    }
}
