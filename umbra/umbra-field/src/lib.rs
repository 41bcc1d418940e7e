//! Umbra field tools: mesh preprocessing, signed distance field baking and sampling,
//! plus CPU reference versions of the two shadow estimators the shaders implement.

pub mod bake;
pub mod field;
pub mod format;
pub mod grid;
pub mod mesh;
pub mod pcss;
pub mod sampler;
pub mod soft_shadow;

pub use bake::{bake, bake_grid, closest_point_on_triangle, DEFAULT_PADDING, MAX_VOXELS};
pub use field::DistanceField;
pub use format::{decode_field, encode_field, load_field, save_field, save_legacy_field, FIELD_FORMAT_VERSION, FIELD_MAGIC};
pub use grid::VoxelGrid;
pub use mesh::{Mesh, SubMesh};
pub use pcss::{DepthMap, LightProjection, PcssParams, PcssResult, SampleCount};
pub use sampler::VolumeSampler;
pub use soft_shadow::{MarchOutcome, MarchParams, MarchResult, ShadowCaster};

pub use render_api::RenderError;
