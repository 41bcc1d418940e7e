//! Sphere-traced soft shadows against a set of distance field casters.
//!
//! CPU reference of the march in `composite.wgsl`. Inside a caster's voxel-centre box the field
//! is sampled directly; only those samples can register a hit or shape the penumbra. Outside
//! the box a caster only bounds the step size.

use glam::{Mat4, Vec3};

use crate::field::DistanceField;
use crate::sampler::VolumeSampler;

pub const MIN_SOFTNESS: f32 = 1e-3;
pub const MAX_SOFTNESS: f32 = 1e3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarchParams {
    pub t_min: f32,
    pub t_max: f32,
    /// Penumbra sharpness; larger values give harder shadows.
    pub softness_k: f32,
    /// Hit threshold on the safe step.
    pub epsilon: f32,
    pub max_steps: u32,
}

impl Default for MarchParams {
    fn default() -> Self {
        Self { t_min: 0.05, t_max: 100.0, softness_k: 8.0, epsilon: 1e-3, max_steps: 128 }
    }
}

impl MarchParams {
    pub fn clamped_softness(&self) -> f32 {
        if self.softness_k.is_nan() {
            return MIN_SOFTNESS;
        }
        self.softness_k.clamp(MIN_SOFTNESS, MAX_SOFTNESS)
    }
}

/// One distance field placed in the world.
#[derive(Clone, Copy)]
pub struct ShadowCaster<'a> {
    field: &'a DistanceField,
    world_to_local: Mat4,
    box_center: Vec3,
    box_half_extents: Vec3,
    margin: f32,
}

impl<'a> ShadowCaster<'a> {
    pub fn new(field: &'a DistanceField, world_to_local: Mat4) -> Self {
        let (lo, hi) = VolumeSampler::new(field).bounds();
        Self {
            field,
            world_to_local,
            box_center: 0.5 * (lo + hi),
            box_half_extents: 0.5 * (hi - lo),
            margin: field.spacing(),
        }
    }

    /// Caster translated to `position`; the field's local frame is the mesh's model frame.
    pub fn at(field: &'a DistanceField, position: Vec3) -> Self {
        Self::new(field, Mat4::from_translation(-position))
    }

    pub fn box_center(&self) -> Vec3 {
        self.box_center
    }

    pub fn box_half_extents(&self) -> Vec3 {
        self.box_half_extents
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Signed distance from a local-space point to the caster's box.
    pub fn box_distance(&self, local: Vec3) -> f32 {
        let q = (local - self.box_center).abs() - self.box_half_extents;
        q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarchOutcome {
    Hit,
    Escaped,
    /// Step budget ran out; treated like `Escaped`.
    MaxStepsExceeded,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarchResult {
    pub outcome: MarchOutcome,
    pub visibility: f32,
    pub steps: u32,
}

/// Light visibility in `[0, 1]` from `origin` towards the light along `direction`.
pub fn visibility(origin: Vec3, direction: Vec3, casters: &[ShadowCaster<'_>], params: &MarchParams) -> f32 {
    trace(origin, direction, casters, params).visibility
}

pub fn trace(origin: Vec3, direction: Vec3, casters: &[ShadowCaster<'_>], params: &MarchParams) -> MarchResult {
    let escaped = |res: f32, steps| MarchResult { outcome: MarchOutcome::Escaped, visibility: res.clamp(0.0, 1.0), steps };
    let Some(dir) = direction.try_normalize() else {
        return escaped(1.0, 0);
    };
    if casters.is_empty() {
        return escaped(1.0, 0);
    }
    if scene_distance(casters, origin, params.epsilon).surface < params.epsilon {
        return MarchResult { outcome: MarchOutcome::Hit, visibility: 0.0, steps: 0 };
    }

    let k = params.clamped_softness();
    let mut res = 1.0f32;
    let mut t = params.t_min;
    for step in 0..params.max_steps {
        if !(t < params.t_max) {
            return escaped(res, step);
        }
        let d = scene_distance(casters, origin + dir * t, params.epsilon);
        if d.surface < params.epsilon {
            return MarchResult { outcome: MarchOutcome::Hit, visibility: 0.0, steps: step + 1 };
        }
        if d.surface.is_finite() && t > 0.0 {
            res = res.min(k * d.surface / t);
        }
        t += d.step;
    }
    MarchResult {
        outcome: MarchOutcome::MaxStepsExceeded,
        visibility: res.clamp(0.0, 1.0),
        steps: params.max_steps,
    }
}

/// Union distance of all casters at a world point.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SceneDistance {
    /// Nearest field sample taken inside a caster's box; infinite when the point is in no box.
    surface: f32,
    /// Safe step: `surface` or a conservative bound from the boxes the point lies outside.
    step: f32,
}

/// Outside a box the clamped sample is the field value at the nearest box point `q`, so the
/// true distance is at least `max(box_d, sample - box_d)`. That bound never counts as a hit;
/// it is floored at `epsilon` so the march cannot stall against a box face.
fn scene_distance(casters: &[ShadowCaster<'_>], p: Vec3, epsilon: f32) -> SceneDistance {
    let mut surface = f32::INFINITY;
    let mut step = f32::INFINITY;
    for caster in casters {
        let local = caster.world_to_local.transform_point3(p);
        let box_d = caster.box_distance(local);
        if box_d <= 0.0 {
            let s = VolumeSampler::new(caster.field).sample(local);
            surface = surface.min(s);
            step = step.min(s);
        } else if box_d > caster.margin {
            step = step.min(box_d);
        } else {
            let s = VolumeSampler::new(caster.field).sample(local);
            step = step.min(box_d.max(s - box_d).max(epsilon));
        }
    }
    SceneDistance { surface, step }
}
