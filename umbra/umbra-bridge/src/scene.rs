//! Demo scene: a ground receiver plus one caster per preset, only the active preset drawn.
//!
//! Meshes are posed on the CPU (scale, rotation) before upload and baking, so per-frame
//! instance transforms are pure translations and field distances stay in world units.

use std::f32::consts::FRAC_PI_4;
use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use render_api::RenderError;
use umbra_field::Mesh;
use umbra_renderer::{FieldHandle, InstanceUniforms, MeshDraw};

/// Half size of the procedural ground plane.
pub const GROUND_HALF_SIZE: f32 = 100.0;

pub const SPHERE_RADIUS: f32 = 5.0;

pub const DEFAULT_COLOR: Vec3 = Vec3::splat(0.5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SceneKind {
    Model,
    Pillar,
    Animated,
}

impl SceneKind {
    pub const ALL: [SceneKind; 3] = [Self::Model, Self::Pillar, Self::Animated];

    pub fn name(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Pillar => "pillar",
            Self::Animated => "sphere",
        }
    }

    /// Precomputed field blob for this preset's caster.
    pub fn field_file(self) -> String {
        format!("{}.usdf", self.name())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// Vertical bob: `amplitude * (sin(t) * 0.5 + 0.5)`, so the offset stays in `[0, amplitude]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bob {
    pub amplitude: f32,
}

impl Bob {
    pub fn offset(&self, time: f32) -> f32 {
        self.amplitude * (time.sin() * 0.5 + 0.5)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub base: Vec3,
    pub position: Vec3,
    pub bob: Option<Bob>,
}

impl Placement {
    pub fn fixed(position: Vec3) -> Self {
        Self { base: position, position, bob: None }
    }

    pub fn bobbing(base: Vec3, amplitude: f32) -> Self {
        let bob = Bob { amplitude };
        Self { base, position: base + Vec3::Y * bob.offset(0.0), bob: Some(bob) }
    }

    pub fn advance(&mut self, time: f32) {
        if let Some(bob) = self.bob {
            self.position = self.base + Vec3::Y * bob.offset(time);
        }
    }

    /// Moves the placement, bob anchor included.
    pub fn nudge(&mut self, delta: Vec3) {
        if delta.is_finite() {
            self.base += delta;
            self.position += delta;
        }
    }

    pub fn model(&self) -> Mat4 {
        Mat4::from_translation(self.position)
    }

    pub fn world_to_local(&self) -> Mat4 {
        Mat4::from_translation(-self.position)
    }
}

/// CPU meshes for every preset plus the ground, already posed.
pub struct SceneMeshes {
    pub model: Mesh,
    pub pillar: Mesh,
    pub sphere: Mesh,
    pub ground: Mesh,
}

impl SceneMeshes {
    /// Loads `lucy.obj`, `pillar.obj`, `sphere.obj` and `plane.obj` from `mesh_dir`, or builds
    /// procedural stand-ins when no directory is given.
    pub fn load(mesh_dir: Option<&Path>) -> Result<Self, RenderError> {
        match mesh_dir {
            Some(dir) => Ok(Self {
                model: Mesh::load_obj(dir.join("lucy.obj"))?.transformed(model_pose())?,
                pillar: Mesh::load_obj(dir.join("pillar.obj"))?.transformed(Mat4::from_scale(Vec3::splat(7.0)))?,
                sphere: Mesh::load_obj(dir.join("sphere.obj"))?.transformed(Mat4::from_scale(Vec3::splat(SPHERE_RADIUS)))?,
                ground: Mesh::load_obj(dir.join("plane.obj"))?,
            }),
            None => {
                log::info!("no mesh directory, using procedural stand-ins");
                Self::procedural()
            }
        }
    }

    pub fn procedural() -> Result<Self, RenderError> {
        Ok(Self {
            model: Mesh::cuboid(Vec3::new(0.0, 15.0, 0.0), Vec3::new(2.0, 15.0, 6.0))?
                .transformed(Mat4::from_quat(Quat::from_rotation_y(FRAC_PI_4)))?,
            pillar: Mesh::cuboid(Vec3::new(0.0, 20.0, 0.0), Vec3::new(3.0, 20.0, 3.0))?,
            sphere: Mesh::uv_sphere(Vec3::ZERO, SPHERE_RADIUS, 48, 24)?,
            ground: Mesh::plane(0.0, GROUND_HALF_SIZE)?,
        })
    }

    pub fn caster(&self, kind: SceneKind) -> &Mesh {
        match kind {
            SceneKind::Model => &self.model,
            SceneKind::Pillar => &self.pillar,
            SceneKind::Animated => &self.sphere,
        }
    }

    /// Initial placement of a preset's caster.
    pub fn placement(kind: SceneKind) -> Placement {
        match kind {
            SceneKind::Animated => Placement::bobbing(Vec3::ZERO, 40.0),
            _ => Placement::fixed(Vec3::ZERO),
        }
    }
}

fn model_pose() -> Mat4 {
    Mat4::from_scale(Vec3::splat(0.1)) * Mat4::from_quat(Quat::from_rotation_y(FRAC_PI_4))
}

pub struct Instance {
    pub draw: MeshDraw,
    /// Receivers carry no field.
    pub field: Option<FieldHandle>,
    pub placement: Placement,
    pub color: Vec3,
    /// Preset the instance belongs to; `None` is drawn in every preset.
    pub kind: Option<SceneKind>,
}

impl Instance {
    pub fn caster(&self) -> Option<InstanceUniforms> {
        self.field.as_ref().map(|f| f.instance(self.placement.world_to_local()))
    }
}

pub struct Scene {
    instances: Vec<Instance>,
    active: SceneKind,
    clock: f32,
}

impl Scene {
    pub fn new(active: SceneKind) -> Self {
        Self { instances: Vec::new(), active, clock: 0.0 }
    }

    pub fn push(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    pub fn active(&self) -> SceneKind {
        self.active
    }

    pub fn set_active(&mut self, kind: SceneKind) {
        if self.active != kind {
            log::info!("scene preset: {}", kind.name());
            self.active = kind;
        }
    }

    /// Moves the active preset's casters by `delta`; returns the first one's new anchor.
    pub fn nudge_active(&mut self, delta: Vec3) -> Option<Vec3> {
        let active = self.active;
        let mut moved = None;
        for inst in self.instances.iter_mut().filter(|i| i.kind == Some(active)) {
            inst.placement.nudge(delta);
            moved.get_or_insert(inst.placement.base);
        }
        moved
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    /// Advances the animation clock and recomputes every placement.
    pub fn advance(&mut self, dt: f32) {
        if dt.is_finite() && dt > 0.0 {
            self.clock += dt;
        }
        for inst in &mut self.instances {
            inst.placement.advance(self.clock);
        }
    }

    pub fn visible(&self) -> impl Iterator<Item = &Instance> + '_ {
        let active = self.active;
        self.instances.iter().filter(move |i| shown_in(i.kind, active))
    }

    /// Uniforms for every visible instance that carries a field, in draw order.
    pub fn casters(&self) -> Vec<InstanceUniforms> {
        self.visible().filter_map(Instance::caster).collect()
    }
}

fn shown_in(kind: Option<SceneKind>, active: SceneKind) -> bool {
    kind.map_or(true, |k| k == active)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bob_stays_in_range() {
        let mut p = Placement::bobbing(Vec3::ZERO, 40.0);
        assert_eq!(p.position.y, 20.0);
        for i in 0..100 {
            p.advance(i as f32 * 0.1);
            assert!((0.0..=40.0).contains(&p.position.y));
        }
        p.advance(std::f32::consts::FRAC_PI_2);
        assert!((p.position.y - 40.0).abs() < 1e-4);
        assert_eq!(p.world_to_local().transform_point3(p.position), Vec3::ZERO);
    }

    #[test]
    fn fixed_placement_ignores_time() {
        let mut p = Placement::fixed(Vec3::new(1.0, 2.0, 3.0));
        p.advance(10.0);
        assert_eq!(p.position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn nudge_moves_the_bob_anchor() {
        let mut p = Placement::bobbing(Vec3::ZERO, 40.0);
        p.nudge(Vec3::new(2.0, 1.0, 0.0));
        assert_eq!(p.base, Vec3::new(2.0, 1.0, 0.0));
        p.advance(std::f32::consts::FRAC_PI_2);
        assert!((p.position - Vec3::new(2.0, 41.0, 0.0)).length() < 1e-4);
        p.nudge(Vec3::new(f32::NAN, 0.0, 0.0));
        assert_eq!(p.base, Vec3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn presets_filter_instances() {
        assert!(shown_in(None, SceneKind::Pillar));
        assert!(shown_in(Some(SceneKind::Pillar), SceneKind::Pillar));
        assert!(!shown_in(Some(SceneKind::Model), SceneKind::Pillar));
    }

    #[test]
    fn preset_names_round_trip() {
        for kind in SceneKind::ALL {
            assert_eq!(SceneKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(SceneKind::Animated.field_file(), "sphere.usdf");
    }

    #[test]
    fn procedural_meshes_rest_on_ground() {
        let meshes = SceneMeshes::procedural().unwrap();
        for kind in [SceneKind::Model, SceneKind::Pillar] {
            let m = meshes.caster(kind);
            assert!(m.min_extents().y.abs() < 1e-4, "{:?}", kind);
        }
        assert!((meshes.sphere.max_extents().y - SPHERE_RADIUS).abs() < 1e-4);
        assert!(meshes.ground.triangle_count() > 0);
    }
}
