//! Directional light and the light-space frustum used by the depth pass.

use glam::{Mat4, Vec3};
use umbra_field::pcss::{LightProjection, PcssParams};

/// Half size of the orthographic light frustum in world units.
pub const SHADOW_MAP_EXTENTS: f32 = 75.0;

/// Distance from the light target to the light camera.
pub const LIGHT_DISTANCE: f32 = 200.0;

pub const PERSPECTIVE_FOV_DEGREES: f32 = 60.0;

const MIN_ELEVATION: f32 = 5.0;
const MAX_ELEVATION: f32 = 89.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels, normalized.
    direction: Vec3,
    pub target: Vec3,
    pub color: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: -Vec3::new(-0.5, 0.99, 0.5).normalize(),
            target: Vec3::ZERO,
            color: Vec3::ONE,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, target: Vec3, color: Vec3) -> Self {
        Self { direction: direction.normalize_or(Vec3::NEG_Y), target, color }
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Unit vector from a surface toward the light.
    pub fn to_light(&self) -> Vec3 {
        -self.direction
    }

    /// Light elevation above the horizon in degrees.
    pub fn elevation(&self) -> f32 {
        self.to_light().y.clamp(-1.0, 1.0).asin().to_degrees()
    }

    /// Raises (positive) or lowers the light by `degrees`, keeping its azimuth.
    pub fn adjust_elevation(&mut self, degrees: f32) {
        let l = self.to_light();
        let azimuth = l.z.atan2(l.x);
        let e = (self.elevation() + degrees).clamp(MIN_ELEVATION, MAX_ELEVATION).to_radians();
        let l = Vec3::new(e.cos() * azimuth.cos(), e.sin(), e.cos() * azimuth.sin());
        self.direction = -l.normalize();
    }

    pub fn eye(&self) -> Vec3 {
        self.target - self.direction * LIGHT_DISTANCE
    }

    pub fn view(&self) -> Mat4 {
        let up = if self.direction.y.abs() > 0.999 { Vec3::Z } else { Vec3::Y };
        Mat4::look_at_rh(self.eye(), self.target, up)
    }

    pub fn projection(&self, params: &PcssParams) -> Mat4 {
        match params.projection {
            LightProjection::Orthographic => Mat4::orthographic_rh(
                -SHADOW_MAP_EXTENTS,
                SHADOW_MAP_EXTENTS,
                -SHADOW_MAP_EXTENTS,
                SHADOW_MAP_EXTENTS,
                params.near,
                params.far,
            ),
            LightProjection::Perspective => {
                Mat4::perspective_rh(PERSPECTIVE_FOV_DEGREES.to_radians(), 1.0, params.near, params.far)
            }
        }
    }

    pub fn view_proj(&self, params: &PcssParams) -> Mat4 {
        self.projection(params) * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_field::pcss::linearize_depth;

    #[test]
    fn default_light_points_down() {
        let light = DirectionalLight::default();
        assert!(light.direction().y < -0.7);
        assert!(((light.eye() - light.target).length() - LIGHT_DISTANCE).abs() < 1e-3);
    }

    #[test]
    fn target_projects_to_map_centre() {
        let light = DirectionalLight::default();
        for projection in [LightProjection::Orthographic, LightProjection::Perspective] {
            let params = PcssParams { projection, ..PcssParams::default() };
            let p = light.view_proj(&params).project_point3(light.target);
            assert!(p.x.abs() < 1e-4 && p.y.abs() < 1e-4, "{:?}", projection);
            assert!(p.z > 0.0 && p.z < 1.0);
            // light travels LIGHT_DISTANCE to reach the target
            let linear = linearize_depth(p.z, params.near, params.far, projection);
            assert!((linear - LIGHT_DISTANCE).abs() < 0.05, "{:?}: {}", projection, linear);
        }
    }

    #[test]
    fn elevation_adjusts_within_limits() {
        let mut light = DirectionalLight::default();
        let azimuth = |l: &DirectionalLight| l.to_light().z.atan2(l.to_light().x);
        let before = azimuth(&light);
        light.adjust_elevation(-10.0);
        assert!((azimuth(&light) - before).abs() < 1e-4);
        light.adjust_elevation(-500.0);
        assert!((light.elevation() - MIN_ELEVATION).abs() < 1e-3);
        light.adjust_elevation(500.0);
        assert!((light.elevation() - MAX_ELEVATION).abs() < 1e-3);
        assert!(light.view().is_finite());
    }

    #[test]
    fn vertical_light_has_valid_view() {
        let light = DirectionalLight::new(Vec3::NEG_Y, Vec3::ZERO, Vec3::ONE);
        assert!(light.view().is_finite());
    }
}
