//! Fly camera: position plus yaw/pitch in degrees, moved along its own forward and right axes.

use glam::{Mat4, Vec2, Vec3};

/// Mouse look, degrees per pixel.
pub const LOOK_SENSITIVITY: f32 = 0.05;

const PITCH_LIMIT: f32 = 89.0;

#[derive(Clone, Debug)]
pub struct FlyCamera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    fov_y: f32,
    near: f32,
    far: f32,
    aspect: f32,
}

impl FlyCamera {
    pub const FOV_Y_DEGREES: f32 = 60.0;
    pub const NEAR: f32 = 1.0;
    pub const FAR: f32 = 1000.0;

    /// Camera at `position` looking along `forward`.
    pub fn new(position: Vec3, forward: Vec3, aspect: f32) -> Self {
        let f = forward.normalize_or(Vec3::NEG_Z);
        Self {
            position,
            yaw: f.z.atan2(f.x).to_degrees(),
            pitch: f.y.clamp(-1.0, 1.0).asin().to_degrees().clamp(-PITCH_LIMIT, PITCH_LIMIT),
            fov_y: Self::FOV_Y_DEGREES,
            near: Self::NEAR,
            far: Self::FAR,
            aspect: sanitize_aspect(aspect),
        }
    }

    /// Default demo viewpoint: above the ground, looking down -X at the casters.
    pub fn demo(aspect: f32) -> Self {
        Self::new(Vec3::new(50.0, 20.0, 0.0), Vec3::NEG_X, aspect)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn forward(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(pitch.cos() * yaw.cos(), pitch.sin(), pitch.cos() * yaw.sin())
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize_or(Vec3::X)
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = sanitize_aspect(width as f32 / height.max(1) as f32);
    }

    /// Moves `forward_delta` along the view direction and `right_delta` sideways, then
    /// applies a mouse-look delta in pixels (x turns right, y looks down).
    pub fn update(&mut self, forward_delta: f32, right_delta: f32, look: Option<Vec2>) {
        self.position += self.forward() * forward_delta + self.right() * right_delta;
        if let Some(delta) = look {
            self.yaw = (self.yaw + delta.x * LOOK_SENSITIVITY).rem_euclid(360.0);
            self.pitch = (self.pitch - delta.y * LOOK_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

fn sanitize_aspect(aspect: f32) -> f32 {
    if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_camera_looks_down_negative_x() {
        let cam = FlyCamera::demo(16.0 / 9.0);
        assert!((cam.forward() - Vec3::NEG_X).length() < 1e-5);
        assert!((cam.right() - Vec3::NEG_Z).length() < 1e-5);
        let origin = cam.view_proj().project_point3(Vec3::new(0.0, 20.0, 0.0));
        assert!(origin.x.abs() < 1e-4 && origin.y.abs() < 1e-4);
        assert!(origin.z > 0.0 && origin.z < 1.0);
    }

    #[test]
    fn movement_follows_view_axes() {
        let mut cam = FlyCamera::demo(1.0);
        cam.update(10.0, 0.0, None);
        assert!((cam.position() - Vec3::new(40.0, 20.0, 0.0)).length() < 1e-4);
        cam.update(0.0, 5.0, None);
        assert!((cam.position() - Vec3::new(40.0, 20.0, -5.0)).length() < 1e-4);
    }

    #[test]
    fn mouse_look_turns_and_clamps_pitch() {
        let mut cam = FlyCamera::demo(1.0);
        cam.update(0.0, 0.0, Some(Vec2::new(1800.0, 0.0)));
        assert!((cam.forward() - Vec3::NEG_Z).length() < 1e-4);
        cam.update(0.0, 0.0, Some(Vec2::new(0.0, -1e6)));
        assert!(cam.forward().y > 0.99);
        assert!(cam.view().is_finite());
    }

    #[test]
    fn degenerate_aspect_falls_back() {
        let mut cam = FlyCamera::demo(0.0);
        cam.set_aspect(800, 0);
        assert!(cam.projection().is_finite());
    }
}
