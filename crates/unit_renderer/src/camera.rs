//! Camera consumed by the drawer: frustum tests, projection to window
//! coordinates and the icon distance inputs.

use engine_core::Transform;
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::scene::Terrain;

/// Perspective RTS camera with configurable FOV and clipping planes.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera transform (position and rotation).
    pub transform: Transform,
    /// Field of view in degrees.
    pub fov_degrees: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Viewport size in pixels.
    viewport: Vec2,
    /// Compare icon distances against height above ground instead of eye distance.
    pub use_dist_to_ground_for_icons: bool,
    /// Current pitch (up/down rotation) in radians.
    pitch: f32,
    /// Current yaw (left/right rotation) in radians.
    yaw: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            fov_degrees: 45.0,
            near: 1.0,
            far: 20_000.0,
            viewport: Vec2::new(1920.0, 1080.0),
            use_dist_to_ground_for_icons: false,
            pitch: 0.0,
            yaw: 0.0,
        }
    }
}

impl Camera {
    /// Create a new camera at the given position.
    pub fn new(position: Vec3) -> Self {
        Self {
            transform: Transform::from_position(position),
            ..Default::default()
        }
    }

    /// Camera at `position` looking at `target`.
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let mut cam = Self::new(position);
        let dir = (target - position).normalize_or_zero();
        let yaw = (-dir.x).atan2(-dir.z);
        let pitch = dir.y.clamp(-1.0, 1.0).asin();
        cam.set_yaw_pitch(yaw, pitch);
        cam
    }

    /// Update viewport size (call on window resize).
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Vec2::new(width.max(1) as f32, height.max(1) as f32);
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn aspect(&self) -> f32 {
        self.viewport.x / self.viewport.y
    }

    /// Set yaw and pitch directly (in radians) and rebuild rotation.
    pub fn set_yaw_pitch(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        let max_pitch = std::f32::consts::FRAC_PI_2 - 0.01;
        self.pitch = pitch.clamp(-max_pitch, max_pitch);
        self.transform.rotation = Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch);
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Get camera position.
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// View direction (negative Z in camera space).
    pub fn forward(&self) -> Vec3 {
        self.transform.rotation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.transform.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.transform.rotation * Vec3::Y
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.transform.position;
        Mat4::look_at_rh(eye, eye + self.forward(), self.up())
    }

    /// Get the projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect(), self.near, self.far)
    }

    /// Get the combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Frustum planes (left, right, bottom, top, near, far), normals pointing inward.
    pub fn frustum_planes(&self) -> [Vec4; 6] {
        let m = self.view_projection_matrix();
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
        [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(|p| {
            let len = p.truncate().length();
            if len > 0.0 {
                p / len
            } else {
                p
            }
        })
    }

    /// Sphere-frustum test.
    pub fn in_view(&self, center: Vec3, radius: f32) -> bool {
        self.frustum_planes()
            .iter()
            .all(|p| p.truncate().dot(center) + p.w >= -radius)
    }

    /// Project to window pixels (origin bottom-left) plus NDC depth.
    /// `None` for points behind the camera.
    pub fn window_coordinates(&self, world: Vec3) -> Option<Vec3> {
        let clip = self.view_projection_matrix() * world.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec3::new(
            (ndc.x * 0.5 + 0.5) * self.viewport.x,
            (ndc.y * 0.5 + 0.5) * self.viewport.y,
            ndc.z,
        ))
    }

    /// Distance along the view ray to the terrain. A ray that misses the
    /// terrain falls back to the average-height plane, then to zero.
    pub fn ground_zoom_distance(&self, terrain: &dyn Terrain) -> f32 {
        let dir = self.forward();
        let origin = self.position();
        let step = (self.far / 512.0).max(1.0);
        let mut t = 0.0;
        while t < self.far {
            let p = origin + dir * t;
            if p.y <= terrain.height_at(p.x, p.z) {
                return t;
            }
            t += step;
        }
        if dir.y.abs() > f32::EPSILON {
            let t = (terrain.average_height() - origin.y) / dir.y;
            if t > 0.0 {
                return t;
            }
        }
        0.0
    }

    /// Squared distance used by world-space icon classification.
    pub fn icon_distance_sqr(&self, unit_pos: Vec3, avg_ground_height: f32) -> f32 {
        if self.use_dist_to_ground_for_icons {
            let h = self.position().y - avg_ground_height;
            h * h
        } else {
            unit_pos.distance_squared(self.position())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FlatTerrain;

    fn overhead() -> Camera {
        Camera::looking_at(Vec3::new(0.0, 1000.0, 1.0), Vec3::ZERO)
    }

    #[test]
    fn looking_at_faces_target() {
        let cam = Camera::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        assert!(cam.forward().abs_diff_eq(Vec3::NEG_Z, 1e-4));
    }

    #[test]
    fn frustum_contains_target_and_rejects_behind() {
        let cam = overhead();
        assert!(cam.in_view(Vec3::ZERO, 1.0));
        assert!(!cam.in_view(Vec3::new(0.0, 2000.0, 0.0), 10.0));
        // Large radius pulls an outside sphere back in.
        assert!(cam.in_view(Vec3::new(5000.0, 0.0, 0.0), 5000.0));
    }

    #[test]
    fn window_coordinates_center_and_behind() {
        let cam = Camera::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        let p = cam.window_coordinates(Vec3::ZERO).unwrap();
        assert!((p.x - 960.0).abs() < 0.5);
        assert!((p.y - 540.0).abs() < 0.5);
        assert!(cam.window_coordinates(Vec3::new(0.0, 0.0, 20.0)).is_none());
    }

    #[test]
    fn zoom_distance_hits_flat_ground() {
        let cam = Camera::looking_at(Vec3::new(0.0, 500.0, 0.001), Vec3::ZERO);
        let d = cam.ground_zoom_distance(&FlatTerrain(0.0));
        assert!((d - 500.0).abs() < 50.0, "got {d}");
    }

    #[test]
    fn icon_distance_can_use_height_above_ground() {
        let mut cam = overhead();
        let far_unit = Vec3::new(3000.0, 0.0, 0.0);
        assert!(cam.icon_distance_sqr(far_unit, 0.0) > 3000.0 * 3000.0);
        cam.use_dist_to_ground_for_icons = true;
        assert!((cam.icon_distance_sqr(far_unit, 0.0) - 1000.0 * 1000.0).abs() < 1.0);
    }
}
