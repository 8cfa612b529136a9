//! Transform component and utilities for spatial positioning.

use glam::{Mat4, Quat, Vec3};

/// A 3D transform representing position, rotation, and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform at the given position.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a new transform with position and rotation.
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Transform for a structure placed with a build facing (0..=3, quarter turns around Y).
    pub fn from_position_facing(position: Vec3, facing: u8) -> Self {
        Self::from_position_rotation(position, facing_rotation(facing))
    }

    /// Create the model matrix for this transform.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Same transform moved to another position (used for interpolated draw positions).
    pub fn at(&self, position: Vec3) -> Self {
        Self { position, ..*self }
    }

    /// Translate the transform by a delta.
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }
}

/// Rotation for a build facing; facings wrap every four quarter turns.
pub fn facing_rotation(facing: u8) -> Quat {
    Quat::from_rotation_y(f32::from(facing % 4) * std::f32::consts::FRAC_PI_2)
}
