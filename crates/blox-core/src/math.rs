//! Rigid transform helpers

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position and orientation of a body, block or connection point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Create a pose from position and rotation
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Create a pose at a position with identity rotation
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Transform a local point into this pose's parent space
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.position
    }

    /// Transform a world point into this pose's local space
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.position)
    }

    /// Rotate a local direction into parent space
    pub fn transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation * direction
    }

    /// Rotate a world direction into local space
    pub fn inverse_transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation.inverse() * direction
    }

    /// Compose two poses: `self` applied after `other` (self is the parent)
    pub fn mul(&self, other: &Pose) -> Pose {
        Pose {
            position: self.transform_point(other.position),
            rotation: self.rotation * other.rotation,
        }
    }

    /// Inverse transform
    pub fn inverse(&self) -> Pose {
        let inv_rotation = self.rotation.inverse();
        Pose {
            position: inv_rotation * -self.position,
            rotation: inv_rotation,
        }
    }

    /// The +Z axis of this pose (connection points face along +Z)
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

/// Stable axis perpendicular to `direction`, used as the secondary axis of
/// slider joints. Falls back to crossing with +X when the direction is close
/// to vertical.
pub fn perpendicular_axis(direction: Vec3) -> Vec3 {
    let helper = if direction.dot(Vec3::Y).abs() > 0.8 {
        Vec3::X
    } else {
        Vec3::Y
    };
    direction.cross(helper).normalize()
}
