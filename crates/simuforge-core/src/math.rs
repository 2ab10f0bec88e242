//! Rigid transform value type.
//!
//! Vectors and quaternions come straight from [`glam`]; the only addition is
//! [`Transform`], the position + rotation pair every body readout and
//! descriptor carries. Quaternions use glam's `[x, y, z, w]` layout.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position and orientation of a body.
///
/// A plain value type; copying one never aliases solver state.
///
/// # Example
///
/// ```
/// use simuforge_core::math::Transform;
/// use glam::Vec3;
///
/// let t = Transform::from_position(Vec3::new(0.0, 2.0, 0.0));
/// assert_eq!(t.position.y, 2.0);
/// assert_eq!(t.rotation, glam::Quat::IDENTITY);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World-space position (metres).
    pub position: Vec3,
    /// World-space orientation (unit quaternion).
    pub rotation: Quat,
}

impl Transform {
    /// The identity transform (origin, no rotation).
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Creates a transform from a position with identity rotation.
    #[must_use]
    pub const fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Creates a transform from a position and rotation.
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Applies this transform to a local-space point.
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// =============================================================================
// Tests
// =============================================================================
