//! Per-step metric frames.
//!
//! A [`MetricFrame`] is an owned snapshot of the post-step world state: the
//! metric world materialises copies of everything it reads from the solver,
//! so frames can be buffered for the whole run without aliasing solver
//! memory. Frames are never mutated after emission.
//!
//! Scalar channels accumulate in `f64`, always iterating bodies in id order;
//! that ordering is what makes the sums bit-stable across runs.

use glam::{DVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::Transform;
use crate::scenario::BodyId;

/// Penetration depth (metres) above which a contact manifold counts as a
/// constraint violation.
pub const PEN_WARN: f64 = 1e-3;

/// Energy decomposition of one frame.
///
/// `total` is computed as `kinetic + potential`; the decomposition is
/// reported, not enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyBreakdown {
    /// Σ over dynamic bodies of translational + rotational kinetic energy (J).
    pub kinetic: f64,
    /// Σ `m·|g|·y` over dynamic bodies, measured from the `y = 0` plane (J).
    pub potential: f64,
    /// `kinetic + potential` (J).
    pub total: f64,
}

/// Momentum sums of one frame, over dynamic bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentumSummary {
    /// Σ `m·v` (kg·m/s).
    pub linear: DVec3,
    /// Σ `I·ω` in the scalar-inertia approximation (kg·m²/s).
    pub angular: DVec3,
    /// `|linear|`.
    pub linear_magnitude: f64,
    /// `|angular|`.
    pub angular_magnitude: f64,
}

/// Contact channel of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactSummary {
    /// Active contact points this step.
    pub contact_count: u32,
    /// Deepest penetration across all contact points (metres).
    pub max_penetration: f64,
    /// Sum of penetration depths across all contact points (metres).
    pub total_penetration: f64,
    /// Manifolds whose deepest point exceeds [`PEN_WARN`].
    pub constraint_violations: u32,
}

/// Per-body snapshot inside a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyFrame {
    /// Body id (dense, scenario emission order).
    pub id: BodyId,
    /// Presentation tag copied from the descriptor.
    pub name: String,
    /// Post-step pose.
    pub transform: Transform,
    /// Post-step linear velocity (m/s).
    pub linear_velocity: Vec3,
    /// Post-step angular velocity (rad/s).
    pub angular_velocity: Vec3,
    /// Whether the solver put the body to sleep.
    pub sleeping: bool,
}

/// One immutable metric snapshot per solver step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFrame {
    /// 0-based index of the step that produced this frame.
    pub step: u32,
    /// `step × timestep` (seconds).
    pub time: f64,
    /// Energy channel.
    pub energy: EnergyBreakdown,
    /// Momentum channel.
    pub momentum: MomentumSummary,
    /// Contact channel.
    pub contacts: ContactSummary,
    /// Per-body channel; empty when the `bodies` tag is not requested.
    pub bodies: Vec<BodyFrame>,
}

// =============================================================================
// Tests
// =============================================================================
