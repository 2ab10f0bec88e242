//! Solver abstraction.
//!
//! The harness never talks to a concrete rigid-body library directly; it
//! drives a [`PhysicsSolver`] trait object covering exactly the capability
//! set the metric world needs: body/collider insertion in descriptor order,
//! one fixed-step advance, per-body readout, and iteration over active
//! contact manifolds. Everything a backend returns is an owned copy, so
//! frames built from the readouts never alias solver memory.
//!
//! Two backends ship with the crate:
//!
//! - [`rapier::RapierSolver`] — the production backend.
//! - [`ballistic::BallisticSolver`] — analytic gravity-only motion with no
//!   collision handling, used to test the harness against closed-form
//!   trajectories.

pub mod ballistic;
pub mod rapier;

use glam::Vec3;

use crate::error::Result;
use crate::math::Transform;
use crate::scenario::{BodyDescriptor, BodyId, JointDescriptor};

/// Backend configuration derived from the experiment's physics settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Fixed timestep (seconds).
    pub timestep: f32,
    /// Constraint-solver iteration count.
    pub solver_iterations: u32,
    /// Cross-platform bit-stability requested by the experiment.
    ///
    /// Backends must already be deterministic run-to-run; this flag records
    /// the stronger cross-platform request and can never loosen determinism.
    pub enhanced_determinism: bool,
}

/// Owned post-step state of one body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    /// World pose.
    pub transform: Transform,
    /// Linear velocity (m/s).
    pub linear_velocity: Vec3,
    /// Angular velocity (rad/s).
    pub angular_velocity: Vec3,
    /// Whether the solver put the body to sleep.
    pub sleeping: bool,
}

/// Owned snapshot of one active contact manifold.
///
/// Penetration depths are positive overlap in metres; separated contact
/// points are omitted. Backends return snapshots sorted by `(body_a,
/// body_b)` so downstream reductions never depend on internal iteration
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifoldSnapshot {
    /// Lower-id body of the pair.
    pub body_a: BodyId,
    /// Higher-id body of the pair.
    pub body_b: BodyId,
    /// Penetration depth per active contact point.
    pub penetrations: Vec<f64>,
}

impl ManifoldSnapshot {
    /// Deepest penetration in this manifold, or 0 when empty.
    #[must_use]
    pub fn max_penetration(&self) -> f64 {
        self.penetrations.iter().copied().fold(0.0, f64::max)
    }
}

/// The opaque rigid-body solver consumed by the metric world.
///
/// Implementations must be deterministic: identical insertion sequences and
/// step calls produce bit-identical readouts, run after run.
pub trait PhysicsSolver {
    /// Inserts a body and its collider. Called in descriptor-id order.
    ///
    /// # Errors
    ///
    /// [`crate::error::HarnessError::SolverError`] when the backend rejects
    /// the descriptor.
    fn insert_body(&mut self, descriptor: &BodyDescriptor) -> Result<()>;

    /// Inserts a joint between two previously inserted bodies.
    ///
    /// # Errors
    ///
    /// [`crate::error::HarnessError::SolverError`] when either body is
    /// unknown to the backend.
    fn insert_joint(&mut self, descriptor: &JointDescriptor) -> Result<()>;

    /// Advances the world by exactly `dt` seconds under `gravity`.
    ///
    /// # Errors
    ///
    /// [`crate::error::HarnessError::SolverError`] when the step fails.
    fn step(&mut self, dt: f32, gravity: Vec3) -> Result<()>;

    /// Reads the current state of a body, or `None` for unknown ids.
    fn body_state(&self, id: BodyId) -> Option<BodyState>;

    /// Owned snapshots of all active contact manifolds, sorted by body pair.
    fn contact_manifolds(&self) -> Vec<ManifoldSnapshot>;
}

/// Factory used by the metric world to build (and on reset, rebuild) its
/// backend.
pub type SolverFactory = Box<dyn Fn(&SolverSettings) -> Box<dyn PhysicsSolver>>;

/// Factory producing the production rapier backend.
#[must_use]
pub fn default_factory() -> SolverFactory {
    Box::new(|settings| Box::new(rapier::RapierSolver::new(settings)))
}

// =============================================================================
// Tests
// =============================================================================
