//! Analytic gravity-only solver backend.
//!
//! Integrates dynamic bodies under uniform gravity with semi-implicit Euler
//! and performs no collision handling at all: no contacts, no joints
//! resolved, nothing ever sleeps. One step is
//!
//! ```text
//! v ← v + g·dt
//! x ← x + v·dt
//! ```
//!
//! which makes trajectories easy to check against closed-form motion in
//! harness tests. Static bodies never move.

use glam::Vec3;

use crate::error::{HarnessError, Result};
use crate::scenario::{BodyDescriptor, BodyId, BodyKind, JointDescriptor};
use crate::solver::{BodyState, ManifoldSnapshot, PhysicsSolver, SolverSettings};

/// Gravity-only analytic backend for harness tests.
#[derive(Debug, Default)]
pub struct BallisticSolver {
    kinds: Vec<BodyKind>,
    states: Vec<BodyState>,
}

impl BallisticSolver {
    /// Creates an empty backend; the settings carry nothing it needs.
    #[must_use]
    pub fn new(_settings: &SolverSettings) -> Self {
        Self::default()
    }
}

impl PhysicsSolver for BallisticSolver {
    fn insert_body(&mut self, descriptor: &BodyDescriptor) -> Result<()> {
        if descriptor.id.index() as usize != self.states.len() {
            return Err(HarnessError::solver(format!(
                "body {} inserted out of order",
                descriptor.id
            )));
        }
        self.kinds.push(descriptor.kind);
        self.states.push(BodyState {
            transform: descriptor.initial_transform,
            linear_velocity: descriptor.initial_linear_velocity,
            angular_velocity: descriptor.initial_angular_velocity,
            sleeping: false,
        });
        Ok(())
    }

    fn insert_joint(&mut self, _descriptor: &JointDescriptor) -> Result<()> {
        // Joints are accepted and ignored; ballistic motion has no
        // constraint solver to feed them into.
        Ok(())
    }

    fn step(&mut self, dt: f32, gravity: Vec3) -> Result<()> {
        for (state, kind) in self.states.iter_mut().zip(&self.kinds) {
            if *kind == BodyKind::Static {
                continue;
            }
            state.linear_velocity += gravity * dt;
            state.transform.position += state.linear_velocity * dt;
        }
        Ok(())
    }

    fn body_state(&self, id: BodyId) -> Option<BodyState> {
        self.states.get(id.index() as usize).copied()
    }

    fn contact_manifolds(&self) -> Vec<ManifoldSnapshot> {
        Vec::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
