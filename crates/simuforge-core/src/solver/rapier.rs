//! Production solver backend over rapier3d.
//!
//! The backend owns the full rapier pipeline (body/collider/joint sets,
//! broad/narrow phase, island manager, CCD) and maps dense [`BodyId`]s to
//! rapier handles in insertion order. Stepping is single-threaded; combined
//! with the crate's `enhanced-determinism` feature this keeps frame
//! sequences bit-identical run to run and across platforms.
//!
//! Restitution uses the `Max` combine rule on every collider so a bouncing
//! body's own restitution governs its impacts against the restitution-0
//! ground.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use glam::{Quat, Vec3};
use rapier3d::na;
use rapier3d::prelude::*;
use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::math::Transform;
use crate::scenario::{BodyDescriptor, BodyId, BodyKind, JointDescriptor, JointKind, Shape};
use crate::solver::{BodyState, ManifoldSnapshot, PhysicsSolver, SolverSettings};

bitflags::bitflags! {
    /// Collision layer assignment for scenario colliders.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Layers: u32 {
        /// Everything the builtin scenarios emit.
        const DEFAULT = 0b0000_0001;
    }
}

/// Rapier-backed implementation of [`PhysicsSolver`].
pub struct RapierSolver {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    pipeline: PhysicsPipeline,
    integration: IntegrationParameters,
    island_mgr: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    query_pipeline: QueryPipeline,
    ccd: CCDSolver,
    /// Rapier handle per dense body id, in insertion order.
    handles: Vec<RigidBodyHandle>,
    /// Reverse map used when resolving contact pairs.
    ids: HashMap<RigidBodyHandle, BodyId>,
}

impl RapierSolver {
    /// Creates an empty world configured from the experiment settings.
    #[must_use]
    pub fn new(settings: &SolverSettings) -> Self {
        let mut integration = IntegrationParameters {
            dt: settings.timestep,
            ..IntegrationParameters::default()
        };
        if let Some(iterations) = NonZeroUsize::new(settings.solver_iterations as usize) {
            integration.num_solver_iterations = iterations;
        }
        debug!(
            timestep = settings.timestep,
            solver_iterations = settings.solver_iterations,
            enhanced_determinism = settings.enhanced_determinism,
            "rapier world configured"
        );

        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            pipeline: PhysicsPipeline::new(),
            integration,
            island_mgr: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            query_pipeline: QueryPipeline::new(),
            ccd: CCDSolver::new(),
            handles: Vec::new(),
            ids: HashMap::new(),
        }
    }

    fn handle_of(&self, id: BodyId) -> Option<RigidBodyHandle> {
        self.handles.get(id.index() as usize).copied()
    }
}

fn isometry_of(transform: &Transform) -> na::Isometry3<Real> {
    let p = transform.position;
    let q = transform.rotation;
    na::Isometry3::from_parts(
        na::Translation3::new(p.x, p.y, p.z),
        na::UnitQuaternion::from_quaternion(na::Quaternion::new(q.w, q.x, q.y, q.z)),
    )
}

fn collider_for(descriptor: &BodyDescriptor) -> ColliderBuilder {
    let builder = match descriptor.shape {
        Shape::Box { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }
        Shape::Sphere { radius } => ColliderBuilder::ball(radius),
        Shape::Capsule {
            radius,
            half_height,
        } => ColliderBuilder::capsule_y(half_height, radius),
        Shape::Cylinder {
            radius,
            half_height,
        } => ColliderBuilder::cylinder(half_height, radius),
    };
    builder
        .friction(descriptor.friction)
        .restitution(descriptor.restitution)
        .restitution_combine_rule(CoefficientCombineRule::Max)
        .collision_groups(InteractionGroups::new(
            Group::from_bits_truncate(Layers::DEFAULT.bits()),
            Group::ALL,
        ))
}

impl PhysicsSolver for RapierSolver {
    fn insert_body(&mut self, descriptor: &BodyDescriptor) -> Result<()> {
        if descriptor.id.index() as usize != self.handles.len() {
            return Err(HarnessError::solver(format!(
                "body {} inserted out of order",
                descriptor.id
            )));
        }

        let builder = match descriptor.kind {
            BodyKind::Dynamic => RigidBodyBuilder::dynamic()
                .linvel(vector![
                    descriptor.initial_linear_velocity.x,
                    descriptor.initial_linear_velocity.y,
                    descriptor.initial_linear_velocity.z
                ])
                .angvel(vector![
                    descriptor.initial_angular_velocity.x,
                    descriptor.initial_angular_velocity.y,
                    descriptor.initial_angular_velocity.z
                ]),
            BodyKind::Static => RigidBodyBuilder::fixed(),
        };
        let body = builder
            .position(isometry_of(&descriptor.initial_transform))
            .build();
        let handle = self.bodies.insert(body);

        let mut collider = collider_for(descriptor);
        if descriptor.is_dynamic() {
            collider = collider.mass(descriptor.mass);
        }
        self.colliders
            .insert_with_parent(collider.build(), handle, &mut self.bodies);

        self.handles.push(handle);
        self.ids.insert(handle, descriptor.id);
        Ok(())
    }

    fn insert_joint(&mut self, descriptor: &JointDescriptor) -> Result<()> {
        let a = self.handle_of(descriptor.body_a).ok_or_else(|| {
            HarnessError::solver(format!("joint references unknown body {}", descriptor.body_a))
        })?;
        let b = self.handle_of(descriptor.body_b).ok_or_else(|| {
            HarnessError::solver(format!("joint references unknown body {}", descriptor.body_b))
        })?;

        match descriptor.kind {
            JointKind::Fixed => {
                self.joints.insert(a, b, FixedJointBuilder::new(), true);
            }
            JointKind::Revolute { axis } => {
                let axis = na::Unit::new_normalize(vector![axis.x, axis.y, axis.z]);
                self.joints.insert(a, b, RevoluteJointBuilder::new(axis), true);
            }
        }
        Ok(())
    }

    fn step(&mut self, dt: f32, gravity: Vec3) -> Result<()> {
        self.integration.dt = dt;
        let gravity = vector![gravity.x, gravity.y, gravity.z];
        self.pipeline.step(
            &gravity,
            &self.integration,
            &mut self.island_mgr,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        Ok(())
    }

    fn body_state(&self, id: BodyId) -> Option<BodyState> {
        let handle = self.handle_of(id)?;
        let rb = self.bodies.get(handle)?;
        let iso = rb.position();
        let rot = iso.rotation.coords;
        let linvel = rb.linvel();
        let angvel = rb.angvel();
        Some(BodyState {
            transform: Transform::new(
                Vec3::new(
                    iso.translation.x,
                    iso.translation.y,
                    iso.translation.z,
                ),
                Quat::from_xyzw(rot.x, rot.y, rot.z, rot.w),
            ),
            linear_velocity: Vec3::new(linvel.x, linvel.y, linvel.z),
            angular_velocity: Vec3::new(angvel.x, angvel.y, angvel.z),
            sleeping: rb.is_sleeping(),
        })
    }

    fn contact_manifolds(&self) -> Vec<ManifoldSnapshot> {
        let mut snapshots = Vec::new();
        for pair in self.narrow_phase.contact_pairs() {
            if !pair.has_any_active_contact {
                continue;
            }
            let Some(id_a) = self.body_of_collider(pair.collider1) else {
                continue;
            };
            let Some(id_b) = self.body_of_collider(pair.collider2) else {
                continue;
            };
            let (body_a, body_b) = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };

            for manifold in &pair.manifolds {
                let penetrations: Vec<f64> = manifold
                    .points
                    .iter()
                    .filter(|point| point.dist < 0.0)
                    .map(|point| f64::from(-point.dist))
                    .collect();
                if !penetrations.is_empty() {
                    snapshots.push(ManifoldSnapshot {
                        body_a,
                        body_b,
                        penetrations,
                    });
                }
            }
        }
        snapshots.sort_by_key(|m| (m.body_a, m.body_b));
        snapshots
    }
}

impl RapierSolver {
    fn body_of_collider(&self, collider: ColliderHandle) -> Option<BodyId> {
        let parent = self.colliders.get(collider)?.parent()?;
        self.ids.get(&parent).copied()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SolverSettings {
        SolverSettings {
            timestep: 1.0 / 60.0,
            solver_iterations: 4,
            enhanced_determinism: true,
        }
    }

    fn dynamic_box(id: u32, position: Vec3) -> BodyDescriptor {
        BodyDescriptor {
            id: BodyId::new(id),
            name: format!("box_{id}"),
            kind: BodyKind::Dynamic,
            shape: Shape::Box {
                half_extents: Vec3::splat(0.5),
            },
            initial_transform: Transform::from_position(position),
            initial_linear_velocity: Vec3::ZERO,
            initial_angular_velocity: Vec3::ZERO,
            mass: 1.0,
            friction: 0.5,
            restitution: 0.0,
        }
    }

    fn ground(id: u32) -> BodyDescriptor {
        BodyDescriptor {
            id: BodyId::new(id),
            name: "ground".to_string(),
            kind: BodyKind::Static,
            shape: Shape::Box {
                half_extents: Vec3::new(50.0, 0.5, 50.0),
            },
            initial_transform: Transform::from_position(Vec3::new(0.0, -0.5, 0.0)),
            initial_linear_velocity: Vec3::ZERO,
            initial_angular_velocity: Vec3::ZERO,
            mass: f32::INFINITY,
            friction: 0.5,
            restitution: 0.0,
        }
    }

    #[test]
    fn out_of_order_insertion_is_rejected() {
        let mut solver = RapierSolver::new(&settings());
        let err = solver.insert_body(&dynamic_box(3, Vec3::Y)).unwrap_err();
        assert!(matches!(err, HarnessError::SolverError { .. }));
    }

    #[test]
    fn body_state_reflects_initial_conditions() {
        let mut solver = RapierSolver::new(&settings());
        let mut desc = dynamic_box(0, Vec3::new(1.0, 2.0, 3.0));
        desc.initial_linear_velocity = Vec3::new(0.5, 0.0, 0.0);
        solver.insert_body(&desc).unwrap();

        let state = solver.body_state(BodyId::new(0)).unwrap();
        assert!((state.transform.position - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
        assert!((state.linear_velocity - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
        assert!(!state.sleeping);
        assert!(solver.body_state(BodyId::new(9)).is_none());
    }

    #[test]
    fn gravity_accelerates_free_fall() {
        let mut solver = RapierSolver::new(&settings());
        solver.insert_body(&dynamic_box(0, Vec3::new(0.0, 100.0, 0.0))).unwrap();

        let gravity = Vec3::new(0.0, -9.81, 0.0);
        for _ in 0..60 {
            solver.step(1.0 / 60.0, gravity).unwrap();
        }
        let state = solver.body_state(BodyId::new(0)).unwrap();
        // After one second of free fall: v ≈ -9.81 m/s, y drop ≈ 4.9 m.
        assert!(state.linear_velocity.y < -9.0);
        assert!(state.transform.position.y < 96.0);
        assert!(state.transform.position.y > 94.0);
    }

    #[test]
    fn resting_box_produces_contacts() {
        let mut solver = RapierSolver::new(&settings());
        solver.insert_body(&ground(0)).unwrap();
        solver
            .insert_body(&dynamic_box(1, Vec3::new(0.0, 0.501, 0.0)))
            .unwrap();

        let gravity = Vec3::new(0.0, -9.81, 0.0);
        for _ in 0..30 {
            solver.step(1.0 / 60.0, gravity).unwrap();
        }
        let manifolds = solver.contact_manifolds();
        assert!(!manifolds.is_empty(), "box on ground should touch");
        let m = &manifolds[0];
        assert_eq!((m.body_a, m.body_b), (BodyId::new(0), BodyId::new(1)));
        assert!(m.max_penetration() < 0.01, "penetration should stay small");
    }

    #[test]
    fn two_worlds_step_bit_identically() {
        let build = || {
            let mut solver = RapierSolver::new(&settings());
            solver.insert_body(&ground(0)).unwrap();
            for i in 0..5 {
                solver
                    .insert_body(&dynamic_box(
                        i + 1,
                        Vec3::new(0.0, 0.501 + 1.001 * i as f32, 0.0),
                    ))
                    .unwrap();
            }
            solver
        };

        let mut a = build();
        let mut b = build();
        let gravity = Vec3::new(0.0, -9.81, 0.0);
        for _ in 0..120 {
            a.step(1.0 / 60.0, gravity).unwrap();
            b.step(1.0 / 60.0, gravity).unwrap();
        }
        for i in 0..6 {
            let sa = a.body_state(BodyId::new(i)).unwrap();
            let sb = b.body_state(BodyId::new(i)).unwrap();
            assert_eq!(sa, sb, "body {i} diverged");
        }
    }
}
