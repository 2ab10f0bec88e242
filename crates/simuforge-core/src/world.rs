//! Metric-collecting world around the solver.
//!
//! [`MetricWorld`] owns a solver backend, drives it with the experiment's
//! fixed timestep, and extracts one owned [`MetricFrame`] per step from the
//! post-step state. It is strictly single-threaded and sequential; nothing
//! it hands out aliases solver memory, and dropping it releases the backend
//! on every exit path.
//!
//! # Determinism
//!
//! Two worlds constructed from equal specs produce bit-identical frame
//! sequences. The ingredients:
//!
//! - fixed timestep only,
//! - bodies inserted in descriptor-id order,
//! - every metric reduction iterates bodies in id order (never over an
//!   unordered container),
//! - a deterministic backend behind the [`PhysicsSolver`] contract.

use glam::DVec3;
use tracing::debug;

use crate::error::{HarnessError, Result};
use crate::metrics::{
    BodyFrame, ContactSummary, EnergyBreakdown, MetricFrame, MomentumSummary, PEN_WARN,
};
use crate::scenario::{build_scenario, BodyDescriptor, ScenarioSetup};
use crate::solver::{default_factory, PhysicsSolver, SolverFactory, SolverSettings};
use crate::spec::ExperimentSpec;

/// Fixed-step simulation wrapper that emits a metric frame per step.
pub struct MetricWorld {
    spec: ExperimentSpec,
    settings: SolverSettings,
    setup: ScenarioSetup,
    solver: Box<dyn PhysicsSolver>,
    factory: SolverFactory,
    step: u32,
    last_frame: Option<MetricFrame>,
}

impl MetricWorld {
    /// Builds a world from a spec using the production rapier backend.
    ///
    /// Validates the spec, materialises the scenario, constructs the backend
    /// and inserts bodies then joints in id order. The world starts at step
    /// 0 and emits no frame until [`MetricWorld::step`] is called.
    ///
    /// # Errors
    ///
    /// [`HarnessError::SpecInvalid`] on validation failure,
    /// [`HarnessError::SolverError`] if the backend rejects the scenario.
    pub fn new(spec: ExperimentSpec) -> Result<Self> {
        Self::with_factory(spec, default_factory())
    }

    /// Builds a world with a custom solver factory.
    ///
    /// The factory is retained so [`MetricWorld::reset`] can discard the
    /// backend and rebuild it through the same construction path.
    ///
    /// # Errors
    ///
    /// As [`MetricWorld::new`].
    pub fn with_factory(spec: ExperimentSpec, factory: SolverFactory) -> Result<Self> {
        spec.validate()?;
        let setup = build_scenario(&spec.spec.scenario, &spec.spec.physics)?;
        let settings = SolverSettings {
            timestep: spec.spec.physics.timestep,
            solver_iterations: spec.spec.physics.solver_iterations,
            enhanced_determinism: spec.spec.physics.enhanced_determinism,
        };
        let solver = populate(&factory, &settings, &setup)?;
        debug!(
            experiment = spec.name(),
            bodies = setup.bodies.len(),
            steps = spec.steps(),
            "metric world constructed"
        );
        Ok(Self {
            spec,
            settings,
            setup,
            solver,
            factory,
            step: 0,
            last_frame: None,
        })
    }

    /// Advances the solver by one timestep and returns the post-step frame.
    ///
    /// # Errors
    ///
    /// [`HarnessError::AlreadyComplete`] when the world already reached its
    /// target steps; [`HarnessError::SolverError`] when the backend fails.
    pub fn step(&mut self) -> Result<MetricFrame> {
        if self.is_complete() {
            return Err(HarnessError::AlreadyComplete);
        }
        self.solver
            .step(self.settings.timestep, self.spec.spec.physics.gravity)?;
        let frame = self.extract_frame(self.step)?;
        self.step += 1;
        self.last_frame = Some(frame.clone());
        Ok(frame)
    }

    /// Discards all solver state and re-runs construction with the same spec.
    ///
    /// # Errors
    ///
    /// [`HarnessError::SolverError`] if the backend rejects the scenario
    /// again (which a deterministic backend cannot do unless the first
    /// construction also failed).
    pub fn reset(&mut self) -> Result<()> {
        self.solver = populate(&self.factory, &self.settings, &self.setup)?;
        self.step = 0;
        self.last_frame = None;
        Ok(())
    }

    /// Steps completed so far.
    #[must_use]
    pub const fn current_step(&self) -> u32 {
        self.step
    }

    /// Total steps prescribed by the spec's duration.
    #[must_use]
    pub const fn target_steps(&self) -> u32 {
        self.spec.steps()
    }

    /// Whether the run has completed; stepping past this point errors.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.step == self.target_steps()
    }

    /// The most recently emitted frame, if any.
    #[must_use]
    pub fn last_frame(&self) -> Option<&MetricFrame> {
        self.last_frame.as_ref()
    }

    /// Body descriptors in id order.
    #[must_use]
    pub fn descriptors(&self) -> &[BodyDescriptor] {
        &self.setup.bodies
    }

    /// The spec this world was built from.
    #[must_use]
    pub const fn spec(&self) -> &ExperimentSpec {
        &self.spec
    }

    /// Extracts the metric frame for `step` from the current solver state.
    ///
    /// Pure readout: iterates bodies in id order, accumulating the scalar
    /// channels in f64, and materialises owned copies of everything.
    fn extract_frame(&self, step: u32) -> Result<MetricFrame> {
        let gravity_magnitude = f64::from(self.spec.spec.physics.gravity.length());
        let capture_bodies = self.spec.spec.metrics.captures_bodies();

        let mut kinetic = 0.0_f64;
        let mut potential = 0.0_f64;
        let mut linear = DVec3::ZERO;
        let mut angular = DVec3::ZERO;
        let mut bodies = Vec::with_capacity(if capture_bodies {
            self.setup.bodies.len()
        } else {
            0
        });

        for descriptor in &self.setup.bodies {
            let state = self.solver.body_state(descriptor.id).ok_or_else(|| {
                HarnessError::solver(format!("body {} missing from solver", descriptor.id))
            })?;

            if descriptor.is_dynamic() {
                let mass = f64::from(descriptor.mass);
                let v = state.linear_velocity.as_dvec3();
                let w = state.angular_velocity.as_dvec3();
                // Scalar inertia of the bounding sphere: ⅖·m·r².
                let inertia =
                    0.4 * mass * f64::from(descriptor.shape.bounding_radius()).powi(2);
                kinetic += 0.5 * mass * v.length_squared() + 0.5 * inertia * w.length_squared();
                potential +=
                    mass * gravity_magnitude * f64::from(state.transform.position.y);
                linear += mass * v;
                angular += inertia * w;
            }

            if capture_bodies {
                bodies.push(BodyFrame {
                    id: descriptor.id,
                    name: descriptor.name.clone(),
                    transform: state.transform,
                    linear_velocity: state.linear_velocity,
                    angular_velocity: state.angular_velocity,
                    sleeping: state.sleeping,
                });
            }
        }

        let mut contact_count = 0_u32;
        let mut max_penetration = 0.0_f64;
        let mut total_penetration = 0.0_f64;
        let mut constraint_violations = 0_u32;
        for manifold in self.solver.contact_manifolds() {
            #[allow(clippy::cast_possible_truncation)]
            {
                contact_count += manifold.penetrations.len() as u32;
            }
            for depth in &manifold.penetrations {
                max_penetration = max_penetration.max(*depth);
                total_penetration += depth;
            }
            if manifold.max_penetration() > PEN_WARN {
                constraint_violations += 1;
            }
        }

        Ok(MetricFrame {
            step,
            time: f64::from(step) * f64::from(self.settings.timestep),
            energy: EnergyBreakdown {
                kinetic,
                potential,
                total: kinetic + potential,
            },
            momentum: MomentumSummary {
                linear,
                angular,
                linear_magnitude: linear.length(),
                angular_magnitude: angular.length(),
            },
            contacts: ContactSummary {
                contact_count,
                max_penetration,
                total_penetration,
                constraint_violations,
            },
            bodies,
        })
    }
}

/// Builds a backend and feeds it the scenario in id order.
fn populate(
    factory: &SolverFactory,
    settings: &SolverSettings,
    setup: &ScenarioSetup,
) -> Result<Box<dyn PhysicsSolver>> {
    let mut solver = factory(settings);
    for body in &setup.bodies {
        solver.insert_body(body)?;
    }
    for joint in &setup.joints {
        solver.insert_joint(joint)?;
    }
    Ok(solver)
}

// =============================================================================
// Tests
// =============================================================================
