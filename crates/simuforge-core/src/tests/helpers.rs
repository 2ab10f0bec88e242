//! Shared test setup: experiment factories and frame hashing.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use glam::Vec3;

use crate::metrics::MetricFrame;
use crate::report::SimulationReport;
use crate::runner;
use crate::spec::{
    CriterionBounds, DurationSpec, ExperimentBody, ExperimentSpec, Metadata, MetricsSpec,
    PhysicsSettings, ScenarioName, ScenarioParams, ScenarioSpec, API_VERSION, KIND,
};

/// Builds a complete experiment document for the given scenario.
///
/// Timestep 1/60, standard gravity, no criteria.
pub fn experiment(
    name: &str,
    scenario: ScenarioName,
    params: ScenarioParams,
    steps: u32,
) -> ExperimentSpec {
    ExperimentSpec {
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        metadata: Metadata {
            name: name.to_string(),
            description: None,
        },
        spec: ExperimentBody {
            physics: PhysicsSettings {
                timestep: 1.0 / 60.0,
                gravity: Vec3::new(0.0, -9.81, 0.0),
                solver_iterations: 4,
                enhanced_determinism: true,
                seed: 0,
            },
            duration: DurationSpec::Fixed { steps },
            scenario: ScenarioSpec::Builtin {
                name: scenario,
                params,
            },
            metrics: MetricsSpec::default(),
            criteria: BTreeMap::new(),
        },
    }
}

/// Adds a criterion to an experiment (builder style).
pub fn with_criterion(
    mut spec: ExperimentSpec,
    tag: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> ExperimentSpec {
    spec.spec
        .criteria
        .insert(tag.to_string(), CriterionBounds { min, max });
    spec
}

/// Runs an experiment on the production backend, returning all frames and
/// the final report.
pub fn collect_frames(spec: &ExperimentSpec) -> (Vec<MetricFrame>, SimulationReport) {
    let mut frames = Vec::new();
    let report = runner::run_with_observer(spec, None, |frame| frames.push(frame.clone()))
        .expect("run should not error");
    (frames, report)
}

/// Deterministic hash over a frame sequence.
///
/// Floats are hashed by bit pattern, so two sequences hash equal iff they
/// are bit-identical.
pub fn hash_frames(frames: &[MetricFrame]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for frame in frames {
        frame.step.hash(&mut hasher);
        frame.time.to_bits().hash(&mut hasher);

        frame.energy.kinetic.to_bits().hash(&mut hasher);
        frame.energy.potential.to_bits().hash(&mut hasher);
        frame.energy.total.to_bits().hash(&mut hasher);

        hash_dvec(frame.momentum.linear.to_array(), &mut hasher);
        hash_dvec(frame.momentum.angular.to_array(), &mut hasher);
        frame.momentum.linear_magnitude.to_bits().hash(&mut hasher);
        frame.momentum.angular_magnitude.to_bits().hash(&mut hasher);

        frame.contacts.contact_count.hash(&mut hasher);
        frame.contacts.max_penetration.to_bits().hash(&mut hasher);
        frame.contacts.total_penetration.to_bits().hash(&mut hasher);
        frame.contacts.constraint_violations.hash(&mut hasher);

        for body in &frame.bodies {
            body.id.index().hash(&mut hasher);
            body.name.hash(&mut hasher);
            hash_vec(body.transform.position.to_array(), &mut hasher);
            hash_quat(body.transform.rotation.to_array(), &mut hasher);
            hash_vec(body.linear_velocity.to_array(), &mut hasher);
            hash_vec(body.angular_velocity.to_array(), &mut hasher);
            body.sleeping.hash(&mut hasher);
        }
    }
    hasher.finish()
}

fn hash_vec<H: Hasher>(components: [f32; 3], hasher: &mut H) {
    for c in components {
        c.to_bits().hash(hasher);
    }
}

fn hash_quat<H: Hasher>(components: [f32; 4], hasher: &mut H) {
    for c in components {
        c.to_bits().hash(hasher);
    }
}

fn hash_dvec<H: Hasher>(components: [f64; 3], hasher: &mut H) {
    for c in components {
        c.to_bits().hash(hasher);
    }
}
