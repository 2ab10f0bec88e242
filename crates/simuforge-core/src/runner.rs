//! Run orchestration.
//!
//! The runner ties the pipeline together: validate → resolve criteria →
//! check the baseline → build the world → step to completion → aggregate →
//! evaluate → compare → report.
//!
//! Error policy (see [`crate::error`]): spec, criterion and baseline
//! problems surface as `Err` before any step executes; solver failures
//! terminate the run and come back as an `Ok` report with `status = error`.
//! Criteria failures are ordinary `failed` reports.

use tracing::info;

use crate::baseline::{self, BaselineRecord};
use crate::criteria;
use crate::error::{HarnessError, Result};
use crate::metrics::MetricFrame;
use crate::report::SimulationReport;
use crate::solver::{default_factory, SolverFactory};
use crate::spec::ExperimentSpec;
use crate::world::MetricWorld;

/// Runs an experiment to completion with the production backend.
///
/// # Errors
///
/// [`HarnessError::SpecInvalid`], [`HarnessError::UnknownCriterion`] or
/// [`HarnessError::BaselineIncompatible`] before any simulation; solver
/// failures are reported via `status = error`, not `Err`.
pub fn run(
    spec: &ExperimentSpec,
    baseline: Option<&BaselineRecord>,
) -> Result<SimulationReport> {
    run_with_factory(spec, baseline, default_factory(), |_| {})
}

/// Runs an experiment, handing each frame to `observer` as it is emitted.
///
/// Streaming variant of [`run`] for interactive callers; same pipeline,
/// same error policy.
///
/// # Errors
///
/// As [`run`].
pub fn run_with_observer(
    spec: &ExperimentSpec,
    baseline: Option<&BaselineRecord>,
    observer: impl FnMut(&MetricFrame),
) -> Result<SimulationReport> {
    run_with_factory(spec, baseline, default_factory(), observer)
}

/// Runs an experiment against a caller-supplied solver factory.
///
/// # Errors
///
/// As [`run`].
pub fn run_with_factory(
    spec: &ExperimentSpec,
    baseline: Option<&BaselineRecord>,
    factory: SolverFactory,
    mut observer: impl FnMut(&MetricFrame),
) -> Result<SimulationReport> {
    spec.validate()?;
    let plan = criteria::plan(&spec.spec.criteria)?;
    if let Some(record) = baseline {
        record.check_compatible()?;
    }

    info!(
        experiment = spec.name(),
        scenario = %spec.spec.scenario.name(),
        steps = spec.steps(),
        "running experiment"
    );

    let mut world = match MetricWorld::with_factory(spec.clone(), factory) {
        Ok(world) => world,
        Err(HarnessError::SolverError { message }) => {
            return Ok(SimulationReport::from_error(message));
        }
        Err(other) => return Err(other),
    };

    let mut frames = Vec::with_capacity(spec.steps() as usize);
    while !world.is_complete() {
        match world.step() {
            Ok(frame) => {
                observer(&frame);
                frames.push(frame);
            }
            Err(HarnessError::SolverError { message }) => {
                info!(experiment = spec.name(), step = world.current_step(), "solver failed");
                return Ok(SimulationReport::from_error(message));
            }
            Err(other) => return Err(other),
        }
    }

    let metrics = crate::aggregate::aggregate(&frames, f64::from(spec.spec.physics.timestep));
    let (status, criteria_results) = criteria::evaluate(&plan, &metrics);
    let baseline_comparison = baseline
        .map(|record| baseline::compare(record, &metrics, status))
        .transpose()?;

    info!(experiment = spec.name(), status = %status, "run complete");
    Ok(SimulationReport {
        status,
        metrics: Some(metrics),
        criteria_results,
        baseline_comparison,
        error: None,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as HarnessResult;
    use crate::report::RunStatus;
    use crate::scenario::{BodyDescriptor, BodyId, JointDescriptor};
    use crate::solver::ballistic::BallisticSolver;
    use crate::solver::{BodyState, ManifoldSnapshot, PhysicsSolver};
    use crate::spec::{
        CriterionBounds, DurationSpec, ExperimentBody, Metadata, MetricsSpec, PhysicsSettings,
        ScenarioName, ScenarioParams, ScenarioSpec, API_VERSION, KIND,
    };
    use glam::Vec3;
    use std::collections::BTreeMap;

    fn ballistic_factory() -> SolverFactory {
        Box::new(|settings| Box::new(BallisticSolver::new(settings)))
    }

    fn spec(steps: u32) -> ExperimentSpec {
        ExperimentSpec {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: Metadata {
                name: "runner-test".to_string(),
                description: None,
            },
            spec: ExperimentBody {
                physics: PhysicsSettings {
                    timestep: 0.1,
                    gravity: Vec3::new(0.0, -10.0, 0.0),
                    solver_iterations: 4,
                    enhanced_determinism: true,
                    seed: 0,
                },
                duration: DurationSpec::Fixed { steps },
                scenario: ScenarioSpec::Builtin {
                    name: ScenarioName::BouncingBall,
                    params: ScenarioParams::default(),
                },
                metrics: MetricsSpec::default(),
                criteria: BTreeMap::new(),
            },
        }
    }

    /// Solver double that fails after a fixed number of steps.
    struct FailingSolver {
        inner: BallisticSolver,
        steps_until_failure: u32,
        steps: u32,
    }

    impl PhysicsSolver for FailingSolver {
        fn insert_body(&mut self, descriptor: &BodyDescriptor) -> HarnessResult<()> {
            self.inner.insert_body(descriptor)
        }

        fn insert_joint(&mut self, descriptor: &JointDescriptor) -> HarnessResult<()> {
            self.inner.insert_joint(descriptor)
        }

        fn step(&mut self, dt: f32, gravity: Vec3) -> HarnessResult<()> {
            if self.steps == self.steps_until_failure {
                return Err(HarnessError::solver("island solve diverged"));
            }
            self.steps += 1;
            self.inner.step(dt, gravity)
        }

        fn body_state(&self, id: BodyId) -> Option<BodyState> {
            self.inner.body_state(id)
        }

        fn contact_manifolds(&self) -> Vec<ManifoldSnapshot> {
            self.inner.contact_manifolds()
        }
    }

    fn failing_factory(steps_until_failure: u32) -> SolverFactory {
        Box::new(move |settings| {
            Box::new(FailingSolver {
                inner: BallisticSolver::new(settings),
                steps_until_failure,
                steps: 0,
            })
        })
    }

    #[test]
    fn no_criteria_run_passes() {
        let report = run_with_factory(&spec(10), None, ballistic_factory(), |_| {}).unwrap();
        assert_eq!(report.status, RunStatus::Passed);
        assert!(report.criteria_results.is_empty());
        assert!(report.baseline_comparison.is_none());
        assert!(report.error.is_none());
        let metrics = report.metrics.unwrap();
        assert_eq!(metrics.frame_count, 10);
    }

    #[test]
    fn observer_sees_every_frame_in_order() {
        let mut seen = Vec::new();
        run_with_factory(&spec(5), None, ballistic_factory(), |frame| {
            seen.push(frame.step);
        })
        .unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn failing_criterion_fails_the_run() {
        let mut doc = spec(10);
        doc.spec.criteria.insert(
            "frame_count".to_string(),
            CriterionBounds {
                min: Some(11.0),
                max: None,
            },
        );
        let report = run_with_factory(&doc, None, ballistic_factory(), |_| {}).unwrap();
        assert_eq!(report.status, RunStatus::Failed);
        assert!(!report.criteria_results["frame_count"].passed);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn unknown_criterion_errors_before_any_step() {
        let mut doc = spec(10);
        doc.spec.criteria.insert(
            "warp_factor".to_string(),
            CriterionBounds {
                min: None,
                max: Some(9.0),
            },
        );
        let mut stepped = false;
        let err =
            run_with_factory(&doc, None, ballistic_factory(), |_| stepped = true).unwrap_err();
        assert!(matches!(err, HarnessError::UnknownCriterion { tag } if tag == "warp_factor"));
        assert!(!stepped);
    }

    #[test]
    fn invalid_spec_errors() {
        let mut doc = spec(10);
        doc.metadata.name = String::new();
        assert!(matches!(
            run_with_factory(&doc, None, ballistic_factory(), |_| {}),
            Err(HarnessError::SpecInvalid { .. })
        ));
    }

    #[test]
    fn incompatible_baseline_errors_before_any_step() {
        let good = run_with_factory(&spec(5), None, ballistic_factory(), |_| {}).unwrap();
        let mut record = BaselineRecord::new("old", good.metrics.unwrap());
        record.schema_version = 99;
        let err = run_with_factory(&spec(5), Some(&record), ballistic_factory(), |_| {})
            .unwrap_err();
        assert!(matches!(err, HarnessError::BaselineIncompatible { .. }));
    }

    #[test]
    fn solver_failure_produces_error_report() {
        let report = run_with_factory(&spec(10), None, failing_factory(3), |_| {}).unwrap();
        assert_eq!(report.status, RunStatus::Error);
        assert!(report.metrics.is_none());
        assert_eq!(report.error.as_deref(), Some("island solve diverged"));
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn baseline_comparison_present_iff_supplied() {
        let first = run_with_factory(&spec(10), None, ballistic_factory(), |_| {}).unwrap();
        let record = BaselineRecord::new("runner-test", first.metrics.unwrap());

        let second =
            run_with_factory(&spec(10), Some(&record), ballistic_factory(), |_| {}).unwrap();
        let comparison = second.baseline_comparison.unwrap();
        assert_eq!(comparison.baseline_name, "runner-test");
        // Identical deterministic runs cannot regress against themselves.
        assert!(comparison.metrics_regressed.is_empty());
    }

    #[test]
    fn runs_are_deterministic() {
        let a = run_with_factory(&spec(50), None, ballistic_factory(), |_| {}).unwrap();
        let b = run_with_factory(&spec(50), None, ballistic_factory(), |_| {}).unwrap();
        assert_eq!(a, b);
    }
}
