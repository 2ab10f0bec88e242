//! Typed experiment documents.
//!
//! An experiment is described declaratively by a structured document with the
//! Kubernetes-style envelope `apiVersion` / `kind` / `metadata` / `spec`.
//! This module is the pure deserialisation target for that document plus the
//! structural validation that must pass before any simulation begins.
//!
//! Parsing is serde-driven and encoding-agnostic; the CLI feeds it YAML or
//! JSON. A deserialised [`ExperimentSpec`] is immutable by convention: it is
//! validated once and then consumed read-only by the scenario builder, the
//! metric world and the runner.
//!
//! # Example
//!
//! ```
//! use simuforge_core::spec::ExperimentSpec;
//!
//! let doc = r#"{
//!     "apiVersion": "simuforge/v1",
//!     "kind": "Experiment",
//!     "metadata": { "name": "falling-box" },
//!     "spec": {
//!         "physics": { "timestep": 0.016666666, "gravity": [0.0, -9.81, 0.0] },
//!         "duration": { "kind": "fixed", "steps": 60 },
//!         "scenario": { "kind": "builtin", "name": "box_stack", "params": { "count": 1 } }
//!     }
//! }"#;
//! let spec: ExperimentSpec = serde_json::from_str(doc).unwrap();
//! spec.validate().unwrap();
//! assert_eq!(spec.steps(), 60);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::criteria::AggregateKind;
use crate::error::{HarnessError, Result};

/// Document version accepted by this harness.
pub const API_VERSION: &str = "simuforge/v1";

/// Document kind accepted by this harness.
pub const KIND: &str = "Experiment";

// =============================================================================
// Document envelope
// =============================================================================

/// A complete, typed experiment document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    /// Schema version; must equal [`API_VERSION`].
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Document kind; must equal [`KIND`].
    pub kind: String,
    /// Experiment identity.
    pub metadata: Metadata,
    /// The experiment body.
    pub spec: ExperimentBody,
}

/// Experiment identity block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Non-empty experiment identifier.
    pub name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The `spec` body of an experiment document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentBody {
    /// Solver configuration.
    pub physics: PhysicsSettings,
    /// How long the experiment runs.
    pub duration: DurationSpec,
    /// Which scenario to materialise.
    pub scenario: ScenarioSpec,
    /// Which metric channels and aggregates to collect.
    #[serde(default)]
    pub metrics: MetricsSpec,
    /// Pass/fail thresholds keyed by aggregate tag.
    #[serde(default)]
    pub criteria: BTreeMap<String, CriterionBounds>,
}

// =============================================================================
// Physics settings
// =============================================================================

/// Fixed-step solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsSettings {
    /// Seconds advanced per solver step. Positive and finite.
    pub timestep: f32,
    /// Gravity vector (m/s²). Default `[0, -9.81, 0]`.
    #[serde(default = "default_gravity")]
    pub gravity: Vec3,
    /// Constraint-solver iteration count. At least 1.
    #[serde(default = "default_solver_iterations")]
    pub solver_iterations: u32,
    /// Request cross-platform bit-stable stepping from the backend.
    #[serde(default)]
    pub enhanced_determinism: bool,
    /// Seed for scenario-builder randomness (placement jitter).
    #[serde(default)]
    pub seed: u64,
}

fn default_gravity() -> Vec3 {
    Vec3::new(0.0, -9.81, 0.0)
}

fn default_solver_iterations() -> u32 {
    4
}

// =============================================================================
// Duration
// =============================================================================

/// Experiment duration. All runs are bounded; only fixed step counts exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DurationSpec {
    /// Run for exactly `steps` solver steps.
    Fixed {
        /// Number of steps; at least 1.
        steps: u32,
    },
}

impl DurationSpec {
    /// Total number of steps this duration prescribes.
    #[must_use]
    pub const fn steps(&self) -> u32 {
        match self {
            Self::Fixed { steps } => *steps,
        }
    }
}

// =============================================================================
// Scenario selection
// =============================================================================

/// Scenario selection. Only builtin scenarios exist in the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioSpec {
    /// One of the named builtin scenarios.
    Builtin {
        /// Builtin scenario name.
        name: ScenarioName,
        /// Scenario parameter bag; unset fields take per-scenario defaults.
        #[serde(default)]
        params: ScenarioParams,
    },
}

impl ScenarioSpec {
    /// The scenario name.
    #[must_use]
    pub const fn name(&self) -> ScenarioName {
        match self {
            Self::Builtin { name, .. } => *name,
        }
    }

    /// The scenario parameter bag.
    #[must_use]
    pub const fn params(&self) -> &ScenarioParams {
        match self {
            Self::Builtin { params, .. } => params,
        }
    }
}

/// The builtin scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioName {
    /// Vertical stack of dynamic boxes on a ground slab.
    BoxStack,
    /// Sphere launched horizontally across the ground.
    RollingSphere,
    /// Sphere dropped from a height onto the ground.
    BouncingBall,
    /// Dynamic block resting on an inclined static ramp.
    FrictionRamp,
}

impl ScenarioName {
    /// All builtin scenario names, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::BoxStack,
        Self::RollingSphere,
        Self::BouncingBall,
        Self::FrictionRamp,
    ];

    /// The snake_case tag used in documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BoxStack => "box_stack",
            Self::RollingSphere => "rolling_sphere",
            Self::BouncingBall => "bouncing_ball",
            Self::FrictionRamp => "friction_ramp",
        }
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-scenario parameter bag.
///
/// Each builtin consumes the subset it understands; fields are validated
/// generically here and defaulted by the scenario builder. Unknown keys are
/// rejected at deserialisation so typos cannot silently fall back to
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioParams {
    /// Number of stacked boxes (`box_stack`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Full box dimensions (`box_stack`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_size: Option<Vec3>,
    /// Friction coefficient applied to the scenario's colliders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friction: Option<f32>,
    /// Maximum lateral placement jitter in metres (`box_stack`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<f32>,
    /// Sphere radius (`rolling_sphere`, `bouncing_ball`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
    /// Initial linear velocity (`rolling_sphere`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_velocity: Option<Vec3>,
    /// Restitution coefficient (`bouncing_ball`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restitution: Option<f32>,
    /// Drop height above the ground plane (`bouncing_ball`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_height: Option<f32>,
    /// Ramp inclination in radians (`friction_ramp`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramp_angle: Option<f32>,
    /// Ramp length in metres (`friction_ramp`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramp_length: Option<f32>,
}

// =============================================================================
// Metric selection
// =============================================================================

/// Per-frame metric channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameChannel {
    /// Kinetic/potential/total energy.
    Energy,
    /// Linear and angular momentum sums.
    Momentum,
    /// Contact counts and penetration depths.
    Contacts,
    /// Per-body transforms, velocities and sleep flags.
    Bodies,
}

/// Which metric channels and aggregates a run collects.
///
/// Defaults to everything. The scalar channels are always computed because
/// the aggregator consumes them; the per-frame tag set gates only the
/// (comparatively heavy) `bodies` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSpec {
    /// Channels captured in every [`crate::metrics::MetricFrame`].
    #[serde(default = "all_frame_channels")]
    pub per_frame: BTreeSet<FrameChannel>,
    /// Aggregates reported at the end of the run.
    #[serde(default = "all_aggregates")]
    pub aggregate: BTreeSet<AggregateKind>,
}

impl MetricsSpec {
    /// Whether the per-body channel is captured.
    #[must_use]
    pub fn captures_bodies(&self) -> bool {
        self.per_frame.contains(&FrameChannel::Bodies)
    }
}

impl Default for MetricsSpec {
    fn default() -> Self {
        Self {
            per_frame: all_frame_channels(),
            aggregate: all_aggregates(),
        }
    }
}

fn all_frame_channels() -> BTreeSet<FrameChannel> {
    [
        FrameChannel::Energy,
        FrameChannel::Momentum,
        FrameChannel::Contacts,
        FrameChannel::Bodies,
    ]
    .into_iter()
    .collect()
}

fn all_aggregates() -> BTreeSet<AggregateKind> {
    AggregateKind::ALL.into_iter().collect()
}

// =============================================================================
// Criteria
// =============================================================================

/// Threshold bounds for one criterion.
///
/// A value passes iff it is `>= min` (when set) and `<= max` (when set).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CriterionBounds {
    /// Inclusive lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

// =============================================================================
// Validation
// =============================================================================

impl ExperimentSpec {
    /// The experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Total steps prescribed by the duration.
    #[must_use]
    pub const fn steps(&self) -> u32 {
        self.spec.duration.steps()
    }

    /// Structural validation; must pass before any simulation begins.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SpecInvalid`] naming the first offending
    /// field: wrong envelope, empty name, non-finite floats, non-positive
    /// timestep, zero counts, out-of-range scenario parameters or inverted
    /// criterion bounds. Unknown criterion *tags* are not checked here; they
    /// surface as [`HarnessError::UnknownCriterion`] during the runner's
    /// pre-flight.
    pub fn validate(&self) -> Result<()> {
        if self.api_version != API_VERSION {
            return Err(HarnessError::spec_invalid(
                "apiVersion",
                format!("expected `{API_VERSION}`, got `{}`", self.api_version),
            ));
        }
        if self.kind != KIND {
            return Err(HarnessError::spec_invalid(
                "kind",
                format!("expected `{KIND}`, got `{}`", self.kind),
            ));
        }
        if self.metadata.name.trim().is_empty() {
            return Err(HarnessError::spec_invalid(
                "metadata.name",
                "must be non-empty",
            ));
        }

        let physics = &self.spec.physics;
        require_finite("spec.physics.timestep", f64::from(physics.timestep))?;
        if physics.timestep <= 0.0 {
            return Err(HarnessError::spec_invalid(
                "spec.physics.timestep",
                "must be positive",
            ));
        }
        require_finite_vec("spec.physics.gravity", physics.gravity)?;
        if physics.solver_iterations == 0 {
            return Err(HarnessError::spec_invalid(
                "spec.physics.solver_iterations",
                "must be at least 1",
            ));
        }

        if self.spec.duration.steps() == 0 {
            return Err(HarnessError::spec_invalid(
                "spec.duration.steps",
                "must be at least 1",
            ));
        }

        validate_params(self.spec.scenario.params())?;

        for (tag, bounds) in &self.spec.criteria {
            let field = format!("spec.criteria.{tag}");
            if let Some(min) = bounds.min {
                require_finite(&field, min)?;
            }
            if let Some(max) = bounds.max {
                require_finite(&field, max)?;
            }
            if let (Some(min), Some(max)) = (bounds.min, bounds.max) {
                if min > max {
                    return Err(HarnessError::spec_invalid(field, "min exceeds max"));
                }
            }
        }

        Ok(())
    }
}

fn validate_params(params: &ScenarioParams) -> Result<()> {
    if params.count == Some(0) {
        return Err(HarnessError::spec_invalid(
            "spec.scenario.params.count",
            "must be at least 1",
        ));
    }
    if let Some(size) = params.box_size {
        require_finite_vec("spec.scenario.params.box_size", size)?;
        if size.min_element() <= 0.0 {
            return Err(HarnessError::spec_invalid(
                "spec.scenario.params.box_size",
                "components must be positive",
            ));
        }
    }
    require_non_negative("spec.scenario.params.friction", params.friction)?;
    require_non_negative("spec.scenario.params.jitter", params.jitter)?;
    require_positive("spec.scenario.params.radius", params.radius)?;
    if let Some(v) = params.initial_velocity {
        require_finite_vec("spec.scenario.params.initial_velocity", v)?;
    }
    require_non_negative("spec.scenario.params.restitution", params.restitution)?;
    require_positive("spec.scenario.params.drop_height", params.drop_height)?;
    if let Some(angle) = params.ramp_angle {
        require_finite("spec.scenario.params.ramp_angle", f64::from(angle))?;
        if !(0.0..std::f32::consts::FRAC_PI_2).contains(&angle) || angle == 0.0 {
            return Err(HarnessError::spec_invalid(
                "spec.scenario.params.ramp_angle",
                "must lie strictly between 0 and pi/2",
            ));
        }
    }
    require_positive("spec.scenario.params.ramp_length", params.ramp_length)?;
    Ok(())
}

fn require_finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(HarnessError::spec_invalid(field, "must be finite"))
    }
}

fn require_finite_vec(field: &str, value: Vec3) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(HarnessError::spec_invalid(
            field,
            "components must be finite",
        ))
    }
}

fn require_positive(field: &str, value: Option<f32>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() => Err(HarnessError::spec_invalid(field, "must be finite")),
        Some(v) if v <= 0.0 => Err(HarnessError::spec_invalid(field, "must be positive")),
        _ => Ok(()),
    }
}

fn require_non_negative(field: &str, value: Option<f32>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() => Err(HarnessError::spec_invalid(field, "must be finite")),
        Some(v) if v < 0.0 => Err(HarnessError::spec_invalid(field, "must not be negative")),
        _ => Ok(()),
    }
}

// =============================================================================
// Tests
// =============================================================================
