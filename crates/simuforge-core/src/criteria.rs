//! Criteria evaluation.
//!
//! Criteria arrive string-keyed in the external document; internally the
//! recognised aggregates form the closed [`AggregateKind`] enum so an
//! unrecognised tag is caught during pre-flight — before any solver step
//! executes — rather than silently evaluating to nothing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateMetrics;
use crate::error::{HarnessError, Result};
use crate::report::RunStatus;
use crate::spec::CriterionBounds;

// =============================================================================
// Aggregate tags
// =============================================================================

/// The closed set of aggregates criteria may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    /// Total energy of the first frame.
    InitialEnergy,
    /// Total energy of the last frame.
    FinalEnergy,
    /// Signed relative energy change in percent.
    EnergyDriftPercent,
    /// Deepest penetration across the run.
    MaxPenetrationEver,
    /// Sum of per-frame constraint violations.
    TotalConstraintViolations,
    /// Mean contact count per frame.
    AverageContactCount,
    /// Number of frames emitted.
    FrameCount,
    /// First stable step index (nullable).
    StabilizationStep,
    /// First stable time in seconds (nullable).
    StabilityTime,
}

impl AggregateKind {
    /// Every recognised aggregate, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::InitialEnergy,
        Self::FinalEnergy,
        Self::EnergyDriftPercent,
        Self::MaxPenetrationEver,
        Self::TotalConstraintViolations,
        Self::AverageContactCount,
        Self::FrameCount,
        Self::StabilizationStep,
        Self::StabilityTime,
    ];

    /// The snake_case tag used in documents and reports.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::InitialEnergy => "initial_energy",
            Self::FinalEnergy => "final_energy",
            Self::EnergyDriftPercent => "energy_drift_percent",
            Self::MaxPenetrationEver => "max_penetration_ever",
            Self::TotalConstraintViolations => "total_constraint_violations",
            Self::AverageContactCount => "average_contact_count",
            Self::FrameCount => "frame_count",
            Self::StabilizationStep => "stabilization_step",
            Self::StabilityTime => "stability_time",
        }
    }

    /// Parses a document tag; `None` for unrecognised tags.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Reads this aggregate's value out of the computed metrics.
    ///
    /// `None` for the nullable aggregates when the run never stabilised.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value_in(self, metrics: &AggregateMetrics) -> Option<f64> {
        match self {
            Self::InitialEnergy => Some(metrics.initial_energy),
            Self::FinalEnergy => Some(metrics.final_energy),
            Self::EnergyDriftPercent => Some(metrics.energy_drift_percent),
            Self::MaxPenetrationEver => Some(metrics.max_penetration_ever),
            Self::TotalConstraintViolations => {
                Some(metrics.total_constraint_violations as f64)
            }
            Self::AverageContactCount => Some(metrics.average_contact_count),
            Self::FrameCount => Some(metrics.frame_count as f64),
            Self::StabilizationStep => metrics.stabilization_step.map(|s| s as f64),
            Self::StabilityTime => metrics.stability_time,
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Outcome of one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    /// The aggregate's value; null when the aggregate itself is null.
    pub value: Option<f64>,
    /// Declared lower bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Declared upper bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Whether the value satisfied both bounds.
    pub passed: bool,
}

/// One pre-flight-resolved criterion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriterionPlan {
    /// Which aggregate the criterion reads.
    pub kind: AggregateKind,
    /// Declared bounds.
    pub bounds: CriterionBounds,
}

/// Resolves criterion tags before any simulation step runs.
///
/// # Errors
///
/// [`HarnessError::UnknownCriterion`] naming the first unrecognised tag.
pub fn plan(criteria: &BTreeMap<String, CriterionBounds>) -> Result<Vec<(String, CriterionPlan)>> {
    criteria
        .iter()
        .map(|(tag, bounds)| {
            let kind = AggregateKind::from_tag(tag).ok_or_else(|| {
                HarnessError::UnknownCriterion { tag: tag.clone() }
            })?;
            Ok((
                tag.clone(),
                CriterionPlan {
                    kind,
                    bounds: *bounds,
                },
            ))
        })
        .collect()
}

/// Applies a resolved criteria plan to the computed aggregates.
///
/// Returns the overall status (`passed` iff every criterion passed; an
/// empty plan passes) and the per-criterion results. A null aggregate fails
/// any criterion bounding it.
#[must_use]
pub fn evaluate(
    plan: &[(String, CriterionPlan)],
    metrics: &AggregateMetrics,
) -> (RunStatus, BTreeMap<String, CriterionResult>) {
    let mut results = BTreeMap::new();
    let mut all_passed = true;
    for (tag, criterion) in plan {
        let value = criterion.kind.value_in(metrics);
        let passed = value.map_or(false, |v| {
            criterion.bounds.min.map_or(true, |min| v >= min)
                && criterion.bounds.max.map_or(true, |max| v <= max)
        });
        all_passed &= passed;
        results.insert(
            tag.clone(),
            CriterionResult {
                value,
                min: criterion.bounds.min,
                max: criterion.bounds.max,
                passed,
            },
        );
    }
    let status = if all_passed {
        RunStatus::Passed
    } else {
        RunStatus::Failed
    };
    (status, results)
}

// =============================================================================
// Tests
// =============================================================================
