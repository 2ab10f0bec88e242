//! Baseline comparison.
//!
//! A baseline is a previously serialised aggregate record. The comparator
//! diffs the current run against it over a fixed comparison set and turns
//! the diff plus the current pass/fail status into an ACCEPT / REJECT /
//! REVIEW recommendation for the closed experimentation loop.

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateMetrics;
use crate::criteria::AggregateKind;
use crate::error::{HarnessError, Result};
use crate::report::RunStatus;

/// Schema version written into (and required of) baseline records.
pub const BASELINE_SCHEMA_VERSION: u32 = 1;

/// Relative tolerance: a metric must move by more than this share of the
/// baseline magnitude to count as improved or regressed.
pub const REL_TOL: f64 = 0.01;

/// Absolute tolerance used when the baseline value is near zero.
pub const ABS_TOL: f64 = 1e-6;

/// Metrics participating in the comparison, with their direction. Lower
/// effective values are better; `energy_drift_percent` compares by
/// magnitude. `average_contact_count` is deliberately absent — drifting
/// contact counts are neutral.
const COMPARISON_SET: [AggregateKind; 3] = [
    AggregateKind::EnergyDriftPercent,
    AggregateKind::MaxPenetrationEver,
    AggregateKind::TotalConstraintViolations,
];

/// A stored aggregate record used as the reference for later runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    /// Record schema version; must equal [`BASELINE_SCHEMA_VERSION`].
    pub schema_version: u32,
    /// Name of the experiment that produced the record.
    pub baseline_name: String,
    /// The stored aggregates.
    pub metrics: AggregateMetrics,
}

impl BaselineRecord {
    /// Wraps freshly computed aggregates into a storable record.
    #[must_use]
    pub fn new(baseline_name: impl Into<String>, metrics: AggregateMetrics) -> Self {
        Self {
            schema_version: BASELINE_SCHEMA_VERSION,
            baseline_name: baseline_name.into(),
            metrics,
        }
    }

    /// Checks the record can be compared against.
    ///
    /// # Errors
    ///
    /// [`HarnessError::BaselineIncompatible`] on schema mismatch.
    pub fn check_compatible(&self) -> Result<()> {
        if self.schema_version == BASELINE_SCHEMA_VERSION {
            Ok(())
        } else {
            Err(HarnessError::BaselineIncompatible {
                reason: format!(
                    "schema version {} (expected {BASELINE_SCHEMA_VERSION})",
                    self.schema_version
                ),
            })
        }
    }
}

/// Verdict of a baseline comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    /// Current run passed and nothing regressed.
    Accept,
    /// Current run failed, or regressed with nothing improved.
    Reject,
    /// Mixed improvements and regressions on a passing run.
    Review,
}

/// Result of diffing a run against a baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineComparison {
    /// Name carried by the baseline record.
    pub baseline_name: String,
    /// Tags that improved beyond tolerance.
    pub metrics_improved: Vec<String>,
    /// Tags that regressed beyond tolerance.
    pub metrics_regressed: Vec<String>,
    /// Overall verdict.
    pub recommendation: Recommendation,
}

/// Effective value used for comparison: drift compares by magnitude, the
/// rest compare raw (all lower-is-better).
fn effective(kind: AggregateKind, metrics: &AggregateMetrics) -> f64 {
    let value = kind.value_in(metrics).unwrap_or(0.0);
    match kind {
        AggregateKind::EnergyDriftPercent => value.abs(),
        _ => value,
    }
}

/// Diffs current aggregates against a baseline and issues a recommendation.
///
/// # Errors
///
/// [`HarnessError::BaselineIncompatible`] when the record's schema version
/// does not match.
pub fn compare(
    baseline: &BaselineRecord,
    current: &AggregateMetrics,
    status: RunStatus,
) -> Result<BaselineComparison> {
    baseline.check_compatible()?;

    let mut improved = Vec::new();
    let mut regressed = Vec::new();
    for kind in COMPARISON_SET {
        let base = effective(kind, &baseline.metrics);
        let cur = effective(kind, current);
        let tolerance = (base.abs() * REL_TOL).max(ABS_TOL);
        if base - cur > tolerance {
            improved.push(kind.tag().to_string());
        } else if cur - base > tolerance {
            regressed.push(kind.tag().to_string());
        }
    }

    let recommendation = match status {
        RunStatus::Passed if regressed.is_empty() => Recommendation::Accept,
        RunStatus::Passed if !improved.is_empty() => Recommendation::Review,
        _ => Recommendation::Reject,
    };

    Ok(BaselineComparison {
        baseline_name: baseline.baseline_name.clone(),
        metrics_improved: improved,
        metrics_regressed: regressed,
        recommendation,
    })
}

// =============================================================================
// Tests
// =============================================================================
