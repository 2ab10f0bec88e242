//! Terminal simulation reports.
//!
//! A report is always either structurally complete (`passed`/`failed`) or an
//! error report with null metrics and a message. Serialised form mirrors the
//! in-memory form; the CLI maps [`SimulationReport::exit_code`] straight to
//! the process exit status.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateMetrics;
use crate::baseline::BaselineComparison;
use crate::criteria::CriterionResult;

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every declared criterion passed.
    Passed,
    /// At least one criterion failed.
    Failed,
    /// The solver failed; no aggregates were produced.
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Terminal report of one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Overall outcome.
    pub status: RunStatus,
    /// Aggregated scalars; null on error reports.
    pub metrics: Option<AggregateMetrics>,
    /// Per-criterion outcomes, keyed by aggregate tag.
    pub criteria_results: BTreeMap<String, CriterionResult>,
    /// Present iff a baseline was supplied to the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_comparison: Option<BaselineComparison>,
    /// Solver failure message on error reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SimulationReport {
    /// Builds a minimally populated error report.
    #[must_use]
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            metrics: None,
            criteria_results: BTreeMap::new(),
            baseline_comparison: None,
            error: Some(message.into()),
        }
    }

    /// Process exit code for this report: 0 passed, 1 failed, 2 error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Passed => 0,
            RunStatus::Failed => 1,
            RunStatus::Error => 2,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
