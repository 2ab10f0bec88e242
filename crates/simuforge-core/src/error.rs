//! Error types for the experiment harness.
//!
//! Every fallible operation in the core returns [`HarnessError`]. The policy
//! (see the runner) is:
//!
//! - [`HarnessError::SpecInvalid`], [`HarnessError::UnknownCriterion`] and
//!   [`HarnessError::BaselineIncompatible`] surface before any simulation
//!   step executes.
//! - [`HarnessError::SolverError`] terminates a run and is reported through a
//!   `status = error` report rather than an `Err`.
//! - [`HarnessError::AlreadyComplete`] indicates a caller bug (stepping a
//!   finished world) and is never expected in normal flow.
//!
//! Criteria failures are *not* errors; they are expected outcomes reported
//! via `status = failed`.

use thiserror::Error;

/// Convenience alias for results produced by the harness.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// All error conditions the experiment harness can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// The experiment document failed structural validation.
    #[error("invalid spec field `{field}`: {reason}")]
    SpecInvalid {
        /// Dotted path of the offending field (e.g. `physics.timestep`).
        field: String,
        /// Human-readable reason the value was rejected.
        reason: String,
    },

    /// A criterion references an aggregate the harness does not compute.
    #[error("unknown criterion tag `{tag}`")]
    UnknownCriterion {
        /// The unrecognised aggregate tag.
        tag: String,
    },

    /// `step()` was invoked on a world that already reached its target steps.
    #[error("simulation already complete")]
    AlreadyComplete,

    /// The underlying solver reported a failure.
    #[error("solver error: {message}")]
    SolverError {
        /// Opaque message propagated from the solver backend.
        message: String,
    },

    /// The supplied baseline cannot be compared against this run.
    #[error("incompatible baseline: {reason}")]
    BaselineIncompatible {
        /// Why the baseline was rejected (schema version, missing fields).
        reason: String,
    },
}

impl HarnessError {
    /// Shorthand for a [`HarnessError::SpecInvalid`] with owned strings.
    #[must_use]
    pub fn spec_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpecInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`HarnessError::SolverError`].
    #[must_use]
    pub fn solver(message: impl Into<String>) -> Self {
        Self::SolverError {
            message: message.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
