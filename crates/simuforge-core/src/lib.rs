//! # SimuForge Core
//!
//! Deterministic, reproducible harness for rigid-body physics experiments.
//!
//! Experiments are described declaratively, materialised into body sets,
//! stepped through a fixed-timestep solver under a metric-collection
//! wrapper, aggregated, judged against explicit criteria and optionally
//! diffed against a stored baseline. Machine-readable reports close the
//! loop for automated experimentation.
//!
//! ## Pipeline
//!
//! `ExperimentSpec → scenario builder → MetricWorld → (per step) MetricFrame
//! → aggregator → criteria evaluator → baseline comparator →
//! SimulationReport`
//!
//! ## Determinism
//!
//! Running the same spec twice — in one process or two — produces
//! bit-identical frame sequences and reports:
//!
//! - fixed timestep only; body insertion order is a pure function of the
//!   scenario name and parameters,
//! - every metric reduction iterates bodies in id order,
//! - the production backend steps single-threaded, built with rapier's
//!   `enhanced-determinism` feature,
//! - scenario randomness (placement jitter) draws from a `ChaCha8Rng`
//!   seeded by the experiment document.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use simuforge_core::{runner, spec::ExperimentSpec};
//!
//! let spec: ExperimentSpec = serde_yaml::from_str(&doc)?;
//! let report = runner::run(&spec, None)?;
//! assert_eq!(report.exit_code(), 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core modules
pub mod aggregate;
pub mod baseline;
pub mod criteria;
pub mod error;
pub mod math;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod solver;
pub mod spec;
pub mod world;

// Re-exports for convenience
pub use aggregate::AggregateMetrics;
pub use baseline::{BaselineComparison, BaselineRecord, Recommendation};
pub use error::{HarnessError, Result};
pub use metrics::MetricFrame;
pub use report::{RunStatus, SimulationReport};
pub use scenario::{BodyDescriptor, BodyId};
pub use spec::ExperimentSpec;
pub use world::MetricWorld;

#[cfg(test)]
mod tests;
