//! Frame aggregation.
//!
//! Rolls a finite, ordered sequence of metric frames into the scalar
//! aggregates that criteria and baselines are judged on. Consumes frames in
//! emission order; the aggregator never reorders.

use serde::{Deserialize, Serialize};

use crate::metrics::MetricFrame;

/// Number of consecutive frames whose kinetic energy must stay below
/// [`STAB_KE`] for the run to count as stabilised.
pub const STAB_WINDOW: usize = 30;

/// Kinetic-energy threshold (joules) for stability detection.
pub const STAB_KE: f64 = 0.1;

/// Guard against division by zero when the initial energy is (near) zero.
const DRIFT_EPSILON: f64 = 1e-9;

/// Aggregated scalars for one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    /// Total energy of the first frame (0 when the run emitted no frames).
    pub initial_energy: f64,
    /// Total energy of the last frame.
    pub final_energy: f64,
    /// Signed relative energy change, first to last frame, in percent.
    pub energy_drift_percent: f64,
    /// Deepest penetration observed in any frame.
    pub max_penetration_ever: f64,
    /// Sum of constraint violations across all frames.
    pub total_constraint_violations: u64,
    /// Mean contact count per frame.
    pub average_contact_count: f64,
    /// Number of frames aggregated.
    pub frame_count: u64,
    /// First step index from which kinetic energy stayed below [`STAB_KE`]
    /// for [`STAB_WINDOW`] consecutive frames; `None` if that never happens.
    pub stabilization_step: Option<u64>,
    /// `stabilization_step × timestep`, seconds.
    pub stability_time: Option<f64>,
}

/// Aggregates a frame sequence.
///
/// `timestep` converts the stabilisation step index into seconds. An empty
/// sequence produces all-zero aggregates with no stabilisation.
#[must_use]
pub fn aggregate(frames: &[MetricFrame], timestep: f64) -> AggregateMetrics {
    let initial_energy = frames.first().map_or(0.0, |f| f.energy.total);
    let final_energy = frames.last().map_or(0.0, |f| f.energy.total);
    let energy_drift_percent =
        (final_energy - initial_energy) / initial_energy.abs().max(DRIFT_EPSILON) * 100.0;

    let mut max_penetration_ever = 0.0_f64;
    let mut total_constraint_violations = 0_u64;
    let mut contact_sum = 0.0_f64;
    for frame in frames {
        max_penetration_ever = max_penetration_ever.max(frame.contacts.max_penetration);
        total_constraint_violations += u64::from(frame.contacts.constraint_violations);
        contact_sum += f64::from(frame.contacts.contact_count);
    }

    #[allow(clippy::cast_precision_loss)]
    let average_contact_count = if frames.is_empty() {
        0.0
    } else {
        contact_sum / frames.len() as f64
    };

    let stabilization_step = detect_stabilization(frames);
    #[allow(clippy::cast_precision_loss)]
    let stability_time = stabilization_step.map(|step| step as f64 * timestep);

    AggregateMetrics {
        initial_energy,
        final_energy,
        energy_drift_percent,
        max_penetration_ever,
        total_constraint_violations,
        average_contact_count,
        frame_count: frames.len() as u64,
        stabilization_step,
        stability_time,
    }
}

/// Finds the smallest `k` such that frames `[k, k + STAB_WINDOW)` all have
/// kinetic energy below [`STAB_KE`].
fn detect_stabilization(frames: &[MetricFrame]) -> Option<u64> {
    if frames.len() < STAB_WINDOW {
        return None;
    }
    // Sliding count of calm frames in the current window.
    let calm = |frame: &MetricFrame| frame.energy.kinetic < STAB_KE;
    let mut calm_count = frames[..STAB_WINDOW].iter().filter(|f| calm(f)).count();
    if calm_count == STAB_WINDOW {
        return Some(0);
    }
    for k in 1..=(frames.len() - STAB_WINDOW) {
        if calm(&frames[k - 1]) {
            calm_count -= 1;
        }
        if calm(&frames[k + STAB_WINDOW - 1]) {
            calm_count += 1;
        }
        if calm_count == STAB_WINDOW {
            return Some(k as u64);
        }
    }
    None
}

// =============================================================================
// Tests
// =============================================================================
