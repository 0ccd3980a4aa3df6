//! Sweep result model
//!
//! The result series is the externally visible product of a sweep: one
//! [`MeasurementResult`] per planned frequency, in frequency order, plus the
//! terminal [`SweepStatus`]. Results are owned exclusively by the orchestrator
//! while a sweep runs and read-only once appended.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SweepError;

/// Final per-frequency outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementResult {
    /// Target frequency in Hz.
    pub frequency_hz: f64,
    /// Horizontal timebase the capture device actually applied (s/div).
    /// Diagnostics only; it does not feed back into measurement logic.
    pub timebase_s: f64,
    /// Accepted peak-to-peak amplitude in Vpp; 0.0 when degraded.
    pub amplitude_vpp: f64,
    /// Gain magnitude in dB; `-inf` when the amplitude is zero.
    pub gain_db: f64,
    /// True when no attempt validated within the retry budget.
    pub degraded: bool,
    /// Poll-and-read attempts used for this point.
    pub attempts: u32,
}

/// Terminal state of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SweepStatus {
    /// Every planned frequency produced a result (possibly degraded).
    Completed,
    /// Cooperative cancellation was observed; the series is partial.
    Cancelled,
    /// A communication fault ended the sweep; the series is partial.
    Aborted,
}

/// The full outcome of one sweep, terminal once returned.
#[derive(Debug, Serialize)]
pub struct SweepResult {
    /// Per-frequency results, ascending frequency order.
    pub points: Vec<MeasurementResult>,
    pub status: SweepStatus,
    /// The fatal communication error, present iff `status` is `Aborted`.
    #[serde(skip)]
    pub failure: Option<SweepError>,
}

impl SweepResult {
    /// Number of degraded points in the series.
    pub fn degraded_count(&self) -> usize {
        self.points.iter().filter(|p| p.degraded).count()
    }
}

/// Incremental progress event broadcast while a sweep runs, so a long sweep is
/// observable before completion.
#[derive(Debug, Clone, Serialize)]
pub struct SweepProgress {
    pub timestamp: DateTime<Utc>,
    /// Zero-based index of the point within the plan.
    pub index: usize,
    /// Total number of planned points.
    pub total: usize,
    pub point: MeasurementResult,
}
