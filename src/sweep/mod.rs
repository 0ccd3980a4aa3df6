//! Sweep engine: frequency planning, per-point acquisition, gain conversion
//! and the orchestrating control loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub mod acquire;
pub mod gain;
pub mod orchestrator;
pub mod plan;
pub mod result;

pub use acquire::{AcquisitionConfig, AcquisitionProtocol};
pub use orchestrator::SweepOrchestrator;
pub use plan::FrequencyPlan;
pub use result::{MeasurementResult, SweepProgress, SweepResult, SweepStatus};

/// Cooperative cancellation handle for a running sweep.
///
/// Cloneable; all clones observe the same flag. The orchestrator checks it at
/// the top of each per-frequency iteration and the acquisition protocol at
/// each retry-loop iteration. Cancellation is one-way.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
