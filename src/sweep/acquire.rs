//! Single-shot acquisition protocol
//!
//! Given an excitation already set to a target frequency, this module obtains
//! one trustworthy peak-to-peak amplitude from the capture device: timebase
//! selection, single-shot arming, trigger-state polling, measurement
//! validation and bounded retry. The policy is vendor-neutral; dialects live
//! behind [`CaptureDevice`].
//!
//! Validity failures (unparseable replies, zero/negative or implausibly large
//! readings) are recovered locally by the retry loop and never surface as
//! errors. Channel-level faults propagate immediately and end the sweep.

use log::{debug, warn};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Result, SweepError};
use crate::instrument::CaptureDevice;
use crate::sweep::CancelToken;

/// Waveform cycles that should fit on screen per capture; the horizontal
/// timebase is `CYCLES_PER_CAPTURE / frequency`, clamped below by the
/// configured floor.
const CYCLES_PER_CAPTURE: f64 = 10.0;

/// Per-sweep constants of the acquisition protocol. Never mutated mid-sweep.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// Excitation amplitude in Vpp, the denominator of the gain ratio.
    pub reference_vpp: f64,
    /// Validity ceiling as a gain multiple of the reference amplitude. A
    /// data-corruption heuristic, not a physical limit.
    pub gain_ceiling: f64,
    /// Maximum poll-and-read attempts per point.
    pub max_attempts: u32,
    /// Delay after arming a capture before touching the device again.
    pub settle: Duration,
    /// Delay between a rejected reading and the re-arm.
    pub retry_settle: Duration,
    /// Trigger-status poll interval.
    pub poll_interval: Duration,
    /// Fastest-allowed timebase in s/div. Keeps high frequencies from
    /// selecting degenerate timebases.
    pub timebase_floor_s: f64,
}

/// Outcome of one per-frequency acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionOutcome {
    /// Accepted amplitude in Vpp; 0.0 when degraded.
    pub amplitude_vpp: f64,
    /// Timebase the device actually applied (diagnostics only).
    pub timebase_s: f64,
    /// True when the retry budget exhausted without a valid reading.
    pub degraded: bool,
    /// Attempts used.
    pub attempts: u32,
}

pub struct AcquisitionProtocol {
    config: AcquisitionConfig,
}

impl AcquisitionProtocol {
    pub fn new(config: AcquisitionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Accept a reading iff it is positive and below the plausibility ceiling.
    fn is_valid(&self, amplitude: f64) -> bool {
        amplitude > 0.0 && amplitude < self.config.gain_ceiling * self.config.reference_vpp
    }

    /// Run one single-shot acquisition for `frequency_hz`.
    ///
    /// Returns a degraded outcome (amplitude 0.0) when no attempt validates;
    /// that is not an error and must not abort the sweep. Communication faults
    /// and cancellation propagate as errors.
    pub async fn acquire(
        &self,
        scope: &dyn CaptureDevice,
        frequency_hz: f64,
        cancel: &CancelToken,
    ) -> Result<AcquisitionOutcome> {
        let requested = (CYCLES_PER_CAPTURE / frequency_hz).max(self.config.timebase_floor_s);
        let timebase_s = scope.set_timebase(requested).await?;

        scope.arm_single().await?;
        sleep(self.config.settle).await;
        scope.clear_measurements().await?;

        for attempt in 1..=self.config.max_attempts {
            if cancel.is_cancelled() {
                return Err(SweepError::Cancelled);
            }

            // No overall poll deadline here: a hung instrument surfaces as the
            // channel's own query timeout, which is fatal to the sweep point.
            while !scope.capture_stopped().await? {
                sleep(self.config.poll_interval).await;
            }

            let candidate = match scope.read_peak_to_peak().await? {
                Some(value) => value,
                None => {
                    debug!(
                        "[{}] unparseable peak-to-peak reply at {:.2} Hz",
                        scope.resource(),
                        frequency_hz
                    );
                    0.0
                }
            };

            if self.is_valid(candidate) {
                return Ok(AcquisitionOutcome {
                    amplitude_vpp: candidate,
                    timebase_s,
                    degraded: false,
                    attempts: attempt,
                });
            }

            warn!(
                "[{}] invalid peak-to-peak reading ({} V) at {:.2} Hz, retrying",
                scope.resource(),
                candidate,
                frequency_hz
            );
            sleep(self.config.retry_settle).await;
            scope.arm_single().await?;
            sleep(self.config.settle).await;
        }

        warn!(
            "[{}] no valid peak-to-peak reading at {:.2} Hz after {} attempts, recording 0",
            scope.resource(),
            frequency_hz,
            self.config.max_attempts
        );
        Ok(AcquisitionOutcome {
            amplitude_vpp: 0.0,
            timebase_s,
            degraded: true,
            attempts: self.config.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockChannel;
    use crate::instrument::SiglentSds;
    use std::sync::Arc;

    fn test_config() -> AcquisitionConfig {
        AcquisitionConfig {
            reference_vpp: 0.01,
            gain_ceiling: 1000.0,
            max_attempts: 5,
            settle: Duration::from_millis(100),
            retry_settle: Duration::from_millis(100),
            poll_interval: Duration::from_millis(50),
            timebase_floor_s: 100e-6,
        }
    }

    fn stopped_scope(chan: &MockChannel) -> SiglentSds {
        chan.reply_with("TRIG:STAT?", "Stop");
        chan.reply_with("TDIV?", "1.00E-03S");
        SiglentSds::new(Arc::new(chan.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_reading_accepted_first_attempt() {
        let chan = MockChannel::new("MOCK::SDS");
        let scope = stopped_scope(&chan);
        chan.reply_with("C1:PAVA? PKPK", "C1:PAVA PKPK,2.34E+00V");

        let protocol = AcquisitionProtocol::new(test_config());
        let outcome = protocol
            .acquire(&scope, 1000.0, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.amplitude_vpp, 2.34);
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.degraded);
        assert_eq!(outcome.timebase_s, 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_k_invalid_readings() {
        let chan = MockChannel::new("MOCK::SDS");
        let scope = stopped_scope(&chan);
        // Two invalid readings (parse failure, then zero), then a good one.
        chan.enqueue_reply("C1:PAVA? PKPK", "C1:PAVA PKPK,****V");
        chan.enqueue_reply("C1:PAVA? PKPK", "C1:PAVA PKPK,0.00E+00V");
        chan.reply_with("C1:PAVA? PKPK", "C1:PAVA PKPK,1.50E-01V");

        let protocol = AcquisitionProtocol::new(test_config());
        let outcome = protocol
            .acquire(&scope, 1000.0, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.amplitude_vpp, 0.15);
        assert_eq!(outcome.attempts, 3);
        assert!(!outcome.degraded);
        // Each rejected attempt re-arms the capture: initial ARM + 2 retries.
        assert_eq!(chan.count_matching("ARM"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_rejects_implausible_gain() {
        let chan = MockChannel::new("MOCK::SDS");
        let scope = stopped_scope(&chan);
        // 20 V from a 10 mVpp excitation is a 2000x gain, above the 1000x
        // ceiling; the next reading is plausible.
        chan.enqueue_reply("C1:PAVA? PKPK", "C1:PAVA PKPK,2.00E+01V");
        chan.reply_with("C1:PAVA? PKPK", "C1:PAVA PKPK,5.00E+00V");

        let protocol = AcquisitionProtocol::new(test_config());
        let outcome = protocol
            .acquire(&scope, 50.0, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.amplitude_vpp, 5.0);
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_degrade_without_error() {
        let chan = MockChannel::new("MOCK::SDS");
        let scope = stopped_scope(&chan);
        chan.reply_with("C1:PAVA? PKPK", "C1:PAVA PKPK,-1.00E+00V");

        let protocol = AcquisitionProtocol::new(test_config());
        let outcome = protocol
            .acquire(&scope, 1000.0, &CancelToken::new())
            .await
            .unwrap();
        assert!(outcome.degraded);
        assert_eq!(outcome.amplitude_vpp, 0.0);
        assert_eq!(outcome.attempts, 5);
        assert_eq!(chan.count_matching("C1:PAVA? PKPK"), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_capture_stops() {
        let chan = MockChannel::new("MOCK::SDS");
        chan.reply_with("TDIV?", "1.00E-03S");
        chan.enqueue_reply("TRIG:STAT?", "Arm");
        chan.enqueue_reply("TRIG:STAT?", "Ready");
        chan.reply_with("TRIG:STAT?", "Stop");
        chan.reply_with("C1:PAVA? PKPK", "C1:PAVA PKPK,1.00E+00V");
        let scope = SiglentSds::new(Arc::new(chan.clone()));

        let protocol = AcquisitionProtocol::new(test_config());
        let outcome = protocol
            .acquire(&scope, 1000.0, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(chan.count_matching("TRIG:STAT?"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_communication_fault_propagates_without_retry() {
        let chan = MockChannel::new("MOCK::SDS");
        let scope = stopped_scope(&chan);
        chan.fail_on("PAVA");

        let protocol = AcquisitionProtocol::new(test_config());
        let err = protocol
            .acquire(&scope, 1000.0, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(err.is_fatal_to_sweep());
        assert_eq!(chan.count_matching("C1:PAVA? PKPK"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_observed_between_attempts() {
        let chan = MockChannel::new("MOCK::SDS");
        let scope = stopped_scope(&chan);
        chan.reply_with("C1:PAVA? PKPK", "C1:PAVA PKPK,0.00E+00V");

        let cancel = CancelToken::new();
        cancel.cancel();
        let protocol = AcquisitionProtocol::new(test_config());
        let err = protocol.acquire(&scope, 1000.0, &cancel).await.unwrap_err();
        assert!(matches!(err, SweepError::Cancelled));
        // Cancelled before the first poll; nothing was read.
        assert_eq!(chan.count_matching("PAVA"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timebase_tracks_frequency_down_to_floor() {
        let config = test_config();
        for (freq, expected) in [(10.0, 1.0), (1000.0, 0.01), (10_000_000.0, 100e-6)] {
            let chan = MockChannel::new("MOCK::SDS");
            let scope = stopped_scope(&chan);
            chan.reply_with("C1:PAVA? PKPK", "C1:PAVA PKPK,1.00E+00V");
            let protocol = AcquisitionProtocol::new(config.clone());
            protocol
                .acquire(&scope, freq, &CancelToken::new())
                .await
                .unwrap();
            let log = chan.call_log();
            assert_eq!(log[0], format!("TDIV {}", expected));
        }
    }
}
