//! Sweep orchestration
//!
//! One orchestrator instance owns every instrument channel for the duration of
//! one sweep. A sweep moves through configure (one-time excitation, bias and
//! capture setup) and then the strictly sequential per-frequency loop; every
//! exit path — completion, cancellation, communication fault — releases all
//! channels exactly once and hands back the accumulated result series.

use chrono::Utc;
use log::{info, warn};
use tokio::sync::broadcast;

use crate::config::{CaptureParams, SupplyParams, SweepParams};
use crate::error::{Result, SweepError};
use crate::instrument::{BiasSupply, CaptureDevice, ExcitationSource};
use crate::sweep::{
    gain, AcquisitionConfig, AcquisitionProtocol, CancelToken, FrequencyPlan, MeasurementResult,
    SweepProgress, SweepResult, SweepStatus,
};

pub struct SweepOrchestrator {
    sweep: SweepParams,
    capture_setup: CaptureParams,
    supply_setup: SupplyParams,
    protocol: AcquisitionProtocol,
    source: Box<dyn ExcitationSource>,
    capture: Box<dyn CaptureDevice>,
    supply: Option<Box<dyn BiasSupply>>,
    progress_tx: broadcast::Sender<SweepProgress>,
    cancel: CancelToken,
    points: Vec<MeasurementResult>,
}

impl SweepOrchestrator {
    pub fn new(
        sweep: SweepParams,
        capture_setup: CaptureParams,
        acquisition: AcquisitionConfig,
        source: Box<dyn ExcitationSource>,
        capture: Box<dyn CaptureDevice>,
    ) -> Self {
        let (progress_tx, _rx) = broadcast::channel(1024);
        Self {
            sweep,
            capture_setup,
            supply_setup: SupplyParams::default(),
            protocol: AcquisitionProtocol::new(acquisition),
            source,
            capture,
            supply: None,
            progress_tx,
            cancel: CancelToken::new(),
            points: Vec::new(),
        }
    }

    /// Attach a bias supply to power the circuit under test.
    pub fn with_supply(mut self, supply: Box<dyn BiasSupply>, setup: SupplyParams) -> Self {
        self.supply = Some(supply);
        self.supply_setup = setup;
        self
    }

    /// Handle for cooperative cancellation, checked at the top of each
    /// per-frequency iteration and each acquisition retry.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Subscribe to per-point progress events.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<SweepProgress> {
        self.progress_tx.subscribe()
    }

    /// Run the sweep to a terminal state.
    ///
    /// Plan and parameter validation errors are returned synchronously, before
    /// any instrument interaction. Afterwards the sweep always yields a
    /// `SweepResult`: communication faults and cancellation are folded into
    /// its status with the partial series preserved, and every channel is
    /// released exactly once on every exit path.
    pub async fn run(mut self) -> Result<SweepResult> {
        let plan = FrequencyPlan::generate(
            self.sweep.start_hz,
            self.sweep.end_hz,
            self.sweep.points_per_decade,
        )?;
        if !(self.sweep.reference_vpp > 0.0) {
            return Err(SweepError::InvalidReference(self.sweep.reference_vpp));
        }

        info!(
            "starting sweep: {} points, {:.2} Hz to {:.2} Hz, {} Vpp reference",
            plan.len(),
            self.sweep.start_hz,
            self.sweep.end_hz,
            self.sweep.reference_vpp
        );

        let outcome = self.execute(&plan).await;
        self.release().await;

        let (status, failure) = match outcome {
            Ok(()) => {
                info!(
                    "sweep completed: {} points, {} degraded",
                    self.points.len(),
                    self.points.iter().filter(|p| p.degraded).count()
                );
                (SweepStatus::Completed, None)
            }
            Err(SweepError::Cancelled) => {
                info!(
                    "sweep cancelled after {} of {} points",
                    self.points.len(),
                    plan.len()
                );
                (SweepStatus::Cancelled, None)
            }
            Err(err) => {
                warn!(
                    "sweep aborted after {} of {} points: {}",
                    self.points.len(),
                    plan.len(),
                    err
                );
                (SweepStatus::Aborted, Some(err))
            }
        };

        Ok(SweepResult {
            points: self.points,
            status,
            failure,
        })
    }

    /// One-time instrument setup, applied for the whole sweep.
    async fn configure(&mut self) -> Result<()> {
        if let Some(supply) = &self.supply {
            info!("bias supply: {}", supply.identify().await?);
            supply
                .apply(self.supply_setup.volts, self.supply_setup.current_limit_a)
                .await?;
            supply.enable_output().await?;
        }

        info!("excitation source: {}", self.source.identify().await?);
        self.source.configure_sine(self.sweep.reference_vpp).await?;
        self.source.set_frequency(self.sweep.start_hz).await?;
        self.source.enable_output().await?;

        info!("capture device: {}", self.capture.identify().await?);
        self.capture
            .configure(
                self.capture_setup.volts_per_division,
                self.capture_setup.trigger_level_v,
            )
            .await
    }

    async fn execute(&mut self, plan: &FrequencyPlan) -> Result<()> {
        self.configure().await?;

        let total = plan.len();
        for (index, &frequency) in plan.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(SweepError::Cancelled);
            }

            self.source.set_frequency(frequency).await?;
            let outcome = self
                .protocol
                .acquire(self.capture.as_ref(), frequency, &self.cancel)
                .await?;
            let gain_db =
                gain::to_decibels(outcome.amplitude_vpp, self.protocol.config().reference_vpp)?;

            info!(
                "point {}/{}: {:.2} Hz, timebase {} s/div, {} Vpp, {:.2} dB",
                index + 1,
                total,
                frequency,
                outcome.timebase_s,
                outcome.amplitude_vpp,
                gain_db
            );

            let point = MeasurementResult {
                frequency_hz: frequency,
                timebase_s: outcome.timebase_s,
                amplitude_vpp: outcome.amplitude_vpp,
                gain_db,
                degraded: outcome.degraded,
                attempts: outcome.attempts,
            };
            self.points.push(point.clone());

            // Nobody listening is fine; progress is advisory.
            let _ = self.progress_tx.send(SweepProgress {
                timestamp: Utc::now(),
                index,
                total,
                point,
            });
        }
        Ok(())
    }

    /// Best-effort release of every channel. Runs on every exit path.
    async fn release(&mut self) {
        if let Some(supply) = &self.supply {
            if let Err(err) = supply.close().await {
                warn!("failed to close bias supply channel: {}", err);
            }
        }
        if let Err(err) = self.source.close().await {
            warn!("failed to close excitation source channel: {}", err);
        }
        if let Err(err) = self.capture.close().await {
            warn!("failed to close capture device channel: {}", err);
        }
    }
}
