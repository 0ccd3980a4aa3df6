//! Per-vendor instrument adapters
//!
//! This module defines the capability traits the sweep engine is written
//! against, plus one adapter per supported command dialect. The traits expose
//! capability-level verbs (set timebase, arm a single capture, poll trigger
//! status, read peak-to-peak); everything dialect-specific — command syntax and
//! reply formats — lives in the adapters. Retry and validation policy never
//! varies per vendor and lives in `sweep::acquire`.

use async_trait::async_trait;

use crate::error::Result;

pub mod keysight_33500b;
pub mod keysight_e36200;
pub mod rigol_ds1000z;
pub mod siglent_sds;

pub use keysight_33500b::Keysight33500;
pub use keysight_e36200::KeysightE36200;
pub use rigol_ds1000z::RigolDs1000z;
pub use siglent_sds::SiglentSds;

/// Waveform-capture instrument (oscilloscope) driven through single-shot
/// acquisitions.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Query the instrument identity (*IDN?).
    async fn identify(&self) -> Result<String>;

    /// One-time sweep setup: input coupling, vertical scale, trigger level and
    /// acquisition mode. Not re-applied per point.
    async fn configure(&self, volts_per_division: f64, trigger_level: f64) -> Result<()>;

    /// Apply a horizontal timebase (seconds/division) and read back the value
    /// the device actually selected. Devices quantize to supported steps; the
    /// returned value is for diagnostics only.
    async fn set_timebase(&self, seconds_per_division: f64) -> Result<f64>;

    /// Arm one single-shot acquisition.
    async fn arm_single(&self) -> Result<()>;

    /// Clear any prior measurement state.
    async fn clear_measurements(&self) -> Result<()>;

    /// Poll the trigger/run state. `true` once the device reports the capture
    /// finished and halted.
    async fn capture_stopped(&self) -> Result<bool>;

    /// Read the peak-to-peak voltage measurement. `None` when the reply does
    /// not parse as a number; communication faults are errors.
    async fn read_peak_to_peak(&self) -> Result<Option<f64>>;

    /// Resource string of the underlying channel.
    fn resource(&self) -> &str;

    /// Release the underlying channel. Idempotent, best-effort.
    async fn close(&self) -> Result<()>;
}

/// Sine excitation source (function/waveform generator).
#[async_trait]
pub trait ExcitationSource: Send + Sync {
    /// Query the instrument identity (*IDN?).
    async fn identify(&self) -> Result<String>;

    /// One-time sweep setup: sine shape, amplitude, zero offset, zero phase.
    async fn configure_sine(&self, amplitude_vpp: f64) -> Result<()>;

    /// Move the excitation to a new frequency.
    async fn set_frequency(&self, hz: f64) -> Result<()>;

    /// Enable the output.
    async fn enable_output(&self) -> Result<()>;

    /// Resource string of the underlying channel.
    fn resource(&self) -> &str;

    /// Release the underlying channel. Idempotent, best-effort.
    async fn close(&self) -> Result<()>;
}

/// DC bias supply powering the circuit under test. Optional in a sweep.
#[async_trait]
pub trait BiasSupply: Send + Sync {
    /// Query the instrument identity (*IDN?).
    async fn identify(&self) -> Result<String>;

    /// Program output voltage and current limit.
    async fn apply(&self, volts: f64, current_limit_a: f64) -> Result<()>;

    /// Enable the output.
    async fn enable_output(&self) -> Result<()>;

    /// Resource string of the underlying channel.
    fn resource(&self) -> &str;

    /// Release the underlying channel. Idempotent, best-effort.
    async fn close(&self) -> Result<()>;
}
