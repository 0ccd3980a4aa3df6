//! Configuration system using Figment
//!
//! Strongly-typed configuration for a sweep, loaded from:
//! 1. a TOML file (`config/default.toml` by default)
//! 2. environment variables (prefixed with `BODE_`)
//!
//! # Example
//!
//! ```toml
//! [instruments]
//! source = "TCPIP0::192.168.1.227::INSTR"
//! capture = "TCPIP0::192.168.1.22::INSTR"
//! supply = "TCPIP0::192.168.1.122::INSTR"
//! capture_vendor = "siglent"
//!
//! [sweep]
//! start_hz = 10.0
//! end_hz = 10000000.0
//! points_per_decade = 10.0
//! reference_vpp = 0.01
//! ```
//!
//! Validation runs before any instrument interaction; semantically invalid
//! values (a reversed frequency range, a zero reference amplitude) are
//! rejected synchronously.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SweepError};
use crate::sweep::AcquisitionConfig;

/// Top-level configuration for one sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub instruments: InstrumentsSettings,
    #[serde(default)]
    pub sweep: SweepParams,
    #[serde(default)]
    pub supply: SupplyParams,
    #[serde(default)]
    pub capture: CaptureParams,
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
}

/// Instrument addresses and channel behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentsSettings {
    /// Excitation source resource string.
    pub source: String,
    /// Capture device resource string.
    pub capture: String,
    /// Bias supply resource string; omit to sweep without a supply.
    #[serde(default)]
    pub supply: Option<String>,
    /// Command dialect of the capture device.
    #[serde(default)]
    pub capture_vendor: CaptureVendor,
    /// Per-call channel timeout.
    #[serde(with = "humantime_serde", default = "default_channel_timeout")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureVendor {
    #[default]
    Siglent,
    Rigol,
}

/// Frequency plan and excitation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepParams {
    pub start_hz: f64,
    pub end_hz: f64,
    pub points_per_decade: f64,
    /// Excitation amplitude in Vpp; also the gain reference.
    pub reference_vpp: f64,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            start_hz: 10.0,
            end_hz: 10_000_000.0,
            points_per_decade: 10.0,
            reference_vpp: 0.01,
        }
    }
}

/// Bias supply setup, applied once while configuring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyParams {
    pub volts: f64,
    pub current_limit_a: f64,
}

impl Default for SupplyParams {
    fn default() -> Self {
        Self {
            volts: 5.0,
            current_limit_a: 1.0,
        }
    }
}

/// Capture device setup, applied once while configuring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureParams {
    pub volts_per_division: f64,
    pub trigger_level_v: f64,
}

impl Default for CaptureParams {
    fn default() -> Self {
        Self {
            volts_per_division: 0.5,
            trigger_level_v: 0.0,
        }
    }
}

/// Acquisition retry policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    pub max_attempts: u32,
    /// Validity ceiling as a gain multiple of the reference amplitude.
    pub gain_ceiling: f64,
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_settle: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Fastest-allowed capture timebase in s/div.
    pub timebase_floor_s: f64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            gain_ceiling: 1000.0,
            settle: Duration::from_millis(100),
            retry_settle: Duration::from_millis(100),
            poll_interval: Duration::from_millis(50),
            timebase_floor_s: 100e-6,
        }
    }
}

fn default_channel_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Settings {
    /// Load configuration from the default file location.
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    /// Load configuration from a specific file path, with `BODE_` environment
    /// overrides merged on top.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("BODE_").split("_"))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject semantically invalid values before any instrument interaction.
    pub fn validate(&self) -> Result<()> {
        if !(self.sweep.start_hz > 0.0) || !(self.sweep.end_hz > self.sweep.start_hz) {
            return Err(SweepError::InvalidRange {
                start: self.sweep.start_hz,
                end: self.sweep.end_hz,
            });
        }
        if !(self.sweep.points_per_decade > 0.0) {
            return Err(SweepError::InvalidDensity(self.sweep.points_per_decade));
        }
        if !(self.sweep.reference_vpp > 0.0) {
            return Err(SweepError::InvalidReference(self.sweep.reference_vpp));
        }
        if self.acquisition.max_attempts < 1 {
            return Err(SweepError::Configuration(
                "acquisition.max_attempts must be at least 1".into(),
            ));
        }
        if !(self.acquisition.gain_ceiling > 0.0) {
            return Err(SweepError::Configuration(format!(
                "acquisition.gain_ceiling must be positive, got {}",
                self.acquisition.gain_ceiling
            )));
        }
        if !(self.capture.volts_per_division > 0.0) {
            return Err(SweepError::Configuration(format!(
                "capture.volts_per_division must be positive, got {}",
                self.capture.volts_per_division
            )));
        }
        Ok(())
    }

    /// Combine the acquisition knobs with the sweep reference amplitude into
    /// the protocol configuration.
    pub fn acquisition_config(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            reference_vpp: self.sweep.reference_vpp,
            gain_ceiling: self.acquisition.gain_ceiling,
            max_attempts: self.acquisition.max_attempts,
            settle: self.acquisition.settle,
            retry_settle: self.acquisition.retry_settle,
            poll_interval: self.acquisition.poll_interval,
            timebase_floor_s: self.acquisition.timebase_floor_s,
        }
    }
}
