//! Custom error types for the application.
//!
//! This module defines the primary error type, `SweepError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and consistent
//! way to handle the different kinds of failures a sweep can hit, from invalid
//! plan parameters to instrument communication faults.
//!
//! ## Error Taxonomy
//!
//! - **`InvalidRange` / `InvalidDensity` / `InvalidReference` / `Configuration`**:
//!   configuration errors, rejected synchronously before any instrument
//!   interaction.
//! - **`Connection` / `Communication`**: channel-level faults (open, write,
//!   query, timeout). These are fatal to a running sweep; the orchestrator
//!   releases every channel and preserves the partial result series.
//! - **`Cancelled`**: cooperative cancellation was observed mid-sweep. Not a
//!   fault; the partial series is returned with status `Cancelled`.
//!
//! Measurement-validity failures (unparseable or out-of-bounds readings) are
//! deliberately *not* represented here. They are recovered locally by the
//! acquisition retry policy and surface only as warnings and a `degraded` flag.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, SweepError>;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("invalid frequency range: start {start} Hz, end {end} Hz (need 0 < start < end)")]
    InvalidRange { start: f64, end: f64 },

    #[error("invalid plan density: {0} points per decade (need > 0)")]
    InvalidDensity(f64),

    #[error("invalid reference amplitude: {0} Vpp (need > 0)")]
    InvalidReference(f64),

    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("configuration validation error: {0}")]
    Configuration(String),

    #[error("failed to open instrument at '{resource}': {message}")]
    Connection { resource: String, message: String },

    #[error("instrument communication error ({resource}): {message}")]
    Communication { resource: String, message: String },

    #[error("sweep cancelled")]
    Cancelled,
}

impl SweepError {
    /// Build a communication error for the given channel resource.
    pub fn communication(resource: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SweepError::Communication {
            resource: resource.into(),
            message: message.to_string(),
        }
    }

    /// True for channel-level faults that must abort a running sweep.
    pub fn is_fatal_to_sweep(&self) -> bool {
        matches!(
            self,
            SweepError::Connection { .. } | SweepError::Communication { .. }
        )
    }
}
