//! Instrument channel implementations
//!
//! This module defines the [`InstrumentChannel`] trait, the low-level I/O
//! abstraction every device adapter is built on, together with its
//! implementations: a VISA-backed channel for real bench instruments and a
//! scripted mock channel for tests.
//!
//! A channel knows how to deliver a textual command and collect a textual
//! reply within a per-call timeout. It carries no retry policy and no
//! knowledge of any command dialect; both live in higher layers.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

pub mod mock_adapter;
#[cfg(feature = "instrument_visa")]
pub mod visa_adapter;

pub use mock_adapter::MockChannel;
#[cfg(feature = "instrument_visa")]
pub use visa_adapter::VisaChannel;

/// Command/response channel to one physical instrument.
///
/// Implementations take care of transport details (line terminators, blocking
/// I/O offloading, timeouts). All failures surface as
/// [`SweepError::Communication`](crate::error::SweepError::Communication) with
/// the channel's resource string attached.
#[async_trait]
pub trait InstrumentChannel: Send + Sync {
    /// Send a command without expecting a reply.
    async fn write(&self, command: &str) -> Result<()>;

    /// Send a command and wait for a single reply line.
    ///
    /// The reply is returned trimmed of the line terminator. A reply that does
    /// not arrive within the channel timeout is a communication error.
    async fn query(&self, command: &str) -> Result<String>;

    /// Release the underlying transport. Idempotent, best-effort.
    async fn close(&self) -> Result<()>;

    /// Resource string identifying the instrument (e.g.
    /// "TCPIP0::192.168.1.22::INSTR").
    fn resource(&self) -> &str;

    /// Per-call I/O timeout.
    fn timeout(&self) -> Duration;
}
