//! VISA instrument channel for GPIB/USB/Ethernet bench instruments
//!
//! Wraps the `visa-rs` crate and provides async I/O by executing the
//! synchronous VISA calls on Tokio's blocking task executor.
//!
//! Supports resource strings like:
//! - "TCPIP0::192.168.1.22::INSTR" (Ethernet/LXI)
//! - "USB0::0x1234::0x5678::SERIAL::INSTR" (USB)
//! - "GPIB0::1::INSTR" (GPIB interface)

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use visa_rs::{DefaultRM, Instrument, VISA};

use crate::adapters::InstrumentChannel;
use crate::error::{Result, SweepError};

/// Channel to one VISA instrument.
///
/// The VISA session lives behind `Arc<Mutex>` so blocking I/O closures can own
/// a handle; `close` drops the session and is idempotent.
pub struct VisaChannel {
    resource: String,
    timeout: Duration,
    /// Line terminator appended to every command ("\n" for SCPI).
    line_terminator: String,
    session: Mutex<Option<Arc<Mutex<Box<dyn Instrument>>>>>,
}

impl VisaChannel {
    /// Open a VISA session to `resource`.
    pub async fn open(resource: &str, timeout: Duration) -> Result<Self> {
        let resource_owned = resource.to_string();
        let timeout_ms = timeout.as_millis() as u32;

        let instrument = tokio::task::spawn_blocking(move || {
            let rm = DefaultRM::new().map_err(|e| e.to_string())?;
            rm.open(&resource_owned, timeout_ms, 0)
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| SweepError::Connection {
            resource: resource.to_string(),
            message: format!("VISA open task panicked: {}", e),
        })?
        .map_err(|message| SweepError::Connection {
            resource: resource.to_string(),
            message,
        })?;

        debug!(
            "VISA resource '{}' opened with {}ms timeout",
            resource,
            timeout.as_millis()
        );

        Ok(Self {
            resource: resource.to_string(),
            timeout,
            line_terminator: "\n".to_string(),
            session: Mutex::new(Some(Arc::new(Mutex::new(instrument)))),
        })
    }

    /// Set the line terminator appended to commands.
    pub fn with_line_terminator(mut self, terminator: &str) -> Self {
        self.line_terminator = terminator.to_string();
        self
    }

    async fn session(&self) -> Result<Arc<Mutex<Box<dyn Instrument>>>> {
        self.session
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or_else(|| SweepError::communication(&self.resource, "channel closed"))
    }
}

#[async_trait]
impl InstrumentChannel for VisaChannel {
    async fn write(&self, command: &str) -> Result<()> {
        let session = self.session().await?;
        let command_str = format!("{}{}", command, self.line_terminator);
        let command_for_log = command.to_string();
        let timeout_ms = self.timeout.as_millis() as u32;

        let outcome = tokio::task::spawn_blocking(move || {
            let mut guard = session.blocking_lock();
            guard.set_timeout(timeout_ms).map_err(|e| e.to_string())?;
            guard.write(&command_str).map_err(|e| e.to_string())?;
            debug!("VISA write sent: {}", command_for_log.trim());
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| SweepError::communication(&self.resource, format!("I/O task panicked: {}", e)))?;

        outcome.map_err(|message| SweepError::communication(&self.resource, message))
    }

    async fn query(&self, command: &str) -> Result<String> {
        let session = self.session().await?;
        let command_str = format!("{}{}", command, self.line_terminator);
        let command_for_log = command.to_string();
        let timeout_ms = self.timeout.as_millis() as u32;

        let outcome = tokio::task::spawn_blocking(move || {
            let mut guard = session.blocking_lock();
            guard.set_timeout(timeout_ms).map_err(|e| e.to_string())?;
            let reply = guard.query(&command_str).map_err(|e| e.to_string())?;
            let reply = reply.trim().to_string();
            debug!("VISA query '{}' -> '{}'", command_for_log.trim(), reply);
            Ok::<String, String>(reply)
        })
        .await
        .map_err(|e| SweepError::communication(&self.resource, format!("I/O task panicked: {}", e)))?;

        outcome.map_err(|message| SweepError::communication(&self.resource, message))
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        if guard.take().is_some() {
            debug!("VISA resource '{}' closed", self.resource);
        }
        Ok(())
    }

    fn resource(&self) -> &str {
        &self.resource
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
