//! Rigol DS1000Z-series oscilloscope adapter
//!
//! The DS1000Z speaks conventional SCPI: `:TIM:SCAL?` and
//! `:MEAS:ITEM? VPP,CHAN1` reply with a bare number in scientific notation,
//! and `TRIG:STAT?` reports `STOP` (upper case, unlike the Siglent) once a
//! single-shot capture has completed.
//!
//! These scopes occasionally produce wild peak-to-peak readings right after
//! re-triggering; the retry policy in `sweep::acquire` exists largely because
//! of them.

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use crate::adapters::InstrumentChannel;
use crate::error::Result;
use crate::instrument::CaptureDevice;

pub struct RigolDs1000z {
    channel: Arc<dyn InstrumentChannel>,
    input: u8,
}

impl RigolDs1000z {
    pub fn new(channel: Arc<dyn InstrumentChannel>) -> Self {
        Self { channel, input: 1 }
    }

    /// Select a scope input other than CHAN1.
    pub fn with_input(mut self, input: u8) -> Self {
        self.input = input;
        self
    }
}

#[async_trait]
impl CaptureDevice for RigolDs1000z {
    async fn identify(&self) -> Result<String> {
        self.channel.query("*IDN?").await
    }

    async fn configure(&self, volts_per_division: f64, trigger_level: f64) -> Result<()> {
        self.channel
            .write(&format!(":CHAN{}:COUP AC", self.input))
            .await?;
        self.channel
            .write(&format!(":CHAN{}:SCAL {}", self.input, volts_per_division))
            .await?;
        self.channel
            .write(&format!(":TRIGger:EDGE:LEV {}", trigger_level))
            .await?;
        self.channel.write("ACQ:TYPE NORM").await
    }

    async fn set_timebase(&self, seconds_per_division: f64) -> Result<f64> {
        self.channel
            .write(&format!(":TIM:SCAL {}", seconds_per_division))
            .await?;
        let reply = self.channel.query(":TIM:SCAL?").await?;
        let actual = reply.trim().parse().unwrap_or(seconds_per_division);
        debug!(
            "[{}] timebase requested {} s/div, device selected {} s/div",
            self.channel.resource(),
            seconds_per_division,
            actual
        );
        Ok(actual)
    }

    async fn arm_single(&self) -> Result<()> {
        self.channel.write("SING").await
    }

    async fn clear_measurements(&self) -> Result<()> {
        self.channel.write(":MEAS:CLEAR").await
    }

    async fn capture_stopped(&self) -> Result<bool> {
        let status = self.channel.query("TRIG:STAT?").await?;
        Ok(status.trim() == "STOP")
    }

    async fn read_peak_to_peak(&self) -> Result<Option<f64>> {
        let reply = self
            .channel
            .query(&format!(":MEAS:ITEM? VPP,CHAN{}", self.input))
            .await?;
        Ok(reply.trim().parse().ok())
    }

    fn resource(&self) -> &str {
        self.channel.resource()
    }

    async fn close(&self) -> Result<()> {
        self.channel.close().await
    }
}
