//! Siglent SDS-series oscilloscope adapter
//!
//! Drives SDS3000X-class scopes through their native command set (not the Tek
//! compatibility mode). Reply formats this adapter understands:
//!
//! - `TDIV?` -> `2.00E-04S`
//! - `TRIG:STAT?` -> `Stop` once a single-shot capture has completed
//! - `C1:PAVA? PKPK` -> `C1:PAVA PKPK,2.34E+00V`

use async_trait::async_trait;
use log::debug;
use prse::try_parse;
use std::sync::Arc;

use crate::adapters::InstrumentChannel;
use crate::error::Result;
use crate::instrument::CaptureDevice;

pub struct SiglentSds {
    channel: Arc<dyn InstrumentChannel>,
    /// Scope input channel (1-4) the measurement runs on.
    input: u8,
}

impl SiglentSds {
    pub fn new(channel: Arc<dyn InstrumentChannel>) -> Self {
        Self { channel, input: 1 }
    }

    /// Select a scope input other than C1.
    pub fn with_input(mut self, input: u8) -> Self {
        self.input = input;
        self
    }

    /// Parse a `C1:PAVA PKPK,2.34E+00V` reply into volts.
    fn parse_pava(reply: &str) -> Option<f64> {
        let (_, value): (String, f64) = try_parse!(reply.trim(), "{}:PAVA PKPK,{}V").ok()?;
        Some(value)
    }

    /// Parse a `2.00E-04S` timebase reply into seconds/division.
    fn parse_tdiv(reply: &str) -> Option<f64> {
        let trimmed = reply.trim();
        let stripped: std::result::Result<f64, _> = try_parse!(trimmed, "{}S");
        stripped.ok().or_else(|| trimmed.parse().ok())
    }
}

#[async_trait]
impl CaptureDevice for SiglentSds {
    async fn identify(&self) -> Result<String> {
        self.channel.query("*IDN?").await
    }

    async fn configure(&self, volts_per_division: f64, trigger_level: f64) -> Result<()> {
        // AC coupling, 1 MOhm input
        self.channel
            .write(&format!("C{}:CPL A1M", self.input))
            .await?;
        self.channel
            .write(&format!("C{}:VDIV {}V", self.input, volts_per_division))
            .await?;
        self.channel
            .write(&format!("C{}:TRIG_LEVEL {}V", self.input, trigger_level))
            .await?;
        self.channel.write("ACQW SAMPLING").await
    }

    async fn set_timebase(&self, seconds_per_division: f64) -> Result<f64> {
        self.channel
            .write(&format!("TDIV {}", seconds_per_division))
            .await?;
        let reply = self.channel.query("TDIV?").await?;
        let actual = Self::parse_tdiv(&reply).unwrap_or(seconds_per_division);
        debug!(
            "[{}] timebase requested {} s/div, device selected {} s/div",
            self.channel.resource(),
            seconds_per_division,
            actual
        );
        Ok(actual)
    }

    async fn arm_single(&self) -> Result<()> {
        self.channel.write("ARM").await
    }

    async fn clear_measurements(&self) -> Result<()> {
        self.channel.write("PARAMETER_CLR").await
    }

    async fn capture_stopped(&self) -> Result<bool> {
        let status = self.channel.query("TRIG:STAT?").await?;
        Ok(status.trim() == "Stop")
    }

    async fn read_peak_to_peak(&self) -> Result<Option<f64>> {
        let reply = self
            .channel
            .query(&format!("C{}:PAVA? PKPK", self.input))
            .await?;
        Ok(Self::parse_pava(&reply))
    }

    fn resource(&self) -> &str {
        self.channel.resource()
    }

    async fn close(&self) -> Result<()> {
        self.channel.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockChannel;

    #[test]
    fn test_parse_pava() {
        assert_eq!(
            SiglentSds::parse_pava("C1:PAVA PKPK,2.34E+00V\n"),
            Some(2.34)
        );
        assert_eq!(
            SiglentSds::parse_pava("C2:PAVA PKPK,1.05E-02V"),
            Some(0.0105)
        );
        // Overrange and garbage replies are invalid readings, not faults.
        assert_eq!(SiglentSds::parse_pava("C1:PAVA PKPK,****V"), None);
        assert_eq!(SiglentSds::parse_pava("garbage"), None);
    }

    #[test]
    fn test_parse_tdiv() {
        assert_eq!(SiglentSds::parse_tdiv("2.00E-04S\n"), Some(2.0e-4));
        assert_eq!(SiglentSds::parse_tdiv("0.001"), Some(0.001));
        assert_eq!(SiglentSds::parse_tdiv("?"), None);
    }

    #[tokio::test]
    async fn test_timebase_readback_uses_device_value() {
        let chan = MockChannel::new("MOCK::SDS");
        chan.reply_with("TDIV?", "5.00E-04S");
        let scope = SiglentSds::new(Arc::new(chan.clone()));
        let actual = scope.set_timebase(4.2e-4).await.unwrap();
        assert_eq!(actual, 5.0e-4);
        assert_eq!(chan.call_log(), vec!["TDIV 0.00042", "TDIV?"]);
    }

    #[tokio::test]
    async fn test_configure_targets_selected_input() {
        let chan = MockChannel::new("MOCK::SDS");
        let scope = SiglentSds::new(Arc::new(chan.clone())).with_input(2);
        scope.configure(0.5, 0.0).await.unwrap();
        assert_eq!(
            chan.call_log(),
            vec![
                "C2:CPL A1M",
                "C2:VDIV 0.5V",
                "C2:TRIG_LEVEL 0V",
                "ACQW SAMPLING"
            ]
        );
    }

    #[tokio::test]
    async fn test_capture_stopped_matches_stop_reply() {
        let chan = MockChannel::new("MOCK::SDS");
        chan.enqueue_reply("TRIG:STAT?", "Arm");
        chan.enqueue_reply("TRIG:STAT?", "Stop");
        let scope = SiglentSds::new(Arc::new(chan));
        assert!(!scope.capture_stopped().await.unwrap());
        assert!(scope.capture_stopped().await.unwrap());
    }
}
