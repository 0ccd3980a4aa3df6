//! Keysight/Agilent 33500B-series waveform generator adapter
//!
//! Standard SCPI source commands (FUNC/FREQ/VOLT/OUTP), as spoken by the
//! 33511B and friends. Amplitude is programmed in Vpp; offset and phase are
//! zeroed at configure time so the excitation is a pure sine around ground.

use async_trait::async_trait;
use std::sync::Arc;

use crate::adapters::InstrumentChannel;
use crate::error::Result;
use crate::instrument::ExcitationSource;

pub struct Keysight33500 {
    channel: Arc<dyn InstrumentChannel>,
}

impl Keysight33500 {
    pub fn new(channel: Arc<dyn InstrumentChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ExcitationSource for Keysight33500 {
    async fn identify(&self) -> Result<String> {
        self.channel.query("*IDN?").await
    }

    async fn configure_sine(&self, amplitude_vpp: f64) -> Result<()> {
        self.channel.write("FUNC SIN").await?;
        self.channel
            .write(&format!("VOLT {}", amplitude_vpp))
            .await?;
        self.channel.write("VOLT:OFFS 0").await?;
        self.channel.write("PHAS 0").await
    }

    async fn set_frequency(&self, hz: f64) -> Result<()> {
        self.channel.write(&format!("FREQ {}", hz)).await
    }

    async fn enable_output(&self) -> Result<()> {
        self.channel.write("OUTP ON").await
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

    #[tokio::test]
    async fn test_sine_setup_zeroes_offset_and_phase() {
        let chan = MockChannel::new("MOCK::33511B");
        let source = Keysight33500::new(Arc::new(chan.clone()));
        source.configure_sine(0.01).await.unwrap();
        source.set_frequency(10.0).await.unwrap();
        source.enable_output().await.unwrap();
        assert_eq!(
            chan.call_log(),
            vec![
                "FUNC SIN",
                "VOLT 0.01",
                "VOLT:OFFS 0",
                "PHAS 0",
                "FREQ 10",
                "OUTP ON"
            ]
        );
    }
}
