//! Keysight E36200-series DC supply adapter
//!
//! Powers the circuit under test during a sweep. VOLT/CURR/OUTP are common to
//! most SCPI supplies, so this adapter also covers the E36100/E36300 families.

use async_trait::async_trait;
use std::sync::Arc;

use crate::adapters::InstrumentChannel;
use crate::error::Result;
use crate::instrument::BiasSupply;

pub struct KeysightE36200 {
    channel: Arc<dyn InstrumentChannel>,
}

impl KeysightE36200 {
    pub fn new(channel: Arc<dyn InstrumentChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl BiasSupply for KeysightE36200 {
    async fn identify(&self) -> Result<String> {
        self.channel.query("*IDN?").await
    }

    async fn apply(&self, volts: f64, current_limit_a: f64) -> Result<()> {
        self.channel.write(&format!("VOLT {}", volts)).await?;
        self.channel
            .write(&format!("CURR {}", current_limit_a))
            .await
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
    async fn test_apply_programs_voltage_then_limit() {
        let chan = MockChannel::new("MOCK::E36234A");
        let supply = KeysightE36200::new(Arc::new(chan.clone()));
        supply.apply(5.0, 1.0).await.unwrap();
        supply.enable_output().await.unwrap();
        assert_eq!(chan.call_log(), vec!["VOLT 5", "CURR 1", "OUTP ON"]);
    }
}
