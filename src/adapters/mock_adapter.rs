//! Mock instrument channel for testing
//!
//! This channel provides a simulated command/response transport so protocol
//! and orchestrator logic can be exercised without physical hardware. It
//! provides:
//! - Scripted replies per command (one-shot FIFO queues and repeating defaults)
//! - Controllable failure injection, including "fail on the Nth match"
//! - Call logging and close counting for test verification
//!
//! The channel is `Clone`; clones share state, so a test can keep a handle for
//! inspection after the orchestrator has taken ownership of the other.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::adapters::InstrumentChannel;
use crate::error::{Result, SweepError};

struct FailRule {
    /// Substring of the command that arms this rule.
    pattern: String,
    /// Number of matching commands to let through before failing.
    remaining: usize,
    /// Once tripped, every further matching command fails too.
    tripped: bool,
}

#[derive(Default)]
struct Script {
    /// One-shot replies, consumed front-to-back per command.
    queued: HashMap<String, VecDeque<String>>,
    /// Fallback replies returned whenever the queue for a command is empty.
    repeating: HashMap<String, String>,
    fail_rules: Vec<FailRule>,
}

/// Mock channel with scripted replies and failure injection.
#[derive(Clone)]
pub struct MockChannel {
    resource: String,
    timeout: Duration,
    script: Arc<Mutex<Script>>,
    call_log: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    close_count: Arc<AtomicUsize>,
}

impl MockChannel {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            timeout: Duration::from_secs(5),
            script: Arc::new(Mutex::new(Script::default())),
            call_log: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            close_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a one-shot reply for `command`. Multiple calls build a FIFO.
    pub fn enqueue_reply(&self, command: &str, reply: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(command.to_string())
            .or_default()
            .push_back(reply.to_string());
        self
    }

    /// Set the repeating fallback reply for `command`.
    pub fn reply_with(&self, command: &str, reply: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .repeating
            .insert(command.to_string(), reply.to_string());
        self
    }

    /// Fail every write/query whose command contains `pattern`.
    pub fn fail_on(&self, pattern: &str) -> &Self {
        self.fail_on_nth(pattern, 0)
    }

    /// Let `skip` commands containing `pattern` through, then fail that and
    /// every later match.
    pub fn fail_on_nth(&self, pattern: &str, skip: usize) -> &Self {
        self.script.lock().unwrap().fail_rules.push(FailRule {
            pattern: pattern.to_string(),
            remaining: skip,
            tripped: false,
        });
        self
    }

    /// Commands seen so far, in order.
    pub fn call_log(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of commands containing `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.contains(pattern))
            .count()
    }

    /// How many times `close` has been called.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check(&self, command: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SweepError::communication(&self.resource, "channel closed"));
        }
        let mut script = self.script.lock().unwrap();
        for rule in script.fail_rules.iter_mut() {
            if !command.contains(&rule.pattern) {
                continue;
            }
            if rule.tripped || rule.remaining == 0 {
                rule.tripped = true;
                return Err(SweepError::communication(
                    &self.resource,
                    format!("injected failure on '{}'", command),
                ));
            }
            rule.remaining -= 1;
        }
        Ok(())
    }

    fn next_reply(&self, command: &str) -> String {
        let mut script = self.script.lock().unwrap();
        if let Some(queue) = script.queued.get_mut(command) {
            if let Some(reply) = queue.pop_front() {
                return reply;
            }
        }
        if let Some(reply) = script.repeating.get(command) {
            return reply.clone();
        }
        format!("MOCK_RESPONSE: {}", command)
    }
}

#[async_trait]
impl InstrumentChannel for MockChannel {
    async fn write(&self, command: &str) -> Result<()> {
        self.call_log.lock().unwrap().push(command.to_string());
        self.check(command)
    }

    async fn query(&self, command: &str) -> Result<String> {
        self.call_log.lock().unwrap().push(command.to_string());
        self.check(command)?;
        Ok(self.next_reply(command))
    }

    async fn close(&self) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resource(&self) -> &str {
        &self.resource
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_reply_echoes_command() {
        let chan = MockChannel::new("MOCK::0");
        let reply = chan.query("*IDN?").await.unwrap();
        assert_eq!(reply, "MOCK_RESPONSE: *IDN?");
    }

    #[tokio::test]
    async fn test_queued_replies_drain_before_repeating() {
        let chan = MockChannel::new("MOCK::0");
        chan.reply_with("TRIG:STAT?", "Stop");
        chan.enqueue_reply("TRIG:STAT?", "Arm");
        assert_eq!(chan.query("TRIG:STAT?").await.unwrap(), "Arm");
        assert_eq!(chan.query("TRIG:STAT?").await.unwrap(), "Stop");
        assert_eq!(chan.query("TRIG:STAT?").await.unwrap(), "Stop");
    }

    #[tokio::test]
    async fn test_fail_on_nth_match() {
        let chan = MockChannel::new("MOCK::0");
        chan.fail_on_nth("FREQ", 2);
        assert!(chan.write("FREQ 10").await.is_ok());
        assert!(chan.write("VOLT 1").await.is_ok());
        assert!(chan.write("FREQ 20").await.is_ok());
        assert!(chan.write("FREQ 30").await.is_err());
        // Once tripped, stays tripped.
        assert!(chan.write("FREQ 40").await.is_err());
    }

    #[tokio::test]
    async fn test_close_counting_and_clone_sharing() {
        let chan = MockChannel::new("MOCK::0");
        let observer = chan.clone();
        chan.close().await.unwrap();
        chan.close().await.unwrap();
        assert_eq!(observer.close_count(), 2);
        assert!(observer.is_closed());
        assert!(chan.write("FREQ 10").await.is_err());
    }

    #[tokio::test]
    async fn test_call_log() {
        let chan = MockChannel::new("MOCK::0");
        chan.write("FUNC SIN").await.unwrap();
        chan.query("FREQ?").await.unwrap();
        assert_eq!(chan.call_log(), vec!["FUNC SIN", "FREQ?"]);
        assert_eq!(chan.count_matching("FREQ"), 1);
    }
}
