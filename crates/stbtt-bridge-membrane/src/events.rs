//! Structured bridge events.
//!
//! Events at or above the configured threshold (`STBTT_BRIDGE_LOG`) are
//! serialized as one JSON object per line to the active sink (stderr unless
//! redirected with [`set_writer`]) and retained in a bounded in-memory ring.

use std::collections::VecDeque;
use std::io::Write;

use parking_lot::{Mutex, const_mutex};
use serde::{Deserialize, Serialize};

use crate::config::{LogLevel, log_level, safety_level};

/// Number of events retained for [`recent_events`].
pub const RING_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeEvent {
    pub timestamp_ms: u64,
    pub level: LogLevel,
    pub event: String,
    pub symbol: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healing_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl BridgeEvent {
    #[must_use]
    pub fn new(level: LogLevel, event: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            timestamp_ms: now_ms(),
            level,
            event: event.into(),
            symbol: symbol.into(),
            mode: safety_level().as_str().to_string(),
            size: None,
            addr: None,
            healing_action: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size as u64);
        self
    }

    #[must_use]
    pub fn with_addr(mut self, addr: usize) -> Self {
        self.addr = Some(format!("{addr:#x}"));
        self
    }

    #[must_use]
    pub fn with_healing_action(mut self, action: impl Into<String>) -> Self {
        self.healing_action = Some(action.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

struct EventLog {
    ring: VecDeque<BridgeEvent>,
    writer: Option<Box<dyn Write + Send>>,
}

static EVENT_LOG: Mutex<EventLog> = const_mutex(EventLog {
    ring: VecDeque::new(),
    writer: None,
});

/// Returns true if an event at `level` would be recorded.
#[must_use]
pub fn enabled(level: LogLevel) -> bool {
    let threshold = log_level();
    threshold != LogLevel::Off && level >= threshold
}

/// Record an event if it passes the threshold.
pub fn emit(event: BridgeEvent) {
    if !enabled(event.level) {
        return;
    }
    let line = event.to_jsonl().ok();
    let mut log = EVENT_LOG.lock();
    if let Some(line) = line {
        // Sink failures are dropped; the bridge has no channel to report them.
        match log.writer.as_mut() {
            Some(writer) => {
                let _ = writeln!(writer, "{line}");
                let _ = writer.flush();
            }
            None => {
                let _ = writeln!(std::io::stderr().lock(), "{line}");
            }
        }
    }
    if log.ring.len() == RING_CAPACITY {
        log.ring.pop_front();
    }
    log.ring.push_back(event);
}

/// Redirect event output. `None` restores stderr.
pub fn set_writer(writer: Option<Box<dyn Write + Send>>) {
    let mut log = EVENT_LOG.lock();
    if let Some(previous) = log.writer.as_mut() {
        let _ = previous.flush();
    }
    log.writer = writer;
}

/// Events retained in the ring, oldest first.
#[must_use]
pub fn recent_events() -> Vec<BridgeEvent> {
    EVENT_LOG.lock().ring.iter().cloned().collect()
}

pub fn clear_recent_events() {
    EVENT_LOG.lock().ring.clear();
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
