//! Runtime configuration.
//!
//! The runtime mode is set via the `STBTT_BRIDGE_MODE` environment variable:
//! - `strict` (default): C-compatible return conventions. Allocations are
//!   tracked so misuse is detected and reported, but lengths are never rewritten.
//! - `hardened`: repair mode. Copy/fill lengths are clamped to known allocation
//!   bounds, overlapping copies become moves, and string scans stay inside the
//!   allocation they start in.
//! - `off`: no tracking. Pure passthrough to the system allocator, reachable only
//!   through [`set_safety_level`].
//!
//! The event threshold is set via `STBTT_BRIDGE_LOG`
//! (`off|error|warn|info|debug|trace`, default `warn`).

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Environment variable selecting the runtime mode.
pub const MODE_ENV: &str = "STBTT_BRIDGE_MODE";

/// Environment variable selecting the event threshold.
pub const LOG_ENV: &str = "STBTT_BRIDGE_LOG";

/// Runtime operating mode for the bridge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    /// Tracked allocations, C return conventions, no length rewriting.
    #[default]
    Strict,
    /// Tracked allocations plus deterministic healing of unsafe lengths.
    Hardened,
    /// No tracking. Passthrough for benchmarking baselines.
    Off,
}

impl SafetyLevel {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "strict" | "default" => Self::Strict,
            "hardened" | "repair" => Self::Hardened,
            "off" | "none" | "disabled" => Self::Off,
            _ => Self::Strict,
        }
    }

    /// Returns true if healing actions should be applied.
    #[must_use]
    pub const fn heals_enabled(self) -> bool {
        matches!(self, Self::Hardened)
    }

    /// Returns true if allocations go through the tracked arena.
    #[must_use]
    pub const fn tracking_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Hardened => "hardened",
            Self::Off => "off",
        }
    }
}

/// Severity threshold for bridge events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Off,
}

impl LogLevel {
    /// Parse from string (case-insensitive). Unknown values fall back to `Warn`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            "fatal" => Self::Fatal,
            "off" | "none" | "0" => Self::Off,
            _ => Self::Warn,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Off => "off",
        }
    }
}

// Atomic caches: 0=unresolved, 255=resolving, otherwise an encoded value.
// A non-blocking state machine instead of OnceLock: a reentrant call arriving
// while std::env::var() runs must see a default, not wait on itself.
static CACHED_LEVEL: AtomicU8 = AtomicU8::new(0);
static CACHED_LOG: AtomicU8 = AtomicU8::new(0);

const UNRESOLVED: u8 = 0;
const RESOLVING: u8 = 255;

const LEVEL_STRICT: u8 = 1;
const LEVEL_HARDENED: u8 = 2;
const LEVEL_OFF: u8 = 3;

fn parse_runtime_mode_env(raw: &str) -> SafetyLevel {
    match raw.to_ascii_lowercase().as_str() {
        "hardened" | "repair" => SafetyLevel::Hardened,
        // Environment contract is strict|hardened only; `Off` stays an API-level switch.
        _ => SafetyLevel::Strict,
    }
}

fn level_to_u8(level: SafetyLevel) -> u8 {
    match level {
        SafetyLevel::Strict => LEVEL_STRICT,
        SafetyLevel::Hardened => LEVEL_HARDENED,
        SafetyLevel::Off => LEVEL_OFF,
    }
}

fn u8_to_level(v: u8) -> SafetyLevel {
    match v {
        LEVEL_HARDENED => SafetyLevel::Hardened,
        LEVEL_OFF => SafetyLevel::Off,
        _ => SafetyLevel::Strict,
    }
}

fn log_to_u8(level: LogLevel) -> u8 {
    level as u8 + 1
}

fn u8_to_log(v: u8) -> LogLevel {
    match v {
        1 => LogLevel::Trace,
        2 => LogLevel::Debug,
        3 => LogLevel::Info,
        5 => LogLevel::Error,
        6 => LogLevel::Fatal,
        7 => LogLevel::Off,
        _ => LogLevel::Warn,
    }
}

/// Resolve a cached value, reading `env` on first use.
///
/// Returns `None` while another caller is resolving the same cell.
fn resolve_cached(cell: &AtomicU8, env: &str, parse: impl FnOnce(Option<String>) -> u8) -> Option<u8> {
    let cached = cell.load(Ordering::Acquire);
    if cached != UNRESOLVED && cached != RESOLVING {
        return Some(cached);
    }
    if cached == RESOLVING {
        return None;
    }
    if cell
        .compare_exchange(UNRESOLVED, RESOLVING, Ordering::SeqCst, Ordering::Relaxed)
        .is_err()
    {
        let v = cell.load(Ordering::Acquire);
        return (v != UNRESOLVED && v != RESOLVING).then_some(v);
    }
    let value = parse(std::env::var(env).ok());
    // A concurrent override wins over the environment.
    let _ = cell.compare_exchange(RESOLVING, value, Ordering::AcqRel, Ordering::Relaxed);
    Some(cell.load(Ordering::Acquire))
}

/// Get the configured safety level (reads the environment on first call).
///
/// During resolution, reentrant callers get `Strict`.
#[must_use]
pub fn safety_level() -> SafetyLevel {
    resolve_cached(&CACHED_LEVEL, MODE_ENV, |raw| {
        level_to_u8(raw.map(|v| parse_runtime_mode_env(&v)).unwrap_or_default())
    })
    .map_or(SafetyLevel::Strict, u8_to_level)
}

/// Override the safety level for the rest of the process.
pub fn set_safety_level(level: SafetyLevel) {
    CACHED_LEVEL.store(level_to_u8(level), Ordering::Release);
}

/// Get the configured event threshold (reads the environment on first call).
#[must_use]
pub fn log_level() -> LogLevel {
    resolve_cached(&CACHED_LOG, LOG_ENV, |raw| {
        log_to_u8(raw.map_or(LogLevel::Warn, |v| LogLevel::from_str_loose(&v)))
    })
    .map_or(LogLevel::Warn, u8_to_log)
}

/// Override the event threshold for the rest of the process.
pub fn set_log_level(level: LogLevel) {
    CACHED_LOG.store(log_to_u8(level), Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_safety_levels() {
        assert_eq!(SafetyLevel::from_str_loose("strict"), SafetyLevel::Strict);
        assert_eq!(SafetyLevel::from_str_loose("STRICT"), SafetyLevel::Strict);
        assert_eq!(SafetyLevel::from_str_loose("default"), SafetyLevel::Strict);
        assert_eq!(
            SafetyLevel::from_str_loose("hardened"),
            SafetyLevel::Hardened
        );
        assert_eq!(SafetyLevel::from_str_loose("repair"), SafetyLevel::Hardened);
        assert_eq!(SafetyLevel::from_str_loose("off"), SafetyLevel::Off);
        assert_eq!(SafetyLevel::from_str_loose("bogus"), SafetyLevel::Strict);
    }

    #[test]
    fn runtime_mode_parser_is_strict_or_hardened_only() {
        assert_eq!(parse_runtime_mode_env("strict"), SafetyLevel::Strict);
        assert_eq!(parse_runtime_mode_env("hardened"), SafetyLevel::Hardened);
        assert_eq!(parse_runtime_mode_env("REPAIR"), SafetyLevel::Hardened);
        assert_eq!(parse_runtime_mode_env("off"), SafetyLevel::Strict);
        assert_eq!(parse_runtime_mode_env("bogus"), SafetyLevel::Strict);
    }

    #[test]
    fn healing_only_in_hardened() {
        assert!(!SafetyLevel::Strict.heals_enabled());
        assert!(SafetyLevel::Hardened.heals_enabled());
        assert!(!SafetyLevel::Off.heals_enabled());
    }

    #[test]
    fn tracking_except_off() {
        assert!(SafetyLevel::Strict.tracking_enabled());
        assert!(SafetyLevel::Hardened.tracking_enabled());
        assert!(!SafetyLevel::Off.tracking_enabled());
    }

    #[test]
    fn log_levels_are_ordered_by_severity() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Fatal < LogLevel::Off);
        assert_eq!(LogLevel::from_str_loose("WARNING"), LogLevel::Warn);
        assert_eq!(LogLevel::from_str_loose("none"), LogLevel::Off);
        assert_eq!(LogLevel::from_str_loose("loud"), LogLevel::Warn);
    }

    #[test]
    fn log_level_encoding_round_trips() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
            LogLevel::Fatal,
            LogLevel::Off,
        ] {
            assert_eq!(u8_to_log(log_to_u8(level)), level);
        }
    }

    #[test]
    fn resolving_state_returns_default() {
        let cell = AtomicU8::new(RESOLVING);
        assert_eq!(resolve_cached(&cell, MODE_ENV, |_| LEVEL_HARDENED), None);
        assert_eq!(cell.load(Ordering::SeqCst), RESOLVING);
    }

    #[test]
    fn first_resolution_is_sticky() {
        let cell = AtomicU8::new(UNRESOLVED);
        assert_eq!(
            resolve_cached(&cell, "STBTT_BRIDGE_TEST_UNSET_VAR", |raw| {
                assert!(raw.is_none());
                LEVEL_HARDENED
            }),
            Some(LEVEL_HARDENED)
        );
        assert_eq!(
            resolve_cached(&cell, "STBTT_BRIDGE_TEST_UNSET_VAR", |_| LEVEL_OFF),
            Some(LEVEL_HARDENED)
        );
    }
}
