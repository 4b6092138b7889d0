//! Membrane for the stb_truetype allocator/utility bridge.
//!
//! Everything the C entry points need besides the raw pointer plumbing lives
//! here:
//! - **Configuration** (`config`): runtime mode and log threshold
//! - **Allocation fingerprints** (`fingerprint`): BLAKE3-derived header and canary
//! - **Tracked arena** (`arena`): generation counters and a quarantine queue
//! - **Host allocators** (`host`): the `HostAllocator` seam and its implementations
//! - **Healing policy** (`heal`): deterministic repairs applied in hardened mode
//! - **Metrics** (`metrics`): relaxed atomic counters per entry point
//! - **Events** (`events`): structured JSONL bridge events
//! - **Errors** (`error`): `BridgeError`

#![deny(unsafe_code)]

pub mod arena;
pub mod config;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod heal;
pub mod host;
pub mod metrics;

pub use arena::{AllocationArena, ArenaStats, FreeResult, SlotState};
pub use config::{LogLevel, SafetyLevel};
pub use error::BridgeError;
pub use heal::{HealingAction, HealingPolicy};
pub use host::{ArenaHost, CallbackHost, FnHost, HostAllocator, SystemHost, UserData};
pub use metrics::{BridgeMetrics, MetricsSnapshot};
