//! Contract harness for the stb_truetype bridge.
//!
//! This crate provides:
//! - Contract checks: drive every exported `stb_zig_*` symbol through its C
//!   contract in a chosen mode, and collect a machine-readable report
//! - Assert probe: a subprocess entry point for checking that a failed
//!   assertion terminates the process
//! - Structured logging: JSONL run logs plus a SHA-256 artifact index

#![deny(unsafe_code)]

pub mod contract;
pub mod error;
pub mod structured_log;

pub use contract::{CheckResult, ContractReport, run_contract};
pub use error::HarnessError;
