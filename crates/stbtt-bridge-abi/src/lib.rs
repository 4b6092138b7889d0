// All extern "C" exports accept raw pointers from C callers; the contract for
// each is the C one documented in include/stb_bridge.h.
#![allow(clippy::missing_safety_doc)]
//! # stbtt-bridge-abi
//!
//! extern "C" boundary that stb_truetype is compiled against.
//!
//! This crate produces a `cdylib` exposing the six `stb_zig_*` symbols that the
//! `STBTT_*` macros in `include/stb_bridge.h` expand to, plus two extension
//! entry points for installing a host allocator and reading counters.
//!
//! # Architecture
//!
//! ```text
//! stb_truetype -> STBTT_* macro -> stb_zig_* (this crate) -> membrane policy -> host / core impl
//! ```
//!
//! In **strict** mode the bridge keeps C semantics but refuses to turn
//! detectable misuse (null arguments, double or foreign release) into
//! undefined behavior.
//!
//! In **hardened** mode it additionally clamps copies and fills to known
//! allocation bounds, performs overlapping copies as moves, and bounds string
//! scans to the allocation they start in.
//!
//! A failed `STBTT_assert` aborts the process in every mode.
//!
//! Unlike a libc replacement, none of these symbols shadow the C library, so
//! every module is available in test builds.

#[macro_use]
mod macros;

mod host_state;

pub mod assert_abi;
pub mod bridge_abi;
pub mod malloc_abi;
pub mod string_abi;

pub use bridge_abi::{StbBridgeHostVTable, StbBridgeStats};
pub use host_state::{active_host_name, install_host, stats};
