//! Bridge contract checks.
//!
//! Each check calls the exported symbols exactly as stb_truetype would and
//! compares what it observes against the documented C contract. Checks that
//! depend on allocation tracking or healing are skipped when the active host
//! or mode cannot provide them.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use stbtt_bridge_abi::assert_abi::stb_zig_assert;
use stbtt_bridge_abi::malloc_abi::{stb_zig_free, stb_zig_malloc};
use stbtt_bridge_abi::string_abi::{stb_zig_memcpy, stb_zig_memset, stb_zig_strlen};
use stbtt_bridge_abi::{active_host_name, stats};
use stbtt_bridge_membrane::config::set_safety_level;
use stbtt_bridge_membrane::events::{self, BridgeEvent};
use stbtt_bridge_membrane::{MetricsSnapshot, SafetyLevel};

use crate::structured_log::Outcome;

type CheckFn = fn() -> Result<Outcome, String>;

struct Check {
    id: &'static str,
    symbol: &'static str,
    run: CheckFn,
}

const CHECKS: &[Check] = &[
    Check { id: "alloc.usable_size", symbol: "stb_zig_malloc", run: alloc_usable_size },
    Check { id: "alloc.zero_size_unique", symbol: "stb_zig_malloc", run: alloc_zero_size_unique },
    Check { id: "free.no_leak", symbol: "stb_zig_free", run: free_no_leak },
    Check { id: "free.null_noop", symbol: "stb_zig_free", run: free_null_noop },
    Check { id: "free.double_detected", symbol: "stb_zig_free", run: free_double_detected },
    Check { id: "assert.true_returns", symbol: "stb_zig_assert", run: assert_true_returns },
    Check { id: "strlen.terminated_length", symbol: "stb_zig_strlen", run: strlen_terminated_length },
    Check { id: "strlen.null_zero", symbol: "stb_zig_strlen", run: strlen_null_zero },
    Check { id: "memcpy.prefix_equal", symbol: "stb_zig_memcpy", run: memcpy_prefix_equal },
    Check { id: "memcpy.null_returns_null", symbol: "stb_zig_memcpy", run: memcpy_null_returns_null },
    Check { id: "memset.low_byte", symbol: "stb_zig_memset", run: memset_low_byte },
    Check { id: "hardened.copy_clamped", symbol: "stb_zig_memcpy", run: hardened_copy_clamped },
    Check { id: "hardened.overlap_move", symbol: "stb_zig_memcpy", run: hardened_overlap_move },
];

/// Outcome of one contract check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: String,
    pub symbol: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_us: u64,
    /// Healing actions the bridge applied while the check ran.
    pub heals: u64,
}

/// Results of a full contract run in one mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractReport {
    pub mode: SafetyLevel,
    pub host: Option<String>,
    pub results: Vec<CheckResult>,
    pub stats: MetricsSnapshot,
    /// Bridge events recorded during the run (bounded by the event ring).
    pub events: Vec<BridgeEvent>,
}

impl ContractReport {
    #[must_use]
    pub fn failures(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Fail | Outcome::Error))
            .count()
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures() == 0
    }
}

/// Identifiers of every check, in run order.
#[must_use]
pub fn check_ids() -> Vec<&'static str> {
    CHECKS.iter().map(|c| c.id).collect()
}

/// Run every check under `mode`.
///
/// Bridge events are captured in the report instead of going to stderr.
pub fn run_contract(mode: SafetyLevel) -> ContractReport {
    set_safety_level(mode);
    events::set_writer(Some(Box::new(std::io::sink())));
    events::clear_recent_events();

    let results = CHECKS
        .iter()
        .map(|check| {
            let heals_before = stats().heals;
            let start = Instant::now();
            let (outcome, message) = match (check.run)() {
                Ok(outcome) => (outcome, None),
                Err(message) => (Outcome::Fail, Some(message)),
            };
            CheckResult {
                id: check.id.to_string(),
                symbol: check.symbol.to_string(),
                outcome,
                message,
                duration_us: start.elapsed().as_micros() as u64,
                heals: stats().heals - heals_before,
            }
        })
        .collect();

    let report = ContractReport {
        mode,
        host: active_host_name().map(str::to_string),
        results,
        stats: stats(),
        events: events::recent_events(),
    };
    events::set_writer(None);
    report
}

/// Call `stb_zig_assert(expression)`. Returns only if the assertion holds.
pub fn probe_assert(expression: i32) {
    // SAFETY: stb_zig_assert takes a plain integer.
    unsafe { stb_zig_assert(expression) }
}

fn ensure(cond: bool, message: impl FnOnce() -> String) -> Result<(), String> {
    if cond { Ok(()) } else { Err(message()) }
}

fn tracked_host() -> bool {
    active_host_name() == Some("arena")
}

fn alloc_usable_size() -> Result<Outcome, String> {
    for size in [1usize, 3, 16, 100, 4096, 65_536] {
        // SAFETY: the buffer is written within `size` bytes and released once.
        unsafe {
            let p = stb_zig_malloc(size, std::ptr::null_mut()).cast::<u8>();
            ensure(!p.is_null(), || format!("null for size {size}"))?;
            std::ptr::write_bytes(p, 0xC3, size);
            let ok = std::slice::from_raw_parts(p, size).iter().all(|&b| b == 0xC3);
            stb_zig_free(p.cast(), std::ptr::null_mut());
            ensure(ok, || format!("readback mismatch for size {size}"))?;
        }
    }
    Ok(Outcome::Pass)
}

fn alloc_zero_size_unique() -> Result<Outcome, String> {
    // SAFETY: both buffers are released once.
    unsafe {
        let a = stb_zig_malloc(0, std::ptr::null_mut());
        let b = stb_zig_malloc(0, std::ptr::null_mut());
        let distinct = !a.is_null() && !b.is_null() && a != b;
        stb_zig_free(a, std::ptr::null_mut());
        stb_zig_free(b, std::ptr::null_mut());
        ensure(distinct, || "zero-size allocations were not unique".to_string())?;
    }
    Ok(Outcome::Pass)
}

fn free_no_leak() -> Result<Outcome, String> {
    let before = stats();
    let ctx = 0x5EED as *mut c_void;
    // SAFETY: every allocation is released once with the same context.
    unsafe {
        let ptrs: Vec<_> = (1..=64).map(|i| stb_zig_malloc(i * 24, ctx)).collect();
        ensure(ptrs.iter().all(|p| !p.is_null()), || "allocation failed".to_string())?;
        for p in ptrs {
            stb_zig_free(p, ctx);
        }
    }
    let after = stats();
    ensure(after.live_allocations == before.live_allocations, || {
        format!(
            "live allocations {} -> {}",
            before.live_allocations, after.live_allocations
        )
    })?;
    ensure(after.live_bytes == before.live_bytes, || {
        format!("live bytes {} -> {}", before.live_bytes, after.live_bytes)
    })?;
    Ok(Outcome::Pass)
}

fn free_null_noop() -> Result<Outcome, String> {
    let before = stats().null_releases;
    // SAFETY: null is always accepted.
    unsafe { stb_zig_free(std::ptr::null_mut(), std::ptr::null_mut()) };
    ensure(stats().null_releases == before + 1, || "null release not counted".to_string())?;
    Ok(Outcome::Pass)
}

fn free_double_detected() -> Result<Outcome, String> {
    if !tracked_host() {
        return Ok(Outcome::Skip);
    }
    let before = stats().double_frees;
    // SAFETY: the tracked host absorbs the second release.
    unsafe {
        let p = stb_zig_malloc(32, std::ptr::null_mut());
        stb_zig_free(p, std::ptr::null_mut());
        stb_zig_free(p, std::ptr::null_mut());
    }
    ensure(stats().double_frees == before + 1, || "double release not detected".to_string())?;
    Ok(Outcome::Pass)
}

fn assert_true_returns() -> Result<Outcome, String> {
    for value in [1, -1, 42] {
        probe_assert(value);
    }
    Ok(Outcome::Pass)
}

fn strlen_terminated_length() -> Result<Outcome, String> {
    for n in [0usize, 1, 4, 255, 1024] {
        let mut bytes = vec![b'f'; n];
        bytes.push(0);
        // SAFETY: bytes is NUL-terminated.
        let got = unsafe { stb_zig_strlen(bytes.as_ptr().cast()) };
        ensure(got == n, || format!("expected {n}, got {got}"))?;
    }
    Ok(Outcome::Pass)
}

fn strlen_null_zero() -> Result<Outcome, String> {
    // SAFETY: null is handled.
    let got = unsafe { stb_zig_strlen(std::ptr::null()) };
    ensure(got == 0, || format!("expected 0, got {got}"))?;
    Ok(Outcome::Pass)
}

fn memcpy_prefix_equal() -> Result<Outcome, String> {
    let src: Vec<u8> = (0..200u8).collect();
    let mut dst = vec![0u8; 200];
    for n in [0usize, 1, 7, 64, 200] {
        dst.fill(0);
        // SAFETY: both buffers hold 200 bytes and do not overlap.
        let ret = unsafe { stb_zig_memcpy(dst.as_mut_ptr().cast(), src.as_ptr().cast(), n) };
        ensure(ret == dst.as_mut_ptr().cast::<c_void>(), || "did not return dest".to_string())?;
        ensure(dst[..n] == src[..n], || format!("prefix mismatch for n={n}"))?;
        ensure(dst[n..].iter().all(|&b| b == 0), || format!("wrote past n={n}"))?;
    }
    Ok(Outcome::Pass)
}

fn memcpy_null_returns_null() -> Result<Outcome, String> {
    let src = [0u8; 8];
    // SAFETY: null destination is rejected before any access.
    let ret = unsafe { stb_zig_memcpy(std::ptr::null_mut(), src.as_ptr().cast(), 8) };
    ensure(ret.is_null(), || "expected null".to_string())?;
    Ok(Outcome::Pass)
}

fn memset_low_byte() -> Result<Outcome, String> {
    let mut buf = vec![0u8; 48];
    for c in [0, 0x7F, 0x2_80, -2] {
        buf.fill(0x11);
        // SAFETY: buf holds 48 bytes.
        let ret = unsafe { stb_zig_memset(buf.as_mut_ptr().cast(), c, 40) };
        ensure(ret == buf.as_mut_ptr().cast::<c_void>(), || "did not return dest".to_string())?;
        let expected = (c & 0xFF) as u8;
        ensure(buf[..40].iter().all(|&b| b == expected), || format!("fill mismatch for c={c}"))?;
        ensure(buf[40..].iter().all(|&b| b == 0x11), || format!("wrote past n for c={c}"))?;
    }
    Ok(Outcome::Pass)
}

fn hardened_copy_clamped() -> Result<Outcome, String> {
    if !stbtt_bridge_membrane::config::safety_level().heals_enabled() || !tracked_host() {
        return Ok(Outcome::Skip);
    }
    let before = stats();
    let src = [0x99u8; 128];
    // SAFETY: the bridge clamps the oversized copy to the 32-byte tracked buffer.
    unsafe {
        let dst = stb_zig_malloc(32, std::ptr::null_mut());
        ensure(!dst.is_null(), || "allocation failed".to_string())?;
        stb_zig_memcpy(dst, src.as_ptr().cast(), src.len());
        stb_zig_free(dst, std::ptr::null_mut());
    }
    let after = stats();
    ensure(after.canary_failures == before.canary_failures, || {
        "copy overran the tracked buffer".to_string()
    })?;
    ensure(after.heals > before.heals, || "no clamp recorded".to_string())?;
    Ok(Outcome::Pass)
}

fn hardened_overlap_move() -> Result<Outcome, String> {
    if !stbtt_bridge_membrane::config::safety_level().heals_enabled() {
        return Ok(Outcome::Skip);
    }
    let mut buf = *b"0123456789";
    let base = buf.as_mut_ptr();
    // SAFETY: both ranges lie inside buf; hardened mode performs a move.
    unsafe { stb_zig_memcpy(base.add(3).cast(), base.cast_const().cast(), 5) };
    ensure(&buf == b"0120123489", || {
        format!("got {}", String::from_utf8_lossy(&buf))
    })?;
    Ok(Outcome::Pass)
}
