//! ABI layer for `STBTT_strlen`, `STBTT_memcpy`, and `STBTT_memset`.
//!
//! Each function is an `extern "C"` entry point that:
//! 1. Rejects null pointer arguments with a safe default
//! 2. In hardened mode, applies healing (bounds clamping, move upgrade, bounded scan)
//! 3. Delegates to `stbtt-bridge-core` slice implementations

use std::ffi::{CStr, c_char, c_int, c_void};

use libc::size_t;
use stbtt_bridge_core::string::{bounded_string_length, copy_memory, fill_memory, move_within};
use stbtt_bridge_membrane::LogLevel;
use stbtt_bridge_membrane::config::safety_level;
use stbtt_bridge_membrane::events::{self, BridgeEvent};
use stbtt_bridge_membrane::heal::{HealingAction, global_healing_policy};
use stbtt_bridge_membrane::metrics::{BridgeMetrics, global_metrics};

use crate::host_state::known_remaining;

const STRLEN: &str = "stb_zig_strlen";
const MEMCPY: &str = "stb_zig_memcpy";
const MEMSET: &str = "stb_zig_memset";

fn record_heal(symbol: &'static str, action: HealingAction, requested: usize) {
    global_healing_policy().record(&action);
    let event = BridgeEvent::new(LogLevel::Warn, action.label(), symbol)
        .with_size(requested)
        .with_healing_action(action.label());
    let event = match action {
        HealingAction::ClampSize { clamped, .. } => {
            event.with_details(serde_json::json!({ "clamped": clamped }))
        }
        HealingAction::TruncateScan { limit } => {
            event.with_details(serde_json::json!({ "limit": limit }))
        }
        _ => event,
    };
    events::emit(event);
}

fn null_argument(symbol: &'static str, requested: usize) {
    BridgeMetrics::inc(&global_metrics().null_arguments);
    if safety_level().heals_enabled() {
        record_heal(symbol, HealingAction::ReturnSafeDefault, requested);
    } else {
        events::emit(BridgeEvent::new(LogLevel::Warn, "null_argument", symbol).with_size(requested));
    }
}

fn clamp_to_known_bounds(
    symbol: &'static str,
    requested: usize,
    src_addr: Option<usize>,
    dst_addr: Option<usize>,
) -> usize {
    let src_remaining = src_addr.and_then(known_remaining);
    let dst_remaining = dst_addr.and_then(known_remaining);
    let action = global_healing_policy().heal_copy_bounds(requested, src_remaining, dst_remaining);
    match action {
        HealingAction::ClampSize { clamped, .. } => {
            record_heal(symbol, action, requested);
            clamped
        }
        _ => requested,
    }
}

// ---------------------------------------------------------------------------
// strlen
// ---------------------------------------------------------------------------

abi_fn! {
    /// `size_t stb_zig_strlen(const char* str)`.
    ///
    /// Null returns 0. In hardened mode a string inside a tracked allocation is
    /// never scanned past the end of that allocation.
    fn stb_zig_strlen(s: *const c_char) -> size_t {
        if s.is_null() {
            null_argument(STRLEN, 0);
            return 0;
        }
        BridgeMetrics::inc(&global_metrics().string_lengths);

        if safety_level().heals_enabled()
            && let Some(limit) = known_remaining(s as usize)
        {
            // SAFETY: the host reports `limit` live bytes starting at `s`.
            let bytes = std::slice::from_raw_parts(s.cast::<u8>(), limit);
            let (len, terminated) = bounded_string_length(bytes);
            if !terminated {
                record_heal(STRLEN, HealingAction::TruncateScan { limit }, limit);
            }
            return len;
        }

        // SAFETY: caller guarantees a NUL-terminated string.
        CStr::from_ptr(s).to_bytes().len()
    }
}

// ---------------------------------------------------------------------------
// memcpy
// ---------------------------------------------------------------------------

abi_fn! {
    /// `void* stb_zig_memcpy(void* dest, const void* src, size_t n)`.
    ///
    /// Returns `dst`, or null when `n > 0` and either pointer is null.
    fn stb_zig_memcpy(dst: *mut c_void, src: *const c_void, n: size_t) -> *mut c_void {
        if n == 0 {
            return dst;
        }
        if dst.is_null() || src.is_null() {
            null_argument(MEMCPY, n);
            return std::ptr::null_mut();
        }
        BridgeMetrics::inc(&global_metrics().copies);

        let mut count = n;
        if safety_level().heals_enabled() {
            count = clamp_to_known_bounds(MEMCPY, n, Some(src as usize), Some(dst as usize));
            let overlap = global_healing_policy().heal_overlap(dst as usize, src as usize, count);
            if overlap.is_heal() {
                record_heal(MEMCPY, overlap, count);
                let (dst_addr, src_addr) = (dst as usize, src as usize);
                let (base, base_addr) = if dst_addr <= src_addr {
                    (dst.cast::<u8>(), dst_addr)
                } else {
                    (src.cast_mut().cast::<u8>(), src_addr)
                };
                let span = dst_addr.max(src_addr) - base_addr + count;
                // SAFETY: both ranges are valid for `count` bytes and overlap, so
                // their union is one contiguous region of `span` bytes.
                let region = std::slice::from_raw_parts_mut(base, span);
                move_within(region, src_addr - base_addr, dst_addr - base_addr, count);
                return dst;
            }
        }
        if count == 0 || std::ptr::eq(dst.cast_const(), src) {
            return dst;
        }

        // SAFETY: `count` is the caller's `n` (strict) or clamped to known bounds,
        // and the C contract forbids overlap outside hardened mode.
        let dest = std::slice::from_raw_parts_mut(dst.cast::<u8>(), count);
        let source = std::slice::from_raw_parts(src.cast::<u8>(), count);
        copy_memory(dest, source, count);
        dst
    }
}

// ---------------------------------------------------------------------------
// memset
// ---------------------------------------------------------------------------

abi_fn! {
    /// `void* stb_zig_memset(void* str, int c, size_t n)`.
    ///
    /// Stores `c` mod 256 into the first `n` bytes and returns `s`, or null
    /// when `n > 0` and `s` is null.
    fn stb_zig_memset(s: *mut c_void, c: c_int, n: size_t) -> *mut c_void {
        if n == 0 {
            return s;
        }
        if s.is_null() {
            null_argument(MEMSET, n);
            return std::ptr::null_mut();
        }
        BridgeMetrics::inc(&global_metrics().fills);

        let count = if safety_level().heals_enabled() {
            clamp_to_known_bounds(MEMSET, n, None, Some(s as usize))
        } else {
            n
        };
        if count > 0 {
            // SAFETY: `s` is valid for `count` bytes under the C contract or known bounds.
            let dest = std::slice::from_raw_parts_mut(s.cast::<u8>(), count);
            fill_memory(dest, c, count);
        }
        s
    }
}
