//! ABI layer for `STBTT_malloc` / `STBTT_free`.
//!
//! Both entry points forward to the process host allocator with the caller's
//! `userData` untouched. Release misuse the host detects is counted, logged,
//! and ignored.

use std::ffi::c_void;
use std::ptr::NonNull;

use libc::size_t;
use stbtt_bridge_membrane::config::safety_level;
use stbtt_bridge_membrane::events::{self, BridgeEvent};
use stbtt_bridge_membrane::heal::{HealingAction, global_healing_policy};
use stbtt_bridge_membrane::metrics::{BridgeMetrics, global_metrics};
use stbtt_bridge_membrane::{FreeResult, LogLevel, UserData};

use crate::host_state;

const MALLOC: &str = "stb_zig_malloc";
const FREE: &str = "stb_zig_free";

abi_fn! {
    /// `void* stb_zig_malloc(size_t size, void* userData)`.
    ///
    /// Returns a buffer of at least `size` bytes, or null on exhaustion. A
    /// zero-byte request is served as one byte so the result is unique.
    fn stb_zig_malloc(size: size_t, user_data: *mut c_void) -> *mut c_void {
        let metrics = global_metrics();
        let Some(host) = host_state::host() else {
            BridgeMetrics::inc(&metrics.allocation_failures);
            return std::ptr::null_mut();
        };

        let request = size.max(1);
        match host.try_allocate(request, UserData::new(user_data)) {
            Ok(ptr) => {
                BridgeMetrics::inc(&metrics.allocations);
                if events::enabled(LogLevel::Trace) {
                    events::emit(
                        BridgeEvent::new(LogLevel::Trace, "allocate", MALLOC)
                            .with_size(size)
                            .with_addr(ptr.as_ptr() as usize),
                    );
                }
                ptr.as_ptr().cast()
            }
            Err(err) => {
                BridgeMetrics::inc(&metrics.allocation_failures);
                events::emit(
                    BridgeEvent::new(LogLevel::Warn, "allocation_failed", MALLOC)
                        .with_size(size)
                        .with_details(serde_json::json!({
                            "host": host.name(),
                            "error": err.to_string(),
                        })),
                );
                std::ptr::null_mut()
            }
        }
    }
}

abi_fn! {
    /// `void stb_zig_free(void* ptr, void* userData)`.
    ///
    /// Null is a no-op.
    fn stb_zig_free(ptr: *mut c_void, user_data: *mut c_void) {
        let metrics = global_metrics();
        let Some(ptr) = NonNull::new(ptr.cast::<u8>()) else {
            BridgeMetrics::inc(&metrics.null_releases);
            return;
        };
        let addr = ptr.as_ptr() as usize;
        // Releases never choose the host: with none chosen yet, nothing was
        // handed out, so the pointer cannot be ours.
        let Some(host) = host_state::peek_host() else {
            BridgeMetrics::inc(&metrics.foreign_frees);
            report_ignored_release(addr, FreeResult::ForeignPointer, HealingAction::IgnoreForeignFree);
            return;
        };

        // SAFETY: forwarded under the caller's C contract; tracked hosts verify ownership.
        let result = host.release(ptr, UserData::new(user_data));
        if result.released() {
            BridgeMetrics::inc(&metrics.releases);
        }
        match result {
            FreeResult::Freed => {
                if events::enabled(LogLevel::Trace) {
                    events::emit(BridgeEvent::new(LogLevel::Trace, "release", FREE).with_addr(addr));
                }
            }
            FreeResult::FreedWithCanaryCorruption => {
                BridgeMetrics::inc(&metrics.canary_failures);
                events::emit(
                    BridgeEvent::new(LogLevel::Error, "canary_corruption", FREE).with_addr(addr),
                );
            }
            FreeResult::DoubleFree => {
                BridgeMetrics::inc(&metrics.double_frees);
                report_ignored_release(addr, result, HealingAction::IgnoreDoubleFree);
            }
            FreeResult::ForeignPointer => {
                BridgeMetrics::inc(&metrics.foreign_frees);
                report_ignored_release(addr, result, HealingAction::IgnoreForeignFree);
            }
        }
    }
}

fn report_ignored_release(addr: usize, result: FreeResult, action: HealingAction) {
    if safety_level().heals_enabled() {
        global_healing_policy().record(&action);
    }
    events::emit(
        BridgeEvent::new(LogLevel::Warn, result.as_str(), FREE)
            .with_addr(addr)
            .with_healing_action(action.label()),
    );
}
