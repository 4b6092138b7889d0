//! Process-wide host allocator slot.
//!
//! The host is chosen once: either explicitly through [`install_host`] or, on
//! the first allocation, by default from the safety level (`ArenaHost` for
//! strict and hardened, `SystemHost` for off). Afterwards it never changes,
//! so every buffer is released through the allocator that produced it.

use std::cell::Cell;
use std::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

use stbtt_bridge_membrane::config::safety_level;
use stbtt_bridge_membrane::events::{self, BridgeEvent};
use stbtt_bridge_membrane::heal::global_healing_policy;
use stbtt_bridge_membrane::metrics::global_metrics;
use stbtt_bridge_membrane::{
    ArenaHost, BridgeError, HostAllocator, LogLevel, MetricsSnapshot, SystemHost,
};

// Host lifecycle states.
const STATE_UNINIT: u8 = 0;
const STATE_INITIALIZING: u8 = 1;
const STATE_READY: u8 = 2;

struct HostSlot {
    host: Box<dyn HostAllocator>,
}

// UNINIT -> INITIALIZING -> READY. The slot is leaked once published and
// lives for the rest of the process.
static HOST_STATE: AtomicU8 = AtomicU8::new(STATE_UNINIT);
static HOST_PTR: AtomicPtr<HostSlot> = AtomicPtr::new(std::ptr::null_mut());

thread_local! {
    static INSTALLING: Cell<bool> = const { Cell::new(false) };
}

fn ready_host() -> &'static dyn HostAllocator {
    // SAFETY: once READY, HOST_PTR is valid and never changes.
    let slot = unsafe { &*HOST_PTR.load(Ordering::Acquire) };
    slot.host.as_ref()
}

fn publish(host: Box<dyn HostAllocator>) -> &'static dyn HostAllocator {
    let slot = Box::into_raw(Box::new(HostSlot { host }));
    HOST_PTR.store(slot, Ordering::Release);
    HOST_STATE.store(STATE_READY, Ordering::Release);
    ready_host()
}

/// The active host, installing the default one on first use.
///
/// Returns `None` only for a reentrant call made by the installing thread
/// while it is still constructing the host.
pub(crate) fn host() -> Option<&'static dyn HostAllocator> {
    loop {
        match HOST_STATE.load(Ordering::Acquire) {
            STATE_READY => return Some(ready_host()),
            STATE_INITIALIZING => {
                if INSTALLING.with(Cell::get) {
                    return None;
                }
                std::hint::spin_loop();
            }
            _ => {
                if HOST_STATE
                    .compare_exchange(
                        STATE_UNINIT,
                        STATE_INITIALIZING,
                        Ordering::SeqCst,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    INSTALLING.with(|flag| flag.set(true));
                    let default: Box<dyn HostAllocator> = if safety_level().tracking_enabled() {
                        Box::new(ArenaHost::new())
                    } else {
                        Box::new(SystemHost::new())
                    };
                    let host = publish(default);
                    INSTALLING.with(|flag| flag.set(false));
                    if events::enabled(LogLevel::Debug) {
                        events::emit(
                            BridgeEvent::new(LogLevel::Debug, "host_installed", "stb_zig_malloc")
                                .with_details(serde_json::json!({ "host": host.name() })),
                        );
                    }
                    return Some(host);
                }
            }
        }
    }
}

/// The active host if one has already been chosen. Never installs.
pub(crate) fn peek_host() -> Option<&'static dyn HostAllocator> {
    (HOST_STATE.load(Ordering::Acquire) == STATE_READY).then(ready_host)
}

/// Install `host` as the process allocator.
///
/// Fails with [`BridgeError::HostAlreadyInstalled`] if a host was installed
/// before or the bridge has already served an allocation.
pub fn install_host(host: Box<dyn HostAllocator>) -> Result<(), BridgeError> {
    HOST_STATE
        .compare_exchange(
            STATE_UNINIT,
            STATE_INITIALIZING,
            Ordering::SeqCst,
            Ordering::Relaxed,
        )
        .map_err(|_| BridgeError::HostAlreadyInstalled)?;
    let host = publish(host);
    events::emit(
        BridgeEvent::new(LogLevel::Info, "host_installed", "stb_bridge_install_host")
            .with_details(serde_json::json!({ "host": host.name() })),
    );
    Ok(())
}

/// Name of the active host, if one has been chosen.
#[must_use]
pub fn active_host_name() -> Option<&'static str> {
    peek_host().map(|host| host.name())
}

/// Bytes remaining from `addr` to the end of a known live allocation.
pub(crate) fn known_remaining(addr: usize) -> Option<usize> {
    if addr == 0 {
        return None;
    }
    peek_host()?.remaining(addr)
}

/// Snapshot of every bridge counter plus current host occupancy.
#[must_use]
pub fn stats() -> MetricsSnapshot {
    let mut snapshot = global_metrics().snapshot();
    snapshot.heals = global_healing_policy().total();
    if let Some(occupancy) = peek_host().and_then(|host| host.occupancy()) {
        snapshot.live_allocations = occupancy.live_allocations;
        snapshot.live_bytes = occupancy.live_bytes;
    }
    snapshot
}
