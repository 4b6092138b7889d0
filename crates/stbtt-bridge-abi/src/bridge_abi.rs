//! Extension entry points: host installation and counters.
//!
//! These are not part of the `STBTT_*` hook set. A C host calls
//! `stb_bridge_install_host` before handing the first font to stb_truetype if
//! it wants its own allocator behind `STBTT_malloc`/`STBTT_free`.

use std::ffi::c_int;

use stbtt_bridge_membrane::host::{AllocateFn, ReleaseFn};
use stbtt_bridge_membrane::{BridgeError, CallbackHost, MetricsSnapshot};

use crate::host_state;

/// C allocator callbacks. Both must be non-null.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StbBridgeHostVTable {
    pub allocate: Option<AllocateFn>,
    pub release: Option<ReleaseFn>,
}

/// C view of [`MetricsSnapshot`].
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StbBridgeStats {
    pub allocations: u64,
    pub allocation_failures: u64,
    pub releases: u64,
    pub null_releases: u64,
    pub double_frees: u64,
    pub foreign_frees: u64,
    pub canary_failures: u64,
    pub assert_passes: u64,
    pub string_lengths: u64,
    pub copies: u64,
    pub fills: u64,
    pub null_arguments: u64,
    pub heals: u64,
    pub live_allocations: u64,
    pub live_bytes: u64,
}

impl From<MetricsSnapshot> for StbBridgeStats {
    fn from(s: MetricsSnapshot) -> Self {
        Self {
            allocations: s.allocations,
            allocation_failures: s.allocation_failures,
            releases: s.releases,
            null_releases: s.null_releases,
            double_frees: s.double_frees,
            foreign_frees: s.foreign_frees,
            canary_failures: s.canary_failures,
            assert_passes: s.assert_passes,
            string_lengths: s.string_lengths,
            copies: s.copies,
            fills: s.fills,
            null_arguments: s.null_arguments,
            heals: s.heals,
            live_allocations: s.live_allocations,
            live_bytes: s.live_bytes,
        }
    }
}

fn install_from_vtable(vtable: &StbBridgeHostVTable) -> Result<(), BridgeError> {
    let host = CallbackHost::new(vtable.allocate, vtable.release)?;
    host_state::install_host(Box::new(host))
}

abi_fn! {
    /// `int stb_bridge_install_host(const StbBridgeHostVTable* vtable)`.
    ///
    /// Returns 0 on success, -1 for a null table or callback, -2 when a host
    /// is already active.
    fn stb_bridge_install_host(vtable: *const StbBridgeHostVTable) -> c_int {
        // SAFETY: a non-null vtable points to a readable table per the C contract.
        let Some(vtable) = vtable.as_ref() else {
            return BridgeError::NullCallback("vtable").code();
        };
        match install_from_vtable(vtable) {
            Ok(()) => 0,
            Err(err) => err.code(),
        }
    }
}

abi_fn! {
    /// `int stb_bridge_stats(StbBridgeStats* out)`.
    ///
    /// Returns 0 after filling `out`, or -1 if `out` is null.
    fn stb_bridge_stats(out: *mut StbBridgeStats) -> c_int {
        if out.is_null() {
            return -1;
        }
        // SAFETY: `out` is non-null and writable per the C contract.
        out.write(StbBridgeStats::from(host_state::stats()));
        0
    }
}
