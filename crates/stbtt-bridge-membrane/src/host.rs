//! Host allocator seam.
//!
//! stb_truetype reaches memory only through `STBTT_malloc(size, userdata)` and
//! `STBTT_free(ptr, userdata)`. The host side of that pair is a
//! [`HostAllocator`]: one object installed for the process, handed every
//! request together with the caller's untouched [`UserData`].
//!
//! Provided hosts:
//! - [`ArenaHost`]: tracked arena; detects double, foreign, and overflowed frees
//! - [`SystemHost`]: global allocator with a size header, no tracking
//! - [`CallbackHost`]: a pair of C function pointers supplied by a foreign host
//! - [`FnHost`]: a pair of Rust closures carrying their own state

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::arena::{AllocationArena, ArenaStats, FreeResult, MIN_ALIGN};
use crate::error::BridgeError;

/// Opaque caller context, forwarded bit-for-bit and never dereferenced.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserData(*mut c_void);

impl UserData {
    pub const NULL: Self = Self(std::ptr::null_mut());

    #[must_use]
    pub const fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    #[must_use]
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }
}

/// Memory provider behind the bridge's allocate/release entry points.
pub trait HostAllocator: Send + Sync {
    /// Short identifier used in events and stats.
    fn name(&self) -> &'static str;

    /// Return a buffer usable for at least `size` bytes, or `None` when out of memory.
    fn allocate(&self, size: usize, user: UserData) -> Option<NonNull<u8>>;

    /// Take back a buffer.
    ///
    /// # Safety
    ///
    /// `ptr` should come from `allocate` on this host. Hosts that track
    /// ownership report misuse through the returned [`FreeResult`]; untracked
    /// hosts require it.
    unsafe fn release(&self, ptr: NonNull<u8>, user: UserData) -> FreeResult;

    /// Bytes remaining from `addr` to the end of the owning allocation, if known.
    fn remaining(&self, _addr: usize) -> Option<usize> {
        None
    }

    /// Current occupancy, if the host counts it.
    fn occupancy(&self) -> Option<ArenaStats> {
        None
    }

    /// `allocate` with the failure spelled out.
    fn try_allocate(&self, size: usize, user: UserData) -> Result<NonNull<u8>, BridgeError> {
        if size > isize::MAX as usize {
            return Err(BridgeError::SizeOverflow { size });
        }
        self.allocate(size, user)
            .ok_or(BridgeError::AllocationFailed { size })
    }
}

// ---------------------------------------------------------------------------
// ArenaHost
// ---------------------------------------------------------------------------

/// Tracked host backed by an [`AllocationArena`].
#[derive(Default)]
pub struct ArenaHost {
    arena: AllocationArena,
}

impl ArenaHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostAllocator for ArenaHost {
    fn name(&self) -> &'static str {
        "arena"
    }

    fn allocate(&self, size: usize, _user: UserData) -> Option<NonNull<u8>> {
        self.arena.allocate(size.max(1))
    }

    unsafe fn release(&self, ptr: NonNull<u8>, _user: UserData) -> FreeResult {
        self.arena.free(ptr)
    }

    fn remaining(&self, addr: usize) -> Option<usize> {
        self.arena.remaining_from(addr)
    }

    fn occupancy(&self) -> Option<ArenaStats> {
        Some(self.arena.stats())
    }
}

// ---------------------------------------------------------------------------
// SystemHost
// ---------------------------------------------------------------------------

/// Untracked host over the global allocator.
///
/// Each block starts with a [`MIN_ALIGN`]-byte header holding the total size,
/// so release needs nothing but the pointer.
#[derive(Default)]
pub struct SystemHost {
    live_allocations: AtomicU64,
    live_bytes: AtomicU64,
    total_allocations: AtomicU64,
    total_frees: AtomicU64,
}

impl SystemHost {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            live_allocations: AtomicU64::new(0),
            live_bytes: AtomicU64::new(0),
            total_allocations: AtomicU64::new(0),
            total_frees: AtomicU64::new(0),
        }
    }
}

impl HostAllocator for SystemHost {
    fn name(&self) -> &'static str {
        "system"
    }

    fn allocate(&self, size: usize, _user: UserData) -> Option<NonNull<u8>> {
        let size = size.max(1);
        let total = size.checked_add(MIN_ALIGN)?;
        let layout = Layout::from_size_align(total, MIN_ALIGN).ok()?;
        // SAFETY: layout is non-zero sized.
        let raw = NonNull::new(unsafe { std::alloc::alloc(layout) })?;
        // SAFETY: the header is the first MIN_ALIGN bytes of the block, which is
        // aligned for usize.
        unsafe { raw.as_ptr().cast::<usize>().write(total) };
        self.live_allocations.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(size as u64, Ordering::Relaxed);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        // SAFETY: total > MIN_ALIGN, so the offset stays inside the block.
        Some(unsafe { raw.add(MIN_ALIGN) })
    }

    unsafe fn release(&self, ptr: NonNull<u8>, _user: UserData) -> FreeResult {
        // SAFETY: caller guarantees ptr came from `allocate`, which placed the
        // header MIN_ALIGN bytes before it.
        unsafe {
            let raw = ptr.sub(MIN_ALIGN);
            let total = raw.as_ptr().cast::<usize>().read();
            let layout = Layout::from_size_align_unchecked(total, MIN_ALIGN);
            std::alloc::dealloc(raw.as_ptr(), layout);
            self.live_allocations.fetch_sub(1, Ordering::Relaxed);
            self.live_bytes
                .fetch_sub((total - MIN_ALIGN) as u64, Ordering::Relaxed);
        }
        self.total_frees.fetch_add(1, Ordering::Relaxed);
        FreeResult::Freed
    }

    fn occupancy(&self) -> Option<ArenaStats> {
        Some(ArenaStats {
            live_allocations: self.live_allocations.load(Ordering::Relaxed),
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_frees: self.total_frees.load(Ordering::Relaxed),
        })
    }
}

// ---------------------------------------------------------------------------
// CallbackHost
// ---------------------------------------------------------------------------

/// C allocate callback: `void* (*)(size_t size, void* userData)`.
pub type AllocateFn = unsafe extern "C" fn(usize, *mut c_void) -> *mut c_void;

/// C release callback: `void (*)(void* ptr, void* userData)`.
pub type ReleaseFn = unsafe extern "C" fn(*mut c_void, *mut c_void);

/// Host implemented on the far side of the C boundary.
#[derive(Debug, Clone, Copy)]
pub struct CallbackHost {
    allocate: AllocateFn,
    release: ReleaseFn,
}

impl CallbackHost {
    /// Build from possibly-null C function pointers.
    pub fn new(
        allocate: Option<AllocateFn>,
        release: Option<ReleaseFn>,
    ) -> Result<Self, BridgeError> {
        Ok(Self {
            allocate: allocate.ok_or(BridgeError::NullCallback("allocate"))?,
            release: release.ok_or(BridgeError::NullCallback("release"))?,
        })
    }
}

impl HostAllocator for CallbackHost {
    fn name(&self) -> &'static str {
        "callback"
    }

    fn allocate(&self, size: usize, user: UserData) -> Option<NonNull<u8>> {
        // SAFETY: the installer vouches for the callback's C contract.
        NonNull::new(unsafe { (self.allocate)(size, user.as_ptr()) }.cast::<u8>())
    }

    unsafe fn release(&self, ptr: NonNull<u8>, user: UserData) -> FreeResult {
        // SAFETY: forwarded under the caller's contract.
        unsafe { (self.release)(ptr.as_ptr().cast(), user.as_ptr()) };
        FreeResult::Freed
    }
}

// ---------------------------------------------------------------------------
// FnHost
// ---------------------------------------------------------------------------

/// Host assembled from two closures.
///
/// The closures own whatever state they capture, and the bridge keeps the host
/// alive for the rest of the process, so that state outlives every allocation.
pub struct FnHost<A, R> {
    name: &'static str,
    allocate: A,
    release: R,
}

impl<A, R> FnHost<A, R>
where
    A: Fn(usize, UserData) -> Option<NonNull<u8>> + Send + Sync,
    R: Fn(NonNull<u8>, UserData) + Send + Sync,
{
    pub fn new(name: &'static str, allocate: A, release: R) -> Self {
        Self {
            name,
            allocate,
            release,
        }
    }
}

impl<A, R> HostAllocator for FnHost<A, R>
where
    A: Fn(usize, UserData) -> Option<NonNull<u8>> + Send + Sync,
    R: Fn(NonNull<u8>, UserData) + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn allocate(&self, size: usize, user: UserData) -> Option<NonNull<u8>> {
        (self.allocate)(size, user)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, user: UserData) -> FreeResult {
        (self.release)(ptr, user);
        FreeResult::Freed
    }
}
