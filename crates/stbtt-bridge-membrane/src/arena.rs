//! Tracked allocation arena with a quarantine queue.
//!
//! Every allocation gets a slot with a generation counter, a fingerprint
//! header in front of the user pointer, and a canary behind it. When freed,
//! the slot enters a quarantine queue rather than being recycled at once, so
//! a second release of the same pointer is recognized as a double free.
//!
//! Thread-safe via sharded `parking_lot::Mutex`.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::collections::{BTreeMap, VecDeque};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::fingerprint::{AllocationFingerprint, CANARY_SIZE, FINGERPRINT_SIZE};

/// Maximum quarantine queue size in bytes, per shard.
const QUARANTINE_MAX_BYTES: usize = 8 * 1024 * 1024;

/// Maximum quarantine queue entry count, per shard.
const QUARANTINE_MAX_ENTRIES: usize = 4096;

/// Number of shards for arena locks (power of 2).
const NUM_SHARDS: usize = 16;

/// Minimum alignment of user pointers. Also the header offset.
pub const MIN_ALIGN: usize = 16;

/// Lifecycle of a tracked slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotState {
    Live,
    Quarantined,
    Freed,
}

/// Metadata for a single allocation slot.
#[derive(Debug, Clone, Copy)]
pub struct ArenaSlot {
    /// Base address of the raw allocation (including header padding).
    pub raw_base: usize,
    /// User-visible base address.
    pub user_base: usize,
    /// User-requested size.
    pub user_size: usize,
    pub generation: u32,
    pub state: SlotState,
}

impl ArenaSlot {
    fn layout(&self) -> Option<Layout> {
        let offset = self.user_base - self.raw_base;
        let total = offset + self.user_size + CANARY_SIZE;
        Layout::from_size_align(total, offset).ok()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct QuarantineEntry {
    pub(crate) user_base: usize,
    pub(crate) raw_base: usize,
    pub(crate) layout: Layout,
}

struct ArenaShard {
    slots: Vec<ArenaSlot>,
    /// Map from user_base address to slot index. Ordered for containing lookups.
    addr_to_slot: BTreeMap<usize, usize>,
    free_list: Vec<usize>,
    quarantine: VecDeque<QuarantineEntry>,
    quarantine_bytes: usize,
}

impl ArenaShard {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            addr_to_slot: BTreeMap::new(),
            free_list: Vec::new(),
            quarantine: VecDeque::new(),
            quarantine_bytes: 0,
        }
    }

    fn containing(&self, addr: usize) -> Option<ArenaSlot> {
        let (_, &idx) = self.addr_to_slot.range(..=addr).next_back()?;
        let slot = self.slots[idx];
        let end = slot.user_base.saturating_add(slot.user_size);
        (addr >= slot.user_base && addr < end).then_some(slot)
    }
}

/// Point-in-time arena occupancy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaStats {
    pub live_allocations: u64,
    pub live_bytes: u64,
    pub total_allocations: u64,
    pub total_frees: u64,
}

/// Thread-safe tracked allocation arena.
pub struct AllocationArena {
    shards: Box<[Mutex<ArenaShard>]>,
    next_generation: AtomicU32,
    live_allocations: AtomicU64,
    live_bytes: AtomicU64,
    total_allocations: AtomicU64,
    total_frees: AtomicU64,
}

impl AllocationArena {
    #[must_use]
    pub fn new() -> Self {
        let shards: Vec<Mutex<ArenaShard>> = (0..NUM_SHARDS)
            .map(|_| Mutex::new(ArenaShard::new()))
            .collect();
        Self {
            shards: shards.into_boxed_slice(),
            next_generation: AtomicU32::new(1),
            live_allocations: AtomicU64::new(0),
            live_bytes: AtomicU64::new(0),
            total_allocations: AtomicU64::new(0),
            total_frees: AtomicU64::new(0),
        }
    }

    /// Allocate `user_size` bytes with fingerprint header and canary.
    ///
    /// Returns the user-visible pointer, or `None` if the size overflows or the
    /// system allocator fails.
    pub fn allocate(&self, user_size: usize) -> Option<NonNull<u8>> {
        self.allocate_aligned(user_size, MIN_ALIGN)
    }

    /// Allocate with a specific alignment (power of two, at least [`MIN_ALIGN`]).
    pub fn allocate_aligned(&self, user_size: usize, align: usize) -> Option<NonNull<u8>> {
        let align = align.max(MIN_ALIGN);
        if !align.is_power_of_two() {
            return None;
        }

        // The header sits at `user_base - FINGERPRINT_SIZE`; `offset = align`
        // keeps the user pointer aligned and leaves room for it.
        let offset = align;
        let total_size = offset.checked_add(user_size)?.checked_add(CANARY_SIZE)?;
        let layout = Layout::from_size_align(total_size, align).ok()?;

        // SAFETY: layout has non-zero size (offset >= 16).
        let raw_ptr = NonNull::new(unsafe { std::alloc::alloc(layout) })?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let raw_base = raw_ptr.as_ptr() as usize;
        let user_base = raw_base + offset;

        let recorded_size = u32::try_from(user_size).unwrap_or(u32::MAX);
        let fp = AllocationFingerprint::compute(user_base, recorded_size, generation);
        // SAFETY: raw_ptr is valid for total_size bytes; the header occupies
        // [user_base - 16, user_base) and the canary [user_base + size, +8),
        // both inside the allocation.
        unsafe {
            let header = raw_ptr.as_ptr().add(offset - FINGERPRINT_SIZE);
            std::ptr::copy_nonoverlapping(fp.to_bytes().as_ptr(), header, FINGERPRINT_SIZE);
            let canary = raw_ptr.as_ptr().add(offset + user_size);
            std::ptr::copy_nonoverlapping(fp.canary().to_bytes().as_ptr(), canary, CANARY_SIZE);
        }

        let slot = ArenaSlot {
            raw_base,
            user_base,
            user_size,
            generation,
            state: SlotState::Live,
        };

        {
            let mut shard = self.shards[shard_for(user_base)].lock();
            let slot_idx = if let Some(free_idx) = shard.free_list.pop() {
                shard.slots[free_idx] = slot;
                free_idx
            } else {
                shard.slots.push(slot);
                shard.slots.len() - 1
            };
            shard.addr_to_slot.insert(user_base, slot_idx);
        }

        self.live_allocations.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(user_size as u64, Ordering::Relaxed);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);

        // SAFETY: user_base = raw_base + offset, raw_base is non-null.
        Some(unsafe { NonNull::new_unchecked(user_base as *mut u8) })
    }

    /// Release a tracked allocation.
    ///
    /// Live slots move to quarantine with a bumped generation. Releasing a
    /// quarantined (or recycled) slot reports `DoubleFree`; an unknown address
    /// reports `ForeignPointer`. Neither touches memory.
    pub fn free(&self, user_ptr: NonNull<u8>) -> FreeResult {
        let user_base = user_ptr.as_ptr() as usize;
        let mut shard = self.shards[shard_for(user_base)].lock();

        let Some(&slot_idx) = shard.addr_to_slot.get(&user_base) else {
            return FreeResult::ForeignPointer;
        };

        let slot = shard.slots[slot_idx];
        if slot.state != SlotState::Live {
            return FreeResult::DoubleFree;
        }

        let canary_ok = verify_canary(&slot);
        let Some(layout) = slot.layout() else {
            return FreeResult::ForeignPointer;
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        {
            let entry = &mut shard.slots[slot_idx];
            entry.state = SlotState::Quarantined;
            entry.generation = generation;
        }
        shard.quarantine.push_back(QuarantineEntry {
            user_base,
            raw_base: slot.raw_base,
            layout,
        });
        shard.quarantine_bytes += layout.size();
        drain_quarantine(&mut shard);
        drop(shard);

        self.live_allocations.fetch_sub(1, Ordering::Relaxed);
        self.live_bytes
            .fetch_sub(slot.user_size as u64, Ordering::Relaxed);
        self.total_frees.fetch_add(1, Ordering::Relaxed);

        if canary_ok {
            FreeResult::Freed
        } else {
            FreeResult::FreedWithCanaryCorruption
        }
    }

    /// Look up the slot whose user range contains `addr`, in any state but `Freed`.
    #[must_use]
    pub fn lookup(&self, addr: usize) -> Option<ArenaSlot> {
        {
            let home = self.shards[shard_for(addr)].lock();
            if let Some(&idx) = home.addr_to_slot.get(&addr) {
                return Some(home.slots[idx]);
            }
        }
        // Interior pointers can live on a page that hashes to another shard.
        self.shards.iter().find_map(|shard| shard.lock().containing(addr))
    }

    /// Bytes remaining from `addr` to the end of the live allocation containing it.
    #[must_use]
    pub fn remaining_from(&self, addr: usize) -> Option<usize> {
        let slot = self.lookup(addr)?;
        if slot.state != SlotState::Live {
            return None;
        }
        Some(slot.user_base + slot.user_size - addr)
    }

    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            live_allocations: self.live_allocations.load(Ordering::Relaxed),
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_frees: self.total_frees.load(Ordering::Relaxed),
        }
    }
}

impl Default for AllocationArena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AllocationArena {
    fn drop(&mut self) {
        // Quarantined memory is owned by the arena; live memory still belongs to callers.
        for shard in self.shards.iter() {
            let mut shard = shard.lock();
            while let Some(entry) = shard.quarantine.pop_front() {
                // SAFETY: raw_base was allocated with this layout in allocate_aligned.
                unsafe { std::alloc::dealloc(entry.raw_base as *mut u8, entry.layout) };
            }
            shard.quarantine_bytes = 0;
        }
    }
}

/// Result of a free operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FreeResult {
    /// Successfully released (quarantined).
    Freed,
    /// Released, but the trailing canary was overwritten.
    FreedWithCanaryCorruption,
    /// Pointer was already released.
    DoubleFree,
    /// Pointer is not known to the allocator.
    ForeignPointer,
}

impl FreeResult {
    /// Returns true if the pointer's memory was actually released.
    #[must_use]
    pub const fn released(self) -> bool {
        matches!(self, Self::Freed | Self::FreedWithCanaryCorruption)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Freed => "freed",
            Self::FreedWithCanaryCorruption => "freed_with_canary_corruption",
            Self::DoubleFree => "double_free",
            Self::ForeignPointer => "foreign_pointer",
        }
    }
}

fn shard_for(addr: usize) -> usize {
    (addr >> 12) % NUM_SHARDS
}

fn verify_canary(slot: &ArenaSlot) -> bool {
    let recorded_size = u32::try_from(slot.user_size).unwrap_or(u32::MAX);
    let fp = AllocationFingerprint::compute(slot.user_base, recorded_size, slot.generation);
    let mut actual = [0u8; CANARY_SIZE];
    // SAFETY: the canary sits at user_base + user_size inside the allocation.
    unsafe {
        std::ptr::copy_nonoverlapping(
            (slot.user_base + slot.user_size) as *const u8,
            actual.as_mut_ptr(),
            CANARY_SIZE,
        );
    }
    fp.canary().verify(&actual)
}

fn drain_quarantine(shard: &mut ArenaShard) -> usize {
    let mut drained = 0;
    while shard.quarantine_bytes > QUARANTINE_MAX_BYTES
        || shard.quarantine.len() > QUARANTINE_MAX_ENTRIES
    {
        let Some(entry) = shard.quarantine.pop_front() else {
            break;
        };
        if let Some(slot_idx) = shard.addr_to_slot.remove(&entry.user_base) {
            shard.slots[slot_idx].state = SlotState::Freed;
            shard.free_list.push(slot_idx);
        }
        // SAFETY: raw_base was allocated with this layout in allocate_aligned.
        unsafe { std::alloc::dealloc(entry.raw_base as *mut u8, entry.layout) };
        shard.quarantine_bytes -= entry.layout.size();
        drained += 1;
    }
    drained
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_free_cycle() {
        let arena = AllocationArena::new();
        let ptr = arena.allocate(256).expect("allocation should succeed");
        assert_eq!(ptr.as_ptr() as usize % MIN_ALIGN, 0);

        // SAFETY: ptr is valid for 256 bytes from allocate().
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0xAB, 256) };

        assert_eq!(arena.free(ptr), FreeResult::Freed);
    }

    #[test]
    fn double_free_detected() {
        let arena = AllocationArena::new();
        let ptr = arena.allocate(64).expect("allocation should succeed");
        assert_eq!(arena.free(ptr), FreeResult::Freed);
        assert_eq!(arena.free(ptr), FreeResult::DoubleFree);
        assert_eq!(arena.stats().total_frees, 1);
    }

    #[test]
    fn foreign_pointer_detected() {
        let arena = AllocationArena::new();
        let mut local = 42u64;
        let foreign = NonNull::from(&mut local).cast::<u8>();
        assert_eq!(arena.free(foreign), FreeResult::ForeignPointer);
    }

    #[test]
    fn header_carries_fingerprint() {
        let arena = AllocationArena::new();
        let ptr = arena.allocate(48).expect("allocation should succeed");
        let mut header = [0u8; FINGERPRINT_SIZE];
        // SAFETY: the header precedes every tracked user pointer.
        unsafe {
            std::ptr::copy_nonoverlapping(
                ptr.as_ptr().sub(FINGERPRINT_SIZE),
                header.as_mut_ptr(),
                FINGERPRINT_SIZE,
            );
        }
        let fp = AllocationFingerprint::from_bytes(&header);
        assert!(fp.verify(ptr.as_ptr() as usize));
        assert_eq!(fp.size, 48);
        let _ = arena.free(ptr);
    }

    #[test]
    fn lookup_into_middle_of_allocation() {
        let arena = AllocationArena::new();
        let ptr = arena.allocate(8192).expect("allocation should succeed");
        let addr = ptr.as_ptr() as usize;

        let slot = arena.lookup(addr + 5000).expect("containing allocation");
        assert_eq!(slot.user_base, addr);
        assert_eq!(arena.remaining_from(addr + 64), Some(8192 - 64));
        assert_eq!(arena.remaining_from(addr + 8192), None);
        let _ = arena.free(ptr);
    }

    #[test]
    fn canary_corruption_detected() {
        let arena = AllocationArena::new();
        let ptr = arena.allocate(32).expect("allocation should succeed");

        // SAFETY: writes land on the canary, which is inside the raw allocation.
        unsafe { std::ptr::write_bytes(ptr.as_ptr().add(32), 0xFF, CANARY_SIZE) };

        assert_eq!(arena.free(ptr), FreeResult::FreedWithCanaryCorruption);
    }

    #[test]
    fn stats_track_live_bytes() {
        let arena = AllocationArena::new();
        let a = arena.allocate(100).expect("alloc a");
        let b = arena.allocate(28).expect("alloc b");
        let stats = arena.stats();
        assert_eq!(stats.live_allocations, 2);
        assert_eq!(stats.live_bytes, 128);

        let _ = arena.free(a);
        let _ = arena.free(b);
        let stats = arena.stats();
        assert_eq!(stats.live_allocations, 0);
        assert_eq!(stats.live_bytes, 0);
        assert_eq!(stats.total_allocations, 2);
        assert_eq!(stats.total_frees, 2);
    }

    #[test]
    fn free_quarantines_slot_with_new_generation() {
        let arena = AllocationArena::new();
        let ptr = arena.allocate(96).expect("allocation should succeed");
        let before = arena.lookup(ptr.as_ptr() as usize).expect("live slot");
        assert_eq!(before.state, SlotState::Live);

        assert_eq!(arena.free(ptr), FreeResult::Freed);

        let after = arena
            .lookup(ptr.as_ptr() as usize)
            .expect("freed slot should remain quarantined and discoverable");
        assert_eq!(after.state, SlotState::Quarantined);
        assert!(after.generation > before.generation);
        assert_eq!(arena.remaining_from(ptr.as_ptr() as usize), None);
    }

    #[test]
    fn oversized_request_returns_none() {
        let arena = AllocationArena::new();
        assert!(arena.allocate(usize::MAX).is_none());
        assert!(arena.allocate(usize::MAX - MIN_ALIGN).is_none());
        assert_eq!(arena.stats().live_allocations, 0);
    }

    #[test]
    fn quarantine_drain_evicts_oldest_when_entry_count_exceeded() {
        let arena = AllocationArena::new();
        let layout = Layout::from_size_align(MIN_ALIGN + CANARY_SIZE, MIN_ALIGN).unwrap();
        let mut shard = arena.shards[0].lock();

        let mut oldest_user = 0usize;
        for idx in 0..=QUARANTINE_MAX_ENTRIES {
            // SAFETY: layout is valid and non-zero.
            let raw = unsafe { std::alloc::alloc(layout) } as usize;
            assert_ne!(raw, 0);
            if idx == 0 {
                oldest_user = raw + MIN_ALIGN;
            }
            shard.quarantine.push_back(QuarantineEntry {
                user_base: raw + MIN_ALIGN,
                raw_base: raw,
                layout,
            });
            shard.quarantine_bytes += layout.size();
        }

        assert_eq!(drain_quarantine(&mut shard), 1);
        assert_eq!(shard.quarantine.len(), QUARANTINE_MAX_ENTRIES);
        assert_ne!(
            shard.quarantine.front().map(|e| e.user_base),
            Some(oldest_user),
            "oldest entry should be drained first"
        );
        assert_eq!(
            shard.quarantine_bytes,
            QUARANTINE_MAX_ENTRIES * layout.size()
        );
        // Remaining entries are released by the arena's Drop.
    }

    #[test]
    fn quarantine_stays_within_byte_budget() {
        let arena = AllocationArena::new();
        let big = QUARANTINE_MAX_BYTES / 2 + 4096;
        let first = arena.allocate(big).expect("first");
        let second = arena.allocate(big).expect("second");
        let third = arena.allocate(big).expect("third");
        let _ = arena.free(first);
        let _ = arena.free(second);
        let _ = arena.free(third);

        for shard in arena.shards.iter() {
            assert!(shard.lock().quarantine_bytes <= QUARANTINE_MAX_BYTES);
        }
    }
}
