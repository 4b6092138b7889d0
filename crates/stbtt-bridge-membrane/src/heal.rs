//! Healing policy.
//!
//! When the bridge detects an unsafe operation it applies a deterministic
//! repair instead of invoking undefined behavior. Release misuse is always
//! ignored; length repairs only happen in hardened mode.

use std::sync::atomic::{AtomicU64, Ordering};

/// Actions the bridge can take to heal an unsafe operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealingAction {
    /// Clamp a length to fit within known allocation bounds.
    ClampSize { requested: usize, clamped: usize },
    /// Stop a string scan at the end of the allocation it started in.
    TruncateScan { limit: usize },
    /// Ignore a release of an already released pointer.
    IgnoreDoubleFree,
    /// Ignore a release of a pointer the allocator does not own.
    IgnoreForeignFree,
    /// Perform an overlapping copy as a move.
    UpgradeToMove,
    /// Return a safe default instead of dereferencing null.
    ReturnSafeDefault,
    None,
}

impl HealingAction {
    #[must_use]
    pub const fn is_heal(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Stable label used in bridge events.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::ClampSize { .. } => "clamp_size",
            Self::TruncateScan { .. } => "truncate_scan",
            Self::IgnoreDoubleFree => "ignore_double_free",
            Self::IgnoreForeignFree => "ignore_foreign_free",
            Self::UpgradeToMove => "upgrade_to_move",
            Self::ReturnSafeDefault => "return_safe_default",
            Self::None => "none",
        }
    }
}

/// Counters for every healing action applied.
pub struct HealingPolicy {
    pub total_heals: AtomicU64,
    pub size_clamps: AtomicU64,
    pub scan_truncations: AtomicU64,
    pub double_frees: AtomicU64,
    pub foreign_frees: AtomicU64,
    pub move_upgrades: AtomicU64,
    pub safe_defaults: AtomicU64,
}

impl HealingPolicy {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            total_heals: AtomicU64::new(0),
            size_clamps: AtomicU64::new(0),
            scan_truncations: AtomicU64::new(0),
            double_frees: AtomicU64::new(0),
            foreign_frees: AtomicU64::new(0),
            move_upgrades: AtomicU64::new(0),
            safe_defaults: AtomicU64::new(0),
        }
    }

    pub fn record(&self, action: &HealingAction) {
        if action.is_heal() {
            self.total_heals.fetch_add(1, Ordering::Relaxed);
        }
        let counter = match action {
            HealingAction::ClampSize { .. } => &self.size_clamps,
            HealingAction::TruncateScan { .. } => &self.scan_truncations,
            HealingAction::IgnoreDoubleFree => &self.double_frees,
            HealingAction::IgnoreForeignFree => &self.foreign_frees,
            HealingAction::UpgradeToMove => &self.move_upgrades,
            HealingAction::ReturnSafeDefault => &self.safe_defaults,
            HealingAction::None => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Decide healing for a copy/fill with optional known bounds on each side.
    #[must_use]
    pub fn heal_copy_bounds(
        &self,
        requested: usize,
        src_remaining: Option<usize>,
        dst_remaining: Option<usize>,
    ) -> HealingAction {
        let available = match (src_remaining, dst_remaining) {
            (Some(s), Some(d)) => s.min(d),
            (Some(s), None) => s,
            (None, Some(d)) => d,
            (None, None) => return HealingAction::None,
        };

        if requested > available {
            HealingAction::ClampSize {
                requested,
                clamped: available,
            }
        } else {
            HealingAction::None
        }
    }

    /// Decide whether a copy of `n` bytes between `dst` and `src` overlaps.
    #[must_use]
    pub fn heal_overlap(&self, dst: usize, src: usize, n: usize) -> HealingAction {
        let overlaps = dst < src.saturating_add(n) && src < dst.saturating_add(n);
        if n > 0 && dst != src && overlaps {
            HealingAction::UpgradeToMove
        } else {
            HealingAction::None
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total_heals.load(Ordering::Relaxed)
    }
}

impl Default for HealingPolicy {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_POLICY: HealingPolicy = HealingPolicy::new();

#[must_use]
pub fn global_healing_policy() -> &'static HealingPolicy {
    &GLOBAL_POLICY
}
