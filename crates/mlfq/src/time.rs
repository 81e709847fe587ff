//! Tick counter type and clock sources.
//!
//! The scheduler never reads time on its own; callers pass the current
//! [`Tick`] into every entry point. [`Clock`] is the read-only tick source
//! the [`Kernel`](crate::kernel::Kernel) facade samples.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Monotonic system tick count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tick(u64);

impl Tick {
    /// Zero tick
    pub const ZERO: Self = Self(0);

    /// Create a new tick count
    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Get the raw tick value
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Ticks elapsed since `earlier`.
    ///
    /// The tick source is monotonic, so an `earlier` in the future can only
    /// come from a stale stamp; it counts as no time at all.
    pub const fn elapsed_since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl From<u64> for Tick {
    fn from(ticks: u64) -> Self {
        Self(ticks)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Tick {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.0)
    }
}

/// Read-only source of the current tick.
pub trait Clock {
    /// Returns the current tick.
    fn now(&self) -> Tick;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Tick {
        (**self).now()
    }
}

/// Clock advanced explicitly by its owner.
///
/// Used for hosted simulation, where the "hardware" timer is a test or a
/// simulation loop calling [`ManualClock::advance`].
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `start`.
    pub const fn new(start: u64) -> Self {
        Self {
            ticks: AtomicU64::new(start),
        }
    }

    /// Moves the clock forward by `ticks` and returns the new reading.
    pub fn advance(&self, ticks: u64) -> Tick {
        Tick(self.ticks.fetch_add(ticks, Ordering::Relaxed) + ticks)
    }

    /// Sets the clock to `tick`. Panics if that would move time backwards.
    pub fn set(&self, tick: Tick) {
        let previous = self.ticks.swap(tick.0, Ordering::Relaxed);
        assert!(
            previous <= tick.0,
            "clock moved backwards from {previous} to {tick}"
        );
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        Tick(self.ticks.load(Ordering::Relaxed))
    }
}
