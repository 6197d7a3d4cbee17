//! # Tick Clock
//!
//! Coarse monotonic time source for cache access stamps.
//!
//! The host refreshes it once per simulation step; every cache access reads
//! the last published tick instead of querying the OS clock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Last published simulation tick.
///
/// Never moves backwards: `set` with an older tick is ignored.
#[derive(Debug, Default)]
pub struct TickClock {
    tick: AtomicU64,
}

impl TickClock {
    /// Creates a clock at tick zero.
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a clock at the given tick.
    #[must_use]
    pub const fn starting_at(tick: u64) -> Self {
        Self {
            tick: AtomicU64::new(tick),
        }
    }

    /// Returns the last published tick.
    #[inline]
    #[must_use]
    pub fn now(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    /// Advances the clock by `ticks` and returns the new value.
    #[inline]
    pub fn advance(&self, ticks: u64) -> u64 {
        self.tick.fetch_add(ticks, Ordering::AcqRel) + ticks
    }

    /// Publishes `tick` if it is newer than the current value.
    #[inline]
    pub fn set(&self, tick: u64) {
        self.tick.fetch_max(tick, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advance() {
        let clock = TickClock::new();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.advance(5), 5);
        assert_eq!(clock.advance(1), 6);
        assert_eq!(clock.now(), 6);
    }

    #[test]
    fn test_clock_never_goes_back() {
        let clock = TickClock::starting_at(100);
        clock.set(40);
        assert_eq!(clock.now(), 100);
        clock.set(120);
        assert_eq!(clock.now(), 120);
    }
}
