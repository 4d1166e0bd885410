//! Channel length counters.
//!
//! Each channel owns a length counter that silences it when it reaches
//! zero. Writing the channel's fourth register loads the counter from a
//! 32-entry lookup table (when the channel is enabled via $4015); the
//! frame counter's half-frame ticks count it down unless halted. $4015
//! reads report which counters are non-zero.

use vibenes_common::{Snapshot, StateError, StateReader, StateWriter};

/// Length values indexed by the 5-bit load field.
const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, //
    12, 16, 24, 18, 48, 20, 96, 22, 192, 24, 72, 26, 16, 28, 32, 30,
];

/// One channel's length counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthCounter {
    counter: u8,
    halted: bool,
    enabled: bool,
}

impl LengthCounter {
    /// Create a disabled, zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the 5-bit table index (the high bits of the channel's
    /// length register). Ignored while the channel is disabled.
    pub fn load(&mut self, index: u8) {
        if self.enabled {
            self.counter = LENGTH_TABLE[usize::from(index & 0x1F)];
        }
    }

    /// Half-frame tick.
    pub fn clock(&mut self) {
        if !self.halted && self.counter > 0 {
            self.counter -= 1;
        }
    }

    /// Channel enable from $4015; disabling zeroes the counter.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.counter = 0;
        }
    }

    /// Halt flag (the channel's envelope-loop / length-halt bit).
    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    /// Whether the counter is still running (reported by $4015).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.counter > 0
    }

    /// Current counter value.
    #[must_use]
    pub fn value(&self) -> u8 {
        self.counter
    }
}

impl Snapshot for LengthCounter {
    fn save_state(&self, w: &mut StateWriter) {
        w.put_u8(self.counter);
        w.put_bool(self.halted);
        w.put_bool(self.enabled);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.counter = r.get_u8()?;
        self.halted = r.get_bool()?;
        self.enabled = r.get_bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_requires_enable() {
        let mut lc = LengthCounter::new();
        lc.load(1);
        assert!(!lc.is_active());

        lc.set_enabled(true);
        lc.load(1);
        assert_eq!(lc.value(), 254);
    }

    #[test]
    fn test_clock_counts_down() {
        let mut lc = LengthCounter::new();
        lc.set_enabled(true);
        lc.load(3); // 2
        lc.clock();
        assert!(lc.is_active());
        lc.clock();
        assert!(!lc.is_active());
        lc.clock(); // Stays at zero
        assert_eq!(lc.value(), 0);
    }

    #[test]
    fn test_halt_freezes_counter() {
        let mut lc = LengthCounter::new();
        lc.set_enabled(true);
        lc.load(0); // 10
        lc.set_halted(true);
        for _ in 0..20 {
            lc.clock();
        }
        assert_eq!(lc.value(), 10);
    }

    #[test]
    fn test_disable_zeroes() {
        let mut lc = LengthCounter::new();
        lc.set_enabled(true);
        lc.load(0);
        assert!(lc.is_active());
        lc.set_enabled(false);
        assert!(!lc.is_active());
    }
}
