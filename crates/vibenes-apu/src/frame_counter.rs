//! APU frame counter.
//!
//! The frame counter divides the CPU clock into quarter-frame and
//! half-frame ticks that clock the envelope, linear counter, length
//! counter and sweep units. Two sequences exist:
//!
//! - 4-step mode: quarter frames at CPU cycles 7457, 14913, 22371 and
//!   29828/29829, with a frame IRQ at the sequence end unless inhibited.
//! - 5-step mode: an extra idle step stretches the sequence to 37281
//!   cycles and no IRQ is generated.
//!
//! Writing $4017 resets the sequence after a 3- or 4-cycle delay
//! depending on write parity; selecting 5-step mode clocks the quarter
//! and half frame units immediately.

use vibenes_common::{Snapshot, StateError, StateReader, StateWriter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Frame counter sequence mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrameCounterMode {
    /// 4-step sequence with frame IRQ.
    #[default]
    FourStep,
    /// 5-step sequence, no IRQ.
    FiveStep,
}

/// Events emitted by one frame-counter clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// Clock envelopes and the triangle linear counter.
    QuarterFrame,
    /// Clock length counters and sweeps.
    HalfFrame,
    /// Assert the frame IRQ (4-step mode, IRQ not inhibited).
    Irq,
}

/// 4-step sequence points (CPU cycles).
const FOUR_STEP_CYCLES: [u16; 5] = [7457, 14913, 22371, 29828, 29829];

/// 5-step sequence points (CPU cycles).
const FIVE_STEP_CYCLES: [u16; 5] = [7457, 14913, 22371, 29829, 37281];

/// The frame counter / sequencer.
#[derive(Debug, Clone)]
pub struct FrameCounter {
    /// CPU cycles into the current sequence.
    cycle: u16,
    /// Active sequence mode.
    mode: FrameCounterMode,
    /// IRQ inhibit flag ($4017 bit 6).
    irq_inhibit: bool,
    /// Frame IRQ asserted (cleared by $4015 reads or inhibit).
    irq_flag: bool,
    /// Cycles until a pending $4017 write takes effect (0 = none).
    reset_delay: u8,
    /// Mode latched by the pending $4017 write.
    pending_mode: Option<FrameCounterMode>,
}

impl FrameCounter {
    /// Create a frame counter in 4-step mode.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cycle: 0,
            mode: FrameCounterMode::FourStep,
            irq_inhibit: false,
            irq_flag: false,
            reset_delay: 0,
            pending_mode: None,
        }
    }

    /// Handle a $4017 write.
    ///
    /// `odd_cycle` is the CPU cycle parity at the write: the sequencer
    /// restart lands 3 cycles later on odd writes and 4 on even ones.
    pub fn write(&mut self, value: u8, odd_cycle: bool) {
        self.irq_inhibit = value & 0x40 != 0;
        if self.irq_inhibit {
            self.irq_flag = false;
        }

        let mode = if value & 0x80 != 0 {
            FrameCounterMode::FiveStep
        } else {
            FrameCounterMode::FourStep
        };
        self.pending_mode = Some(mode);
        self.reset_delay = if odd_cycle { 3 } else { 4 };
    }

    /// Advance one CPU cycle. Returns up to three events.
    pub fn clock(&mut self) -> [Option<FrameEvent>; 3] {
        let mut events = [None; 3];

        if self.reset_delay > 0 {
            self.reset_delay -= 1;
            if self.reset_delay == 0 {
                if let Some(mode) = self.pending_mode.take() {
                    self.mode = mode;
                    self.cycle = 0;

                    // 5-step mode clocks the units at the moment it starts.
                    if self.mode == FrameCounterMode::FiveStep {
                        events[0] = Some(FrameEvent::QuarterFrame);
                        events[1] = Some(FrameEvent::HalfFrame);
                        return events;
                    }
                }
            }
        }

        self.cycle += 1;

        match self.mode {
            FrameCounterMode::FourStep => self.clock_four_step(&mut events),
            FrameCounterMode::FiveStep => self.clock_five_step(&mut events),
        }

        events
    }

    fn clock_four_step(&mut self, events: &mut [Option<FrameEvent>; 3]) {
        match self.cycle {
            c if c == FOUR_STEP_CYCLES[0] => {
                events[0] = Some(FrameEvent::QuarterFrame);
            }
            c if c == FOUR_STEP_CYCLES[1] => {
                events[0] = Some(FrameEvent::QuarterFrame);
                events[1] = Some(FrameEvent::HalfFrame);
            }
            c if c == FOUR_STEP_CYCLES[2] => {
                events[0] = Some(FrameEvent::QuarterFrame);
            }
            c if c == FOUR_STEP_CYCLES[3] => {
                if !self.irq_inhibit {
                    self.irq_flag = true;
                    events[0] = Some(FrameEvent::Irq);
                }
            }
            c if c == FOUR_STEP_CYCLES[4] => {
                events[0] = Some(FrameEvent::QuarterFrame);
                events[1] = Some(FrameEvent::HalfFrame);
                if !self.irq_inhibit {
                    self.irq_flag = true;
                    events[2] = Some(FrameEvent::Irq);
                }
                self.cycle = 0;
            }
            _ => {}
        }
    }

    fn clock_five_step(&mut self, events: &mut [Option<FrameEvent>; 3]) {
        match self.cycle {
            c if c == FIVE_STEP_CYCLES[0] => {
                events[0] = Some(FrameEvent::QuarterFrame);
            }
            c if c == FIVE_STEP_CYCLES[1] => {
                events[0] = Some(FrameEvent::QuarterFrame);
                events[1] = Some(FrameEvent::HalfFrame);
            }
            c if c == FIVE_STEP_CYCLES[2] => {
                events[0] = Some(FrameEvent::QuarterFrame);
            }
            c if c == FIVE_STEP_CYCLES[3] => {
                // Idle step in 5-step mode.
            }
            c if c == FIVE_STEP_CYCLES[4] => {
                events[0] = Some(FrameEvent::QuarterFrame);
                events[1] = Some(FrameEvent::HalfFrame);
                self.cycle = 0;
            }
            _ => {}
        }
    }

    /// Whether the frame IRQ is asserted.
    #[must_use]
    pub fn irq_flag(&self) -> bool {
        self.irq_flag
    }

    /// Clear the frame IRQ (reading $4015 does this).
    pub fn clear_irq(&mut self) {
        self.irq_flag = false;
    }

    /// Current sequence mode.
    #[must_use]
    pub fn mode(&self) -> FrameCounterMode {
        self.mode
    }

    /// Cycles into the current sequence.
    #[must_use]
    pub fn cycle(&self) -> u16 {
        self.cycle
    }

    /// Reset: IRQs inhibited, 4-step mode.
    pub fn reset(&mut self) {
        *self = Self::new();
        self.irq_inhibit = true;
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot for FrameCounter {
    fn save_state(&self, w: &mut StateWriter) {
        w.put_u16(self.cycle);
        w.put_bool(self.mode == FrameCounterMode::FiveStep);
        w.put_bool(self.irq_inhibit);
        w.put_bool(self.irq_flag);
        w.put_u8(self.reset_delay);
        match self.pending_mode {
            None => w.put_u8(0),
            Some(FrameCounterMode::FourStep) => w.put_u8(1),
            Some(FrameCounterMode::FiveStep) => w.put_u8(2),
        }
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.cycle = r.get_u16()?;
        self.mode = if r.get_bool()? {
            FrameCounterMode::FiveStep
        } else {
            FrameCounterMode::FourStep
        };
        self.irq_inhibit = r.get_bool()?;
        self.irq_flag = r.get_bool()?;
        self.reset_delay = r.get_u8()?;
        self.pending_mode = match r.get_u8()? {
            0 => None,
            1 => Some(FrameCounterMode::FourStep),
            2 => Some(FrameCounterMode::FiveStep),
            other => {
                return Err(StateError::InvalidValue {
                    field: "frame counter pending mode",
                    value: u32::from(other),
                })
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let fc = FrameCounter::new();
        assert_eq!(fc.mode(), FrameCounterMode::FourStep);
        assert!(!fc.irq_flag());
    }

    #[test]
    fn test_four_step_irq_at_sequence_end() {
        let mut fc = FrameCounter::new();
        for _ in 0..FOUR_STEP_CYCLES[3] {
            fc.clock();
        }
        assert!(fc.irq_flag());
    }

    #[test]
    fn test_irq_inhibit_blocks_and_clears() {
        let mut fc = FrameCounter::new();
        for _ in 0..FOUR_STEP_CYCLES[3] {
            fc.clock();
        }
        assert!(fc.irq_flag());

        // Setting inhibit clears the flag immediately.
        fc.write(0x40, false);
        assert!(!fc.irq_flag());

        // And no further IRQs fire.
        for _ in 0..40_000 {
            fc.clock();
        }
        assert!(!fc.irq_flag());
    }

    #[test]
    fn test_write_reset_delay_parity() {
        let mut fc = FrameCounter::new();
        fc.write(0x00, true);
        assert_eq!(fc.reset_delay, 3);
        fc.write(0x00, false);
        assert_eq!(fc.reset_delay, 4);
    }

    #[test]
    fn test_five_step_mode_clocks_immediately() {
        let mut fc = FrameCounter::new();
        fc.write(0x80, true);

        let mut saw_half = false;
        for _ in 0..4 {
            let events = fc.clock();
            if events.contains(&Some(FrameEvent::HalfFrame)) {
                saw_half = true;
            }
        }
        assert!(saw_half);
        assert_eq!(fc.mode(), FrameCounterMode::FiveStep);
    }

    #[test]
    fn test_five_step_no_irq() {
        let mut fc = FrameCounter::new();
        fc.write(0x80, false);
        for _ in 0..80_000 {
            fc.clock();
        }
        assert!(!fc.irq_flag());
    }

    #[test]
    fn test_quarter_frame_cadence() {
        let mut fc = FrameCounter::new();
        let mut quarters = 0;
        for _ in 0..FOUR_STEP_CYCLES[4] {
            let events = fc.clock();
            if events[0] == Some(FrameEvent::QuarterFrame) {
                quarters += 1;
            }
        }
        assert_eq!(quarters, 4);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut fc = FrameCounter::new();
        fc.write(0x80, true);
        for _ in 0..100 {
            fc.clock();
        }

        let mut w = StateWriter::new();
        fc.save_state(&mut w);
        let buf = w.into_inner();

        let mut restored = FrameCounter::new();
        restored.load_state(&mut StateReader::new(&buf)).unwrap();
        assert_eq!(restored.cycle(), fc.cycle());
        assert_eq!(restored.mode(), fc.mode());
    }
}
