//! Standard controller shift-register protocol.
//!
//! Writing 1 to the $4016 strobe bit latches the live button state into
//! both controllers continuously; on the high-to-low transition the state
//! freezes and each $4016/$4017 read shifts out one button in the order
//! A, B, Select, Start, Up, Down, Left, Right. After eight reads the
//! serial output sticks at 1.

use bitflags::bitflags;
use vibenes_common::{Byte, Snapshot, StateError, StateReader, StateWriter};

bitflags! {
    /// Button mask in shift-out order (bit 0 first).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Buttons: u8 {
        /// A button.
        const A = 1 << 0;
        /// B button.
        const B = 1 << 1;
        /// Select button.
        const SELECT = 1 << 2;
        /// Start button.
        const START = 1 << 3;
        /// D-pad up.
        const UP = 1 << 4;
        /// D-pad down.
        const DOWN = 1 << 5;
        /// D-pad left.
        const LEFT = 1 << 6;
        /// D-pad right.
        const RIGHT = 1 << 7;
    }
}

/// One controller port's shift register.
#[derive(Debug, Clone, Copy, Default)]
pub struct Controller {
    /// Live button state from the host.
    buttons: Byte,
    /// Latched state being shifted out.
    shift: Byte,
    /// Bits shifted out since the last latch.
    shift_count: u8,
    /// Strobe line level.
    strobe: bool,
}

impl Controller {
    /// Create an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host-side button update; latched on the next strobe edge (or
    /// immediately while the strobe is held high).
    pub fn set_buttons(&mut self, mask: Byte) {
        self.buttons = mask;
        if self.strobe {
            self.shift = mask;
            self.shift_count = 0;
        }
    }

    /// Current live button state.
    #[must_use]
    pub fn buttons(&self) -> Byte {
        self.buttons
    }

    /// $4016 strobe write (only bit 0 matters).
    pub fn write_strobe(&mut self, value: Byte) {
        let new_strobe = value & 0x01 != 0;

        // While high, the shift register continuously tracks the buttons;
        // the falling edge freezes it for serial readout.
        if new_strobe || self.strobe {
            self.shift = self.buttons;
            self.shift_count = 0;
        }
        self.strobe = new_strobe;
    }

    /// Serial read: bit 0 of the result is the next button bit.
    pub fn read(&mut self) -> Byte {
        if self.strobe {
            return self.buttons & 0x01;
        }
        if self.shift_count >= 8 {
            // Exhausted: the serial line reads 1.
            return 0x01;
        }
        let bit = self.shift & 0x01;
        self.shift >>= 1;
        self.shift_count += 1;
        bit
    }

    /// Reset to idle.
    pub fn reset(&mut self) {
        self.shift = 0;
        self.shift_count = 0;
        self.strobe = false;
    }
}

impl Snapshot for Controller {
    fn save_state(&self, w: &mut StateWriter) {
        w.put_u8(self.buttons);
        w.put_u8(self.shift);
        w.put_u8(self.shift_count);
        w.put_bool(self.strobe);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.buttons = r.get_u8()?;
        self.shift = r.get_u8()?;
        self.shift_count = r.get_u8()?;
        self.strobe = r.get_bool()?;
        Ok(())
    }
}
