//! CPU Status Register (P register) flags.
//!
//! The 6502 status register is an 8-bit register that contains various flags
//! reflecting the state of the processor:
//!
//! ```text
//! 7  6  5  4  3  2  1  0
//! N  V  U  B  D  I  Z  C
//! │  │  │  │  │  │  │  └─ Carry
//! │  │  │  │  │  │  └──── Zero
//! │  │  │  │  │  └─────── Interrupt Disable
//! │  │  │  │  └────────── Decimal Mode (no BCD arithmetic on the 2A03)
//! │  │  │  └───────────── Break (1 when pushed from PHP/BRK, 0 from IRQ/NMI)
//! │  │  └──────────────── Unused (always reads 1)
//! │  └─────────────────── Overflow
//! └────────────────────── Negative
//! ```

use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags! {
    /// CPU Status Register flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct Status: u8 {
        /// Carry flag - set on unsigned overflow out of bit 7 or a shift out of bit 0.
        const C = 1 << 0;

        /// Zero flag - set if the result of the last operation was zero.
        const Z = 1 << 1;

        /// Interrupt Disable flag - when set, IRQ interrupts are ignored.
        /// NMI is not affected.
        const I = 1 << 2;

        /// Decimal Mode flag - SED/CLD/PHP/PLP honor it, but ADC/SBC stay
        /// binary: the 2A03 has no decimal circuitry.
        const D = 1 << 3;

        /// Break flag - distinguishes BRK/PHP pushes (1) from IRQ/NMI pushes (0).
        const B = 1 << 4;

        /// Unused flag - always 1 when the register is read or pushed.
        const U = 1 << 5;

        /// Overflow flag - set on signed overflow.
        const V = 1 << 6;

        /// Negative flag - copy of bit 7 of the result.
        const N = 1 << 7;
    }
}

impl Status {
    /// Status value at power-on: I and U set.
    pub const POWER_ON: Self = Self::I.union(Self::U);

    /// Creates a new status register in the power-on state.
    #[must_use]
    pub const fn new() -> Self {
        Self::POWER_ON
    }

    /// Sets or clears the Zero and Negative flags from a result value.
    #[inline]
    pub fn set_zn(&mut self, value: u8) {
        self.set_flag(Self::Z, value == 0);
        self.set_flag(Self::N, value & 0x80 != 0);
    }

    /// Sets or clears a flag.
    #[inline]
    pub fn set_flag(&mut self, flag: Self, value: bool) {
        if value {
            *self |= flag;
        } else {
            *self &= !flag;
        }
    }

    /// Converts the register to the byte pushed on the stack.
    /// U is always set; B reflects the push source (BRK/PHP vs interrupt).
    #[inline]
    #[must_use]
    pub const fn to_stack_byte(self, brk: bool) -> u8 {
        let mut value = self.bits() | Self::U.bits();
        if brk {
            value |= Self::B.bits();
        } else {
            value &= !Self::B.bits();
        }
        value
    }

    /// Builds the register from a byte pulled off the stack.
    /// B is discarded and U forced to 1.
    #[inline]
    #[must_use]
    pub fn from_stack_byte(value: u8) -> Self {
        Self::from_bits_truncate((value & !Self::B.bits()) | Self::U.bits())
    }
}
