//! Emulator error taxonomy.
//!
//! Only the host-facing entry points (ROM loading, save-state loading)
//! return errors. Runtime faults never propagate: decode misses produce
//! open-bus values and unstable opcodes halt the CPU while the PPU keeps
//! scanning out, just as the hardware freezes with its last frame visible.

use crate::save_state::SaveStateError;
use vibenes_mappers::RomError;

/// Top-level error type for the emulation core.
#[derive(Debug, thiserror::Error)]
pub enum EmuError {
    /// Bad magic, truncated file or inconsistent header.
    #[error("invalid ROM image: {0}")]
    InvalidRom(RomError),

    /// Mapper ID outside the supported set {0, 1, 2, 3, 4}.
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u16),

    /// Execution reached an unstable-illegal opcode; the CPU is halted.
    #[error("CPU halted on unstable opcode {opcode:#04x}")]
    IllegalCpuInstruction {
        /// The offending opcode byte.
        opcode: u8,
    },

    /// Save-state magic/version/CRC mismatch or truncated data.
    #[error("save state rejected: {0}")]
    SaveStateCorrupt(#[from] SaveStateError),

    /// Operation requires a loaded cartridge.
    #[error("no cartridge loaded")]
    NoCartridge,

    /// A host-provided source refused a read or write.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<RomError> for EmuError {
    fn from(err: RomError) -> Self {
        match err {
            RomError::UnsupportedMapper(n) => Self::UnsupportedMapper(n),
            other => Self::InvalidRom(other),
        }
    }
}
