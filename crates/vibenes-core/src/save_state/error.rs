//! Save-state error type.

use vibenes_common::StateError;

/// Reasons a save state is rejected or fails to apply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaveStateError {
    /// The buffer does not start with the expected magic bytes.
    #[error("not a save state (bad magic)")]
    BadMagic,

    /// The format version is newer than this build understands.
    #[error("unsupported save state version {0}")]
    UnsupportedVersion(u32),

    /// The embedded PRG-ROM checksum does not match the loaded cartridge.
    #[error("wrong ROM")]
    WrongRom,

    /// The buffer is shorter than the header or its declared payload.
    #[error("save state truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes the header (or format) requires.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// Bytes were left over after all component blocks were restored.
    #[error("save state has {0} trailing bytes")]
    TrailingData(usize),

    /// A component block failed to decode.
    #[error("component state invalid: {0}")]
    State(#[from] StateError),
}
