//! Save-state container format.
//!
//! A save state is a flat byte buffer:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (60 bytes)                            │
//! │   magic      "VIBENES\0"          8 bytes    │
//! │   version    u32 (currently 1)    4 bytes    │
//! │   crc32      of cartridge PRG-ROM 4 bytes    │
//! │   timestamp  u64 Unix seconds     8 bytes    │
//! │   data_size  u32 payload length   4 bytes    │
//! │   reserved   zeroed              32 bytes    │
//! ├──────────────────────────────────────────────┤
//! │ Component blocks, in order:                  │
//! │   CPU · PPU · APU · bus · cartridge/mapper   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Restoring validates the magic, the
//! version, and the PRG-ROM CRC32; a state captured from a different
//! cartridge is refused with [`SaveStateError::WrongRom`]. Capture is
//! only meaningful at instruction boundaries; the console guarantees
//! that by construction.

pub mod error;

pub use error::SaveStateError;

use crate::bus::SystemBus;
use std::time::{SystemTime, UNIX_EPOCH};
use vibenes_common::{Snapshot, StateReader, StateWriter};
use vibenes_cpu::Cpu;

/// Save-state magic: "VIBENES\0".
pub const SAVE_STATE_MAGIC: [u8; 8] = *b"VIBENES\0";

/// Current save-state format version.
pub const SAVE_STATE_VERSION: u32 = 1;

/// Header length in bytes.
pub const HEADER_LEN: usize = 60;

/// Serialize the whole machine into a save-state buffer.
#[must_use]
pub fn serialize(cpu: &Cpu, bus: &SystemBus) -> Vec<u8> {
    let mut body = StateWriter::with_capacity(16 * 1024);
    cpu.save_state(&mut body);
    bus.ppu.save_state(&mut body);
    bus.apu.save_state(&mut body);
    bus.save_state(&mut body);
    bus.mapper.save_state(&mut body);
    let body = body.into_inner();

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut out = StateWriter::with_capacity(HEADER_LEN + body.len());
    out.put_bytes(&SAVE_STATE_MAGIC);
    out.put_u32(SAVE_STATE_VERSION);
    out.put_u32(crc32fast::hash(bus.mapper.prg_rom()));
    out.put_u64(timestamp);
    out.put_u32(body.len() as u32);
    out.put_bytes(&[0u8; 32]);
    out.put_bytes(&body);
    out.into_inner()
}

/// Restore the machine from a save-state buffer.
///
/// # Errors
///
/// Returns [`SaveStateError`] when the header is invalid, the checksum
/// belongs to a different ROM, or a component block fails to decode. The
/// machine may be partially restored on error and should be reset.
pub fn deserialize(cpu: &mut Cpu, bus: &mut SystemBus, data: &[u8]) -> Result<(), SaveStateError> {
    if data.len() < HEADER_LEN {
        return Err(SaveStateError::Truncated {
            expected: HEADER_LEN,
            actual: data.len(),
        });
    }

    let mut header = StateReader::new(&data[..HEADER_LEN]);
    let mut magic = [0u8; 8];
    header.get_bytes(&mut magic)?;
    if magic != SAVE_STATE_MAGIC {
        return Err(SaveStateError::BadMagic);
    }

    let version = header.get_u32()?;
    if version != SAVE_STATE_VERSION {
        return Err(SaveStateError::UnsupportedVersion(version));
    }

    let crc = header.get_u32()?;
    if crc != crc32fast::hash(bus.mapper.prg_rom()) {
        return Err(SaveStateError::WrongRom);
    }

    let _timestamp = header.get_u64()?;
    let data_size = header.get_u32()? as usize;

    let body = &data[HEADER_LEN..];
    if body.len() < data_size {
        return Err(SaveStateError::Truncated {
            expected: HEADER_LEN + data_size,
            actual: data.len(),
        });
    }

    let mut r = StateReader::new(&body[..data_size]);
    cpu.load_state(&mut r)?;
    bus.ppu.load_state(&mut r)?;
    bus.apu.load_state(&mut r)?;
    bus.load_state(&mut r)?;
    bus.mapper.load_state(&mut r)?;

    if !r.is_exhausted() {
        return Err(SaveStateError::TrailingData(r.remaining()));
    }

    log::debug!("restored save state ({data_size} byte payload)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibenes_cpu::Bus;
    use vibenes_mappers::{create_mapper, Rom, RomHeader};

    fn machine() -> (Cpu, SystemBus) {
        let rom = Rom {
            header: RomHeader {
                prg_pages: 2,
                chr_pages: 1,
                mapper: 0,
                mirroring: vibenes_mappers::Mirroring::Vertical,
                has_battery: false,
                has_trainer: false,
            },
            trainer: None,
            prg_rom: vec![0xEA; 32768],
            chr_rom: vec![0; 8192],
        };
        let mapper = create_mapper(&rom).unwrap();
        (Cpu::new(), SystemBus::new(mapper))
    }

    #[test]
    fn test_header_layout() {
        let (cpu, bus) = machine();
        let state = serialize(&cpu, &bus);
        assert_eq!(&state[..8], b"VIBENES\0");
        assert_eq!(u32::from_le_bytes(state[8..12].try_into().unwrap()), 1);
        let data_size =
            u32::from_le_bytes(state[24..28].try_into().unwrap()) as usize;
        assert_eq!(state.len(), HEADER_LEN + data_size);
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let (mut cpu, mut bus) = machine();
        bus.power_on();
        cpu.pc = 0x8000;
        cpu.a = 0x42;
        bus.write(0x0010, 0x99);
        bus.write(0x2000, 0x88);
        bus.tick_components(1000);

        let state = serialize(&cpu, &bus);

        let (mut cpu2, mut bus2) = machine();
        deserialize(&mut cpu2, &mut bus2, &state).unwrap();

        // Re-serializing the restored machine reproduces the same payload
        // (timestamps differ, so compare from the CRC onwards... the CRC
        // and payload are deterministic; mask out the timestamp bytes).
        let state2 = serialize(&cpu2, &bus2);
        assert_eq!(state[..16], state2[..16]);
        assert_eq!(state[24..], state2[24..]);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let (mut cpu, mut bus) = machine();
        let mut state = serialize(&cpu, &bus);
        state[0] = b'X';
        assert_eq!(
            deserialize(&mut cpu, &mut bus, &state),
            Err(SaveStateError::BadMagic)
        );
    }

    #[test]
    fn test_wrong_version_rejected() {
        let (mut cpu, mut bus) = machine();
        let mut state = serialize(&cpu, &bus);
        state[8] = 2;
        assert!(matches!(
            deserialize(&mut cpu, &mut bus, &state),
            Err(SaveStateError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_wrong_rom_rejected() {
        let (cpu, bus) = machine();
        let state = serialize(&cpu, &bus);

        // A machine with different PRG contents refuses the state.
        let rom = Rom {
            header: RomHeader {
                prg_pages: 2,
                chr_pages: 1,
                mapper: 0,
                mirroring: vibenes_mappers::Mirroring::Vertical,
                has_battery: false,
                has_trainer: false,
            },
            trainer: None,
            prg_rom: vec![0x00; 32768],
            chr_rom: vec![0; 8192],
        };
        let mut cpu2 = Cpu::new();
        let mut bus2 = SystemBus::new(create_mapper(&rom).unwrap());
        assert_eq!(
            deserialize(&mut cpu2, &mut bus2, &state),
            Err(SaveStateError::WrongRom)
        );
    }

    #[test]
    fn test_truncated_rejected() {
        let (mut cpu, mut bus) = machine();
        let state = serialize(&cpu, &bus);
        assert!(matches!(
            deserialize(&mut cpu, &mut bus, &state[..30]),
            Err(SaveStateError::Truncated { .. })
        ));
        assert!(matches!(
            deserialize(&mut cpu, &mut bus, &state[..state.len() - 4]),
            Err(SaveStateError::Truncated { .. })
        ));
    }
}
