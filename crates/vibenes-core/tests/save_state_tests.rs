//! Save-state round trips across the whole machine.

mod common;

use common::{build_ines, nrom_with_program};
use vibenes_core::{Console, EmuError};

/// A program that keeps mutating RAM so machine state stays interesting.
fn busy_program() -> Vec<u8> {
    vec![
        0xA2, 0x00, // LDX #$00
        0xE8, // loop: INX
        0x8E, 0x00, 0x03, // STX $0300
        0x9D, 0x00, 0x02, // STA $0200,X
        0x4C, 0x02, 0x80, // JMP loop
    ]
}

#[test]
fn test_round_trip_preserves_execution() {
    let rom = nrom_with_program(&busy_program());

    let mut original = Console::new();
    original.load_rom(&rom).unwrap();
    original.step_cycles(12_345);

    let state = original.save_state().unwrap();

    // A fresh console restored from the state must track the original
    // cycle for cycle.
    let mut restored = Console::new();
    restored.load_rom(&rom).unwrap();
    restored.load_state(&state).unwrap();

    // Run both past a full frame so every visible pixel is rewritten by
    // the synchronized machines.
    for _ in 0..20_000 {
        original.step();
        restored.step();

        let (a, b) = (original.cpu().unwrap(), restored.cpu().unwrap());
        assert_eq!(a.pc, b.pc);
        assert_eq!(a.a, b.a);
        assert_eq!(a.x, b.x);
        assert_eq!(a.status, b.status);
    }
    assert_eq!(
        original.bus().unwrap().ram,
        restored.bus().unwrap().ram
    );
    assert_eq!(
        original.bus().unwrap().ppu.frame_buffer(),
        restored.bus().unwrap().ppu.frame_buffer()
    );
}

#[test]
fn test_save_then_load_is_identity() {
    let rom = nrom_with_program(&busy_program());
    let mut console = Console::new();
    console.load_rom(&rom).unwrap();
    console.step_cycles(10_000);

    let first = console.save_state().unwrap();
    console.load_state(&first).unwrap();
    let second = console.save_state().unwrap();

    // Identical except for the header timestamp (bytes 16-23).
    assert_eq!(first[..16], second[..16]);
    assert_eq!(first[24..], second[24..]);
}

#[test]
fn test_state_refused_for_different_rom() {
    let rom_a = nrom_with_program(&busy_program());
    let rom_b = nrom_with_program(&[0xA9, 0x01]);

    let mut console_a = Console::new();
    console_a.load_rom(&rom_a).unwrap();
    let state = console_a.save_state().unwrap();

    let mut console_b = Console::new();
    console_b.load_rom(&rom_b).unwrap();
    let err = console_b.load_state(&state).unwrap_err();
    assert!(matches!(err, EmuError::SaveStateCorrupt(_)));
    assert!(err.to_string().contains("wrong ROM"));
}

#[test]
fn test_mapper_state_survives_round_trip() {
    // MMC3 cartridge with banking and IRQ state configured.
    let program = [
        0xA9, 0x06, // LDA #$06
        0x8D, 0x00, 0x80, // STA $8000 (bank select = R6)
        0xA9, 0x03, // LDA #$03
        0x8D, 0x01, 0x80, // STA $8001 (R6 = 3)
        0xA9, 0x10, // LDA #$10
        0x8D, 0x00, 0xC0, // STA $C000 (latch)
        0x8D, 0x01, 0xE0, // STA $E001 (enable)
    ];
    let rom = build_ines(4, 4, 1, &program);

    let mut console = Console::new();
    console.load_rom(&rom).unwrap();
    for _ in 0..7 {
        console.step();
    }
    let state = console.save_state().unwrap();

    let mut restored = Console::new();
    restored.load_rom(&rom).unwrap();
    restored.load_state(&state).unwrap();

    // Banked PRG reads agree everywhere in the switchable window.
    for addr in (0x8000u16..0xA000).step_by(0x400) {
        assert_eq!(
            console.peek_memory(addr),
            restored.peek_memory(addr),
            "at {addr:#06x}"
        );
    }
}

#[test]
fn test_corrupt_payload_rejected() {
    let rom = nrom_with_program(&busy_program());
    let mut console = Console::new();
    console.load_rom(&rom).unwrap();
    let mut state = console.save_state().unwrap();

    // Chop the payload.
    state.truncate(state.len() - 100);
    assert!(matches!(
        console.load_state(&state),
        Err(EmuError::SaveStateCorrupt(_))
    ));
}
