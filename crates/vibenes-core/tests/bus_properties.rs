//! Bus-level invariants, property-tested where the address space is the
//! input domain.

mod common;

use common::nrom_with_program;
use proptest::prelude::*;
use vibenes_core::{Bus, Console};

fn booted_console() -> Console {
    let mut console = Console::new();
    console.load_rom(&nrom_with_program(&[])).unwrap();
    console
}

proptest! {
    /// Every address in $0000-$1FFF reads the RAM cell at addr % $0800.
    #[test]
    fn ram_mirroring_holds(addr in 0x0000u16..0x2000, value: u8) {
        let mut console = booted_console();
        let bus = console.bus_mut().unwrap();
        bus.write(addr, value);
        prop_assert_eq!(bus.ram[(addr & 0x07FF) as usize], value);
        for mirror in 0..4u16 {
            prop_assert_eq!(bus.read((addr & 0x07FF) + mirror * 0x0800), value);
        }
    }

    /// Sprite-backdrop palette entries alias their background versions.
    #[test]
    fn palette_mirrors_hold(k in prop::sample::select(vec![0x10u16, 0x14, 0x18, 0x1C]), value: u8) {
        let mut console = booted_console();
        let bus = console.bus_mut().unwrap();

        // Write $3F00+k through $2006/$2007.
        bus.write(0x2006, 0x3F);
        bus.write(0x2006, k as u8);
        bus.write(0x2007, value);

        // Read back through the mirror target $3F00+k-$10.
        bus.write(0x2006, 0x3F);
        bus.write(0x2006, (k - 0x10) as u8);
        let read = bus.read(0x2007);
        prop_assert_eq!(read & 0x3F, value & 0x3F);
    }

    /// Unmapped and write-only reads return the open-bus latch.
    #[test]
    fn open_bus_returns_last_value(addr in 0x4000u16..0x4014, value: u8) {
        let mut console = booted_console();
        let bus = console.bus_mut().unwrap();
        bus.write(0x0000, value);
        let _ = bus.read(0x0000);
        prop_assert_eq!(bus.read(addr), value);
    }
}

#[test]
fn test_disabled_test_registers_are_open_bus() {
    let mut console = booted_console();
    let bus = console.bus_mut().unwrap();
    bus.write(0x0000, 0x5A);
    let _ = bus.read(0x0000);
    for addr in 0x4018..=0x401F {
        assert_eq!(bus.read(addr), 0x5A, "at {addr:#06x}");
    }
}

#[test]
fn test_controller_protocol_through_the_bus() {
    let mut console = booted_console();
    console.set_buttons(0, 0b0000_1001); // A + Start

    let bus = console.bus_mut().unwrap();
    bus.write(0x4016, 1);
    bus.write(0x4016, 0);

    let expected = [1, 0, 0, 1, 0, 0, 0, 0];
    for (i, &bit) in expected.iter().enumerate() {
        assert_eq!(bus.read(0x4016) & 1, bit, "bit {i}");
    }
    // Shift register exhausted: constant 1 in bit 0.
    assert_eq!(bus.read(0x4016) & 1, 1);
}

#[test]
fn test_second_controller_reads_on_4017() {
    let mut console = booted_console();
    console.set_buttons(1, 0b0000_0010); // B on pad 2

    let bus = console.bus_mut().unwrap();
    bus.write(0x4016, 1);
    bus.write(0x4016, 0);

    assert_eq!(bus.read(0x4017) & 1, 0); // A
    assert_eq!(bus.read(0x4017) & 1, 1); // B
}
