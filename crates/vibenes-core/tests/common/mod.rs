//! Shared ROM builders for the integration tests.
#![allow(dead_code)] // Each test binary uses a subset of the builders

/// Build an iNES image: the given program at $8000, reset vector pointing
/// at it, remaining PRG filled with NOPs.
#[must_use]
pub fn nrom_with_program(program: &[u8]) -> Vec<u8> {
    build_ines(0, 2, 1, program)
}

/// Build an iNES image for an arbitrary mapper ID.
#[must_use]
pub fn build_ines(mapper: u8, prg_pages: u8, chr_pages: u8, program: &[u8]) -> Vec<u8> {
    let mut data = vec![0x4E, 0x45, 0x53, 0x1A];
    data.push(prg_pages);
    data.push(chr_pages);
    data.push((mapper & 0x0F) << 4); // Horizontal mirroring, no battery
    data.push(mapper & 0xF0);
    data.extend_from_slice(&[0; 8]);

    let prg_size = usize::from(prg_pages) * 16384;
    let mut prg = vec![0xEA; prg_size];
    prg[..program.len()].copy_from_slice(program);
    // Vectors at the top of the last bank: everything points at $8000.
    prg[prg_size - 4] = 0x00; // Reset low
    prg[prg_size - 3] = 0x80; // Reset high
    data.extend_from_slice(&prg);

    data.extend(std::iter::repeat(0x00).take(usize::from(chr_pages) * 8192));
    data
}

/// Build an image whose NMI and IRQ vectors point at distinct markers:
/// NMI -> $9000, IRQ -> $A000, reset -> $8000.
#[must_use]
pub fn nrom_with_vectors(program: &[u8]) -> Vec<u8> {
    let mut data = vec![0x4E, 0x45, 0x53, 0x1A, 2, 1, 0x00, 0x00];
    data.extend_from_slice(&[0; 8]);

    let mut prg = vec![0xEA; 32768];
    prg[..program.len()].copy_from_slice(program);
    // NMI vector -> $9000
    prg[0x7FFA] = 0x00;
    prg[0x7FFB] = 0x90;
    // Reset vector -> $8000
    prg[0x7FFC] = 0x00;
    prg[0x7FFD] = 0x80;
    // IRQ vector -> $A000
    prg[0x7FFE] = 0x00;
    prg[0x7FFF] = 0xA0;
    data.extend_from_slice(&prg);

    data.extend(std::iter::repeat(0x00).take(8192));
    data
}
