//! 6502 opcode decode table.
//!
//! All 256 opcodes are described here: the 151 documented instructions, the
//! stable illegal family (LAX, SAX, DCP, ISC, SLO, RLA, SRE, RRA and the
//! multi-byte NOPs), and the remaining slots. The unstable illegals (ANE,
//! LXA, SHA, SHX, SHY, TAS, LAS, ANC, ALR, ARR, SBX) and the KIL slots jam
//! the CPU; their table entries carry [`Mnemonic::Unstable`] / [`Mnemonic::Jam`].
//!
//! Base cycle counts follow the published timing table. The `page_penalty`
//! flag marks read instructions that pay one extra cycle when indexing
//! crosses a 256-byte page; writes and read-modify-writes always pay the
//! fixed-up cost and never take the penalty.

use crate::addressing::AddressingMode;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Instruction mnemonics, including the stable illegal family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)] // Mnemonics are self-describing
pub enum Mnemonic {
    // Loads / stores
    Lda, Ldx, Ldy, Sta, Stx, Sty,
    // Transfers
    Tax, Tay, Tsx, Txa, Txs, Tya,
    // Stack
    Pha, Php, Pla, Plp,
    // Logic
    And, Eor, Ora, Bit,
    // Arithmetic
    Adc, Sbc, Cmp, Cpx, Cpy,
    // Increments / decrements
    Inc, Inx, Iny, Dec, Dex, Dey,
    // Shifts
    Asl, Lsr, Rol, Ror,
    // Jumps / calls
    Jmp, Jsr, Rts, Rti, Brk,
    // Branches
    Bcc, Bcs, Beq, Bmi, Bne, Bpl, Bvc, Bvs,
    // Flag operations
    Clc, Cld, Cli, Clv, Sec, Sed, Sei,
    /// Official and multi-byte illegal NOPs (the memory forms still read).
    #[default]
    Nop,
    // Stable illegal opcodes
    /// LDA + LDX combined.
    Lax,
    /// Store A AND X.
    Sax,
    /// DEC + CMP combined.
    Dcp,
    /// INC + SBC combined.
    Isc,
    /// ASL + ORA combined.
    Slo,
    /// ROL + AND combined.
    Rla,
    /// LSR + EOR combined.
    Sre,
    /// ROR + ADC combined.
    Rra,
    /// KIL/JAM slot: fetching one halts the CPU.
    Jam,
    /// Unstable illegal (ANE, LXA, SHA, SHX, SHY, TAS, LAS, ANC, ALR, ARR,
    /// SBX): behavior depends on analog bus effects, so the CPU halts.
    Unstable,
}

/// How an instruction drives the data bus once its address is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Reads the operand (pays the page-cross penalty when flagged).
    Read,
    /// Writes the operand (always pays the indexing fix-up cycle).
    Write,
    /// Read-modify-write: read, dummy write-back, write.
    ReadModifyWrite,
    /// No memory operand (implied, stack, jumps, branches).
    Other,
}

impl Mnemonic {
    /// Classify the bus access pattern of this mnemonic.
    #[must_use]
    pub const fn access(self) -> Access {
        match self {
            Self::Lda
            | Self::Ldx
            | Self::Ldy
            | Self::Lax
            | Self::And
            | Self::Eor
            | Self::Ora
            | Self::Bit
            | Self::Adc
            | Self::Sbc
            | Self::Cmp
            | Self::Cpx
            | Self::Cpy
            | Self::Nop => Access::Read,
            Self::Sta | Self::Stx | Self::Sty | Self::Sax => Access::Write,
            Self::Inc
            | Self::Dec
            | Self::Asl
            | Self::Lsr
            | Self::Rol
            | Self::Ror
            | Self::Dcp
            | Self::Isc
            | Self::Slo
            | Self::Rla
            | Self::Sre
            | Self::Rra => Access::ReadModifyWrite,
            _ => Access::Other,
        }
    }
}

/// One decoded opcode table entry.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    /// Instruction mnemonic.
    pub mnemonic: Mnemonic,
    /// Addressing mode.
    pub mode: AddressingMode,
    /// Base cycle count (no page cross, branch not taken).
    pub cycles: u8,
    /// Whether a page cross on indexed reads costs one extra cycle.
    pub page_penalty: bool,
}

const fn op(mnemonic: Mnemonic, mode: AddressingMode, cycles: u8) -> OpcodeInfo {
    OpcodeInfo {
        mnemonic,
        mode,
        cycles,
        page_penalty: false,
    }
}

const fn opp(mnemonic: Mnemonic, mode: AddressingMode, cycles: u8) -> OpcodeInfo {
    OpcodeInfo {
        mnemonic,
        mode,
        cycles,
        page_penalty: true,
    }
}

use AddressingMode::{
    Absolute as Abs, AbsoluteX as Abx, AbsoluteY as Aby, Accumulator as Acc, Immediate as Imm,
    Implied as Imp, IndexedIndirectX as Izx, Indirect as Ind, IndirectIndexedY as Izy,
    Relative as Rel, ZeroPage as Zp, ZeroPageX as Zpx, ZeroPageY as Zpy,
};
use Mnemonic as M;

/// The full 256-entry opcode decode table, indexed by opcode byte.
#[rustfmt::skip]
pub static OPCODE_TABLE: [OpcodeInfo; 256] = [
    /* 0x00 */ op(M::Brk, Imp, 7),      op(M::Ora, Izx, 6),      op(M::Jam, Imp, 2),      op(M::Slo, Izx, 8),
    /* 0x04 */ op(M::Nop, Zp, 3),       op(M::Ora, Zp, 3),       op(M::Asl, Zp, 5),       op(M::Slo, Zp, 5),
    /* 0x08 */ op(M::Php, Imp, 3),      op(M::Ora, Imm, 2),      op(M::Asl, Acc, 2),      op(M::Unstable, Imm, 2),
    /* 0x0C */ op(M::Nop, Abs, 4),      op(M::Ora, Abs, 4),      op(M::Asl, Abs, 6),      op(M::Slo, Abs, 6),
    /* 0x10 */ op(M::Bpl, Rel, 2),      opp(M::Ora, Izy, 5),     op(M::Jam, Imp, 2),      op(M::Slo, Izy, 8),
    /* 0x14 */ op(M::Nop, Zpx, 4),      op(M::Ora, Zpx, 4),      op(M::Asl, Zpx, 6),      op(M::Slo, Zpx, 6),
    /* 0x18 */ op(M::Clc, Imp, 2),      opp(M::Ora, Aby, 4),     op(M::Nop, Imp, 2),      op(M::Slo, Aby, 7),
    /* 0x1C */ opp(M::Nop, Abx, 4),     opp(M::Ora, Abx, 4),     op(M::Asl, Abx, 7),      op(M::Slo, Abx, 7),
    /* 0x20 */ op(M::Jsr, Abs, 6),      op(M::And, Izx, 6),      op(M::Jam, Imp, 2),      op(M::Rla, Izx, 8),
    /* 0x24 */ op(M::Bit, Zp, 3),       op(M::And, Zp, 3),       op(M::Rol, Zp, 5),       op(M::Rla, Zp, 5),
    /* 0x28 */ op(M::Plp, Imp, 4),      op(M::And, Imm, 2),      op(M::Rol, Acc, 2),      op(M::Unstable, Imm, 2),
    /* 0x2C */ op(M::Bit, Abs, 4),      op(M::And, Abs, 4),      op(M::Rol, Abs, 6),      op(M::Rla, Abs, 6),
    /* 0x30 */ op(M::Bmi, Rel, 2),      opp(M::And, Izy, 5),     op(M::Jam, Imp, 2),      op(M::Rla, Izy, 8),
    /* 0x34 */ op(M::Nop, Zpx, 4),      op(M::And, Zpx, 4),      op(M::Rol, Zpx, 6),      op(M::Rla, Zpx, 6),
    /* 0x38 */ op(M::Sec, Imp, 2),      opp(M::And, Aby, 4),     op(M::Nop, Imp, 2),      op(M::Rla, Aby, 7),
    /* 0x3C */ opp(M::Nop, Abx, 4),     opp(M::And, Abx, 4),     op(M::Rol, Abx, 7),      op(M::Rla, Abx, 7),
    /* 0x40 */ op(M::Rti, Imp, 6),      op(M::Eor, Izx, 6),      op(M::Jam, Imp, 2),      op(M::Sre, Izx, 8),
    /* 0x44 */ op(M::Nop, Zp, 3),       op(M::Eor, Zp, 3),       op(M::Lsr, Zp, 5),       op(M::Sre, Zp, 5),
    /* 0x48 */ op(M::Pha, Imp, 3),      op(M::Eor, Imm, 2),      op(M::Lsr, Acc, 2),      op(M::Unstable, Imm, 2),
    /* 0x4C */ op(M::Jmp, Abs, 3),      op(M::Eor, Abs, 4),      op(M::Lsr, Abs, 6),      op(M::Sre, Abs, 6),
    /* 0x50 */ op(M::Bvc, Rel, 2),      opp(M::Eor, Izy, 5),     op(M::Jam, Imp, 2),      op(M::Sre, Izy, 8),
    /* 0x54 */ op(M::Nop, Zpx, 4),      op(M::Eor, Zpx, 4),      op(M::Lsr, Zpx, 6),      op(M::Sre, Zpx, 6),
    /* 0x58 */ op(M::Cli, Imp, 2),      opp(M::Eor, Aby, 4),     op(M::Nop, Imp, 2),      op(M::Sre, Aby, 7),
    /* 0x5C */ opp(M::Nop, Abx, 4),     opp(M::Eor, Abx, 4),     op(M::Lsr, Abx, 7),      op(M::Sre, Abx, 7),
    /* 0x60 */ op(M::Rts, Imp, 6),      op(M::Adc, Izx, 6),      op(M::Jam, Imp, 2),      op(M::Rra, Izx, 8),
    /* 0x64 */ op(M::Nop, Zp, 3),       op(M::Adc, Zp, 3),       op(M::Ror, Zp, 5),       op(M::Rra, Zp, 5),
    /* 0x68 */ op(M::Pla, Imp, 4),      op(M::Adc, Imm, 2),      op(M::Ror, Acc, 2),      op(M::Unstable, Imm, 2),
    /* 0x6C */ op(M::Jmp, Ind, 5),      op(M::Adc, Abs, 4),      op(M::Ror, Abs, 6),      op(M::Rra, Abs, 6),
    /* 0x70 */ op(M::Bvs, Rel, 2),      opp(M::Adc, Izy, 5),     op(M::Jam, Imp, 2),      op(M::Rra, Izy, 8),
    /* 0x74 */ op(M::Nop, Zpx, 4),      op(M::Adc, Zpx, 4),      op(M::Ror, Zpx, 6),      op(M::Rra, Zpx, 6),
    /* 0x78 */ op(M::Sei, Imp, 2),      opp(M::Adc, Aby, 4),     op(M::Nop, Imp, 2),      op(M::Rra, Aby, 7),
    /* 0x7C */ opp(M::Nop, Abx, 4),     opp(M::Adc, Abx, 4),     op(M::Ror, Abx, 7),      op(M::Rra, Abx, 7),
    /* 0x80 */ op(M::Nop, Imm, 2),      op(M::Sta, Izx, 6),      op(M::Nop, Imm, 2),      op(M::Sax, Izx, 6),
    /* 0x84 */ op(M::Sty, Zp, 3),       op(M::Sta, Zp, 3),       op(M::Stx, Zp, 3),       op(M::Sax, Zp, 3),
    /* 0x88 */ op(M::Dey, Imp, 2),      op(M::Nop, Imm, 2),      op(M::Txa, Imp, 2),      op(M::Unstable, Imm, 2),
    /* 0x8C */ op(M::Sty, Abs, 4),      op(M::Sta, Abs, 4),      op(M::Stx, Abs, 4),      op(M::Sax, Abs, 4),
    /* 0x90 */ op(M::Bcc, Rel, 2),      op(M::Sta, Izy, 6),      op(M::Jam, Imp, 2),      op(M::Unstable, Izy, 6),
    /* 0x94 */ op(M::Sty, Zpx, 4),      op(M::Sta, Zpx, 4),      op(M::Stx, Zpy, 4),      op(M::Sax, Zpy, 4),
    /* 0x98 */ op(M::Tya, Imp, 2),      op(M::Sta, Aby, 5),      op(M::Txs, Imp, 2),      op(M::Unstable, Aby, 5),
    /* 0x9C */ op(M::Unstable, Abx, 5), op(M::Sta, Abx, 5),      op(M::Unstable, Aby, 5), op(M::Unstable, Aby, 5),
    /* 0xA0 */ op(M::Ldy, Imm, 2),      op(M::Lda, Izx, 6),      op(M::Ldx, Imm, 2),      op(M::Lax, Izx, 6),
    /* 0xA4 */ op(M::Ldy, Zp, 3),       op(M::Lda, Zp, 3),       op(M::Ldx, Zp, 3),       op(M::Lax, Zp, 3),
    /* 0xA8 */ op(M::Tay, Imp, 2),      op(M::Lda, Imm, 2),      op(M::Tax, Imp, 2),      op(M::Unstable, Imm, 2),
    /* 0xAC */ op(M::Ldy, Abs, 4),      op(M::Lda, Abs, 4),      op(M::Ldx, Abs, 4),      op(M::Lax, Abs, 4),
    /* 0xB0 */ op(M::Bcs, Rel, 2),      opp(M::Lda, Izy, 5),     op(M::Jam, Imp, 2),      opp(M::Lax, Izy, 5),
    /* 0xB4 */ op(M::Ldy, Zpx, 4),      op(M::Lda, Zpx, 4),      op(M::Ldx, Zpy, 4),      op(M::Lax, Zpy, 4),
    /* 0xB8 */ op(M::Clv, Imp, 2),      opp(M::Lda, Aby, 4),     op(M::Tsx, Imp, 2),      opp(M::Unstable, Aby, 4),
    /* 0xBC */ opp(M::Ldy, Abx, 4),     opp(M::Lda, Abx, 4),     opp(M::Ldx, Aby, 4),     opp(M::Lax, Aby, 4),
    /* 0xC0 */ op(M::Cpy, Imm, 2),      op(M::Cmp, Izx, 6),      op(M::Nop, Imm, 2),      op(M::Dcp, Izx, 8),
    /* 0xC4 */ op(M::Cpy, Zp, 3),       op(M::Cmp, Zp, 3),       op(M::Dec, Zp, 5),       op(M::Dcp, Zp, 5),
    /* 0xC8 */ op(M::Iny, Imp, 2),      op(M::Cmp, Imm, 2),      op(M::Dex, Imp, 2),      op(M::Unstable, Imm, 2),
    /* 0xCC */ op(M::Cpy, Abs, 4),      op(M::Cmp, Abs, 4),      op(M::Dec, Abs, 6),      op(M::Dcp, Abs, 6),
    /* 0xD0 */ op(M::Bne, Rel, 2),      opp(M::Cmp, Izy, 5),     op(M::Jam, Imp, 2),      op(M::Dcp, Izy, 8),
    /* 0xD4 */ op(M::Nop, Zpx, 4),      op(M::Cmp, Zpx, 4),      op(M::Dec, Zpx, 6),      op(M::Dcp, Zpx, 6),
    /* 0xD8 */ op(M::Cld, Imp, 2),      opp(M::Cmp, Aby, 4),     op(M::Nop, Imp, 2),      op(M::Dcp, Aby, 7),
    /* 0xDC */ opp(M::Nop, Abx, 4),     opp(M::Cmp, Abx, 4),     op(M::Dec, Abx, 7),      op(M::Dcp, Abx, 7),
    /* 0xE0 */ op(M::Cpx, Imm, 2),      op(M::Sbc, Izx, 6),      op(M::Nop, Imm, 2),      op(M::Isc, Izx, 8),
    /* 0xE4 */ op(M::Cpx, Zp, 3),       op(M::Sbc, Zp, 3),       op(M::Inc, Zp, 5),       op(M::Isc, Zp, 5),
    /* 0xE8 */ op(M::Inx, Imp, 2),      op(M::Sbc, Imm, 2),      op(M::Nop, Imp, 2),      op(M::Sbc, Imm, 2),
    /* 0xEC */ op(M::Cpx, Abs, 4),      op(M::Sbc, Abs, 4),      op(M::Inc, Abs, 6),      op(M::Isc, Abs, 6),
    /* 0xF0 */ op(M::Beq, Rel, 2),      opp(M::Sbc, Izy, 5),     op(M::Jam, Imp, 2),      op(M::Isc, Izy, 8),
    /* 0xF4 */ op(M::Nop, Zpx, 4),      op(M::Sbc, Zpx, 4),      op(M::Inc, Zpx, 6),      op(M::Isc, Zpx, 6),
    /* 0xF8 */ op(M::Sed, Imp, 2),      opp(M::Sbc, Aby, 4),     op(M::Nop, Imp, 2),      op(M::Isc, Aby, 7),
    /* 0xFC */ opp(M::Nop, Abx, 4),     opp(M::Sbc, Abx, 4),     op(M::Inc, Abx, 7),      op(M::Isc, Abx, 7),
];
