//! 6502 CPU core implementation.
//!
//! This module contains the main CPU structure with all registers, the
//! instruction execution loop, interrupt handling, and stack operations.
//!
//! The core executes whole instructions at a time but performs every bus
//! access the hardware performs, in order: operand fetches, indexing
//! fix-up dummy reads, the read-modify-write double write. Since the 6502
//! touches the bus exactly once per clock cycle, the access sequence IS the
//! cycle sequence, and a bus that counts accesses counts CPU cycles.
//!
//! Interrupts are polled at the instruction boundary using the I flag
//! captured at the PREVIOUS boundary, which models the hardware's
//! penultimate-cycle poll: CLI followed by SEI cannot let an IRQ through,
//! and an IRQ raised during CLI is taken only after the following
//! instruction.

use crate::addressing::{page_crossed, AddressingMode};
use crate::bus::Bus;
use crate::opcodes::{Access, Mnemonic, OpcodeInfo, OPCODE_TABLE};
use crate::status::Status;
use vibenes_common::{Address, Byte, CpuCycle, Snapshot, StateError, StateReader, StateWriter};

/// NMI vector address.
pub const NMI_VECTOR: Address = 0xFFFA;
/// Reset vector address.
pub const RESET_VECTOR: Address = 0xFFFC;
/// IRQ/BRK vector address.
pub const IRQ_VECTOR: Address = 0xFFFE;

/// Stack page base address.
const STACK_BASE: Address = 0x0100;

/// NES 6502 CPU.
///
/// Cycle-accurate implementation of the MOS 6502 as used in the NES.
/// The decimal flag exists but ADC/SBC stay binary (2A03 behavior).
#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)] // Interrupt lines are genuinely independent bools
pub struct Cpu {
    /// Accumulator register.
    pub a: Byte,
    /// X index register.
    pub x: Byte,
    /// Y index register.
    pub y: Byte,
    /// Program counter.
    pub pc: Address,
    /// Stack pointer (offset into $0100-$01FF, wraps modulo 256).
    pub sp: Byte,
    /// Status flags.
    pub status: Status,
    /// Total cycles executed since power-on.
    pub cycles: u64,
    /// Remaining driver-authorized cycles (may go negative mid-instruction).
    budget: CpuCycle,
    /// Edge-triggered NMI latch, cleared on acceptance.
    nmi_pending: bool,
    /// Current NMI line level, for edge detection.
    nmi_line: bool,
    /// Level-triggered IRQ line (held by APU frame IRQ, DMC, mapper).
    irq_line: bool,
    /// Reset request latch.
    reset_pending: bool,
    /// I flag sampled at the previous instruction boundary. The IRQ poll
    /// uses this value, giving flag changes a one-instruction latency.
    prev_irq_inhibit: bool,
    /// CPU reached an unstable-illegal or KIL opcode and stopped issuing.
    halted: bool,
    /// The opcode that halted the CPU, if any.
    halt_opcode: Option<Byte>,
}

impl Cpu {
    /// Create a new CPU in power-on state.
    ///
    /// A, X, Y are zero, SP is `$FD` (as after the reset pulls), P has I and
    /// U set. PC is loaded by [`Cpu::reset`], which the driver must call
    /// with the bus attached.
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: 0xFD,
            status: Status::POWER_ON,
            cycles: 0,
            budget: 0,
            nmi_pending: false,
            nmi_line: false,
            irq_line: false,
            reset_pending: false,
            prev_irq_inhibit: true,
            halted: false,
            halt_opcode: None,
        }
    }

    /// Run the reset sequence.
    ///
    /// Takes 7 cycles: two internal fetches, three suppressed stack pushes
    /// (SP decrements, nothing is written), then the vector read. Sets I,
    /// clears D, and un-jams a halted CPU. RAM and registers are preserved.
    pub fn reset(&mut self, bus: &mut impl Bus) -> u8 {
        let _ = bus.read(self.pc);
        let _ = bus.read(self.pc);
        for _ in 0..3 {
            let _ = bus.read(STACK_BASE | Address::from(self.sp));
            self.sp = self.sp.wrapping_sub(1);
        }
        self.status.insert(Status::I);
        self.status.remove(Status::D);
        let lo = u16::from(bus.read(RESET_VECTOR));
        let hi = u16::from(bus.read(RESET_VECTOR.wrapping_add(1)));
        self.pc = (hi << 8) | lo;

        self.nmi_pending = false;
        self.reset_pending = false;
        self.prev_irq_inhibit = true;
        self.halted = false;
        self.halt_opcode = None;
        self.cycles += 7;
        7
    }

    /// Execute one instruction (or one interrupt sequence, or one idle
    /// cycle if halted/stalled) and return the cycles taken.
    pub fn step(&mut self, bus: &mut impl Bus) -> u8 {
        if bus.dma_halted() {
            self.cycles += 1;
            return 1;
        }

        if self.halted {
            self.cycles += 1;
            return 1;
        }

        // Sample I now; the NEXT boundary's IRQ poll uses this value.
        let current_irq_inhibit = self.status.contains(Status::I);

        // Priority: reset > NMI (edge) > IRQ (level, maskable).
        if self.reset_pending {
            return self.reset(bus);
        }

        if self.nmi_pending {
            self.nmi_pending = false;
            self.prev_irq_inhibit = true;
            return self.interrupt(bus, NMI_VECTOR);
        }

        if self.irq_line && !self.prev_irq_inhibit {
            self.prev_irq_inhibit = true;
            return self.interrupt(bus, IRQ_VECTOR);
        }

        self.prev_irq_inhibit = current_irq_inhibit;

        let opcode = self.fetch_byte(bus);
        let info = &OPCODE_TABLE[opcode as usize];

        // Operand-less and control-flow modes are handled whole; only modes
        // with a memory operand go through the access-class paths.
        let total = match info.mode {
            AddressingMode::Implied
            | AddressingMode::Accumulator
            | AddressingMode::Relative
            | AddressingMode::Indirect => self.exec_other(bus, info, opcode),
            _ => match info.mnemonic.access() {
                Access::Read => self.exec_read(bus, info),
                Access::Write => self.exec_write(bus, info),
                Access::ReadModifyWrite => self.exec_rmw(bus, info),
                Access::Other => self.exec_other(bus, info, opcode),
            },
        };

        self.cycles += u64::from(total);
        total
    }

    /// Authorize up to `cycles` cycles of execution.
    ///
    /// Runs whole instructions while the budget lasts; an instruction that
    /// overshoots leaves the budget negative and the debt is repaid on the
    /// next call. While the bus reports DMA in progress the budget simply
    /// drains. Returns the number of cycles actually consumed.
    pub fn tick(&mut self, bus: &mut impl Bus, cycles: CpuCycle) -> CpuCycle {
        self.budget += cycles;
        let mut consumed: CpuCycle = 0;
        while self.budget > 0 {
            let step = CpuCycle::from(self.step(bus));
            self.budget -= step;
            consumed += step;
        }
        consumed
    }

    // =========================================================================
    // INTERRUPT LINES
    // =========================================================================

    /// Inject an NMI edge (the line pulsed low).
    pub fn trigger_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Drive the NMI line level; a low→high transition latches an edge.
    pub fn set_nmi_line(&mut self, level: bool) {
        if level && !self.nmi_line {
            self.nmi_pending = true;
        }
        self.nmi_line = level;
    }

    /// Release the NMI line without consuming a latched edge.
    pub fn clear_nmi_line(&mut self) {
        self.nmi_line = false;
    }

    /// Discard a latched but unserviced NMI edge.
    ///
    /// Models the $2002 VBlank race: a status read landing on the exact
    /// set dot keeps that frame's NMI from ever reaching the core.
    pub fn cancel_nmi(&mut self) {
        self.nmi_pending = false;
    }

    /// Assert the IRQ line. Level-triggered: fires every instruction
    /// boundary while held and I is clear.
    pub fn trigger_irq(&mut self) {
        self.irq_line = true;
    }

    /// Release the IRQ line.
    pub fn clear_irq_line(&mut self) {
        self.irq_line = false;
    }

    /// Drive the IRQ line to an explicit level.
    pub fn set_irq_line(&mut self, level: bool) {
        self.irq_line = level;
    }

    /// Request a reset; serviced at the next instruction boundary.
    pub fn trigger_reset(&mut self) {
        self.reset_pending = true;
    }

    /// Whether the CPU is jammed on an unstable-illegal or KIL opcode.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The opcode that jammed the CPU, if it is halted.
    #[must_use]
    pub fn halt_opcode(&self) -> Option<Byte> {
        self.halt_opcode
    }

    /// Whether an IRQ is currently asserted.
    #[must_use]
    pub fn irq_line(&self) -> bool {
        self.irq_line
    }

    /// Whether an NMI edge is latched and not yet serviced.
    #[must_use]
    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    /// Remaining authorized cycle budget.
    #[must_use]
    pub fn budget(&self) -> CpuCycle {
        self.budget
    }

    // =========================================================================
    // BUS PRIMITIVES
    // =========================================================================

    #[inline]
    fn fetch_byte(&mut self, bus: &mut impl Bus) -> Byte {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    #[inline]
    fn push(&mut self, bus: &mut impl Bus, value: Byte) {
        bus.write(STACK_BASE | Address::from(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    #[inline]
    fn pull(&mut self, bus: &mut impl Bus) -> Byte {
        self.sp = self.sp.wrapping_add(1);
        bus.read(STACK_BASE | Address::from(self.sp))
    }

    /// Hardware interrupt entry (NMI or IRQ): 7 cycles, B pushed clear.
    fn interrupt(&mut self, bus: &mut impl Bus, vector: Address) -> u8 {
        // The suppressed opcode fetch and the following internal cycle both
        // read the current PC without advancing it.
        let _ = bus.read(self.pc);
        let _ = bus.read(self.pc);
        self.push(bus, (self.pc >> 8) as Byte);
        self.push(bus, (self.pc & 0xFF) as Byte);
        self.push(bus, self.status.to_stack_byte(false));
        self.status.insert(Status::I);
        let lo = u16::from(bus.read(vector));
        let hi = u16::from(bus.read(vector.wrapping_add(1)));
        self.pc = (hi << 8) | lo;
        self.cycles += 7;
        7
    }

    // =========================================================================
    // ADDRESS RESOLUTION
    // =========================================================================

    /// Resolve the effective address for a memory operand, performing the
    /// hardware's dummy reads. Returns the address and the page-cross
    /// penalty cycles (0 or 1; only ever 1 for penalized reads).
    fn resolve(&mut self, bus: &mut impl Bus, info: &OpcodeInfo) -> (Address, u8) {
        let write_like = matches!(
            info.mnemonic.access(),
            Access::Write | Access::ReadModifyWrite
        );

        match info.mode {
            AddressingMode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                (addr, 0)
            }
            AddressingMode::ZeroPage => (Address::from(self.fetch_byte(bus)), 0),
            AddressingMode::ZeroPageX => {
                let base = self.fetch_byte(bus);
                // Indexing happens while the hardware re-reads the base.
                let _ = bus.read(Address::from(base));
                (Address::from(base.wrapping_add(self.x)), 0)
            }
            AddressingMode::ZeroPageY => {
                let base = self.fetch_byte(bus);
                let _ = bus.read(Address::from(base));
                (Address::from(base.wrapping_add(self.y)), 0)
            }
            AddressingMode::Absolute => {
                let lo = self.fetch_byte(bus);
                let hi = self.fetch_byte(bus);
                (u16::from_le_bytes([lo, hi]), 0)
            }
            AddressingMode::AbsoluteX => {
                let lo = self.fetch_byte(bus);
                let hi = self.fetch_byte(bus);
                let base = u16::from_le_bytes([lo, hi]);
                self.index_absolute(bus, base, self.x, write_like, info.page_penalty)
            }
            AddressingMode::AbsoluteY => {
                let lo = self.fetch_byte(bus);
                let hi = self.fetch_byte(bus);
                let base = u16::from_le_bytes([lo, hi]);
                self.index_absolute(bus, base, self.y, write_like, info.page_penalty)
            }
            AddressingMode::IndexedIndirectX => {
                let ptr = self.fetch_byte(bus);
                let _ = bus.read(Address::from(ptr));
                let ptr = ptr.wrapping_add(self.x);
                let lo = bus.read(Address::from(ptr));
                let hi = bus.read(Address::from(ptr.wrapping_add(1)));
                (u16::from_le_bytes([lo, hi]), 0)
            }
            AddressingMode::IndirectIndexedY => {
                let ptr = self.fetch_byte(bus);
                let lo = bus.read(Address::from(ptr));
                let hi = bus.read(Address::from(ptr.wrapping_add(1)));
                let base = u16::from_le_bytes([lo, hi]);
                self.index_absolute(bus, base, self.y, write_like, info.page_penalty)
            }
            // Remaining modes never reach resolve().
            _ => (0, 0),
        }
    }

    /// Apply an index register to a base address. Reads and RMW/writes
    /// differ: reads only burn the fix-up cycle when the page crosses,
    /// writes and RMW always do (reading from the not-yet-fixed address).
    fn index_absolute(
        &mut self,
        bus: &mut impl Bus,
        base: Address,
        index: Byte,
        write_like: bool,
        page_penalty: bool,
    ) -> (Address, u8) {
        let effective = base.wrapping_add(Address::from(index));
        let crossed = page_crossed(base, effective);
        if write_like || crossed {
            // Dummy read from the address before the high byte is fixed.
            let partial = (base & 0xFF00) | (effective & 0x00FF);
            let _ = bus.read(partial);
        }
        let penalty = u8::from(crossed && page_penalty);
        (effective, penalty)
    }

    // =========================================================================
    // EXECUTION BY ACCESS CLASS
    // =========================================================================

    fn exec_read(&mut self, bus: &mut impl Bus, info: &OpcodeInfo) -> u8 {
        let (addr, penalty) = self.resolve(bus, info);
        let value = bus.read(addr);
        match info.mnemonic {
            Mnemonic::Lda => {
                self.a = value;
                self.status.set_zn(self.a);
            }
            Mnemonic::Ldx => {
                self.x = value;
                self.status.set_zn(self.x);
            }
            Mnemonic::Ldy => {
                self.y = value;
                self.status.set_zn(self.y);
            }
            Mnemonic::Lax => {
                self.a = value;
                self.x = value;
                self.status.set_zn(value);
            }
            Mnemonic::And => {
                self.a &= value;
                self.status.set_zn(self.a);
            }
            Mnemonic::Eor => {
                self.a ^= value;
                self.status.set_zn(self.a);
            }
            Mnemonic::Ora => {
                self.a |= value;
                self.status.set_zn(self.a);
            }
            Mnemonic::Adc => self.adc(value),
            Mnemonic::Sbc => self.adc(!value),
            Mnemonic::Cmp => self.compare(self.a, value),
            Mnemonic::Cpx => self.compare(self.x, value),
            Mnemonic::Cpy => self.compare(self.y, value),
            Mnemonic::Bit => {
                self.status.set_flag(Status::Z, self.a & value == 0);
                self.status.set_flag(Status::V, value & 0x40 != 0);
                self.status.set_flag(Status::N, value & 0x80 != 0);
            }
            // Multi-byte NOPs read and discard.
            Mnemonic::Nop => {}
            _ => unreachable!("non-read mnemonic in exec_read"),
        }
        info.cycles + penalty
    }

    fn exec_write(&mut self, bus: &mut impl Bus, info: &OpcodeInfo) -> u8 {
        let (addr, _) = self.resolve(bus, info);
        let value = match info.mnemonic {
            Mnemonic::Sta => self.a,
            Mnemonic::Stx => self.x,
            Mnemonic::Sty => self.y,
            Mnemonic::Sax => self.a & self.x,
            _ => unreachable!("non-write mnemonic in exec_write"),
        };
        bus.write(addr, value);
        info.cycles
    }

    fn exec_rmw(&mut self, bus: &mut impl Bus, info: &OpcodeInfo) -> u8 {
        let (addr, _) = self.resolve(bus, info);
        let old = bus.read(addr);
        // The hardware writes the unmodified value back while the ALU works;
        // mappers with register writes in this range observe both writes.
        bus.write(addr, old);
        let new = self.apply_rmw(info.mnemonic, old);
        bus.write(addr, new);
        info.cycles
    }

    fn apply_rmw(&mut self, mnemonic: Mnemonic, old: Byte) -> Byte {
        match mnemonic {
            Mnemonic::Asl => self.asl(old),
            Mnemonic::Lsr => self.lsr(old),
            Mnemonic::Rol => self.rol(old),
            Mnemonic::Ror => self.ror(old),
            Mnemonic::Inc => {
                let new = old.wrapping_add(1);
                self.status.set_zn(new);
                new
            }
            Mnemonic::Dec => {
                let new = old.wrapping_sub(1);
                self.status.set_zn(new);
                new
            }
            Mnemonic::Slo => {
                let new = self.asl(old);
                self.a |= new;
                self.status.set_zn(self.a);
                new
            }
            Mnemonic::Rla => {
                let new = self.rol(old);
                self.a &= new;
                self.status.set_zn(self.a);
                new
            }
            Mnemonic::Sre => {
                let new = self.lsr(old);
                self.a ^= new;
                self.status.set_zn(self.a);
                new
            }
            Mnemonic::Rra => {
                let new = self.ror(old);
                self.adc(new);
                new
            }
            Mnemonic::Dcp => {
                let new = old.wrapping_sub(1);
                self.compare(self.a, new);
                new
            }
            Mnemonic::Isc => {
                let new = old.wrapping_add(1);
                self.adc(!new);
                new
            }
            _ => unreachable!("non-RMW mnemonic in apply_rmw"),
        }
    }

    #[allow(clippy::too_many_lines)] // One arm per remaining instruction
    fn exec_other(&mut self, bus: &mut impl Bus, info: &OpcodeInfo, opcode: Byte) -> u8 {
        match info.mnemonic {
            // --- Branches ---
            Mnemonic::Bcc => return self.branch(bus, !self.status.contains(Status::C)),
            Mnemonic::Bcs => return self.branch(bus, self.status.contains(Status::C)),
            Mnemonic::Bne => return self.branch(bus, !self.status.contains(Status::Z)),
            Mnemonic::Beq => return self.branch(bus, self.status.contains(Status::Z)),
            Mnemonic::Bpl => return self.branch(bus, !self.status.contains(Status::N)),
            Mnemonic::Bmi => return self.branch(bus, self.status.contains(Status::N)),
            Mnemonic::Bvc => return self.branch(bus, !self.status.contains(Status::V)),
            Mnemonic::Bvs => return self.branch(bus, self.status.contains(Status::V)),

            // --- Jumps and subroutines ---
            Mnemonic::Jmp => {
                if info.mode == AddressingMode::Indirect {
                    let lo = self.fetch_byte(bus);
                    let hi = self.fetch_byte(bus);
                    let ptr = u16::from_le_bytes([lo, hi]);
                    self.pc = bus.read_u16_wrap(ptr);
                } else {
                    let lo = self.fetch_byte(bus);
                    let hi = self.fetch_byte(bus);
                    self.pc = u16::from_le_bytes([lo, hi]);
                }
            }
            Mnemonic::Jsr => {
                let lo = self.fetch_byte(bus);
                // Internal cycle touches the stack before the pushes.
                let _ = bus.read(STACK_BASE | Address::from(self.sp));
                self.push(bus, (self.pc >> 8) as Byte);
                self.push(bus, (self.pc & 0xFF) as Byte);
                let hi = self.fetch_byte(bus);
                self.pc = u16::from_le_bytes([lo, hi]);
            }
            Mnemonic::Rts => {
                let _ = bus.read(self.pc);
                let _ = bus.read(STACK_BASE | Address::from(self.sp));
                let lo = self.pull(bus);
                let hi = self.pull(bus);
                self.pc = u16::from_le_bytes([lo, hi]);
                let _ = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
            }
            Mnemonic::Rti => {
                let _ = bus.read(self.pc);
                let _ = bus.read(STACK_BASE | Address::from(self.sp));
                let p = self.pull(bus);
                self.status = Status::from_stack_byte(p);
                let lo = self.pull(bus);
                let hi = self.pull(bus);
                self.pc = u16::from_le_bytes([lo, hi]);
            }
            Mnemonic::Brk => {
                // Two-byte instruction: the padding byte is fetched and skipped.
                let _ = self.fetch_byte(bus);
                self.push(bus, (self.pc >> 8) as Byte);
                self.push(bus, (self.pc & 0xFF) as Byte);
                self.push(bus, self.status.to_stack_byte(true));
                self.status.insert(Status::I);
                let lo = u16::from(bus.read(IRQ_VECTOR));
                let hi = u16::from(bus.read(IRQ_VECTOR.wrapping_add(1)));
                self.pc = (hi << 8) | lo;
            }

            // --- Stack ---
            Mnemonic::Pha => {
                let _ = bus.read(self.pc);
                self.push(bus, self.a);
            }
            Mnemonic::Php => {
                let _ = bus.read(self.pc);
                let p = self.status.to_stack_byte(true);
                self.push(bus, p);
            }
            Mnemonic::Pla => {
                let _ = bus.read(self.pc);
                let _ = bus.read(STACK_BASE | Address::from(self.sp));
                self.a = self.pull(bus);
                self.status.set_zn(self.a);
            }
            Mnemonic::Plp => {
                let _ = bus.read(self.pc);
                let _ = bus.read(STACK_BASE | Address::from(self.sp));
                let p = self.pull(bus);
                self.status = Status::from_stack_byte(p);
            }

            // --- Accumulator shifts ---
            Mnemonic::Asl if info.mode == AddressingMode::Accumulator => {
                let _ = bus.read(self.pc);
                self.a = self.asl(self.a);
            }
            Mnemonic::Lsr if info.mode == AddressingMode::Accumulator => {
                let _ = bus.read(self.pc);
                self.a = self.lsr(self.a);
            }
            Mnemonic::Rol if info.mode == AddressingMode::Accumulator => {
                let _ = bus.read(self.pc);
                self.a = self.rol(self.a);
            }
            Mnemonic::Ror if info.mode == AddressingMode::Accumulator => {
                let _ = bus.read(self.pc);
                self.a = self.ror(self.a);
            }

            // --- Implied register / flag operations ---
            Mnemonic::Tax => self.implied(bus, |cpu| {
                cpu.x = cpu.a;
                cpu.status.set_zn(cpu.x);
            }),
            Mnemonic::Tay => self.implied(bus, |cpu| {
                cpu.y = cpu.a;
                cpu.status.set_zn(cpu.y);
            }),
            Mnemonic::Tsx => self.implied(bus, |cpu| {
                cpu.x = cpu.sp;
                cpu.status.set_zn(cpu.x);
            }),
            Mnemonic::Txa => self.implied(bus, |cpu| {
                cpu.a = cpu.x;
                cpu.status.set_zn(cpu.a);
            }),
            Mnemonic::Txs => self.implied(bus, |cpu| {
                cpu.sp = cpu.x;
            }),
            Mnemonic::Tya => self.implied(bus, |cpu| {
                cpu.a = cpu.y;
                cpu.status.set_zn(cpu.a);
            }),
            Mnemonic::Inx => self.implied(bus, |cpu| {
                cpu.x = cpu.x.wrapping_add(1);
                cpu.status.set_zn(cpu.x);
            }),
            Mnemonic::Iny => self.implied(bus, |cpu| {
                cpu.y = cpu.y.wrapping_add(1);
                cpu.status.set_zn(cpu.y);
            }),
            Mnemonic::Dex => self.implied(bus, |cpu| {
                cpu.x = cpu.x.wrapping_sub(1);
                cpu.status.set_zn(cpu.x);
            }),
            Mnemonic::Dey => self.implied(bus, |cpu| {
                cpu.y = cpu.y.wrapping_sub(1);
                cpu.status.set_zn(cpu.y);
            }),
            Mnemonic::Clc => self.implied(bus, |cpu| cpu.status.remove(Status::C)),
            Mnemonic::Cld => self.implied(bus, |cpu| cpu.status.remove(Status::D)),
            Mnemonic::Cli => self.implied(bus, |cpu| cpu.status.remove(Status::I)),
            Mnemonic::Clv => self.implied(bus, |cpu| cpu.status.remove(Status::V)),
            Mnemonic::Sec => self.implied(bus, |cpu| cpu.status.insert(Status::C)),
            Mnemonic::Sed => self.implied(bus, |cpu| cpu.status.insert(Status::D)),
            Mnemonic::Sei => self.implied(bus, |cpu| cpu.status.insert(Status::I)),
            Mnemonic::Nop => self.implied(bus, |_| {}),

            // --- Halting opcodes ---
            Mnemonic::Jam | Mnemonic::Unstable => {
                let _ = bus.read(self.pc);
                self.halted = true;
                self.halt_opcode = Some(opcode);
                log::warn!(
                    "CPU halted on opcode {:#04x} at {:#06x}",
                    opcode,
                    self.pc.wrapping_sub(1)
                );
            }

            _ => unreachable!("unhandled mnemonic in exec_other"),
        }
        info.cycles
    }

    #[inline]
    fn implied(&mut self, bus: &mut impl Bus, f: impl FnOnce(&mut Self)) {
        // Implied instructions burn their second cycle re-reading the
        // next opcode byte.
        let _ = bus.read(self.pc);
        f(self);
    }

    /// Branch on `taken`: +1 cycle if taken, +1 more if the target is on a
    /// different page than the next instruction.
    fn branch(&mut self, bus: &mut impl Bus, taken: bool) -> u8 {
        let offset = self.fetch_byte(bus) as i8;
        if !taken {
            return 2;
        }
        let _ = bus.read(self.pc);
        let target = self.pc.wrapping_add(offset as u16);
        let mut cycles = 3;
        if page_crossed(self.pc, target) {
            // The fix-up cycle reads from the unfixed target address.
            let _ = bus.read((self.pc & 0xFF00) | (target & 0x00FF));
            cycles += 1;
        }
        self.pc = target;
        cycles
    }

    // =========================================================================
    // ALU HELPERS
    // =========================================================================

    /// Add with carry; SBC routes through here with the operand inverted.
    /// Binary only: the D flag is ignored by the 2A03 adder.
    fn adc(&mut self, value: Byte) {
        let a = self.a;
        let carry = u16::from(self.status.contains(Status::C));
        let sum = u16::from(a) + u16::from(value) + carry;
        let result = (sum & 0xFF) as Byte;

        self.status.set_flag(Status::C, sum > 0xFF);
        self.status
            .set_flag(Status::V, (a ^ result) & (value ^ result) & 0x80 != 0);
        self.a = result;
        self.status.set_zn(result);
    }

    /// Compare: C when register >= memory, Z on equality, N from the
    /// subtraction's bit 7.
    fn compare(&mut self, register: Byte, value: Byte) {
        let diff = register.wrapping_sub(value);
        self.status.set_flag(Status::C, register >= value);
        self.status.set_zn(diff);
    }

    fn asl(&mut self, value: Byte) -> Byte {
        self.status.set_flag(Status::C, value & 0x80 != 0);
        let result = value << 1;
        self.status.set_zn(result);
        result
    }

    fn lsr(&mut self, value: Byte) -> Byte {
        self.status.set_flag(Status::C, value & 0x01 != 0);
        let result = value >> 1;
        self.status.set_zn(result);
        result
    }

    fn rol(&mut self, value: Byte) -> Byte {
        let carry_in = u8::from(self.status.contains(Status::C));
        self.status.set_flag(Status::C, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.status.set_zn(result);
        result
    }

    fn ror(&mut self, value: Byte) -> Byte {
        let carry_in = u8::from(self.status.contains(Status::C)) << 7;
        self.status.set_flag(Status::C, value & 0x01 != 0);
        let result = (value >> 1) | carry_in;
        self.status.set_zn(result);
        result
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot for Cpu {
    fn save_state(&self, w: &mut StateWriter) {
        w.put_u8(self.a);
        w.put_u8(self.x);
        w.put_u8(self.y);
        w.put_u16(self.pc);
        w.put_u8(self.sp);
        w.put_u8(self.status.bits());
        w.put_u64(self.cycles);
        w.put_i64(self.budget);
        w.put_bool(self.nmi_pending);
        w.put_bool(self.nmi_line);
        w.put_bool(self.irq_line);
        w.put_bool(self.reset_pending);
        w.put_bool(self.prev_irq_inhibit);
        w.put_bool(self.halted);
        w.put_u8(self.halt_opcode.unwrap_or(0));
        w.put_bool(self.halt_opcode.is_some());
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.a = r.get_u8()?;
        self.x = r.get_u8()?;
        self.y = r.get_u8()?;
        self.pc = r.get_u16()?;
        self.sp = r.get_u8()?;
        self.status = Status::from_bits_truncate(r.get_u8()?);
        self.cycles = r.get_u64()?;
        self.budget = r.get_i64()?;
        self.nmi_pending = r.get_bool()?;
        self.nmi_line = r.get_bool()?;
        self.irq_line = r.get_bool()?;
        self.reset_pending = r.get_bool()?;
        self.prev_irq_inhibit = r.get_bool()?;
        self.halted = r.get_bool()?;
        let opcode = r.get_u8()?;
        self.halt_opcode = r.get_bool()?.then_some(opcode);
        Ok(())
    }
}
