//! System bus: CPU address decode, open bus, OAM DMA, component fan-out.
//!
//! CPU address map:
//!
//! ```text
//! $0000-$1FFF  2 KiB work RAM, mirrored four times
//! $2000-$3FFF  PPU registers, mirrored every 8 bytes
//! $4000-$4013  APU channel registers
//! $4014        OAM DMA trigger
//! $4015        APU status
//! $4016        Controller strobe / controller 1 serial read
//! $4017        APU frame counter / controller 2 serial read
//! $4018-$401F  Disabled test registers (open bus)
//! $4020-$FFFF  Cartridge (mapper)
//! ```
//!
//! The 6502 performs exactly one bus access per clock cycle, so the bus
//! counts accesses to maintain the monotonic CPU cycle counter that the
//! mappers query (MMC1's write filter, MMC3's A12 low-time debounce) and
//! that decides OAM DMA alignment.

use crate::audio::SampleRing;
use crate::input::Controller;
use vibenes_apu::Apu;
use vibenes_common::{Address, Byte, Snapshot, StateError, StateReader, StateWriter, CPU_CLOCK_NTSC};
use vibenes_cpu::Bus;
use vibenes_mappers::{Mapper, Mirroring};
use vibenes_ppu::{Ppu, PpuBus};

/// PPU-side memory adapter: cartridge CHR plus internal VRAM with the
/// cartridge-selected nametable mirroring. Watches A12 for the mapper.
struct PpuMemory<'a> {
    mapper: &'a mut dyn Mapper,
    ciram: &'a mut [Byte; 4096],
    mirroring: Mirroring,
    a12_level: &'a mut bool,
}

impl PpuMemory<'_> {
    /// Map a nametable address ($2000-$2FFF, pre-masked to $0FFF) onto the
    /// internal VRAM. Four-screen boards address the full 4 KiB; all other
    /// modes fold into the first 2 KiB.
    fn ciram_addr(mirroring: Mirroring, addr: Address) -> usize {
        let addr = addr & 0x0FFF;
        let offset = (addr & 0x03FF) as usize;

        match mirroring {
            // $2000/$2400 share the first table, $2800/$2C00 the second.
            Mirroring::Horizontal => {
                let table = usize::from((addr >> 11) & 1);
                table * 0x400 + offset
            }
            // $2000/$2800 share the first table, $2400/$2C00 the second.
            Mirroring::Vertical => {
                let table = usize::from((addr >> 10) & 1);
                table * 0x400 + offset
            }
            Mirroring::SingleScreenLow => offset,
            Mirroring::SingleScreenHigh => 0x400 + offset,
            Mirroring::FourScreen => addr as usize,
        }
    }

    /// Report A12 level changes to the mapper (MMC3's scanline clock).
    fn watch_a12(&mut self, addr: Address) {
        let level = addr & 0x1000 != 0;
        if level != *self.a12_level {
            *self.a12_level = level;
            self.mapper.notify_a12(level);
        }
    }
}

impl PpuBus for PpuMemory<'_> {
    fn read(&mut self, addr: Address) -> Byte {
        match addr & 0x3FFF {
            0x0000..=0x1FFF => {
                self.watch_a12(addr);
                self.mapper.ppu_read(addr & 0x1FFF)
            }
            0x2000..=0x3EFF => self.ciram[Self::ciram_addr(self.mirroring, addr)],
            // $3F00+ only arrives on the $2007 buffer-refill path, which
            // reads the nametable underneath the palette.
            _ => self.ciram[Self::ciram_addr(self.mirroring, addr)],
        }
    }

    fn write(&mut self, addr: Address, value: Byte) {
        match addr & 0x3FFF {
            0x0000..=0x1FFF => {
                self.watch_a12(addr);
                self.mapper.ppu_write(addr & 0x1FFF, value);
            }
            0x2000..=0x3EFF => {
                self.ciram[Self::ciram_addr(self.mirroring, addr)] = value;
            }
            _ => {}
        }
    }
}

/// OAM DMA sequencer state.
#[derive(Debug, Clone, Copy, Default)]
struct OamDma {
    active: bool,
    /// Source page: bytes P*256..P*256+255.
    page: Byte,
    /// Sub-cycles executed so far.
    step: u16,
    /// Alignment cycles before the transfer (1, or 2 on odd triggers).
    align: u16,
    /// Byte latched by the last read sub-cycle.
    latch: Byte,
}

impl OamDma {
    /// Total sub-cycles: alignment + 256 read/write pairs.
    fn total_cycles(&self) -> u16 {
        self.align + 512
    }
}

/// The system bus connecting CPU, PPU, APU, cartridge and controllers.
pub struct SystemBus {
    /// 2 KiB work RAM.
    pub ram: [Byte; 2048],
    /// PPU internal VRAM: 2 KiB, doubled for four-screen boards.
    pub ciram: [Byte; 4096],
    /// Picture processing unit.
    pub ppu: Ppu,
    /// Audio processing unit.
    pub apu: Apu,
    /// Cartridge mapper.
    pub mapper: Box<dyn Mapper>,
    /// Controller port 1.
    pub controller1: Controller,
    /// Controller port 2.
    pub controller2: Controller,

    /// Open-bus latch: the last value driven on the data bus.
    open_bus: Byte,
    /// CPU cycles until the undriven bus decays to $FF.
    open_bus_decay: u32,
    /// Monotonic CPU cycle counter (one per bus access).
    cpu_cycle: u64,
    /// OAM DMA sequencer.
    dma: OamDma,
    /// Last observed PPU A12 level.
    a12_level: bool,
    /// NMI edge collected from the PPU, waiting for the driver.
    nmi_pending: bool,
    /// $2002 race retraction collected from the PPU.
    nmi_retract: bool,
    /// CPU-rate audio samples for the host.
    pub audio: SampleRing,
}

impl SystemBus {
    /// Open-bus decay time: about one second of CPU cycles.
    const DECAY_CYCLES: u32 = CPU_CLOCK_NTSC;

    /// Create a bus around a cartridge mapper.
    #[must_use]
    pub fn new(mapper: Box<dyn Mapper>) -> Self {
        Self {
            ram: [0; 2048],
            ciram: [0; 4096],
            ppu: Ppu::new(),
            apu: Apu::new(),
            mapper,
            controller1: Controller::new(),
            controller2: Controller::new(),
            open_bus: 0,
            open_bus_decay: 0,
            cpu_cycle: 0,
            dma: OamDma::default(),
            a12_level: false,
            nmi_pending: false,
            nmi_retract: false,
            audio: SampleRing::new(),
        }
    }

    /// Cold boot: work RAM filled with the deterministic power-on garbage
    /// pattern, everything else as after reset.
    pub fn power_on(&mut self) {
        for (i, byte) in self.ram.iter_mut().enumerate() {
            *byte = Self::power_on_pattern(i);
        }
        self.ciram = [0; 4096];
        self.ppu = Ppu::new();
        self.apu.reset();
        self.mapper.reset();
        self.controller1.reset();
        self.controller2.reset();
        self.open_bus = 0;
        self.open_bus_decay = 0;
        self.cpu_cycle = 0;
        self.dma = OamDma::default();
        self.a12_level = false;
        self.nmi_pending = false;
        self.nmi_retract = false;
        self.audio.clear();
    }

    /// Warm reset: registers and mapper state return to power-on defaults,
    /// RAM contents survive.
    pub fn reset(&mut self) {
        self.ppu.reset();
        self.apu.reset();
        self.mapper.reset();
        self.controller1.reset();
        self.controller2.reset();
        self.dma = OamDma::default();
        self.nmi_pending = false;
        self.nmi_retract = false;
        self.audio.clear();
    }

    /// Deterministic address-seeded power-on RAM value.
    #[must_use]
    pub fn power_on_pattern(i: usize) -> Byte {
        (((i * 17 + 42) ^ (i >> 3) ^ 0xAA) & 0xFF) as Byte
    }

    /// One bus access = one CPU cycle: advance the counter and let the
    /// mapper observe it.
    #[inline]
    fn count_cpu_cycle(&mut self) {
        self.cpu_cycle = self.cpu_cycle.wrapping_add(1);
        self.mapper.notify_cpu_cycle();
    }

    #[inline]
    fn drive_bus(&mut self, value: Byte) {
        self.open_bus = value;
        self.open_bus_decay = Self::DECAY_CYCLES;
    }

    /// The open-bus latch value.
    #[must_use]
    pub fn open_bus(&self) -> Byte {
        self.open_bus
    }

    /// The monotonic CPU cycle counter.
    #[must_use]
    pub fn cpu_cycle(&self) -> u64 {
        self.cpu_cycle
    }

    /// Whether OAM DMA currently owns the bus.
    #[must_use]
    pub fn dma_active(&self) -> bool {
        self.dma.active
    }

    /// DMA sub-cycles left (for the driver's accounting).
    #[must_use]
    pub fn dma_cycles_remaining(&self) -> u16 {
        if self.dma.active {
            self.dma.total_cycles() - self.dma.step
        } else {
            0
        }
    }

    /// Run one OAM DMA sub-cycle: an alignment cycle, a source-page read,
    /// or an OAMDATA write (513 total, 514 when triggered on an odd cycle).
    pub fn dma_cycle(&mut self) {
        if !self.dma.active {
            return;
        }

        if self.dma.step >= self.dma.align {
            let i = self.dma.step - self.dma.align;
            if i % 2 == 0 {
                let offset = i / 2;
                let addr = (Address::from(self.dma.page) << 8) | offset;
                self.dma.latch = self.read(addr);
            } else {
                let latch = self.dma.latch;
                self.write(0x2004, latch);
            }
        }
        // Alignment cycles idle without touching the bus.

        self.dma.step += 1;
        if self.dma.step >= self.dma.total_cycles() {
            self.dma.active = false;
        }
    }

    /// Advance PPU (3 dots per cycle) and APU (1:1) for `cycles` CPU
    /// cycles, collecting interrupt side effects.
    pub fn tick_components(&mut self, cycles: u16) {
        for _ in 0..cycles {
            for _ in 0..3 {
                let mirroring = self.mapper.mirroring();
                let mut mem = PpuMemory {
                    mapper: &mut *self.mapper,
                    ciram: &mut self.ciram,
                    mirroring,
                    a12_level: &mut self.a12_level,
                };
                let result = self.ppu.tick_dot(&mut mem);
                if result.nmi {
                    self.nmi_pending = true;
                }
            }
            if self.ppu.take_nmi_retract() {
                self.nmi_retract = true;
                self.nmi_pending = false;
            }

            self.apu.tick();
            let sample = self.apu.output();
            self.audio.push(sample);

            if self.open_bus_decay > 0 {
                self.open_bus_decay -= 1;
                if self.open_bus_decay == 0 {
                    // An undriven bus drifts high.
                    self.open_bus = 0xFF;
                }
            }
        }
    }

    /// Take a collected NMI edge.
    #[must_use]
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_pending)
    }

    /// Take a collected $2002-race NMI retraction.
    #[must_use]
    pub fn take_nmi_retract(&mut self) -> bool {
        std::mem::take(&mut self.nmi_retract)
    }

    /// Current IRQ line level: APU frame/DMC IRQ or mapper IRQ.
    #[must_use]
    pub fn irq_level(&self) -> bool {
        self.apu.irq_pending() || self.mapper.irq_pending()
    }

    /// Route a PPU register access through the memory adapter.
    fn ppu_register_read(&mut self, addr: Address) -> Byte {
        let mirroring = self.mapper.mirroring();
        let mut mem = PpuMemory {
            mapper: &mut *self.mapper,
            ciram: &mut self.ciram,
            mirroring,
            a12_level: &mut self.a12_level,
        };
        self.ppu.read_register(addr, &mut mem)
    }

    fn ppu_register_write(&mut self, addr: Address, value: Byte) {
        let mirroring = self.mapper.mirroring();
        let mut mem = PpuMemory {
            mapper: &mut *self.mapper,
            ciram: &mut self.ciram,
            mirroring,
            a12_level: &mut self.a12_level,
        };
        self.ppu.write_register(addr, value, &mut mem);
    }
}

impl Bus for SystemBus {
    fn read(&mut self, addr: Address) -> Byte {
        self.count_cpu_cycle();

        let value = match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x2000..=0x3FFF => self.ppu_register_read(addr),
            0x4015 => self.apu.read_status() | (self.open_bus & 0x20),
            0x4016 => self.controller1.read() | (self.open_bus & 0xE0),
            0x4017 => self.controller2.read() | (self.open_bus & 0xE0),
            // Write-only APU ports, the DMA trigger, and the disabled test
            // registers all read back the floating bus.
            0x4000..=0x4014 | 0x4018..=0x401F => self.open_bus,
            0x4020..=0xFFFF => self.mapper.cpu_read(addr),
        };

        self.drive_bus(value);
        value
    }

    fn write(&mut self, addr: Address, value: Byte) {
        self.count_cpu_cycle();
        self.drive_bus(value);

        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = value,
            0x2000..=0x3FFF => self.ppu_register_write(addr, value),
            0x4014 => {
                // Transfer begins on the next CPU cycle; an extra
                // alignment cycle is inserted when triggered on an odd one.
                self.dma = OamDma {
                    active: true,
                    page: value,
                    step: 0,
                    align: 1 + (self.cpu_cycle & 1) as u16,
                    latch: 0,
                };
            }
            0x4016 => {
                self.controller1.write_strobe(value);
                self.controller2.write_strobe(value);
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, value),
            0x4018..=0x401F => {}
            0x4020..=0xFFFF => self.mapper.cpu_write(addr, value),
        }
    }

    fn peek(&self, addr: Address) -> Byte {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            0x4015 => self.apu.peek_status(),
            0x4020..=0xFFFF => self.mapper.cpu_read(addr),
            // PPU registers and I/O ports have side effects; report the
            // latch instead.
            _ => self.open_bus,
        }
    }

    fn dma_halted(&self) -> bool {
        self.dma.active
    }
}

impl Snapshot for SystemBus {
    fn save_state(&self, w: &mut StateWriter) {
        w.put_bytes(&self.ram);
        w.put_bytes(&self.ciram);
        self.controller1.save_state(w);
        self.controller2.save_state(w);
        w.put_u8(self.open_bus);
        w.put_u32(self.open_bus_decay);
        w.put_u64(self.cpu_cycle);
        w.put_bool(self.dma.active);
        w.put_u8(self.dma.page);
        w.put_u16(self.dma.step);
        w.put_u16(self.dma.align);
        w.put_u8(self.dma.latch);
        w.put_bool(self.a12_level);
        w.put_bool(self.nmi_pending);
        w.put_bool(self.nmi_retract);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        r.get_bytes(&mut self.ram)?;
        r.get_bytes(&mut self.ciram)?;
        self.controller1.load_state(r)?;
        self.controller2.load_state(r)?;
        self.open_bus = r.get_u8()?;
        self.open_bus_decay = r.get_u32()?;
        self.cpu_cycle = r.get_u64()?;
        self.dma.active = r.get_bool()?;
        self.dma.page = r.get_u8()?;
        self.dma.step = r.get_u16()?;
        self.dma.align = r.get_u16()?;
        self.dma.latch = r.get_u8()?;
        self.a12_level = r.get_bool()?;
        self.nmi_pending = r.get_bool()?;
        self.nmi_retract = r.get_bool()?;
        Ok(())
    }
}
