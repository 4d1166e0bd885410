//! Console driver: owns the CPU and system bus and pumps the clocks.
//!
//! The pump advances in CPU-cycle units. Each iteration runs either one
//! whole CPU instruction, one OAM DMA sub-cycle, or one idle cycle of a
//! halted CPU, then feeds the PPU three dots and the APU one cycle per
//! consumed CPU cycle and re-samples the interrupt lines:
//!
//! ```text
//! loop per iteration:
//!   if DMA active: service one DMA sub-cycle (read or write)
//!   else:          execute one CPU instruction (1..8 cycles)
//!   tick PPU  3 dots per consumed cycle (may raise NMI / clock mappers)
//!   tick APU  1 cycle per consumed cycle (may assert IRQ)
//!   apply NMI edge / $2002-race retraction; refresh the IRQ level
//! ```
//!
//! Instructions are atomic: there is no mid-instruction cancellation, and
//! save states are captured only between iterations.

use crate::bus::SystemBus;
use crate::error::EmuError;
use crate::save_state;
use vibenes_common::{Byte, CpuCycle};
use vibenes_cpu::{Bus, Cpu};
use vibenes_mappers::{create_mapper, Rom};

/// A powered machine: CPU plus everything on the bus.
struct Machine {
    cpu: Cpu,
    bus: SystemBus,
}

/// The emulated console.
///
/// Created empty; [`Console::load_rom`] inserts a cartridge and cold-boots.
#[derive(Default)]
pub struct Console {
    machine: Option<Machine>,
    running: bool,
    total_cycles: u64,
    frame_count: u64,
}

impl Console {
    /// Create a console with no cartridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a ROM image, build the matching mapper, and cold-boot.
    ///
    /// # Errors
    ///
    /// Returns [`EmuError::InvalidRom`] for malformed images and
    /// [`EmuError::UnsupportedMapper`] for mapper IDs outside {0..=4}.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), EmuError> {
        let rom = Rom::load(data)?;
        let mapper = create_mapper(&rom)?;
        log::debug!(
            "cartridge inserted: mapper {} ({})",
            mapper.mapper_number(),
            mapper.mapper_name()
        );

        self.machine = Some(Machine {
            cpu: Cpu::new(),
            bus: SystemBus::new(mapper),
        });
        self.power_on();
        Ok(())
    }

    /// Eject the cartridge.
    pub fn unload_rom(&mut self) {
        self.machine = None;
        self.running = false;
    }

    /// Whether a cartridge is loaded.
    #[must_use]
    pub fn has_cartridge(&self) -> bool {
        self.machine.is_some()
    }

    /// Cold boot: RAM gets the power-on pattern, every component returns
    /// to its initial state, and the CPU runs the reset sequence.
    pub fn power_on(&mut self) {
        if let Some(m) = &mut self.machine {
            m.bus.power_on();
            m.cpu = Cpu::new();
            let cycles = m.cpu.reset(&mut m.bus);
            m.bus.tick_components(u16::from(cycles));
            self.running = true;
            self.total_cycles = u64::from(cycles);
            self.frame_count = 0;
        }
    }

    /// Warm reset: RAM survives, registers and mapper state return to
    /// power-on defaults, the CPU vectors through $FFFC.
    pub fn reset(&mut self) {
        if let Some(m) = &mut self.machine {
            m.bus.reset();
            let cycles = m.cpu.reset(&mut m.bus);
            m.bus.tick_components(u16::from(cycles));
            self.running = true;
        }
    }

    /// Stop the pump; [`Console::resume`] restarts it.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Resume after [`Console::stop`].
    pub fn resume(&mut self) {
        if self.machine.is_some() {
            self.running = true;
        }
    }

    /// Whether the pump is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// One pump iteration. Returns the CPU cycles consumed (0 when no
    /// cartridge is loaded or the console is stopped).
    pub fn step(&mut self) -> CpuCycle {
        if !self.running {
            return 0;
        }
        let Some(m) = &mut self.machine else {
            return 0;
        };

        let cycles: u16 = if m.bus.dma_active() {
            // The CPU is halted; one DMA sub-cycle owns the bus.
            m.bus.dma_cycle();
            1
        } else {
            u16::from(m.cpu.step(&mut m.bus))
        };

        m.bus.tick_components(cycles);

        // Interrupt wiring: retraction first (it refers to an edge already
        // delivered), then any fresh edge, then the level-sensitive IRQ.
        if m.bus.take_nmi_retract() {
            m.cpu.cancel_nmi();
        }
        if m.bus.take_nmi() {
            m.cpu.trigger_nmi();
        }
        m.cpu.set_irq_line(m.bus.irq_level());

        self.total_cycles += u64::from(cycles);
        CpuCycle::from(cycles)
    }

    /// Run at least `cycles` CPU cycles (whole instructions; the overshoot
    /// of the final instruction is included in the return value).
    pub fn step_cycles(&mut self, cycles: CpuCycle) -> CpuCycle {
        let mut consumed: CpuCycle = 0;
        while consumed < cycles {
            let step = self.step();
            if step == 0 {
                break;
            }
            consumed += step;
        }
        consumed
    }

    /// Run until the PPU completes a frame. Returns the cycles consumed.
    pub fn step_frame(&mut self) -> u64 {
        let Some(m) = &mut self.machine else {
            return 0;
        };
        m.bus.ppu.clear_frame_ready();

        let mut consumed: u64 = 0;
        loop {
            let step = self.step();
            if step == 0 {
                break;
            }
            consumed += step as u64;
            let Some(m) = &self.machine else { break };
            if m.bus.ppu.frame_ready() {
                break;
            }
        }
        self.frame_count += 1;
        consumed
    }

    /// The 256x240 RGBA frame buffer (empty when no cartridge is loaded).
    #[must_use]
    pub fn frame_buffer(&self) -> &[u32] {
        self.machine
            .as_ref()
            .map_or(&[], |m| m.bus.ppu.frame_buffer())
    }

    /// Whether a completed frame awaits the consumer.
    #[must_use]
    pub fn frame_ready(&self) -> bool {
        self.machine
            .as_ref()
            .is_some_and(|m| m.bus.ppu.frame_ready())
    }

    /// Consumer acknowledges the frame.
    pub fn clear_frame_ready(&mut self) {
        if let Some(m) = &mut self.machine {
            m.bus.ppu.clear_frame_ready();
        }
    }

    /// Pull one CPU-rate audio sample (oldest first).
    pub fn pull_audio_sample(&mut self) -> Option<f32> {
        self.machine.as_mut().and_then(|m| m.bus.audio.pop())
    }

    /// Host input: set a controller's button mask
    /// ({A, B, Select, Start, Up, Down, Left, Right} in bits 0-7).
    pub fn set_buttons(&mut self, player: usize, mask: Byte) {
        if let Some(m) = &mut self.machine {
            match player {
                0 => m.bus.controller1.set_buttons(mask),
                1 => m.bus.controller2.set_buttons(mask),
                _ => {}
            }
        }
    }

    /// Whether the CPU jammed on an unstable-illegal opcode. The PPU keeps
    /// scanning out, so the screen freezes on the last frame.
    #[must_use]
    pub fn cpu_halted(&self) -> bool {
        self.machine.as_ref().is_some_and(|m| m.cpu.is_halted())
    }

    /// The halt as a reportable error, if the CPU is jammed.
    #[must_use]
    pub fn halt_error(&self) -> Option<EmuError> {
        self.machine
            .as_ref()
            .and_then(|m| m.cpu.halt_opcode())
            .map(|opcode| EmuError::IllegalCpuInstruction { opcode })
    }

    /// Serialize the complete machine state.
    ///
    /// # Errors
    ///
    /// Returns [`EmuError::NoCartridge`] when nothing is loaded.
    pub fn save_state(&self) -> Result<Vec<u8>, EmuError> {
        let m = self.machine.as_ref().ok_or(EmuError::NoCartridge)?;
        Ok(save_state::serialize(&m.cpu, &m.bus))
    }

    /// Restore machine state captured by [`Console::save_state`].
    ///
    /// # Errors
    ///
    /// Returns [`EmuError::NoCartridge`] when nothing is loaded, or
    /// [`EmuError::SaveStateCorrupt`] when the buffer fails validation
    /// (including the "wrong ROM" CRC check).
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), EmuError> {
        let m = self.machine.as_mut().ok_or(EmuError::NoCartridge)?;
        save_state::deserialize(&mut m.cpu, &mut m.bus, data)?;
        Ok(())
    }

    /// Total CPU cycles executed since power-on.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Frames completed by [`Console::step_frame`].
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Peek at CPU address space without side effects.
    #[must_use]
    pub fn peek_memory(&self, addr: u16) -> Byte {
        self.machine.as_ref().map_or(0, |m| m.bus.peek(addr))
    }

    /// CPU access for tests and debugging.
    #[must_use]
    pub fn cpu(&self) -> Option<&Cpu> {
        self.machine.as_ref().map(|m| &m.cpu)
    }

    /// Mutable CPU access for tests and debugging.
    pub fn cpu_mut(&mut self) -> Option<&mut Cpu> {
        self.machine.as_mut().map(|m| &mut m.cpu)
    }

    /// Bus access for tests and debugging.
    #[must_use]
    pub fn bus(&self) -> Option<&SystemBus> {
        self.machine.as_ref().map(|m| &m.bus)
    }

    /// Mutable bus access for tests and debugging.
    pub fn bus_mut(&mut self) -> Option<&mut SystemBus> {
        self.machine.as_mut().map(|m| &mut m.bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal NROM image: a NOP slide with the reset vector at $8000.
    fn nop_rom() -> Vec<u8> {
        let mut data = vec![0x4E, 0x45, 0x53, 0x1A, 2, 1, 0x01, 0x00];
        data.extend_from_slice(&[0; 8]);
        let mut prg = vec![0xEA; 32768];
        prg[0x7FFC] = 0x00;
        prg[0x7FFD] = 0x80;
        data.extend_from_slice(&prg);
        data.extend_from_slice(&[0; 8192]);
        data
    }

    #[test]
    fn test_load_rom_and_boot() {
        let mut console = Console::new();
        console.load_rom(&nop_rom()).unwrap();
        assert!(console.has_cartridge());
        assert!(console.is_running());
        assert_eq!(console.cpu().unwrap().pc, 0x8000);
    }

    #[test]
    fn test_invalid_rom_rejected() {
        let mut console = Console::new();
        let err = console.load_rom(&[0x00, 0x01]).unwrap_err();
        assert!(matches!(err, EmuError::InvalidRom(_)));
        assert!(!console.has_cartridge());
    }

    #[test]
    fn test_step_without_cartridge_is_noop() {
        let mut console = Console::new();
        assert_eq!(console.step(), 0);
        assert_eq!(console.step_frame(), 0);
        assert!(console.frame_buffer().is_empty());
    }

    #[test]
    fn test_step_cycles_runs_whole_instructions() {
        let mut console = Console::new();
        console.load_rom(&nop_rom()).unwrap();
        let consumed = console.step_cycles(7);
        // NOPs are 2 cycles each; 7 requested -> 8 consumed.
        assert_eq!(consumed, 8);
    }

    #[test]
    fn test_step_frame_produces_frame() {
        let mut console = Console::new();
        console.load_rom(&nop_rom()).unwrap();
        let cycles = console.step_frame();
        assert!(console.frame_ready());
        // The first frame is short (boot lands mid-frame); steady-state
        // frames are close to 29780 CPU cycles.
        assert!(cycles > 20_000, "cycles = {cycles}");
        let cycles = console.step_frame();
        assert!((29_000..31_000).contains(&cycles), "cycles = {cycles}");
        assert_eq!(console.frame_count(), 2);
        assert_eq!(console.frame_buffer().len(), 256 * 240);

        console.clear_frame_ready();
        assert!(!console.frame_ready());
    }

    #[test]
    fn test_stop_halts_pump() {
        let mut console = Console::new();
        console.load_rom(&nop_rom()).unwrap();
        console.stop();
        assert_eq!(console.step(), 0);
        console.resume();
        assert!(console.step() > 0);
    }

    #[test]
    fn test_reset_preserves_ram() {
        let mut console = Console::new();
        console.load_rom(&nop_rom()).unwrap();
        console.bus_mut().unwrap().ram[0x10] = 0x77;
        console.reset();
        assert_eq!(console.bus().unwrap().ram[0x10], 0x77);
        assert_eq!(console.cpu().unwrap().pc, 0x8000);
    }

    #[test]
    fn test_power_on_randomizes_ram() {
        let mut console = Console::new();
        console.load_rom(&nop_rom()).unwrap();
        console.bus_mut().unwrap().ram[0x10] = 0x77;
        console.power_on();
        assert_eq!(
            console.bus().unwrap().ram[0x10],
            SystemBus::power_on_pattern(0x10)
        );
    }

    #[test]
    fn test_audio_samples_flow_at_cpu_rate() {
        let mut console = Console::new();
        console.load_rom(&nop_rom()).unwrap();
        console.step_cycles(100);
        let mut pulled = 0;
        while console.pull_audio_sample().is_some() {
            pulled += 1;
        }
        // One sample per CPU cycle, including the boot cycles.
        assert!(pulled >= 100);
    }

    #[test]
    fn test_save_state_requires_cartridge() {
        let console = Console::new();
        assert!(matches!(
            console.save_state(),
            Err(EmuError::NoCartridge)
        ));
    }

    #[test]
    fn test_cpu_halt_freezes_machine_but_not_ppu() {
        let mut console = Console::new();
        // XAA at the reset target jams the CPU immediately.
        let mut data = nop_rom();
        let prg_start = 16;
        data[prg_start] = 0x8B;
        console.load_rom(&data).unwrap();

        console.step();
        assert!(console.cpu_halted());
        assert!(matches!(
            console.halt_error(),
            Some(EmuError::IllegalCpuInstruction { opcode: 0x8B })
        ));

        // The PPU keeps producing frames.
        let cycles = console.step_frame();
        assert!(cycles > 0);
        assert!(console.frame_ready());
    }
}
