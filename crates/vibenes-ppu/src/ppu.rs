//! Main 2C02 PPU implementation: the dot pipeline.
//!
//! The PPU is clocked three dots per CPU cycle via [`Ppu::tick_dot`]. Each
//! dot advances the (scanline, dot) counters and performs the work wired
//! to that position: background fetches, sprite evaluation and fetches,
//! scroll register updates, pixel output, and the VBlank/NMI handshake.
//!
//! # Memory
//!
//! Pattern tables ($0000-$1FFF) and nametables ($2000-$2FFF) are reached
//! through the [`PpuBus`] trait, implemented by the system bus with the
//! cartridge's mirroring applied. Palette RAM ($3F00-$3F1F) lives inside
//! the PPU, with $3F10/$3F14/$3F18/$3F1C aliasing their background
//! counterparts.
//!
//! # CPU registers ($2000-$2007)
//!
//! ```text
//! $2000 PPUCTRL    $2001 PPUMASK   $2002 PPUSTATUS  $2003 OAMADDR
//! $2004 OAMDATA    $2005 PPUSCROLL $2006 PPUADDR    $2007 PPUDATA
//! ```

use crate::background::Background;
use crate::oam::{Oam, SecondaryOam};
use crate::palette::compose_rgba;
use crate::registers::{PpuCtrl, PpuMask, PpuStatus};
use crate::scroll::Scroll;
use crate::sprites::{SpriteEvaluator, SpriteRenderer};
use crate::timing::Timing;
use vibenes_common::{Address, Byte, Snapshot, StateError, StateReader, StateWriter};

/// Frame buffer width in pixels.
pub const FRAME_WIDTH: usize = 256;
/// Frame buffer height in pixels.
pub const FRAME_HEIGHT: usize = 240;
/// Frame buffer pixel count.
pub const FRAME_SIZE: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// PPU-side memory bus: pattern tables and nametables.
///
/// The system bus implements this, routing $0000-$1FFF to the cartridge
/// (watching A12 for the mapper) and $2000-$2FFF to internal VRAM with the
/// cartridge-selected mirroring.
pub trait PpuBus {
    /// Read a byte from PPU address space ($0000-$3EFF).
    fn read(&mut self, addr: Address) -> Byte;

    /// Write a byte into PPU address space ($0000-$3EFF).
    fn write(&mut self, addr: Address, value: Byte);
}

/// Side effects of one dot, applied by the driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickResult {
    /// An NMI edge should be delivered to the CPU.
    pub nmi: bool,
    /// The frame counter rolled over (end of pre-render scanline).
    pub frame_complete: bool,
}

/// The 2C02 Picture Processing Unit.
pub struct Ppu {
    // Registers
    ctrl: PpuCtrl,
    mask: PpuMask,
    status: PpuStatus,
    scroll: Scroll,
    timing: Timing,

    // Rendering pipeline
    background: Background,
    oam: Oam,
    secondary_oam: SecondaryOam,
    sprite_evaluator: SpriteEvaluator,
    sprite_renderer: SpriteRenderer,

    // Palette RAM ($3F00-$3F1F), 6 bits per entry
    palette_ram: [Byte; 32],

    // $2007 read latch: non-palette reads return the previous fetch
    read_buffer: Byte,
    // PPU-side open bus (write-only register reads, palette upper bits)
    open_bus: Byte,
    // Dots until the open-bus latch decays
    decay_counter: u32,

    // NMI edge waiting for the driver to collect
    nmi_pending: bool,
    // A $2002 read hit the VBlank race window; driver must retract the NMI
    nmi_retract: bool,

    // Output
    frame_buffer: Vec<u32>,
    frame_ready: bool,
}

impl Ppu {
    /// Open-bus decay time in dots (roughly one second).
    const DECAY_DOTS: u32 = 5_300_000;

    /// Create a PPU in power-on state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ctrl: PpuCtrl::empty(),
            mask: PpuMask::empty(),
            status: PpuStatus::empty(),
            scroll: Scroll::new(),
            timing: Timing::new(),
            background: Background::new(),
            oam: Oam::new(),
            secondary_oam: SecondaryOam::new(),
            sprite_evaluator: SpriteEvaluator::new(),
            sprite_renderer: SpriteRenderer::new(),
            palette_ram: [0; 32],
            read_buffer: 0,
            open_bus: 0,
            decay_counter: 0,
            nmi_pending: false,
            nmi_retract: false,
            frame_buffer: vec![0; FRAME_SIZE],
            frame_ready: false,
        }
    }

    /// Reset to power-up register state. Timing restarts; OAM and palette
    /// contents persist as on hardware.
    pub fn reset(&mut self) {
        self.ctrl = PpuCtrl::empty();
        self.mask = PpuMask::empty();
        self.status = PpuStatus::empty();
        self.scroll = Scroll::new();
        self.timing.reset();
        self.background.reset();
        self.secondary_oam.clear();
        self.sprite_renderer.clear();
        self.read_buffer = 0;
        self.nmi_pending = false;
        self.nmi_retract = false;
        self.frame_ready = false;
    }

    // =========================================================================
    // DRIVER INTERFACE
    // =========================================================================

    /// Current scanline (0-261).
    #[must_use]
    pub fn scanline(&self) -> u16 {
        self.timing.scanline()
    }

    /// Current dot (0-340).
    #[must_use]
    pub fn dot(&self) -> u16 {
        self.timing.dot()
    }

    /// Frames completed since power-on.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.timing.frame()
    }

    /// The rendered frame, 256x240 RGBA pixels.
    #[must_use]
    pub fn frame_buffer(&self) -> &[u32] {
        &self.frame_buffer
    }

    /// Whether a completed frame is waiting for the consumer.
    #[must_use]
    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    /// Consumer acknowledges the frame.
    pub fn clear_frame_ready(&mut self) {
        self.frame_ready = false;
    }

    /// Take a pending $2002-race NMI retraction.
    #[must_use]
    pub fn take_nmi_retract(&mut self) -> bool {
        std::mem::take(&mut self.nmi_retract)
    }

    /// OAM DMA port: one byte into OAMDATA.
    pub fn write_oam_data(&mut self, value: Byte) {
        self.oam.write(value);
    }

    /// Current OAMADDR (DMA wraps relative to it).
    #[must_use]
    pub fn oam_addr(&self) -> Byte {
        self.oam.addr()
    }

    /// Direct OAM inspection for tests and DMA verification.
    #[must_use]
    pub fn oam_byte(&self, addr: Byte) -> Byte {
        self.oam.read_at(addr)
    }

    /// Whether rendering (background or sprites) is enabled.
    #[must_use]
    pub fn rendering_enabled(&self) -> bool {
        self.mask.rendering_enabled()
    }

    // =========================================================================
    // REGISTER FILE ($2000-$2007)
    // =========================================================================

    /// Read a PPU register (address is masked to the 8-register window).
    pub fn read_register(&mut self, addr: Address, bus: &mut impl PpuBus) -> Byte {
        match addr & 0x07 {
            // Write-only registers return the decaying open-bus latch.
            0 | 1 | 3 | 5 | 6 => self.open_bus,

            2 => self.read_status(),

            4 => {
                let value = self.read_oam_data();
                self.open_bus = value;
                self.refresh_open_bus();
                value
            }

            7 => {
                let value = self.read_data(bus);
                self.open_bus = value;
                self.refresh_open_bus();
                value
            }

            _ => unreachable!(),
        }
    }

    /// Write a PPU register.
    pub fn write_register(&mut self, addr: Address, value: Byte, bus: &mut impl PpuBus) {
        self.open_bus = value;
        self.refresh_open_bus();

        match addr & 0x07 {
            0 => {
                let was_enabled = self.ctrl.nmi_enabled();
                self.ctrl = PpuCtrl::from_bits_truncate(value);
                self.scroll.write_ctrl(value);

                // Enabling NMI while the VBlank flag is already set raises
                // the edge immediately.
                if !was_enabled
                    && self.ctrl.nmi_enabled()
                    && self.status.contains(PpuStatus::VBLANK)
                {
                    self.nmi_pending = true;
                }
            }
            1 => self.mask = PpuMask::from_bits_truncate(value),
            2 => {} // PPUSTATUS is read-only
            3 => self.oam.set_addr(value),
            4 => self.oam.write(value),
            5 => self.scroll.write_scroll(value),
            6 => self.scroll.write_addr(value),
            7 => {
                let vram_addr = self.scroll.vram_addr() & 0x3FFF;
                if vram_addr >= 0x3F00 {
                    self.palette_write(vram_addr, value);
                } else {
                    bus.write(vram_addr, value);
                }
                self.scroll.increment_vram(self.ctrl.vram_increment());
            }
            _ => unreachable!(),
        }
    }

    /// $2002: status read with the VBlank race.
    fn read_status(&mut self) -> Byte {
        let mut value = (self.status.bits() & 0xE0) | (self.open_bus & 0x1F);

        // Race: a read landing exactly on the VBlank-set dot sees the flag
        // clear, and the NMI for this frame is suppressed.
        if self.timing.scanline() == 241 && self.timing.dot() == 1 {
            value &= 0x7F;
            self.nmi_pending = false;
            self.nmi_retract = true;
        }

        self.status.remove(PpuStatus::VBLANK);
        self.scroll.reset_toggle();

        // Only bits 7-5 are driven; 4-0 keep decaying.
        self.open_bus = value;
        value
    }

    /// $2004: OAM data read. During rendering the value reflects what the
    /// evaluation hardware is touching.
    fn read_oam_data(&self) -> Byte {
        if self.mask.rendering_enabled() && self.timing.is_visible_scanline() {
            let dot = self.timing.dot();
            return match dot {
                1..=64 => 0xFF, // Secondary OAM clear reads back $FF
                65..=256 => self.sprite_evaluator.current_byte(),
                257..=320 => 0xFF,
                _ => self.oam.read(),
            };
        }
        self.oam.read()
    }

    /// $2007: buffered VRAM read (palette reads bypass the buffer).
    fn read_data(&mut self, bus: &mut impl PpuBus) -> Byte {
        let vram_addr = self.scroll.vram_addr() & 0x3FFF;

        let value = if vram_addr >= 0x3F00 {
            // Palette data is returned directly, upper bits from open bus;
            // the buffer refills from the nametable underneath.
            let palette = self.palette_read(vram_addr);
            self.read_buffer = bus.read(vram_addr - 0x1000);
            (palette & 0x3F) | (self.open_bus & 0xC0)
        } else {
            let buffered = self.read_buffer;
            self.read_buffer = bus.read(vram_addr);
            buffered
        };

        self.scroll.increment_vram(self.ctrl.vram_increment());
        value
    }

    /// Map a palette address onto the 32-byte RAM, applying the
    /// sprite-backdrop mirrors ($3F10/$3F14/$3F18/$3F1C -> $3F00...).
    fn palette_index(addr: Address) -> usize {
        let mut index = (addr & 0x1F) as usize;
        if index & 0x13 == 0x10 {
            index &= !0x10;
        }
        index
    }

    fn palette_read(&self, addr: Address) -> Byte {
        self.palette_ram[Self::palette_index(addr)]
    }

    fn palette_write(&mut self, addr: Address, value: Byte) {
        self.palette_ram[Self::palette_index(addr)] = value & 0x3F;
    }

    #[inline]
    fn refresh_open_bus(&mut self) {
        self.decay_counter = Self::DECAY_DOTS;
    }

    // =========================================================================
    // DOT PIPELINE
    // =========================================================================

    /// Advance the PPU by one dot.
    pub fn tick_dot(&mut self, bus: &mut impl PpuBus) -> TickResult {
        if self.decay_counter > 0 {
            self.decay_counter -= 1;
            if self.decay_counter == 0 {
                self.open_bus = 0;
            }
        }

        let rendering = self.mask.rendering_enabled();
        let frame_complete = self.timing.tick(rendering);

        let scanline = self.timing.scanline();
        let dot = self.timing.dot();

        // VBlank begins.
        if self.timing.is_vblank_set_dot() {
            self.status.insert(PpuStatus::VBLANK);
            if self.ctrl.nmi_enabled() {
                self.nmi_pending = true;
            }
        }

        // Frame latched for the consumer once the visible field is done.
        if scanline == 241 && dot == 0 {
            self.frame_ready = true;
        }

        // Pre-render: clear the frame's status flags.
        if self.timing.is_vblank_clear_dot() {
            self.status
                .remove(PpuStatus::VBLANK | PpuStatus::SPRITE_ZERO_HIT | PpuStatus::SPRITE_OVERFLOW);
            self.nmi_pending = false;
        }

        if rendering && self.timing.is_rendering_scanline() {
            self.run_fetch_pipeline(bus, scanline, dot);
        }

        // Pixel output happens whether or not rendering is enabled (the
        // backdrop color still reaches the screen).
        if self.timing.is_visible_scanline() && self.timing.is_visible_dot() {
            self.render_pixel(dot - 1, scanline);
        }

        let nmi = std::mem::take(&mut self.nmi_pending);
        TickResult {
            nmi,
            frame_complete,
        }
    }

    /// Background/sprite fetch work for one dot of a rendering scanline.
    fn run_fetch_pipeline(&mut self, bus: &mut impl PpuBus, scanline: u16, dot: u16) {
        // --- Background tile fetches ---
        if self.timing.is_visible_dot() || self.timing.is_prefetch_dot() {
            self.background.shift();

            match dot % 8 {
                1 => {
                    let byte = bus.read(self.scroll.nametable_addr());
                    self.background.set_nametable_byte(byte);
                }
                3 => {
                    let byte = bus.read(self.scroll.attribute_addr());
                    self.background
                        .set_attribute_byte(byte, self.scroll.coarse_x(), self.scroll.coarse_y());
                }
                5 => {
                    let addr = self.background_pattern_addr();
                    let byte = bus.read(addr);
                    self.background.set_pattern_lo(byte);
                }
                7 => {
                    let addr = self.background_pattern_addr() + 8;
                    let byte = bus.read(addr);
                    self.background.set_pattern_hi(byte);
                }
                0 => {
                    self.background.reload_shift_registers();
                    self.scroll.increment_x();
                }
                _ => {}
            }

            if dot == 256 {
                self.scroll.increment_y();
            }
        }

        // --- Scroll reloads ---
        if dot == 257 {
            self.scroll.copy_horizontal();
        }
        if self.timing.is_vertical_copy_dot() {
            self.scroll.copy_vertical();
        }

        // --- Sprite evaluation (for the NEXT scanline) ---
        if self.timing.is_visible_scanline() {
            if dot == 1 {
                self.secondary_oam.clear();
            }
            if dot == 65 {
                self.sprite_evaluator.start(self.oam.addr());
            }
            if self.timing.is_sprite_eval_dot() && dot % 2 == 1 {
                self.sprite_evaluator.step(
                    &self.oam,
                    scanline + 1,
                    self.ctrl.sprite_height(),
                    &mut self.secondary_oam,
                );
                if self.sprite_evaluator.overflow() {
                    self.status.insert(PpuStatus::SPRITE_OVERFLOW);
                }
            }
        } else if dot == 1 {
            // Pre-render: no evaluation ran, so scanline 0 gets no sprites.
            self.secondary_oam.clear();
        }

        // --- Sprite pattern fetches ---
        if self.timing.is_sprite_fetch_dot() {
            // The hardware parks OAMADDR at 0 for the whole fetch window.
            self.oam.set_addr(0);

            if dot == 257 {
                self.sprite_renderer
                    .load(&self.secondary_oam, self.sprite_evaluator.sprite_zero_in_range());
            }

            let fetch_cycle = dot - 257;
            if fetch_cycle % 8 == 7 {
                let slot = (fetch_cycle / 8) as u8;
                self.fetch_sprite_pattern(bus, slot, scanline);
            }
        }
    }

    /// Pattern address for the background tile in flight.
    fn background_pattern_addr(&self) -> Address {
        self.ctrl.background_table()
            + Address::from(self.background.nametable_byte()) * 16
            + Address::from(self.scroll.fine_y())
    }

    /// Fetch the two pattern planes for one sprite slot. Empty slots still
    /// perform the bus reads (tile $FF), which is what keeps A12 pulsing
    /// once per scanline for the MMC3 even on sprite-less screens.
    fn fetch_sprite_pattern(&mut self, bus: &mut impl PpuBus, slot: u8, scanline: u16) {
        let next_scanline = if self.timing.is_prerender_scanline() {
            0
        } else {
            scanline + 1
        };
        let tall = self.ctrl.sprite_height() == 16;

        let (addr, flip_horizontal, loaded) = match self.secondary_oam.sprite(slot) {
            Some(sprite) => {
                let height = self.ctrl.sprite_height();
                let mut row = next_scanline
                    .saturating_sub(u16::from(sprite.y) + 1)
                    .min(height - 1);
                if sprite.flip_vertical() {
                    row = height - 1 - row;
                }

                let addr = if tall {
                    let table = Address::from(sprite.tile & 0x01) * 0x1000;
                    let tile = Address::from(sprite.tile & 0xFE) + Address::from(row >= 8);
                    table + tile * 16 + (row & 0x07)
                } else {
                    self.ctrl.sprite_table() + Address::from(sprite.tile) * 16 + row
                };
                (addr, sprite.flip_horizontal(), true)
            }
            None => {
                // Dummy fetch of tile $FF.
                let addr = if tall {
                    0x1000 + 0xFF0
                } else {
                    self.ctrl.sprite_table() + 0xFF0
                };
                (addr, false, false)
            }
        };

        let mut pattern_lo = bus.read(addr);
        let mut pattern_hi = bus.read(addr + 8);

        if loaded {
            if flip_horizontal {
                pattern_lo = pattern_lo.reverse_bits();
                pattern_hi = pattern_hi.reverse_bits();
            }
            self.sprite_renderer.load_pattern(slot, pattern_lo, pattern_hi);
        }
    }

    /// Multiplex background and sprite pixels and write one frame-buffer
    /// entry.
    fn render_pixel(&mut self, x: u16, y: u16) {
        let mut bg_pattern = 0;
        let mut bg_palette = 0;
        if self.mask.show_background()
            && (x >= 8 || self.mask.contains(PpuMask::SHOW_BACKGROUND_LEFT))
        {
            let (pattern, palette) = self.background.pixel(self.scroll.fine_x());
            bg_pattern = pattern;
            bg_palette = palette;
        }

        let sprite = if self.mask.show_sprites()
            && (x >= 8 || self.mask.contains(PpuMask::SHOW_SPRITES_LEFT))
        {
            self.sprite_renderer.pixel(x)
        } else {
            None
        };

        // Sprite 0 hit: both layers opaque at the same dot, not at x=255.
        if let Some((_, _, _, true)) = sprite {
            if bg_pattern != 0 && x != 255 {
                self.status.insert(PpuStatus::SPRITE_ZERO_HIT);
            }
        }

        let palette_addr = match (bg_pattern, sprite) {
            (0, None) => 0,
            (0, Some((sp, sp_palette, _, _))) => 0x10 | (sp_palette << 2) | sp,
            (_, None) => (bg_palette << 2) | bg_pattern,
            (_, Some((sp, sp_palette, behind, _))) => {
                if behind {
                    (bg_palette << 2) | bg_pattern
                } else {
                    0x10 | (sp_palette << 2) | sp
                }
            }
        };

        let color = self.palette_read(0x3F00 | Address::from(palette_addr));
        let pixel = compose_rgba(
            color,
            self.mask.contains(PpuMask::GRAYSCALE),
            self.mask.emphasis(),
        );
        self.frame_buffer[usize::from(y) * FRAME_WIDTH + usize::from(x)] = pixel;
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot for Ppu {
    fn save_state(&self, w: &mut StateWriter) {
        w.put_u8(self.ctrl.bits());
        w.put_u8(self.mask.bits());
        w.put_u8(self.status.bits());
        self.scroll.save_state(w);
        self.timing.save_state(w);
        self.background.save_state(w);
        self.oam.save_state(w);
        self.secondary_oam.save_state(w);
        self.sprite_evaluator.save_state(w);
        self.sprite_renderer.save_state(w);
        w.put_bytes(&self.palette_ram);
        w.put_u8(self.read_buffer);
        w.put_u8(self.open_bus);
        w.put_u32(self.decay_counter);
        w.put_bool(self.nmi_pending);
        w.put_bool(self.nmi_retract);
        w.put_bool(self.frame_ready);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.ctrl = PpuCtrl::from_bits_truncate(r.get_u8()?);
        self.mask = PpuMask::from_bits_truncate(r.get_u8()?);
        self.status = PpuStatus::from_bits_truncate(r.get_u8()?);
        self.scroll.load_state(r)?;
        self.timing.load_state(r)?;
        self.background.load_state(r)?;
        self.oam.load_state(r)?;
        self.secondary_oam.load_state(r)?;
        self.sprite_evaluator.load_state(r)?;
        self.sprite_renderer.load_state(r)?;
        r.get_bytes(&mut self.palette_ram)?;
        self.read_buffer = r.get_u8()?;
        self.open_bus = r.get_u8()?;
        self.decay_counter = r.get_u32()?;
        self.nmi_pending = r.get_bool()?;
        self.nmi_retract = r.get_bool()?;
        self.frame_ready = r.get_bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat PPU memory for register-level tests.
    struct TestPpuBus {
        mem: Vec<u8>,
    }

    impl TestPpuBus {
        fn new() -> Self {
            Self {
                mem: vec![0; 0x4000],
            }
        }
    }

    impl PpuBus for TestPpuBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.mem[usize::from(addr) & 0x3FFF]
        }

        fn write(&mut self, addr: u16, value: u8) {
            self.mem[usize::from(addr) & 0x3FFF] = value;
        }
    }

    fn tick_to(ppu: &mut Ppu, bus: &mut TestPpuBus, scanline: u16, dot: u16) {
        while !(ppu.scanline() == scanline && ppu.dot() == dot) {
            ppu.tick_dot(bus);
        }
    }

    #[test]
    fn test_vblank_flag_set_and_cleared() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        // A read at the exact set dot is the race and sees the flag clear.
        tick_to(&mut ppu, &mut bus, 241, 1);
        let status = ppu.read_register(0x2002, &mut bus);
        assert_eq!(status & 0x80, 0, "race read must see the flag clear");

        // Run into the NEXT frame's VBlank and read one dot after the set.
        tick_to(&mut ppu, &mut bus, 0, 0);
        tick_to(&mut ppu, &mut bus, 241, 2);
        let status = ppu.read_register(0x2002, &mut bus);
        assert_eq!(status & 0x80, 0x80);
        // Reading cleared it.
        let status = ppu.read_register(0x2002, &mut bus);
        assert_eq!(status & 0x80, 0);

        tick_to(&mut ppu, &mut bus, 261, 1);
        let status = ppu.read_register(0x2002, &mut bus);
        assert_eq!(status & 0x80, 0);
    }

    #[test]
    fn test_nmi_on_vblank_when_enabled() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();
        ppu.write_register(0x2000, 0x80, &mut bus);

        tick_to(&mut ppu, &mut bus, 241, 0);
        let result = ppu.tick_dot(&mut bus);
        assert!(result.nmi);
        assert_eq!(ppu.dot(), 1);

        // Only one edge per VBlank.
        let result = ppu.tick_dot(&mut bus);
        assert!(!result.nmi);
    }

    #[test]
    fn test_no_nmi_when_disabled() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        tick_to(&mut ppu, &mut bus, 241, 0);
        let result = ppu.tick_dot(&mut bus);
        assert!(!result.nmi);
    }

    #[test]
    fn test_enabling_nmi_during_vblank_fires_immediately() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        tick_to(&mut ppu, &mut bus, 250, 0);
        ppu.write_register(0x2000, 0x80, &mut bus);
        let result = ppu.tick_dot(&mut bus);
        assert!(result.nmi);
    }

    #[test]
    fn test_race_read_suppresses_nmi() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();
        ppu.write_register(0x2000, 0x80, &mut bus);

        tick_to(&mut ppu, &mut bus, 241, 1);
        // The set tick has produced the edge; the driver hasn't seen it
        // yet in this simulation because tick_to consumed results. Fresh
        // frame: read at the race dot retracts.
        let status = ppu.read_register(0x2002, &mut bus);
        assert_eq!(status & 0x80, 0);
        assert!(ppu.take_nmi_retract());
        assert!(!ppu.take_nmi_retract());
    }

    #[test]
    fn test_status_read_resets_write_toggle() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        ppu.write_register(0x2006, 0x21, &mut bus);
        let _ = ppu.read_register(0x2002, &mut bus);
        // Toggle was reset: the next write is a high byte again.
        ppu.write_register(0x2006, 0x21, &mut bus);
        ppu.write_register(0x2006, 0x08, &mut bus);
        ppu.write_register(0x2007, 0x42, &mut bus);
        assert_eq!(bus.mem[0x2108], 0x42);
    }

    #[test]
    fn test_ppudata_buffered_read() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();
        bus.mem[0x2100] = 0xAA;
        bus.mem[0x2101] = 0xBB;

        ppu.write_register(0x2006, 0x21, &mut bus);
        ppu.write_register(0x2006, 0x00, &mut bus);

        let first = ppu.read_register(0x2007, &mut bus);
        let second = ppu.read_register(0x2007, &mut bus);
        assert_eq!(first, 0x00); // Stale buffer
        assert_eq!(second, 0xAA); // Previous fetch
    }

    #[test]
    fn test_ppudata_palette_read_is_direct() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        ppu.write_register(0x2006, 0x3F, &mut bus);
        ppu.write_register(0x2006, 0x00, &mut bus);
        ppu.write_register(0x2007, 0x2A, &mut bus);

        ppu.write_register(0x2006, 0x3F, &mut bus);
        ppu.write_register(0x2006, 0x00, &mut bus);
        let value = ppu.read_register(0x2007, &mut bus);
        assert_eq!(value & 0x3F, 0x2A);
    }

    #[test]
    fn test_palette_sprite_backdrop_mirrors() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        for offset in [0x10u16, 0x14, 0x18, 0x1C] {
            let value = (offset as u8) | 0x01;
            ppu.write_register(0x2006, 0x3F, &mut bus);
            ppu.write_register(0x2006, offset as u8, &mut bus);
            ppu.write_register(0x2007, value, &mut bus);

            ppu.write_register(0x2006, 0x3F, &mut bus);
            ppu.write_register(0x2006, (offset - 0x10) as u8, &mut bus);
            let read = ppu.read_register(0x2007, &mut bus);
            assert_eq!(read & 0x3F, value & 0x3F, "mirror of $3F{offset:02X}");
        }
    }

    #[test]
    fn test_vram_increment_32() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();
        ppu.write_register(0x2000, 0x04, &mut bus); // +32 mode

        ppu.write_register(0x2006, 0x20, &mut bus);
        ppu.write_register(0x2006, 0x00, &mut bus);
        ppu.write_register(0x2007, 0x11, &mut bus);
        ppu.write_register(0x2007, 0x22, &mut bus);

        assert_eq!(bus.mem[0x2000], 0x11);
        assert_eq!(bus.mem[0x2020], 0x22);
    }

    #[test]
    fn test_oam_data_write_and_read() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        ppu.write_register(0x2003, 0x00, &mut bus);
        ppu.write_register(0x2004, 0x42, &mut bus);
        ppu.write_register(0x2003, 0x00, &mut bus);
        assert_eq!(ppu.read_register(0x2004, &mut bus), 0x42);
    }

    #[test]
    fn test_write_only_registers_return_open_bus() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        ppu.write_register(0x2001, 0x5A, &mut bus);
        assert_eq!(ppu.read_register(0x2000, &mut bus), 0x5A);
        assert_eq!(ppu.read_register(0x2005, &mut bus), 0x5A);
    }

    #[test]
    fn test_frame_ready_latched_once_per_frame() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        tick_to(&mut ppu, &mut bus, 241, 0);
        assert!(ppu.frame_ready());
        ppu.clear_frame_ready();

        tick_to(&mut ppu, &mut bus, 261, 0);
        assert!(!ppu.frame_ready());
        // Next frame latches again.
        tick_to(&mut ppu, &mut bus, 241, 0);
        assert!(ppu.frame_ready());
    }

    #[test]
    fn test_backdrop_rendered_when_rendering_disabled() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        // Backdrop color 0x21.
        ppu.write_register(0x2006, 0x3F, &mut bus);
        ppu.write_register(0x2006, 0x00, &mut bus);
        ppu.write_register(0x2007, 0x21, &mut bus);

        tick_to(&mut ppu, &mut bus, 241, 0);
        let expected = compose_rgba(0x21, false, 0);
        assert_eq!(ppu.frame_buffer()[0], expected);
        assert_eq!(ppu.frame_buffer()[FRAME_SIZE - 1], expected);
    }

    #[test]
    fn test_background_and_sprite_pixels_reach_the_frame_buffer() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        // Tile 1: low plane solid -> background pattern value 1.
        for row in 0..8 {
            bus.mem[0x0010 + row] = 0xFF;
        }
        // Tile 2: high plane solid -> sprite pattern value 2.
        for row in 0..8 {
            bus.mem[0x0028 + row] = 0xFF;
        }
        // Every nametable entry points at tile 1; attributes select
        // palette 0 everywhere.
        for addr in 0x2000..0x23C0 {
            bus.mem[addr] = 0x01;
        }

        // Palette: backdrop $0F, background color $21, sprite color $16.
        for (offset, value) in [(0x00u8, 0x0F), (0x01, 0x21), (0x12, 0x16)] {
            ppu.write_register(0x2006, 0x3F, &mut bus);
            ppu.write_register(0x2006, offset, &mut bus);
            ppu.write_register(0x2007, value, &mut bus);
        }

        // Sprite 0 at (120, 50), tile 2, front priority.
        ppu.write_register(0x2003, 0x00, &mut bus);
        for byte in [49u8, 0x02, 0x00, 120] {
            ppu.write_register(0x2004, byte, &mut bus);
        }

        // Background + sprites, no left clip.
        ppu.write_register(0x2001, 0x1E, &mut bus);

        // Two full frames so the prefetch pipeline is primed everywhere.
        for _ in 0..2 {
            tick_to(&mut ppu, &mut bus, 241, 0);
            tick_to(&mut ppu, &mut bus, 261, 10);
        }
        tick_to(&mut ppu, &mut bus, 241, 0);

        // A background-only pixel.
        let expected_bg = compose_rgba(0x21, false, 0);
        assert_eq!(ppu.frame_buffer()[100 * FRAME_WIDTH + 100], expected_bg);

        // The sprite wins at its position (front priority).
        let expected_sprite = compose_rgba(0x16, false, 0);
        assert_eq!(ppu.frame_buffer()[50 * FRAME_WIDTH + 120], expected_sprite);

        // Both layers were opaque there: sprite 0 hit latched until the
        // next pre-render scanline. The frame ended at (241, 0); the flag
        // from the frame just rendered is still set.
        let status = ppu.read_register(0x2002, &mut bus);
        assert_eq!(status & 0x40, 0x40, "sprite 0 hit flag");
    }

    #[test]
    fn test_sprite_behind_background_priority() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();

        for row in 0..8 {
            bus.mem[0x0010 + row] = 0xFF; // Tile 1 (background)
            bus.mem[0x0028 + row] = 0xFF; // Tile 2 (sprite)
        }
        for addr in 0x2000..0x23C0 {
            bus.mem[addr] = 0x01;
        }
        for (offset, value) in [(0x00u8, 0x0F), (0x01, 0x21), (0x12, 0x16)] {
            ppu.write_register(0x2006, 0x3F, &mut bus);
            ppu.write_register(0x2006, offset, &mut bus);
            ppu.write_register(0x2007, value, &mut bus);
        }

        // Attribute bit 5: behind the background.
        ppu.write_register(0x2003, 0x00, &mut bus);
        for byte in [49u8, 0x02, 0x20, 120] {
            ppu.write_register(0x2004, byte, &mut bus);
        }
        ppu.write_register(0x2001, 0x1E, &mut bus);

        for _ in 0..2 {
            tick_to(&mut ppu, &mut bus, 241, 0);
            tick_to(&mut ppu, &mut bus, 261, 10);
        }
        tick_to(&mut ppu, &mut bus, 241, 0);

        // The opaque background shows through.
        let expected_bg = compose_rgba(0x21, false, 0);
        assert_eq!(ppu.frame_buffer()[50 * FRAME_WIDTH + 120], expected_bg);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut ppu = Ppu::new();
        let mut bus = TestPpuBus::new();
        ppu.write_register(0x2000, 0x90, &mut bus);
        ppu.write_register(0x2001, 0x1E, &mut bus);
        ppu.write_register(0x2005, 0x15, &mut bus);
        ppu.write_register(0x2003, 0x08, &mut bus);
        ppu.write_register(0x2004, 0x42, &mut bus);
        for _ in 0..1000 {
            ppu.tick_dot(&mut bus);
        }

        let mut w = StateWriter::new();
        ppu.save_state(&mut w);
        let buf = w.into_inner();

        let mut restored = Ppu::new();
        restored.load_state(&mut StateReader::new(&buf)).unwrap();

        let mut w2 = StateWriter::new();
        restored.save_state(&mut w2);
        assert_eq!(buf, w2.into_inner());
        assert_eq!(restored.scanline(), ppu.scanline());
        assert_eq!(restored.dot(), ppu.dot());
        assert_eq!(restored.oam_byte(0x08), 0x42);
    }
}
