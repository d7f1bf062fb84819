use bitflags::bitflags;

bitflags! {
    /// PPUCTRL ($2000)
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct ControlRegister: u8 {
        const NAMETABLE1              = 0b0000_0001;
        const NAMETABLE2              = 0b0000_0010;
        const VRAM_ADD_INCREMENT      = 0b0000_0100;
        const SPRITE_PATTERN_ADDR     = 0b0000_1000;
        const BACKGROUND_PATTERN_ADDR = 0b0001_0000;
        const SPRITE_SIZE             = 0b0010_0000;
        const PPU_MASTER_SLAVE        = 0b0100_0000;
        const GENERATE_NMI            = 0b1000_0000;
    }
}

bitflags! {
    /// PPUMASK ($2001)
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct MaskRegister: u8 {
        const GRAYSCALE             = 0b0000_0001;
        const SHOW_BG_LEFTMOST      = 0b0000_0010;
        const SHOW_SPRITES_LEFTMOST = 0b0000_0100;
        const SHOW_BACKGROUND       = 0b0000_1000;
        const SHOW_SPRITES          = 0b0001_0000;
        const EMPHASIZE_RED         = 0b0010_0000;
        const EMPHASIZE_GREEN       = 0b0100_0000;
        const EMPHASIZE_BLUE        = 0b1000_0000;
    }
}

bitflags! {
    /// PPUSTATUS ($2002)
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct StatusRegister: u8 {
        const SPRITE_OVERFLOW = 0b0010_0000;
        const SPRITE_ZERO_HIT = 0b0100_0000;
        const VBLANK_STARTED  = 0b1000_0000;
    }
}

/// The CPU-facing PPU register state.
///
/// `$2005` and `$2006` share one write toggle: the first write lands in the
/// temporary address, the second completes it. Reading `$2002` resets the
/// toggle.
#[derive(Debug)]
pub struct Registers {
    pub ctrl: ControlRegister,
    pub mask: MaskRegister,
    pub status: StatusRegister,
    /// OAM address ($2003); post-incremented by $2004 writes.
    pub oam_addr: u8,
    /// Current VRAM address driven by $2006/$2007 (14 bits used).
    pub vram_addr: u16,
    /// Temporary VRAM address being assembled by $2005/$2006 writes.
    pub temp_addr: u16,
    /// Fine X scroll (3 bits) from the first $2005 write.
    pub fine_x: u8,
    /// Shared $2005/$2006 write toggle.
    pub write_toggle: bool,
}

impl Registers {
    pub fn new() -> Self {
        Registers {
            ctrl: ControlRegister::empty(),
            mask: MaskRegister::empty(),
            status: StatusRegister::empty(),
            oam_addr: 0,
            vram_addr: 0,
            temp_addr: 0,
            fine_x: 0,
            write_toggle: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Registers::new();
    }

    /// VRAM address step per $2007 access: 1, or 32 when CTRL bit 2 is set.
    pub fn vram_addr_increment(&self) -> u16 {
        if self.ctrl.contains(ControlRegister::VRAM_ADD_INCREMENT) {
            32
        } else {
            1
        }
    }

    pub fn nmi_enabled(&self) -> bool {
        self.ctrl.contains(ControlRegister::GENERATE_NMI)
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
