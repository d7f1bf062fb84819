use bitflags::bitflags;

bitflags! {
    /// The P status register, bit 7 down to bit 0: `N V - B D I Z C`.
    ///
    /// Bit 5 has no storage in hardware; it reads back as 1 whenever P is
    /// pushed. Bit 4 (B) only exists in the pushed byte, set for BRK/PHP
    /// and clear for NMI/IRQ frames. D is latched by SED/CLD but the 2A03
    /// has no decimal mode, so arithmetic ignores it.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY             = 0b0000_0001;
        const ZERO              = 0b0000_0010;
        const INTERRUPT_DISABLE = 0b0000_0100;
        const DECIMAL           = 0b0000_1000;
        const BREAK             = 0b0001_0000;
        const UNUSED            = 0b0010_0000;
        const OVERFLOW          = 0b0100_0000;
        const NEGATIVE          = 0b1000_0000;
    }
}

impl StatusFlags {
    /// The stack-only bits (B and the phantom bit 5). PLP and RTI discard
    /// these from the popped byte and keep the in-register values.
    pub const STACK_ONLY: StatusFlags = StatusFlags::BREAK.union(StatusFlags::UNUSED);
}
