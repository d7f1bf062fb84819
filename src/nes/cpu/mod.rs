//! 2A03 CPU core.
//!
//! A cycle-counting interpreter for the NES's 6502 variant: no decimal
//! mode, but every documented quirk NES software can observe (the JMP
//! indirect page-wrap, branch page-cross penalties, B-flag semantics on
//! stack frames) is preserved. One [`Cpu::step`] executes exactly one
//! instruction through a [`Memory`] implementation and returns the cycles
//! it consumed; interrupts are delivered only at instruction boundaries.

mod addressing;
mod opcode;
mod status_flags;

pub use self::opcode::{decode, AddressingMode, Mnemonic, Opcode, OPCODES};
pub use self::status_flags::StatusFlags;

use crate::nes::utils::{Memory, MemoryError};
use crate::utils::word_to_bytes;
use thiserror::Error;

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Every interrupt sequence takes seven cycles.
const INTERRUPT_CYCLES: u32 = 7;

const STACK_BASE: u16 = 0x0100;
const SP_AFTER_RESET: u8 = 0xFD;

/// The CPU register file.
///
/// The effective stack address is `0x0100 | s`. P is kept as a single byte
/// behind [`StatusFlags`]; bit-exactness matters because software reads P
/// back off the stack.
#[derive(Debug, Clone, Copy)]
pub struct Registers {
    /// Accumulator
    pub a: u8,
    /// X index register
    pub x: u8,
    /// Y index register
    pub y: u8,
    /// Stack pointer
    pub s: u8,
    /// Program counter
    pub pc: u16,
    /// Status register
    pub p: StatusFlags,
}

impl Registers {
    pub fn new() -> Self {
        Registers {
            a: 0,
            x: 0,
            y: 0,
            s: SP_AFTER_RESET,
            pc: 0,
            p: StatusFlags::UNUSED | StatusFlags::INTERRUPT_DISABLE,
        }
    }

    pub fn flag(&self, flag: StatusFlags) -> bool {
        self.p.contains(flag)
    }

    pub fn set_flag(&mut self, flag: StatusFlags, on: bool) {
        self.p.set(flag, on);
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// The four interrupt kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Reset,
    Nmi,
    Irq,
    Brk,
}

impl Interrupt {
    /// IRQ and BRK honor the I flag; NMI and RESET do not.
    fn is_maskable(self) -> bool {
        matches!(self, Interrupt::Irq | Interrupt::Brk)
    }

    fn vector(self) -> u16 {
        match self {
            Interrupt::Nmi => NMI_VECTOR,
            Interrupt::Reset => RESET_VECTOR,
            Interrupt::Irq | Interrupt::Brk => IRQ_VECTOR,
        }
    }
}

/// Errors surfaced by the CPU core.
#[derive(Error, Debug)]
pub enum CpuError {
    #[error("unknown opcode {opcode:#04X} at PC {pc:#06X}")]
    UnknownOpcode { opcode: u8, pc: u16 },

    #[error("no effective address for {mode:?} addressing")]
    IllegalMode { mode: AddressingMode },

    #[error("relative branch at PC {pc:#06X} leaves the address space")]
    BranchOutOfRange { pc: u16 },

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("{mnemonic:?} ({opcode:#04X}) at PC {pc:#06X} failed: {source}")]
    Instruction {
        mnemonic: Mnemonic,
        opcode: u8,
        pc: u16,
        source: Box<CpuError>,
    },
}

/// The 2A03 CPU.
#[derive(Debug)]
pub struct Cpu {
    pub reg: Registers,
    /// Total cycles executed since reset.
    pub cycles: u64,
    nmi_pending: bool,
    irq_pending: bool,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            reg: Registers::new(),
            cycles: 0,
            nmi_pending: false,
            irq_pending: false,
        }
    }

    /// Power-on / reset: registers to their initial state, SP `0xFD`, and
    /// PC loaded from the reset vector.
    pub fn reset(&mut self, memory: &mut impl Memory) -> Result<(), CpuError> {
        self.reg = Registers::new();
        self.reg.pc = memory.read_word(RESET_VECTOR)?;
        self.cycles = 0;
        self.nmi_pending = false;
        self.irq_pending = false;
        Ok(())
    }

    /// Request an NMI; it is delivered before the next instruction.
    pub fn trigger_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Request an IRQ; it is delivered before the next instruction, or
    /// dropped if the I flag is set at that point.
    pub fn trigger_irq(&mut self) {
        self.irq_pending = true;
    }

    /// Execute one instruction and return the cycles it consumed.
    ///
    /// Pending interrupts are delivered first (NMI over IRQ); a delivered
    /// interrupt takes the place of the instruction. Unknown opcodes are
    /// fatal, and any bus error is annotated with the mnemonic, opcode, and
    /// PC at which it happened.
    pub fn step(&mut self, memory: &mut impl Memory) -> Result<u32, CpuError> {
        if self.nmi_pending {
            self.nmi_pending = false;
            let cycles = self.interrupt(memory, Interrupt::Nmi)?;
            self.cycles += u64::from(cycles);
            return Ok(cycles);
        }
        if self.irq_pending {
            // A masked IRQ is dropped, not held.
            self.irq_pending = false;
            let cycles = self.interrupt(memory, Interrupt::Irq)?;
            if cycles > 0 {
                self.cycles += u64::from(cycles);
                return Ok(cycles);
            }
        }

        let pc = self.reg.pc;
        let byte = memory.read_byte(pc)?;
        let op = decode(byte).ok_or(CpuError::UnknownOpcode { opcode: byte, pc })?;
        log::trace!("{pc:#06X}: {:?} {:?}", op.mnemonic, op.mode);

        self.reg.pc = pc.wrapping_add(1);
        let extra = self
            .execute(op, memory)
            .map_err(|source| CpuError::Instruction {
                mnemonic: op.mnemonic,
                opcode: byte,
                pc,
                source: Box::new(source),
            })?;

        let cycles = u32::from(op.cycles) + u32::from(extra);
        self.cycles += u64::from(cycles);
        Ok(cycles)
    }

    /// Deliver an interrupt at an instruction boundary.
    ///
    /// Returns the cycles consumed: 7 when delivered, 0 when a maskable
    /// kind was suppressed by the I flag. RESET pushes nothing and
    /// reinitializes SP; the other kinds push PC high-then-low and then P
    /// with bit 5 forced and B set only for BRK.
    pub fn interrupt(
        &mut self,
        memory: &mut impl Memory,
        kind: Interrupt,
    ) -> Result<u32, CpuError> {
        if kind.is_maskable() && self.reg.p.contains(StatusFlags::INTERRUPT_DISABLE) {
            log::trace!("{kind:?} suppressed while I is set");
            return Ok(0);
        }

        if kind == Interrupt::Reset {
            self.reg.s = SP_AFTER_RESET;
        } else {
            let (lo, hi) = word_to_bytes(self.reg.pc);
            self.push_byte(memory, hi)?;
            self.push_byte(memory, lo)?;
            let mut pushed = self.reg.p | StatusFlags::UNUSED;
            pushed.set(StatusFlags::BREAK, kind == Interrupt::Brk);
            self.push_byte(memory, pushed.bits())?;
        }

        self.reg.p.insert(StatusFlags::INTERRUPT_DISABLE);
        self.reg.pc = memory.read_word(kind.vector())?;
        Ok(INTERRUPT_CYCLES)
    }

    fn execute(&mut self, op: Opcode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        use Mnemonic::*;
        match op.mnemonic {
            // Arithmetic
            Adc => self.adc(op.mode, memory),
            Sbc => self.sbc(op.mode, memory),

            // Logic
            And => self.and(op.mode, memory),
            Eor => self.eor(op.mode, memory),
            Ora => self.ora(op.mode, memory),
            Bit => self.bit(op.mode, memory),

            // Compare
            Cmp => self.compare(op.mode, self.reg.a, memory),
            Cpx => self.compare(op.mode, self.reg.x, memory),
            Cpy => self.compare(op.mode, self.reg.y, memory),

            // Increment / decrement
            Inc => self.inc(op.mode, memory),
            Dec => self.dec(op.mode, memory),
            Inx => self.inx(),
            Iny => self.iny(),
            Dex => self.dex(),
            Dey => self.dey(),

            // Shifts / rotates
            Asl => self.asl(op.mode, memory),
            Lsr => self.lsr(op.mode, memory),
            Rol => self.rol(op.mode, memory),
            Ror => self.ror(op.mode, memory),

            // Loads / stores
            Lda => self.lda(op.mode, memory),
            Ldx => self.ldx(op.mode, memory),
            Ldy => self.ldy(op.mode, memory),
            Sta => self.store(op.mode, self.reg.a, memory),
            Stx => self.store(op.mode, self.reg.x, memory),
            Sty => self.store(op.mode, self.reg.y, memory),

            // Transfers
            Tax => self.tax(),
            Tay => self.tay(),
            Txa => self.txa(),
            Tya => self.tya(),
            Tsx => self.tsx(),
            Txs => self.txs(),

            // Stack
            Pha => self.pha(memory),
            Php => self.php(memory),
            Pla => self.pla(memory),
            Plp => self.plp(memory),

            // Control flow
            Jmp => self.jmp(op.mode, memory),
            Jsr => self.jsr(memory),
            Rts => self.rts(memory),
            Rti => self.rti(memory),
            Brk => self.brk(memory),

            // Branches
            Bcc => self.branch(!self.reg.flag(StatusFlags::CARRY), memory),
            Bcs => self.branch(self.reg.flag(StatusFlags::CARRY), memory),
            Bne => self.branch(!self.reg.flag(StatusFlags::ZERO), memory),
            Beq => self.branch(self.reg.flag(StatusFlags::ZERO), memory),
            Bpl => self.branch(!self.reg.flag(StatusFlags::NEGATIVE), memory),
            Bmi => self.branch(self.reg.flag(StatusFlags::NEGATIVE), memory),
            Bvc => self.branch(!self.reg.flag(StatusFlags::OVERFLOW), memory),
            Bvs => self.branch(self.reg.flag(StatusFlags::OVERFLOW), memory),

            // Flag changes
            Clc => self.set_flag_op(StatusFlags::CARRY, false),
            Sec => self.set_flag_op(StatusFlags::CARRY, true),
            Cli => self.set_flag_op(StatusFlags::INTERRUPT_DISABLE, false),
            Sei => self.set_flag_op(StatusFlags::INTERRUPT_DISABLE, true),
            Cld => self.set_flag_op(StatusFlags::DECIMAL, false),
            Sed => self.set_flag_op(StatusFlags::DECIMAL, true),
            Clv => self.set_flag_op(StatusFlags::OVERFLOW, false),

            Nop => Ok(0),
        }
    }

    // ---- flag helpers ----

    fn update_zero_negative(&mut self, value: u8) {
        self.reg.p.set(StatusFlags::ZERO, value == 0);
        self.reg.p.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
    }

    // ---- stack ----

    fn push_byte(&mut self, memory: &mut impl Memory, value: u8) -> Result<(), MemoryError> {
        memory.write_byte(STACK_BASE | u16::from(self.reg.s), value)?;
        self.reg.s = self.reg.s.wrapping_sub(1);
        Ok(())
    }

    fn pop_byte(&mut self, memory: &mut impl Memory) -> Result<u8, MemoryError> {
        self.reg.s = self.reg.s.wrapping_add(1);
        memory.read_byte(STACK_BASE | u16::from(self.reg.s))
    }

    /// Restore P from a popped byte: the stack-only bits (B and bit 5) are
    /// discarded and the in-register values kept.
    fn set_status_from_stack(&mut self, popped: u8) {
        let stack_only = StatusFlags::STACK_ONLY.bits();
        let kept = self.reg.p.bits() & stack_only;
        self.reg.p = StatusFlags::from_bits_retain((popped & !stack_only) | kept);
    }

    // ---- arithmetic ----

    /// Shared ADC core. SBC is ADC of the inverted operand; the D flag is
    /// ignored on the 2A03.
    fn add_with_carry(&mut self, value: u8) {
        let carry = u16::from(self.reg.p.contains(StatusFlags::CARRY));
        let sum = u16::from(self.reg.a) + u16::from(value) + carry;
        let result = sum as u8;

        self.reg.p.set(StatusFlags::CARRY, sum > 0xFF);
        let overflow = (self.reg.a ^ result) & (value ^ result) & 0x80 != 0;
        self.reg.p.set(StatusFlags::OVERFLOW, overflow);

        self.reg.a = result;
        self.update_zero_negative(result);
    }

    fn adc(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, extra) = self.fetch_operand(mode, memory)?;
        self.add_with_carry(value);
        Ok(extra)
    }

    fn sbc(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, extra) = self.fetch_operand(mode, memory)?;
        self.add_with_carry(!value);
        Ok(extra)
    }

    // ---- logic ----

    fn and(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, extra) = self.fetch_operand(mode, memory)?;
        self.reg.a &= value;
        self.update_zero_negative(self.reg.a);
        Ok(extra)
    }

    fn eor(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, extra) = self.fetch_operand(mode, memory)?;
        self.reg.a ^= value;
        self.update_zero_negative(self.reg.a);
        Ok(extra)
    }

    fn ora(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, extra) = self.fetch_operand(mode, memory)?;
        self.reg.a |= value;
        self.update_zero_negative(self.reg.a);
        Ok(extra)
    }

    /// BIT: Z from A & M, while N and V mirror bits 7 and 6 of the operand
    /// itself.
    fn bit(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, _) = self.fetch_operand(mode, memory)?;
        self.reg.p.set(StatusFlags::ZERO, self.reg.a & value == 0);
        self.reg.p.set(StatusFlags::OVERFLOW, value & 0x40 != 0);
        self.reg.p.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
        Ok(0)
    }

    // ---- compares ----

    fn compare(
        &mut self,
        mode: AddressingMode,
        register: u8,
        memory: &mut impl Memory,
    ) -> Result<u8, CpuError> {
        let (value, extra) = self.fetch_operand(mode, memory)?;
        let result = register.wrapping_sub(value);
        self.reg.p.set(StatusFlags::CARRY, register >= value);
        self.update_zero_negative(result);
        Ok(extra)
    }

    // ---- increments / decrements ----

    fn inc(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, target) = self.rmw_operand(mode, memory)?;
        let result = value.wrapping_add(1);
        self.rmw_write(target, result, memory)?;
        self.update_zero_negative(result);
        Ok(0)
    }

    fn dec(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, target) = self.rmw_operand(mode, memory)?;
        let result = value.wrapping_sub(1);
        self.rmw_write(target, result, memory)?;
        self.update_zero_negative(result);
        Ok(0)
    }

    fn inx(&mut self) -> Result<u8, CpuError> {
        self.reg.x = self.reg.x.wrapping_add(1);
        self.update_zero_negative(self.reg.x);
        Ok(0)
    }

    fn iny(&mut self) -> Result<u8, CpuError> {
        self.reg.y = self.reg.y.wrapping_add(1);
        self.update_zero_negative(self.reg.y);
        Ok(0)
    }

    fn dex(&mut self) -> Result<u8, CpuError> {
        self.reg.x = self.reg.x.wrapping_sub(1);
        self.update_zero_negative(self.reg.x);
        Ok(0)
    }

    fn dey(&mut self) -> Result<u8, CpuError> {
        self.reg.y = self.reg.y.wrapping_sub(1);
        self.update_zero_negative(self.reg.y);
        Ok(0)
    }

    // ---- shifts / rotates ----

    fn asl(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, target) = self.rmw_operand(mode, memory)?;
        self.reg.p.set(StatusFlags::CARRY, value & 0x80 != 0);
        let result = value << 1;
        self.rmw_write(target, result, memory)?;
        self.update_zero_negative(result);
        Ok(0)
    }

    fn lsr(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, target) = self.rmw_operand(mode, memory)?;
        self.reg.p.set(StatusFlags::CARRY, value & 0x01 != 0);
        let result = value >> 1;
        self.rmw_write(target, result, memory)?;
        // Bit 7 of the result is always clear, so N always clears here.
        self.update_zero_negative(result);
        Ok(0)
    }

    fn rol(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, target) = self.rmw_operand(mode, memory)?;
        let carry_in = u8::from(self.reg.p.contains(StatusFlags::CARRY));
        self.reg.p.set(StatusFlags::CARRY, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.rmw_write(target, result, memory)?;
        self.update_zero_negative(result);
        Ok(0)
    }

    fn ror(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, target) = self.rmw_operand(mode, memory)?;
        let carry_in = u8::from(self.reg.p.contains(StatusFlags::CARRY));
        self.reg.p.set(StatusFlags::CARRY, value & 0x01 != 0);
        let result = (value >> 1) | (carry_in << 7);
        self.rmw_write(target, result, memory)?;
        self.update_zero_negative(result);
        Ok(0)
    }

    // ---- loads / stores ----

    fn lda(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, extra) = self.fetch_operand(mode, memory)?;
        self.reg.a = value;
        self.update_zero_negative(value);
        Ok(extra)
    }

    fn ldx(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, extra) = self.fetch_operand(mode, memory)?;
        self.reg.x = value;
        self.update_zero_negative(value);
        Ok(extra)
    }

    fn ldy(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (value, extra) = self.fetch_operand(mode, memory)?;
        self.reg.y = value;
        self.update_zero_negative(value);
        Ok(extra)
    }

    /// STA/STX/STY: write the register, touch no flags. Stores pay no
    /// page-cross penalty; their base cycles already cover the fix-up.
    fn store(
        &mut self,
        mode: AddressingMode,
        value: u8,
        memory: &mut impl Memory,
    ) -> Result<u8, CpuError> {
        let (addr, _) = self.operand_address(mode, memory)?;
        memory.write_byte(addr, value)?;
        Ok(0)
    }

    // ---- transfers ----

    fn tax(&mut self) -> Result<u8, CpuError> {
        self.reg.x = self.reg.a;
        self.update_zero_negative(self.reg.x);
        Ok(0)
    }

    fn tay(&mut self) -> Result<u8, CpuError> {
        self.reg.y = self.reg.a;
        self.update_zero_negative(self.reg.y);
        Ok(0)
    }

    fn txa(&mut self) -> Result<u8, CpuError> {
        self.reg.a = self.reg.x;
        self.update_zero_negative(self.reg.a);
        Ok(0)
    }

    fn tya(&mut self) -> Result<u8, CpuError> {
        self.reg.a = self.reg.y;
        self.update_zero_negative(self.reg.a);
        Ok(0)
    }

    fn tsx(&mut self) -> Result<u8, CpuError> {
        self.reg.x = self.reg.s;
        self.update_zero_negative(self.reg.x);
        Ok(0)
    }

    /// TXS is the one transfer that leaves the flags alone.
    fn txs(&mut self) -> Result<u8, CpuError> {
        self.reg.s = self.reg.x;
        Ok(0)
    }

    // ---- stack operations ----

    fn pha(&mut self, memory: &mut impl Memory) -> Result<u8, CpuError> {
        self.push_byte(memory, self.reg.a)?;
        Ok(0)
    }

    /// PHP pushes P with B and bit 5 forced high.
    fn php(&mut self, memory: &mut impl Memory) -> Result<u8, CpuError> {
        self.push_byte(memory, (self.reg.p | StatusFlags::STACK_ONLY).bits())?;
        Ok(0)
    }

    fn pla(&mut self, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let value = self.pop_byte(memory)?;
        self.reg.a = value;
        self.update_zero_negative(value);
        Ok(0)
    }

    fn plp(&mut self, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let popped = self.pop_byte(memory)?;
        self.set_status_from_stack(popped);
        Ok(0)
    }

    // ---- control flow ----

    fn jmp(&mut self, mode: AddressingMode, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (target, _) = self.operand_address(mode, memory)?;
        self.reg.pc = target;
        Ok(0)
    }

    /// JSR pushes the address of its own last byte (high then low); RTS
    /// adds one on the way back.
    fn jsr(&mut self, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (target, _) = self.operand_address(AddressingMode::Absolute, memory)?;
        let return_addr = self.reg.pc.wrapping_sub(1);
        let (lo, hi) = word_to_bytes(return_addr);
        self.push_byte(memory, hi)?;
        self.push_byte(memory, lo)?;
        self.reg.pc = target;
        Ok(0)
    }

    fn rts(&mut self, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let lo = self.pop_byte(memory)?;
        let hi = self.pop_byte(memory)?;
        self.reg.pc = crate::utils::word_from_bytes(lo, hi).wrapping_add(1);
        Ok(0)
    }

    fn rti(&mut self, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let popped = self.pop_byte(memory)?;
        self.set_status_from_stack(popped);
        let lo = self.pop_byte(memory)?;
        let hi = self.pop_byte(memory)?;
        self.reg.pc = crate::utils::word_from_bytes(lo, hi);
        Ok(0)
    }

    /// BRK. PC already points one past the opcode (the fetch advanced it),
    /// which is exactly the return address the frame wants.
    fn brk(&mut self, memory: &mut impl Memory) -> Result<u8, CpuError> {
        self.interrupt(memory, Interrupt::Brk)?;
        Ok(0)
    }

    /// Shared branch body: +1 cycle when taken, +1 more when the target
    /// sits on a different page than the instruction's fall-through
    /// address.
    fn branch(&mut self, condition: bool, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let (target, cross) = self.operand_address(AddressingMode::Relative, memory)?;
        if condition {
            self.reg.pc = target;
            Ok(1 + cross)
        } else {
            Ok(0)
        }
    }

    // ---- flag changes ----

    fn set_flag_op(&mut self, flag: StatusFlags, on: bool) -> Result<u8, CpuError> {
        self.reg.p.set(flag, on);
        Ok(0)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
