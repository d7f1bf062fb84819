//! Operand resolution for the thirteen addressing modes.
//!
//! On entry PC points one past the opcode byte; these helpers consume the
//! operand bytes and leave PC at the next instruction. Extra-cycle counts
//! cover page-cross penalties only; the branch handler adds the taken
//! penalty itself.

use super::opcode::AddressingMode;
use super::{Cpu, CpuError};
use crate::nes::utils::Memory;
use crate::utils::{sign_extend, word_from_bytes};

/// Where a read-modify-write instruction puts its result.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RmwTarget {
    Accumulator,
    Memory(u16),
}

pub(crate) fn page_crossed(a: u16, b: u16) -> bool {
    a & 0xFF00 != b & 0xFF00
}

impl Cpu {
    fn fetch_byte(&mut self, memory: &mut impl Memory) -> Result<u8, CpuError> {
        let value = memory.read_byte(self.reg.pc)?;
        self.reg.pc = self.reg.pc.wrapping_add(1);
        Ok(value)
    }

    fn fetch_word(&mut self, memory: &mut impl Memory) -> Result<u16, CpuError> {
        let lo = self.fetch_byte(memory)?;
        let hi = self.fetch_byte(memory)?;
        Ok(word_from_bytes(lo, hi))
    }

    /// Resolve the effective address for `mode`, returning it together with
    /// the page-cross cycle penalty (0 or 1).
    pub(crate) fn operand_address(
        &mut self,
        mode: AddressingMode,
        memory: &mut impl Memory,
    ) -> Result<(u16, u8), CpuError> {
        match mode {
            AddressingMode::Implied | AddressingMode::Accumulator => {
                Err(CpuError::IllegalMode { mode })
            }
            AddressingMode::Immediate => {
                let addr = self.reg.pc;
                self.reg.pc = self.reg.pc.wrapping_add(1);
                Ok((addr, 0))
            }
            AddressingMode::ZeroPage => {
                let addr = u16::from(self.fetch_byte(memory)?);
                Ok((addr, 0))
            }
            AddressingMode::ZeroPageX => {
                let base = self.fetch_byte(memory)?;
                Ok((u16::from(base.wrapping_add(self.reg.x)), 0))
            }
            AddressingMode::ZeroPageY => {
                let base = self.fetch_byte(memory)?;
                Ok((u16::from(base.wrapping_add(self.reg.y)), 0))
            }
            AddressingMode::Absolute => {
                let addr = self.fetch_word(memory)?;
                Ok((addr, 0))
            }
            AddressingMode::AbsoluteX => {
                let base = self.fetch_word(memory)?;
                let addr = base.wrapping_add(u16::from(self.reg.x));
                Ok((addr, u8::from(page_crossed(base, addr))))
            }
            AddressingMode::AbsoluteY => {
                let base = self.fetch_word(memory)?;
                let addr = base.wrapping_add(u16::from(self.reg.y));
                Ok((addr, u8::from(page_crossed(base, addr))))
            }
            AddressingMode::Indirect => {
                let ptr = self.fetch_word(memory)?;
                // 6502 quirk: the pointer's high byte is fetched without
                // carrying into the page, so a pointer at $xxFF wraps to
                // $xx00.
                let lo = memory.read_byte(ptr)?;
                let hi_ptr = (ptr & 0xFF00) | u16::from((ptr as u8).wrapping_add(1));
                let hi = memory.read_byte(hi_ptr)?;
                Ok((word_from_bytes(lo, hi), 0))
            }
            AddressingMode::IndirectX => {
                let base = self.fetch_byte(memory)?;
                let ptr = base.wrapping_add(self.reg.x);
                let lo = memory.read_byte(u16::from(ptr))?;
                let hi = memory.read_byte(u16::from(ptr.wrapping_add(1)))?;
                Ok((word_from_bytes(lo, hi), 0))
            }
            AddressingMode::IndirectY => {
                let base = self.fetch_byte(memory)?;
                let lo = memory.read_byte(u16::from(base))?;
                let hi = memory.read_byte(u16::from(base.wrapping_add(1)))?;
                let ptr = word_from_bytes(lo, hi);
                let addr = ptr.wrapping_add(u16::from(self.reg.y));
                Ok((addr, u8::from(page_crossed(ptr, addr))))
            }
            AddressingMode::Relative => {
                let offset = self.fetch_byte(memory)?;
                let base = self.reg.pc;
                let target = i32::from(base) + i32::from(offset as i8);
                if !(0..=0xFFFF).contains(&target) {
                    return Err(CpuError::BranchOutOfRange { pc: base });
                }
                let target = base.wrapping_add(sign_extend(offset));
                Ok((target, u8::from(page_crossed(base, target))))
            }
        }
    }

    /// Fetch the 8-bit operand value for `mode`, plus the page-cross
    /// penalty.
    pub(crate) fn fetch_operand(
        &mut self,
        mode: AddressingMode,
        memory: &mut impl Memory,
    ) -> Result<(u8, u8), CpuError> {
        if mode == AddressingMode::Accumulator {
            return Ok((self.reg.a, 0));
        }
        let (addr, extra) = self.operand_address(mode, memory)?;
        Ok((memory.read_byte(addr)?, extra))
    }

    /// Fetch the operand of a read-modify-write instruction together with
    /// its write-back target. Page-cross penalties do not apply to RMW
    /// instructions; their base cycle counts already include the fix-up.
    pub(crate) fn rmw_operand(
        &mut self,
        mode: AddressingMode,
        memory: &mut impl Memory,
    ) -> Result<(u8, RmwTarget), CpuError> {
        if mode == AddressingMode::Accumulator {
            return Ok((self.reg.a, RmwTarget::Accumulator));
        }
        let (addr, _) = self.operand_address(mode, memory)?;
        Ok((memory.read_byte(addr)?, RmwTarget::Memory(addr)))
    }

    pub(crate) fn rmw_write(
        &mut self,
        target: RmwTarget,
        value: u8,
        memory: &mut impl Memory,
    ) -> Result<(), CpuError> {
        match target {
            RmwTarget::Accumulator => self.reg.a = value,
            RmwTarget::Memory(addr) => memory.write_byte(addr, value)?,
        }
        Ok(())
    }
}
