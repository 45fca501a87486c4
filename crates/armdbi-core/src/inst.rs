//! Decoded instruction representation consumed and produced by the patch
//! pipeline.

use alloc::vec::Vec;

use crate::types::{Constant, Reg};

/// Concrete content of one operand slot in a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstOperand {
    Reg(Reg),
    Imm(Constant),
    /// Predicate code for conditionally-executed ARM instructions (`AL` for
    /// unconditional). Kept distinct from `Imm` so conditions can be
    /// inspected without guessing which immediate operand is the predicate.
    Cond(Condition),
}

/// ARM condition codes, used by `Bcc`/`MOVcc`/predicated instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Cs,
    Cc,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
    Al,
}

impl Condition {
    pub fn is_always(self) -> bool {
        matches!(self, Condition::Al)
    }
}

/// An opcode identifier as reported by the (external) disassembler. Opaque
/// beyond equality: the rule table matches on it but never interprets its
/// numeric value directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Opcode(pub u32);

impl Opcode {
    /// Pseudo-opcodes synthesized by patch generators. The real encoding
    /// of each is the external assembler's concern; these exist purely as
    /// a vocabulary between generators, relocatables, and the test
    /// interpreter. Reserved from a high range so they cannot collide with
    /// opcode ids reported by a real `InstInfoProvider`.
    const PSEUDO_BASE: u32 = 0xF000_0000;

    /// `dest <- [pc-relative operand]`; the relocatable controlling
    /// operand 1 fixes up the displacement.
    pub const LOAD_IMMEDIATE: Opcode = Opcode(Self::PSEUDO_BASE + 1);
    /// `dest <- src`.
    pub const MOV_REG: Opcode = Opcode(Self::PSEUDO_BASE + 2);
    /// `[context + pc-relative operand] <- src`.
    pub const STORE_CONTEXT: Opcode = Opcode(Self::PSEUDO_BASE + 3);
    /// `dest <- [context + pc-relative operand]`.
    pub const LOAD_CONTEXT: Opcode = Opcode(Self::PSEUDO_BASE + 4);
    /// Inspects bit 0 of operand 0, updates the stored ISA-mode tag, and
    /// rewrites the context's stored PC slot with that bit cleared. Always
    /// runs after the `WriteTemp(_, Offset(REG_PC))` that put the
    /// still-tagged value there, so it is this step, not `WriteTemp`, that
    /// leaves the stored PC exchange-clean.
    pub const SIMULATE_EXCHANGE: Opcode = Opcode(Self::PSEUDO_BASE + 5);
    /// `dest <- [context.sp]; context.sp += 4`.
    pub const POP_CONTEXT_SP: Opcode = Opcode(Self::PSEUDO_BASE + 6);
    /// Unconditional branch to the exec block's epilogue.
    pub const BRANCH_EPILOGUE: Opcode = Opcode(Self::PSEUDO_BASE + 7);
    /// Pushes operand 0 onto the host stack (prologue entry).
    pub const PUSH_HOST_REG: Opcode = Opcode(Self::PSEUDO_BASE + 8);
    /// Pops the host stack into operand 0 and jumps to it (epilogue exit).
    pub const POP_HOST_REG_AND_JUMP: Opcode = Opcode(Self::PSEUDO_BASE + 9);
    /// Sets the stack pointer to the exec block's data block base.
    pub const SET_SP_TO_DATA_BLOCK: Opcode = Opcode(Self::PSEUDO_BASE + 10);
    /// Bulk-restores the guest FPR bank from the context block.
    pub const RESTORE_FPR_BANK: Opcode = Opcode(Self::PSEUDO_BASE + 11);
    /// Bulk-saves the guest FPR bank into the context block.
    pub const SAVE_FPR_BANK: Opcode = Opcode(Self::PSEUDO_BASE + 12);
    /// `dest <- CPSR`.
    pub const READ_CPSR: Opcode = Opcode(Self::PSEUDO_BASE + 13);
    /// `CPSR <- src`.
    pub const WRITE_CPSR: Opcode = Opcode(Self::PSEUDO_BASE + 14);
}

/// A guest instruction as decoded by the external assembler/disassembler
/// layer. Transforms mutate a cloned copy; the original decode held
/// elsewhere is never touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInst {
    pub opcode: Opcode,
    pub operands: Vec<InstOperand>,
}

impl DecodedInst {
    pub fn new(opcode: Opcode, operands: Vec<InstOperand>) -> Self {
        DecodedInst { opcode, operands }
    }

    pub fn operand_reg(&self, index: usize) -> Option<Reg> {
        match self.operands.get(index) {
            Some(InstOperand::Reg(r)) => Some(*r),
            _ => None,
        }
    }

    pub fn operand_imm(&self, index: usize) -> Option<Constant> {
        match self.operands.get(index) {
            Some(InstOperand::Imm(c)) => Some(*c),
            _ => None,
        }
    }

    /// Every register named by an explicit operand, in operand order,
    /// duplicates included. Used by the temp allocator to avoid clobbering
    /// operands the instruction itself reads or writes.
    pub fn explicit_registers(&self) -> impl Iterator<Item = Reg> + '_ {
        self.operands.iter().filter_map(|op| match op {
            InstOperand::Reg(r) => Some(*r),
            _ => None,
        })
    }

    pub fn uses_reg(&self, reg: Reg) -> bool {
        self.explicit_registers().any(|r| r == reg)
    }

    pub fn uses_pc(&self) -> bool {
        self.uses_reg(Reg::PC)
    }
}
