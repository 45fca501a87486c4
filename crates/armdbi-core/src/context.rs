//! Byte-offset layout of the context block shared between the
//! (out-of-scope) exec-block prologue/epilogue machine code and the patch
//! generators in this crate. Compatibility is by offset only; there is no
//! serialized form.

use alloc::vec;

use crate::inst::{DecodedInst, InstOperand, Opcode};
use crate::reloc::Relocatable;
use crate::types::{Operand, Reg};

const WORD: i32 = 4;

/// Offset of a GPR's slot within `gpr_state`. `gpr_state` starts at offset
/// 0 of the context block; `Reg` numbering (R0..R12, SP, LR, PC) matches
/// slot order directly.
pub fn gpr_offset(reg: Reg) -> i32 {
    reg.num() as i32 * WORD
}

/// Offset past the last GPR slot, i.e. the size of `gpr_state`.
pub const GPR_STATE_SIZE: i32 = Reg::COUNT as i32 * WORD;

pub const CPSR_OFFSET: i32 = GPR_STATE_SIZE;

const FPR_STATE_SIZE: i32 = 32 * WORD;
const FPR_STATE_OFFSET: i32 = CPSR_OFFSET + WORD;

const HOST_STATE_OFFSET: i32 = FPR_STATE_OFFSET + FPR_STATE_SIZE;

pub const HOST_SP_OFFSET: i32 = HOST_STATE_OFFSET;
pub const HOST_FP_OFFSET: i32 = HOST_STATE_OFFSET + WORD;
pub const HOST_LR_OFFSET: i32 = HOST_STATE_OFFSET + 2 * WORD;
pub const HOST_SELECTOR_OFFSET: i32 = HOST_STATE_OFFSET + 3 * WORD;
pub const HOST_CALLBACK_OFFSET: i32 = HOST_STATE_OFFSET + 4 * WORD;
pub const HOST_DATA_OFFSET: i32 = HOST_STATE_OFFSET + 5 * WORD;
pub const HOST_ORIGIN_OFFSET: i32 = HOST_STATE_OFFSET + 6 * WORD;

/// A relocatable storing `reg`'s current value into `reg`'s own context
/// slot. Used both to save a temp's clobbered live value and, with a
/// different target register, by prologue/epilogue/terminator code.
pub fn save_reg_to_offset(reg: Reg, off: i32) -> Relocatable {
    Relocatable::DataBlockRel {
        inst: DecodedInst::new(
            Opcode::STORE_CONTEXT,
            vec![InstOperand::Reg(reg), InstOperand::Imm(0)],
        ),
        opn: Operand(1),
        off,
    }
}

pub fn load_reg_from_offset(reg: Reg, off: i32) -> Relocatable {
    Relocatable::DataBlockRel {
        inst: DecodedInst::new(
            Opcode::LOAD_CONTEXT,
            vec![InstOperand::Reg(reg), InstOperand::Imm(0)],
        ),
        opn: Operand(1),
        off,
    }
}

pub fn save_temp(reg: Reg) -> Relocatable {
    save_reg_to_offset(reg, gpr_offset(reg))
}

pub fn restore_temp(reg: Reg) -> Relocatable {
    load_reg_from_offset(reg, gpr_offset(reg))
}
