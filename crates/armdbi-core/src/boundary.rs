//! Fixed relocatable sequences that run on every entry into and exit from
//! an exec block, plus the early basic-block terminator.

use alloc::vec;
use alloc::vec::Vec;

use crate::context;
use crate::inst::{DecodedInst, InstOperand, Opcode};
use crate::reloc::Relocatable;
use crate::types::{CpuMode, Operand, Reg};

/// Host frame-pointer register saved/restored alongside the host stack
/// pointer. ARM's AAPCS reserves R11 for this role.
const HOST_FP_REG: Reg = Reg::R11;

fn no_reloc(opcode: Opcode, operands: Vec<InstOperand>) -> Relocatable {
    Relocatable::NoReloc(DecodedInst::new(opcode, operands))
}

/// The sequence run on every entry into an exec block: saves the host
/// return address and frame, switches SP into the data block, and loads
/// the full guest register bank before jumping to the guest instruction
/// named by `host_state.selector`.
pub fn exec_block_prologue() -> Vec<Relocatable> {
    let mut prologue = Vec::new();

    prologue.push(no_reloc(Opcode::PUSH_HOST_REG, vec![InstOperand::Reg(Reg::LR)]));
    prologue.push(context::save_reg_to_offset(Reg::SP, context::HOST_SP_OFFSET));
    prologue.push(no_reloc(Opcode::SET_SP_TO_DATA_BLOCK, vec![]));
    prologue.push(context::save_reg_to_offset(HOST_FP_REG, context::HOST_FP_OFFSET));
    prologue.push(no_reloc(Opcode::RESTORE_FPR_BANK, vec![]));

    // Restore CPSR through R0 (a dedicated temp is unnecessary here: R0 is
    // about to be overwritten by the GPR restore loop below anyway).
    prologue.push(context::load_reg_from_offset(Reg::R0, context::CPSR_OFFSET));
    prologue.push(no_reloc(Opcode::WRITE_CPSR, vec![InstOperand::Reg(Reg::R0)]));

    for num in Reg::R0.num()..=Reg::LR.num() {
        let reg = Reg(num);
        prologue.push(context::load_reg_from_offset(reg, context::gpr_offset(reg)));
    }

    prologue.push(context::load_reg_from_offset(Reg::PC, context::HOST_SELECTOR_OFFSET));

    prologue
}

/// The sequence run on every exit from an exec block back to the host:
/// saves the guest register bank, restores the host frame, and returns.
pub fn exec_block_epilogue() -> Vec<Relocatable> {
    let mut epilogue = Vec::new();

    for num in Reg::R0.num()..=Reg::LR.num() {
        let reg = Reg(num);
        if reg == Reg::SP {
            continue;
        }
        epilogue.push(context::save_reg_to_offset(reg, context::gpr_offset(reg)));
    }

    epilogue.push(no_reloc(Opcode::SET_SP_TO_DATA_BLOCK, vec![]));
    epilogue.push(no_reloc(Opcode::SAVE_FPR_BANK, vec![]));

    epilogue.push(no_reloc(Opcode::READ_CPSR, vec![InstOperand::Reg(Reg::R0)]));
    epilogue.push(context::save_reg_to_offset(Reg::R0, context::CPSR_OFFSET));

    epilogue.push(context::load_reg_from_offset(HOST_FP_REG, context::HOST_FP_OFFSET));
    epilogue.push(context::load_reg_from_offset(Reg::SP, context::HOST_SP_OFFSET));
    epilogue.push(no_reloc(Opcode::POP_HOST_REG_AND_JUMP, vec![InstOperand::Reg(Reg::PC)]));

    epilogue
}

/// Short-circuits a basic block before its natural end by overwriting the
/// stored PC with `address`, using `Reg::R2` as scratch (saved and
/// restored around the write so the guest's live R2 value survives).
pub fn terminator(address: u64, _cpu_mode: CpuMode) -> Vec<Relocatable> {
    let scratch = Reg::R2;
    vec![
        context::save_temp(scratch),
        Relocatable::MemoryConstant {
            inst: DecodedInst::new(
                Opcode::LOAD_IMMEDIATE,
                vec![InstOperand::Reg(scratch), InstOperand::Imm(0)],
            ),
            opn: Operand(1),
            value: address as i32,
        },
        context::save_reg_to_offset(scratch, context::gpr_offset(Reg::PC)),
        context::restore_temp(scratch),
    ]
}
