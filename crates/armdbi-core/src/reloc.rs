//! Relocatable instruction carriers: patch content whose operands are only
//! resolved once the exec block knows where the patch will live.

use crate::inst::{DecodedInst, InstOperand};
use crate::traits::ExecBlock;
use crate::types::{CpuMode, Operand, Reg};

/// A machine instruction (or instruction template) that cannot be finalized
/// until it is placed inside an exec block.
///
/// `reloc` is pure with respect to everything except the exec block: calling
/// it twice against identical exec-block state yields identical output
/// (invariant 4 of the testable properties).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocatable {
    /// Opaque copy: emitted verbatim, no rewriting at all.
    NoReloc(DecodedInst),
    /// Operand `opn` addresses a field `off` bytes into the context/data
    /// block.
    DataBlockRel {
        inst: DecodedInst,
        opn: Operand,
        off: i32,
    },
    /// Operand `opn` addresses a freshly allocated shadow word holding
    /// `value`.
    MemoryConstant {
        inst: DecodedInst,
        opn: Operand,
        value: i32,
    },
    /// Operand `opn` addresses a location `off` bytes into the exec
    /// block's epilogue.
    EpilogueRel {
        inst: DecodedInst,
        opn: Operand,
        off: i32,
    },
    /// Operand `opn` addresses a shadow word holding `current_pc + off`.
    HostPCRel {
        inst: DecodedInst,
        opn: Operand,
        off: i32,
    },
    /// Operand `opn` addresses a shadow word holding the engine's current
    /// instruction id.
    InstId { inst: DecodedInst, opn: Operand },
    /// Thumb only: add `current_pc mod 4` to the immediate at `opn`, to
    /// correct for Thumb PC read-alignment. No-op in ARM mode.
    AdjustPCAlign { inst: DecodedInst, opn: Operand },
}

/// ARM PC-relative addressing resolves to the current instruction + 8
/// (two instructions ahead, owing to the classic ARM pipeline fetch/decode
/// quirk); Thumb resolves to the current instruction + 4, rounded down to a
/// 4-byte boundary.
const ARM_PC_BIAS: i32 = 8;
const THUMB_PC_BIAS: i32 = 4;

fn arm_pc_relative_imm(base_offset: i32) -> i32 {
    base_offset - ARM_PC_BIAS
}

/// Rewrites `inst` so operand `opn` addresses a location `base_offset`
/// bytes from the current instruction, honoring ARM vs. Thumb PC-relative
/// addressing rules. In Thumb, if the instruction still names `REG_PC`
/// explicitly, that operand is swapped for the exec block's scratch
/// register (assumed to already hold the PC base) and the immediate
/// becomes the unbiased `off`; otherwise the immediate is corrected for
/// Thumb's 4-byte PC-read alignment.
fn pc_relative_fixup(
    inst: &mut DecodedInst,
    opn: Operand,
    off: i32,
    base_offset: i32,
    cpu_mode: CpuMode,
    exec_block: &dyn ExecBlock,
) {
    match cpu_mode {
        CpuMode::Arm => {
            inst.operands[opn.0] = InstOperand::Imm(arm_pc_relative_imm(base_offset + off));
        }
        CpuMode::Thumb => {
            if inst.uses_pc() {
                let scratch = exec_block.scratch_register();
                for operand in inst.operands.iter_mut() {
                    if *operand == InstOperand::Reg(Reg::PC) {
                        *operand = InstOperand::Reg(scratch);
                    }
                }
                inst.operands[opn.0] = InstOperand::Imm(off);
            } else {
                let pc_mod_4 = (exec_block.current_pc() % 4) as i32;
                inst.operands[opn.0] =
                    InstOperand::Imm(base_offset + off + pc_mod_4 - THUMB_PC_BIAS);
            }
        }
    }
}

impl Relocatable {
    /// Resolve this relocatable against `exec_block`, returning a decoded
    /// instruction ready for assembly into the exec block's code region.
    pub fn reloc(&self, exec_block: &mut dyn ExecBlock, cpu_mode: CpuMode) -> DecodedInst {
        match self {
            Relocatable::NoReloc(inst) => inst.clone(),
            Relocatable::DataBlockRel { inst, opn, off } => {
                let mut inst = inst.clone();
                let base = exec_block.data_block_offset();
                pc_relative_fixup(&mut inst, *opn, *off, base, cpu_mode, exec_block);
                inst
            }
            Relocatable::MemoryConstant { inst, opn, value } => {
                let mut inst = inst.clone();
                let shadow = exec_block.new_shadow();
                exec_block.set_shadow(shadow, *value);
                let base = exec_block.shadow_offset(shadow);
                pc_relative_fixup(&mut inst, *opn, 0, base, cpu_mode, exec_block);
                inst
            }
            Relocatable::EpilogueRel { inst, opn, off } => {
                let mut inst = inst.clone();
                let base = exec_block.epilogue_offset();
                pc_relative_fixup(&mut inst, *opn, *off, base, cpu_mode, exec_block);
                inst
            }
            Relocatable::HostPCRel { inst, opn, off } => {
                let mut inst = inst.clone();
                let value = exec_block.current_pc() as i32 + off;
                let shadow = exec_block.new_shadow();
                exec_block.set_shadow(shadow, value);
                let base = exec_block.shadow_offset(shadow);
                pc_relative_fixup(&mut inst, *opn, 0, base, cpu_mode, exec_block);
                inst
            }
            Relocatable::InstId { inst, opn } => {
                let mut inst = inst.clone();
                let id = exec_block.next_inst_id();
                let shadow = exec_block.new_shadow();
                exec_block.set_shadow(shadow, id as i32);
                let base = exec_block.shadow_offset(shadow);
                pc_relative_fixup(&mut inst, *opn, 0, base, cpu_mode, exec_block);
                inst
            }
            Relocatable::AdjustPCAlign { inst, opn } => {
                let mut inst = inst.clone();
                if cpu_mode == CpuMode::Thumb {
                    if let Some(InstOperand::Imm(imm)) = inst.operands.get_mut(opn.0) {
                        *imm += (exec_block.current_pc() % 4) as i32;
                    }
                }
                inst
            }
        }
    }

}
