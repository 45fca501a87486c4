//! Pieces of a patch body: copying the original instruction, computing
//! PC-relative values into a temp, writing a temp back into the context
//! block, and the handful of control-transfer simulation steps ARM/Thumb
//! rules need (link, ISA exchange, register-list pop-PC).

use alloc::vec;
use alloc::vec::Vec;

use crate::context;
use crate::inst::{DecodedInst, InstOperand, Opcode};
use crate::reloc::Relocatable;
use crate::temp::TempAllocator;
use crate::transform::InstTransform;
use crate::types::{CpuMode, Operand, Offset, Reg, Temp};

/// Either a literal constant or the value of an existing operand, used by
/// `GetPCOffset` so the same generator serves both `B label` (offset is an
/// immediate operand) and `BX_RET`-style rewrites (offset is a fixed -4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstOrOperand {
    Constant(i32),
    Operand(Operand),
}

/// Inputs a generator needs: the instruction being patched, its address,
/// size and CPU mode, a temp allocator bound to this patch, and — when
/// this instruction follows a `DoNotInstrument` patch — that patch's
/// relocatables to splice in.
pub struct GenContext<'a, 'b> {
    pub inst: &'a DecodedInst,
    pub address: u64,
    pub size: u32,
    pub cpu_mode: CpuMode,
    pub temps: &'a mut TempAllocator<'b>,
    pub merge: Option<&'a [Relocatable]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchGenerator {
    ModifyInstruction(Vec<InstTransform>),
    GetPCOffset(Temp, ConstOrOperand),
    GetConstant(Temp, i32),
    GetInstId(Temp),
    GetOperand(Temp, Operand),
    WriteTemp(Temp, Offset),
    SimulateLink(Temp),
    SimulateExchange(Temp),
    SimulatePopPc(Temp),
    DoNotInstrument,
}

impl PatchGenerator {
    /// Whether this generator writes the context's stored PC slot.
    pub fn modifies_pc(&self) -> bool {
        matches!(self, PatchGenerator::WriteTemp(_, Offset(reg)) if reg.is_pc())
    }

    /// Whether this generator requests the whole patch be emitted
    /// verbatim, deferring instrumentation to the next instruction.
    pub fn is_do_not_instrument(&self) -> bool {
        matches!(self, PatchGenerator::DoNotInstrument)
    }

    pub fn generate(&self, ctx: &mut GenContext) -> Vec<Relocatable> {
        match self {
            PatchGenerator::ModifyInstruction(transforms) => {
                let mut inst = ctx.inst.clone();
                for t in transforms {
                    t.apply(&mut inst, ctx.temps);
                }
                let mut out = Vec::new();
                if let Some(merge) = ctx.merge {
                    out.extend(merge.iter().cloned());
                }
                out.push(Relocatable::NoReloc(inst));
                out
            }
            PatchGenerator::GetPCOffset(temp, value) => {
                let reg = ctx.temps.get(*temp);
                let k = match value {
                    ConstOrOperand::Constant(c) => *c,
                    ConstOrOperand::Operand(opn) => ctx.inst.operand_imm(opn.0).unwrap_or(0),
                };
                let base = load_immediate_template(reg);
                vec![Relocatable::HostPCRel {
                    inst: base,
                    opn: Operand(1),
                    off: k,
                }]
            }
            PatchGenerator::GetConstant(temp, value) => {
                let reg = ctx.temps.get(*temp);
                let base = load_immediate_template(reg);
                vec![Relocatable::MemoryConstant {
                    inst: base,
                    opn: Operand(1),
                    value: *value,
                }]
            }
            PatchGenerator::GetInstId(temp) => {
                let reg = ctx.temps.get(*temp);
                let base = load_immediate_template(reg);
                vec![Relocatable::InstId {
                    inst: base,
                    opn: Operand(1),
                }]
            }
            PatchGenerator::GetOperand(temp, opn) => {
                let reg = ctx.temps.get(*temp);
                match ctx.inst.operands.get(opn.0) {
                    Some(InstOperand::Reg(src)) => {
                        vec![Relocatable::NoReloc(DecodedInst::new(
                            Opcode::MOV_REG,
                            vec![InstOperand::Reg(reg), InstOperand::Reg(*src)],
                        ))]
                    }
                    Some(InstOperand::Imm(c)) => {
                        let base = load_immediate_template(reg);
                        vec![Relocatable::MemoryConstant {
                            inst: base,
                            opn: Operand(1),
                            value: *c,
                        }]
                    }
                    _ => Vec::new(),
                }
            }
            PatchGenerator::WriteTemp(temp, Offset(target_reg)) => {
                let reg = ctx.temps.get(*temp);
                let base = store_context_template(reg);
                vec![Relocatable::DataBlockRel {
                    inst: base,
                    opn: Operand(1),
                    off: context::gpr_offset(*target_reg),
                }]
            }
            PatchGenerator::SimulateLink(temp) => {
                let reg = ctx.temps.get(*temp);
                let link_value =
                    (ctx.address + ctx.size as u64) as i32 | ctx.cpu_mode.thumb_bit() as i32;
                let load = load_immediate_template(reg);
                let store = store_context_template(reg);
                vec![
                    Relocatable::MemoryConstant {
                        inst: load,
                        opn: Operand(1),
                        value: link_value,
                    },
                    Relocatable::DataBlockRel {
                        inst: store,
                        opn: Operand(1),
                        off: context::gpr_offset(Reg::LR),
                    },
                ]
            }
            PatchGenerator::SimulateExchange(temp) => {
                let reg = ctx.temps.get(*temp);
                vec![Relocatable::NoReloc(DecodedInst::new(
                    Opcode::SIMULATE_EXCHANGE,
                    vec![InstOperand::Reg(reg)],
                ))]
            }
            PatchGenerator::SimulatePopPc(temp) => {
                let reg = ctx.temps.get(*temp);
                vec![Relocatable::NoReloc(DecodedInst::new(
                    Opcode::POP_CONTEXT_SP,
                    vec![InstOperand::Reg(reg)],
                ))]
            }
            PatchGenerator::DoNotInstrument => Vec::new(),
        }
    }
}

fn load_immediate_template(dest: Reg) -> DecodedInst {
    DecodedInst::new(
        Opcode::LOAD_IMMEDIATE,
        vec![InstOperand::Reg(dest), InstOperand::Imm(0)],
    )
}

fn store_context_template(src: Reg) -> DecodedInst {
    DecodedInst::new(
        Opcode::STORE_CONTEXT,
        vec![InstOperand::Reg(src), InstOperand::Imm(0)],
    )
}
