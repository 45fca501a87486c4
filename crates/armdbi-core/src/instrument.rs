//! Wraps a matching patch with user callback machinery: writes the
//! callback/data/origin host-state slots, keeps the stored PC coherent for
//! a host observer, and optionally breaks execution out to the host.

use alloc::vec;
use alloc::vec::Vec;

use crate::condition::PatchCondition;
use crate::config::PipelineConfig;
use crate::context;
use crate::generator::{GenContext, PatchGenerator};
use crate::inst::{DecodedInst, InstOperand, Opcode};
use crate::patch::Patch;
use crate::reloc::Relocatable;
use crate::temp::TempAllocator;
use crate::traits::InstInfoProvider;
use crate::types::{Operand, Reg, Temp};

/// Where, relative to the original instruction, an instrumentation fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstPosition {
    Pre,
    Post,
}

/// A user callback registration: fires when `condition` matches, running
/// `generators` before (`Pre`) or after (`Post`) the patched instruction.
/// `break_to_host` additionally suspends guest execution so the host can
/// observe/mutate state synchronously.
pub struct InstrumentationRule {
    pub condition: PatchCondition,
    pub generators: Vec<PatchGenerator>,
    pub position: InstPosition,
    pub break_to_host: bool,
}

impl InstrumentationRule {
    pub fn can_be_applied(
        &self,
        inst: &DecodedInst,
        address: u64,
        size: u32,
        info: &dyn InstInfoProvider,
    ) -> bool {
        self.condition.test(inst, address, size, info)
    }

    pub fn affected_range(&self) -> crate::condition::AddressRangeSet {
        self.condition.affected_range()
    }

    /// Apply this rule to `patch`, prepending or appending the
    /// instrumentation body depending on `position`.
    pub fn instrument(
        &self,
        patch: &mut Patch,
        opcode: Opcode,
        info: &dyn InstInfoProvider,
        config: PipelineConfig,
    ) {
        let mut temps = TempAllocator::new(&patch.decoded_inst, opcode, info, config);
        let mut instru: Vec<Relocatable> = Vec::new();

        for generator in &self.generators {
            let mut ctx = GenContext {
                inst: &patch.decoded_inst,
                address: patch.address,
                size: patch.inst_size,
                cpu_mode: patch.cpu_mode,
                temps: &mut temps,
                merge: None,
            };
            instru.extend(generator.generate(&mut ctx));
        }

        // Keep the stored PC coherent for the host: required in PRE
        // position unconditionally (the wrapped patch hasn't run yet, so
        // whatever it plans to do to PC is irrelevant to this callback),
        // and in POST position only if the wrapped patch didn't already
        // set it.
        if self.break_to_host
            && (self.position == InstPosition::Pre || !patch.modify_pc)
        {
            let pc_value = match self.position {
                InstPosition::Pre => patch.address,
                InstPosition::Post => patch.address + patch.inst_size as u64,
            } as i32;
            {
                let mut ctx = GenContext {
                    inst: &patch.decoded_inst,
                    address: patch.address,
                    size: patch.inst_size,
                    cpu_mode: patch.cpu_mode,
                    temps: &mut temps,
                    merge: None,
                };
                instru.extend(PatchGenerator::GetConstant(Temp::new(0), pc_value).generate(&mut ctx));
            }
            let reg0 = temps.get(Temp::new(0));
            instru.push(save_reg_to_pc_slot(reg0));
        }

        // The break-to-host sequence needs at least one scratch register
        // even if the instrumentation generators allocated none.
        if self.break_to_host && temps.used_register_count() == 0 {
            temps.get(Temp::new(0));
        }

        let used: Vec<Reg> = temps.used_registers();
        let mut body: Vec<Relocatable> = Vec::new();
        for reg in &used {
            body.push(context::save_temp(*reg));
        }
        body.extend(instru);

        if self.break_to_host {
            for reg in used.iter().skip(1) {
                body.push(context::restore_temp(*reg));
            }
            if let Some(&scratch) = used.first() {
                body.extend(break_to_host(scratch));
            }
        } else {
            for reg in &used {
                body.push(context::restore_temp(*reg));
            }
        }

        match self.position {
            InstPosition::Pre => patch.prepend(body),
            InstPosition::Post => patch.append(body),
        }
    }
}

fn save_reg_to_pc_slot(reg: Reg) -> Relocatable {
    context::save_reg_to_offset(reg, context::gpr_offset(Reg::PC))
}

/// Byte length this break-to-host sequence occupies once assembled: the
/// resume point execution needs to find on re-entry is the address right
/// after this fixed sequence.
const BREAK_TO_HOST_LENGTH: i32 = 16;

fn break_to_host(scratch: Reg) -> Vec<Relocatable> {
    let load_resume = DecodedInst::new(
        Opcode::LOAD_IMMEDIATE,
        vec![InstOperand::Reg(scratch), InstOperand::Imm(0)],
    );
    let resume = Relocatable::HostPCRel {
        inst: load_resume,
        opn: Operand(1),
        off: BREAK_TO_HOST_LENGTH,
    };
    let store = Relocatable::DataBlockRel {
        inst: DecodedInst::new(
            Opcode::STORE_CONTEXT,
            vec![InstOperand::Reg(scratch), InstOperand::Imm(0)],
        ),
        opn: Operand(1),
        off: context::HOST_SELECTOR_OFFSET,
    };
    let restore = context::restore_temp(scratch);
    let branch = Relocatable::EpilogueRel {
        inst: DecodedInst::new(Opcode::BRANCH_EPILOGUE, vec![InstOperand::Imm(0)]),
        opn: Operand(0),
        off: 0,
    };
    vec![resume, store, restore, branch]
}
