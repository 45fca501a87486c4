//! A `Patch` is one guest instruction's translated replacement: a
//! save-temps prologue, the rule's generator output, and a restore-temps
//! epilogue. [`PatchRule`] pairs a condition with the generator sequence
//! that builds it.

use alloc::vec::Vec;

use crate::condition::PatchCondition;
use crate::config::PipelineConfig;
use crate::context;
use crate::generator::{GenContext, PatchGenerator};
use crate::inst::{DecodedInst, Opcode};
use crate::reloc::Relocatable;
use crate::temp::TempAllocator;
use crate::traits::InstInfoProvider;
use crate::types::{CpuMode, Reg};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub decoded_inst: DecodedInst,
    pub address: u64,
    pub inst_size: u32,
    pub cpu_mode: CpuMode,
    pub insts: Vec<Relocatable>,
    /// Total size of the assembled patch; unknown until the exec block
    /// writer assembles `insts`, so this stays `None` until then.
    pub patch_size: Option<u32>,
    pub modify_pc: bool,
    pub merge: bool,
}

impl Patch {
    fn new(decoded_inst: DecodedInst, address: u64, inst_size: u32, cpu_mode: CpuMode) -> Self {
        Patch {
            decoded_inst,
            address,
            inst_size,
            cpu_mode,
            insts: Vec::new(),
            patch_size: None,
            modify_pc: false,
            merge: false,
        }
    }

    pub fn set_modify_pc(&mut self, value: bool) {
        self.modify_pc |= value;
    }

    pub fn set_merge(&mut self, value: bool) {
        self.merge |= value;
    }

    pub fn append(&mut self, relocs: impl IntoIterator<Item = Relocatable>) {
        self.insts.extend(relocs);
    }

    pub fn prepend(&mut self, relocs: impl IntoIterator<Item = Relocatable>) {
        let mut new_insts: Vec<Relocatable> = relocs.into_iter().collect();
        new_insts.append(&mut self.insts);
        self.insts = new_insts;
    }
}

/// A condition paired with the generator sequence run when it matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRule {
    pub condition: PatchCondition,
    pub generators: Vec<PatchGenerator>,
}

impl PatchRule {
    pub fn new(condition: PatchCondition, generators: Vec<PatchGenerator>) -> Self {
        PatchRule {
            condition,
            generators,
        }
    }

    pub fn matches(
        &self,
        inst: &DecodedInst,
        address: u64,
        size: u32,
        info: &dyn InstInfoProvider,
    ) -> bool {
        self.condition.test(inst, address, size, info)
    }

    /// Run this rule's generators to build a complete patch: a fresh temp
    /// allocator, the generator output in order (with `modify_pc`/`merge`
    /// accumulated), and save/restore sequences wrapping the whole thing
    /// for every register the allocator handed out.
    ///
    /// `previous_merge`, when set, is a patch produced by an earlier
    /// `DoNotInstrument` rule whose address/size fold into this one and
    /// whose instructions are spliced into the first `ModifyInstruction`
    /// generator's output.
    pub fn generate(
        &self,
        inst: &DecodedInst,
        opcode: Opcode,
        address: u64,
        size: u32,
        cpu_mode: CpuMode,
        info: &dyn InstInfoProvider,
        config: PipelineConfig,
        previous_merge: Option<Patch>,
    ) -> Patch {
        let (patch_address, patch_inst_size, merge_insts) = match &previous_merge {
            Some(prev) => (prev.address, prev.inst_size + size, Some(prev.insts.clone())),
            None => (address, size, None),
        };
        let mut patch = Patch::new(inst.clone(), patch_address, patch_inst_size, cpu_mode);

        let mut temps = TempAllocator::new(inst, opcode, info, config);
        let mut merge_consumed = false;
        for generator in &self.generators {
            let merge_slice = if merge_consumed {
                None
            } else {
                merge_insts.as_deref()
            };
            let mut ctx = GenContext {
                inst,
                address,
                size,
                cpu_mode,
                temps: &mut temps,
                merge: merge_slice,
            };
            let produced = generator.generate(&mut ctx);
            if merge_slice.is_some() {
                merge_consumed = true;
            }
            patch.append(produced);
            patch.set_modify_pc(generator.modifies_pc());
            patch.set_merge(generator.is_do_not_instrument());
        }

        // An unconsumed merge (no ModifyInstruction ran) still needs its
        // instructions to appear; prepend them directly.
        if !merge_consumed {
            if let Some(insts) = merge_insts {
                patch.prepend(insts);
            }
        }

        let used: Vec<Reg> = temps.used_registers();
        for reg in used.iter().rev() {
            patch.prepend([context::save_temp(*reg)]);
        }
        for reg in used.iter() {
            patch.append([context::restore_temp(*reg)]);
        }

        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm_opcodes as op;
    use crate::inst::{InstOperand, Opcode};
    use crate::rules::arm_rule_table;
    use crate::types::Operand;
    use armdbi_test_support::FakeInstInfoProvider;

    fn select(inst: &DecodedInst, info: &dyn InstInfoProvider) -> PatchRule {
        arm_rule_table()
            .into_iter()
            .find(|r| r.matches(inst, 0, 4, info))
            .expect("default rule always matches")
    }

    /// The single temp rule #1 (`BX Rn`) allocates must be wrapped by a
    /// matching save at the front of the patch and a matching restore at
    /// the back, both addressing that register's own context slot.
    #[test]
    fn temp_register_is_saved_and_restored() {
        let info = FakeInstInfoProvider::new();
        let inst = DecodedInst::new(op::BX, alloc::vec![InstOperand::Reg(Reg::LR)]);
        let rule = select(&inst, &info);
        let patch = rule.generate(
            &inst,
            inst.opcode,
            0x1000,
            4,
            CpuMode::Arm,
            &info,
            PipelineConfig::default(),
            None,
        );

        let first = patch.insts.first().expect("patch is non-empty");
        let last = patch.insts.last().expect("patch is non-empty");
        match (first, last) {
            (
                Relocatable::DataBlockRel { inst: store, opn: Operand(1), off: store_off },
                Relocatable::DataBlockRel { inst: load, opn: Operand(1), off: load_off },
            ) if store.opcode == Opcode::STORE_CONTEXT && load.opcode == Opcode::LOAD_CONTEXT => {
                assert_eq!(store_off, load_off);
                assert_eq!(store.operand_reg(0), load.operand_reg(0));
                assert_eq!(*store_off, context::gpr_offset(store.operand_reg(0).unwrap()));
            }
            other => panic!("expected save/restore bookends, got {other:?}"),
        }
    }

    /// A rule whose generators write the stored PC slot sets `modify_pc`;
    /// one that never does (the default pass-through) leaves it clear.
    #[test]
    fn modify_pc_reflects_whether_a_generator_writes_stored_pc() {
        let info = FakeInstInfoProvider::new();

        let branch = DecodedInst::new(op::T_B, alloc::vec![InstOperand::Imm(8)]);
        let branch_rule = select(&branch, &info);
        let branch_patch = branch_rule.generate(
            &branch,
            branch.opcode,
            0x2000,
            2,
            CpuMode::Thumb,
            &info,
            PipelineConfig::default(),
            None,
        );
        assert!(branch_patch.modify_pc);

        let plain = DecodedInst::new(Opcode(12345), alloc::vec![InstOperand::Reg(Reg::R0)]);
        let plain_rule = select(&plain, &info);
        let plain_patch = plain_rule.generate(
            &plain,
            plain.opcode,
            0x2000,
            4,
            CpuMode::Arm,
            &info,
            PipelineConfig::default(),
            None,
        );
        assert!(!plain_patch.modify_pc);
    }
}
