//! Per-instruction scratch register allocation.
//!
//! Scans upward from the lowest free GPR, skipping any register that is an
//! explicit operand of the instruction being patched or an implicit
//! use/def reported by the instruction-info provider. Allocator state is
//! local to one patch and never escapes it.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use crate::config::PipelineConfig;
use crate::inst::{DecodedInst, Opcode};
use crate::traits::InstInfoProvider;
use crate::types::{Reg, Temp};

pub struct TempAllocator<'a> {
    inst: &'a DecodedInst,
    opcode: Opcode,
    info: &'a dyn InstInfoProvider,
    config: PipelineConfig,
    assigned: alloc::collections::BTreeMap<Temp, Reg>,
    taken: BTreeSet<Reg>,
    next_candidate: u8,
}

impl<'a> TempAllocator<'a> {
    pub fn new(
        inst: &'a DecodedInst,
        opcode: Opcode,
        info: &'a dyn InstInfoProvider,
        config: PipelineConfig,
    ) -> Self {
        TempAllocator {
            inst,
            opcode,
            info,
            config,
            assigned: alloc::collections::BTreeMap::new(),
            taken: BTreeSet::new(),
            next_candidate: config.first_free_gpr,
        }
    }

    /// Resolve `temp` to a concrete register, allocating it on first use.
    /// Equal temp handles always resolve to the same register within one
    /// allocator instance; distinct handles never collide.
    pub fn get(&mut self, temp: Temp) -> Reg {
        if let Some(&reg) = self.assigned.get(&temp) {
            return reg;
        }
        let reg = self.allocate_one();
        self.assigned.insert(temp, reg);
        reg
    }

    fn is_free(&self, candidate: Reg) -> bool {
        if self.taken.contains(&candidate) {
            return false;
        }
        if self.inst.uses_reg(candidate) {
            return false;
        }
        if self.info.implicit_uses(self.opcode).contains(&candidate) {
            return false;
        }
        if self.info.implicit_defs(self.opcode).contains(&candidate) {
            return false;
        }
        true
    }

    fn allocate_one(&mut self) -> Reg {
        for num in self.next_candidate..self.config.gpr_count {
            let candidate = Reg(num);
            if self.is_free(candidate) {
                self.taken.insert(candidate);
                self.next_candidate = num + 1;
                return candidate;
            }
        }
        log::error!(
            "TempAllocator::get: no free register found for opcode {:?}",
            self.opcode
        );
        panic!("temp allocator exhausted the GPR pool");
    }

    /// Registers handed out so far, in no particular order. Used by the
    /// patch builder to emit save/restore sequences.
    pub fn used_registers(&self) -> Vec<Reg> {
        self.assigned.values().copied().collect()
    }

    pub fn used_register_count(&self) -> usize {
        self.assigned.len()
    }

    /// A sub-register (or register alias) of `reg` exactly `size_bytes`
    /// wide. Unlike allocation exhaustion, a missing register class is not
    /// a rule-table bug — it indicates an incomplete `InstInfoProvider` —
    /// so this degrades to a logged warning and returns `reg` unchanged
    /// rather than aborting.
    pub fn get_sized_sub_reg(&self, reg: Reg, size_bytes: u32) -> Reg {
        match self.info.sub_reg_of_size(reg, size_bytes) {
            Some(sub) => sub,
            None => {
                log::warn!(
                    "TempAllocator::get_sized_sub_reg: no {}-byte sub register found for {:?}",
                    size_bytes,
                    reg
                );
                reg
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::{DecodedInst, InstOperand, Opcode};

    struct NoImplicitInfo;
    impl InstInfoProvider for NoImplicitInfo {
        fn mnemonic(&self, _opcode: Opcode) -> &str {
            "TEST"
        }
        fn implicit_uses(&self, _opcode: Opcode) -> &[Reg] {
            &[]
        }
        fn implicit_defs(&self, _opcode: Opcode) -> &[Reg] {
            &[]
        }
        fn reads_memory(&self, _opcode: Opcode) -> bool {
            false
        }
        fn writes_memory(&self, _opcode: Opcode) -> bool {
            false
        }
        fn read_access_size(&self, _opcode: Opcode) -> Option<u32> {
            None
        }
        fn write_access_size(&self, _opcode: Opcode) -> Option<u32> {
            None
        }
        fn is_stack_read(&self, _inst: &DecodedInst) -> bool {
            false
        }
        fn is_stack_write(&self, _inst: &DecodedInst) -> bool {
            false
        }
        fn sub_reg_of_size(&self, _reg: Reg, _size_bytes: u32) -> Option<Reg> {
            None
        }
    }

    #[test]
    fn distinct_temps_get_distinct_registers() {
        let inst = DecodedInst::new(Opcode(0), alloc::vec![]);
        let info = NoImplicitInfo;
        let mut alloc = TempAllocator::new(&inst, Opcode(0), &info, PipelineConfig::default());
        let a = alloc.get(Temp(0));
        let b = alloc.get(Temp(1));
        assert_ne!(a, b);
        assert_eq!(alloc.get(Temp(0)), a);
    }

    #[test]
    fn skips_explicit_operand_registers() {
        let inst = DecodedInst::new(
            Opcode(0),
            alloc::vec![InstOperand::Reg(Reg::R0), InstOperand::Reg(Reg::R1)],
        );
        let info = NoImplicitInfo;
        let mut alloc = TempAllocator::new(&inst, Opcode(0), &info, PipelineConfig::default());
        let reg = alloc.get(Temp(0));
        assert_ne!(reg, Reg::R0);
        assert_ne!(reg, Reg::R1);
        assert_eq!(reg, Reg::R2);
    }

    #[test]
    #[should_panic(expected = "temp allocator exhausted")]
    fn exhaustion_panics() {
        let inst = DecodedInst::new(Opcode(0), alloc::vec![]);
        let info = NoImplicitInfo;
        let mut config = PipelineConfig::default();
        config.gpr_count = 2;
        config.first_free_gpr = 0;
        let mut alloc = TempAllocator::new(&inst, Opcode(0), &info, config);
        alloc.get(Temp(0));
        alloc.get(Temp(1));
        alloc.get(Temp(2));
    }
}
