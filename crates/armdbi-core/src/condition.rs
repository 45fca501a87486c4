//! Predicates used to pick a rule for a decoded instruction.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::inst::{DecodedInst, Opcode};
use crate::traits::InstInfoProvider;
use crate::types::{Operand, Reg};

/// A set of disjoint, sorted, half-open `[start, end)` address ranges. Used
/// to report where a condition can possibly fire, so rules can be indexed
/// by address for cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRangeSet(Vec<(u64, u64)>);

impl AddressRangeSet {
    pub fn all() -> Self {
        AddressRangeSet(vec![(0, u64::MAX)])
    }

    pub fn none() -> Self {
        AddressRangeSet(vec![])
    }

    pub fn single(start: u64, end: u64) -> Self {
        if start >= end {
            AddressRangeSet::none()
        } else {
            AddressRangeSet(vec![(start, end)])
        }
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.0.iter().any(|&(s, e)| addr >= s && addr < e)
    }

    pub fn ranges(&self) -> &[(u64, u64)] {
        &self.0
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut merged: Vec<(u64, u64)> = self.0.iter().chain(other.0.iter()).copied().collect();
        merged.sort_unstable_by_key(|&(s, _)| s);
        let mut out: Vec<(u64, u64)> = Vec::new();
        for (s, e) in merged {
            if let Some(last) = out.last_mut() {
                if s <= last.1 {
                    last.1 = last.1.max(e);
                    continue;
                }
            }
            out.push((s, e));
        }
        AddressRangeSet(out)
    }

    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        for &(s1, e1) in &self.0 {
            for &(s2, e2) in &other.0 {
                let s = s1.max(s2);
                let e = e1.min(e2);
                if s < e {
                    out.push((s, e));
                }
            }
        }
        AddressRangeSet(out)
    }
}

/// A predicate over `(decoded instruction, address, size, instruction
/// info)` used to select a rule from the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchCondition {
    MnemonicIs(&'static str),
    OpIs(Opcode),
    RegIs(Operand, Reg),
    UseReg(Reg),
    OperandIsReg(Operand),
    OperandIsImm(Operand),
    InstructionInRange(u64, u64),
    AddressIs(u64),
    DoesReadAccess,
    DoesWriteAccess,
    ReadAccessSizeIs(u32),
    WriteAccessSizeIs(u32),
    IsStackRead,
    IsStackWrite,
    And(Vec<PatchCondition>),
    Or(Vec<PatchCondition>),
    Not(Box<PatchCondition>),
    True,
}

impl PatchCondition {
    pub fn test(
        &self,
        inst: &DecodedInst,
        address: u64,
        size: u32,
        info: &dyn InstInfoProvider,
    ) -> bool {
        match self {
            PatchCondition::MnemonicIs(name) => info.mnemonic(inst.opcode) == *name,
            PatchCondition::OpIs(op) => inst.opcode == *op,
            PatchCondition::RegIs(opn, reg) => inst.operand_reg(opn.0) == Some(*reg),
            PatchCondition::UseReg(reg) => inst.uses_reg(*reg),
            PatchCondition::OperandIsReg(opn) => inst.operand_reg(opn.0).is_some(),
            PatchCondition::OperandIsImm(opn) => inst.operand_imm(opn.0).is_some(),
            PatchCondition::InstructionInRange(start, end) => address >= *start && address < *end,
            PatchCondition::AddressIs(addr) => address == *addr,
            PatchCondition::DoesReadAccess => info.reads_memory(inst.opcode),
            PatchCondition::DoesWriteAccess => info.writes_memory(inst.opcode),
            PatchCondition::ReadAccessSizeIs(n) => info.read_access_size(inst.opcode) == Some(*n),
            PatchCondition::WriteAccessSizeIs(n) => {
                info.write_access_size(inst.opcode) == Some(*n)
            }
            PatchCondition::IsStackRead => info.is_stack_read(inst),
            PatchCondition::IsStackWrite => info.is_stack_write(inst),
            PatchCondition::And(children) => {
                children.iter().all(|c| c.test(inst, address, size, info))
            }
            PatchCondition::Or(children) => {
                children.iter().any(|c| c.test(inst, address, size, info))
            }
            PatchCondition::Not(inner) => !inner.test(inst, address, size, info),
            PatchCondition::True => true,
        }
    }

    pub fn affected_range(&self) -> AddressRangeSet {
        match self {
            PatchCondition::InstructionInRange(start, end) => {
                AddressRangeSet::single(*start, *end)
            }
            PatchCondition::AddressIs(addr) => AddressRangeSet::single(*addr, *addr + 1),
            PatchCondition::And(children) => children
                .iter()
                .map(|c| c.affected_range())
                .fold(AddressRangeSet::all(), |acc, r| acc.intersect(&r)),
            PatchCondition::Or(children) => children
                .iter()
                .map(|c| c.affected_range())
                .fold(AddressRangeSet::none(), |acc, r| acc.union(&r)),
            PatchCondition::Not(_) => AddressRangeSet::all(),
            _ => AddressRangeSet::all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::DecodedInst;

    struct NullInfo;
    impl InstInfoProvider for NullInfo {
        fn mnemonic(&self, _opcode: Opcode) -> &str {
            "NOP"
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
    fn and_or_short_circuit_correctly() {
        let and_cond = PatchCondition::And(vec![
            PatchCondition::True,
            PatchCondition::Not(Box::new(PatchCondition::True)),
        ]);
        assert!(!and_cond.test(&DecodedInst::new(Opcode(0), vec![]), 0, 4, &NullInfo));

        let or_cond = PatchCondition::Or(vec![
            PatchCondition::True,
            PatchCondition::Not(Box::new(PatchCondition::True)),
        ]);
        assert!(or_cond.test(&DecodedInst::new(Opcode(0), vec![]), 0, 4, &NullInfo));
    }

    #[test]
    fn range_intersection_and_union() {
        let a = AddressRangeSet::single(0, 10);
        let b = AddressRangeSet::single(5, 15);
        assert_eq!(a.intersect(&b), AddressRangeSet::single(5, 10));
        assert_eq!(a.union(&b), AddressRangeSet::single(0, 15));
    }
}
