//! Primitive, composable edits applied to a cloned decoded instruction
//! before it is wrapped in a [`crate::reloc::Relocatable::NoReloc`].

use crate::inst::{DecodedInst, InstOperand};
use crate::inst::Opcode;
use crate::temp::TempAllocator;
use crate::types::{Operand, OperandValue, Reg, Temp};

/// One edit to a decoded instruction. Transforms inside a single
/// `ModifyInstruction` generator apply left-to-right against the same
/// mutable copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstTransform {
    /// Overwrite operand `opn`.
    SetOperand(Operand, OperandValue),
    /// Insert a new operand at position `opn`, shifting later operands.
    AddOperand(Operand, OperandValue),
    /// Remove the first operand equal to `reg`.
    RemoveOperand(Reg),
    /// Replace every occurrence of `reg` with the register assigned to
    /// `temp`.
    SubstituteWithTemp(Reg, Temp),
    /// Overwrite the opcode.
    SetOpcode(Opcode),
    /// Rewrite a Thumb-1 `LDR Rd, [PC, #imm]` into a PC-free load using
    /// `temp` as the base register (paired with a `GetPCOffset` generator
    /// that fills `temp` with the PC value the load expected).
    ThumbLdrPciTransform(Temp),
}

fn resolve(value: &OperandValue, temps: &mut TempAllocator) -> InstOperand {
    match value {
        OperandValue::Temp(t) => InstOperand::Reg(temps.get(*t)),
        OperandValue::Reg(r) => InstOperand::Reg(*r),
        OperandValue::Constant(c) => InstOperand::Imm(*c),
    }
}

impl InstTransform {
    pub fn apply(&self, inst: &mut DecodedInst, temps: &mut TempAllocator) {
        match self {
            InstTransform::SetOperand(opn, value) => {
                let resolved = resolve(value, temps);
                inst.operands[opn.0] = resolved;
            }
            InstTransform::AddOperand(opn, value) => {
                let resolved = resolve(value, temps);
                inst.operands.insert(opn.0, resolved);
            }
            InstTransform::RemoveOperand(reg) => {
                if let Some(pos) = inst
                    .operands
                    .iter()
                    .position(|op| *op == InstOperand::Reg(*reg))
                {
                    inst.operands.remove(pos);
                }
            }
            InstTransform::SubstituteWithTemp(reg, temp) => {
                let replacement = temps.get(*temp);
                for operand in inst.operands.iter_mut() {
                    if *operand == InstOperand::Reg(*reg) {
                        *operand = InstOperand::Reg(replacement);
                    }
                }
            }
            InstTransform::SetOpcode(opcode) => {
                inst.opcode = *opcode;
            }
            InstTransform::ThumbLdrPciTransform(temp) => {
                let base = temps.get(*temp);
                for operand in inst.operands.iter_mut() {
                    if *operand == InstOperand::Reg(Reg::PC) {
                        *operand = InstOperand::Reg(base);
                    }
                }
            }
        }
    }
}
