//! A minimal ARM/Thumb interpreter for exercising patch output end to end.
//!
//! Deliberate scope cut: this interpreter executes directly against the
//! unresolved [`Relocatable`] values a patch carries (reading their `off`/
//! `value` fields as plain addresses and constants) rather than against the
//! byte-exact, PC-bias-corrected immediate `reloc()` produces. The ARM vs.
//! Thumb PC-relative arithmetic itself is exercised precisely by `reloc.rs`'s
//! own unit tests; this interpreter exists to validate rule selection,
//! generator wiring, and register/context bookkeeping — the semantic
//! pipeline — without also having to model byte-accurate instruction
//! encoding and a real assembler.

use std::collections::BTreeMap;

use armdbi_core::{Condition, CpuMode, DecodedInst, InstOperand, Opcode, Reg, Relocatable};

/// Guest CPU/context state visible to and mutated by interpreted patches.
pub struct CpuState {
    /// Live physical registers (temps and explicit operands resolve here).
    pub gpr: [i32; 16],
    pub cpu_mode: CpuMode,
    /// Only the zero flag is modeled; it is all the supported scenarios'
    /// predicates (`EQ`/`NE`) need.
    pub z_flag: bool,
    /// The context/data block: byte offset -> word value. Addressed the
    /// same way `context.rs` addresses it (`gpr_offset`, `CPSR_OFFSET`,
    /// etc.), keyed directly by those offsets.
    context: BTreeMap<i32, i32>,
    /// Guest-addressable memory (stack, literal pools), word-addressed.
    memory: BTreeMap<i32, i32>,
    /// The address of the guest instruction the patch currently being
    /// interpreted replaces. Feeds `HostPCRel`'s `current_pc + off`.
    pub current_pc: u64,
}

impl CpuState {
    pub fn new() -> Self {
        CpuState {
            gpr: [0; 16],
            cpu_mode: CpuMode::Arm,
            z_flag: false,
            context: BTreeMap::new(),
            memory: BTreeMap::new(),
            current_pc: 0,
        }
    }

    pub fn set_reg(&mut self, reg: Reg, value: i32) {
        self.gpr[reg.num() as usize] = value;
    }

    pub fn reg(&self, reg: Reg) -> i32 {
        self.gpr[reg.num() as usize]
    }

    /// The context block's stored PC slot — distinct from any live
    /// register, matching the "stored PC" glossary term.
    pub fn stored_pc(&self) -> i32 {
        self.context_at(armdbi_core::gpr_offset(Reg::PC))
    }

    pub fn context_at(&self, offset: i32) -> i32 {
        self.context.get(&offset).copied().unwrap_or(0)
    }

    pub fn set_context_at(&mut self, offset: i32, value: i32) {
        self.context.insert(offset, value);
    }

    /// Write a word into guest memory at `address` (used by tests to set up
    /// stack contents or literal pools read back through `T_LDRPCI`/
    /// `POP_CONTEXT_SP`).
    pub fn write_memory_word(&mut self, address: i32, value: i32) {
        self.memory.insert(address, value);
    }

    fn read_memory_word(&self, address: i32) -> i32 {
        self.memory.get(&address).copied().unwrap_or(0)
    }
}

impl Default for CpuState {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened while interpreting a patch's instruction stream.
#[derive(Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Every relocatable ran; execution falls through to whatever comes
    /// next in the basic block.
    Completed,
    /// An `EpilogueRel` branch fired: the patch broke to the host. Carries
    /// the stored PC snapshot was already taken by the caller before this
    /// point if it wanted PRE-callback fidelity.
    BrokeToHost,
}

/// Execute one patch's relocatables against `state` in order.
///
/// `state.current_pc` must already be set to the address the patch is
/// standing in for (used by `HostPCRel`).
pub fn run(relocs: &[Relocatable], state: &mut CpuState) -> StepOutcome {
    for reloc in relocs {
        if let Some(outcome) = step(reloc, state) {
            return outcome;
        }
    }
    StepOutcome::Completed
}

/// One resolved operand: which operand index carries it, and what value it
/// stands for once resolved against `state`.
struct Resolved {
    opn: usize,
    value: i32,
}

fn resolve(reloc: &Relocatable, state: &CpuState) -> Option<Resolved> {
    match reloc {
        Relocatable::NoReloc(_) | Relocatable::AdjustPCAlign { .. } => None,
        Relocatable::DataBlockRel { opn, off, .. } => Some(Resolved {
            opn: opn.0,
            value: *off,
        }),
        Relocatable::MemoryConstant { opn, value, .. } => Some(Resolved {
            opn: opn.0,
            value: *value,
        }),
        Relocatable::HostPCRel { opn, off, .. } => Some(Resolved {
            opn: opn.0,
            value: (state.current_pc as i64 + *off as i64) as i32,
        }),
        Relocatable::InstId { opn, .. } => Some(Resolved {
            opn: opn.0,
            value: 0,
        }),
        Relocatable::EpilogueRel { .. } => None,
    }
}

fn base_inst(reloc: &Relocatable) -> &DecodedInst {
    match reloc {
        Relocatable::NoReloc(inst)
        | Relocatable::DataBlockRel { inst, .. }
        | Relocatable::MemoryConstant { inst, .. }
        | Relocatable::EpilogueRel { inst, .. }
        | Relocatable::HostPCRel { inst, .. }
        | Relocatable::InstId { inst, .. }
        | Relocatable::AdjustPCAlign { inst, .. } => inst,
    }
}

fn predicate_holds(inst: &DecodedInst, state: &CpuState) -> bool {
    match inst.operands.iter().find_map(|op| match op {
        InstOperand::Cond(c) => Some(*c),
        _ => None,
    }) {
        None | Some(Condition::Al) => true,
        Some(Condition::Eq) => state.z_flag,
        Some(Condition::Ne) => !state.z_flag,
        Some(_) => true,
    }
}

/// `Some(outcome)` short-circuits `run`; `None` continues to the next
/// relocatable.
fn step(reloc: &Relocatable, state: &mut CpuState) -> Option<StepOutcome> {
    if matches!(reloc, Relocatable::EpilogueRel { .. }) {
        return Some(StepOutcome::BrokeToHost);
    }

    let inst = base_inst(reloc);
    if !predicate_holds(inst, state) {
        return None;
    }
    let resolved = resolve(reloc, state);
    let imm_at = |idx: usize| -> i32 {
        match &resolved {
            Some(r) if r.opn == idx => r.value,
            _ => inst.operand_imm(idx).unwrap_or(0),
        }
    };

    match inst.opcode {
        Opcode::LOAD_IMMEDIATE => {
            let dest = inst.operand_reg(0).expect("LOAD_IMMEDIATE needs a dest reg");
            state.set_reg(dest, imm_at(1));
        }
        Opcode::STORE_CONTEXT => {
            let src = inst.operand_reg(0).expect("STORE_CONTEXT needs a src reg");
            let off = imm_at(1);
            state.set_context_at(off, state.reg(src));
        }
        Opcode::LOAD_CONTEXT => {
            let dest = inst.operand_reg(0).expect("LOAD_CONTEXT needs a dest reg");
            let off = imm_at(1);
            state.set_reg(dest, state.context_at(off));
        }
        Opcode::MOV_REG => {
            let dest = inst.operand_reg(0).expect("MOV_REG needs a dest reg");
            let src = inst.operand_reg(1).expect("MOV_REG needs a src reg");
            state.set_reg(dest, state.reg(src));
        }
        Opcode::SIMULATE_EXCHANGE => {
            let reg = inst.operand_reg(0).expect("SIMULATE_EXCHANGE needs a reg");
            let value = state.reg(reg);
            state.cpu_mode = CpuMode::from_thumb_bit((value & 1) as u32);
            let cleared = value & !1;
            state.set_reg(reg, cleared);
            state.set_context_at(armdbi_core::gpr_offset(Reg::PC), cleared);
        }
        Opcode::POP_CONTEXT_SP => {
            let dest = inst.operand_reg(0).expect("POP_CONTEXT_SP needs a dest reg");
            let sp = state.reg(Reg::SP);
            state.set_reg(dest, state.read_memory_word(sp));
            state.set_reg(Reg::SP, sp + 4);
        }
        op if op == crate::fixture_opcodes::MOV_IMM => {
            let dest = inst.operand_reg(0).expect("MOV_IMM needs a dest reg");
            let value = inst.operand_imm(1).expect("MOV_IMM needs an immediate");
            state.set_reg(dest, value);
        }
        op if op == armdbi_core::arm_opcodes::T_LDRPCI => {
            // After `ThumbLdrPciTransform`, operand 1 (originally REG_PC) is
            // the base register holding the value the literal load needs.
            let dest = inst.operand_reg(0).expect("T_LDRPCI needs a dest reg");
            let base = inst.operand_reg(1).expect("T_LDRPCI needs a base reg");
            let offset = inst.operand_imm(2).unwrap_or(0);
            let addr = state.reg(base) + offset;
            state.set_reg(dest, state.read_memory_word(addr));
        }
        op if op == armdbi_core::arm_opcodes::T_POP => {
            // PC, if present, was already removed by the rule's
            // `ModifyInstruction`; only the remaining register-list entries
            // are popped here.
            let mut sp = state.reg(Reg::SP);
            for operand in &inst.operands {
                if let InstOperand::Reg(dest) = operand {
                    let value = state.read_memory_word(sp);
                    state.set_reg(*dest, value);
                    sp += 4;
                }
            }
            state.set_reg(Reg::SP, sp);
        }
        other => panic!("armdbi-test-support interpreter: unhandled opcode {:?}", other),
    }

    None
}
