//! Opcodes that exist only for scenario fixtures: guest instructions this
//! support crate needs to stand for something concrete (e.g. "the literal
//! load target's original value") that the pipeline itself never emits.
//! Reserved from a range disjoint from both `arm_opcodes`'s small real-ISA
//! ids and `armdbi_core::inst::Opcode::PSEUDO_BASE`.

use armdbi_core::Opcode;

const FIXTURE_BASE: u32 = 0x8000_0000;

/// `dest <- imm`, used by scenario setup to seed a guest register before a
/// patch runs; never produced by any rule or generator.
pub const MOV_IMM: Opcode = Opcode(FIXTURE_BASE + 1);
