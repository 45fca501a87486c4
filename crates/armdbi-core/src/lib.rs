//! ARM/Thumb dynamic binary instrumentation patch pipeline.
//!
//! Turns one decoded guest instruction into a self-contained relocatable
//! instruction sequence: a matching [`patch::PatchRule`] builds the
//! replacement, any matching [`instrument::InstrumentationRule`]s wrap it
//! with user-callback machinery, and [`boundary`] supplies the fixed
//! entry/exit sequences shared by every exec block. Disassembly, assembly,
//! and exec block memory management are all external collaborators reached
//! through the [`traits::InstInfoProvider`] and [`traits::ExecBlock`] seams.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod arm_opcodes;
pub mod boundary;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod generator;
pub mod inst;
pub mod instrument;
pub mod patch;
pub mod reloc;
pub mod rules;
pub mod temp;
pub mod transform;
pub mod traits;
pub mod types;

pub use condition::{AddressRangeSet, PatchCondition};
pub use config::PipelineConfig;
pub use context::{gpr_offset, CPSR_OFFSET, GPR_STATE_SIZE};
pub use error::PatchError;
pub use generator::{GenContext, PatchGenerator};
pub use inst::{Condition, DecodedInst, InstOperand, Opcode};
pub use instrument::{InstPosition, InstrumentationRule};
pub use patch::{Patch, PatchRule};
pub use reloc::Relocatable;
pub use rules::arm_rule_table;
pub use temp::TempAllocator;
pub use traits::{ExecBlock, InstInfoProvider, ShadowId};
pub use transform::InstTransform;
pub use types::{CpuMode, Operand, Reg, Temp};
