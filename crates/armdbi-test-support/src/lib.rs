//! Test doubles and a minimal interpreter for exercising the patch pipeline
//! end to end without a real disassembler, assembler, or exec block.

pub mod fake_exec_block;
pub mod fake_info;
pub mod fixture_opcodes;
pub mod interpreter;
pub mod scenario;

pub use fake_exec_block::FakeExecBlock;
pub use fake_info::FakeInstInfoProvider;
pub use interpreter::{run, CpuState, StepOutcome};
pub use scenario::PatchScenario;
