//! A fluent scenario runner for exercising a patch's relocatable stream
//! against [`CpuState`], in the style of this workspace's other fluent test
//! builders: set up state, declare expectations, `run()` checks them all and
//! panics with a full dump of what actually happened if any fail.

use armdbi_core::{CpuMode, Reg, Relocatable};

use crate::interpreter::{self, CpuState, StepOutcome};

enum Expectation {
    Reg(Reg, i32),
    ContextAt(i32, i32),
    StoredPc(i32),
    Mode(CpuMode),
    Outcome(StepOutcome),
}

impl Expectation {
    fn check(&self, state: &CpuState, outcome: &StepOutcome) -> Result<(), String> {
        match self {
            Expectation::Reg(reg, expected) => {
                let actual = state.reg(*reg);
                if actual != *expected {
                    return Err(format!(
                        "expected {reg:?} = {expected}, got {actual}"
                    ));
                }
            }
            Expectation::ContextAt(offset, expected) => {
                let actual = state.context_at(*offset);
                if actual != *expected {
                    return Err(format!(
                        "expected context[{offset}] = {expected}, got {actual}"
                    ));
                }
            }
            Expectation::StoredPc(expected) => {
                let actual = state.stored_pc();
                if actual != *expected {
                    return Err(format!("expected stored PC = {expected}, got {actual}"));
                }
            }
            Expectation::Mode(expected) => {
                if state.cpu_mode != *expected {
                    return Err(format!(
                        "expected CPU mode {:?}, got {:?}",
                        expected, state.cpu_mode
                    ));
                }
            }
            Expectation::Outcome(expected) => {
                if outcome != expected {
                    return Err(format!("expected outcome {expected:?}, got {outcome:?}"));
                }
            }
        }
        Ok(())
    }
}

/// Builds initial CPU state, runs a relocatable stream against it, and
/// checks a list of expectations.
pub struct PatchScenario {
    relocs: Vec<Relocatable>,
    state: CpuState,
    expectations: Vec<Expectation>,
}

impl PatchScenario {
    pub fn new(relocs: Vec<Relocatable>) -> Self {
        PatchScenario {
            relocs,
            state: CpuState::new(),
            expectations: Vec::new(),
        }
    }

    pub fn with_reg(mut self, reg: Reg, value: i32) -> Self {
        self.state.set_reg(reg, value);
        self
    }

    pub fn with_context(mut self, offset: i32, value: i32) -> Self {
        self.state.set_context_at(offset, value);
        self
    }

    pub fn with_memory(mut self, address: i32, value: i32) -> Self {
        self.state.write_memory_word(address, value);
        self
    }

    pub fn with_current_pc(mut self, pc: u64) -> Self {
        self.state.current_pc = pc;
        self
    }

    pub fn with_z_flag(mut self, z: bool) -> Self {
        self.state.z_flag = z;
        self
    }

    pub fn with_mode(mut self, mode: CpuMode) -> Self {
        self.state.cpu_mode = mode;
        self
    }

    pub fn expect_reg(mut self, reg: Reg, value: i32) -> Self {
        self.expectations.push(Expectation::Reg(reg, value));
        self
    }

    pub fn expect_context(mut self, offset: i32, value: i32) -> Self {
        self.expectations.push(Expectation::ContextAt(offset, value));
        self
    }

    pub fn expect_stored_pc(mut self, value: i32) -> Self {
        self.expectations.push(Expectation::StoredPc(value));
        self
    }

    pub fn expect_mode(mut self, mode: CpuMode) -> Self {
        self.expectations.push(Expectation::Mode(mode));
        self
    }

    pub fn expect_outcome(mut self, outcome: StepOutcome) -> Self {
        self.expectations.push(Expectation::Outcome(outcome));
        self
    }

    /// Runs the relocatable stream and checks every expectation, panicking
    /// with the full final state if any fail.
    pub fn run(mut self) {
        let outcome = interpreter::run(&self.relocs, &mut self.state);

        let failures: Vec<String> = self
            .expectations
            .iter()
            .filter_map(|e| e.check(&self.state, &outcome).err())
            .collect();

        if !failures.is_empty() {
            panic!(
                "scenario failed:\n{}\n\nfinal gpr: {:?}\nfinal mode: {:?}\nfinal z_flag: {}\noutcome: {:?}",
                failures.join("\n"),
                self.state.gpr,
                self.state.cpu_mode,
                self.state.z_flag,
                outcome,
            );
        }
    }
}
