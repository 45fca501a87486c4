//! A configurable [`InstInfoProvider`] double. Every opcode defaults to
//! "plain register instruction, no implicit registers, no memory access";
//! tests override only what they need via the builder methods.

use std::collections::BTreeMap;

use armdbi_core::{DecodedInst, InstInfoProvider, Opcode, Reg};

#[derive(Default)]
struct OpcodeFacts {
    mnemonic: &'static str,
    implicit_uses: Vec<Reg>,
    implicit_defs: Vec<Reg>,
    read_access_size: Option<u32>,
    write_access_size: Option<u32>,
}

/// A fake instruction-metadata provider built up opcode-by-opcode.
///
/// # Example
///
/// ```rust
/// use armdbi_test_support::FakeInstInfoProvider;
/// use armdbi_core::{Opcode, Reg};
///
/// let info = FakeInstInfoProvider::new()
///     .with_mnemonic(Opcode(1), "BX")
///     .with_implicit_use(Opcode(1), Reg::LR)
///     .build();
/// ```
pub struct FakeInstInfoProvider {
    facts: BTreeMap<Opcode, OpcodeFacts>,
    sub_regs: BTreeMap<(Reg, u32), Reg>,
}

impl FakeInstInfoProvider {
    pub fn new() -> Self {
        FakeInstInfoProvider {
            facts: BTreeMap::new(),
            sub_regs: BTreeMap::new(),
        }
    }

    fn entry(&mut self, opcode: Opcode) -> &mut OpcodeFacts {
        self.facts.entry(opcode).or_insert_with(|| OpcodeFacts {
            mnemonic: "UNKNOWN",
            ..Default::default()
        })
    }

    pub fn with_mnemonic(mut self, opcode: Opcode, name: &'static str) -> Self {
        self.entry(opcode).mnemonic = name;
        self
    }

    pub fn with_implicit_use(mut self, opcode: Opcode, reg: Reg) -> Self {
        self.entry(opcode).implicit_uses.push(reg);
        self
    }

    pub fn with_implicit_def(mut self, opcode: Opcode, reg: Reg) -> Self {
        self.entry(opcode).implicit_defs.push(reg);
        self
    }

    pub fn with_read_access_size(mut self, opcode: Opcode, size: u32) -> Self {
        self.entry(opcode).read_access_size = Some(size);
        self
    }

    pub fn with_write_access_size(mut self, opcode: Opcode, size: u32) -> Self {
        self.entry(opcode).write_access_size = Some(size);
        self
    }

    pub fn with_sub_reg(mut self, reg: Reg, size_bytes: u32, sub: Reg) -> Self {
        self.sub_regs.insert((reg, size_bytes), sub);
        self
    }

    /// Consumes the builder. Named for symmetry with other fluent builders
    /// in this crate even though it returns `self` unchanged.
    pub fn build(self) -> Self {
        self
    }
}

impl Default for FakeInstInfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InstInfoProvider for FakeInstInfoProvider {
    fn mnemonic(&self, opcode: Opcode) -> &str {
        self.facts.get(&opcode).map(|f| f.mnemonic).unwrap_or("UNKNOWN")
    }

    fn implicit_uses(&self, opcode: Opcode) -> &[Reg] {
        self.facts
            .get(&opcode)
            .map(|f| f.implicit_uses.as_slice())
            .unwrap_or(&[])
    }

    fn implicit_defs(&self, opcode: Opcode) -> &[Reg] {
        self.facts
            .get(&opcode)
            .map(|f| f.implicit_defs.as_slice())
            .unwrap_or(&[])
    }

    fn reads_memory(&self, opcode: Opcode) -> bool {
        self.facts
            .get(&opcode)
            .map(|f| f.read_access_size.is_some())
            .unwrap_or(false)
    }

    fn writes_memory(&self, opcode: Opcode) -> bool {
        self.facts
            .get(&opcode)
            .map(|f| f.write_access_size.is_some())
            .unwrap_or(false)
    }

    fn read_access_size(&self, opcode: Opcode) -> Option<u32> {
        self.facts.get(&opcode).and_then(|f| f.read_access_size)
    }

    fn write_access_size(&self, opcode: Opcode) -> Option<u32> {
        self.facts.get(&opcode).and_then(|f| f.write_access_size)
    }

    fn is_stack_read(&self, inst: &DecodedInst) -> bool {
        self.reads_memory(inst.opcode) && inst.uses_reg(Reg::SP)
    }

    fn is_stack_write(&self, inst: &DecodedInst) -> bool {
        self.writes_memory(inst.opcode) && inst.uses_reg(Reg::SP)
    }

    fn sub_reg_of_size(&self, reg: Reg, size_bytes: u32) -> Option<Reg> {
        self.sub_regs.get(&(reg, size_bytes)).copied()
    }
}
