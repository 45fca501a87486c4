//! A fake [`ExecBlock`] backed by plain fields instead of a real code/data
//! page. Offsets are reported relative to `current_pc`, matching the real
//! contract, but this double never actually assembles or places bytes.

use std::collections::BTreeMap;

use armdbi_core::{ExecBlock, Reg, ShadowId};

pub struct FakeExecBlock {
    current_pc: u32,
    scratch: Reg,
    data_block_addr: i64,
    epilogue_addr: i64,
    shadows: BTreeMap<u32, i32>,
    next_shadow: u32,
    next_inst_id: u64,
}

impl FakeExecBlock {
    /// `data_block_addr`/`epilogue_addr` are absolute addresses in the same
    /// space as `current_pc`; offsets are derived by subtraction on demand.
    pub fn new(current_pc: u32, data_block_addr: i64, epilogue_addr: i64) -> Self {
        FakeExecBlock {
            current_pc,
            scratch: Reg::R12,
            data_block_addr,
            epilogue_addr,
            shadows: BTreeMap::new(),
            next_shadow: 0,
            next_inst_id: 0,
        }
    }

    pub fn set_current_pc(&mut self, pc: u32) {
        self.current_pc = pc;
    }

    pub fn set_scratch_register(&mut self, reg: Reg) {
        self.scratch = reg;
    }

    pub fn shadow_value(&self, id: ShadowId) -> Option<i32> {
        self.shadows.get(&id.0).copied()
    }
}

impl ExecBlock for FakeExecBlock {
    fn new_shadow(&mut self) -> ShadowId {
        let id = ShadowId(self.next_shadow);
        self.next_shadow += 1;
        id
    }

    fn set_shadow(&mut self, id: ShadowId, value: i32) {
        self.shadows.insert(id.0, value);
    }

    fn shadow_offset(&self, id: ShadowId) -> i32 {
        // Shadow words live immediately after the data block, one word
        // apart, in allocation order.
        let shadow_addr = self.data_block_addr + 4 * (id.0 as i64) + 4096;
        (shadow_addr - self.current_pc as i64) as i32
    }

    fn data_block_offset(&self) -> i32 {
        (self.data_block_addr - self.current_pc as i64) as i32
    }

    fn epilogue_offset(&self) -> i32 {
        (self.epilogue_addr - self.current_pc as i64) as i32
    }

    fn current_pc(&self) -> u32 {
        self.current_pc
    }

    fn scratch_register(&self) -> Reg {
        self.scratch
    }

    fn next_inst_id(&mut self) -> u64 {
        let id = self.next_inst_id;
        self.next_inst_id += 1;
        id
    }
}
