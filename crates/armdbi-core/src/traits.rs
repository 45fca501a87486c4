//! External capability sets the patch pipeline depends on but does not
//! implement: instruction metadata and the exec-block memory layout. Real
//! implementations live behind the disassembler/assembler and exec-block
//! allocator, both out of scope here; tests exercise these contracts
//! through fakes.

use crate::inst::{DecodedInst, Opcode};
use crate::types::Reg;

/// Identifier of a shadow word allocated in an exec block's data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShadowId(pub u32);

/// Static metadata about opcodes, supplied by the disassembler layer.
///
/// Implementations must be internally consistent: an opcode's implicit
/// use/def sets are part of the ISA and never change across calls.
pub trait InstInfoProvider {
    fn mnemonic(&self, opcode: Opcode) -> &str;

    /// Registers read by `opcode` that do not appear as explicit operands.
    fn implicit_uses(&self, opcode: Opcode) -> &[Reg];

    /// Registers written by `opcode` that do not appear as explicit
    /// operands.
    fn implicit_defs(&self, opcode: Opcode) -> &[Reg];

    fn reads_memory(&self, opcode: Opcode) -> bool;
    fn writes_memory(&self, opcode: Opcode) -> bool;

    /// Size in bytes of the memory access, if `opcode` reads memory.
    fn read_access_size(&self, opcode: Opcode) -> Option<u32>;
    /// Size in bytes of the memory access, if `opcode` writes memory.
    fn write_access_size(&self, opcode: Opcode) -> Option<u32>;

    fn is_stack_read(&self, inst: &DecodedInst) -> bool;
    fn is_stack_write(&self, inst: &DecodedInst) -> bool;

    /// A sub-register (or alias) of `reg` exactly `size_bytes` wide, if the
    /// register file defines one. Returns `None` on an unknown class; the
    /// caller logs a warning and falls back to a sentinel rather than
    /// treating this as fatal.
    fn sub_reg_of_size(&self, reg: Reg, size_bytes: u32) -> Option<Reg>;
}

/// The exec-block memory layout the patch pipeline relocates instructions
/// against.
///
/// All offsets are in bytes, relative to the instruction currently being
/// relocated (matching ARM/Thumb PC-relative addressing, which is always
/// relative to the instruction performing the access).
pub trait ExecBlock {
    /// Allocate a fresh 4-byte slot in the data region and return its id.
    fn new_shadow(&mut self) -> ShadowId;

    /// Store a constant word into a previously allocated shadow slot.
    fn set_shadow(&mut self, id: ShadowId, value: i32);

    /// Offset from the current instruction to the given shadow slot.
    fn shadow_offset(&self, id: ShadowId) -> i32;

    /// Offset from the current instruction to the data block base (the
    /// context block lives at the start of the data block).
    fn data_block_offset(&self) -> i32;

    /// Offset from the current instruction to the exec block's epilogue.
    fn epilogue_offset(&self) -> i32;

    /// The guest-visible PC value of the instruction currently being
    /// relocated (used for PC-alignment and `HostPCRel` corrections).
    fn current_pc(&self) -> u32;

    /// A register reserved by the exec block for Thumb PC-relative base
    /// computation, guaranteed not to collide with any temp allocation.
    fn scratch_register(&self) -> Reg;

    /// Monotonically increasing id identifying the instruction currently
    /// being relocated, used to report callback origin.
    fn next_inst_id(&mut self) -> u64;
}
