//! End-to-end scenarios: pick a rule from the real table, run its
//! generators against a decoded instruction, then interpret the resulting
//! relocatable stream and check the guest-visible effect.

use armdbi_core::{
    arm_opcodes, arm_rule_table, gpr_offset, CpuMode, DecodedInst, InstOperand, Opcode,
    PipelineConfig, Reg,
};
use armdbi_test_support::{CpuState, FakeInstInfoProvider, PatchScenario, StepOutcome};

fn select_rule<'a>(
    table: &'a [armdbi_core::PatchRule],
    inst: &DecodedInst,
    address: u64,
    size: u32,
    info: &dyn armdbi_core::InstInfoProvider,
) -> &'a armdbi_core::PatchRule {
    table
        .iter()
        .find(|r| r.matches(inst, address, size, info))
        .expect("default pass-through rule always matches")
}

fn generate(
    inst: &DecodedInst,
    address: u64,
    size: u32,
    cpu_mode: CpuMode,
) -> armdbi_core::Patch {
    let info = FakeInstInfoProvider::new();
    let table = arm_rule_table();
    let rule = select_rule(&table, inst, address, size, &info);
    rule.generate(
        inst,
        inst.opcode,
        address,
        size,
        cpu_mode,
        &info,
        PipelineConfig::default(),
        None,
    )
}

/// Rule #1: `BX Rn` with a plain register target copies the guest value into
/// the stored PC slot, taking the low bit as the new ISA mode.
#[test]
fn simple_return_via_bx_register() {
    let inst = DecodedInst::new(arm_opcodes::BX, vec![InstOperand::Reg(Reg::LR)]);
    let patch = generate(&inst, 0x1000, 4, CpuMode::Arm);
    assert!(patch.modify_pc);

    PatchScenario::new(patch.insts)
        .with_reg(Reg::LR, 0x2001)
        .expect_stored_pc(0x2000)
        .expect_mode(CpuMode::Thumb)
        .expect_outcome(StepOutcome::Completed)
        .run();
}

/// Rule #7: `tB`/`t2B` computes a PC-relative target purely from the host
/// address and the branch's immediate offset, with no register reads.
#[test]
fn unconditional_thumb_branch() {
    let inst = DecodedInst::new(arm_opcodes::T_B, vec![InstOperand::Imm(0x40)]);
    let patch = generate(&inst, 0x2000, 2, CpuMode::Thumb);
    assert!(patch.modify_pc);

    PatchScenario::new(patch.insts)
        .with_current_pc(0x2000)
        .expect_stored_pc(0x2040)
        .expect_outcome(StepOutcome::Completed)
        .run();
}

/// Rule #14: `tLDRpci` keeps reading through the same opcode post-rewrite,
/// but the PC operand becomes a temp carrying the PC-relative literal
/// address instead.
#[test]
fn thumb_literal_load_reads_through_rewritten_base() {
    let inst = DecodedInst::new(
        arm_opcodes::T_LDRPCI,
        vec![InstOperand::Reg(Reg::R0), InstOperand::Reg(Reg::PC), InstOperand::Imm(8)],
    );
    let patch = generate(&inst, 0x3000, 2, CpuMode::Thumb);
    assert!(!patch.modify_pc);

    let mut state = CpuState::new();
    state.current_pc = 0x3000;
    // literal pool entry lives at current_pc + operand offset; the patch's
    // rewritten base register carries that absolute address.
    state.write_memory_word(0x3008, 0x1234_5678);
    let outcome = armdbi_test_support::run(&patch.insts, &mut state);
    assert_eq!(outcome, StepOutcome::Completed);
    assert_eq!(state.reg(Reg::R0), 0x1234_5678);
}

/// Rule #13: `tPOP {..., PC}` drains the register list off the guest stack
/// and treats the popped PC as an ISA-exchanging branch target.
#[test]
fn pop_with_pc_in_register_list() {
    let inst = DecodedInst::new(
        arm_opcodes::T_POP,
        vec![InstOperand::Reg(Reg::R4), InstOperand::Reg(Reg::PC)],
    );
    let patch = generate(&inst, 0x4000, 2, CpuMode::Thumb);
    assert!(patch.modify_pc);

    PatchScenario::new(patch.insts)
        .with_reg(Reg::SP, 0x9000)
        .with_memory(0x9000, 0x11)
        .with_memory(0x9004, 0x5001)
        .expect_reg(Reg::R4, 0x11)
        .expect_reg(Reg::SP, 0x9008)
        .expect_stored_pc(0x5000)
        .expect_mode(CpuMode::Thumb)
        .expect_outcome(StepOutcome::Completed)
        .run();
}

/// Rule #8 rewrites `BX_RET`/`MOVPCLR` into a `MOV temp, LR` that keeps the
/// original instruction's condition attached, so the rewritten move itself
/// only fires when that condition holds — the same mechanism a predicated
/// `MOVEQ PC, LR` relies on natively.
#[test]
fn conditional_return_respects_predicate() {
    let inst = DecodedInst::new(
        arm_opcodes::BX_RET,
        vec![InstOperand::Cond(armdbi_core::Condition::Eq)],
    );
    let patch = generate(&inst, 0x5000, 4, CpuMode::Arm);
    assert!(patch.modify_pc);

    let predicated_mov = patch
        .insts
        .iter()
        .find_map(|r| match r {
            armdbi_core::Relocatable::NoReloc(inst) if inst.opcode == Opcode::MOV_REG => {
                Some(inst.clone())
            }
            _ => None,
        })
        .expect("rule #8 emits a rewritten MOV_REG carrying the original condition");
    assert_eq!(predicated_mov.operand_reg(1), Some(Reg::LR));

    let mut holds = CpuState::new();
    holds.z_flag = true;
    holds.set_reg(Reg::LR, 0x41);
    armdbi_test_support::run(&[armdbi_core::Relocatable::NoReloc(predicated_mov.clone())], &mut holds);
    let dest = predicated_mov.operand_reg(0).unwrap();
    assert_eq!(holds.reg(dest), 0x41);

    let mut fails = CpuState::new();
    fails.z_flag = false;
    fails.set_reg(Reg::LR, 0x41);
    fails.set_reg(dest, 0x99);
    armdbi_test_support::run(&[armdbi_core::Relocatable::NoReloc(predicated_mov)], &mut fails);
    assert_eq!(fails.reg(dest), 0x99, "unmet condition must leave the destination untouched");
}

/// Rule #0: `BX PC` takes the host-visible PC value (the caller is
/// responsible for supplying it already biased per ARM/Thumb PC-read
/// rules, same as a real `ExecBlock::current_pc()`), not a register value,
/// as its exchange target. A PRE-position callback observing the context
/// between generators would see that value already staged in the stored PC
/// slot before `SimulateExchange` clears its low bit.
#[test]
fn bx_pc_stages_host_pc_relative_value_before_exchange() {
    let inst = DecodedInst::new(arm_opcodes::BX, vec![InstOperand::Reg(Reg::PC)]);
    let patch = generate(&inst, 0x7000, 4, CpuMode::Arm);

    let mut state = CpuState::new();
    state.current_pc = 0x7008; // the BX instruction's CPU-visible PC (addr + 8)
    let mut staged_before_exchange = None;
    for reloc in &patch.insts {
        if matches!(reloc, armdbi_core::Relocatable::NoReloc(inst) if inst.opcode == Opcode::SIMULATE_EXCHANGE)
        {
            staged_before_exchange = Some(state.stored_pc());
        }
        armdbi_test_support::run(std::slice::from_ref(reloc), &mut state);
    }

    assert_eq!(staged_before_exchange, Some(0x7008));
    assert_eq!(state.stored_pc(), 0x7008);
    assert_eq!(state.cpu_mode, CpuMode::Arm);
}

/// The context's stored PC slot is never touched unless a generator writes
/// it; an instruction matching the default pass-through rule leaves it at
/// its initial value.
#[test]
fn modify_pc_flag_matches_whether_stored_pc_is_written() {
    let inst = DecodedInst::new(
        armdbi_test_support::fixture_opcodes::MOV_IMM,
        vec![InstOperand::Reg(Reg::R0), InstOperand::Imm(5)],
    );
    let patch = generate(&inst, 0x8000, 4, CpuMode::Arm);
    assert!(!patch.modify_pc);

    let mut state = CpuState::new();
    state.set_context_at(gpr_offset(Reg::PC), 0x1111);
    armdbi_test_support::run(&patch.insts, &mut state);
    assert_eq!(state.reg(Reg::R0), 5);
    assert_eq!(state.stored_pc(), 0x1111);
}
