//! A small, fully worked [`TargetIsa`] used only by this crate's own tests.
//!
//! Modeled on `isa/arm32/registers.rs`'s S/D register overlap: eight
//! physical registers split into a general-purpose class (`r0..r3`, plus
//! `r4`/`r5` reserved as stack and frame pointer) and a floating-point class
//! of `s0`/`d0`, where `d0` aliases `s0` the way an ARM double-precision
//! register overlaps the single-precision register living in its low half.
//! One aliasing pair is enough to exercise the allocator's alias-propagating
//! use counts (`crate::regalloc::tracker`) without a second target crate.
//!
//! The emitters below are the simplest possible instructions: no operand
//! folding, no peephole shortcuts, one opcode per IR shape. They exist to
//! give selection, allocation, spilling, and frame finalization something
//! concrete to run against in tests, not to model a real encoding.

use crate::ir::{BinaryOp, Block, Callee, CastKind, FloatCc, IntCc};
use crate::isa::calling_convention::{CallingConvention, StackGrowth};
use crate::isa::instr_info::{InstrDescriptor, InstrInfo, Opcode};
use crate::isa::registers::{PhysRegData, Reg, RegClassData, RegClassIndex, RegInfo};
use crate::isa::tile_info::TileInfo;
use crate::isa::TargetIsa;
use crate::machine_function::{FrameIndex, MachineInstr, Operand, OperandRole};
use crate::settings::Flags;

/// Index of the general-purpose register class.
pub const GPR_INDEX: RegClassIndex = 0;
/// Index of the floating-point register class.
pub const FPR_INDEX: RegClassIndex = 1;

const R0: u16 = 0;
const R1: u16 = 1;
const R2: u16 = 2;
const R3: u16 = 3;
const SP: u16 = 4;
const FP: u16 = 5;
const S0: u16 = 6;
const D0: u16 = 7;

const REGS: &[PhysRegData] = &[
    PhysRegData { name: "r0", aliases: &[] },
    PhysRegData { name: "r1", aliases: &[] },
    PhysRegData { name: "r2", aliases: &[] },
    PhysRegData { name: "r3", aliases: &[] },
    PhysRegData { name: "sp", aliases: &[] },
    PhysRegData { name: "fp", aliases: &[] },
    PhysRegData { name: "s0", aliases: &[D0] },
    PhysRegData { name: "d0", aliases: &[S0] },
];

const GPR: RegClassData = RegClassData {
    name: "GPR",
    index: GPR_INDEX,
    registers: &[R0, R1, R2, R3],
    spill_size: 8,
    spill_align: 8,
};
const FPR: RegClassData = RegClassData {
    name: "FPR",
    index: FPR_INDEX,
    registers: &[S0, D0],
    spill_size: 8,
    spill_align: 8,
};
const GPR_REF: &RegClassData = &GPR;
const FPR_REF: &RegClassData = &FPR;
const CLASSES: &[&RegClassData] = &[GPR_REF, FPR_REF];

const REG_INFO: RegInfo = RegInfo {
    first_virtual_register: 8,
    registers: REGS,
    classes: CLASSES,
};

const CALLING_CONVENTION: CallingConvention = CallingConvention {
    name: "fixture",
    callee_saved: &[R2, R3],
    int_arg_regs: &[R0, R1],
    float_arg_regs: &[S0],
    int_return_reg: R0,
    float_return_reg: S0,
    stack_pointer: SP,
    frame_pointer: FP,
    link_register: None,
    growth: StackGrowth::Down,
    stack_alignment: 8,
};

/// A register-to-register move of an immediate, `dst = imm`.
pub const OP_MOV_IMM: Opcode = 0;
/// Function return, optionally carrying a value in the ABI return register.
pub const OP_RET: Opcode = 1;
/// A binary arithmetic/bitwise/shift instruction, `dst = lhs op rhs`.
pub const OP_BINARY: Opcode = 2;
/// An integer or float comparison, `dst = (lhs cc rhs)`.
pub const OP_CMP: Opcode = 3;
/// A type conversion, `dst = cast(src)`.
pub const OP_CAST: Opcode = 4;
/// A load from the address in one register into another.
pub const OP_LOAD: Opcode = 5;
/// A store of one register's value to the address in another.
pub const OP_STORE: Opcode = 6;
/// A direct or indirect call.
pub const OP_CALL: Opcode = 7;
/// An unconditional jump.
pub const OP_JUMP: Opcode = 8;
/// A two-way conditional branch.
pub const OP_BRANCH: Opcode = 9;
/// A register-to-register copy, `dst = src`.
pub const OP_COPY: Opcode = 10;
/// `dst = &frame_slot`.
pub const OP_FRAME_ADDR: Opcode = 11;
/// Stack-pointer adjustment reserving a dynamically-sized object.
pub const OP_ALLOCA_DYNAMIC: Opcode = 12;

/// Registers a call clobbers beyond its explicit result: every allocatable
/// register not in the calling convention's callee-saved set (`r0`/`r1`,
/// `s0`/`d0`).
const CALL_CLOBBERS: &[u16] = &[R0, R1, S0, D0];

const DESCRIPTORS: &[InstrDescriptor] = &[
    InstrDescriptor { name: "mov_imm", num_defs: 1, is_terminator: false, is_unconditional_branch: false, is_call: false, has_side_effects: false, implicit_defs: &[] },
    InstrDescriptor { name: "ret", num_defs: 0, is_terminator: true, is_unconditional_branch: false, is_call: false, has_side_effects: true, implicit_defs: &[] },
    InstrDescriptor { name: "binary", num_defs: 1, is_terminator: false, is_unconditional_branch: false, is_call: false, has_side_effects: false, implicit_defs: &[] },
    InstrDescriptor { name: "cmp", num_defs: 1, is_terminator: false, is_unconditional_branch: false, is_call: false, has_side_effects: false, implicit_defs: &[] },
    InstrDescriptor { name: "cast", num_defs: 1, is_terminator: false, is_unconditional_branch: false, is_call: false, has_side_effects: false, implicit_defs: &[] },
    InstrDescriptor { name: "load", num_defs: 1, is_terminator: false, is_unconditional_branch: false, is_call: false, has_side_effects: true, implicit_defs: &[] },
    InstrDescriptor { name: "store", num_defs: 0, is_terminator: false, is_unconditional_branch: false, is_call: false, has_side_effects: true, implicit_defs: &[] },
    InstrDescriptor { name: "call", num_defs: 1, is_terminator: false, is_unconditional_branch: false, is_call: true, has_side_effects: true, implicit_defs: CALL_CLOBBERS },
    InstrDescriptor { name: "jump", num_defs: 0, is_terminator: true, is_unconditional_branch: true, is_call: false, has_side_effects: false, implicit_defs: &[] },
    InstrDescriptor { name: "branch", num_defs: 0, is_terminator: true, is_unconditional_branch: false, is_call: false, has_side_effects: false, implicit_defs: &[] },
    InstrDescriptor { name: "copy", num_defs: 1, is_terminator: false, is_unconditional_branch: false, is_call: false, has_side_effects: false, implicit_defs: &[] },
    InstrDescriptor { name: "frame_addr", num_defs: 1, is_terminator: false, is_unconditional_branch: false, is_call: false, has_side_effects: false, implicit_defs: &[] },
    InstrDescriptor { name: "alloca_dynamic", num_defs: 1, is_terminator: false, is_unconditional_branch: false, is_call: false, has_side_effects: true, implicit_defs: &[] },
];

fn fold_memory_operand(_instr: &mut MachineInstr, _operand_index: usize, _slot: FrameIndex) -> bool {
    false
}

fn store_to_slot(value: Reg, _rc: RegClassIndex, slot: FrameIndex, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_STORE);
    instr.push_operand(Operand::FrameIndex(slot), OperandRole::Use);
    instr.push_operand(Operand::Reg(value), OperandRole::Use);
    out.push(instr);
}

fn load_from_slot(dest: Reg, _rc: RegClassIndex, slot: FrameIndex, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_LOAD);
    instr.push_operand(Operand::Reg(dest), OperandRole::Def);
    instr.push_operand(Operand::FrameIndex(slot), OperandRole::Use);
    out.push(instr);
}

fn copy(dst: Reg, src: Reg, _rc: RegClassIndex, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_COPY);
    instr.push_operand(Operand::Reg(dst), OperandRole::Def);
    instr.push_operand(Operand::Reg(src), OperandRole::Use);
    out.push(instr);
}

const INSTR_INFO: InstrInfo = InstrInfo {
    descriptors: DESCRIPTORS,
    fold_memory_operand,
    store_to_slot,
    load_from_slot,
    copy,
};

fn tile_binary(op: BinaryOp, dst: Reg, lhs: Reg, rhs: Reg, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_BINARY);
    instr.push_operand(Operand::Reg(dst), OperandRole::Def);
    instr.push_operand(Operand::Reg(lhs), OperandRole::Use);
    instr.push_operand(Operand::Reg(rhs), OperandRole::Use);
    let _ = op;
    out.push(instr);
}

fn tile_imm(dst: Reg, imm: i64, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_MOV_IMM);
    instr.push_operand(Operand::Reg(dst), OperandRole::Def);
    instr.push_operand(Operand::Imm(imm), OperandRole::Use);
    out.push(instr);
}

fn tile_int_compare(cc: IntCc, dst: Reg, lhs: Reg, rhs: Reg, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_CMP);
    instr.push_operand(Operand::Reg(dst), OperandRole::Def);
    instr.push_operand(Operand::Reg(lhs), OperandRole::Use);
    instr.push_operand(Operand::Reg(rhs), OperandRole::Use);
    let _ = cc;
    out.push(instr);
}

fn tile_float_compare(cc: FloatCc, dst: Reg, lhs: Reg, rhs: Reg, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_CMP);
    instr.push_operand(Operand::Reg(dst), OperandRole::Def);
    instr.push_operand(Operand::Reg(lhs), OperandRole::Use);
    instr.push_operand(Operand::Reg(rhs), OperandRole::Use);
    let _ = cc;
    out.push(instr);
}

fn tile_cast(kind: CastKind, dst: Reg, src: Reg, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_CAST);
    instr.push_operand(Operand::Reg(dst), OperandRole::Def);
    instr.push_operand(Operand::Reg(src), OperandRole::Use);
    let _ = kind;
    out.push(instr);
}

fn tile_load(dst: Reg, ptr: Reg, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_LOAD);
    instr.push_operand(Operand::Reg(dst), OperandRole::Def);
    instr.push_operand(Operand::Reg(ptr), OperandRole::Use);
    out.push(instr);
}

fn tile_store(ptr: Reg, value: Reg, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_STORE);
    instr.push_operand(Operand::Reg(ptr), OperandRole::Use);
    instr.push_operand(Operand::Reg(value), OperandRole::Use);
    out.push(instr);
}

fn tile_frame_addr(dst: Reg, slot: FrameIndex, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_FRAME_ADDR);
    instr.push_operand(Operand::Reg(dst), OperandRole::Def);
    instr.push_operand(Operand::FrameIndex(slot), OperandRole::Use);
    out.push(instr);
}

fn tile_alloca_dynamic(dst: Reg, count: Reg, elem_size: u32, align: u32, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_ALLOCA_DYNAMIC);
    instr.push_operand(Operand::Reg(dst), OperandRole::Def);
    instr.push_operand(Operand::Reg(count), OperandRole::Use);
    instr.push_operand(Operand::Imm(elem_size as i64), OperandRole::Use);
    let _ = align;
    out.push(instr);
}

fn tile_jump(dest: Block, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_JUMP);
    instr.push_operand(Operand::Block(dest), OperandRole::Use);
    out.push(instr);
}

fn tile_branch(cond: Reg, then_dest: Block, else_dest: Block, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_BRANCH);
    instr.push_operand(Operand::Reg(cond), OperandRole::Use);
    instr.push_operand(Operand::Block(then_dest), OperandRole::Use);
    instr.push_operand(Operand::Block(else_dest), OperandRole::Use);
    out.push(instr);
}

fn tile_ret(value: Option<Reg>, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_RET);
    if let Some(v) = value {
        instr.push_operand(Operand::Reg(v), OperandRole::Use);
    }
    out.push(instr);
}

fn tile_call(callee: &Callee, args: &[Reg], dst: Option<Reg>, out: &mut Vec<MachineInstr>) {
    let mut instr = MachineInstr::new(OP_CALL);
    if let Some(d) = dst {
        instr.push_operand(Operand::Reg(d), OperandRole::Def);
    }
    match callee {
        Callee::Direct(name) => instr.push_operand(Operand::ExternalSymbol(name.clone()), OperandRole::Use),
        Callee::Indirect(_) => {}
    }
    for &a in args {
        instr.push_operand(Operand::Reg(a), OperandRole::Use);
    }
    out.push(instr);
}

const TILE_INFO: TileInfo = TileInfo {
    binary: tile_binary,
    imm: tile_imm,
    int_compare: tile_int_compare,
    float_compare: tile_float_compare,
    cast: tile_cast,
    load: tile_load,
    store: tile_store,
    frame_addr: tile_frame_addr,
    alloca_dynamic: tile_alloca_dynamic,
    jump: tile_jump,
    branch: tile_branch,
    ret: tile_ret,
    call: tile_call,
};

/// A fixture `TargetIsa` implementation, built entirely from `const` data.
pub struct FixtureIsa {
    flags: Flags,
}

impl TargetIsa for FixtureIsa {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn flags(&self) -> &Flags {
        &self.flags
    }

    fn reg_info(&self) -> &RegInfo {
        &REG_INFO
    }

    fn instr_info(&self) -> &InstrInfo {
        &INSTR_INFO
    }

    fn tile_info(&self) -> &TileInfo {
        &TILE_INFO
    }

    fn calling_convention(&self) -> &CallingConvention {
        &CALLING_CONVENTION
    }

    fn regclass_for_type(&self, ty: &crate::ir::Type) -> crate::isa::registers::RegClass {
        if ty.is_float() {
            FPR_REF
        } else {
            GPR_REF
        }
    }
}

/// Construct a fresh fixture target with default flags.
pub fn fixture_isa() -> FixtureIsa {
    FixtureIsa { flags: Flags::default() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s0_and_d0_alias_each_other() {
        let isa = fixture_isa();
        let info = isa.reg_info();
        assert!(info.aliases(S0).contains(&D0));
        assert!(info.aliases(D0).contains(&S0));
        assert!(info.aliases(R0).is_empty());
    }

    #[test]
    fn float_type_picks_fpr_class() {
        let isa = fixture_isa();
        assert_eq!(isa.regclass_for_type(&crate::ir::Type::F64).index, FPR_INDEX);
        assert_eq!(isa.regclass_for_type(&crate::ir::Type::Pointer).index, GPR_INDEX);
    }
}
