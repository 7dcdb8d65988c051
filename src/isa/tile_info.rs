//! Per-IR-operation instruction emission, supplied by the target.
//!
//! Where [`crate::isa::instr_info`] exposes spill/reload/copy emitters so
//! the allocator and spiller never need to know a target's encoding, this
//! module exposes the analogous emitters for instruction *selection*: one
//! function pointer per shape of IR operation, each responsible for
//! picking the concrete opcode(s) that implement it and appending the
//! resulting `MachineInstr`s. This is the "tiling" half of instruction
//! selection; the capability-table shape is a record of function tables,
//! in place of a virtual `XXXISelLowering` hierarchy.

use crate::ir::{BinaryOp, Callee, CastKind, FloatCc, IntCc};
use crate::isa::registers::Reg;
use crate::machine_function::{FrameIndex, MachineInstr};

/// Emits `dst = lhs op rhs`.
pub type BinaryFn = fn(op: BinaryOp, dst: Reg, lhs: Reg, rhs: Reg, out: &mut Vec<MachineInstr>);

/// Emits the instruction(s) materializing constant `imm` into `dst`.
pub type ImmFn = fn(dst: Reg, imm: i64, out: &mut Vec<MachineInstr>);

/// Emits `dst = (lhs cc rhs)` as a 0/1 integer result.
pub type IntCompareFn = fn(cc: IntCc, dst: Reg, lhs: Reg, rhs: Reg, out: &mut Vec<MachineInstr>);

/// Emits `dst = (lhs cc rhs)` as a 0/1 float comparison result.
pub type FloatCompareFn = fn(cc: FloatCc, dst: Reg, lhs: Reg, rhs: Reg, out: &mut Vec<MachineInstr>);

/// Emits a conversion `dst = cast(src)` of the given kind.
pub type CastFn = fn(kind: CastKind, dst: Reg, src: Reg, out: &mut Vec<MachineInstr>);

/// Emits a load of `dst` from the address held in `ptr`.
pub type LoadFn = fn(dst: Reg, ptr: Reg, out: &mut Vec<MachineInstr>);

/// Emits a store of `value` to the address held in `ptr`.
pub type StoreFn = fn(ptr: Reg, value: Reg, out: &mut Vec<MachineInstr>);

/// Emits `dst = &slot`, the address of a fixed-size stack object.
pub type FrameAddrFn = fn(dst: Reg, slot: FrameIndex, out: &mut Vec<MachineInstr>);

/// Emits a stack-pointer adjustment reserving `count * elem_size` bytes
/// (rounded up to `align`) and returns the base address in `dst`. Used for
/// dynamically-sized `alloca`.
pub type AllocaDynamicFn = fn(dst: Reg, count: Reg, elem_size: u32, align: u32, out: &mut Vec<MachineInstr>);

/// Emits an unconditional jump to `dest`.
pub type JumpFn = fn(dest: crate::ir::Block, out: &mut Vec<MachineInstr>);

/// Emits a two-way conditional branch on `cond`.
pub type BranchFn =
    fn(cond: Reg, then_dest: crate::ir::Block, else_dest: crate::ir::Block, out: &mut Vec<MachineInstr>);

/// Emits a return, optionally carrying `value` in the calling convention's
/// return register.
pub type ReturnFn = fn(value: Option<Reg>, out: &mut Vec<MachineInstr>);

/// Emits a direct or indirect call, placing `args` per the calling
/// convention and writing the result (if any) into `dst`.
pub type CallFn = fn(callee: &Callee, args: &[Reg], dst: Option<Reg>, out: &mut Vec<MachineInstr>);

/// One emitter per IR operation shape `crate::select::tile` lowers.
pub struct TileInfo {
    /// See [`BinaryFn`].
    pub binary: BinaryFn,
    /// See [`ImmFn`].
    pub imm: ImmFn,
    /// See [`IntCompareFn`].
    pub int_compare: IntCompareFn,
    /// See [`FloatCompareFn`].
    pub float_compare: FloatCompareFn,
    /// See [`CastFn`].
    pub cast: CastFn,
    /// See [`LoadFn`].
    pub load: LoadFn,
    /// See [`StoreFn`].
    pub store: StoreFn,
    /// See [`FrameAddrFn`].
    pub frame_addr: FrameAddrFn,
    /// See [`AllocaDynamicFn`].
    pub alloca_dynamic: AllocaDynamicFn,
    /// See [`JumpFn`].
    pub jump: JumpFn,
    /// See [`BranchFn`].
    pub branch: BranchFn,
    /// See [`ReturnFn`].
    pub ret: ReturnFn,
    /// See [`CallFn`].
    pub call: CallFn,
}
