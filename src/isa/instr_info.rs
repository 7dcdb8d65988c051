//! Target instruction descriptors.
//!
//! Grounded on `cranelift-codegen/src/binemit/mod.rs` and
//! `cranelift-codegen/src/isa/mod.rs`'s `TargetIsa::encoding_info` style of
//! exposing per-opcode capability tables as plain data rather than a trait
//! object per instruction; the spill/reload helper function pointers follow
//! `original_source/lib/Target/PowerPC/PowerPCInstrInfo.cpp`'s
//! `foldMemoryOperand`/`storeRegToStackSlot`/`loadRegFromStackSlot`, which
//! the spill rewriter in `crate::spill` calls to synthesize reload and spill
//! instructions without selection needing to know their machine encoding.

use crate::isa::registers::{PhysReg, RegClassIndex};
use crate::machine_function::{MachineInstr, Operand};

/// Dense index naming one target opcode, assigned by the target description
/// (no relation to `ir::InstructionData`'s variants — this names a machine
/// instruction template after tiling, not the IR operator it was selected
/// from).
pub type Opcode = u16;

/// Static, per-opcode capability and shape description.
pub struct InstrDescriptor {
    /// Mnemonic, for diagnostics and `print_machineinstrs`.
    pub name: &'static str,
    /// Number of def operands this opcode produces.
    pub num_defs: u8,
    /// Does this opcode end a basic block?
    pub is_terminator: bool,
    /// Does this opcode transfer control unconditionally to a single
    /// successor (a `jump`, as opposed to a conditional `branch`)?
    pub is_unconditional_branch: bool,
    /// Does executing this opcode clobber the full register file (a call)?
    pub is_call: bool,
    /// Does this opcode have a side effect the scheduler/spiller must not
    /// reorder or elide (volatile load/store, call, intrinsic)?
    pub has_side_effects: bool,
    /// Physical registers this opcode defines beyond its explicit operand
    /// list, such as the caller-saved set a call instruction clobbers.
    /// Mirrors `TargetInstrDescriptor::ImplicitDefs` in
    /// `original_source/lib/Target/X86/Printer.cpp`, consulted the same way
    /// `VirtRegMap.cpp`'s `ClobberPhysReg` loop treats them as ordinary
    /// register defs.
    pub implicit_defs: &'static [PhysReg],
}

/// A reference to a statically-defined instruction descriptor.
pub type InstrDesc = &'static InstrDescriptor;

/// Rewrites a machine instruction's register operand at `operand_index` in
/// place to load from `slot` instead, returning `true` if the opcode
/// supports folding a memory operand directly (as opposed to requiring an
/// explicit reload instruction ahead of it). Mirrors
/// `TargetInstrInfo::foldMemoryOperand` in the source; the simple fixture
/// target never folds, so this always returns `false` there (see
/// `crate::fixture`).
pub type FoldMemoryOperandFn =
    fn(instr: &mut MachineInstr, operand_index: usize, slot: crate::machine_function::FrameIndex) -> bool;

/// Emits the instruction(s) that store `value` to stack slot `slot`,
/// appending them to `out`. `value` is a virtual register while the spiller
/// is regenerating narrow intervals for a just-spilled vreg (the iterative
/// restart), and a physical register once called from the final rewrite
/// after allocation has converged. Mirrors
/// `TargetInstrInfo::storeRegToStackSlot`.
pub type StoreToSlotFn = fn(
    value: crate::isa::registers::Reg,
    rc: RegClassIndex,
    slot: crate::machine_function::FrameIndex,
    out: &mut Vec<MachineInstr>,
);

/// Emits the instruction(s) that reload `dest` from stack slot `slot`,
/// appending them to `out`. See [`StoreToSlotFn`] for the virtual-vs-
/// physical distinction. Mirrors `TargetInstrInfo::loadRegFromStackSlot`.
pub type LoadFromSlotFn = fn(
    dest: crate::isa::registers::Reg,
    rc: RegClassIndex,
    slot: crate::machine_function::FrameIndex,
    out: &mut Vec<MachineInstr>,
);

/// Emits a register-to-register copy `dst <- src` of class `rc`, appending
/// it to `out`. Used by the spill rewriter to materialize reuse-undo
/// reloads and by the frame finalizer to shuffle incoming arguments.
pub type CopyFn =
    fn(dst: crate::isa::registers::Reg, src: crate::isa::registers::Reg, rc: RegClassIndex, out: &mut Vec<MachineInstr>);

/// Target-specific helpers the spiller and frame finalizer call to
/// synthesize instructions without depending on a concrete target crate.
pub struct InstrInfo {
    /// Per-opcode descriptors, indexed by `Opcode`.
    pub descriptors: &'static [InstrDescriptor],
    /// See [`FoldMemoryOperandFn`].
    pub fold_memory_operand: FoldMemoryOperandFn,
    /// See [`StoreToSlotFn`].
    pub store_to_slot: StoreToSlotFn,
    /// See [`LoadFromSlotFn`].
    pub load_from_slot: LoadFromSlotFn,
    /// See [`CopyFn`].
    pub copy: CopyFn,
}

impl InstrInfo {
    /// Descriptor for `opcode`.
    pub fn desc(&self, opcode: Opcode) -> InstrDesc {
        &self.descriptors[opcode as usize]
    }
}

/// True if `instr`'s opcode is a call, per its descriptor. Live interval
/// construction (`crate::live`) uses this to synthesize fixed intervals from
/// the call's `implicit_defs`, and to tag intervals live across the call
/// with `crosses_call` for diagnostics.
pub fn is_call(info: &InstrInfo, instr: &MachineInstr) -> bool {
    info.desc(instr.opcode).is_call
}

/// True if any operand of `instr` is a use of `reg` (virtual or physical,
/// per the unified id space).
pub fn reads_reg(instr: &MachineInstr, reg: crate::isa::registers::Reg) -> bool {
    instr.uses().any(|op| matches!(op, Operand::Reg(r) if *r == reg))
}
