//! The post-selection machine-level function: tiled instructions over
//! virtual and physical registers, plus frame layout.
//!
//! Grounded on `cranelift-codegen/src/ir/function.rs`'s
//! `DataFlowGraph`/`Layout` split (see `crate::ir::function`) for the entity
//! registry shape, carried forward one level down: where the IR layer
//! indexes `Value`/`Inst` by `PrimaryMap`/`SecondaryMap`, this layer indexes
//! `MachineInstr` the same way, now keyed on registers instead of SSA
//! values. `FrameObject`'s fields follow
//! `original_source/include/llvm/CodeGen/MachineFrameInfo.h`'s per-object
//! bookkeeping (fixed vs. frame-relative offset, and the
//! `HasCalls`/`MaxCallFrameSize`/`HasVarSizedObjects` summary flags that
//! `PowerPCPEI.cpp`'s prolog emission reads) directly, since no cranelift
//! module in the pack models a stack frame at this granularity.

use crate::ir::Block;
use crate::isa::registers::Reg;
use cranelift_entity::{entity_impl, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

/// Identifies one machine instruction within a [`MachineFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MInst(u32);
entity_impl!(MInst, "minst");

/// Identifies a stack frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameIndex(u32);
entity_impl!(FrameIndex, "fi");

/// One operand of a machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A register use or def, virtual or physical, in the unified id space.
    Reg(Reg),
    /// An immediate constant.
    Imm(i64),
    /// A reference to a stack frame slot, resolved to a real offset only
    /// during frame finalization.
    FrameIndex(FrameIndex),
    /// A statically-known data or function symbol.
    Global(String),
    /// An external symbol resolved at link time.
    ExternalSymbol(String),
    /// A branch target.
    Block(Block),
}

/// Whether an operand position is read, written, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRole {
    /// The instruction reads this operand's current value.
    Use,
    /// The instruction overwrites this operand with a new value.
    Def,
    /// The instruction both reads and overwrites this operand (e.g. a
    /// two-address `add dst, dst, src` tile).
    UseDef,
}

/// One tiled machine instruction: an opcode plus its operands and their
/// roles.
#[derive(Debug, Clone)]
pub struct MachineInstr {
    /// Target-specific opcode naming this instruction's shape and encoding
    /// capabilities (see [`crate::isa::instr_info`]).
    pub opcode: crate::isa::instr_info::Opcode,
    /// Operands, in target-defined order.
    pub operands: SmallVec<[Operand; 4]>,
    /// Role of each entry in `operands`, parallel to it.
    pub roles: SmallVec<[OperandRole; 4]>,
}

impl MachineInstr {
    /// Create an instruction with no operands yet; callers push operands
    /// and matching roles together.
    pub fn new(opcode: crate::isa::instr_info::Opcode) -> Self {
        MachineInstr {
            opcode,
            operands: SmallVec::new(),
            roles: SmallVec::new(),
        }
    }

    /// Append one operand with its role.
    pub fn push_operand(&mut self, operand: Operand, role: OperandRole) {
        self.operands.push(operand);
        self.roles.push(role);
    }

    /// Operands this instruction reads (`Use` and `UseDef`).
    pub fn uses(&self) -> impl Iterator<Item = &Operand> {
        self.operands
            .iter()
            .zip(self.roles.iter())
            .filter(|(_, r)| matches!(r, OperandRole::Use | OperandRole::UseDef))
            .map(|(o, _)| o)
    }

    /// Operands this instruction writes (`Def` and `UseDef`).
    pub fn defs(&self) -> impl Iterator<Item = &Operand> {
        self.operands
            .iter()
            .zip(self.roles.iter())
            .filter(|(_, r)| matches!(r, OperandRole::Def | OperandRole::UseDef))
            .map(|(o, _)| o)
    }

    /// Mutable access to the defined operands, for the register allocator
    /// and spill rewriter to substitute assigned physical registers in
    /// place.
    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.operands.iter_mut()
    }
}

/// One basic block of machine instructions.
#[derive(Default, Clone)]
pub struct MachineBasicBlock {
    /// Instructions in this block, in emission order.
    pub insts: Vec<MInst>,
    /// Successor blocks, in the order a conditional branch's descriptors
    /// name them (fall-through last, by convention).
    pub successors: SmallVec<[Block; 2]>,
}

/// Why a frame object was created; the finalizer reads this to decide
/// placement order and whether it needs zero-initialization bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameObjectKind {
    /// A spill slot synthesized by the register allocator.
    Spill,
    /// A fixed-size `alloca` from the source function.
    Alloca,
    /// An incoming argument passed on the stack.
    FixedArg,
    /// Reserved outgoing argument space for the largest call this function
    /// makes.
    OutgoingArgs,
    /// Saved callee-saved register slot.
    CalleeSave,
}

/// One stack frame object: a spill slot, a source-level `alloca`, an
/// incoming stack argument, or reserved outgoing-argument space.
#[derive(Debug, Clone)]
pub struct FrameObject {
    /// Size in bytes.
    pub size: u32,
    /// Required alignment in bytes.
    pub align: u32,
    /// What this object is for.
    pub kind: FrameObjectKind,
    /// `true` if this object's offset is fixed relative to the incoming
    /// frame pointer at entry (e.g. an incoming stack argument), rather
    /// than assigned by the finalizer's layout pass.
    pub is_fixed: bool,
    /// Offset, meaningful only when `is_fixed`; otherwise filled in by
    /// [`crate::frame`] during layout.
    pub fixed_offset: i32,
    /// Register class this slot was sized for, when it's a spill slot.
    /// Lets the final spill rewrite pick the right copy/load/store
    /// encoding without re-deriving it from a bare register number.
    pub regclass: Option<crate::isa::registers::RegClassIndex>,
}

/// Per-function frame summary and object list.
///
/// Grounded on `original_source/include/llvm/CodeGen/MachineFrameInfo.h`:
/// the three summary flags below are read directly by
/// `original_source/lib/Target/PowerPC/PowerPCPEI.cpp`'s prolog emission to
/// decide whether a frame pointer is mandatory and how large the initial
/// stack adjustment must be.
#[derive(Default)]
pub struct FrameInfo {
    objects: PrimaryMap<FrameIndex, FrameObject>,
    /// Does this function contain a call? A leaf function can skip saving
    /// the link register on targets that pass the return address in one.
    pub has_calls: bool,
    /// Largest outgoing argument area required by any call in this
    /// function, reserved once rather than per call site.
    pub max_outgoing_args: u32,
    /// Does this function contain a dynamically-sized `alloca`? If so the
    /// frame pointer cannot be eliminated, since the stack pointer's offset
    /// from local objects is no longer a compile-time constant.
    pub has_var_size_alloca: bool,
    /// Total frame size in bytes, filled in by [`crate::frame`] once every
    /// object has an assigned offset.
    pub frame_size: u32,
    /// Stack slot reserved for each virtual register the allocator decided
    /// to spill, assigned once and reused across every iteration of
    /// `crate::regalloc::allocate`'s restart loop.
    spill_slots: std::collections::HashMap<Reg, FrameIndex>,
}

impl FrameInfo {
    /// Create an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new frame object and return its index. Dynamically-sized
    /// allocas are not represented here; they are summarized instead by
    /// `FrameInfo::has_var_size_alloca`.
    pub fn create_object(&mut self, object: FrameObject) -> FrameIndex {
        self.objects.push(object)
    }

    /// The object at `index`.
    pub fn object(&self, index: FrameIndex) -> &FrameObject {
        &self.objects[index]
    }

    /// Mutable access to the object at `index`, for the finalizer to write
    /// its assigned offset.
    pub fn object_mut(&mut self, index: FrameIndex) -> &mut FrameObject {
        &mut self.objects[index]
    }

    /// The stack slot reserved for spilling `reg`, creating one sized for
    /// `rc` the first time `reg` is spilled.
    pub fn spill_slot_for(&mut self, reg: Reg, rc: crate::isa::registers::RegClass) -> FrameIndex {
        if let Some(&idx) = self.spill_slots.get(&reg) {
            return idx;
        }
        let idx = self.create_object(FrameObject {
            size: rc.spill_size,
            align: rc.spill_align,
            kind: FrameObjectKind::Spill,
            is_fixed: false,
            fixed_offset: 0,
            regclass: Some(rc.index),
        });
        self.spill_slots.insert(reg, idx);
        idx
    }

    /// All frame indices, in creation order.
    pub fn indices(&self) -> impl Iterator<Item = FrameIndex> + '_ {
        self.objects.keys()
    }
}

/// A whole function at the machine-instruction level: the unit the
/// register allocator, spiller, and frame finalizer operate on.
pub struct MachineFunction {
    /// Name, carried from the source IR function for diagnostics.
    pub name: String,
    insts: PrimaryMap<MInst, MachineInstr>,
    blocks: SecondaryMap<Block, MachineBasicBlock>,
    block_order: Vec<Block>,
    /// Virtual register bookkeeping (class tags, creation order). See
    /// [`crate::vreg`].
    pub vregs: crate::vreg::VirtRegs,
    /// Stack frame objects and summary flags.
    pub frame: FrameInfo,
}

impl MachineFunction {
    /// Create an empty machine function ready to receive selected
    /// instructions for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        MachineFunction {
            name: name.into(),
            insts: PrimaryMap::new(),
            blocks: SecondaryMap::new(),
            block_order: Vec::new(),
            vregs: crate::vreg::VirtRegs::new(),
            frame: FrameInfo::new(),
        }
    }

    /// Register `block` as present, in layout order, the first time it is
    /// seen.
    pub fn ensure_block(&mut self, block: Block) {
        if self.blocks[block].insts.is_empty() && !self.block_order.contains(&block) {
            self.block_order.push(block);
        }
    }

    /// Append `instr` to the end of `block`, returning its index.
    pub fn push_inst(&mut self, block: Block, instr: MachineInstr) -> MInst {
        self.ensure_block(block);
        let idx = self.insts.push(instr);
        self.blocks[block].insts.push(idx);
        idx
    }

    /// Record `succ` as a successor of `block`.
    pub fn add_successor(&mut self, block: Block, succ: Block) {
        self.blocks[block].successors.push(succ);
    }

    /// The instruction data at `idx`.
    pub fn inst(&self, idx: MInst) -> &MachineInstr {
        &self.insts[idx]
    }

    /// Mutable access to the instruction data at `idx`, for the allocator
    /// and spiller to rewrite operands in place.
    pub fn inst_mut(&mut self, idx: MInst) -> &mut MachineInstr {
        &mut self.insts[idx]
    }

    /// Blocks in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.block_order.iter().copied()
    }

    /// Instructions of `block`, in order.
    pub fn block_insts(&self, block: Block) -> &[MInst] {
        &self.blocks[block].insts
    }

    /// Successors of `block`.
    pub fn successors(&self, block: Block) -> &[Block] {
        &self.blocks[block].successors
    }

    /// Remove `inst` from `block`'s order. The instruction's data stays in
    /// the entity map (never reused, never revisited) so existing `MInst`
    /// handles elsewhere stay valid; it simply stops being reachable. Used
    /// by the final spill rewrite to elide dead stores and redundant
    /// reloads.
    pub fn remove_inst(&mut self, block: Block, inst: MInst) {
        self.blocks[block].insts.retain(|&i| i != inst);
    }

    /// Insert `instrs` immediately before `before` in `block`'s order (and
    /// the function's global instruction indices are simply appended,
    /// since `MInst` identity, not position, is what downstream passes
    /// key on). Used by the spill rewriter to splice in reload/spill
    /// instructions.
    pub fn insert_before(&mut self, block: Block, before: MInst, instrs: Vec<MachineInstr>) {
        let block_insts = &mut self.blocks[block].insts;
        let pos = block_insts
            .iter()
            .position(|&i| i == before)
            .expect("before must be in block");
        let new_indices: Vec<MInst> = instrs.into_iter().map(|i| self.insts.push(i)).collect();
        for (offset, idx) in new_indices.into_iter().enumerate() {
            block_insts.insert(pos + offset, idx);
        }
    }

    /// Append `instrs` to the end of `block`. Used by the spill rewriter to
    /// place a store immediately after a definition, and by the frame
    /// finalizer to append epilog code.
    pub fn append(&mut self, block: Block, instrs: Vec<MachineInstr>) {
        for i in instrs {
            self.push_inst(block, i);
        }
    }

    /// Insert `instrs` immediately after `after` in `block`'s order.
    pub fn insert_after(&mut self, block: Block, after: MInst, instrs: Vec<MachineInstr>) {
        let block_insts = &mut self.blocks[block].insts;
        let pos = block_insts
            .iter()
            .position(|&i| i == after)
            .expect("after must be in block");
        let new_indices: Vec<MInst> = instrs.into_iter().map(|i| self.insts.push(i)).collect();
        for (offset, idx) in new_indices.into_iter().enumerate() {
            block_insts.insert(pos + 1 + offset, idx);
        }
    }
}
