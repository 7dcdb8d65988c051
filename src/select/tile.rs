//! Walks a legalized function and emits tiled machine instructions.
//!
//! Grounded on `original_source/lib/CodeGen/SelectionDAG/SelectionDAGISel.cpp`'s
//! `SelectionDAGLowering`: one `visitXxx` method per IR shape, consulting the
//! selection DAG's value map before lowering any operand so a value used
//! more than once is only materialized once, threading its chain through
//! side-effecting operations to keep their order, and treating `visitPHI`
//! as a no-op handled specially by a dedicated resolution step. This port
//! keeps that shape but collapses the DAG-build-then-tile two-pass
//! structure into one pass: each IR instruction is lowered straight to its
//! `MachineInstr` tile as it is visited, since the source's general
//! operator-DAG scheduling freedom is not needed once there is no
//! instruction scheduler to feed (`nosched` is always a no-op here).

use crate::ir::{BinaryOp, Block, Callee, Function, InstructionData, Intrinsic, Type, Value};
use crate::isa::registers::Reg;
use crate::isa::TargetIsa;
use crate::machine_function::{FrameObject, FrameObjectKind, MInst, MachineFunction, MachineInstr};
use crate::result::{CodegenError, CodegenResult};
use crate::select::dag::SelectDag;
use crate::select::legalize;
use std::collections::HashMap;

/// A literal machine PHI, materialized transiently during tiling and
/// resolved into end-of-predecessor-block copies before selection
/// returns. Kept as plain data, never inserted into the `MachineFunction`
/// as an instruction: this core never splits a block once it is selected,
/// so there is no later point at which "the predecessor's last machine
/// block" could differ from the predecessor already known here, making a
/// surviving pseudo-opcode unnecessary. `crate::spill` and `crate::regalloc`
/// therefore never see a PHI in any form, trivially satisfying the
/// requirement that spill rewriting must not observe one.
struct PhiNode {
    block: Block,
    dst: Reg,
    incoming: Vec<(Block, Value)>,
}

struct Selector<'a> {
    func: &'a Function,
    isa: &'a dyn TargetIsa,
    mfunc: MachineFunction,
    dag: SelectDag,
    alloca_slots: HashMap<Value, crate::machine_function::FrameIndex>,
    int_const_cache: HashMap<i64, Reg>,
    float_const_cache: HashMap<u64, Reg>,
    /// Literal value of every `IntConst`-producing value seen so far, kept
    /// function-wide (constants don't stop being constant at a block
    /// boundary) so `GetElementPtr` lowering can fold a constant index into
    /// the running offset instead of emitting a runtime add/multiply for it.
    value_consts: HashMap<Value, i64>,
    phis: Vec<PhiNode>,
}

/// Lower `func` into a machine function using `isa`'s register classes,
/// instruction descriptors, and tiling emitters.
pub fn select_function(func: &Function, isa: &dyn TargetIsa) -> CodegenResult<MachineFunction> {
    func.verify_terminators()
        .map_err(|b| CodegenError::Invariant(format!("block {} has no single terminator", b)))?;

    let mut sel = Selector {
        func,
        isa,
        mfunc: MachineFunction::new(func.name.clone()),
        dag: SelectDag::new(),
        alloca_slots: HashMap::new(),
        int_const_cache: HashMap::new(),
        float_const_cache: HashMap::new(),
        value_consts: HashMap::new(),
        phis: Vec::new(),
    };
    sel.bind_block_params();
    sel.bind_entry_args();
    for block in func.layout.blocks() {
        sel.select_block(block)?;
    }
    sel.resolve_phis()?;
    Ok(sel.mfunc)
}

impl<'a> Selector<'a> {
    fn rc_for(&self, v: Value) -> crate::isa::registers::RegClassIndex {
        self.isa.regclass_for_type(&self.func.dfg.value_type(v)).index
    }

    fn fresh(&mut self, ty: &Type) -> Reg {
        let rc = self.isa.regclass_for_type(ty).index;
        self.mfunc.vregs.create(self.isa.reg_info(), rc)
    }

    /// Append `out` to `block` and, if it produced a side-effecting
    /// instruction, thread the DAG's chain through its last instruction.
    fn emit(&mut self, block: Block, out: Vec<MachineInstr>, has_side_effects: bool) {
        if out.is_empty() {
            return;
        }
        self.mfunc.append(block, out);
        if has_side_effects {
            let last: MInst = *self.mfunc.block_insts(block).last().unwrap();
            self.dag.advance_chain(last);
        }
    }

    /// Bind every block's parameters to fresh virtual registers before any
    /// instruction is lowered, so a forward jump or a loop back-edge can
    /// always find the destination's parameter registers regardless of
    /// visitation order.
    fn bind_block_params(&mut self) {
        for block in self.func.layout.blocks() {
            for &param in self.func.dfg.block_params(block) {
                let ty = self.func.dfg.value_type(param);
                let reg = self.fresh(&ty);
                self.dag.bind(param, reg);
            }
        }
    }

    /// Place incoming arguments from the calling convention's argument
    /// registers (or incoming stack slots, past the register budget) into
    /// the entry block's parameter registers.
    fn bind_entry_args(&mut self) {
        let entry = match self.func.layout.blocks().next() {
            Some(b) => b,
            None => return,
        };
        let cc = self.isa.calling_convention();
        let instr_info = self.isa.instr_info();
        let params = self.func.dfg.block_params(entry).to_vec();
        let mut next_int = 0usize;
        let mut next_float = 0usize;
        let mut stack_offset: i32 = 0;
        let mut prologue = Vec::new();
        for param in params {
            let ty = self.func.dfg.value_type(param);
            let dst = self.dag.lookup(param).expect("block params are bound up front");
            let rc_idx = self.rc_for(param);
            if ty.is_float() {
                if next_float < cc.float_arg_regs.len() {
                    let src = Reg::from_phys(cc.float_arg_regs[next_float]);
                    next_float += 1;
                    (instr_info.copy)(dst, src, rc_idx, &mut prologue);
                    continue;
                }
            } else if next_int < cc.int_arg_regs.len() {
                let src = Reg::from_phys(cc.int_arg_regs[next_int]);
                next_int += 1;
                (instr_info.copy)(dst, src, rc_idx, &mut prologue);
                continue;
            }
            let rc = self.isa.regclass_for_type(&ty);
            let idx = self.mfunc.frame.create_object(FrameObject {
                size: ty.size_of(),
                align: ty.align_of(),
                kind: FrameObjectKind::FixedArg,
                is_fixed: true,
                fixed_offset: stack_offset,
                regclass: Some(rc.index),
            });
            stack_offset += ty.size_of() as i32;
            (instr_info.load_from_slot)(dst, rc_idx, idx, &mut prologue);
        }
        self.mfunc.ensure_block(entry);
        self.mfunc.append(entry, prologue);
    }

    fn select_block(&mut self, block: Block) -> CodegenResult<()> {
        self.mfunc.ensure_block(block);
        self.dag.start_block();
        self.int_const_cache.clear();
        self.float_const_cache.clear();
        let insts = self.func.layout.block_insts(block).to_vec();
        for inst in insts {
            self.select_inst(block, inst)?;
        }
        Ok(())
    }

    /// The register already holding `v`, lowering it lazily if it is a
    /// forward reference (only possible through a literal `phi`, since
    /// every other operand is defined earlier in this core's accepted IR).
    fn value_reg(&mut self, v: Value) -> Reg {
        if let Some(r) = self.dag.lookup(v) {
            return r;
        }
        let ty = self.func.dfg.value_type(v);
        let r = self.fresh(&ty);
        self.dag.bind(v, r);
        r
    }

    fn bind_result(&mut self, v: Value, reg: Reg) {
        self.dag.bind(v, reg);
    }

    fn select_inst(&mut self, block: Block, inst: crate::ir::Inst) -> CodegenResult<()> {
        let data = self.func.dfg.inst_data(inst).clone();
        let tile = self.isa.tile_info();
        match &data {
            InstructionData::Binary { op, args } => {
                let dst_val = self.func.dfg.first_result(inst);
                let ty = self.func.dfg.value_type(dst_val);
                let lhs = self.value_reg(args[0]);
                let rhs = self.value_reg(args[1]);
                let dst = self.dag.lookup(dst_val).unwrap_or_else(|| self.fresh(&ty));
                let mut out = Vec::new();
                (tile.binary)(*op, dst, lhs, rhs, &mut out);
                self.emit(block, out, false);
                self.bind_result(dst_val, dst);
            }
            InstructionData::IntCompare { cc, args } => {
                let dst_val = self.func.dfg.first_result(inst);
                let lhs = self.value_reg(args[0]);
                let rhs = self.value_reg(args[1]);
                let dst = self.fresh(&self.func.dfg.value_type(dst_val));
                let mut out = Vec::new();
                (tile.int_compare)(*cc, dst, lhs, rhs, &mut out);
                self.emit(block, out, false);
                self.bind_result(dst_val, dst);
            }
            InstructionData::FloatCompare { cc, args } => {
                let dst_val = self.func.dfg.first_result(inst);
                let lhs = self.value_reg(args[0]);
                let rhs = self.value_reg(args[1]);
                let dst = self.fresh(&self.func.dfg.value_type(dst_val));
                let mut out = Vec::new();
                (tile.float_compare)(*cc, dst, lhs, rhs, &mut out);
                self.emit(block, out, false);
                self.bind_result(dst_val, dst);
            }
            InstructionData::Cast { kind, arg } => {
                let dst_val = self.func.dfg.first_result(inst);
                let from = self.func.dfg.value_type(*arg);
                let to = self.func.dfg.value_type(dst_val);
                legalize::check_cast_legal(self.isa, &from, &to)?;
                let src = self.value_reg(*arg);
                let dst = self.fresh(&to);
                let mut out = Vec::new();
                (tile.cast)(*kind, dst, src, &mut out);
                self.emit(block, out, false);
                self.bind_result(dst_val, dst);
            }
            InstructionData::IntConst(c) => {
                let dst_val = self.func.dfg.first_result(inst);
                let reg = if let Some(&r) = self.int_const_cache.get(c) {
                    r
                } else {
                    let r = self.fresh(&self.func.dfg.value_type(dst_val));
                    let mut out = Vec::new();
                    (tile.imm)(r, *c, &mut out);
                    self.emit(block, out, false);
                    self.int_const_cache.insert(*c, r);
                    r
                };
                self.value_consts.insert(dst_val, *c);
                self.bind_result(dst_val, reg);
            }
            InstructionData::FloatConst(bits) => {
                let dst_val = self.func.dfg.first_result(inst);
                let reg = if let Some(&r) = self.float_const_cache.get(bits) {
                    r
                } else {
                    let r = self.fresh(&self.func.dfg.value_type(dst_val));
                    let mut out = Vec::new();
                    (tile.imm)(r, *bits as i64, &mut out);
                    self.emit(block, out, false);
                    self.float_const_cache.insert(*bits, r);
                    r
                };
                self.bind_result(dst_val, reg);
            }
            InstructionData::GetElementPtr { base, indices } => {
                let dst_val = self.func.dfg.first_result(inst);
                let mut acc = self.value_reg(*base);
                let steps = legalize::plan_getelementptr(indices, |v| self.value_consts.get(&v).copied());
                // Only runtime indices actually referenced by an `AddScaledIndex`
                // step need a register; constant ones were folded into an offset.
                let operand_regs: Vec<Option<Reg>> = indices
                    .iter()
                    .map(|(v, _)| {
                        if self.value_consts.contains_key(v) {
                            None
                        } else {
                            Some(self.value_reg(*v))
                        }
                    })
                    .collect();
                let ptr_ty = Type::Pointer;
                let mut out = Vec::new();
                for step in steps {
                    match step {
                        legalize::GepStep::AddConstOffset(0) => {}
                        legalize::GepStep::AddConstOffset(off) => {
                            let imm = self.fresh(&ptr_ty);
                            (tile.imm)(imm, off, &mut out);
                            let next = self.fresh(&ptr_ty);
                            (tile.binary)(BinaryOp::Iadd, next, acc, imm, &mut out);
                            acc = next;
                        }
                        legalize::GepStep::AddScaledIndex { operand, elem_size } => {
                            let idx_reg = operand_regs[operand].expect("non-constant index must have a register");
                            let scale = self.fresh(&ptr_ty);
                            (tile.imm)(scale, elem_size as i64, &mut out);
                            let scaled = self.fresh(&ptr_ty);
                            (tile.binary)(BinaryOp::Imul, scaled, idx_reg, scale, &mut out);
                            let next = self.fresh(&ptr_ty);
                            (tile.binary)(BinaryOp::Iadd, next, acc, scaled, &mut out);
                            acc = next;
                        }
                    }
                }
                self.emit(block, out, false);
                self.bind_result(dst_val, acc);
            }
            InstructionData::Load { ty: _, ptr } => {
                let dst_val = self.func.dfg.first_result(inst);
                let ptr_reg = self.value_reg(*ptr);
                let dst = self.fresh(&self.func.dfg.value_type(dst_val));
                let mut out = Vec::new();
                (tile.load)(dst, ptr_reg, &mut out);
                self.emit(block, out, true);
                self.bind_result(dst_val, dst);
            }
            InstructionData::Store { ptr, value } => {
                let ptr_reg = self.value_reg(*ptr);
                let val_reg = self.value_reg(*value);
                let mut out = Vec::new();
                (tile.store)(ptr_reg, val_reg, &mut out);
                self.emit(block, out, true);
            }
            InstructionData::AllocaFixed { size, align } => {
                let dst_val = self.func.dfg.first_result(inst);
                let idx = self.mfunc.frame.create_object(FrameObject {
                    size: *size,
                    align: *align,
                    kind: FrameObjectKind::Alloca,
                    is_fixed: false,
                    fixed_offset: 0,
                    regclass: None,
                });
                self.alloca_slots.insert(dst_val, idx);
                let dst = self.fresh(&Type::Pointer);
                let mut out = Vec::new();
                (tile.frame_addr)(dst, idx, &mut out);
                self.emit(block, out, false);
                self.bind_result(dst_val, dst);
            }
            InstructionData::AllocaDynamic {
                count,
                elem_size,
                align,
            } => {
                let dst_val = self.func.dfg.first_result(inst);
                self.mfunc.frame.has_var_size_alloca = true;
                let count_reg = self.value_reg(*count);
                let dst = self.fresh(&Type::Pointer);
                let mut out = Vec::new();
                (tile.alloca_dynamic)(dst, count_reg, *elem_size, *align, &mut out);
                self.emit(block, out, true);
                self.bind_result(dst_val, dst);
            }
            InstructionData::Malloc { size } => {
                let dst_val = self.func.dfg.first_result(inst);
                let size_reg = self.value_reg(*size);
                let dst = self.fresh(&Type::Pointer);
                let mut out = Vec::new();
                (tile.call)(
                    &Callee::Direct(legalize::malloc_symbol().to_string()),
                    &[size_reg],
                    Some(dst),
                    &mut out,
                );
                self.emit(block, out, true);
                self.bind_result(dst_val, dst);
            }
            InstructionData::Free { ptr } => {
                let ptr_reg = self.value_reg(*ptr);
                let mut out = Vec::new();
                (tile.call)(&Callee::Direct(legalize::free_symbol().to_string()), &[ptr_reg], None, &mut out);
                self.emit(block, out, true);
            }
            InstructionData::Call { callee, args, ret_ty } => {
                let arg_regs: Vec<Reg> = args.iter().map(|&v| self.value_reg(v)).collect();
                let lowered_callee = match callee {
                    Callee::Indirect(v) => {
                        self.value_reg(*v);
                        Callee::Indirect(*v)
                    }
                    Callee::Direct(name) => Callee::Direct(name.clone()),
                };
                let dst = ret_ty.as_ref().map(|ty| {
                    let v = self.func.dfg.first_result(inst);
                    let r = self.fresh(ty);
                    self.dag.bind(v, r);
                    r
                });
                let mut out = Vec::new();
                (tile.call)(&lowered_callee, &arg_regs, dst, &mut out);
                self.emit(block, out, true);
            }
            InstructionData::Return(values) => {
                let reg = values.first().map(|&v| self.value_reg(v));
                let mut out = Vec::new();
                (tile.ret)(reg, &mut out);
                self.emit(block, out, false);
            }
            InstructionData::Jump { dest, args } => {
                self.pass_block_args(block, *dest, args);
                let mut out = Vec::new();
                (tile.jump)(*dest, &mut out);
                self.emit(block, out, false);
                self.mfunc.add_successor(block, *dest);
            }
            InstructionData::Branch {
                cond,
                then_dest,
                then_args,
                else_dest,
                else_args,
            } => {
                self.pass_block_args(block, *then_dest, then_args);
                self.pass_block_args(block, *else_dest, else_args);
                let cond_reg = self.value_reg(*cond);
                let mut out = Vec::new();
                (tile.branch)(cond_reg, *then_dest, *else_dest, &mut out);
                self.emit(block, out, false);
                self.mfunc.add_successor(block, *then_dest);
                self.mfunc.add_successor(block, *else_dest);
            }
            InstructionData::Unreachable => {}
            InstructionData::Phi(incoming) => {
                let dst_val = self.func.dfg.first_result(inst);
                let dst = self.dag.lookup(dst_val).unwrap_or_else(|| {
                    let ty = self.func.dfg.value_type(dst_val);
                    self.fresh(&ty)
                });
                self.bind_result(dst_val, dst);
                self.phis.push(PhiNode {
                    block,
                    dst,
                    incoming: incoming.clone(),
                });
            }
            InstructionData::IntrinsicCall { intrinsic, args } => {
                self.select_intrinsic(block, inst, *intrinsic, args)?;
            }
        }
        Ok(())
    }

    fn select_intrinsic(&mut self, block: Block, inst: crate::ir::Inst, intrinsic: Intrinsic, args: &[Value]) -> CodegenResult<()> {
        let tile = self.isa.tile_info();
        let (symbol, has_result) = legalize::intrinsic_libcall(intrinsic);
        let arg_regs: Vec<Reg> = args.iter().map(|&v| self.value_reg(v)).collect();
        let dst = if has_result && !self.func.dfg.inst_results(inst).is_empty() {
            let v = self.func.dfg.first_result(inst);
            let ty = self.func.dfg.value_type(v);
            let r = self.fresh(&ty);
            self.bind_result(v, r);
            Some(r)
        } else {
            None
        };
        let mut out = Vec::new();
        (tile.call)(&Callee::Direct(symbol.to_string()), &arg_regs, dst, &mut out);
        self.emit(block, out, true);
        Ok(())
    }

    /// Emit the copies that carry `args` into `dest`'s already-bound
    /// parameter registers, from the end of `from`.
    fn pass_block_args(&mut self, from: Block, dest: Block, args: &[Value]) {
        let params = self.func.dfg.block_params(dest).to_vec();
        debug_assert_eq!(params.len(), args.len());
        let instr_info = self.isa.instr_info();
        let mut out = Vec::new();
        for (param, &arg) in params.iter().zip(args.iter()) {
            let dst = self.dag.lookup(*param).expect("block params are bound up front");
            let src = self.value_reg(arg);
            if dst == src {
                continue;
            }
            let rc = self.rc_for(*param);
            (instr_info.copy)(dst, src, rc, &mut out);
        }
        self.mfunc.append(from, out);
    }

    /// Resolve every literal `phi` recorded during tiling into a copy
    /// appended at the end of each predecessor block, just before its
    /// terminator. This is the "rewriter lowers PHIs to copies on
    /// incoming edges" behavior, performed immediately after selection
    /// rather than deferred to a later pass, since no later pass in this
    /// core ever splits a block.
    fn resolve_phis(&mut self) -> CodegenResult<()> {
        let instr_info = self.isa.instr_info();
        let phis = std::mem::take(&mut self.phis);
        for phi in phis {
            if phi.incoming.is_empty() {
                return Err(CodegenError::Invariant(format!(
                    "phi in block {} has no incoming values",
                    phi.block
                )));
            }
            let rc = self.isa.regclass_for_type(&self.func.dfg.value_type(phi.incoming[0].1));
            for (pred, value) in &phi.incoming {
                let src = self.value_reg(*value);
                if src == phi.dst {
                    continue;
                }
                let mut out = Vec::new();
                (instr_info.copy)(phi.dst, src, rc.index, &mut out);
                let insts = self.mfunc.block_insts(*pred);
                if let Some(&term) = insts.last() {
                    self.mfunc.insert_before(*pred, term, out);
                } else {
                    self.mfunc.append(*pred, out);
                }
            }
        }
        Ok(())
    }
}
