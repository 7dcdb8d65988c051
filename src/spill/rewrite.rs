//! Final spill rewriting: substitute virtual registers with their assigned
//! physical registers, and clean up the redundant reloads and dead stores
//! that fall out of [`crate::spill::simple`]'s one-reload-per-use policy.
//!
//! Grounded on `original_source/lib/CodeGen/VirtRegMap.cpp`'s
//! `LocalSpiller::RewriteMBB`: a per-block pair of available-value maps
//! (`SpillSlotsAvailable`/`PhysRegsAvailable`) records which physical
//! register currently holds which stack slot's value, so a reload that
//! finds its slot already resident becomes a cheap register copy (or is
//! dropped entirely if the value is already in the right register), and
//! `MaybeDeadStores` records the last store to each slot so that a second
//! store before any intervening read elides the first as dead. Any
//! ordinary definition of a physical register invalidates both maps for
//! that register, mirroring `ClobberPhysReg`. This port simplifies one
//! corner of the source: the source additionally tracks a per-instruction
//! `ReusedOperands` list so that if a single instruction's *later* operand
//! needs a register a prior operand of the *same* instruction just reused,
//! the earlier reuse is undone and replayed as an explicit reload. Because
//! every reload or store here is always its own separate instruction
//! (never folded into another instruction's operand list), that
//! intra-instruction conflict cannot arise and the `ReusedOperands` undo
//! path is not needed.

use crate::isa::registers::{PhysReg, Reg};
use crate::isa::TargetIsa;
use crate::machine_function::{FrameIndex, MInst, MachineFunction, MachineInstr, Operand, OperandRole};
use crate::regalloc::Assignment;
use log::trace;
use std::collections::HashMap;

#[derive(Default)]
struct BlockState {
    slot_to_preg: HashMap<FrameIndex, PhysReg>,
    preg_to_slot: HashMap<PhysReg, FrameIndex>,
    maybe_dead_store: HashMap<FrameIndex, MInst>,
}

impl BlockState {
    /// Invalidate both maps for `preg`: it no longer reliably holds any
    /// slot's value. Mirrors `ClobberPhysReg`.
    fn clobber(&mut self, preg: PhysReg) {
        if let Some(slot) = self.preg_to_slot.remove(&preg) {
            self.slot_to_preg.remove(&slot);
        }
    }

    /// Record that `preg` now holds the value of `slot`.
    fn record(&mut self, slot: FrameIndex, preg: PhysReg) {
        if let Some(old_preg) = self.slot_to_preg.remove(&slot) {
            self.preg_to_slot.remove(&old_preg);
        }
        self.clobber(preg);
        self.slot_to_preg.insert(slot, preg);
        self.preg_to_slot.insert(preg, slot);
    }
}

/// Which operand of `instr` (if any) is a frame-slot access, and the role
/// it plays: exactly one register operand paired with exactly one frame
/// index operand is the structural signature `crate::spill::simple` always
/// emits.
fn slot_access(instr: &MachineInstr) -> Option<(usize, FrameIndex, OperandRole)> {
    let mut reg_pos = None;
    let mut slot = None;
    for (i, op) in instr.operands.iter().enumerate() {
        match op {
            Operand::Reg(_) => reg_pos = Some(i),
            Operand::FrameIndex(fi) => slot = Some(*fi),
            _ => {}
        }
    }
    match (reg_pos, slot) {
        (Some(i), Some(fi)) => Some((i, fi, instr.roles[i])),
        _ => None,
    }
}

/// Substitute every virtual register operand across `func` with its final
/// assigned physical register. No reload/store optimization; this is what
/// `settings::Spiller::Simple` selects.
pub fn substitute_only(func: &mut MachineFunction, isa: &dyn TargetIsa, assignment: &Assignment) {
    substitute(func, isa, assignment);
}

fn substitute(func: &mut MachineFunction, isa: &dyn TargetIsa, assignment: &Assignment) {
    let reg_info = isa.reg_info();
    let blocks: Vec<_> = func.blocks().collect();
    for &block in &blocks {
        for &inst in func.block_insts(block).to_vec().iter() {
            let data = func.inst_mut(inst);
            for (op, _role) in data.operands.iter_mut().zip(data.roles.iter()) {
                if let Operand::Reg(r) = op {
                    if reg_info.is_virtual(*r) {
                        if let Some(&phys) = assignment.regs.get(r) {
                            *op = Operand::Reg(Reg::from_phys(phys));
                        }
                    }
                }
            }
        }
    }
}

/// Substitute every virtual register operand across `func` with its final
/// assigned physical register, then walk each block eliding redundant
/// reloads and dead spill stores. This is `settings::Spiller::Local`.
pub fn rewrite(func: &mut MachineFunction, isa: &dyn TargetIsa, assignment: &Assignment) {
    let instr_info = isa.instr_info();
    substitute(func, isa, assignment);

    let blocks: Vec<_> = func.blocks().collect();
    let reg_info = isa.reg_info();
    for &block in &blocks {
        let mut state = BlockState::default();
        let insts = func.block_insts(block).to_vec();
        for inst in insts {
            let data = func.inst(inst).clone();
            if let Some((reg_idx, slot, role)) = slot_access(&data) {
                let preg = match data.operands[reg_idx] {
                    Operand::Reg(r) => r.as_phys(),
                    _ => unreachable!(),
                };
                match role {
                    OperandRole::Use => {
                        if state.slot_to_preg.get(&slot) == Some(&preg) {
                            trace!("eliding redundant reload of slot {:?} into same register", slot);
                            func.remove_inst(block, inst);
                        } else if let Some(&resident) = state.slot_to_preg.get(&slot) {
                            let rc = func
                                .frame
                                .object(slot)
                                .regclass
                                .expect("spill slots always carry their register class");
                            let mut copy = Vec::new();
                            (instr_info.copy)(Reg::from_phys(preg), Reg::from_phys(resident), rc, &mut copy);
                            replace_with(func, block, inst, copy);
                        }
                        state.maybe_dead_store.remove(&slot);
                        state.record(slot, preg);
                    }
                    OperandRole::Def | OperandRole::UseDef => {
                        if let Some(&prev) = state.maybe_dead_store.get(&slot) {
                            trace!("eliding dead store to slot {:?}, overwritten before read", slot);
                            func.remove_inst(block, prev);
                        }
                        state.record(slot, preg);
                        state.maybe_dead_store.insert(slot, inst);
                    }
                }
                continue;
            }

            for operand in data.defs() {
                if let Operand::Reg(r) = operand {
                    if reg_info.is_physical(*r) {
                        state.clobber(r.as_phys());
                    }
                }
            }
            if instr_info.desc(data.opcode).is_call {
                let cc = isa.calling_convention();
                for (p, _) in reg_info.registers.iter().enumerate() {
                    let p = p as PhysReg;
                    if !cc.is_callee_saved(p) {
                        state.clobber(p);
                    }
                }
            }
        }
    }
}

fn replace_with(func: &mut MachineFunction, block: crate::ir::Block, at: MInst, replacement: Vec<MachineInstr>) {
    func.insert_before(block, at, replacement);
    func.remove_inst(block, at);
}
