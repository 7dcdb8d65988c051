//! Narrow-interval spill code insertion.
//!
//! Grounded on `original_source/lib/CodeGen/RegAllocIterativeScan.cpp`'s
//! `addIntervalsForSpills`: once a virtual register is chosen for spilling,
//! its long interval is replaced with a family of short, single-point
//! intervals, one per use or def, each backed by a fresh virtual register
//! reloaded from (or stored to) its stack slot immediately around that use
//! or def. Those new narrow intervals compete for registers in the next
//! `linear_scan` pass exactly like any other virtual register — if one of
//! them spills again, this function runs again on it next iteration. Every
//! spill permanently retires the original long interval, so the outer loop
//! in `crate::regalloc::allocate` always terminates.

use crate::isa::registers::Reg;
use crate::isa::TargetIsa;
use crate::machine_function::{MachineFunction, MachineInstr, Operand, OperandRole};
use crate::vreg::VirtRegs;

/// Replace every use and def of `reg` in `func` with a fresh narrow virtual
/// register, reloaded/stored around each occurrence.
pub fn insert_spill_code(func: &mut MachineFunction, isa: &dyn TargetIsa, reg: Reg) {
    let reg_info = isa.reg_info();
    let instr_info = isa.instr_info();
    let rc_index = func.vregs.class_of(reg_info, reg);
    let rc = reg_info.rc(rc_index);
    let slot = func.frame.spill_slot_for(reg, rc);

    let blocks: Vec<_> = func.blocks().collect();
    for block in blocks {
        let insts = func.block_insts(block).to_vec();
        for inst in insts {
            let occurrence = find_occurrence(func, inst, reg);
            let Some((operand_index, role)) = occurrence else {
                continue;
            };

            let fresh = func.vregs.create(reg_info, rc_index);
            set_operand_reg(func, inst, operand_index, fresh);

            match role {
                OperandRole::Use => {
                    let mut pre = Vec::new();
                    (instr_info.load_from_slot)(fresh, rc_index, slot, &mut pre);
                    func.insert_before(block, inst, pre);
                }
                OperandRole::Def => {
                    let mut post = Vec::new();
                    (instr_info.store_to_slot)(fresh, rc_index, slot, &mut post);
                    func.insert_after(block, inst, post);
                }
                OperandRole::UseDef => {
                    let mut pre = Vec::new();
                    (instr_info.load_from_slot)(fresh, rc_index, slot, &mut pre);
                    func.insert_before(block, inst, pre);
                    let mut post = Vec::new();
                    (instr_info.store_to_slot)(fresh, rc_index, slot, &mut post);
                    func.insert_after(block, inst, post);
                }
            }
        }
    }
}

fn find_occurrence(
    func: &MachineFunction,
    inst: crate::machine_function::MInst,
    reg: Reg,
) -> Option<(usize, OperandRole)> {
    let data = func.inst(inst);
    for (i, (operand, role)) in data.operands.iter().zip(data.roles.iter()).enumerate() {
        if let Operand::Reg(r) = operand {
            if *r == reg {
                return Some((i, *role));
            }
        }
    }
    None
}

fn set_operand_reg(func: &mut MachineFunction, inst: crate::machine_function::MInst, index: usize, reg: Reg) {
    let data = func.inst_mut(inst);
    data.operands[index] = Operand::Reg(reg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;

    #[test]
    fn spilling_replaces_operand_and_brackets_use() {
        let isa = fixture::fixture_isa();
        let mut func = MachineFunction::new("t");
        let block = crate::ir::Block::new(0);
        let rc = fixture::GPR_INDEX;
        let v = func.vregs.create(isa.reg_info(), rc);

        let mut def_inst = MachineInstr::new(fixture::OP_MOV_IMM);
        def_inst.push_operand(Operand::Reg(v), OperandRole::Def);
        def_inst.push_operand(Operand::Imm(7), OperandRole::Use);
        let def_idx = func.push_inst(block, def_inst);

        let mut use_inst = MachineInstr::new(fixture::OP_RET);
        use_inst.push_operand(Operand::Reg(v), OperandRole::Use);
        func.push_inst(block, use_inst);

        insert_spill_code(&mut func, &isa, v);

        let insts = func.block_insts(block).to_vec();
        assert!(insts.len() > 2);
        let def_still_there = insts.iter().any(|&i| i == def_idx);
        assert!(def_still_there);
        for i in &insts {
            for op in func.inst(*i).operands.iter() {
                if let Operand::Reg(r) = op {
                    assert_ne!(*r, v, "original spilled vreg must not remain in any operand");
                }
            }
        }
    }
}
