//! Frame finalization: callee-saved register spilling, stack layout, and
//! prolog/epilog insertion.
//!
//! A direct port of `original_source/lib/Target/PowerPC/PowerPCPEI.cpp`'s
//! `PPCPEI::runOnMachineFunction`, run as the last pass once register
//! allocation has converged and [`crate::spill::finalize`] has substituted
//! every operand to a physical register:
//!
//! 1. [`calculate_callee_saved`] scans every instruction for a def of a
//!    callee-saved physical register (the source's
//!    `calculateCallerSavedRegisters`, named for the *caller*'s
//!    perspective of who asked for them to be preserved, but scanning
//!    exactly the callee-saved set) and reserves one fixed stack slot per
//!    register actually modified, including through aliases.
//! 2. [`calculate_frame_object_offsets`] walks every `FrameObject` and
//!    assigns it a concrete stack offset, growing in the convention's
//!    stack direction, fixed objects (fixed offset from the frame pointer
//!    at entry) placed first.
//! 3. [`save_callee_saved`] inserts the actual store-at-entry and
//!    load-before-return instructions for the registers found in step 1.
//! 4. [`insert_prolog_epilog`] emits the stack pointer adjustment at
//!    function entry and its inverse before every return.
//! 5. [`lower_frame_indices`] rewrites every remaining `Operand::FrameIndex`
//!    into a `(base register, offset)` pair: the frame pointer plus the
//!    object's offset when a frame pointer is in use, otherwise the stack
//!    pointer plus the object's offset adjusted by the final frame size
//!    (the stack pointer sits `frame_size` bytes below where a frame
//!    pointer would have been, once the prolog's adjustment has run).
//!
//! After this pass, no `Operand::FrameIndex` may remain; replacing them
//! with real offsets is `crate::frame`'s responsibility alone, mirroring
//! the source's comment that "it is illegal to construct MO_FrameIndex
//! operands" once this pass has run.

use crate::isa::calling_convention::StackGrowth;
use crate::isa::registers::PhysReg;
use crate::isa::TargetIsa;
use crate::machine_function::{
    FrameObject, FrameObjectKind, MachineFunction, MachineInstr, Operand, OperandRole,
};
use crate::result::CodegenResult;
use crate::settings::Flags;
use log::debug;
use std::collections::HashMap;

/// Finalize `func`'s frame: save callee-saved registers, assign concrete
/// stack offsets, and insert prolog/epilog code.
pub fn finalize(func: &mut MachineFunction, isa: &dyn TargetIsa, flags: &Flags) -> CodegenResult<()> {
    func.frame.has_calls = instr_makes_call(func, isa);
    let regs_to_save = calculate_callee_saved(func, isa);
    let slots = reserve_callee_save_slots(func, isa, &regs_to_save);
    calculate_frame_object_offsets(func, isa);
    save_callee_saved(func, isa, &regs_to_save, &slots);
    insert_prolog_epilog(func, isa, flags);
    lower_frame_indices(func, isa, flags);
    Ok(())
}

/// Scan every instruction for a def of a callee-saved register (directly
/// or through an alias), returning the distinct set of callee-saved
/// registers that must be preserved.
fn calculate_callee_saved(func: &MachineFunction, isa: &dyn TargetIsa) -> Vec<PhysReg> {
    let reg_info = isa.reg_info();
    let cc = isa.calling_convention();
    let mut modified = vec![false; reg_info.registers.len()];

    for block in func.blocks() {
        for &inst in func.block_insts(block) {
            for operand in func.inst(inst).defs() {
                if let Operand::Reg(r) = operand {
                    if reg_info.is_physical(*r) {
                        modified[r.as_phys() as usize] = true;
                    }
                }
            }
        }
    }

    let mut to_save = Vec::new();
    for &reg in cc.callee_saved {
        let directly = modified[reg as usize];
        let via_alias = reg_info.aliases(reg).iter().any(|&a| modified[a as usize]);
        if directly || via_alias {
            to_save.push(reg);
        }
    }
    to_save
}

fn instr_makes_call(func: &MachineFunction, isa: &dyn TargetIsa) -> bool {
    let instr_info = isa.instr_info();
    func.blocks()
        .any(|b| func.block_insts(b).iter().any(|&i| instr_info.desc(func.inst(i).opcode).is_call))
}

/// Create one fixed-offset stack slot per register in `regs_to_save`, in
/// the same order, ready for [`save_callee_saved`] to store into and
/// reload from.
fn reserve_callee_save_slots(
    func: &mut MachineFunction,
    isa: &dyn TargetIsa,
    regs_to_save: &[PhysReg],
) -> HashMap<PhysReg, crate::machine_function::FrameIndex> {
    let cc = isa.calling_convention();
    let mut slots = HashMap::new();
    let mut offset: i32 = 0;
    for &reg in regs_to_save {
        let rc = class_of_phys(isa, reg);
        if Some(reg) == cc.link_register {
            let idx = func.frame.create_object(FrameObject {
                size: rc.spill_size,
                align: rc.spill_align,
                kind: FrameObjectKind::CalleeSave,
                is_fixed: true,
                fixed_offset: 8,
                regclass: Some(rc.index),
            });
            slots.insert(reg, idx);
            continue;
        }
        offset -= rc.spill_size as i32;
        let idx = func.frame.create_object(FrameObject {
            size: rc.spill_size,
            align: rc.spill_align,
            kind: FrameObjectKind::CalleeSave,
            is_fixed: true,
            fixed_offset: offset,
            regclass: Some(rc.index),
        });
        slots.insert(reg, idx);
    }
    slots
}

fn class_of_phys(isa: &dyn TargetIsa, reg: PhysReg) -> crate::isa::registers::RegClass {
    for rc in isa.reg_info().classes {
        if rc.registers.contains(&reg) {
            return rc;
        }
    }
    panic!("register {} not a member of any class", reg)
}

/// Insert the entry-block stores and per-return reloads for every
/// callee-saved register that needs preserving.
fn save_callee_saved(
    func: &mut MachineFunction,
    isa: &dyn TargetIsa,
    regs_to_save: &[PhysReg],
    slots: &HashMap<PhysReg, crate::machine_function::FrameIndex>,
) {
    if regs_to_save.is_empty() {
        return;
    }
    let instr_info = isa.instr_info();

    let entry = match func.blocks().next() {
        Some(b) => b,
        None => return,
    };
    let mut stores = Vec::new();
    for &reg in regs_to_save {
        let rc = class_of_phys(isa, reg).index;
        let slot = slots[&reg];
        (instr_info.store_to_slot)(crate::isa::registers::Reg::from_phys(reg), rc, slot, &mut stores);
    }
    if let Some(first) = func.block_insts(entry).first().copied() {
        func.insert_before(entry, first, stores);
    } else {
        func.append(entry, stores);
    }

    let blocks: Vec<_> = func.blocks().collect();
    for block in blocks {
        let is_return_block = func
            .block_insts(block)
            .last()
            .map(|&i| instr_info.desc(func.inst(i).opcode).is_terminator)
            .unwrap_or(false);
        if !is_return_block {
            continue;
        }
        let last = *func.block_insts(block).last().unwrap();
        let mut reloads = Vec::new();
        for &reg in regs_to_save.iter().rev() {
            let rc = class_of_phys(isa, reg).index;
            let slot = slots[&reg];
            (instr_info.load_from_slot)(crate::isa::registers::Reg::from_phys(reg), rc, slot, &mut reloads);
        }
        func.insert_before(block, last, reloads);
    }
}

/// Assign every frame object a concrete offset. Fixed objects keep the
/// offset they were created with; every other object is packed
/// sequentially in the stack's growth direction, then spill slots, then
/// reserved outgoing-argument space.
fn calculate_frame_object_offsets(func: &mut MachineFunction, isa: &dyn TargetIsa) {
    let cc = isa.calling_convention();
    let grows_down = cc.growth == StackGrowth::Down;

    let mut offset: i32 = 0;
    let indices: Vec<_> = func.frame.indices().collect();

    for idx in &indices {
        let is_fixed = func.frame.object(*idx).is_fixed;
        if is_fixed {
            continue;
        }
        let (size, align) = {
            let obj = func.frame.object(*idx);
            (obj.size, obj.align)
        };
        if grows_down {
            offset -= size as i32;
            offset = align_down(offset, align as i32);
        } else {
            offset = align_up(offset, align as i32);
        }
        func.frame.object_mut(*idx).fixed_offset = offset;
        if !grows_down {
            offset += size as i32;
        }
    }

    offset -= func.frame.max_outgoing_args as i32;
    func.frame.frame_size = round_up(offset.unsigned_abs(), cc.stack_alignment);
}

fn align_down(value: i32, align: i32) -> i32 {
    if align <= 1 {
        return value;
    }
    value - value.rem_euclid(align)
}

fn align_up(value: i32, align: i32) -> i32 {
    if align <= 1 {
        return value;
    }
    let rem = value.rem_euclid(align);
    if rem == 0 {
        value
    } else {
        value + (align - rem)
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    if align <= 1 {
        return value;
    }
    (value + align - 1) / align * align
}

/// Emit the stack pointer adjustment at function entry and its inverse
/// before every return, sized to the final frame.
fn insert_prolog_epilog(func: &mut MachineFunction, isa: &dyn TargetIsa, flags: &Flags) {
    let frame_size = func.frame.frame_size;
    if frame_size == 0 && !flags.disable_fp_elim {
        return;
    }
    debug!("{}: frame size {} bytes", func.name, frame_size);

    let entry = match func.blocks().next() {
        Some(b) => b,
        None => return,
    };
    let mut prolog: Vec<MachineInstr> = Vec::new();
    emit_stack_adjust(isa, -(frame_size as i64), &mut prolog);
    if let Some(first) = func.block_insts(entry).first().copied() {
        func.insert_before(entry, first, prolog);
    } else {
        func.append(entry, prolog);
    }

    let instr_info = isa.instr_info();
    let blocks: Vec<_> = func.blocks().collect();
    for block in blocks {
        let is_return = func
            .block_insts(block)
            .last()
            .map(|&i| instr_info.desc(func.inst(i).opcode).is_terminator)
            .unwrap_or(false);
        if !is_return {
            continue;
        }
        let last = *func.block_insts(block).last().unwrap();
        let mut epilog = Vec::new();
        emit_stack_adjust(isa, frame_size as i64, &mut epilog);
        func.insert_before(block, last, epilog);
    }
}

/// Adjust the stack pointer by `delta` bytes (negative grows the frame,
/// positive shrinks it back on the way out). Synthesized as a copy of `sp`
/// onto itself plus an extra immediate operand carrying the delta, which
/// the target's `copy` emitter recognizes as an in-place add when both
/// sides name the stack pointer — the same trick
/// `original_source/lib/Target/PowerPC/PowerPCRegisterInfo.cpp` uses its
/// `emitPrologue`/`emitEpilogue` `addi`/`addis` pair for.
fn emit_stack_adjust(isa: &dyn TargetIsa, delta: i64, out: &mut Vec<MachineInstr>) {
    let cc = isa.calling_convention();
    let instr_info = isa.instr_info();
    let sp = crate::isa::registers::Reg::from_phys(cc.stack_pointer);
    let rc = class_of_phys(isa, cc.stack_pointer).index;
    let mut synthesized = Vec::new();
    (instr_info.copy)(sp, sp, rc, &mut synthesized);
    if let Some(instr) = synthesized.last_mut() {
        instr.push_operand(Operand::Imm(delta), OperandRole::Use);
    }
    out.extend(synthesized);
}

/// Rewrite every `Operand::FrameIndex` left in `func` into a `(base
/// register, offset)` pair, the last step before a finalized function may
/// be handed to an encoder. A frame pointer is used as the base whenever
/// one is required to stay valid throughout the function (frame-pointer
/// elimination disabled, or a dynamically-sized `alloca` moves the stack
/// pointer at run time); otherwise the stack pointer is used, with its
/// offset adjusted by the frame size the prolog already subtracted from it.
fn lower_frame_indices(func: &mut MachineFunction, isa: &dyn TargetIsa, flags: &Flags) {
    let cc = isa.calling_convention();
    let use_frame_pointer = flags.disable_fp_elim || func.frame.has_var_size_alloca;
    let base = crate::isa::registers::Reg::from_phys(if use_frame_pointer {
        cc.frame_pointer
    } else {
        cc.stack_pointer
    });
    let stack_adjustment: i32 = if use_frame_pointer { 0 } else { func.frame.frame_size as i32 };

    let offsets: HashMap<crate::machine_function::FrameIndex, i32> = func
        .frame
        .indices()
        .map(|fi| (fi, func.frame.object(fi).fixed_offset + stack_adjustment))
        .collect();

    let blocks: Vec<_> = func.blocks().collect();
    for block in blocks {
        let insts = func.block_insts(block).to_vec();
        for inst in insts {
            let instr = func.inst_mut(inst);
            let mut i = 0;
            while i < instr.operands.len() {
                if let Operand::FrameIndex(fi) = instr.operands[i] {
                    let offset = offsets[&fi];
                    let role = instr.roles[i];
                    instr.operands[i] = Operand::Reg(base);
                    instr.operands.insert(i + 1, Operand::Imm(offset as i64));
                    instr.roles.insert(i + 1, role);
                    i += 2;
                } else {
                    i += 1;
                }
            }
        }
    }
}
