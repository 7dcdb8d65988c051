//! End-to-end lowering scenarios, each driven through the full
//! `Pipeline::compile` over the fixture target: selection, live interval
//! analysis, iterative-spill register allocation, spill rewriting, and
//! frame finalization.

use mc_codegen::fixture;
use mc_codegen::ir::{
    BinaryOp, Callee, Function, InstructionData, IntCc, Signature, Type,
};
use mc_codegen::isa::TargetIsa;
use mc_codegen::machine_function::Operand;
use mc_codegen::settings::Flags;
use mc_codegen::Pipeline;

fn i64_ty() -> Type {
    Type::Int(mc_codegen::ir::IntWidth::I64)
}

fn i1_ty() -> Type {
    Type::Int(mc_codegen::ir::IntWidth::I1)
}

/// `fn straight_line(a, b) -> i64 { return a + b; }`
#[test]
fn straight_line_add() {
    let mut func = Function::new("straight_line", Signature::default());
    let entry = func.make_block();
    let a = func.dfg.append_block_param(entry, i64_ty());
    let b = func.dfg.append_block_param(entry, i64_ty());
    let (add, results) = func.emit(
        entry,
        InstructionData::Binary {
            op: BinaryOp::Iadd,
            args: [a, b],
        },
        &[i64_ty()],
    );
    let sum = results[0];
    func.emit(entry, InstructionData::Return(vec![sum]), &[]);
    let _ = add;

    let isa = fixture::fixture_isa();
    let mfunc = Pipeline::new()
        .compile(&isa, &func, &Flags::default())
        .expect("straight-line add should lower cleanly");

    let reg_info = isa.reg_info();
    for block in mfunc.blocks() {
        for &inst in mfunc.block_insts(block) {
            for operand in mfunc.inst(inst).operands.iter() {
                if let Operand::Reg(r) = operand {
                    assert!(reg_info.is_physical(*r), "every register must be assigned after allocation");
                }
            }
        }
    }
}

/// A loop with an induction variable: the back-edge value is carried
/// through a `phi`, so its live interval must cross the back-edge slot.
#[test]
fn loop_with_induction_variable() {
    let mut func = Function::new("loop_iv", Signature::default());
    let entry = func.make_block();
    let header = func.make_block();
    let body = func.make_block();
    let exit = func.make_block();

    let n = func.dfg.append_block_param(entry, i64_ty());
    func.emit(
        entry,
        InstructionData::Jump {
            dest: header,
            args: vec![n],
        },
        &[],
    );

    let limit = func.dfg.append_block_param(header, i64_ty());
    let (phi_inst, phi_results) = func.emit(header, InstructionData::Phi(vec![]), &[i64_ty()]);
    let iv = phi_results[0];
    let (_, cmp_results) = func.emit(
        header,
        InstructionData::IntCompare {
            cc: IntCc::SignedGt,
            args: [iv, limit],
        },
        &[i1_ty()],
    );
    let cond = cmp_results[0];
    func.emit(
        header,
        InstructionData::Branch {
            cond,
            then_dest: exit,
            then_args: vec![],
            else_dest: body,
            else_args: vec![],
        },
        &[],
    );

    let (_, one_results) = func.emit(body, InstructionData::IntConst(1), &[i64_ty()]);
    let one = one_results[0];
    let (_, next_results) = func.emit(
        body,
        InstructionData::Binary {
            op: BinaryOp::Iadd,
            args: [iv, one],
        },
        &[i64_ty()],
    );
    let next = next_results[0];
    func.emit(
        body,
        InstructionData::Jump {
            dest: header,
            args: vec![limit],
        },
        &[],
    );
    // Patch the header's phi with its two incoming edges now that both
    // predecessors (entry and body) are known.
    func.dfg.replace_inst(
        phi_inst,
        InstructionData::Phi(vec![(entry, n), (body, next)]),
    );

    func.emit(exit, InstructionData::Return(vec![iv]), &[]);

    let isa = fixture::fixture_isa();
    let mfunc = Pipeline::new()
        .compile(&isa, &func, &Flags::default())
        .expect("loop with induction variable should lower cleanly");
    assert!(mfunc.blocks().count() >= 4);
}

/// More live values at once than the fixture's 4 allocatable GPRs, forcing
/// at least one spill.
#[test]
fn high_register_pressure_forces_a_spill() {
    let mut func = Function::new("pressure", Signature::default());
    let entry = func.make_block();
    let mut values = Vec::new();
    for i in 0..8 {
        let (_, r) = func.emit(entry, InstructionData::IntConst(i), &[i64_ty()]);
        values.push(r[0]);
    }
    let mut acc = values[0];
    for &v in &values[1..] {
        let (_, r) = func.emit(
            entry,
            InstructionData::Binary {
                op: BinaryOp::Iadd,
                args: [acc, v],
            },
            &[i64_ty()],
        );
        acc = r[0];
    }
    func.emit(entry, InstructionData::Return(vec![acc]), &[]);

    let isa = fixture::fixture_isa();
    let mfunc = Pipeline::new()
        .compile(&isa, &func, &Flags::default())
        .expect("high pressure function should still lower, via spilling");

    let reg_info = isa.reg_info();
    for block in mfunc.blocks() {
        for &inst in mfunc.block_insts(block) {
            for operand in mfunc.inst(inst).operands.iter() {
                if let Operand::Reg(r) = operand {
                    assert!(reg_info.is_physical(*r));
                }
            }
        }
    }
}

/// A value kept live across two uses that alias each other at the register
/// level (`s0`/`d0`), so the spill-weight/spill-candidate search must
/// account for both.
#[test]
fn aliased_registers_are_considered_together() {
    let mut func = Function::new("aliased", Signature::default());
    let entry = func.make_block();
    let x = func.dfg.append_block_param(entry, Type::F64);
    let y = func.dfg.append_block_param(entry, Type::F64);
    let (_, sum) = func.emit(
        entry,
        InstructionData::Binary {
            op: BinaryOp::Fadd,
            args: [x, y],
        },
        &[Type::F64],
    );
    let (_, doubled) = func.emit(
        entry,
        InstructionData::Binary {
            op: BinaryOp::Fadd,
            args: [sum[0], sum[0]],
        },
        &[Type::F64],
    );
    func.emit(entry, InstructionData::Return(vec![doubled[0]]), &[]);

    let isa = fixture::fixture_isa();
    let mfunc = Pipeline::new()
        .compile(&isa, &func, &Flags::default())
        .expect("aliased-register function should lower cleanly");
    assert!(mfunc.blocks().count() >= 1);
}

/// A value held live across a call: with only two callee-saved registers
/// and two call-clobbered ones in the fixture, a value that must survive
/// the call can end up with spill code placed around it.
#[test]
fn call_clobbered_temporaries_survive_the_call() {
    let mut func = Function::new("call_survivor", Signature::default());
    let entry = func.make_block();
    let a = func.dfg.append_block_param(entry, i64_ty());
    let (_, call_results) = func.emit(
        entry,
        InstructionData::Call {
            callee: Callee::Direct("helper".to_string()),
            args: vec![a],
            ret_ty: Some(i64_ty()),
        },
        &[i64_ty()],
    );
    let called = call_results[0];
    let (_, sum) = func.emit(
        entry,
        InstructionData::Binary {
            op: BinaryOp::Iadd,
            args: [a, called],
        },
        &[i64_ty()],
    );
    func.emit(entry, InstructionData::Return(vec![sum[0]]), &[]);

    let isa = fixture::fixture_isa();
    let mfunc = Pipeline::new()
        .compile(&isa, &func, &Flags::default())
        .expect("call-crossing value should lower cleanly");

    let instr_info = isa.instr_info();
    let has_call = mfunc
        .blocks()
        .flat_map(|b| mfunc.block_insts(b).to_vec())
        .any(|i| instr_info.desc(mfunc.inst(i).opcode).is_call);
    assert!(has_call, "the call itself must survive selection");
}

/// A dynamically-sized `alloca` forces a frame pointer: the frame's
/// `has_var_size_alloca` flag must end up set.
#[test]
fn dynamic_alloca_forces_a_frame_pointer() {
    let mut func = Function::new("dyn_alloca", Signature::default());
    let entry = func.make_block();
    let count = func.dfg.append_block_param(entry, i64_ty());
    let (_, ptr) = func.emit(
        entry,
        InstructionData::AllocaDynamic {
            count,
            elem_size: 8,
            align: 8,
        },
        &[Type::Pointer],
    );
    let (_, loaded) = func.emit(
        entry,
        InstructionData::Load {
            ty: i64_ty(),
            ptr: ptr[0],
        },
        &[i64_ty()],
    );
    func.emit(entry, InstructionData::Return(vec![loaded[0]]), &[]);

    let isa = fixture::fixture_isa();
    let mfunc = Pipeline::new()
        .compile(&isa, &func, &Flags::default())
        .expect("dynamic alloca should lower cleanly");
    assert!(mfunc.frame.has_var_size_alloca);
}
