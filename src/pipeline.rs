//! The driver tying selection, allocation, and frame finalization together.
//!
//! Grounded on `cranelift-codegen/src/context.rs`'s `Context`: a struct that
//! owns a function's compilation state and exposes one method running every
//! pass in order, so a caller never has to remember the sequence or thread
//! intermediate results by hand. Unlike that source (which reuses one
//! `Context` across many functions to amortize allocations), `Pipeline` here
//! holds no per-function state between calls — `compile` is the pure
//! function over `(ir::Function, TargetIsa, Flags)` the Design Notes call
//! for, so nothing needs to be reset between runs and two `Pipeline`s never
//! share mutable state.

use crate::ir::Function;
use crate::isa::TargetIsa;
use crate::machine_function::MachineFunction;
use crate::result::CodegenResult;
use crate::settings::Flags;
use log::debug;

/// Runs the full lowering pipeline: selection, live interval analysis,
/// register allocation with iterative spilling, spill rewriting, and frame
/// finalization.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pipeline;

impl Pipeline {
    /// Create a pipeline. `Pipeline` holds no state, so this is equivalent
    /// to `Pipeline` the unit struct; it exists so call sites read
    /// `Pipeline::new().compile(...)` the way `Context::new()` does.
    pub fn new() -> Self {
        Pipeline
    }

    /// Lower `func` into a machine function for `isa`, honoring `flags`.
    /// Runs, in order: instruction selection, live interval analysis,
    /// register allocation (iterating internally until no spills remain),
    /// the spill rewriter selected by `flags.effective_spiller()`, and
    /// frame finalization.
    pub fn compile(&self, isa: &dyn TargetIsa, func: &Function, flags: &Flags) -> CodegenResult<MachineFunction> {
        debug!("{}: selecting instructions", func.name);
        let mut mfunc = crate::select::select_function(func, isa)?;

        debug!("{}: allocating registers", mfunc.name);
        let assignment = crate::regalloc::allocate(&mut mfunc, isa, flags)?;

        debug!("{}: rewriting spills and substituting assignment", mfunc.name);
        crate::spill::finalize(&mut mfunc, isa, flags, &assignment);

        debug!("{}: finalizing frame", mfunc.name);
        crate::frame::finalize(&mut mfunc, isa, flags)?;

        if flags.print_machineinstrs {
            debug!("{}: final machine function has {} block(s)", mfunc.name, mfunc.blocks().count());
        }

        Ok(mfunc)
    }
}
