//! Spill code insertion and rewriting.
//!
//! [`simple`] regenerates narrow live intervals around each use or def of a
//! register the allocator chose to spill; it runs once per spilled
//! register, once per `crate::regalloc::allocate` iteration, regardless of
//! the configured rewriting policy — it is mandatory bookkeeping, not a
//! policy choice. [`rewrite`] does the final pass once allocation has
//! converged, substituting physical registers for virtual ones; whether it
//! also elides the redundant reloads and dead stores that policy leaves
//! behind is controlled by `settings::Spiller` (an "alternative
//! rewriting policy" — `Spiller::Simple` skips the optimization for a
//! faster, simpler compile; `Spiller::Local` is the faithful
//! `LocalSpiller` port). Both are grounded on
//! `original_source/lib/CodeGen/VirtRegMap.cpp`, which plays both roles in
//! the source.

pub mod rewrite;
pub mod simple;

use crate::isa::registers::Reg;
use crate::isa::TargetIsa;
use crate::machine_function::MachineFunction;
use crate::regalloc::Assignment;
use crate::result::CodegenResult;
use crate::settings::{Flags, Spiller};

/// Insert spill code for every register in `spilled`.
pub fn rewrite_spills(
    func: &mut MachineFunction,
    isa: &dyn TargetIsa,
    _flags: &Flags,
    spilled: &[Reg],
) -> CodegenResult<()> {
    for &reg in spilled {
        simple::insert_spill_code(func, isa, reg);
    }
    Ok(())
}

/// Final rewrite: substitute every virtual register with its assigned
/// physical register, optimizing away redundant reloads and dead spill
/// stores unless `flags` selects the simple policy.
pub fn finalize(func: &mut MachineFunction, isa: &dyn TargetIsa, flags: &Flags, assignment: &Assignment) {
    match flags.effective_spiller() {
        Spiller::Local => rewrite::rewrite(func, isa, assignment),
        Spiller::Simple => rewrite::substitute_only(func, isa, assignment),
    }
}
