//! Live-interval-based register allocation.
//!
//! This module contains the iterative-scan allocator
//! ([`linear_scan`]) and the physical register availability tracker it
//! relies on ([`tracker`]). [`allocate`] drives the outer loop described in
//! `original_source/lib/CodeGen/RegAllocIterativeScan.cpp`'s
//! `runOnMachineFunction`: run one linear-scan pass; if it produced no
//! spills, assignment is done; otherwise hand the spilled virtual
//! registers to [`crate::spill`] to materialize stack slots and rewrite
//! the function, then rebuild live intervals over the rewritten function
//! and scan again. Each iteration permanently removes the spilled
//! registers from contention (they no longer exist as long-lived virtuals
//! after rewriting), so the loop terminates.

pub mod linear_scan;
pub mod tracker;

pub use linear_scan::LinearScanResult;
pub use tracker::PhysRegTracker;

use crate::isa::TargetIsa;
use crate::machine_function::MachineFunction;
use crate::result::CodegenResult;
use crate::settings::Flags;
use log::debug;
use std::collections::HashMap;

use crate::isa::registers::{PhysReg, Reg};

/// Final register assignment for every virtual register in a function.
pub struct Assignment {
    /// Physical register chosen for each virtual register.
    pub regs: HashMap<Reg, PhysReg>,
}

/// Allocate registers for `func`, spilling and rewriting as many times as
/// needed, and return the final assignment plus the (possibly rewritten)
/// function.
pub fn allocate(
    func: &mut MachineFunction,
    isa: &dyn TargetIsa,
    flags: &Flags,
) -> CodegenResult<Assignment> {
    let mut iteration = 0;
    loop {
        iteration += 1;
        let intervals = crate::live::build_intervals(func, isa);
        debug!(
            "regalloc iteration {}: {} virtual intervals, {} slots",
            iteration,
            intervals.virtuals.len(),
            intervals.num_slots
        );

        let result = linear_scan::linear_scan(
            isa.reg_info(),
            &func.vregs,
            intervals.virtuals,
            intervals.fixed,
        );

        if result.spilled.is_empty() {
            if flags.print_machineinstrs {
                debug!(
                    "{}: register allocation converged after {} iteration(s)",
                    func.name, iteration
                );
            }
            return Ok(Assignment {
                regs: result.assignments,
            });
        }

        debug!(
            "regalloc iteration {}: spilling {} virtual register(s)",
            iteration,
            result.spilled.len()
        );
        crate::spill::rewrite_spills(func, isa, flags, &result.spilled)?;
    }
}
