//! Calling-convention description: callee-saved registers, stack growth,
//! and frame alignment.
//!
//! Grounded on `original_source/lib/Target/PowerPC/PowerPCRegisterInfo.cpp`'s
//! `getCalleeSavedRegs` (a static, null-terminated list consulted by prolog
//! emission and frame layout) and its companion `hasFP`/frame-pointer-elim
//! logic, plus `original_source/lib/Target/X86/X86RegisterInfo.cpp` for the
//! alternative "stack grows down, frame pointer optional" shape. Kept as a
//! plain data table rather than a trait, matching how `RegInfo` is already
//! represented, since nothing here requires target-specific code, only
//! target-specific constants.

use crate::isa::registers::PhysReg;

/// Which direction the stack grows as the frame finalizer allocates new
/// slots. Every target this core has described so far grows down, but the
/// field exists because the source's frame layout arithmetic branches on
/// it explicitly rather than assuming one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackGrowth {
    /// Higher addresses are further from the current top of stack.
    Down,
    /// Lower addresses are further from the current top of stack.
    Up,
}

/// Target- and convention-specific constants consulted by frame finalization
/// and argument/return assignment during instruction selection.
pub struct CallingConvention {
    /// Name, for diagnostics.
    pub name: &'static str,
    /// Registers the callee must preserve across a call, in the order the
    /// prolog should save them and the epilog should restore them (reverse).
    pub callee_saved: &'static [PhysReg],
    /// Registers available to pass integer/pointer arguments, in order.
    pub int_arg_regs: &'static [PhysReg],
    /// Registers available to pass floating-point arguments, in order.
    pub float_arg_regs: &'static [PhysReg],
    /// Register that returns an integer/pointer result.
    pub int_return_reg: PhysReg,
    /// Register that returns a floating-point result.
    pub float_return_reg: PhysReg,
    /// Register used as a stack pointer.
    pub stack_pointer: PhysReg,
    /// Register used as a frame pointer, when one is materialized.
    pub frame_pointer: PhysReg,
    /// Register holding the return address on entry, if the target passes
    /// it in a register rather than pushing it (e.g. PowerPC's link
    /// register); `None` for targets like x86 where it's already on the
    /// stack at entry.
    pub link_register: Option<PhysReg>,
    /// Stack growth direction.
    pub growth: StackGrowth,
    /// Required alignment, in bytes, of the stack pointer at a `call`.
    pub stack_alignment: u32,
}

impl CallingConvention {
    /// Is `reg` callee-saved under this convention?
    pub fn is_callee_saved(&self, reg: PhysReg) -> bool {
        self.callee_saved.contains(&reg)
    }
}
