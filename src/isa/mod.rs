//! Instruction Set Architectures.
//!
//! The `isa` module provides a `TargetIsa` trait which supplies the
//! target-specific behavior needed by the ISA-independent passes in
//! [`crate::select`], [`crate::regalloc`], [`crate::spill`] and
//! [`crate::frame`]: register classes and aliasing, instruction
//! descriptors, and the active calling convention. A target is a value
//! implementing this trait plus the static tables it closes over; there is
//! no target registry or dynamic lookup-by-triple here, since target
//! descriptions are data this core's caller supplies directly rather than a
//! set of built-in backends it selects among.
//!
//! [`crate::fixture`] provides a small, fully worked `TargetIsa`
//! implementation used by this crate's own tests.

pub mod calling_convention;
pub mod instr_info;
pub mod registers;
pub mod tile_info;

pub use calling_convention::CallingConvention;
pub use instr_info::{InstrInfo, Opcode};
pub use registers::{PhysReg, Reg, RegClass, RegClassIndex, RegInfo};
pub use tile_info::TileInfo;

use crate::settings::Flags;

/// A fully-described target: register file, instruction capabilities, and
/// calling convention, plus the shared compilation [`Flags`].
///
/// Grounded on `cranelift-codegen/src/isa/mod.rs`'s `TargetIsa` trait, pared
/// down to the facts the passes in this core actually consult. The
/// source's encoding/recipe selection, unwind-info emission and multi-target
/// `Builder`/`lookup()` registry are out of scope (encoding to
/// final bytes).
pub trait TargetIsa {
    /// Name of this target, for diagnostics.
    fn name(&self) -> &'static str;

    /// Shared compilation flags in effect.
    fn flags(&self) -> &Flags;

    /// Register file and class description.
    fn reg_info(&self) -> &RegInfo;

    /// Instruction descriptor table and spill/reload/copy emitters.
    fn instr_info(&self) -> &InstrInfo;

    /// Per-IR-operation tiling emitters consulted by instruction selection.
    fn tile_info(&self) -> &TileInfo;

    /// The calling convention in effect for this compilation.
    fn calling_convention(&self) -> &CallingConvention;

    /// Register classes eligible to hold a value of `ty`, most to least
    /// preferred. Used by instruction selection to pick the class
    /// each newly created virtual register is tagged with.
    fn regclass_for_type(&self, ty: &crate::ir::Type) -> RegClass;
}
