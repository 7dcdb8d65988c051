//! Error types for the code generation core.
//!
//! The taxonomy follows the error handling design: input errors (malformed
//! or unsupported IR), target-description defects (fatal, compiler-internal),
//! resource exhaustion, and invariant violations (assertions meant to catch
//! compiler defects rather than user mistakes).

use crate::ir::entities::AnyEntity;
use failure_derive::Fail;

/// A compilation error produced by any pass in the pipeline.
#[derive(Fail, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    /// The IR contains a construct this core does not know how to select,
    /// legalize, or lower. Carries the offending entity for diagnostics.
    #[fail(display = "unsupported construct at {}: {}", at, message)]
    Unsupported {
        /// The IR entity (instruction, value, block) that triggered the error.
        at: AnyEntity,
        /// Human-readable description of the unsupported construct.
        message: String,
    },

    /// A target description is internally inconsistent: a register class
    /// with fewer registers than some simultaneous live set requires, an
    /// unreachable opcode reached during selection, or the allocator made no
    /// progress after unbounded iteration. Always a defect in the target
    /// description or in this core, never a user error.
    #[fail(display = "target description defect: {}", _0)]
    TargetDefect(String),

    /// Stack frame or register allocation state overflowed a representable
    /// bound (e.g. a frame size or spill slot count exceeding `i64`/`u32`
    /// range).
    #[fail(display = "resource exhausted: {}", _0)]
    ResourceExhaustion(String),

    /// An internal invariant was violated: inconsistent bidirectional maps,
    /// a numbering mismatch, an operand that was never assigned. These are
    /// assertions meant to catch defects in this core itself.
    #[fail(display = "internal invariant violated: {}", _0)]
    Invariant(String),
}

/// The result type threaded through every pass.
pub type CodegenResult<T> = Result<T, CodegenError>;
