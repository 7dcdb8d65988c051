//! The typed, SSA intermediate representation consumed by instruction
//! selection.
//!
//! Producing this IR (parsing, loop analysis, induction-variable
//! simplification, constant merging) is explicitly out of scope for this
//! core; this module models only the shapes the selector must read.

pub mod entities;
pub mod function;
pub mod instructions;
pub mod types;

pub use entities::{AnyEntity, Block, Inst, Value};
pub use function::{DataFlowGraph, Function, Layout, Signature, ValueDef};
pub use instructions::{BinaryOp, Callee, CastKind, FloatCc, InstructionData, Intrinsic, IntCc};
pub use types::{IntWidth, Type};
