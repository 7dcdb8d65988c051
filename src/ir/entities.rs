//! IR entity references.
//!
//! Instructions in the IR need to reference other parts of the function:
//! blocks, other instructions' results, and so on. Following the source's
//! convention (`cranelift-codegen/src/ir/entities.rs`), these are not Rust
//! references — they are `u32`-backed indices into tables owned by
//! [`crate::ir::Function`], giving each entity kind its own type so the
//! compiler catches cross-kind mixups.

use cranelift_entity::entity_impl;
use core::fmt;

/// A reference to a basic block in a function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// A reference to an SSA value (an instruction result or a block parameter).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(u32);
entity_impl!(Value, "v");

/// A reference to an instruction in a function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// A reference to any of the entities defined in this module, used to
/// attach a location to a diagnostic.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub enum AnyEntity {
    /// The whole function.
    Function,
    /// A basic block.
    Block(Block),
    /// An instruction.
    Inst(Inst),
    /// An SSA value.
    Value(Value),
}

impl fmt::Display for AnyEntity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AnyEntity::Function => write!(f, "function"),
            AnyEntity::Block(r) => r.fmt(f),
            AnyEntity::Inst(r) => r.fmt(f),
            AnyEntity::Value(r) => r.fmt(f),
        }
    }
}

impl From<Block> for AnyEntity {
    fn from(r: Block) -> Self {
        AnyEntity::Block(r)
    }
}

impl From<Inst> for AnyEntity {
    fn from(r: Inst) -> Self {
        AnyEntity::Inst(r)
    }
}

impl From<Value> for AnyEntity {
    fn from(r: Value) -> Self {
        AnyEntity::Value(r)
    }
}
