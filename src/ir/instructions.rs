//! The instruction set accepted from upstream IR.
//!
//! This is the external interface: a typed SSA program with
//! binary arithmetic, bitwise, shift and comparison operators, casts,
//! `GetElementPtr`, memory operations, calls, control flow, `phi`, and a
//! small set of intrinsics. Building this IR (parsing, optimizing) is out of
//! scope for this core; only the shapes the selector must consume are
//! modeled here.

use crate::ir::entities::{Block, Value};
use crate::ir::types::Type;

/// Signed/unsigned integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntCc {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Signed less than.
    SignedLt,
    /// Signed less than or equal.
    SignedLe,
    /// Signed greater than.
    SignedGt,
    /// Signed greater than or equal.
    SignedGe,
    /// Unsigned less than.
    UnsignedLt,
    /// Unsigned less than or equal.
    UnsignedLe,
    /// Unsigned greater than.
    UnsignedGt,
    /// Unsigned greater than or equal.
    UnsignedGe,
}

/// Floating-point comparison predicates (all ordered; `is_unordered`
/// surfaces as a distinct intrinsic rather than a predicate variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatCc {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

/// Binary integer/float arithmetic and bitwise opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Integer addition.
    Iadd,
    /// Integer subtraction.
    Isub,
    /// Integer multiplication.
    Imul,
    /// Signed division.
    Sdiv,
    /// Unsigned division.
    Udiv,
    /// Signed remainder.
    Srem,
    /// Unsigned remainder.
    Urem,
    /// Bitwise and.
    Band,
    /// Bitwise or.
    Bor,
    /// Bitwise xor.
    Bxor,
    /// Logical left shift.
    Ishl,
    /// Logical right shift.
    Ushr,
    /// Arithmetic right shift.
    Sshr,
    /// Float addition.
    Fadd,
    /// Float subtraction.
    Fsub,
    /// Float multiplication.
    Fmul,
    /// Float division.
    Fdiv,
}

impl BinaryOp {
    /// Is this a floating-point operator?
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::Fadd | BinaryOp::Fsub | BinaryOp::Fmul | BinaryOp::Fdiv
        )
    }
}

/// Value-conversion kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    /// Narrow an integer, discarding high bits.
    Truncate,
    /// Widen an integer, filling high bits with zero.
    ZeroExtend,
    /// Widen an integer, filling high bits by sign replication.
    SignExtend,
    /// Narrow a float (f64 -> f32).
    FpRound,
    /// Widen a float (f32 -> f64).
    FpExtend,
    /// Convert float to integer (truncating toward zero).
    FpToInt,
    /// Convert integer to float.
    IntToFp,
    /// Reinterpret the bits of a value as another same-size type.
    Bitcast,
}

/// How a direct call identifies its callee.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Callee {
    /// A statically-known external symbol.
    Direct(String),
    /// An SSA value holding the callee's address.
    Indirect(Value),
}

/// A single memory-affecting or control-affecting intrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    /// Marks the start of a varargs region; selection lowers it to whatever
    /// bookkeeping the calling convention requires.
    VarargsStart,
    /// `memcpy(dst, src, len)`.
    Memcpy,
    /// `memset(dst, val, len)`.
    Memset,
    /// `memmove(dst, src, len)`.
    Memmove,
    /// Address the caller will return to.
    ReturnAddress,
    /// Address of the current frame.
    FrameAddress,
    /// True if either float operand is NaN.
    IsUnordered,
    /// Captures the current execution context for a later `longjmp`.
    Setjmp,
    /// Restores a context captured by `setjmp`.
    Longjmp,
}

/// One instruction's opcode-specific payload.
///
/// Each variant carries exactly the operands that opcode needs; there is no
/// separate "opcode" + "generic operand list" pair, so a caller can never
/// construct an instruction whose operand shape doesn't match its opcode.
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionData {
    /// A binary arithmetic/bitwise/shift instruction.
    Binary { op: BinaryOp, args: [Value; 2] },
    /// An integer comparison.
    IntCompare {
        /// Comparison predicate.
        cc: IntCc,
        /// Operands being compared.
        args: [Value; 2],
    },
    /// A floating-point comparison.
    FloatCompare {
        /// Comparison predicate.
        cc: FloatCc,
        /// Operands being compared.
        args: [Value; 2],
    },
    /// A type conversion.
    Cast {
        /// Conversion kind.
        kind: CastKind,
        /// Value being converted.
        arg: Value,
    },
    /// A constant integer (interpreted per the result's declared type).
    IntConst(i64),
    /// A constant float, stored as its raw bit pattern.
    FloatConst(u64),
    /// `GetElementPtr base, [(index, element_type)...]`: each index scales
    /// by the size of the paired element type, accumulating onto `base`.
    GetElementPtr {
        /// Pointer being indexed.
        base: Value,
        /// Index operands, each paired with the element type it steps over.
        indices: Vec<(Value, Type)>,
    },
    /// A load of `ty` from `ptr`.
    Load {
        /// Type of the loaded value.
        ty: Type,
        /// Address being read.
        ptr: Value,
    },
    /// A store of `value` to `ptr`.
    Store {
        /// Address being written.
        ptr: Value,
        /// Value being stored.
        value: Value,
    },
    /// A compile-time-known-size stack allocation.
    AllocaFixed {
        /// Size in bytes.
        size: u32,
        /// Required alignment in bytes.
        align: u32,
    },
    /// A dynamically-sized stack allocation: `count` elements of
    /// `elem_size` bytes each.
    AllocaDynamic {
        /// Element count, known only at run time.
        count: Value,
        /// Size in bytes of one element.
        elem_size: u32,
        /// Required alignment in bytes.
        align: u32,
    },
    /// A heap allocation request of `size` bytes.
    Malloc {
        /// Requested size.
        size: Value,
    },
    /// Releases a heap allocation.
    Free {
        /// Pointer being freed.
        ptr: Value,
    },
    /// A function call, direct or indirect.
    Call {
        /// Callee identification.
        callee: Callee,
        /// Argument values.
        args: Vec<Value>,
        /// Result type, if the callee returns a value.
        ret_ty: Option<Type>,
    },
    /// Function return, carrying 0 or 1 value per this core's ABI model.
    Return(Vec<Value>),
    /// Unconditional branch to `dest`, passing `args` as its block
    /// parameters.
    Jump {
        /// Destination block.
        dest: Block,
        /// Block-parameter values for `dest`.
        args: Vec<Value>,
    },
    /// Two-way conditional branch.
    Branch {
        /// Condition value (a 1-bit integer).
        cond: Value,
        /// Destination when `cond` is non-zero.
        then_dest: Block,
        /// Block-parameter values for `then_dest`.
        then_args: Vec<Value>,
        /// Destination when `cond` is zero.
        else_dest: Block,
        /// Block-parameter values for `else_dest`.
        else_args: Vec<Value>,
    },
    /// Marks a program point the optimizer has proven unreachable.
    Unreachable,
    /// An SSA phi: one incoming value per predecessor block.
    Phi(Vec<(Block, Value)>),
    /// A selected intrinsic.
    IntrinsicCall {
        /// Which intrinsic.
        intrinsic: Intrinsic,
        /// Argument values.
        args: Vec<Value>,
    },
}

impl InstructionData {
    /// Is this one of the terminator shapes (`return`, `jump`, `branch`,
    /// `unreachable`)? Every block must end in exactly one of these.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstructionData::Return(_)
                | InstructionData::Jump { .. }
                | InstructionData::Branch { .. }
                | InstructionData::Unreachable
        )
    }

    /// Is this a `phi`?
    pub fn is_phi(&self) -> bool {
        matches!(self, InstructionData::Phi(_))
    }

    /// The successor blocks this instruction can transfer control to.
    pub fn branch_destinations(&self) -> Vec<Block> {
        match self {
            InstructionData::Jump { dest, .. } => vec![*dest],
            InstructionData::Branch {
                then_dest,
                else_dest,
                ..
            } => vec![*then_dest, *else_dest],
            _ => vec![],
        }
    }
}
