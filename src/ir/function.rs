//! The function-level IR container consumed by instruction selection.
//!
//! Grounded on `cranelift-codegen/src/ir/function.rs`'s split between a data
//! flow graph (value/instruction identity and typing) and a layout (block
//! and instruction order). The source's `Layout` is an intrusive doubly
//! linked list for O(1) mid-function splicing during legalization; this core
//! never splices blocks produced by an upstream optimizer, so `Layout` here
//! is the simpler `Vec`-ordered form.

use crate::ir::entities::{Block, Inst, Value};
use crate::ir::instructions::InstructionData;
use crate::ir::types::Type;
use cranelift_entity::{EntityRef, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

/// Where a `Value` comes from: an instruction result, or a block parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    /// The `n`th result of `inst`.
    Result(Inst, usize),
    /// The `n`th parameter of `block`.
    Param(Block, usize),
}

#[derive(Debug, Clone)]
struct ValueData {
    ty: Type,
    def: ValueDef,
}

/// Function signature: parameter types and an optional return type. This
/// core models single-value returns; multi-value returns would widen
/// `Return` the same way multi-result instructions already are (see
/// `DataFlowGraph::results`), but no IR construct here produces one.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    /// Parameter types, in order.
    pub params: Vec<Type>,
    /// Return type, if any.
    pub return_type: Option<Type>,
}

/// Values, instructions, and their types and definitions.
#[derive(Default)]
pub struct DataFlowGraph {
    insts: PrimaryMap<Inst, InstructionData>,
    results: SecondaryMap<Inst, SmallVec<[Value; 1]>>,
    values: PrimaryMap<Value, ValueData>,
    block_params: SecondaryMap<Block, SmallVec<[Value; 4]>>,
    num_blocks: u32,
}

impl DataFlowGraph {
    /// Create an empty data flow graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new, empty block.
    pub fn make_block(&mut self) -> Block {
        let b = Block::new(self.num_blocks as usize);
        self.num_blocks += 1;
        b
    }

    /// Number of blocks allocated so far.
    pub fn num_blocks(&self) -> usize {
        self.num_blocks as usize
    }

    /// Append a new parameter of type `ty` to `block`, returning its value.
    pub fn append_block_param(&mut self, block: Block, ty: Type) -> Value {
        let index = self.block_params[block].len();
        let v = self.values.push(ValueData {
            ty,
            def: ValueDef::Param(block, index),
        });
        self.block_params[block].push(v);
        v
    }

    /// Parameters of `block`, in order.
    pub fn block_params(&self, block: Block) -> &[Value] {
        &self.block_params[block]
    }

    /// Append an instruction producing `result_types`, returning the
    /// instruction and its result values.
    pub fn make_inst(
        &mut self,
        data: InstructionData,
        result_types: &[Type],
    ) -> (Inst, SmallVec<[Value; 1]>) {
        let inst = self.insts.push(data);
        let mut results = SmallVec::new();
        for (i, ty) in result_types.iter().enumerate() {
            let v = self.values.push(ValueData {
                ty: ty.clone(),
                def: ValueDef::Result(inst, i),
            });
            results.push(v);
        }
        self.results[inst] = results.clone();
        (inst, results)
    }

    /// The data describing `inst`.
    pub fn inst_data(&self, inst: Inst) -> &InstructionData {
        &self.insts[inst]
    }

    /// Replace the data describing `inst` in place (used by legalization to
    /// expand one instruction into an equivalent sequence rooted at the same
    /// `Inst` identity plus freshly created instructions).
    pub fn replace_inst(&mut self, inst: Inst, data: InstructionData) {
        self.insts[inst] = data;
    }

    /// Result values of `inst`, in order.
    pub fn inst_results(&self, inst: Inst) -> &[Value] {
        &self.results[inst]
    }

    /// The single result of `inst`. Panics if `inst` has zero or more than
    /// one result; callers use this only where that's been established by
    /// construction.
    pub fn first_result(&self, inst: Inst) -> Value {
        self.results[inst][0]
    }

    /// Type of `value`.
    pub fn value_type(&self, value: Value) -> Type {
        self.values[value].ty.clone()
    }

    /// Where `value` is defined.
    pub fn value_def(&self, value: Value) -> ValueDef {
        self.values[value].def
    }
}

/// Block order and per-block instruction order.
#[derive(Default)]
pub struct Layout {
    order: Vec<Block>,
    insts: SecondaryMap<Block, Vec<Inst>>,
}

impl Layout {
    /// Create an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `block` as the new last block in layout order.
    pub fn append_block(&mut self, block: Block) {
        self.order.push(block);
    }

    /// Append `inst` as the new last instruction of `block`.
    pub fn append_inst(&mut self, block: Block, inst: Inst) {
        self.insts[block].push(inst);
    }

    /// Blocks in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.order.iter().copied()
    }

    /// Instructions of `block`, in order.
    pub fn block_insts(&self, block: Block) -> &[Inst] {
        &self.insts[block]
    }

    /// The last instruction of `block` — its terminator, once the function
    /// is well-formed.
    pub fn last_inst(&self, block: Block) -> Option<Inst> {
        self.insts[block].last().copied()
    }
}

/// One function's IR: signature, data flow graph, and layout.
pub struct Function {
    /// The function's name, used only for diagnostics.
    pub name: String,
    /// Parameter and return types.
    pub signature: Signature,
    /// Values and instructions.
    pub dfg: DataFlowGraph,
    /// Block and instruction order.
    pub layout: Layout,
}

impl Function {
    /// Create a new, empty function.
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        Self {
            name: name.into(),
            signature,
            dfg: DataFlowGraph::new(),
            layout: Layout::new(),
        }
    }

    /// Append a fresh block to both the DFG's block counter and the layout.
    pub fn make_block(&mut self) -> Block {
        let b = self.dfg.make_block();
        self.layout.append_block(b);
        b
    }

    /// Append an instruction to the end of `block`.
    pub fn emit(
        &mut self,
        block: Block,
        data: InstructionData,
        result_types: &[Type],
    ) -> (Inst, SmallVec<[Value; 1]>) {
        let (inst, results) = self.dfg.make_inst(data, result_types);
        self.layout.append_inst(block, inst);
        (inst, results)
    }

    /// Verify that every block ends in exactly one terminator and that no
    /// other instruction in the block is a terminator. This is the minimal
    /// well-formedness check instruction selection relies on; it is not a
    /// full IR verifier (no scope/SSA dominance checking — that lives
    /// upstream in the optimizer this core receives IR from).
    pub fn verify_terminators(&self) -> Result<(), Block> {
        for block in self.layout.blocks() {
            let insts = self.layout.block_insts(block);
            if insts.is_empty() {
                return Err(block);
            }
            for (i, inst) in insts.iter().enumerate() {
                let is_term = self.dfg.inst_data(*inst).is_terminator();
                let is_last = i + 1 == insts.len();
                if is_term != is_last {
                    return Err(block);
                }
            }
        }
        Ok(())
    }
}
