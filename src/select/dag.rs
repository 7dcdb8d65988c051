//! The selection DAG's two load-bearing pieces: a value map from already-
//! lowered IR values to the registers holding them, and a chain pointer
//! threading side-effecting operations into a single total order.
//!
//! Grounded on `original_source/lib/CodeGen/SelectionDAG/SelectionDAGISel.cpp`'s
//! `SelectionDAGLowering`: its `ValueMap` (consulted before lowering any
//! operand so a value used more than once is only materialized once) and
//! its `Chain` (threaded through every `visitLoad`/`visitStore`/`visitCall`
//! so side effects keep their program order through a representation that
//! otherwise carries none). This module keeps exactly those two ideas; it
//! does not model the source's full `SDNode` operator graph or its
//! instruction scheduler, since `crate::select::tile` selects and emits
//! directly from typed `InstructionData` in the IR's own order and this
//! core never reorders instructions after selection (`nosched` is
//! always a no-op).

use crate::ir::Value;
use crate::isa::registers::Reg;
use crate::machine_function::MInst;
use std::collections::HashMap;

/// Value-to-register map plus chain state for one function's selection.
#[derive(Default)]
pub struct SelectDag {
    values: HashMap<Value, Reg>,
    chain: Option<MInst>,
}

impl SelectDag {
    /// Create an empty selection DAG.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that IR value `v` now lives in `reg`.
    pub fn bind(&mut self, v: Value, reg: Reg) {
        self.values.insert(v, reg);
    }

    /// The register already holding `v`, if it has been lowered.
    pub fn lookup(&self, v: Value) -> Option<Reg> {
        self.values.get(&v).copied()
    }

    /// Thread the chain through a newly emitted side-effecting
    /// instruction, returning the instruction that must precede it (the
    /// previous chain link, if any).
    pub fn advance_chain(&mut self, inst: MInst) -> Option<MInst> {
        self.chain.replace(inst)
    }

    /// Reset chain state at a block boundary; the value map persists
    /// across the whole function, since cross-block SSA uses are exactly
    /// as valid as same-block ones.
    pub fn start_block(&mut self) {
        self.chain = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;

    #[test]
    fn value_map_round_trips() {
        let mut dag = SelectDag::new();
        let v = Value::new(0);
        assert_eq!(dag.lookup(v), None);
        dag.bind(v, Reg(5));
        assert_eq!(dag.lookup(v), Some(Reg(5)));
    }

    #[test]
    fn chain_returns_previous_link() {
        let mut dag = SelectDag::new();
        let a = MInst::new(0);
        let b = MInst::new(1);
        assert_eq!(dag.advance_chain(a), None);
        assert_eq!(dag.advance_chain(b), Some(a));
        dag.start_block();
        assert_eq!(dag.advance_chain(a), None);
    }
}
