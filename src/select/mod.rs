//! Instruction selection: IR to a selection DAG, legalized, then tiled into
//! machine instructions over virtual registers.
//!
//! [`tile::select_function`] is the single entry point
//! [`crate::pipeline::Pipeline`] calls; [`dag`] and [`legalize`] are its
//! supporting pieces rather than independently invoked passes, mirroring
//! how `original_source/lib/CodeGen/SelectionDAG/SelectionDAGISel.cpp`
//! drives DAG building, legalization, and selection as one per-block
//! walk rather than three separately schedulable phases.

pub mod dag;
pub mod legalize;
pub mod tile;

pub use tile::select_function;
