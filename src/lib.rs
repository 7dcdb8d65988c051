//! Machine-code generation core.
//!
//! This crate translates a machine-independent, typed, SSA intermediate
//! representation of a function into target-specific machine instructions.
//! It owns four tightly coupled subsystems, run in strict order by
//! [`pipeline::Pipeline`]:
//!
//! 1. instruction selection (`select`) — IR to a DAG, DAG to tiled machine
//!    instructions using virtual registers;
//! 2. live interval analysis (`live`) — per-virtual-register live ranges
//!    over a dense instruction numbering;
//! 3. linear-scan register allocation with iterative spilling (`regalloc`);
//! 4. spill rewriting and frame finalization (`spill`, `frame`).
//!
//! The IR parser, assembly printer, bytecode loader and target descriptions
//! themselves are external collaborators; this crate only specifies the
//! interfaces it needs from them (see `isa` and `ir`).
#![warn(missing_docs)]

pub mod frame;
pub mod ir;
pub mod isa;
pub mod live;
pub mod machine_function;
pub mod pipeline;
pub mod regalloc;
pub mod result;
pub mod select;
pub mod settings;
pub mod spill;
pub mod vreg;

#[cfg(any(test, feature = "testing_hooks"))]
pub mod fixture;

pub use crate::pipeline::Pipeline;
pub use crate::result::{CodegenError, CodegenResult};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
