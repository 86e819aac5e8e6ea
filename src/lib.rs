//! smtsim - native batch simulation of SMT formulas
//!
//! A formula DAG is lowered to a pure Rust function, compiled with `rustc`,
//! and run over many concrete assignments at once. The all-rows-satisfied
//! verdict gates exact solver calls inside an exists-forall loop.

pub mod codegen;
pub mod error;
pub mod ir;
pub mod search;
pub mod semantics;
pub mod sim;
pub mod validation;

pub use codegen::{generate_source, Argument, GeneratedSource, TargetType};
pub use error::{SimError, SimResult};
pub use ir::{Formula, FormulaFile, Node, NodeId, Op, Sort, Value};
pub use search::{
    BatchOracle, EfsmtConfig, EfsmtOutcome, EfsmtSolver, EfsmtStatistics, ExistentialSolver,
    UniversalSolver,
};
pub use sim::{Assignment, SimConfig, SimulationManager};
