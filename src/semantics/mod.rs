//! Reference semantics of formula graphs
//!
//! `concrete` interprets a graph exactly as the generated evaluator would;
//! `smt` (feature `z3`) encodes it for the exact exists-forall backend.

pub mod concrete;
#[cfg(feature = "z3")]
pub mod smt;

pub use concrete::{evaluate, evaluate_rows, satisfies, ConcreteValue};
#[cfg(feature = "z3")]
pub use smt::{Encoder, SolverConfig, Z3Backend, Z3Existential, Z3Universal};
