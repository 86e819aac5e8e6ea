//! Formula graph consumed by the code generator

pub mod formula;
pub mod types;

pub use formula::{Formula, FormulaFile, Node, NodeId, Op};
pub use types::{Sort, Value};
