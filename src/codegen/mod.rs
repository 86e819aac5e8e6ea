//! Formula-to-Rust compiler
//!
//! Pipeline: [`types::resolve`] maps sorts to native types,
//! [`symbols::SymbolCollector`] fixes the argument order,
//! [`generator::CodeGenerator`] lowers each distinct node once and
//! [`emit`] assembles the evaluator program around the lowered body.

pub mod emit;
pub mod generator;
pub mod symbols;
pub mod types;

pub use emit::{render_source, write_atomic, FUNCTION_NAME};
pub use generator::{CodeGenerator, GeneratedFunction, TypedExpr};
pub use symbols::{sanitize, Argument, SymbolCollector};
pub use types::{resolve, TargetType};

use crate::error::SimResult;
use crate::ir::{Formula, NodeId};

/// Generated program text and its positional argument contract
#[derive(Debug, Clone)]
pub struct GeneratedSource {
    pub arguments: Vec<Argument>,
    pub source: String,
}

/// Lower `root` and render the full evaluator program in memory
pub fn generate_source(formula: &Formula, root: NodeId) -> SimResult<GeneratedSource> {
    let func = CodeGenerator::new(formula).generate(root)?;
    let source = render_source(&func);
    Ok(GeneratedSource {
        arguments: func.arguments,
        source,
    })
}
