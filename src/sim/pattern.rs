//! Pattern rows and their text encoding
//!
//! File format: the row count on the first line, then one line per row with
//! whitespace-separated values in argument order.

use crate::codegen::{resolve, Argument};
use crate::error::{SimError, SimResult};
use crate::ir::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Concrete values keyed by symbol name
pub type Assignment = BTreeMap<String, Value>;

/// Canonical text form of a value in a pattern file
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Real(r) => Value::real_quotient(r).to_string(),
        Value::BitVec { value, .. } => value.to_string(),
    }
}

/// Encode one row in argument order
pub fn encode_row(args: &[Argument], row: &Assignment, index: usize) -> SimResult<Vec<String>> {
    args.iter()
        .map(|arg| {
            let value = row.get(&arg.name).ok_or_else(|| SimError::UnboundArgument {
                row: index,
                name: arg.name.clone(),
                reason: "no value bound".to_string(),
            })?;
            let ty = resolve(&value.sort()).map_err(|e| SimError::UnboundArgument {
                row: index,
                name: arg.name.clone(),
                reason: e.to_string(),
            })?;
            if ty != arg.ty {
                return Err(SimError::UnboundArgument {
                    row: index,
                    name: arg.name.clone(),
                    reason: format!("expected {}, found {}", arg.ty, ty),
                });
            }
            Ok(encode_value(value))
        })
        .collect()
}

/// Ordered queue of encoded rows awaiting simulation
#[derive(Debug, Clone, Default)]
pub struct PatternQueue {
    rows: Vec<Vec<String>>,
}

impl PatternQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, rows: Vec<Vec<String>>) {
        self.rows.extend(rows);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pattern file contents
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.rows.len());
        for row in &self.rows {
            let _ = writeln!(out, "{}", row.join(" "));
        }
        out
    }
}
