//! Mapping from formula sorts to native Rust types of the generated evaluator

use crate::error::{SimError, SimResult};
use crate::ir::Sort;
use std::fmt;

/// Widest bit-vector that fits the `u64` storage of `Bv<W>`
pub const MAX_BV_WIDTH: u32 = 64;

/// Native representation of a node's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetType {
    Bool,
    Int,
    Real,
    /// `Bv<W>` over `u64` storage
    BitVec(u32),
}

impl TargetType {
    /// Rust type name as written in generated code
    pub fn rust_name(&self) -> String {
        match self {
            TargetType::Bool => "bool".to_string(),
            TargetType::Int => "i64".to_string(),
            TargetType::Real => "f64".to_string(),
            TargetType::BitVec(w) => format!("Bv<{}>", w),
        }
    }

    /// Prefix of temporaries of this type; names are unique per type
    pub fn temp_prefix(&self) -> String {
        match self {
            TargetType::Bool => "bool".to_string(),
            TargetType::Int => "int".to_string(),
            TargetType::Real => "real".to_string(),
            TargetType::BitVec(w) => format!("bv{}_", w),
        }
    }

    pub fn bv_width(&self) -> Option<u32> {
        match self {
            TargetType::BitVec(w) => Some(*w),
            _ => None,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rust_name())
    }
}

/// Resolve the native type for `sort`
pub fn resolve(sort: &Sort) -> SimResult<TargetType> {
    match sort {
        Sort::Bool => Ok(TargetType::Bool),
        Sort::Int => Ok(TargetType::Int),
        Sort::Real => Ok(TargetType::Real),
        Sort::BitVec(w) if (1..=MAX_BV_WIDTH).contains(w) => Ok(TargetType::BitVec(*w)),
        Sort::BitVec(w) => Err(SimError::TypeResolution {
            sort: sort.to_string(),
            reason: format!("width {} outside 1..={}", w, MAX_BV_WIDTH),
        }),
        _ => Err(SimError::TypeResolution {
            sort: sort.to_string(),
            reason: "no native representation".to_string(),
        }),
    }
}
