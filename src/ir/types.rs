//! Sorts and concrete values of the formula graph

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of a formula node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sort {
    Bool,
    Int,
    Real,
    /// Fixed-width bit-vector
    BitVec(u32),
    /// Array sort with index and element sorts
    Array(Box<Sort>, Box<Sort>),
    /// Function sort: argument sorts and result sort
    Function(Vec<Sort>, Box<Sort>),
    Uninterpreted(String),
}

impl Sort {
    pub fn is_bool(&self) -> bool {
        matches!(self, Sort::Bool)
    }

    /// Width of a bit-vector sort
    pub fn bv_width(&self) -> Option<u32> {
        match self {
            Sort::BitVec(width) => Some(*width),
            _ => None,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
            Sort::Real => write!(f, "Real"),
            Sort::BitVec(w) => write!(f, "(_ BitVec {})", w),
            Sort::Array(idx, elem) => write!(f, "(Array {} {})", idx, elem),
            Sort::Function(args, ret) => {
                write!(f, "(")?;
                for arg in args {
                    write!(f, "{} ", arg)?;
                }
                write!(f, "-> {})", ret)
            }
            Sort::Uninterpreted(name) => write!(f, "{}", name),
        }
    }
}

/// A concrete constant bound to a symbol or embedded in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(Rational64),
    /// Bit-vector value; `value` is always masked to `width` bits
    BitVec { value: u64, width: u32 },
}

impl Value {
    /// Build a bit-vector value, truncating `value` to `width` bits
    pub fn bv(value: u64, width: u32) -> Self {
        Value::BitVec {
            value: value & bv_mask(width),
            width,
        }
    }

    pub fn real(numer: i64, denom: i64) -> Self {
        Value::Real(Rational64::new(numer, denom))
    }

    pub fn sort(&self) -> Sort {
        match self {
            Value::Bool(_) => Sort::Bool,
            Value::Int(_) => Sort::Int,
            Value::Real(_) => Sort::Real,
            Value::BitVec { width, .. } => Sort::BitVec(*width),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Rational rendered as the decimal quotient `numer / denom`
    pub fn real_quotient(r: &Rational64) -> f64 {
        *r.numer() as f64 / *r.denom() as f64
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::BitVec { value, width } => write!(f, "#b{:0w$b}", value, w = *width as usize),
        }
    }
}

/// Mask with the low `width` bits set
pub fn bv_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}
