//! Concrete interpreter with the same semantics as the generated evaluator
//!
//! Int arithmetic wraps, Real is `f64`, bit-vectors are masked `u64` values
//! using LSB-0 bit numbering. Results render exactly as the compiled
//! evaluator prints them, so the two can be compared line by line.

use crate::codegen::generator::unsupported;
use crate::codegen::types::resolve;
use crate::error::{SimError, SimResult};
use crate::ir::types::bv_mask;
use crate::ir::{Formula, Node, NodeId, Op, Value};
use crate::sim::Assignment;
use std::collections::HashMap;
use std::fmt;

/// A runtime value as held by the evaluator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConcreteValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    BitVec { value: u64, width: u32 },
}

impl ConcreteValue {
    pub fn bv(value: u64, width: u32) -> Self {
        ConcreteValue::BitVec {
            value: value & bv_mask(width),
            width,
        }
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(b) => ConcreteValue::Bool(*b),
            Value::Int(i) => ConcreteValue::Int(*i),
            Value::Real(r) => ConcreteValue::Real(Value::real_quotient(r)),
            Value::BitVec { value, width } => ConcreteValue::bv(*value, *width),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConcreteValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text the compiled evaluator writes for this value
    pub fn render(&self) -> String {
        match self {
            ConcreteValue::Bool(true) => "1".to_string(),
            ConcreteValue::Bool(false) => "0".to_string(),
            ConcreteValue::Int(i) => i.to_string(),
            ConcreteValue::Real(r) => r.to_string(),
            ConcreteValue::BitVec { value, .. } => value.to_string(),
        }
    }

    fn signed(value: u64, width: u32) -> i64 {
        let s = 64 - width;
        ((value << s) as i64) >> s
    }
}

impl fmt::Display for ConcreteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Evaluate `root` under `assignment`
pub fn evaluate(formula: &Formula, root: NodeId, assignment: &Assignment) -> SimResult<ConcreteValue> {
    evaluate_row(formula, root, assignment, 0)
}

/// Evaluate `root` once per row, in row order
pub fn evaluate_rows(
    formula: &Formula,
    root: NodeId,
    rows: &[Assignment],
) -> SimResult<Vec<ConcreteValue>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| evaluate_row(formula, root, row, i))
        .collect()
}

/// Evaluate a boolean root; non-boolean roots are a graph error
pub fn satisfies(formula: &Formula, root: NodeId, assignment: &Assignment) -> SimResult<bool> {
    let value = evaluate(formula, root, assignment)?;
    value.as_bool().ok_or_else(|| {
        SimError::MalformedGraph(format!("root {} evaluates to non-boolean {}", root, value))
    })
}

fn evaluate_row(
    formula: &Formula,
    root: NodeId,
    assignment: &Assignment,
    row: usize,
) -> SimResult<ConcreteValue> {
    let mut memo: HashMap<NodeId, ConcreteValue> = HashMap::new();
    let mut stack = vec![(root, false)];
    while let Some((id, expanded)) = stack.pop() {
        if memo.contains_key(&id) {
            continue;
        }
        let node = formula.node(id);
        if !expanded {
            if let Some(op) = unsupported(&node.op) {
                return Err(SimError::unsupported(op));
            }
            stack.push((id, true));
            for child in node.children.iter().rev() {
                if !memo.contains_key(child) {
                    stack.push((*child, false));
                }
            }
            continue;
        }
        resolve(&node.sort)?;
        let args = node
            .children
            .iter()
            .map(|c| {
                memo.get(c).copied().ok_or_else(|| {
                    SimError::MalformedGraph(format!("child {} of {} was not evaluated", c, id))
                })
            })
            .collect::<SimResult<Vec<_>>>()?;
        let value = apply(node, &args, assignment, row)?;
        memo.insert(id, value);
    }
    memo.remove(&root)
        .ok_or_else(|| SimError::MalformedGraph(format!("root {} was not evaluated", root)))
}

fn mismatch(node: &Node, args: &[ConcreteValue]) -> SimError {
    SimError::MalformedGraph(format!(
        "{} cannot be applied to {:?}",
        node.op.name(),
        args
    ))
}

fn bools(node: &Node, args: &[ConcreteValue]) -> SimResult<Vec<bool>> {
    if args.is_empty() {
        return Err(mismatch(node, args));
    }
    args.iter()
        .map(|a| a.as_bool().ok_or_else(|| mismatch(node, args)))
        .collect()
}

fn ints(args: &[ConcreteValue]) -> Option<Vec<i64>> {
    if args.is_empty() {
        return None;
    }
    args.iter()
        .map(|a| match a {
            ConcreteValue::Int(i) => Some(*i),
            _ => None,
        })
        .collect()
}

fn reals(args: &[ConcreteValue]) -> Option<Vec<f64>> {
    if args.is_empty() {
        return None;
    }
    args.iter()
        .map(|a| match a {
            ConcreteValue::Real(r) => Some(*r),
            _ => None,
        })
        .collect()
}

/// Operands of a bit-vector operator, all of one width
fn bvs(node: &Node, args: &[ConcreteValue]) -> SimResult<(Vec<u64>, u32)> {
    let mut width = None;
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        match a {
            ConcreteValue::BitVec { value, width: w } if width.is_none() || width == Some(*w) => {
                width = Some(*w);
                values.push(*value);
            }
            _ => return Err(mismatch(node, args)),
        }
    }
    let width = width.ok_or_else(|| mismatch(node, args))?;
    Ok((values, width))
}

fn fold_int(args: &[ConcreteValue], f: fn(i64, i64) -> i64) -> Option<ConcreteValue> {
    ints(args).map(|v| ConcreteValue::Int(v[1..].iter().fold(v[0], |acc, x| f(acc, *x))))
}

fn fold_real(args: &[ConcreteValue], f: fn(f64, f64) -> f64) -> Option<ConcreteValue> {
    reals(args).map(|v| ConcreteValue::Real(v[1..].iter().fold(v[0], |acc, x| f(acc, *x))))
}

fn arity(node: &Node, args: &[ConcreteValue], n: usize) -> SimResult<()> {
    if args.len() != n {
        return Err(SimError::MalformedGraph(format!(
            "{} node expects {} children, found {}",
            node.op.name(),
            n,
            args.len()
        )));
    }
    Ok(())
}

fn apply(
    node: &Node,
    args: &[ConcreteValue],
    assignment: &Assignment,
    row: usize,
) -> SimResult<ConcreteValue> {
    let value = match &node.op {
        Op::Symbol(name) => {
            let bound = assignment.get(name).ok_or_else(|| SimError::UnboundArgument {
                row,
                name: name.clone(),
                reason: "no value bound".to_string(),
            })?;
            if bound.sort() != node.sort {
                return Err(SimError::UnboundArgument {
                    row,
                    name: name.clone(),
                    reason: format!("expected {}, found {}", node.sort, bound.sort()),
                });
            }
            ConcreteValue::from_value(bound)
        }
        Op::Constant(v) => ConcreteValue::from_value(v),

        Op::Not => {
            arity(node, args, 1)?;
            ConcreteValue::Bool(!bools(node, args)?[0])
        }
        Op::And => ConcreteValue::Bool(bools(node, args)?.into_iter().all(|b| b)),
        Op::Or => ConcreteValue::Bool(bools(node, args)?.into_iter().any(|b| b)),
        Op::Implies => {
            arity(node, args, 2)?;
            let v = bools(node, args)?;
            ConcreteValue::Bool(!v[0] || v[1])
        }
        Op::Iff | Op::Equals => {
            arity(node, args, 2)?;
            ConcreteValue::Bool(args[0] == args[1])
        }
        Op::Ite => {
            arity(node, args, 3)?;
            match args[0] {
                ConcreteValue::Bool(true) => args[1],
                ConcreteValue::Bool(false) => args[2],
                _ => return Err(mismatch(node, args)),
            }
        }

        Op::Plus => fold_int(args, i64::wrapping_add)
            .or_else(|| fold_real(args, |a, b| a + b))
            .ok_or_else(|| mismatch(node, args))?,
        Op::Minus if args.len() == 1 => match args[0] {
            ConcreteValue::Int(i) => ConcreteValue::Int(i.wrapping_neg()),
            ConcreteValue::Real(r) => ConcreteValue::Real(-r),
            _ => return Err(mismatch(node, args)),
        },
        Op::Minus => fold_int(args, i64::wrapping_sub)
            .or_else(|| fold_real(args, |a, b| a - b))
            .ok_or_else(|| mismatch(node, args))?,
        Op::Times => fold_int(args, i64::wrapping_mul)
            .or_else(|| fold_real(args, |a, b| a * b))
            .ok_or_else(|| mismatch(node, args))?,
        Op::Div => fold_int(args, |a, b| a.checked_div_euclid(b).unwrap_or(0))
            .or_else(|| fold_real(args, |a, b| a / b))
            .ok_or_else(|| mismatch(node, args))?,
        Op::Pow => {
            arity(node, args, 2)?;
            match (args[0], args[1]) {
                (ConcreteValue::Int(a), ConcreteValue::Int(b)) => {
                    ConcreteValue::Int(a.wrapping_pow(b as u32))
                }
                (ConcreteValue::Real(a), ConcreteValue::Real(b)) => ConcreteValue::Real(a.powf(b)),
                _ => return Err(mismatch(node, args)),
            }
        }
        Op::Le | Op::Lt => {
            arity(node, args, 2)?;
            let strict = matches!(node.op, Op::Lt);
            let ord = match (args[0], args[1]) {
                (ConcreteValue::Int(a), ConcreteValue::Int(b)) => a.partial_cmp(&b),
                (ConcreteValue::Real(a), ConcreteValue::Real(b)) => a.partial_cmp(&b),
                _ => return Err(mismatch(node, args)),
            };
            ConcreteValue::Bool(match ord {
                Some(std::cmp::Ordering::Less) => true,
                Some(std::cmp::Ordering::Equal) => !strict,
                _ => false,
            })
        }

        Op::BvNot => {
            arity(node, args, 1)?;
            let (v, w) = bvs(node, args)?;
            ConcreteValue::bv(!v[0], w)
        }
        Op::BvNeg => {
            arity(node, args, 1)?;
            let (v, w) = bvs(node, args)?;
            ConcreteValue::bv(v[0].wrapping_neg(), w)
        }
        Op::BvAnd | Op::BvOr | Op::BvXor => {
            let (v, w) = bvs(node, args)?;
            let f: fn(u64, u64) -> u64 = match node.op {
                Op::BvAnd => |a, b| a & b,
                Op::BvOr => |a, b| a | b,
                _ => |a, b| a ^ b,
            };
            ConcreteValue::bv(v[1..].iter().fold(v[0], |acc, x| f(acc, *x)), w)
        }
        Op::BvShl | Op::BvLShr | Op::BvAShr => {
            arity(node, args, 2)?;
            let (v, w) = bvs(node, args)?;
            let (a, b) = (v[0], v[1]);
            let shifted = match node.op {
                Op::BvShl if b >= w as u64 => 0,
                Op::BvShl => a << b,
                Op::BvLShr if b >= w as u64 => 0,
                Op::BvLShr => a >> b,
                _ => (ConcreteValue::signed(a, w) >> b.min(63)) as u64,
            };
            ConcreteValue::bv(shifted, w)
        }
        Op::BvAdd | Op::BvSub | Op::BvMul | Op::BvUDiv | Op::BvSDiv => {
            arity(node, args, 2)?;
            let (v, w) = bvs(node, args)?;
            let (a, b) = (v[0], v[1]);
            let result = match node.op {
                Op::BvAdd => a.wrapping_add(b),
                Op::BvSub => a.wrapping_sub(b),
                Op::BvMul => a.wrapping_mul(b),
                Op::BvUDiv => a.checked_div(b).unwrap_or(u64::MAX),
                _ => {
                    let (n, d) = (ConcreteValue::signed(a, w), ConcreteValue::signed(b, w));
                    if d == 0 {
                        (if n < 0 { 1i64 } else { -1 }) as u64
                    } else {
                        n.wrapping_div(d) as u64
                    }
                }
            };
            ConcreteValue::bv(result, w)
        }
        Op::BvULt | Op::BvULe | Op::BvSLt | Op::BvSLe => {
            arity(node, args, 2)?;
            let (v, w) = bvs(node, args)?;
            let result = match node.op {
                Op::BvULt => v[0] < v[1],
                Op::BvULe => v[0] <= v[1],
                Op::BvSLt => ConcreteValue::signed(v[0], w) < ConcreteValue::signed(v[1], w),
                _ => ConcreteValue::signed(v[0], w) <= ConcreteValue::signed(v[1], w),
            };
            ConcreteValue::Bool(result)
        }
        Op::BvComp => {
            arity(node, args, 2)?;
            let (v, _) = bvs(node, args)?;
            ConcreteValue::bv((v[0] == v[1]) as u64, 1)
        }
        Op::BvExtract { start, end } => {
            arity(node, args, 1)?;
            let (v, w) = bvs(node, args)?;
            if start > end || *end >= w {
                return Err(mismatch(node, args));
            }
            ConcreteValue::bv(v[0] >> start, end - start + 1)
        }
        Op::BvConcat => {
            arity(node, args, 2)?;
            match (args[0], args[1]) {
                (
                    ConcreteValue::BitVec { value: hi, width: hw },
                    ConcreteValue::BitVec { value: lo, width: lw },
                ) if hw + lw <= 64 => {
                    let shifted = if lw >= 64 { 0 } else { hi << lw };
                    ConcreteValue::bv(shifted | lo, hw + lw)
                }
                _ => return Err(mismatch(node, args)),
            }
        }

        Op::BvURem
        | Op::BvSRem
        | Op::BvRol(_)
        | Op::BvRor(_)
        | Op::BvZExt(_)
        | Op::BvSExt(_)
        | Op::BvToNatural
        | Op::ArraySelect
        | Op::ArrayStore
        | Op::ArrayValue
        | Op::ToReal
        | Op::Forall(_)
        | Op::Exists(_)
        | Op::Apply(_) => return Err(SimError::unsupported(node.op.name())),
    };
    Ok(value)
}
