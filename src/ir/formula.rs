//! Hash-consed formula DAG
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Building the same
//! node twice yields the same id, so shared sub-formulas are shared nodes.
//! Children always precede their parents in the arena.

use crate::error::{SimError, SimResult};
use crate::ir::types::{Sort, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Index of a node in a [`Formula`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Operator tag of a formula node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    // Leaves
    Symbol(String),
    Constant(Value),

    // Boolean structure
    Not,
    And,
    Or,
    Implies,
    Iff,
    Ite,
    Equals,

    // Int / Real arithmetic
    Plus,
    Minus,
    Times,
    Div,
    Pow,
    Le,
    Lt,

    // Bit-vectors
    BvNot,
    BvAnd,
    BvOr,
    BvXor,
    BvNeg,
    BvAdd,
    BvSub,
    BvMul,
    BvUDiv,
    BvSDiv,
    BvURem,
    BvSRem,
    BvShl,
    BvLShr,
    BvAShr,
    BvRol(u32),
    BvRor(u32),
    BvZExt(u32),
    BvSExt(u32),
    /// Bits `start..=end`, bit 0 being the least significant
    BvExtract { start: u32, end: u32 },
    /// First child lands in the most significant bits
    BvConcat,
    BvULt,
    BvULe,
    BvSLt,
    BvSLe,
    BvComp,
    BvToNatural,

    // Theories without a native lowering
    ArraySelect,
    ArrayStore,
    ArrayValue,
    ToReal,
    Forall(Vec<String>),
    Exists(Vec<String>),
    Apply(String),
}

impl Op {
    /// Stable operator name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Op::Symbol(_) => "symbol",
            Op::Constant(_) => "constant",
            Op::Not => "not",
            Op::And => "and",
            Op::Or => "or",
            Op::Implies => "implies",
            Op::Iff => "iff",
            Op::Ite => "ite",
            Op::Equals => "equals",
            Op::Plus => "plus",
            Op::Minus => "minus",
            Op::Times => "times",
            Op::Div => "div",
            Op::Pow => "pow",
            Op::Le => "le",
            Op::Lt => "lt",
            Op::BvNot => "bv_not",
            Op::BvAnd => "bv_and",
            Op::BvOr => "bv_or",
            Op::BvXor => "bv_xor",
            Op::BvNeg => "bv_neg",
            Op::BvAdd => "bv_add",
            Op::BvSub => "bv_sub",
            Op::BvMul => "bv_mul",
            Op::BvUDiv => "bv_udiv",
            Op::BvSDiv => "bv_sdiv",
            Op::BvURem => "bv_urem",
            Op::BvSRem => "bv_srem",
            Op::BvShl => "bv_shl",
            Op::BvLShr => "bv_lshr",
            Op::BvAShr => "bv_ashr",
            Op::BvRol(_) => "bv_rol",
            Op::BvRor(_) => "bv_ror",
            Op::BvZExt(_) => "bv_zext",
            Op::BvSExt(_) => "bv_sext",
            Op::BvExtract { .. } => "bv_extract",
            Op::BvConcat => "bv_concat",
            Op::BvULt => "bv_ult",
            Op::BvULe => "bv_ule",
            Op::BvSLt => "bv_slt",
            Op::BvSLe => "bv_sle",
            Op::BvComp => "bv_comp",
            Op::BvToNatural => "bv_tonatural",
            Op::ArraySelect => "array_select",
            Op::ArrayStore => "array_store",
            Op::ArrayValue => "array_value",
            Op::ToReal => "to_real",
            Op::Forall(_) => "forall",
            Op::Exists(_) => "exists",
            Op::Apply(_) => "function_application",
        }
    }
}

/// A single node: operator, ordered children and resolved sort
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub op: Op,
    pub children: Vec<NodeId>,
    pub sort: Sort,
}

/// Arena of hash-consed formula nodes
#[derive(Debug, Clone, Default)]
pub struct Formula {
    nodes: Vec<Node>,
    index: HashMap<Node, NodeId>,
}

/// Serialized form of a formula together with its root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaFile {
    pub nodes: Vec<Node>,
    pub root: NodeId,
}

impl Formula {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an arena from serialized nodes, checking that every child
    /// precedes its parent
    pub fn from_nodes(nodes: Vec<Node>) -> SimResult<Self> {
        let mut formula = Formula::new();
        for (pos, node) in nodes.into_iter().enumerate() {
            if let Some(child) = node.children.iter().find(|c| c.index() >= pos) {
                return Err(SimError::MalformedGraph(format!(
                    "node {} references child {} that does not precede it",
                    pos, child
                )));
            }
            let id = formula.mk(node.op, node.children, node.sort);
            if id.index() != pos {
                return Err(SimError::MalformedGraph(format!(
                    "node {} duplicates node {}",
                    pos, id
                )));
            }
        }
        Ok(formula)
    }

    /// Load a formula and its root from a [`FormulaFile`]
    pub fn from_file(file: FormulaFile) -> SimResult<(Self, NodeId)> {
        let formula = Self::from_nodes(file.nodes)?;
        if file.root.index() >= formula.len() {
            return Err(SimError::MalformedGraph(format!(
                "root {} is outside the arena of {} nodes",
                file.root,
                formula.len()
            )));
        }
        Ok((formula, file.root))
    }

    pub fn to_file(&self, root: NodeId) -> FormulaFile {
        FormulaFile {
            nodes: self.nodes.clone(),
            root,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn sort(&self, id: NodeId) -> &Sort {
        &self.node(id).sort
    }

    /// Free symbols reachable from `root` in left-to-right depth-first order
    pub fn symbols(&self, root: NodeId) -> Vec<(String, Sort)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let node = self.node(id);
            if let Op::Symbol(name) = &node.op {
                out.push((name.clone(), node.sort.clone()));
            }
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Intern a node, returning the existing id for a structurally equal one
    pub fn mk(&mut self, op: Op, children: Vec<NodeId>, sort: Sort) -> NodeId {
        let node = Node { op, children, sort };
        if let Some(id) = self.index.get(&node) {
            return *id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.index.insert(node.clone(), id);
        self.nodes.push(node);
        id
    }

    fn first_sort(&self, children: &[NodeId]) -> Sort {
        children
            .first()
            .map(|c| self.sort(*c).clone())
            .unwrap_or(Sort::Bool)
    }

    fn same_sort(&mut self, op: Op, children: &[NodeId]) -> NodeId {
        let sort = self.first_sort(children);
        self.mk(op, children.to_vec(), sort)
    }

    fn predicate(&mut self, op: Op, children: &[NodeId]) -> NodeId {
        self.mk(op, children.to_vec(), Sort::Bool)
    }

    // --- Leaves ---

    pub fn symbol(&mut self, name: &str, sort: Sort) -> NodeId {
        self.mk(Op::Symbol(name.to_string()), Vec::new(), sort)
    }

    pub fn constant(&mut self, value: Value) -> NodeId {
        let sort = value.sort();
        self.mk(Op::Constant(value), Vec::new(), sort)
    }

    pub fn bool_const(&mut self, b: bool) -> NodeId {
        self.constant(Value::Bool(b))
    }

    pub fn int(&mut self, i: i64) -> NodeId {
        self.constant(Value::Int(i))
    }

    pub fn real(&mut self, numer: i64, denom: i64) -> NodeId {
        self.constant(Value::real(numer, denom))
    }

    pub fn bv(&mut self, value: u64, width: u32) -> NodeId {
        self.constant(Value::bv(value, width))
    }

    // --- Boolean structure ---

    pub fn not(&mut self, a: NodeId) -> NodeId {
        self.predicate(Op::Not, &[a])
    }

    pub fn and(&mut self, args: &[NodeId]) -> NodeId {
        self.predicate(Op::And, args)
    }

    pub fn or(&mut self, args: &[NodeId]) -> NodeId {
        self.predicate(Op::Or, args)
    }

    pub fn implies(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.predicate(Op::Implies, &[a, b])
    }

    pub fn iff(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.predicate(Op::Iff, &[a, b])
    }

    pub fn ite(&mut self, cond: NodeId, then: NodeId, otherwise: NodeId) -> NodeId {
        let sort = self.sort(then).clone();
        self.mk(Op::Ite, vec![cond, then, otherwise], sort)
    }

    pub fn equals(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.predicate(Op::Equals, &[a, b])
    }

    // --- Arithmetic ---

    pub fn plus(&mut self, args: &[NodeId]) -> NodeId {
        self.same_sort(Op::Plus, args)
    }

    pub fn minus(&mut self, args: &[NodeId]) -> NodeId {
        self.same_sort(Op::Minus, args)
    }

    /// Unary minus
    pub fn neg(&mut self, a: NodeId) -> NodeId {
        self.same_sort(Op::Minus, &[a])
    }

    pub fn times(&mut self, args: &[NodeId]) -> NodeId {
        self.same_sort(Op::Times, args)
    }

    pub fn div(&mut self, args: &[NodeId]) -> NodeId {
        self.same_sort(Op::Div, args)
    }

    pub fn pow(&mut self, base: NodeId, exp: NodeId) -> NodeId {
        self.same_sort(Op::Pow, &[base, exp])
    }

    pub fn le(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.predicate(Op::Le, &[a, b])
    }

    pub fn lt(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.predicate(Op::Lt, &[a, b])
    }

    pub fn ge(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.le(b, a)
    }

    pub fn gt(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.lt(b, a)
    }

    // --- Bit-vectors ---

    pub fn bv_not(&mut self, a: NodeId) -> NodeId {
        self.same_sort(Op::BvNot, &[a])
    }

    pub fn bv_and(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvAnd, &[a, b])
    }

    pub fn bv_or(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvOr, &[a, b])
    }

    pub fn bv_xor(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvXor, &[a, b])
    }

    pub fn bv_neg(&mut self, a: NodeId) -> NodeId {
        self.same_sort(Op::BvNeg, &[a])
    }

    pub fn bv_add(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvAdd, &[a, b])
    }

    pub fn bv_sub(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvSub, &[a, b])
    }

    pub fn bv_mul(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvMul, &[a, b])
    }

    pub fn bv_udiv(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvUDiv, &[a, b])
    }

    pub fn bv_sdiv(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvSDiv, &[a, b])
    }

    pub fn bv_urem(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvURem, &[a, b])
    }

    pub fn bv_srem(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvSRem, &[a, b])
    }

    pub fn bv_shl(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvShl, &[a, b])
    }

    pub fn bv_lshr(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvLShr, &[a, b])
    }

    pub fn bv_ashr(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.same_sort(Op::BvAShr, &[a, b])
    }

    pub fn bv_rol(&mut self, a: NodeId, amount: u32) -> NodeId {
        self.same_sort(Op::BvRol(amount), &[a])
    }

    pub fn bv_ror(&mut self, a: NodeId, amount: u32) -> NodeId {
        self.same_sort(Op::BvRor(amount), &[a])
    }

    pub fn bv_zext(&mut self, a: NodeId, extra: u32) -> NodeId {
        let width = self.sort(a).bv_width().unwrap_or(0) + extra;
        self.mk(Op::BvZExt(extra), vec![a], Sort::BitVec(width))
    }

    pub fn bv_sext(&mut self, a: NodeId, extra: u32) -> NodeId {
        let width = self.sort(a).bv_width().unwrap_or(0) + extra;
        self.mk(Op::BvSExt(extra), vec![a], Sort::BitVec(width))
    }

    /// Bits `start..=end` of `a`
    pub fn bv_extract(&mut self, a: NodeId, start: u32, end: u32) -> NodeId {
        let width = end.saturating_sub(start) + 1;
        self.mk(Op::BvExtract { start, end }, vec![a], Sort::BitVec(width))
    }

    /// `hi` occupies the most significant bits of the result
    pub fn bv_concat(&mut self, hi: NodeId, lo: NodeId) -> NodeId {
        let width =
            self.sort(hi).bv_width().unwrap_or(0) + self.sort(lo).bv_width().unwrap_or(0);
        self.mk(Op::BvConcat, vec![hi, lo], Sort::BitVec(width))
    }

    pub fn bv_ult(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.predicate(Op::BvULt, &[a, b])
    }

    pub fn bv_ule(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.predicate(Op::BvULe, &[a, b])
    }

    pub fn bv_slt(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.predicate(Op::BvSLt, &[a, b])
    }

    pub fn bv_sle(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.predicate(Op::BvSLe, &[a, b])
    }

    pub fn bv_comp(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.mk(Op::BvComp, vec![a, b], Sort::BitVec(1))
    }

    pub fn bv_to_natural(&mut self, a: NodeId) -> NodeId {
        self.mk(Op::BvToNatural, vec![a], Sort::Int)
    }

    // --- Other theories ---

    pub fn select(&mut self, array: NodeId, index: NodeId) -> NodeId {
        let sort = match self.sort(array) {
            Sort::Array(_, elem) => (**elem).clone(),
            other => other.clone(),
        };
        self.mk(Op::ArraySelect, vec![array, index], sort)
    }

    pub fn store(&mut self, array: NodeId, index: NodeId, value: NodeId) -> NodeId {
        self.same_sort(Op::ArrayStore, &[array, index, value])
    }

    pub fn to_real(&mut self, a: NodeId) -> NodeId {
        self.mk(Op::ToReal, vec![a], Sort::Real)
    }

    pub fn forall(&mut self, vars: &[&str], body: NodeId) -> NodeId {
        let vars = vars.iter().map(|v| v.to_string()).collect();
        self.predicate(Op::Forall(vars), &[body])
    }

    pub fn exists(&mut self, vars: &[&str], body: NodeId) -> NodeId {
        let vars = vars.iter().map(|v| v.to_string()).collect();
        self.predicate(Op::Exists(vars), &[body])
    }

    pub fn apply(&mut self, function: &str, args: &[NodeId], sort: Sort) -> NodeId {
        self.mk(Op::Apply(function.to_string()), args.to_vec(), sort)
    }
}
