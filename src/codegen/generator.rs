//! Memoizing lowering of a formula DAG to Rust statements and expressions
//!
//! Each distinct node is lowered exactly once. Arithmetic and bitwise
//! operators stay inline; logical, comparison and equality operators,
//! `ite` and `implies` are materialized as typed temporaries so a shared
//! boolean sub-formula is evaluated once and then referenced by name.

use crate::codegen::symbols::{Argument, SymbolCollector};
use crate::codegen::types::{resolve, TargetType};
use crate::error::{SimError, SimResult};
use crate::ir::{Formula, Node, NodeId, Op, Value};
use std::collections::HashMap;
use tracing::debug;

/// Result of lowering one node
#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    /// Inline expression text or the name of a declared temporary
    pub text: String,
    pub ty: TargetType,
    /// True when `text` names a temporary
    pub materialized: bool,
}

impl TypedExpr {
    fn inline(text: String, ty: TargetType) -> Self {
        Self {
            text,
            ty,
            materialized: false,
        }
    }
}

/// Lowered body of the evaluator function
#[derive(Debug, Clone)]
pub struct GeneratedFunction {
    /// Positional arguments in first-encounter order
    pub arguments: Vec<Argument>,
    /// `let` declarations, each defined before any use
    pub statements: Vec<String>,
    /// Expression returned by the function
    pub ret: TypedExpr,
}

/// Compilation context threaded through a single traversal
pub struct CodeGenerator<'f> {
    formula: &'f Formula,
    symbols: SymbolCollector,
    counters: HashMap<TargetType, usize>,
    statements: Vec<String>,
    memo: HashMap<NodeId, TypedExpr>,
}

/// Name of the operator when it has no native lowering
pub(crate) fn unsupported(op: &Op) -> Option<&'static str> {
    match op {
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
        | Op::Apply(_) => Some(op.name()),
        Op::Symbol(_)
        | Op::Constant(_)
        | Op::Not
        | Op::And
        | Op::Or
        | Op::Implies
        | Op::Iff
        | Op::Ite
        | Op::Equals
        | Op::Plus
        | Op::Minus
        | Op::Times
        | Op::Div
        | Op::Pow
        | Op::Le
        | Op::Lt
        | Op::BvNot
        | Op::BvAnd
        | Op::BvOr
        | Op::BvXor
        | Op::BvNeg
        | Op::BvAdd
        | Op::BvSub
        | Op::BvMul
        | Op::BvUDiv
        | Op::BvSDiv
        | Op::BvShl
        | Op::BvLShr
        | Op::BvAShr
        | Op::BvExtract { .. }
        | Op::BvConcat
        | Op::BvULt
        | Op::BvULe
        | Op::BvSLt
        | Op::BvSLe
        | Op::BvComp => None,
    }
}

/// Render a constant as a type-correct Rust literal
pub fn render_constant(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Int(i) if *i == i64::MIN => "i64::MIN".to_string(),
        Value::Int(i) if *i < 0 => format!("({})", i),
        Value::Int(i) => i.to_string(),
        Value::Real(r) => {
            let q = Value::real_quotient(r);
            if q < 0.0 {
                format!("({:?})", q)
            } else {
                format!("{:?}", q)
            }
        }
        Value::BitVec { value, width } => format!("Bv::<{}>::new({})", width, value),
    }
}

/// N-ary operators whose one-operand form is the operand itself
///
/// `minus` is excluded: with one operand it negates.
fn folds_to_operand(op: &Op) -> bool {
    matches!(
        op,
        Op::And | Op::Or | Op::Plus | Op::Times | Op::Div | Op::BvAnd | Op::BvOr | Op::BvXor
    )
}

/// `(op a)` for one operand, `(a op b op c)` otherwise
fn variadic(op: &str, args: &[TypedExpr]) -> String {
    if args.len() == 1 {
        format!("({}{})", op, args[0].text)
    } else {
        let joined: Vec<&str> = args.iter().map(|a| a.text.as_str()).collect();
        format!("({})", joined.join(&format!(" {} ", op)))
    }
}

fn malformed(node: &Node, what: &str) -> SimError {
    SimError::MalformedGraph(format!("{} node {}", node.op.name(), what))
}

fn expect_arity(node: &Node, args: &[TypedExpr], arity: usize) -> SimResult<()> {
    if args.len() != arity {
        return Err(malformed(
            node,
            &format!("expects {} children, found {}", arity, args.len()),
        ));
    }
    Ok(())
}

fn expect_some(node: &Node, args: &[TypedExpr]) -> SimResult<()> {
    if args.is_empty() {
        return Err(malformed(node, "has no children"));
    }
    Ok(())
}

fn operand_width(node: &Node, arg: &TypedExpr) -> SimResult<u32> {
    arg.ty
        .bv_width()
        .ok_or_else(|| malformed(node, &format!("expects a bit-vector operand, found {}", arg.ty)))
}

impl<'f> CodeGenerator<'f> {
    pub fn new(formula: &'f Formula) -> Self {
        Self {
            formula,
            symbols: SymbolCollector::new(),
            counters: HashMap::new(),
            statements: Vec::new(),
            memo: HashMap::new(),
        }
    }

    /// Lower the DAG rooted at `root`
    ///
    /// Unsupported operators are rejected when first reached, before any of
    /// their children are lowered.
    pub fn generate(mut self, root: NodeId) -> SimResult<GeneratedFunction> {
        let formula = self.formula;
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if self.memo.contains_key(&id) {
                continue;
            }
            let node = formula.node(id);
            if !expanded {
                if let Some(op) = unsupported(&node.op) {
                    return Err(SimError::unsupported(op));
                }
                stack.push((id, true));
                for child in node.children.iter().rev() {
                    if !self.memo.contains_key(child) {
                        stack.push((*child, false));
                    }
                }
            } else {
                let lowered = self.lower(node)?;
                debug!(node = %id, op = node.op.name(), expr = %lowered.text, "lowered");
                self.memo.insert(id, lowered);
            }
        }

        let ret = self
            .memo
            .remove(&root)
            .ok_or_else(|| SimError::MalformedGraph(format!("root {} was not lowered", root)))?;
        Ok(GeneratedFunction {
            arguments: self.symbols.into_arguments(),
            statements: self.statements,
            ret,
        })
    }

    /// Declare a new temporary holding `expr`
    fn materialize(&mut self, ty: TargetType, expr: String) -> TypedExpr {
        let counter = self.counters.entry(ty).or_insert(0);
        let name = format!("{}{}", ty.temp_prefix(), counter);
        *counter += 1;
        self.statements
            .push(format!("let {}: {} = {};", name, ty.rust_name(), expr));
        TypedExpr {
            text: name,
            ty,
            materialized: true,
        }
    }

    fn lower(&mut self, node: &Node) -> SimResult<TypedExpr> {
        let ty = resolve(&node.sort)?;
        let args: Vec<TypedExpr> = node
            .children
            .iter()
            .map(|c| {
                self.memo
                    .get(c)
                    .cloned()
                    .ok_or_else(|| malformed(node, &format!("child {} was not lowered", c)))
            })
            .collect::<SimResult<_>>()?;

        if args.len() == 1 && folds_to_operand(&node.op) {
            return Ok(args[0].clone());
        }

        match &node.op {
            Op::Symbol(name) => {
                let ident = self.symbols.register(name, ty)?;
                Ok(TypedExpr::inline(ident, ty))
            }
            Op::Constant(value) => Ok(TypedExpr::inline(render_constant(value), ty)),

            // Materialized boolean structure
            Op::Not => {
                expect_arity(node, &args, 1)?;
                Ok(self.materialize(ty, variadic("!", &args)))
            }
            Op::And => {
                expect_some(node, &args)?;
                Ok(self.materialize(ty, variadic("&&", &args)))
            }
            Op::Or => {
                expect_some(node, &args)?;
                Ok(self.materialize(ty, variadic("||", &args)))
            }
            Op::Implies => {
                expect_arity(node, &args, 2)?;
                let expr = format!("!{} || {}", args[0].text, args[1].text);
                Ok(self.materialize(ty, expr))
            }
            Op::Iff | Op::Equals => {
                expect_arity(node, &args, 2)?;
                Ok(self.materialize(ty, variadic("==", &args)))
            }
            Op::Le => {
                expect_arity(node, &args, 2)?;
                Ok(self.materialize(ty, variadic("<=", &args)))
            }
            Op::Lt => {
                expect_arity(node, &args, 2)?;
                Ok(self.materialize(ty, variadic("<", &args)))
            }
            Op::Ite => {
                expect_arity(node, &args, 3)?;
                let expr = format!(
                    "if {} {{ {} }} else {{ {} }}",
                    args[0].text, args[1].text, args[2].text
                );
                Ok(self.materialize(ty, expr))
            }

            // Transparent arithmetic
            Op::Plus => {
                expect_some(node, &args)?;
                Ok(TypedExpr::inline(variadic("+", &args), ty))
            }
            Op::Minus => {
                expect_some(node, &args)?;
                Ok(TypedExpr::inline(variadic("-", &args), ty))
            }
            Op::Times => {
                expect_some(node, &args)?;
                Ok(TypedExpr::inline(variadic("*", &args), ty))
            }
            Op::Div => {
                expect_some(node, &args)?;
                if ty == TargetType::Int {
                    let folded = args[1..].iter().fold(args[0].text.clone(), |acc, a| {
                        format!("int_div({}, {})", acc, a.text)
                    });
                    Ok(TypedExpr::inline(folded, ty))
                } else {
                    Ok(TypedExpr::inline(variadic("/", &args), ty))
                }
            }
            Op::Pow => {
                expect_arity(node, &args, 2)?;
                let expr = match ty {
                    TargetType::Int => {
                        format!("({}).wrapping_pow(({}) as u32)", args[0].text, args[1].text)
                    }
                    _ => format!("({}).powf({})", args[0].text, args[1].text),
                };
                Ok(TypedExpr::inline(expr, ty))
            }

            // Bitwise, independent of signedness
            Op::BvNot => {
                expect_arity(node, &args, 1)?;
                Ok(TypedExpr::inline(variadic("!", &args), ty))
            }
            Op::BvNeg => {
                expect_arity(node, &args, 1)?;
                Ok(TypedExpr::inline(variadic("-", &args), ty))
            }
            Op::BvAnd => self.bitwise(node, &args, "&", ty),
            Op::BvOr => self.bitwise(node, &args, "|", ty),
            Op::BvXor => self.bitwise(node, &args, "^", ty),
            Op::BvShl => {
                expect_arity(node, &args, 2)?;
                Ok(TypedExpr::inline(variadic("<<", &args), ty))
            }
            Op::BvLShr => {
                expect_arity(node, &args, 2)?;
                Ok(TypedExpr::inline(variadic(">>", &args), ty))
            }
            Op::BvAShr => {
                expect_arity(node, &args, 2)?;
                let expr = format!("bv_ashr({}, {})", args[0].text, args[1].text);
                Ok(TypedExpr::inline(expr, ty))
            }

            // Arithmetic through an unsigned or signed view of the storage
            Op::BvAdd => self.bv_unsigned_arith(node, &args, "wrapping_add", ty),
            Op::BvSub => self.bv_unsigned_arith(node, &args, "wrapping_sub", ty),
            Op::BvMul => self.bv_unsigned_arith(node, &args, "wrapping_mul", ty),
            Op::BvUDiv => {
                expect_arity(node, &args, 2)?;
                let width = operand_width(node, &args[0])?;
                let expr = format!(
                    "Bv::<{}>::from_unsigned({}.unsigned().checked_div({}.unsigned()).unwrap_or(u64::MAX))",
                    width, args[0].text, args[1].text
                );
                Ok(TypedExpr::inline(expr, ty))
            }
            Op::BvSDiv => {
                expect_arity(node, &args, 2)?;
                let expr = format!("bv_sdiv({}, {})", args[0].text, args[1].text);
                Ok(TypedExpr::inline(expr, ty))
            }
            Op::BvULt => self.bv_compare(node, &args, "unsigned", "<", ty),
            Op::BvULe => self.bv_compare(node, &args, "unsigned", "<=", ty),
            Op::BvSLt => self.bv_compare(node, &args, "signed", "<", ty),
            Op::BvSLe => self.bv_compare(node, &args, "signed", "<=", ty),
            Op::BvComp => {
                expect_arity(node, &args, 2)?;
                let expr = format!("Bv::<1>::new(({} == {}) as u64)", args[0].text, args[1].text);
                Ok(TypedExpr::inline(expr, ty))
            }

            Op::BvExtract { start, end } => {
                expect_arity(node, &args, 1)?;
                let input = operand_width(node, &args[0])?;
                let out = ty
                    .bv_width()
                    .ok_or_else(|| malformed(node, "has a non bit-vector sort"))?;
                if start > end || *end >= input || end - start + 1 != out {
                    return Err(malformed(
                        node,
                        &format!("bits {}..={} do not fit {} -> {} bits", start, end, input, out),
                    ));
                }
                let expr = format!(
                    "bv_extract::<{}, {}>({}, {}, {})",
                    out, input, args[0].text, start, end
                );
                Ok(TypedExpr::inline(expr, ty))
            }
            Op::BvConcat => {
                expect_arity(node, &args, 2)?;
                let hi = operand_width(node, &args[0])?;
                let lo = operand_width(node, &args[1])?;
                let out = ty
                    .bv_width()
                    .ok_or_else(|| malformed(node, "has a non bit-vector sort"))?;
                if hi + lo != out {
                    return Err(malformed(
                        node,
                        &format!("joins {} and {} bits into {}", hi, lo, out),
                    ));
                }
                let expr = format!(
                    "bv_concat::<{}, {}, {}>({}, {})",
                    hi, lo, out, args[0].text, args[1].text
                );
                Ok(TypedExpr::inline(expr, ty))
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
            | Op::Apply(_) => Err(SimError::unsupported(node.op.name())),
        }
    }

    fn bitwise(
        &mut self,
        node: &Node,
        args: &[TypedExpr],
        op: &str,
        ty: TargetType,
    ) -> SimResult<TypedExpr> {
        expect_some(node, args)?;
        Ok(TypedExpr::inline(variadic(op, args), ty))
    }

    fn bv_unsigned_arith(
        &mut self,
        node: &Node,
        args: &[TypedExpr],
        method: &str,
        ty: TargetType,
    ) -> SimResult<TypedExpr> {
        expect_arity(node, args, 2)?;
        let width = operand_width(node, &args[0])?;
        let expr = format!(
            "Bv::<{}>::from_unsigned({}.unsigned().{}({}.unsigned()))",
            width, args[0].text, method, args[1].text
        );
        Ok(TypedExpr::inline(expr, ty))
    }

    fn bv_compare(
        &mut self,
        node: &Node,
        args: &[TypedExpr],
        view: &str,
        op: &str,
        ty: TargetType,
    ) -> SimResult<TypedExpr> {
        expect_arity(node, args, 2)?;
        operand_width(node, &args[0])?;
        let expr = format!(
            "({}.{}() {} {}.{}())",
            args[0].text, view, op, args[1].text, view
        );
        Ok(self.materialize(ty, expr))
    }
}
