//! Z3 encoding of formula graphs and an exact exists-forall backend
//!
//! Int and Real are encoded as unbounded SMT integers and reals; bit-vector
//! operators map onto their SMT-LIB counterparts, which share the LSB-0
//! extract/concat convention and division-by-zero results of the generated
//! evaluator.

use crate::codegen::generator::unsupported;
use crate::error::{SimError, SimResult};
use crate::ir::{Formula, Node, NodeId, Op, Sort, Value};
use crate::search::{ExistentialSolver, UniversalSolver};
use crate::sim::Assignment;
use num_rational::Rational64;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use z3::ast::{Ast, Bool, Dynamic, Int, Real, BV};
use z3::{Context, Model, Params, SatResult, Solver};

/// Configuration for the SMT solver
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Timeout per query (None means no timeout)
    pub timeout: Option<Duration>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl SolverConfig {
    pub fn no_timeout() -> Self {
        Self { timeout: None }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Create a Z3 solver with the given configuration
pub fn create_solver<'ctx>(ctx: &'ctx Context, cfg: &SolverConfig) -> Solver<'ctx> {
    let solver = Solver::new(ctx);
    if let Some(timeout) = cfg.timeout {
        let mut params = Params::new(ctx);
        params.set_u32("timeout", timeout.as_millis() as u32);
        solver.set_params(&params);
    }
    solver
}

fn mismatch(node: &Node, what: &str) -> SimError {
    SimError::MalformedGraph(format!("{} node {}", node.op.name(), what))
}

fn as_bool<'ctx>(node: &Node, d: &Dynamic<'ctx>) -> SimResult<Bool<'ctx>> {
    d.as_bool().ok_or_else(|| mismatch(node, "expects Bool operands"))
}

fn as_bv<'ctx>(node: &Node, d: &Dynamic<'ctx>) -> SimResult<BV<'ctx>> {
    d.as_bv().ok_or_else(|| mismatch(node, "expects bit-vector operands"))
}

/// Encode a literal
pub fn encode_value<'ctx>(ctx: &'ctx Context, value: &Value) -> SimResult<Dynamic<'ctx>> {
    Ok(match value {
        Value::Bool(b) => Dynamic::from_ast(&Bool::from_bool(ctx, *b)),
        Value::Int(i) => Dynamic::from_ast(&Int::from_i64(ctx, *i)),
        Value::Real(r) => {
            let real = Real::from_real_str(ctx, &r.numer().to_string(), &r.denom().to_string())
                .ok_or_else(|| SimError::MalformedGraph(format!("bad real literal {}", r)))?;
            Dynamic::from_ast(&real)
        }
        Value::BitVec { value, width } => Dynamic::from_ast(&BV::from_u64(ctx, *value, *width)),
    })
}

/// Fresh constant named `name` of sort `sort`
pub fn fresh_const<'ctx>(ctx: &'ctx Context, name: &str, sort: &Sort) -> SimResult<Dynamic<'ctx>> {
    Ok(match sort {
        Sort::Bool => Dynamic::from_ast(&Bool::new_const(ctx, name)),
        Sort::Int => Dynamic::from_ast(&Int::new_const(ctx, name)),
        Sort::Real => Dynamic::from_ast(&Real::new_const(ctx, name)),
        Sort::BitVec(w) => Dynamic::from_ast(&BV::new_const(ctx, name, *w)),
        other => {
            return Err(SimError::TypeResolution {
                sort: other.to_string(),
                reason: "no SMT encoding".to_string(),
            })
        }
    })
}

/// Read `var` of sort `sort` back from a model
fn model_value<'ctx>(model: &Model<'ctx>, var: &Dynamic<'ctx>, sort: &Sort) -> Option<Value> {
    let v = model.eval(var, true)?;
    match sort {
        Sort::Bool => v.as_bool()?.as_bool().map(Value::Bool),
        Sort::Int => v.as_int()?.as_i64().map(Value::Int),
        Sort::Real => {
            let (n, d) = v.as_real()?.as_real()?;
            Some(Value::Real(Rational64::new(n, d)))
        }
        Sort::BitVec(w) => v.as_bv()?.as_u64().map(|x| Value::bv(x, *w)),
        _ => None,
    }
}

/// Translates one formula into Z3 terms
///
/// Symbols bound in the substitution become literals; all others resolve to
/// the constants in `vars`, created on first use.
pub struct Encoder<'ctx, 'f> {
    ctx: &'ctx Context,
    formula: &'f Formula,
}

impl<'ctx, 'f> Encoder<'ctx, 'f> {
    pub fn new(ctx: &'ctx Context, formula: &'f Formula) -> Self {
        Self { ctx, formula }
    }

    pub fn encode(
        &self,
        root: NodeId,
        bindings: &Assignment,
        vars: &mut HashMap<String, Dynamic<'ctx>>,
    ) -> SimResult<Dynamic<'ctx>> {
        let mut memo: HashMap<NodeId, Dynamic<'ctx>> = HashMap::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if memo.contains_key(&id) {
                continue;
            }
            let node = self.formula.node(id);
            if !expanded {
                if let Some(op) = unsupported(&node.op) {
                    return Err(SimError::unsupported(op));
                }
                stack.push((id, true));
                for child in node.children.iter().rev() {
                    stack.push((*child, false));
                }
                continue;
            }
            let args = node
                .children
                .iter()
                .map(|c| {
                    memo.get(c)
                        .cloned()
                        .ok_or_else(|| mismatch(node, &format!("child {} was not encoded", c)))
                })
                .collect::<SimResult<Vec<_>>>()?;
            let term = self.apply(node, &args, bindings, vars)?;
            memo.insert(id, term);
        }
        memo.remove(&root)
            .ok_or_else(|| SimError::MalformedGraph(format!("root {} was not encoded", root)))
    }

    /// Encode a boolean root
    pub fn encode_bool(
        &self,
        root: NodeId,
        bindings: &Assignment,
        vars: &mut HashMap<String, Dynamic<'ctx>>,
    ) -> SimResult<Bool<'ctx>> {
        let node = self.formula.node(root);
        let term = self.encode(root, bindings, vars)?;
        as_bool(node, &term)
    }

    fn apply(
        &self,
        node: &Node,
        args: &[Dynamic<'ctx>],
        bindings: &Assignment,
        vars: &mut HashMap<String, Dynamic<'ctx>>,
    ) -> SimResult<Dynamic<'ctx>> {
        let ctx = self.ctx;
        let arity = |n: usize| -> SimResult<()> {
            if args.len() != n {
                return Err(mismatch(node, &format!("expects {} children", n)));
            }
            Ok(())
        };
        let term = match &node.op {
            Op::Symbol(name) => match bindings.get(name) {
                Some(value) => encode_value(ctx, value)?,
                None => match vars.get(name) {
                    Some(var) => var.clone(),
                    None => {
                        let var = fresh_const(ctx, name, &node.sort)?;
                        vars.insert(name.clone(), var.clone());
                        var
                    }
                },
            },
            Op::Constant(value) => encode_value(ctx, value)?,

            Op::Not => {
                arity(1)?;
                Dynamic::from_ast(&as_bool(node, &args[0])?.not())
            }
            Op::And | Op::Or => {
                let bools = args
                    .iter()
                    .map(|a| as_bool(node, a))
                    .collect::<SimResult<Vec<_>>>()?;
                let refs: Vec<&Bool<'ctx>> = bools.iter().collect();
                if matches!(node.op, Op::And) {
                    Dynamic::from_ast(&Bool::and(ctx, &refs))
                } else {
                    Dynamic::from_ast(&Bool::or(ctx, &refs))
                }
            }
            Op::Implies => {
                arity(2)?;
                let (a, b) = (as_bool(node, &args[0])?, as_bool(node, &args[1])?);
                Dynamic::from_ast(&a.implies(&b))
            }
            Op::Iff | Op::Equals => {
                arity(2)?;
                Dynamic::from_ast(&args[0]._eq(&args[1]))
            }
            Op::Ite => {
                arity(3)?;
                as_bool(node, &args[0])?.ite(&args[1], &args[2])
            }

            Op::Plus | Op::Minus | Op::Times | Op::Div | Op::Pow | Op::Le | Op::Lt => {
                self.arith(node, args)?
            }

            Op::BvNot => {
                arity(1)?;
                Dynamic::from_ast(&as_bv(node, &args[0])?.bvnot())
            }
            Op::BvNeg => {
                arity(1)?;
                Dynamic::from_ast(&as_bv(node, &args[0])?.bvneg())
            }
            Op::BvAnd | Op::BvOr | Op::BvXor => {
                let bvs = args
                    .iter()
                    .map(|a| as_bv(node, a))
                    .collect::<SimResult<Vec<_>>>()?;
                let (first, rest) = bvs
                    .split_first()
                    .ok_or_else(|| mismatch(node, "has no children"))?;
                let folded = rest.iter().fold(first.clone(), |acc, b| match node.op {
                    Op::BvAnd => acc.bvand(b),
                    Op::BvOr => acc.bvor(b),
                    _ => acc.bvxor(b),
                });
                Dynamic::from_ast(&folded)
            }
            Op::BvShl
            | Op::BvLShr
            | Op::BvAShr
            | Op::BvAdd
            | Op::BvSub
            | Op::BvMul
            | Op::BvUDiv
            | Op::BvSDiv => {
                arity(2)?;
                let (a, b) = (as_bv(node, &args[0])?, as_bv(node, &args[1])?);
                let r = match node.op {
                    Op::BvShl => a.bvshl(&b),
                    Op::BvLShr => a.bvlshr(&b),
                    Op::BvAShr => a.bvashr(&b),
                    Op::BvAdd => a.bvadd(&b),
                    Op::BvSub => a.bvsub(&b),
                    Op::BvMul => a.bvmul(&b),
                    Op::BvUDiv => a.bvudiv(&b),
                    _ => a.bvsdiv(&b),
                };
                Dynamic::from_ast(&r)
            }
            Op::BvULt | Op::BvULe | Op::BvSLt | Op::BvSLe => {
                arity(2)?;
                let (a, b) = (as_bv(node, &args[0])?, as_bv(node, &args[1])?);
                let r = match node.op {
                    Op::BvULt => a.bvult(&b),
                    Op::BvULe => a.bvule(&b),
                    Op::BvSLt => a.bvslt(&b),
                    _ => a.bvsle(&b),
                };
                Dynamic::from_ast(&r)
            }
            Op::BvComp => {
                arity(2)?;
                let eq = args[0]._eq(&args[1]);
                Dynamic::from_ast(&eq.ite(&BV::from_u64(ctx, 1, 1), &BV::from_u64(ctx, 0, 1)))
            }
            Op::BvExtract { start, end } => {
                arity(1)?;
                Dynamic::from_ast(&as_bv(node, &args[0])?.extract(*end, *start))
            }
            Op::BvConcat => {
                arity(2)?;
                let (hi, lo) = (as_bv(node, &args[0])?, as_bv(node, &args[1])?);
                Dynamic::from_ast(&hi.concat(&lo))
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
        Ok(term)
    }

    fn arith(&self, node: &Node, args: &[Dynamic<'ctx>]) -> SimResult<Dynamic<'ctx>> {
        let ctx = self.ctx;
        if let Some(ints) = args.iter().map(|a| a.as_int()).collect::<Option<Vec<_>>>() {
            let refs: Vec<&Int<'ctx>> = ints.iter().collect();
            let (first, rest) = ints
                .split_first()
                .ok_or_else(|| mismatch(node, "has no children"))?;
            return Ok(match node.op {
                Op::Plus => Dynamic::from_ast(&Int::add(ctx, &refs)),
                Op::Minus if rest.is_empty() => Dynamic::from_ast(&first.unary_minus()),
                Op::Minus => Dynamic::from_ast(&Int::sub(ctx, &refs)),
                Op::Times => Dynamic::from_ast(&Int::mul(ctx, &refs)),
                Op::Div => Dynamic::from_ast(&rest.iter().fold(first.clone(), |acc, b| acc.div(b))),
                Op::Pow if rest.len() == 1 => Dynamic::from_ast(&first.power(&rest[0])),
                Op::Le if rest.len() == 1 => Dynamic::from_ast(&first.le(&rest[0])),
                Op::Lt if rest.len() == 1 => Dynamic::from_ast(&first.lt(&rest[0])),
                _ => return Err(mismatch(node, "has the wrong number of children")),
            });
        }
        if let Some(reals) = args.iter().map(|a| a.as_real()).collect::<Option<Vec<_>>>() {
            let refs: Vec<&Real<'ctx>> = reals.iter().collect();
            let (first, rest) = reals
                .split_first()
                .ok_or_else(|| mismatch(node, "has no children"))?;
            return Ok(match node.op {
                Op::Plus => Dynamic::from_ast(&Real::add(ctx, &refs)),
                Op::Minus if rest.is_empty() => Dynamic::from_ast(&first.unary_minus()),
                Op::Minus => Dynamic::from_ast(&Real::sub(ctx, &refs)),
                Op::Times => Dynamic::from_ast(&Real::mul(ctx, &refs)),
                Op::Div => Dynamic::from_ast(&rest.iter().fold(first.clone(), |acc, b| acc.div(b))),
                Op::Pow if rest.len() == 1 => Dynamic::from_ast(&first.power(&rest[0])),
                Op::Le if rest.len() == 1 => Dynamic::from_ast(&first.le(&rest[0])),
                Op::Lt if rest.len() == 1 => Dynamic::from_ast(&first.lt(&rest[0])),
                _ => return Err(mismatch(node, "has the wrong number of children")),
            });
        }
        Err(mismatch(node, "mixes Int and Real operands"))
    }
}

/// An exists-forall problem decided by Z3
pub struct Z3Backend<'ctx, 'f> {
    ctx: &'ctx Context,
    formula: &'f Formula,
    root: NodeId,
    exists: Vec<(String, Sort)>,
    forall: Vec<(String, Sort)>,
    config: SolverConfig,
}

impl<'ctx, 'f> Z3Backend<'ctx, 'f> {
    pub fn new(
        ctx: &'ctx Context,
        formula: &'f Formula,
        root: NodeId,
        exists: Vec<(String, Sort)>,
        forall: Vec<(String, Sort)>,
    ) -> Self {
        Self {
            ctx,
            formula,
            root,
            exists,
            forall,
            config: SolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn existential(&self) -> SimResult<Z3Existential<'ctx, 'f>> {
        let mut vars = HashMap::new();
        for (name, sort) in &self.exists {
            vars.insert(name.clone(), fresh_const(self.ctx, name, sort)?);
        }
        Ok(Z3Existential {
            encoder: Encoder::new(self.ctx, self.formula),
            solver: create_solver(self.ctx, &self.config),
            root: self.root,
            exists: self.exists.clone(),
            vars,
        })
    }

    pub fn universal(&self) -> Z3Universal<'ctx, 'f> {
        Z3Universal {
            ctx: self.ctx,
            encoder: Encoder::new(self.ctx, self.formula),
            root: self.root,
            forall: self.forall.clone(),
            config: self.config.clone(),
        }
    }
}

fn read_model<'ctx>(
    solver: &Solver<'ctx>,
    names: &[(String, Sort)],
    vars: &HashMap<String, Dynamic<'ctx>>,
) -> SimResult<Assignment> {
    let model = solver
        .get_model()
        .ok_or_else(|| SimError::Solver("sat without a model".to_string()))?;
    let mut out = Assignment::new();
    for (name, sort) in names {
        let var = vars
            .get(name)
            .ok_or_else(|| SimError::Solver(format!("no constant for {}", name)))?;
        let value = model_value(&model, var, sort)
            .ok_or_else(|| SimError::Solver(format!("model has no value for {}", name)))?;
        out.insert(name.clone(), value);
    }
    Ok(out)
}

fn unknown(solver: &Solver<'_>) -> SimError {
    SimError::Solver(
        solver
            .get_reason_unknown()
            .unwrap_or_else(|| "unknown".to_string()),
    )
}

/// Incremental existential side: one assertion per accepted witness
pub struct Z3Existential<'ctx, 'f> {
    encoder: Encoder<'ctx, 'f>,
    solver: Solver<'ctx>,
    root: NodeId,
    exists: Vec<(String, Sort)>,
    vars: HashMap<String, Dynamic<'ctx>>,
}

impl ExistentialSolver for Z3Existential<'_, '_> {
    fn solve(&mut self) -> SimResult<Option<Assignment>> {
        match self.solver.check() {
            SatResult::Sat => read_model(&self.solver, &self.exists, &self.vars).map(Some),
            SatResult::Unsat => Ok(None),
            SatResult::Unknown => Err(unknown(&self.solver)),
        }
    }

    fn strengthen(&mut self, witness: &Assignment) -> SimResult<()> {
        let instance = self.encoder.encode_bool(self.root, witness, &mut self.vars)?;
        debug!(term = %instance, "strengthening existential side");
        self.solver.assert(&instance);
        Ok(())
    }
}

/// Universal side: a fresh query per candidate
pub struct Z3Universal<'ctx, 'f> {
    ctx: &'ctx Context,
    encoder: Encoder<'ctx, 'f>,
    root: NodeId,
    forall: Vec<(String, Sort)>,
    config: SolverConfig,
}

impl UniversalSolver for Z3Universal<'_, '_> {
    fn counterexample(&mut self, candidate: &Assignment) -> SimResult<Option<Assignment>> {
        let mut vars = HashMap::new();
        for (name, sort) in &self.forall {
            vars.insert(name.clone(), fresh_const(self.ctx, name, sort)?);
        }
        let body = self.encoder.encode_bool(self.root, candidate, &mut vars)?;
        let solver = create_solver(self.ctx, &self.config);
        solver.assert(&body.not());
        match solver.check() {
            SatResult::Sat => read_model(&solver, &self.forall, &vars).map(Some),
            SatResult::Unsat => Ok(None),
            SatResult::Unknown => Err(unknown(&solver)),
        }
    }
}
