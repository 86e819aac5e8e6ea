//! Exhaustive exists-forall backend over explicit finite domains
//!
//! Both sides enumerate the cartesian product of their variables' domains in
//! lexicographic order and decide each point with the reference evaluator.

use crate::error::{SimError, SimResult};
use crate::ir::{Formula, NodeId, Sort, Value};
use crate::search::efsmt::merge;
use crate::search::{ExistentialSolver, UniversalSolver};
use crate::semantics::concrete::satisfies;
use crate::sim::Assignment;
use tracing::debug;

/// Widest bit-vector sort [`Domain::full`] will enumerate
pub const MAX_ENUMERABLE_WIDTH: u32 = 12;

/// Candidate values for one variable
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub name: String,
    pub values: Vec<Value>,
}

impl Domain {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Integers `lo..=hi`
    pub fn ints(name: impl Into<String>, lo: i64, hi: i64) -> Self {
        Self::new(name, (lo..=hi).map(Value::Int).collect())
    }

    /// Every value of a small sort
    pub fn full(name: impl Into<String>, sort: &Sort) -> SimResult<Self> {
        let values = match sort {
            Sort::Bool => vec![Value::Bool(false), Value::Bool(true)],
            Sort::BitVec(w) if *w >= 1 && *w <= MAX_ENUMERABLE_WIDTH => {
                (0..(1u64 << w)).map(|v| Value::bv(v, *w)).collect()
            }
            other => {
                return Err(SimError::TypeResolution {
                    sort: other.to_string(),
                    reason: "domain is not finitely enumerable".to_string(),
                })
            }
        };
        Ok(Self::new(name, values))
    }
}

/// Number of points in the product of `domains`
fn product_size(domains: &[Domain]) -> usize {
    domains
        .iter()
        .fold(1usize, |acc, d| acc.saturating_mul(d.values.len()))
}

/// The `index`-th point of the product, last domain varying fastest
fn point(domains: &[Domain], mut index: usize) -> Assignment {
    let mut row = Assignment::new();
    for d in domains.iter().rev() {
        let n = d.values.len();
        row.insert(d.name.clone(), d.values[index % n]);
        index /= n;
    }
    row
}

/// A finite exists-forall problem over one boolean formula
#[derive(Debug, Clone)]
pub struct FiniteDomainSolver<'f> {
    formula: &'f Formula,
    root: NodeId,
    exists: Vec<Domain>,
    forall: Vec<Domain>,
}

impl<'f> FiniteDomainSolver<'f> {
    pub fn new(formula: &'f Formula, root: NodeId, exists: Vec<Domain>, forall: Vec<Domain>) -> Self {
        Self {
            formula,
            root,
            exists,
            forall,
        }
    }

    /// Existential half, starting with no witnesses
    pub fn existential(&self) -> FiniteExistential<'f> {
        FiniteExistential {
            formula: self.formula,
            root: self.root,
            domains: self.exists.clone(),
            witnesses: Vec::new(),
            cursor: 0,
        }
    }

    pub fn universal(&self) -> FiniteUniversal<'f> {
        FiniteUniversal {
            formula: self.formula,
            root: self.root,
            domains: self.forall.clone(),
        }
    }
}

/// Enumerates candidates consistent with every witness
///
/// Points before the cursor were refuted by some witness; witnesses only
/// accumulate, so they stay refuted.
#[derive(Debug, Clone)]
pub struct FiniteExistential<'f> {
    formula: &'f Formula,
    root: NodeId,
    domains: Vec<Domain>,
    witnesses: Vec<Assignment>,
    cursor: usize,
}

impl ExistentialSolver for FiniteExistential<'_> {
    fn solve(&mut self) -> SimResult<Option<Assignment>> {
        if self.domains.iter().any(|d| d.values.is_empty()) {
            return Ok(None);
        }
        let total = product_size(&self.domains);
        'points: while self.cursor < total {
            let candidate = point(&self.domains, self.cursor);
            for witness in &self.witnesses {
                if !satisfies(self.formula, self.root, &merge(&candidate, witness))? {
                    self.cursor += 1;
                    continue 'points;
                }
            }
            debug!(index = self.cursor, "finite candidate");
            return Ok(Some(candidate));
        }
        Ok(None)
    }

    fn strengthen(&mut self, witness: &Assignment) -> SimResult<()> {
        self.witnesses.push(witness.clone());
        Ok(())
    }
}

/// Searches the universal domains for a falsifying assignment
#[derive(Debug, Clone)]
pub struct FiniteUniversal<'f> {
    formula: &'f Formula,
    root: NodeId,
    domains: Vec<Domain>,
}

impl UniversalSolver for FiniteUniversal<'_> {
    fn counterexample(&mut self, candidate: &Assignment) -> SimResult<Option<Assignment>> {
        if self.domains.iter().any(|d| d.values.is_empty()) {
            return Ok(None);
        }
        for index in 0..product_size(&self.domains) {
            let witness = point(&self.domains, index);
            if !satisfies(self.formula, self.root, &merge(candidate, &witness))? {
                return Ok(Some(witness));
            }
        }
        Ok(None)
    }
}
