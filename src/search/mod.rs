//! Exists-forall (EF-SMT) solving loop
//!
//! The loop alternates between an existential solver proposing candidates
//! and a universal solver refuting them with counterexamples:
//! - Existential: a candidate for the outer variables consistent with every
//!   counterexample accepted so far
//! - Universal: an assignment of the inner variables falsifying the formula
//!   for a fixed candidate
//! - Batch oracle: native simulation of a candidate against all accepted
//!   counterexamples, consulted before the exact universal query

pub mod config;
pub mod efsmt;
pub mod finite;
pub mod result;

pub use config::EfsmtConfig;
pub use efsmt::{merge, EfsmtSolver};
pub use finite::{Domain, FiniteDomainSolver, FiniteExistential, FiniteUniversal};
pub use result::{EfsmtOutcome, EfsmtStatistics};

use crate::error::SimResult;
use crate::sim::Assignment;

/// Candidate search over the existential variables
pub trait ExistentialSolver {
    /// Next candidate, or `None` once the search space is exhausted
    fn solve(&mut self) -> SimResult<Option<Assignment>>;

    /// Permanently require the formula to hold under `witness`
    fn strengthen(&mut self, witness: &Assignment) -> SimResult<()>;
}

/// Exact refutation of a fixed candidate
pub trait UniversalSolver {
    /// An assignment of the universal variables falsifying the formula
    /// under `candidate`, or `None` if the candidate holds for all of them
    fn counterexample(&mut self, candidate: &Assignment) -> SimResult<Option<Assignment>>;
}

/// Batch evaluation of complete rows
pub trait BatchOracle {
    /// True iff the formula evaluates truthy on every row
    fn all_satisfied(&mut self, rows: &[Assignment]) -> SimResult<bool>;
}
