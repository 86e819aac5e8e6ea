//! Outcome and statistics of an exists-forall run

use crate::sim::Assignment;
use std::time::Duration;

/// Final answer of the loop
#[derive(Debug, Clone, PartialEq)]
pub enum EfsmtOutcome {
    /// A candidate for which no counterexample exists
    Sat(Assignment),
    /// The existential search was exhausted
    Unsat,
}

impl EfsmtOutcome {
    pub fn is_sat(&self) -> bool {
        matches!(self, EfsmtOutcome::Sat(_))
    }

    pub fn model(&self) -> Option<&Assignment> {
        match self {
            EfsmtOutcome::Sat(model) => Some(model),
            EfsmtOutcome::Unsat => None,
        }
    }
}

/// Counters collected while the loop runs
#[derive(Debug, Clone, Default)]
pub struct EfsmtStatistics {
    /// Candidates produced by the existential solver
    pub iterations: usize,
    /// Batch oracle calls
    pub simulations: u64,
    /// Oracle calls that reported at least one failing row
    pub simulation_rejections: u64,
    /// Oracle calls whose answer disagreed with the exact check
    pub simulation_mismatches: u64,
    /// Exact universal queries
    pub exact_queries: u64,
    /// Counterexamples accepted into the witness set
    pub witnesses: usize,
    /// Wall-clock time of the last run
    pub elapsed_time: Duration,
}

impl EfsmtStatistics {
    /// Fraction of oracle calls that rejected the candidate (0.0 to 1.0)
    pub fn rejection_rate(&self) -> f64 {
        if self.simulations == 0 {
            0.0
        } else {
            self.simulation_rejections as f64 / self.simulations as f64
        }
    }
}

impl std::fmt::Display for EfsmtStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "iterations={} witnesses={} exact_queries={} simulations={} rejections={} time={:?}",
            self.iterations,
            self.witnesses,
            self.exact_queries,
            self.simulations,
            self.simulation_rejections,
            self.elapsed_time
        )
    }
}
