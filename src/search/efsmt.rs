//! Counterexample-guided exists-forall loop with simulation gating

use crate::error::{SimError, SimResult};
use crate::search::config::EfsmtConfig;
use crate::search::result::{EfsmtOutcome, EfsmtStatistics};
use crate::search::{BatchOracle, ExistentialSolver, UniversalSolver};
use crate::sim::Assignment;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Union of a candidate and a witness; candidate bindings win on overlap
pub fn merge(candidate: &Assignment, witness: &Assignment) -> Assignment {
    let mut row = witness.clone();
    row.extend(candidate.iter().map(|(k, v)| (k.clone(), *v)));
    row
}

/// Exists-forall driver holding the accepted counterexamples
#[derive(Debug)]
pub struct EfsmtSolver {
    config: EfsmtConfig,
    witnesses: Vec<Assignment>,
    statistics: EfsmtStatistics,
}

impl EfsmtSolver {
    pub fn new(config: EfsmtConfig) -> Self {
        Self {
            config,
            witnesses: Vec::new(),
            statistics: EfsmtStatistics::default(),
        }
    }

    pub fn config(&self) -> &EfsmtConfig {
        &self.config
    }

    /// Counterexamples accepted so far, in discovery order
    pub fn witnesses(&self) -> &[Assignment] {
        &self.witnesses
    }

    pub fn statistics(&self) -> &EfsmtStatistics {
        &self.statistics
    }

    /// Run the loop to a definite answer or the configured bound
    ///
    /// The oracle only gates logging and statistics; every candidate is
    /// confirmed or refuted by `forall` before it is returned.
    pub fn run<E, U>(
        &mut self,
        exists: &mut E,
        forall: &mut U,
        oracle: Option<&mut dyn BatchOracle>,
    ) -> SimResult<EfsmtOutcome>
    where
        E: ExistentialSolver + ?Sized,
        U: UniversalSolver + ?Sized,
    {
        let start = Instant::now();
        self.statistics = EfsmtStatistics {
            witnesses: self.witnesses.len(),
            ..Default::default()
        };
        let outcome = self.iterate(exists, forall, oracle);
        self.statistics.elapsed_time = start.elapsed();
        match &outcome {
            Ok(EfsmtOutcome::Sat(_)) => info!(stats = %self.statistics, "efsmt: sat"),
            Ok(EfsmtOutcome::Unsat) => info!(stats = %self.statistics, "efsmt: unsat"),
            Err(e) => info!(stats = %self.statistics, error = %e, "efsmt: aborted"),
        }
        outcome
    }

    fn iterate<E, U>(
        &mut self,
        exists: &mut E,
        forall: &mut U,
        mut oracle: Option<&mut dyn BatchOracle>,
    ) -> SimResult<EfsmtOutcome>
    where
        E: ExistentialSolver + ?Sized,
        U: UniversalSolver + ?Sized,
    {
        loop {
            if let Some(max) = self.config.max_loops {
                if self.statistics.iterations >= max {
                    return Err(SimError::UnknownResult {
                        iterations: self.statistics.iterations,
                    });
                }
            }

            let candidate = match exists.solve()? {
                Some(candidate) => candidate,
                None => return Ok(EfsmtOutcome::Unsat),
            };
            self.statistics.iterations += 1;
            debug!(
                iteration = self.statistics.iterations,
                candidate = ?candidate,
                "existential candidate"
            );

            let simulated = match oracle.as_deref_mut() {
                Some(oracle) if self.config.simulate && !self.witnesses.is_empty() => {
                    let rows: Vec<Assignment> = self
                        .witnesses
                        .iter()
                        .map(|w| merge(&candidate, w))
                        .collect();
                    let passed = oracle.all_satisfied(&rows)?;
                    self.statistics.simulations += 1;
                    if !passed {
                        self.statistics.simulation_rejections += 1;
                    }
                    debug!(rows = rows.len(), passed, "simulated candidate");
                    Some(passed)
                }
                _ => None,
            };

            self.statistics.exact_queries += 1;
            match forall.counterexample(&candidate)? {
                None => {
                    if simulated == Some(false) {
                        self.statistics.simulation_mismatches += 1;
                        warn!(
                            iteration = self.statistics.iterations,
                            "simulation rejected a candidate the exact check accepted"
                        );
                    }
                    return Ok(EfsmtOutcome::Sat(candidate));
                }
                Some(witness) => {
                    debug!(witness = ?witness, "counterexample");
                    exists.strengthen(&witness)?;
                    self.witnesses.push(witness);
                    self.statistics.witnesses = self.witnesses.len();
                }
            }
        }
    }
}
