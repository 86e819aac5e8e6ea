//! Session state for one formula: generated source, argument contract,
//! compiled evaluator and pending pattern rows

use crate::codegen::{generate_source, write_atomic, Argument};
use crate::error::{SimError, SimResult};
use crate::ir::{Formula, NodeId};
use crate::search::BatchOracle;
use crate::sim::config::SimConfig;
use crate::sim::pattern::{encode_row, Assignment, PatternQueue};
use crate::sim::toolchain;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Token a boolean evaluator writes for a satisfied row
pub const TRUTHY: &str = "1";

/// Counters for one session
#[derive(Debug, Clone, Default)]
pub struct SimStatistics {
    pub compilations: u64,
    pub simulations: u64,
    pub rows_simulated: u64,
}

/// Drives generation, compilation and batch simulation of one formula
#[derive(Debug)]
pub struct SimulationManager {
    config: SimConfig,
    /// Private artifact directory when the config names none
    scratch: Option<TempDir>,
    arguments: Vec<Argument>,
    source_path: Option<PathBuf>,
    binary_path: Option<PathBuf>,
    patterns: PatternQueue,
    statistics: SimStatistics,
}

impl SimulationManager {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            scratch: None,
            arguments: Vec::new(),
            source_path: None,
            binary_path: None,
            patterns: PatternQueue::new(),
            statistics: SimStatistics::default(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Directory holding this session's artifacts, once one is in use
    pub fn work_dir(&self) -> Option<&Path> {
        self.config
            .work_dir
            .as_deref()
            .or_else(|| self.scratch.as_ref().map(TempDir::path))
    }

    /// Pattern file written by [`Self::run_pending`]
    pub fn pattern_path(&self) -> Option<PathBuf> {
        self.work_dir().map(|dir| self.config.pattern_path(dir))
    }

    /// Result file written by [`Self::run_pending`]
    pub fn result_path(&self) -> Option<PathBuf> {
        self.work_dir().map(|dir| self.config.result_path(dir))
    }

    /// Configured work directory, or a fresh private one for this session
    fn ensure_work_dir(&mut self) -> SimResult<PathBuf> {
        if let Some(dir) = self.work_dir() {
            return Ok(dir.to_path_buf());
        }
        let scratch = tempfile::Builder::new()
            .prefix("smtsim")
            .tempdir()
            .map_err(|e| SimError::io(std::env::temp_dir(), e))?;
        let dir = scratch.path().to_path_buf();
        debug!(dir = %dir.display(), "created session directory");
        self.scratch = Some(scratch);
        Ok(dir)
    }

    /// Argument order fixed by the last successful [`Self::generate`]
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn binary_path(&self) -> Option<&Path> {
        self.binary_path.as_deref()
    }

    pub fn statistics(&self) -> &SimStatistics {
        &self.statistics
    }

    pub fn pending_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// Generate the evaluator source for `root` into the configured path
    ///
    /// Nothing is written unless lowering and emission both succeed. A new
    /// generation invalidates the compiled binary and the pending rows.
    pub fn generate(&mut self, formula: &Formula, root: NodeId) -> SimResult<&[Argument]> {
        let dir = self.ensure_work_dir()?;
        let path = self.config.source_path(&dir);
        self.generate_to(formula, root, &path)
    }

    /// Like [`Self::generate`] with an explicit destination
    pub fn generate_to(
        &mut self,
        formula: &Formula,
        root: NodeId,
        path: &Path,
    ) -> SimResult<&[Argument]> {
        let generated = generate_source(formula, root)?;
        write_atomic(path, &generated.source)?;
        info!(
            path = %path.display(),
            arguments = generated.arguments.len(),
            "generated evaluator"
        );
        self.arguments = generated.arguments;
        self.source_path = Some(path.to_path_buf());
        self.binary_path = None;
        self.patterns.clear();
        Ok(&self.arguments)
    }

    /// Compile the generated source with optimizations enabled
    pub fn compile(&mut self) -> SimResult<()> {
        let source = self.source_path.clone().ok_or_else(|| SimError::Compilation {
            diagnostics: "no evaluator source has been generated".to_string(),
        })?;
        let dir = self.ensure_work_dir()?;
        let binary = self.config.binary_path(&dir);
        toolchain::compile(&self.config, &source, &binary)?;
        self.statistics.compilations += 1;
        self.binary_path = Some(binary);
        Ok(())
    }

    /// Encode and queue `rows`; on error the queue is left unchanged
    pub fn add_patterns(&mut self, rows: &[Assignment]) -> SimResult<()> {
        let base = self.patterns.len();
        let encoded = rows
            .iter()
            .enumerate()
            .map(|(i, row)| encode_row(&self.arguments, row, base + i))
            .collect::<SimResult<Vec<_>>>()?;
        debug!(rows = encoded.len(), "queued patterns");
        self.patterns.extend(encoded);
        Ok(())
    }

    pub fn clear_patterns(&mut self) {
        self.patterns.clear();
    }

    /// Write the pending rows to `input`, run the evaluator and leave one
    /// result line per row in `output`
    pub fn simulate(&mut self, input: &Path, output: &Path) -> SimResult<()> {
        let binary = self
            .binary_path
            .clone()
            .ok_or_else(|| SimError::Execution("evaluator has not been compiled".to_string()))?;
        std::fs::write(input, self.patterns.render()).map_err(|e| {
            SimError::Execution(format!("cannot write patterns to {}: {}", input.display(), e))
        })?;
        if self.patterns.is_empty() {
            std::fs::write(output, "").map_err(|e| {
                SimError::Execution(format!("cannot open {}: {}", output.display(), e))
            })?;
            debug!("empty batch, evaluator not run");
        } else {
            toolchain::execute(&binary, input, output)?;
        }

        let produced = read_lines(output)?.len();
        if produced != self.patterns.len() {
            return Err(SimError::Execution(format!(
                "malformed output: expected {} rows, found {}",
                self.patterns.len(),
                produced
            )));
        }
        self.statistics.simulations += 1;
        self.statistics.rows_simulated += produced as u64;
        info!(rows = produced, "simulated patterns");
        Ok(())
    }

    /// Simulate the pending rows using the configured pattern/result files
    pub fn run_pending(&mut self) -> SimResult<PathBuf> {
        let dir = self.ensure_work_dir()?;
        let input = self.config.pattern_path(&dir);
        let output = self.config.result_path(&dir);
        self.simulate(&input, &output)?;
        Ok(output)
    }

    /// True iff every line of `output` is the truthy token
    pub fn check_all_satisfied(&self, output: &Path) -> SimResult<bool> {
        let file = File::open(output).map_err(|e| {
            SimError::Execution(format!("cannot open {}: {}", output.display(), e))
        })?;
        for (row, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                SimError::Execution(format!("cannot read {}: {}", output.display(), e))
            })?;
            if line != TRUTHY {
                debug!(row, value = %line, "row not satisfied");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Result lines of `output`, one per simulated row
    pub fn read_results(&self, output: &Path) -> SimResult<Vec<String>> {
        read_lines(output)
    }
}

impl BatchOracle for SimulationManager {
    fn all_satisfied(&mut self, rows: &[Assignment]) -> SimResult<bool> {
        self.clear_patterns();
        self.add_patterns(rows)?;
        let output = self.run_pending()?;
        self.check_all_satisfied(&output)
    }
}

fn read_lines(path: &Path) -> SimResult<Vec<String>> {
    let file = File::open(path)
        .map_err(|e| SimError::Execution(format!("cannot open {}: {}", path.display(), e)))?;
    BufReader::new(file)
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SimError::Execution(format!("cannot read {}: {}", path.display(), e)))
}
