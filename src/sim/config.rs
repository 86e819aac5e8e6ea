//! Configuration for compiling and running generated evaluators

use std::path::{Path, PathBuf};

/// Toolchain and artifact locations for one simulation session
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Directory receiving the source, binary and pattern files
    ///
    /// None gives every session its own temporary directory, removed when
    /// the session is dropped.
    pub work_dir: Option<PathBuf>,
    /// File name of the generated source
    pub source_name: String,
    /// File name of the compiled evaluator (platform suffix added)
    pub binary_name: String,
    /// Rust compiler executable
    pub compiler: PathBuf,
    /// Value passed as `-C opt-level`
    pub opt_level: u8,
    /// Additional compiler flags
    pub extra_args: Vec<String>,
    /// Default pattern file name used by [`super::SimulationManager::run_pending`]
    pub pattern_file: String,
    /// Default result file name used by [`super::SimulationManager::run_pending`]
    pub result_file: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            source_name: "formula.rs".to_string(),
            binary_name: "formula_eval".to_string(),
            compiler: PathBuf::from("rustc"),
            opt_level: 3,
            extra_args: Vec::new(),
            pattern_file: "sim_pattern".to_string(),
            result_file: "sim_result".to_string(),
        }
    }
}

impl SimConfig {
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_compiler(mut self, compiler: impl Into<PathBuf>) -> Self {
        self.compiler = compiler.into();
        self
    }

    pub fn with_opt_level(mut self, level: u8) -> Self {
        self.opt_level = level;
        self
    }

    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn source_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.source_name)
    }

    pub fn binary_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}{}", self.binary_name, std::env::consts::EXE_SUFFIX))
    }

    pub fn pattern_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.pattern_file)
    }

    pub fn result_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.result_file)
    }
}
