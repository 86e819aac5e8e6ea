//! Blocking invocation of the Rust compiler and of compiled evaluators

use crate::error::{SimError, SimResult};
use crate::sim::config::SimConfig;
use std::path::Path;
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info};

/// Captured result of an external command
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    /// Combined diagnostic text, stderr first
    pub fn diagnostics(&self) -> String {
        let mut text = self.stderr.trim().to_string();
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stdout);
        }
        if text.is_empty() {
            text = match self.code {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            };
        }
        text
    }
}

/// Run `cmd` to completion and capture its output
pub fn run_command(cmd: &mut Command) -> std::io::Result<CommandOutcome> {
    debug!(command = ?cmd, "spawning");
    let output = cmd.output()?;
    Ok(CommandOutcome {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Compiler invocation for `source`
///
/// Overflow checks and debug assertions are always off so Int arithmetic
/// wraps at every optimization level.
pub fn compile_command(config: &SimConfig, source: &Path, binary: &Path) -> Command {
    let mut cmd = Command::new(&config.compiler);
    cmd.arg("--edition")
        .arg("2021")
        .arg("-C")
        .arg(format!("opt-level={}", config.opt_level))
        .arg("-C")
        .arg("overflow-checks=off")
        .arg("-C")
        .arg("debug-assertions=off")
        .arg("--crate-type")
        .arg("bin")
        .arg("-o")
        .arg(binary)
        .args(&config.extra_args)
        .arg(source);
    cmd
}

/// Compile `source` into `binary` with optimizations enabled
pub fn compile(config: &SimConfig, source: &Path, binary: &Path) -> SimResult<()> {
    let start = Instant::now();
    let mut cmd = compile_command(config, source, binary);

    let outcome = run_command(&mut cmd).map_err(|e| SimError::Compilation {
        diagnostics: format!("cannot run {}: {}", config.compiler.display(), e),
    })?;
    if !outcome.success {
        return Err(SimError::Compilation {
            diagnostics: outcome.diagnostics(),
        });
    }
    if !binary.exists() {
        return Err(SimError::Compilation {
            diagnostics: format!(
                "{} succeeded but {} was not produced",
                config.compiler.display(),
                binary.display()
            ),
        });
    }
    info!(
        binary = %binary.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "compiled evaluator"
    );
    Ok(())
}

/// Run a compiled evaluator over `input`, writing results to `output`
pub fn execute(binary: &Path, input: &Path, output: &Path) -> SimResult<()> {
    if !binary.exists() {
        return Err(SimError::Execution(format!(
            "evaluator {} does not exist",
            binary.display()
        )));
    }
    let outcome = run_command(Command::new(binary).arg(input).arg(output)).map_err(|e| {
        SimError::Execution(format!("cannot run {}: {}", binary.display(), e))
    })?;
    if !outcome.success {
        return Err(SimError::Execution(outcome.diagnostics()));
    }
    Ok(())
}
