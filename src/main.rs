use clap::{Parser, Subcommand};
use smtsim::semantics::evaluate_rows;
use smtsim::validation::{
    generate_edge_case_patterns, generate_random_patterns, RandomPatternConfig,
};
use smtsim::{generate_source, Argument, Assignment, Formula, FormulaFile, NodeId, SimConfig};
use smtsim::{SimError, SimulationManager};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

// --- Command Line Arguments ---

#[derive(Parser)]
#[command(name = "smtsim")]
#[command(about = "smtsim - native batch simulation of SMT formulas")]
#[command(version)]
#[command(subcommand_required = true)]
#[command(arg_required_else_help = true)]
struct Args {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the evaluator source for a formula
    Gen {
        /// Formula graph (JSON)
        formula: PathBuf,
        /// Destination of the generated source (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Generate, compile and run the evaluator over a pattern set
    Sim {
        /// Formula graph (JSON)
        formula: PathBuf,
        /// Pattern rows (JSON array of symbol -> value maps)
        #[arg(long, conflicts_with = "random", required_unless_present = "random")]
        patterns: Option<PathBuf>,
        /// Generate this many random rows instead of reading patterns
        #[arg(long)]
        random: Option<usize>,
        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,
        /// Append edge-case rows to the random ones
        #[arg(long, requires = "random")]
        edge_cases: bool,
        /// Directory for the source, binary, pattern and result files
        #[arg(long)]
        work_dir: Option<PathBuf>,
        /// Rust compiler executable
        #[arg(long)]
        compiler: Option<PathBuf>,
        /// Optimization level passed to the compiler
        #[arg(long, default_value = "3")]
        opt_level: u8,
        /// Cross-check every row against the reference evaluator
        #[arg(long)]
        verify: bool,
    },
    /// Evaluate pattern rows with the reference evaluator only
    Eval {
        /// Formula graph (JSON)
        formula: PathBuf,
        /// Pattern rows (JSON array of symbol -> value maps)
        #[arg(long)]
        patterns: PathBuf,
    },
}

// --- Input Files ---

fn load_formula(path: &Path) -> Result<(Formula, NodeId), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path).map_err(|e| SimError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file: FormulaFile = serde_json::from_str(&text)?;
    Ok(Formula::from_file(file)?)
}

fn load_patterns(path: &Path) -> Result<Vec<Assignment>, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path).map_err(|e| SimError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn print_arguments(args: &[Argument], to_stderr: bool) {
    for (i, arg) in args.iter().enumerate() {
        let line = format!("column {}: {} -> {} ({})", i, arg.name, arg.ident, arg.ty);
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

// --- Commands ---

fn run_gen(formula_path: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let (formula, root) = load_formula(formula_path)?;
    match output {
        Some(path) => {
            let mut manager = SimulationManager::new(SimConfig::default());
            let args = manager.generate_to(&formula, root, path)?;
            print_arguments(args, false);
            println!("Wrote {}", path.display());
        }
        None => {
            let generated = generate_source(&formula, root)?;
            print_arguments(&generated.arguments, true);
            print!("{}", generated.source);
        }
    }
    Ok(())
}

struct SimOptions {
    patterns: Option<PathBuf>,
    random: Option<usize>,
    seed: Option<u64>,
    edge_cases: bool,
    work_dir: Option<PathBuf>,
    compiler: Option<PathBuf>,
    opt_level: u8,
    verify: bool,
}

fn run_sim(formula_path: &Path, options: SimOptions) -> Result<(), Box<dyn std::error::Error>> {
    let (formula, root) = load_formula(formula_path)?;

    let mut config = SimConfig::default().with_opt_level(options.opt_level);
    if let Some(dir) = options.work_dir {
        config = config.with_work_dir(dir);
    }
    if let Some(compiler) = options.compiler {
        config = config.with_compiler(compiler);
    }
    let mut manager = SimulationManager::new(config);
    let args = manager.generate(&formula, root)?.to_vec();

    let rows = match (&options.patterns, options.random) {
        (Some(path), _) => load_patterns(path)?,
        (None, Some(count)) => {
            let cfg = RandomPatternConfig::default()
                .with_count(count)
                .with_seed_option(options.seed);
            let mut rows = generate_random_patterns(&args, &cfg);
            if options.edge_cases {
                rows.extend(generate_edge_case_patterns(&args));
            }
            rows
        }
        (None, None) => return Err("either --patterns or --random is required".into()),
    };

    manager.compile()?;
    manager.add_patterns(&rows)?;
    let output = manager.run_pending()?;
    let results = manager.read_results(&output)?;
    for (i, line) in results.iter().enumerate() {
        println!("row {}: {}", i, line);
    }

    if options.verify {
        let expected = evaluate_rows(&formula, root, &rows)?;
        let mismatches: Vec<usize> = expected
            .iter()
            .zip(&results)
            .enumerate()
            .filter(|(_, (e, got))| e.render() != **got)
            .map(|(i, _)| i)
            .collect();
        if !mismatches.is_empty() {
            return Err(format!(
                "{} of {} rows disagree with the reference evaluator (first: row {})",
                mismatches.len(),
                rows.len(),
                mismatches[0]
            )
            .into());
        }
        println!("Verified {} rows against the reference evaluator", rows.len());
    }

    let all = manager.check_all_satisfied(&output)?;
    info!(rows = rows.len(), all_satisfied = all, "simulation finished");
    println!("All satisfied: {}", all);
    Ok(())
}

fn run_eval(formula_path: &Path, patterns: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (formula, root) = load_formula(formula_path)?;
    let rows = load_patterns(patterns)?;
    let values = evaluate_rows(&formula, root, &rows)?;
    for (i, value) in values.iter().enumerate() {
        println!("row {}: {}", i, value);
    }
    let all = values.iter().all(|v| v.as_bool() == Some(true));
    println!("All satisfied: {}", all);
    Ok(())
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    let result = match args.command {
        Commands::Gen { formula, output } => run_gen(&formula, output.as_deref()),
        Commands::Sim {
            formula,
            patterns,
            random,
            seed,
            edge_cases,
            work_dir,
            compiler,
            opt_level,
            verify,
        } => run_sim(
            &formula,
            SimOptions {
                patterns,
                random,
                seed,
                edge_cases,
                work_dir,
                compiler,
                opt_level,
                verify,
            },
        ),
        Commands::Eval { formula, patterns } => run_eval(&formula, &patterns),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
