use smtsim::search::{Domain, FiniteDomainSolver};
use smtsim::{
    Assignment, EfsmtConfig, EfsmtOutcome, EfsmtSolver, ExistentialSolver, Formula, NodeId,
    SimConfig, SimError, SimResult, SimulationManager, Sort, Value,
};
use std::collections::VecDeque;
use std::path::Path;

fn compiled_oracle(dir: &Path, formula: &Formula, root: NodeId) -> SimulationManager {
    let compiler = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let mut mgr = SimulationManager::new(
        SimConfig::default()
            .with_work_dir(dir)
            .with_compiler(compiler),
    );
    mgr.generate(formula, root).unwrap();
    if let Err(e) = mgr.compile() {
        panic!("evaluator failed to compile: {e}");
    }
    mgr
}

/// `y <= x` over Int symbols
fn upper_bound() -> (Formula, NodeId) {
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::Int);
    let y = f.symbol("y", Sort::Int);
    let root = f.le(y, x);
    (f, root)
}

/// Proposes a fixed list of candidates and ignores witnesses
struct Replay(VecDeque<Assignment>);

impl Replay {
    fn ints(name: &str, values: &[i64]) -> Self {
        Replay(
            values
                .iter()
                .map(|v| [(name.to_string(), Value::Int(*v))].into_iter().collect())
                .collect(),
        )
    }
}

impl ExistentialSolver for Replay {
    fn solve(&mut self) -> SimResult<Option<Assignment>> {
        Ok(self.0.pop_front())
    }

    fn strengthen(&mut self, _witness: &Assignment) -> SimResult<()> {
        Ok(())
    }
}

#[test]
fn test_simulation_gated_loop_finds_bound() {
    let dir = tempfile::tempdir().unwrap();
    let (f, root) = upper_bound();
    let mut oracle = compiled_oracle(dir.path(), &f, root);

    let problem = FiniteDomainSolver::new(
        &f,
        root,
        vec![Domain::ints("x", 0, 10)],
        vec![Domain::ints("y", 0, 5)],
    );
    let mut solver = EfsmtSolver::new(EfsmtConfig::default());
    let outcome = solver
        .run(
            &mut problem.existential(),
            &mut problem.universal(),
            Some(&mut oracle),
        )
        .unwrap();

    assert_eq!(outcome.model().unwrap()["x"], Value::Int(5));
    let stats = solver.statistics();
    assert_eq!(stats.iterations, 6);
    assert_eq!(stats.witnesses, 5);
    assert_eq!(stats.exact_queries, 6);
    assert_eq!(stats.simulations, 5);
    assert_eq!(stats.simulation_rejections, 0);
    assert_eq!(stats.simulation_mismatches, 0);
    assert_eq!(oracle.statistics().simulations, 5);
}

#[test]
fn test_oracle_rejects_stale_candidate() {
    // exists x. forall y. x + y != 7; the replayed x = 0 repeats after its
    // counterexample y = 7 is already known
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::Int);
    let y = f.symbol("y", Sort::Int);
    let sum = f.plus(&[x, y]);
    let seven = f.int(7);
    let hit = f.equals(sum, seven);
    let root = f.not(hit);
    let mut oracle = compiled_oracle(dir.path(), &f, root);

    let problem = FiniteDomainSolver::new(&f, root, vec![], vec![Domain::ints("y", 0, 7)]);
    let mut exists = Replay::ints("x", &[0, 0, 8]);
    let mut solver = EfsmtSolver::new(EfsmtConfig::default());
    let outcome = solver
        .run(&mut exists, &mut problem.universal(), Some(&mut oracle))
        .unwrap();

    assert_eq!(outcome.model().unwrap()["x"], Value::Int(8));
    let stats = solver.statistics();
    assert_eq!(stats.iterations, 3);
    assert_eq!(stats.simulations, 2);
    assert_eq!(stats.simulation_rejections, 1);
    assert_eq!(stats.simulation_mismatches, 0);
    assert_eq!(solver.witnesses().len(), 2);
}

#[test]
fn test_disagreeing_oracle_never_changes_answer() {
    // The oracle checks the strict y < x, so it rejects the true answer
    let dir = tempfile::tempdir().unwrap();
    let (f, root) = upper_bound();
    let mut strict = Formula::new();
    let sx = strict.symbol("x", Sort::Int);
    let sy = strict.symbol("y", Sort::Int);
    let strict_root = strict.lt(sy, sx);
    let mut oracle = compiled_oracle(dir.path(), &strict, strict_root);

    let problem = FiniteDomainSolver::new(
        &f,
        root,
        vec![Domain::ints("x", 0, 10)],
        vec![Domain::ints("y", 0, 5)],
    );
    let mut solver = EfsmtSolver::new(EfsmtConfig::default());
    let outcome = solver
        .run(
            &mut problem.existential(),
            &mut problem.universal(),
            Some(&mut oracle),
        )
        .unwrap();

    assert_eq!(outcome.model().unwrap()["x"], Value::Int(5));
    let stats = solver.statistics();
    assert_eq!(stats.simulations, 5);
    assert_eq!(stats.simulation_rejections, 5);
    assert_eq!(stats.simulation_mismatches, 1);
}

#[test]
fn test_simulation_disabled_skips_oracle() {
    let dir = tempfile::tempdir().unwrap();
    let (f, root) = upper_bound();
    let mut oracle = compiled_oracle(dir.path(), &f, root);

    let problem = FiniteDomainSolver::new(
        &f,
        root,
        vec![Domain::ints("x", 0, 10)],
        vec![Domain::ints("y", 0, 5)],
    );
    let mut solver = EfsmtSolver::new(EfsmtConfig::default().with_simulation(false));
    let outcome = solver
        .run(
            &mut problem.existential(),
            &mut problem.universal(),
            Some(&mut oracle),
        )
        .unwrap();

    assert!(outcome.is_sat());
    assert_eq!(solver.statistics().simulations, 0);
    assert_eq!(oracle.statistics().simulations, 0);
}

#[test]
fn test_bitvector_problem_unsat_with_oracle() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::BitVec(4));
    let y = f.symbol("y", Sort::BitVec(4));
    let masked = f.bv_and(x, y);
    let root = f.equals(masked, y);
    let mut oracle = compiled_oracle(dir.path(), &f, root);

    let xs = (0..0xF).map(|v| Value::bv(v, 4)).collect();
    let problem = FiniteDomainSolver::new(
        &f,
        root,
        vec![Domain::new("x", xs)],
        vec![Domain::full("y", &Sort::BitVec(4)).unwrap()],
    );
    let mut solver = EfsmtSolver::new(EfsmtConfig::default());
    let outcome = solver
        .run(
            &mut problem.existential(),
            &mut problem.universal(),
            Some(&mut oracle),
        )
        .unwrap();

    assert_eq!(outcome, EfsmtOutcome::Unsat);
    assert_eq!(solver.statistics().simulation_rejections, 0);
}

#[test]
fn test_loop_bound_reports_unknown() {
    let (f, root) = upper_bound();
    let problem = FiniteDomainSolver::new(
        &f,
        root,
        vec![Domain::ints("x", 0, 10)],
        vec![Domain::ints("y", 0, 5)],
    );
    let mut solver = EfsmtSolver::new(EfsmtConfig::default().with_max_loops(2));
    match solver.run(&mut problem.existential(), &mut problem.universal(), None) {
        Err(SimError::UnknownResult { iterations }) => assert_eq!(iterations, 2),
        other => panic!("expected UnknownResult, got {other:?}"),
    }
    assert_eq!(solver.witnesses().len(), 2);
}
