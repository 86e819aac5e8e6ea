use smtsim::semantics::{evaluate, evaluate_rows};
use smtsim::sim::TRUTHY;
use smtsim::{Assignment, Formula, NodeId, SimConfig, SimError, SimulationManager, Sort, Value};
use std::path::Path;

fn compiler() -> String {
    std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string())
}

fn manager(dir: &Path) -> SimulationManager {
    SimulationManager::new(
        SimConfig::default()
            .with_work_dir(dir)
            .with_compiler(compiler()),
    )
}

fn row(pairs: &[(&str, Value)]) -> Assignment {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Generate, compile and run `root` over `rows`, returning the result lines
fn simulate(dir: &Path, formula: &Formula, root: NodeId, rows: &[Assignment]) -> Vec<String> {
    let mut mgr = manager(dir);
    mgr.generate(formula, root).unwrap();
    if let Err(e) = mgr.compile() {
        panic!("evaluator failed to compile: {e}");
    }
    mgr.add_patterns(rows).unwrap();
    let output = mgr.run_pending().unwrap();
    mgr.read_results(&output).unwrap()
}

#[test]
fn test_linear_arithmetic_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::Int);
    let y = f.symbol("y", Sort::Int);
    let two = f.int(2);
    let y2 = f.times(&[y, two]);
    let root = f.plus(&[x, y2]);

    let results = simulate(
        dir.path(),
        &f,
        root,
        &[row(&[("x", Value::Int(3)), ("y", Value::Int(4))])],
    );
    assert_eq!(results, vec!["11"]);
}

#[test]
fn test_xnor_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let a = f.symbol("a", Sort::Bool);
    let b = f.symbol("b", Sort::Bool);
    let both = f.and(&[a, b]);
    let na = f.not(a);
    let nb = f.not(b);
    let neither = f.and(&[na, nb]);
    let root = f.or(&[both, neither]);

    let rows = vec![
        row(&[("a", Value::Bool(true)), ("b", Value::Bool(true))]),
        row(&[("a", Value::Bool(true)), ("b", Value::Bool(false))]),
        row(&[("a", Value::Bool(false)), ("b", Value::Bool(false))]),
    ];
    let mut mgr = manager(dir.path());
    mgr.generate(&f, root).unwrap();
    mgr.compile().unwrap();
    mgr.add_patterns(&rows).unwrap();
    let output = mgr.run_pending().unwrap();
    assert_eq!(mgr.read_results(&output).unwrap(), vec!["1", "0", "1"]);
    assert!(!mgr.check_all_satisfied(&output).unwrap());

    mgr.clear_patterns();
    mgr.add_patterns(&[rows[0].clone(), rows[2].clone()]).unwrap();
    let output = mgr.run_pending().unwrap();
    assert!(mgr.check_all_satisfied(&output).unwrap());
}

#[test]
fn test_bitvector_concat_extract_matches_reference() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::BitVec(16));
    let y = f.symbol("y", Sort::BitVec(16));
    let c = f.bv_concat(x, y);
    let lo = f.bv_extract(c, 0, 7);
    let mid = f.bv_extract(c, 10, 17);
    let root = f.bv_add(lo, mid);

    let r = row(&[("x", Value::bv(0x00FF, 16)), ("y", Value::bv(0x1234, 16))]);
    let native = simulate(dir.path(), &f, root, &[r.clone()]);
    let reference = evaluate(&f, root, &r).unwrap();
    assert_eq!(reference.render(), "248");
    assert_eq!(native, vec![reference.render()]);
}

#[test]
fn test_bitvector_operators_agree_with_reference() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::BitVec(8));
    let y = f.symbol("y", Sort::BitVec(8));
    let sum = f.bv_add(x, y);
    let prod = f.bv_mul(x, y);
    let udiv = f.bv_udiv(x, y);
    let sdiv = f.bv_sdiv(x, y);
    let shifted = f.bv_ashr(x, y);
    let lshr = f.bv_lshr(prod, y);
    let neg = f.bv_neg(sdiv);
    let inv = f.bv_not(udiv);
    let mixed = f.bv_xor(inv, neg);
    let mixed = f.bv_or(mixed, shifted);
    let mixed = f.bv_sub(mixed, lshr);
    let lt = f.bv_slt(mixed, sum);
    let le = f.bv_ule(sum, mixed);
    let root = f.iff(lt, le);

    let pairs = [
        (0u64, 0u64),
        (5, 0),
        (0x80, 0),
        (0x80, 0xFF),
        (0x7F, 3),
        (200, 9),
        (1, 200),
        (0xFF, 0xFF),
    ];
    let rows: Vec<Assignment> = pairs
        .iter()
        .map(|(a, b)| row(&[("x", Value::bv(*a, 8)), ("y", Value::bv(*b, 8))]))
        .collect();

    let native = simulate(dir.path(), &f, root, &rows);
    let reference: Vec<String> = evaluate_rows(&f, root, &rows)
        .unwrap()
        .iter()
        .map(|v| v.render())
        .collect();
    assert_eq!(native, reference);
}

#[test]
fn test_int_and_real_semantics_agree_with_reference() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let i = f.symbol("i", Sort::Int);
    let j = f.symbol("j", Sort::Int);
    let r = f.symbol("r", Sort::Real);
    let q = f.div(&[i, j]);
    let neg = f.neg(q);
    let half = f.real(1, 2);
    let scaled = f.times(&[r, half]);
    let zero = f.real(0, 1);
    let positive = f.lt(zero, scaled);
    let choice = f.ite(positive, neg, q);
    let three = f.int(3);
    let root = f.le(choice, three);

    let rows = vec![
        row(&[("i", Value::Int(-7)), ("j", Value::Int(2)), ("r", Value::real(3, 4))]),
        row(&[("i", Value::Int(7)), ("j", Value::Int(0)), ("r", Value::real(-1, 3))]),
        row(&[("i", Value::Int(9)), ("j", Value::Int(-2)), ("r", Value::real(0, 1))]),
        row(&[("i", Value::Int(i64::MIN)), ("j", Value::Int(-1)), ("r", Value::real(5, 1))]),
    ];
    let native = simulate(dir.path(), &f, root, &rows);
    let reference: Vec<String> = evaluate_rows(&f, root, &rows)
        .unwrap()
        .iter()
        .map(|v| v.render())
        .collect();
    assert_eq!(native, reference);
}

#[test]
fn test_shared_subformula_declared_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let a = f.symbol("a", Sort::Bool);
    let b = f.symbol("b", Sort::Bool);
    let shared = f.implies(a, b);
    let left = f.and(&[shared, a]);
    let right = f.or(&[shared, b]);
    let root = f.and(&[left, right, shared]);

    let mut mgr = manager(dir.path());
    mgr.generate(&f, root).unwrap();
    let source = std::fs::read_to_string(mgr.source_path().unwrap()).unwrap();
    assert_eq!(source.matches("!v_a || v_b").count(), 1);
    assert_eq!(source.matches("let bool0: bool").count(), 1);
}

#[test]
fn test_regeneration_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let z = f.symbol("z.2", Sort::Int);
    let a = f.symbol("a|b", Sort::Bool);
    let x = f.symbol("x", Sort::BitVec(4));
    let zero = f.int(0);
    let cmp = f.lt(zero, z);
    let fifteen = f.bv(15, 4);
    let full = f.equals(x, fifteen);
    let root = f.ite(a, cmp, full);

    let mut mgr = manager(dir.path());
    let first = mgr.generate(&f, root).unwrap().to_vec();
    let first_source = std::fs::read_to_string(mgr.source_path().unwrap()).unwrap();
    let second = mgr.generate(&f, root).unwrap().to_vec();
    let second_source = std::fs::read_to_string(mgr.source_path().unwrap()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_source, second_source);
    let names: Vec<&str> = first.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["a|b", "z.2", "x"]);
    let idents: Vec<&str> = first.iter().map(|a| a.ident.as_str()).collect();
    assert_eq!(idents, vec!["v_a_b", "v_z_2", "v_x"]);
}

#[test]
fn test_array_select_fails_before_any_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let arr = f.symbol("arr", Sort::Array(Box::new(Sort::Int), Box::new(Sort::Int)));
    let i = f.symbol("i", Sort::Int);
    let sel = f.select(arr, i);
    let zero = f.int(0);
    let root = f.equals(sel, zero);

    let mut mgr = manager(dir.path());
    match mgr.generate(&f, root) {
        Err(SimError::OperatorNotSupported { op }) => assert_eq!(op, "array_select"),
        other => panic!("expected OperatorNotSupported, got {other:?}"),
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_unsupported_bitvector_operators_are_named() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::BitVec(8));
    let cases = [
        (f.bv_rol(x, 1), "bv_rol"),
        (f.bv_zext(x, 8), "bv_zext"),
        (f.bv_sext(x, 8), "bv_sext"),
        (f.bv_urem(x, x), "bv_urem"),
        (f.bv_to_natural(x), "bv_tonatural"),
    ];
    let mut mgr = manager(dir.path());
    for (root, name) in cases {
        match mgr.generate(&f, root) {
            Err(SimError::OperatorNotSupported { op }) => assert_eq!(op, name),
            other => panic!("expected OperatorNotSupported for {name}, got {other:?}"),
        }
    }
}

#[test]
fn test_pattern_file_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let r = f.symbol("r", Sort::Real);
    let b = f.symbol("b", Sort::Bool);
    let v = f.symbol("v", Sort::BitVec(16));
    let zero = f.real(0, 1);
    let pos = f.lt(zero, r);
    let ones = f.bv(0xFFFF, 16);
    let full = f.equals(v, ones);
    let root = f.and(&[pos, b, full]);

    let mut mgr = manager(dir.path());
    mgr.generate(&f, root).unwrap();
    mgr.compile().unwrap();
    mgr.add_patterns(&[
        row(&[("r", Value::real(7, 2)), ("b", Value::Bool(true)), ("v", Value::bv(0xFFFF, 16))]),
        row(&[("r", Value::real(-1, 4)), ("b", Value::Bool(false)), ("v", Value::bv(1, 16))]),
    ])
    .unwrap();
    let output = mgr.run_pending().unwrap();

    let patterns = std::fs::read_to_string(mgr.pattern_path().unwrap()).unwrap();
    assert_eq!(patterns, "2\n3.5 1 65535\n-0.25 0 1\n");
    assert_eq!(mgr.read_results(&output).unwrap(), vec![TRUTHY, "0"]);
}

#[test]
fn test_compile_error_carries_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let a = f.symbol("a", Sort::Bool);
    let root = f.not(a);
    let mut mgr = SimulationManager::new(
        SimConfig::default()
            .with_work_dir(dir.path())
            .with_compiler(compiler())
            .with_extra_arg("--definitely-not-a-rustc-flag"),
    );
    mgr.generate(&f, root).unwrap();
    match mgr.compile() {
        Err(SimError::Compilation { diagnostics }) => assert!(!diagnostics.is_empty()),
        other => panic!("expected a compilation error, got {other:?}"),
    }
}

#[test]
fn test_driver_rejects_short_pattern_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let a = f.symbol("a", Sort::Bool);
    let root = f.not(a);
    let mut mgr = manager(dir.path());
    mgr.generate(&f, root).unwrap();
    mgr.compile().unwrap();

    // Header claims three rows, only one follows
    let input = dir.path().join("short_patterns");
    let output = dir.path().join("short_results");
    std::fs::write(&input, "3\n1\n").unwrap();
    let result = std::process::Command::new(mgr.binary_path().unwrap())
        .arg(&input)
        .arg(&output)
        .output()
        .expect("Failed to execute evaluator");
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("row 1"));
}

#[test]
fn test_batch_oracle_replaces_pending_rows() {
    use smtsim::BatchOracle;

    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::Int);
    let zero = f.int(0);
    let root = f.le(zero, x);

    let mut mgr = manager(dir.path());
    mgr.generate(&f, root).unwrap();
    mgr.compile().unwrap();
    mgr.add_patterns(&[row(&[("x", Value::Int(-5))])]).unwrap();

    let good = vec![row(&[("x", Value::Int(0))]), row(&[("x", Value::Int(9))])];
    assert!(mgr.all_satisfied(&good).unwrap());
    let bad = vec![row(&[("x", Value::Int(4))]), row(&[("x", Value::Int(-1))])];
    assert!(!mgr.all_satisfied(&bad).unwrap());
    assert_eq!(mgr.statistics().simulations, 2);
    assert_eq!(mgr.statistics().rows_simulated, 4);
}

fn default_session() -> SimulationManager {
    SimulationManager::new(SimConfig::default().with_compiler(compiler()))
}

#[test]
fn test_default_sessions_do_not_share_artifacts() {
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::Int);
    let one = f.int(1);
    let below = f.lt(x, one);
    let mut g = Formula::new();
    let y = g.symbol("y", Sort::Int);
    let one = g.int(1);
    let above = g.lt(one, y);

    let mut first = default_session();
    first.generate(&f, below).unwrap();
    first.compile().unwrap();
    let mut second = default_session();
    second.generate(&g, above).unwrap();
    second.compile().unwrap();
    assert_ne!(first.work_dir().unwrap(), second.work_dir().unwrap());

    first.add_patterns(&[row(&[("x", Value::Int(0))])]).unwrap();
    let output = first.run_pending().unwrap();
    assert_eq!(first.read_results(&output).unwrap(), vec!["1"]);
    assert!(first.check_all_satisfied(&output).unwrap());

    second.add_patterns(&[row(&[("y", Value::Int(0))])]).unwrap();
    let output = second.run_pending().unwrap();
    assert_eq!(second.read_results(&output).unwrap(), vec!["0"]);
}

#[test]
fn test_private_work_dir_removed_with_session() {
    let mut f = Formula::new();
    let a = f.symbol("a", Sort::Bool);
    let root = f.not(a);
    let mut mgr = default_session();
    assert!(mgr.work_dir().is_none());
    mgr.generate(&f, root).unwrap();
    let dir = mgr.work_dir().unwrap().to_path_buf();
    assert!(mgr.source_path().unwrap().starts_with(&dir));
    drop(mgr);
    assert!(!dir.exists());
}

#[test]
fn test_single_operand_nodes_compile() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let a = f.symbol("a", Sort::Bool);
    let x = f.symbol("x", Sort::Int);
    let and = f.and(&[a]);
    let or = f.or(&[and]);
    let sum = f.plus(&[x]);
    let zero = f.int(0);
    let positive = f.lt(zero, sum);
    let root = f.and(&[or, positive]);

    let rows = vec![
        row(&[("a", Value::Bool(true)), ("x", Value::Int(4))]),
        row(&[("a", Value::Bool(false)), ("x", Value::Int(4))]),
        row(&[("a", Value::Bool(true)), ("x", Value::Int(-4))]),
    ];
    let native = simulate(dir.path(), &f, root, &rows);
    assert_eq!(native, vec!["1", "0", "0"]);
    let reference: Vec<String> = evaluate_rows(&f, root, &rows)
        .unwrap()
        .iter()
        .map(|v| v.render())
        .collect();
    assert_eq!(native, reference);
}

#[test]
fn test_int_wraps_without_optimization() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::Int);
    let y = f.symbol("y", Sort::Int);
    let root = f.plus(&[x, y]);
    let r = row(&[("x", Value::Int(i64::MAX)), ("y", Value::Int(1))]);

    let mut mgr = SimulationManager::new(
        SimConfig::default()
            .with_work_dir(dir.path())
            .with_compiler(compiler())
            .with_opt_level(0),
    );
    mgr.generate(&f, root).unwrap();
    mgr.compile().unwrap();
    mgr.add_patterns(&[r.clone()]).unwrap();
    let output = mgr.run_pending().unwrap();
    let reference = evaluate(&f, root, &r).unwrap().render();
    assert_eq!(reference, i64::MIN.to_string());
    assert_eq!(mgr.read_results(&output).unwrap(), vec![reference]);
}

/// A compiled `not a` session with one pending row
fn compiled_negation(dir: &Path) -> SimulationManager {
    let mut f = Formula::new();
    let a = f.symbol("a", Sort::Bool);
    let root = f.not(a);
    let mut mgr = manager(dir);
    mgr.generate(&f, root).unwrap();
    mgr.compile().unwrap();
    mgr.add_patterns(&[row(&[("a", Value::Bool(false))])]).unwrap();
    mgr
}

#[test]
fn test_unwritable_pattern_file_is_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = compiled_negation(dir.path());
    let input = dir.path().join("missing_dir").join("patterns");
    match mgr.simulate(&input, &dir.path().join("results")) {
        Err(SimError::Execution(msg)) => assert!(msg.contains("patterns")),
        other => panic!("expected Execution, got {other:?}"),
    }

    // A directory cannot be written as a file either
    match mgr.simulate(dir.path(), &dir.path().join("results")) {
        Err(SimError::Execution(_)) => {}
        other => panic!("expected Execution, got {other:?}"),
    }
    assert_eq!(mgr.statistics().simulations, 0);
}

#[test]
fn test_unopenable_result_file_is_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = compiled_negation(dir.path());
    let input = dir.path().join("patterns");

    let output = dir.path().join("missing_dir").join("results");
    match mgr.simulate(&input, &output) {
        Err(SimError::Execution(msg)) => assert!(msg.contains("cannot open")),
        other => panic!("expected Execution, got {other:?}"),
    }

    let as_dir = dir.path().join("results_dir");
    std::fs::create_dir(&as_dir).unwrap();
    match mgr.simulate(&input, &as_dir) {
        Err(SimError::Execution(_)) => {}
        other => panic!("expected Execution, got {other:?}"),
    }
    assert_eq!(mgr.statistics().simulations, 0);
}

#[test]
fn test_empty_batch_skips_evaluator() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = compiled_negation(dir.path());
    mgr.clear_patterns();
    let output = mgr.run_pending().unwrap();

    let patterns = std::fs::read_to_string(mgr.pattern_path().unwrap()).unwrap();
    assert_eq!(patterns, "0\n");
    assert!(mgr.read_results(&output).unwrap().is_empty());
    assert!(mgr.check_all_satisfied(&output).unwrap());
    assert_eq!(mgr.statistics().rows_simulated, 0);
}
