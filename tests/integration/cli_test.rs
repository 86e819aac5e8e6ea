use smtsim::{Assignment, Formula, NodeId, Sort, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_smtsim"))
}

fn compiler() -> String {
    std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string())
}

fn write_formula(dir: &Path, formula: &Formula, root: NodeId) -> PathBuf {
    let path = dir.join("formula.json");
    let json = serde_json::to_string_pretty(&formula.to_file(root)).unwrap();
    fs::write(&path, json).unwrap();
    path
}

fn write_patterns(dir: &Path, rows: &[Assignment]) -> PathBuf {
    let path = dir.join("patterns.json");
    fs::write(&path, serde_json::to_string(rows).unwrap()).unwrap();
    path
}

fn expect_success(output: &Output) -> String {
    if !output.status.success() {
        panic!(
            "Command failed with status: {:?}\nstderr: {}\nstdout: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr),
            String::from_utf8_lossy(&output.stdout)
        );
    }
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// `(x + y) bvult 200` over 8-bit vectors
fn bounded_sum() -> (Formula, NodeId) {
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::BitVec(8));
    let y = f.symbol("y", Sort::BitVec(8));
    let sum = f.bv_add(x, y);
    let bound = f.bv(200, 8);
    let root = f.bv_ult(sum, bound);
    (f, root)
}

fn bv_row(x: u64, y: u64) -> Assignment {
    [
        ("x".to_string(), Value::bv(x, 8)),
        ("y".to_string(), Value::bv(y, 8)),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_gen_writes_source() {
    let dir = tempfile::tempdir().unwrap();
    let (f, root) = bounded_sum();
    let formula = write_formula(dir.path(), &f, root);
    let source = dir.path().join("eval.rs");

    let output = Command::new(get_binary_path())
        .arg("gen")
        .arg(&formula)
        .arg("--output")
        .arg(&source)
        .output()
        .expect("Failed to execute smtsim");
    let stdout = expect_success(&output);

    assert!(stdout.contains("column 0: x -> v_x (Bv<8>)"));
    assert!(stdout.contains("column 1: y -> v_y (Bv<8>)"));
    let text = fs::read_to_string(&source).unwrap();
    assert!(text.contains("fn formula(v_x: Bv<8>, v_y: Bv<8>) -> bool"));
}

#[test]
fn test_gen_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let (f, root) = bounded_sum();
    let formula = write_formula(dir.path(), &f, root);

    let output = Command::new(get_binary_path())
        .arg("gen")
        .arg(&formula)
        .output()
        .expect("Failed to execute smtsim");
    let stdout = expect_success(&output);

    assert!(stdout.contains("fn main()"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("column 0: x"));
}

#[test]
fn test_sim_with_patterns_and_verify() {
    let dir = tempfile::tempdir().unwrap();
    let (f, root) = bounded_sum();
    let formula = write_formula(dir.path(), &f, root);
    let patterns = write_patterns(dir.path(), &[bv_row(10, 20), bv_row(150, 60), bv_row(255, 2)]);

    let output = Command::new(get_binary_path())
        .arg("sim")
        .arg(&formula)
        .arg("--patterns")
        .arg(&patterns)
        .arg("--work-dir")
        .arg(dir.path().join("work"))
        .arg("--compiler")
        .arg(compiler())
        .arg("--verify")
        .output()
        .expect("Failed to execute smtsim");
    let stdout = expect_success(&output);

    assert!(stdout.contains("row 0: 1"));
    assert!(stdout.contains("row 1: 0"));
    // 255 + 2 wraps to 1
    assert!(stdout.contains("row 2: 1"));
    assert!(stdout.contains("Verified 3 rows against the reference evaluator"));
    assert!(stdout.contains("All satisfied: false"));
}

#[test]
fn test_sim_random_rows_verify() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let a = f.symbol("a", Sort::Int);
    let b = f.symbol("b", Sort::Int);
    let q = f.div(&[a, b]);
    let prod = f.times(&[q, b]);
    let root = f.le(prod, a);
    let formula = write_formula(dir.path(), &f, root);

    let output = Command::new(get_binary_path())
        .arg("sim")
        .arg(&formula)
        .arg("--random")
        .arg("50")
        .arg("--seed")
        .arg("11")
        .arg("--edge-cases")
        .arg("--work-dir")
        .arg(dir.path().join("work"))
        .arg("--compiler")
        .arg(compiler())
        .arg("--verify")
        .output()
        .expect("Failed to execute smtsim");
    let stdout = expect_success(&output);

    assert!(stdout.contains("row 49:"));
    assert!(stdout.contains("Verified"));
}

#[test]
fn test_eval_reference_only() {
    let dir = tempfile::tempdir().unwrap();
    let (f, root) = bounded_sum();
    let formula = write_formula(dir.path(), &f, root);
    let patterns = write_patterns(dir.path(), &[bv_row(1, 1), bv_row(0, 199)]);

    let output = Command::new(get_binary_path())
        .arg("eval")
        .arg(&formula)
        .arg("--patterns")
        .arg(&patterns)
        .output()
        .expect("Failed to execute smtsim");
    let stdout = expect_success(&output);

    assert!(stdout.contains("row 0: 1"));
    assert!(stdout.contains("row 1: 1"));
    assert!(stdout.contains("All satisfied: true"));
}

#[test]
fn test_unsupported_operator_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = Formula::new();
    let x = f.symbol("x", Sort::BitVec(8));
    let wide = f.bv_zext(x, 8);
    let zero = f.bv(0, 16);
    let root = f.equals(wide, zero);
    let formula = write_formula(dir.path(), &f, root);
    let source = dir.path().join("eval.rs");

    let output = Command::new(get_binary_path())
        .arg("gen")
        .arg(&formula)
        .arg("--output")
        .arg(&source)
        .output()
        .expect("Failed to execute smtsim");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bv_zext"), "stderr: {}", stderr);
    assert!(!source.exists());
}

#[test]
fn test_missing_formula_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(get_binary_path())
        .arg("eval")
        .arg(dir.path().join("absent.json"))
        .arg("--patterns")
        .arg(dir.path().join("absent_patterns.json"))
        .output()
        .expect("Failed to execute smtsim");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}
