//! Random and edge-case pattern rows for an argument list

use crate::codegen::{Argument, TargetType};
use crate::ir::types::bv_mask;
use crate::ir::Value;
use crate::sim::Assignment;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Configuration for random pattern generation
#[derive(Debug, Clone)]
pub struct RandomPatternConfig {
    /// Number of rows to generate
    pub count: usize,
    /// Inclusive range for Int arguments
    pub int_range: (i64, i64),
    /// Largest denominator for Real arguments
    pub max_denominator: i64,
    /// Seed for reproducible rows (None draws from the thread RNG)
    pub seed: Option<u64>,
}

impl Default for RandomPatternConfig {
    fn default() -> Self {
        Self {
            count: 10,
            int_range: (-1000, 1000),
            max_denominator: 16,
            seed: None,
        }
    }
}

impl RandomPatternConfig {
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_int_range(mut self, lo: i64, hi: i64) -> Self {
        self.int_range = (lo.min(hi), lo.max(hi));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_seed_option(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

fn random_value(rng: &mut impl Rng, ty: TargetType, config: &RandomPatternConfig) -> Value {
    match ty {
        TargetType::Bool => Value::Bool(rng.random()),
        TargetType::Int => {
            let (lo, hi) = config.int_range;
            Value::Int(rng.random_range(lo..=hi))
        }
        TargetType::Real => {
            let (lo, hi) = config.int_range;
            let denom = rng.random_range(1..=config.max_denominator.max(1));
            Value::real(rng.random_range(lo..=hi), denom)
        }
        TargetType::BitVec(w) => Value::bv(rng.random::<u64>(), w),
    }
}

/// Generate `config.count` random rows binding every argument
pub fn generate_random_patterns(args: &[Argument], config: &RandomPatternConfig) -> Vec<Assignment> {
    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    };
    (0..config.count)
        .map(|_| {
            args.iter()
                .map(|a| (a.name.clone(), random_value(&mut rng, a.ty, config)))
                .collect()
        })
        .collect()
}

/// Boundary values of a type: zero, one, all-ones, and the signed extremes
fn edge_values(ty: TargetType) -> Vec<Value> {
    match ty {
        TargetType::Bool => vec![Value::Bool(false), Value::Bool(true)],
        TargetType::Int => vec![
            Value::Int(0),
            Value::Int(1),
            Value::Int(-1),
            Value::Int(i64::MAX),
            Value::Int(i64::MIN),
        ],
        TargetType::Real => vec![
            Value::real(0, 1),
            Value::real(1, 1),
            Value::real(-1, 1),
            Value::real(1, 2),
        ],
        TargetType::BitVec(w) => {
            let mask = bv_mask(w);
            let sign = 1u64 << (w - 1);
            let mut values = vec![0, 1, mask, sign, sign.wrapping_sub(1) & mask];
            values.dedup();
            values.into_iter().map(|v| Value::bv(v, w)).collect()
        }
    }
}

/// Rows setting every argument to the same edge-case slot, plus the pairwise
/// combinations of the first two arguments' edge values
pub fn generate_edge_case_patterns(args: &[Argument]) -> Vec<Assignment> {
    let per_arg: Vec<Vec<Value>> = args.iter().map(|a| edge_values(a.ty)).collect();
    let slots = per_arg.iter().map(Vec::len).max().unwrap_or(0);

    let mut rows: Vec<Assignment> = (0..slots)
        .map(|i| {
            args.iter()
                .zip(&per_arg)
                .map(|(a, vals)| (a.name.clone(), vals[i % vals.len()]))
                .collect()
        })
        .collect();

    if args.len() >= 2 {
        for v0 in &per_arg[0] {
            for v1 in &per_arg[1] {
                let mut row = rows[0].clone();
                row.insert(args[0].name.clone(), *v0);
                row.insert(args[1].name.clone(), *v1);
                if !rows.contains(&row) {
                    rows.push(row);
                }
            }
        }
    }
    rows
}
