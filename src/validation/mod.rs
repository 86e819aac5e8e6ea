//! Pattern sources for simulation runs

pub mod random;

pub use random::{generate_edge_case_patterns, generate_random_patterns, RandomPatternConfig};
