//! Compilation and batch execution of generated evaluators

pub mod config;
pub mod manager;
pub mod pattern;
pub mod toolchain;

pub use config::SimConfig;
pub use manager::{SimStatistics, SimulationManager, TRUTHY};
pub use pattern::{encode_row, encode_value, Assignment, PatternQueue};
