//! CLI command implementations for dpdk-telemetry-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and endpoint validation
//! - `config`: Configuration file generation
//! - `rates`: Console view of per-port packet rates

pub mod check;
pub mod config;
pub mod rates;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use rates::command_rates;
