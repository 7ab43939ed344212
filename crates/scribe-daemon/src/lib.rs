//! Scribe daemon library exports.
//!
//! This crate provides the `scribe` CLI binary for index maintenance.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, rebuild, sync, cleanup, ...)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    apply_overrides, execute, import_entities, init_logging, load_settings, open_service,
    run_maintenance_loop, ImportSummary,
};
