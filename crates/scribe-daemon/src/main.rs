//! Scribe index daemon
//!
//! Maintains the primary and fallback search engines for the scribe
//! content store.
//!
//! # Usage
//!
//! ```bash
//! scribe run [--sync-interval SECS] [--cleanup-interval SECS]
//! scribe rebuild
//! scribe sync [--all-types]
//! scribe status
//! scribe search "tokio runtime" --type post
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/scribe/config.toml)
//! 3. Environment variables (SCRIBE_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use scribe_daemon::{execute, init_logging, load_settings, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(&cli)?;
    init_logging(&settings)?;

    execute(cli.command, settings).await
}
