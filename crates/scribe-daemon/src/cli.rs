//! CLI argument parsing for the scribe index daemon.
//!
//! CLI flags override every other config source.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use scribe_types::{EngineKind, EntityType};

/// Scribe search index maintenance
///
/// Keeps the primary and fallback search engines consistent with the
/// system-of-record.
#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/scribe/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    /// Override search index path
    #[arg(long, global = true)]
    pub index_path: Option<String>,

    /// Override the primary engine (tantivy, database)
    #[arg(long, global = true)]
    pub primary: Option<EngineKind>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run periodic sync and cleanup in the foreground until Ctrl-C
    Run {
        /// Override sync interval in seconds
        #[arg(long)]
        sync_interval: Option<u64>,

        /// Override cleanup interval in seconds
        #[arg(long)]
        cleanup_interval: Option<u64>,
    },

    /// Clear every engine and reindex all entities
    Rebuild,

    /// Add missing and refresh present documents
    Sync {
        /// Cover categories, tags and users as well as posts
        #[arg(long)]
        all_types: bool,
    },

    /// Remove documents whose entity no longer exists
    Cleanup,

    /// Cleanup followed by engine compaction
    Optimize,

    /// Show index health and counts
    Status,

    /// Index one entity
    Index {
        entity_type: EntityType,
        id: u64,
    },

    /// Remove one entity from every engine
    Remove {
        entity_type: EntityType,
        id: u64,
    },

    /// Search the primary engine
    Search {
        query: String,

        /// Restrict to one entity type
        #[arg(short = 't', long = "type")]
        entity_type: Option<EntityType>,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Load JSON-lines entities into the system-of-record
    Import {
        file: PathBuf,

        /// Index each imported entity as well
        #[arg(long)]
        index: bool,
    },

    /// Show storage statistics
    Stats,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
