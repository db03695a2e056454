//! CLI argument definitions using clap
//!
//! Commands:
//! - fq-connector serve --config <path>
//! - fq-connector check-config --config <path>
//! - fq-connector describe --config <path> --kind <kind> --table <table>
//! - fq-connector list-splits --config <path>   (request JSON on stdin)
//! - fq-connector read-splits --config <path>   (request JSON on stdin)

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::api::DataSourceKind;

/// Query federation connector
#[derive(Parser, Debug)]
#[command(name = "fq-connector")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the connector server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./fq-connector.json")]
        config: PathBuf,
    },

    /// Validate a configuration file and its catalogs, then exit
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./fq-connector.json")]
        config: PathBuf,
    },

    /// Print the schema of one table
    Describe {
        /// Path to configuration file
        #[arg(long, default_value = "./fq-connector.json")]
        config: PathBuf,

        #[arg(long, value_enum)]
        kind: KindArg,

        /// Database, or bucket for object storage
        #[arg(long, default_value = "")]
        database: String,

        #[arg(long)]
        table: String,
    },

    /// Run one ListSplits request read from stdin
    ListSplits {
        /// Path to configuration file
        #[arg(long, default_value = "./fq-connector.json")]
        config: PathBuf,
    },

    /// Run one ReadSplits request read from stdin
    ReadSplits {
        /// Path to configuration file
        #[arg(long, default_value = "./fq-connector.json")]
        config: PathBuf,
    },
}

/// Data source kinds served in-process
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Memory,
    ObjectStorage,
}

impl From<KindArg> for DataSourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Memory => DataSourceKind::Memory,
            KindArg::ObjectStorage => DataSourceKind::ObjectStorage,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
