// CLI Layer
// ユーザー入力の受付とコマンドルーティング

pub mod command_context;
pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// stagediff - Staged schema upgrade script generator
///
/// Compares two declarative database definitions and writes
/// the SQL that upgrades one into the other, split into four stages.
#[derive(Parser, Debug)]
#[command(name = "stagediff")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Staged schema upgrade script generator")]
#[command(long_about = "stagediff - Staged schema upgrade script generator

Reads declarative YAML definitions of schemas, tables, views, constraints
and reference data, and generates SQL scripts that either build a fresh
database or upgrade an existing one.

Upgrade scripts are split into four ordered stages:
  stage1  structural changes that must precede data changes
  stage2  deletions of reference data rows
  stage3  structural changes that depend on the new data
  stage4  inserts/updates of reference data and foreign keys

Supported databases: PostgreSQL, MySQL")]
#[command(propagate_version = true)]
#[command(after_help = "GETTING STARTED:
  1. Check a definition:         stagediff check schema/
  2. Generate a build script:    stagediff build schema/ --dialect postgresql
  3. Generate an upgrade:        stagediff diff old/ schema/

For detailed help on each command, use: stagediff <command> --help")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// 生成系コマンド共通のオプション（設定ファイルの値を上書き）
#[derive(Args, Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Database dialect (postgresql, mysql)
    #[arg(short, long, value_name = "DIALECT")]
    pub dialect: Option<String>,

    /// Output file prefix (e.g. output/app)
    #[arg(short, long, value_name = "PREFIX")]
    pub output: Option<PathBuf>,

    /// Maximum number of statements per output file
    #[arg(long, value_name = "COUNT")]
    pub statement_limit: Option<usize>,

    /// Quote every identifier
    #[arg(long)]
    pub quote_identifiers: bool,

    /// Leave structural stages without BEGIN/COMMIT for replication tooling
    #[arg(long)]
    pub slonik: bool,

    /// Merge the four stages into a single stream
    #[arg(long)]
    pub single_stage: bool,

    /// Ignore old_table_name / old_column_name declarations
    #[arg(long)]
    pub ignore_old_names: bool,

    /// Drop and recreate every view
    #[arg(long)]
    pub always_recreate_views: bool,

    /// Print the generated SQL instead of writing files
    #[arg(long)]
    pub dry_run: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a script that builds a fresh database
    ///
    /// EXAMPLES:
    ///   # Build script for PostgreSQL
    ///   stagediff build schema/ --dialect postgresql
    ///
    ///   # Preview without writing files
    ///   stagediff build schema/ --dry-run
    Build {
        /// Definition file or directory
        #[arg(value_name = "DEFINITION")]
        definition: PathBuf,

        #[command(flatten)]
        options: GenerationOptions,
    },

    /// Generate a staged upgrade script between two definitions
    ///
    /// EXAMPLES:
    ///   # Upgrade from the released definition to the working copy
    ///   stagediff diff release/schema/ schema/
    ///
    ///   # Single stream, 500 statements per file
    ///   stagediff diff old.yaml new.yaml --single-stage --statement-limit 500
    Diff {
        /// Current definition file or directory
        #[arg(value_name = "OLD")]
        old: PathBuf,

        /// Target definition file or directory
        #[arg(value_name = "NEW")]
        new: PathBuf,

        #[command(flatten)]
        options: GenerationOptions,
    },

    /// Validate a definition and resolve its dependency order
    ///
    /// EXAMPLES:
    ///   stagediff check schema/
    Check {
        /// Definition file or directory
        #[arg(value_name = "DEFINITION")]
        definition: PathBuf,
    },
}
