use anyhow::Result;
use clap::Parser;
use colored::control as color_control;
use stagediff::cli::commands::build::{BuildCommand, BuildCommandHandler};
use stagediff::cli::commands::check::{CheckCommand, CheckCommandHandler};
use stagediff::cli::commands::diff::{DiffCommand, DiffCommandHandler};
use stagediff::cli::{Cli, Commands};
use std::env;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // CLIをパースして実行
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match run_command(cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// ログ出力を初期化する
///
/// `--verbose` では debug、それ以外は `RUST_LOG`（未設定なら warn）
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// コマンドを実行する
fn run_command(cli: Cli) -> Result<String> {
    // --no-color フラグの処理
    if cli.no_color {
        color_control::set_override(false);
    }

    // プロジェクトのルートパスを取得
    let project_path = env::current_dir()?;
    let config_path = cli.config;

    match cli.command {
        Commands::Build {
            definition,
            options,
        } => {
            let handler = BuildCommandHandler::new();
            let command = BuildCommand {
                project_path,
                config_path,
                definition_path: definition,
                options,
            };
            handler.execute(&command)
        }

        Commands::Diff { old, new, options } => {
            let handler = DiffCommandHandler::new();
            let command = DiffCommand {
                project_path,
                config_path,
                old_path: old,
                new_path: new,
                options,
            };
            handler.execute(&command)
        }

        Commands::Check { definition } => {
            let handler = CheckCommandHandler::new();
            let command = CheckCommand {
                project_path,
                definition_path: definition,
            };
            handler.execute(&command)
        }
    }
}
