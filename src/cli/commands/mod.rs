// コマンドハンドラー層
// 各CLIコマンドの実装

pub mod build;
pub mod check;
pub mod diff;

use crate::adapters::output_writer::OutputFile;
use crate::core::stage::{Stage, StageOutput};
use colored::Colorize;
use tracing::warn;

/// 生成結果（ステージ別件数、警告、出力ファイル）をフォーマット
///
/// `dry_run` の場合は各ファイルの内容もそのまま含めます。
pub(crate) fn format_generation_summary(
    title: &str,
    output: &StageOutput,
    files: &[OutputFile],
    dry_run: bool,
) -> String {
    let mut text = String::new();

    text.push_str(&format!("{}\n\n", format!("=== {} ===", title).bold()));

    if dry_run {
        for file in files {
            text.push_str(&format!(
                "{}\n",
                format!("--- {} ---", file.path.display()).bold()
            ));
            text.push_str(&file.content);
            text.push('\n');
        }
    }

    if !output.warnings().is_empty() {
        text.push_str(&format!("{}\n", "--- Warnings ---".yellow().bold()));
        for warning in output.warnings() {
            warn!(kind = ?warning.kind, "{}", warning.message);
            text.push_str(&format!("{} {}\n", "⚠".yellow(), warning.format().yellow()));
        }
        text.push('\n');
    }

    text.push_str(&format!("{}\n", "=== Summary ===".bold()));
    if output.is_collapsed() {
        text.push_str(&format!("Statements: {}\n", output.len()));
    } else {
        for stage in Stage::ALL {
            text.push_str(&format!(
                "{}: {} statement(s)\n",
                stage,
                output.stage(stage).len()
            ));
        }
    }

    let warning_line = format!("Warnings: {}", output.warnings().len());
    if output.warnings().is_empty() {
        text.push_str(&format!("{}\n", warning_line.green()));
    } else {
        text.push_str(&format!("{}\n", warning_line.yellow().bold()));
    }

    if dry_run {
        text.push_str(&format!("Files (not written): {}\n", files.len()));
    } else {
        text.push_str(&format!("Files written: {}\n", files.len()));
        for file in files {
            text.push_str(&format!(
                "  {} {} ({} statement(s))\n",
                "✓".green(),
                file.path.display(),
                file.statement_count
            ));
        }
    }

    text
}
