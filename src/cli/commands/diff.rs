// diffコマンドハンドラー
//
// 2つの定義を比較し、4ステージのアップグレードスクリプトを生成します。

use crate::adapters::output_writer::OutputWriter;
use crate::adapters::sql_renderer::renderer_for;
use crate::cli::command_context::CommandContext;
use crate::cli::commands::format_generation_summary;
use crate::cli::GenerationOptions;
use crate::services::definition_checksum::DefinitionChecksum;
use crate::services::definition_loader::DefinitionLoader;
use crate::services::diff_orchestrator::DiffOrchestrator;
use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use std::path::PathBuf;

/// diffコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct DiffCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// 設定ファイルのパス
    pub config_path: Option<PathBuf>,
    /// 現在の定義
    pub old_path: PathBuf,
    /// 目標の定義
    pub new_path: PathBuf,
    /// 設定を上書きするオプション
    pub options: GenerationOptions,
}

/// diffコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct DiffCommandHandler {}

impl DiffCommandHandler {
    /// 新しいDiffCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// diffコマンドを実行
    ///
    /// 差分がない場合はファイルを書き出さずにその旨を返します。
    pub fn execute(&self, command: &DiffCommand) -> Result<String> {
        let context = CommandContext::load(
            &command.project_path,
            command.config_path.as_deref(),
            &command.options,
        )?;
        let ctx = context.run_context();

        let loader = DefinitionLoader::new();
        let old_path = context.resolve_path(&command.old_path);
        let old = loader
            .load(&old_path)
            .with_context(|| format!("Failed to load old definition: {:?}", old_path))?;
        let new_path = context.resolve_path(&command.new_path);
        let new = loader
            .load(&new_path)
            .with_context(|| format!("Failed to load new definition: {:?}", new_path))?;

        let renderer = renderer_for(&ctx);
        let output = DiffOrchestrator::new(ctx, renderer.as_ref())
            .diff(&old, &new)
            .with_context(|| "Failed to generate upgrade script")?;

        if output.is_empty() && output.warnings().is_empty() {
            return Ok(format!(
                "{}",
                "No differences found. No upgrade files were generated.".green()
            ));
        }

        let checksum = DefinitionChecksum::new().calculate(&new)?;
        let writer = OutputWriter::new(context.output_prefix(), &ctx);
        let files = if command.options.dry_run {
            writer.render_files(&output, &checksum, Utc::now())
        } else {
            writer.write(&output, &checksum)?
        };

        Ok(format_generation_summary(
            "Upgrade Script",
            &output,
            &files,
            command.options.dry_run,
        ))
    }
}
