// buildコマンドハンドラー
//
// 定義からデータベースを新規構築するスクリプトを生成します。
// - 定義ファイルの読み込み
// - 構築スクリプトの生成
// - 出力ファイルの書き出し（--dry-run では表示のみ）

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
use std::path::PathBuf;

/// buildコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct BuildCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// 設定ファイルのパス（指定されない場合はデフォルトパスを使用）
    pub config_path: Option<PathBuf>,
    /// 定義ファイルまたはディレクトリ
    pub definition_path: PathBuf,
    /// 設定を上書きするオプション
    pub options: GenerationOptions,
}

/// buildコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct BuildCommandHandler {}

impl BuildCommandHandler {
    /// 新しいBuildCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// buildコマンドを実行
    ///
    /// # Arguments
    ///
    /// * `command` - buildコマンドのパラメータ
    ///
    /// # Returns
    ///
    /// 成功時は生成結果のサマリー
    pub fn execute(&self, command: &BuildCommand) -> Result<String> {
        let context = CommandContext::load(
            &command.project_path,
            command.config_path.as_deref(),
            &command.options,
        )?;
        let ctx = context.run_context();

        let definition_path = context.resolve_path(&command.definition_path);
        let definition = DefinitionLoader::new()
            .load(&definition_path)
            .with_context(|| format!("Failed to load definition: {:?}", definition_path))?;

        let renderer = renderer_for(&ctx);
        let output = DiffOrchestrator::new(ctx, renderer.as_ref())
            .build(&definition)
            .with_context(|| "Failed to generate build script")?;

        let checksum = DefinitionChecksum::new().calculate(&definition)?;
        let writer = OutputWriter::new(context.output_prefix(), &ctx);
        let files = if command.options.dry_run {
            writer.render_files(&output, &checksum, Utc::now())
        } else {
            writer.write(&output, &checksum)?
        };

        Ok(format_generation_summary(
            "Build Script",
            &output,
            &files,
            command.options.dry_run,
        ))
    }
}
