// checkコマンドハンドラー
//
// 定義の検証と依存順序の解決のみを行い、SQLは生成しません。

use crate::services::definition_loader::DefinitionLoader;
use crate::services::definition_validator::{DefinitionValidator, ValidationSummary};
use crate::services::dependency_resolver::DependencyResolver;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

/// checkコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct CheckCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// 定義ファイルまたはディレクトリ
    pub definition_path: PathBuf,
}

/// checkコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct CheckCommandHandler {}

impl CheckCommandHandler {
    /// 新しいCheckCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// checkコマンドを実行
    ///
    /// # Returns
    ///
    /// 検証結果と作成順序のサマリー
    ///
    /// # Errors
    ///
    /// 定義の読み込み・検証に失敗した場合、または依存関係が循環している場合
    pub fn execute(&self, command: &CheckCommand) -> Result<String> {
        let definition_path = if command.definition_path.is_absolute() {
            command.definition_path.clone()
        } else {
            command.project_path.join(&command.definition_path)
        };

        let definition = DefinitionLoader::new()
            .load(&definition_path)
            .with_context(|| format!("Failed to load definition: {:?}", definition_path))?;

        let summary = DefinitionValidator::new()
            .validate(&definition)
            .with_context(|| "Definition validation failed")?;

        let resolver = DependencyResolver::new(&definition);
        let tables = resolver
            .table_order()
            .with_context(|| "Failed to resolve table order")?;
        let views = resolver
            .view_order()
            .with_context(|| "Failed to resolve view order")?;

        let table_order: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
        let view_order: Vec<String> = views.iter().map(|v| v.to_string()).collect();
        Ok(self.format_check_result(&summary, &table_order, &view_order))
    }

    /// 検証結果をフォーマット
    fn format_check_result(
        &self,
        summary: &ValidationSummary,
        table_order: &[String],
        view_order: &[String],
    ) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n\n", "=== Definition Check ===".bold()));

        output.push_str("Table creation order:\n");
        for (i, table) in table_order.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, table));
        }
        if !view_order.is_empty() {
            output.push_str("View creation order:\n");
            for (i, view) in view_order.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, view));
            }
        }

        output.push_str(&format!("\n{}\n", "=== Statistics ===".bold()));
        output.push_str(&format!("Schemas: {}\n", summary.schemas));
        output.push_str(&format!("Tables: {}\n", summary.tables));
        output.push_str(&format!("Views: {}\n", summary.views));
        output.push_str(&format!("Constraints: {}\n", summary.constraints));
        output.push_str(&format!("Rows: {}\n", summary.rows));

        output.push_str(&format!(
            "\n{}\n",
            "✓ Check complete. No errors found.".green()
        ));
        output
    }
}
