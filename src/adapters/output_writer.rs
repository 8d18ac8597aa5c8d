// 出力ライターアダプター
//
// ステージ出力をSQLファイルに分割して書き出します。
// ファイルごとに生成日時と定義のチェックサムをヘッダーに記録し、
// トランザクション可能なステージは BEGIN; / COMMIT; で囲みます。

use crate::core::config::RunContext;
use crate::core::error::IoError;
use crate::core::naming::APP_NAME;
use crate::core::stage::{OutputKind, Stage, StageOutput, Statement};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 書き出すファイル1つ分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    /// 対象ステージ（まとめられた出力では `None`）
    pub stage: Option<Stage>,
    /// 1始まりの分割番号
    pub part: usize,
    pub statement_count: usize,
    pub content: String,
}

/// 出力ライター
#[derive(Debug, Clone)]
pub struct OutputWriter {
    prefix: PathBuf,
    statement_limit: usize,
    slonik_mode: bool,
}

impl OutputWriter {
    /// 新しいOutputWriterを作成
    ///
    /// # Arguments
    ///
    /// * `prefix` - 出力ファイルのプレフィックス（例: `output/stagediff`）
    /// * `ctx` - 実行コンテキスト（分割数とslonikモード）
    pub fn new(prefix: impl Into<PathBuf>, ctx: &RunContext) -> Self {
        Self {
            prefix: prefix.into(),
            statement_limit: ctx.statement_limit.max(1),
            slonik_mode: ctx.slonik_mode,
        }
    }

    /// ファイル内容を組み立てる（書き込みは行わない）
    ///
    /// # Arguments
    ///
    /// * `output` - ステージ出力
    /// * `checksum` - 新しい定義のチェックサム
    /// * `generated_at` - ヘッダーに記録する生成日時
    pub fn render_files(
        &self,
        output: &StageOutput,
        checksum: &str,
        generated_at: DateTime<Utc>,
    ) -> Vec<OutputFile> {
        let mut files = Vec::new();

        if output.is_collapsed() {
            let statements: Vec<&Statement> = output.statements().collect();
            let label = match output.kind() {
                OutputKind::Build => "build",
                OutputKind::Upgrade => "upgrade",
            };
            let transactional = !self.slonik_mode;
            for (index, chunk) in statements.chunks(self.statement_limit).enumerate() {
                let part = index + 1;
                files.push(OutputFile {
                    path: self.file_path(&format!("{}_{}", label, part)),
                    stage: None,
                    part,
                    statement_count: chunk.len(),
                    content: self.file_content(chunk, transactional, checksum, generated_at),
                });
            }
            return files;
        }

        for (stage, statements) in output.streams() {
            let statements: Vec<&Statement> = statements.iter().collect();
            let transactional = stage.is_transactional(self.slonik_mode);
            for (index, chunk) in statements.chunks(self.statement_limit).enumerate() {
                let part = index + 1;
                files.push(OutputFile {
                    path: self.file_path(&format!("upgrade_{}_{}", stage, part)),
                    stage: Some(stage),
                    part,
                    statement_count: chunk.len(),
                    content: self.file_content(chunk, transactional, checksum, generated_at),
                });
            }
        }
        files
    }

    /// ファイルを書き出す
    ///
    /// # Returns
    ///
    /// 書き出したファイル（パスと内容）
    ///
    /// # Errors
    ///
    /// 出力ディレクトリの作成、またはファイルの書き込みに失敗した場合
    pub fn write(&self, output: &StageOutput, checksum: &str) -> Result<Vec<OutputFile>> {
        let files = self.render_files(output, checksum, Utc::now());

        if let Some(parent) = self.prefix.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| IoError::DirectoryCreate {
                path: parent.display().to_string(),
                cause: e.to_string(),
            })?;
        }

        for file in &files {
            fs::write(&file.path, &file.content).map_err(|e| IoError::FileWrite {
                path: file.path.display().to_string(),
                cause: e.to_string(),
            })?;
            debug!(
                path = %file.path.display(),
                statements = file.statement_count,
                "Wrote output file"
            );
        }
        Ok(files)
    }

    fn file_path(&self, suffix: &str) -> PathBuf {
        let base = self
            .prefix
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(APP_NAME);
        let file_name = format!("{}_{}.sql", base, suffix);
        match self.prefix.parent() {
            Some(parent) => parent.join(file_name),
            None => Path::new(&file_name).to_path_buf(),
        }
    }

    fn file_content(
        &self,
        statements: &[&Statement],
        transactional: bool,
        checksum: &str,
        generated_at: DateTime<Utc>,
    ) -> String {
        let mut content = format!(
            "-- Generated by {} at {}\n-- Definition checksum: {}\n\n",
            APP_NAME,
            generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            checksum
        );
        if transactional {
            content.push_str("BEGIN;\n\n");
        }
        for statement in statements {
            content.push_str(statement.sql.trim_end());
            content.push_str("\n\n");
        }
        if transactional {
            content.push_str("COMMIT;\n");
        }
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Dialect;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_file_path_uses_prefix() {
        let writer = OutputWriter::new("out/app", &RunContext::new(Dialect::PostgreSQL));
        assert_eq!(
            writer.file_path("upgrade_stage1_1"),
            PathBuf::from("out/app_upgrade_stage1_1.sql")
        );
    }

    #[test]
    fn test_header_and_transaction() {
        let writer = OutputWriter::new("app", &RunContext::new(Dialect::PostgreSQL));
        let mut output = StageOutput::upgrade();
        output.push(Statement::generated(Stage::Stage2, "DELETE FROM t WHERE id = 1;"));

        let files = writer.render_files(&output, "abc123", fixed_time());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("app_upgrade_stage2_1.sql"));
        assert!(files[0]
            .content
            .starts_with("-- Generated by stagediff at 2024-01-02 03:04:05 UTC\n"));
        assert!(files[0].content.contains("-- Definition checksum: abc123"));
        assert!(files[0].content.contains("BEGIN;"));
        assert!(files[0].content.ends_with("COMMIT;\n"));
    }

    #[test]
    fn test_slonik_mode_leaves_structural_stages_unwrapped() {
        let ctx = RunContext::new(Dialect::PostgreSQL).with_slonik_mode(true);
        let writer = OutputWriter::new("app", &ctx);
        let mut output = StageOutput::upgrade();
        output.push(Statement::generated(Stage::Stage1, "CREATE TABLE a (id int);"));
        output.push(Statement::generated(Stage::Stage4, "INSERT INTO a VALUES (1);"));

        let files = writer.render_files(&output, "x", fixed_time());
        assert_eq!(files.len(), 2);
        assert!(!files[0].content.contains("BEGIN;"));
        assert!(files[1].content.contains("BEGIN;"));
    }
}
