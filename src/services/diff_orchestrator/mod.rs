// 差分オーケストレーター
//
// 構築（Build）または差分（Diff）を実行し、4つの順序付きストリームを生成する。
// 処理は以下のパスで構成される:
// 1. literal_sql - BEFORE タグ付きのカスタムSQL
// 2. view_stages - 変更されたビューの削除
// 3. structure_stages - スキーマ/型/シーケンス/関数、制約の削除、テーブル構造
// 4. view_stages - ビューの再作成
// 5. data_stages - 行の削除・挿入・更新と外部キーの作成
// 6. literal_sql - 残りのカスタムSQL

mod data_stages;
mod literal_sql;
mod structure_stages;
mod view_stages;

use crate::adapters::sql_renderer::{Capability, StatementRenderer};
use crate::core::config::RunContext;
use crate::core::definition::{Definition, SqlStage};
use crate::core::error::{EngineError, EngineWarning, ErrorLocation};
use crate::core::object_ref::{TableRef, ViewRef};
use crate::core::operation::Operation;
use crate::core::stage::{Stage, StageOutput, Statement};
use crate::services::constraint_reconciler::ConstraintReconciler;
use crate::services::definition_validator::DefinitionValidator;
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::reference_resolver::ReferenceResolver;
use crate::services::rename_registry::RenameRegistry;
use tracing::{debug, info, warn};

/// 操作をレンダリングしてステージ出力に追記するシンク
pub(crate) struct StageSink<'r> {
    output: StageOutput,
    renderer: &'r dyn StatementRenderer,
}

impl<'r> StageSink<'r> {
    fn new(output: StageOutput, renderer: &'r dyn StatementRenderer) -> Self {
        Self { output, renderer }
    }

    pub(crate) fn renderer(&self) -> &'r dyn StatementRenderer {
        self.renderer
    }

    /// 操作を指定ステージに追記
    ///
    /// 方言が表現できない機能を必要とする操作は出力せず、警告を記録します。
    pub(crate) fn emit(&mut self, stage: Stage, operation: &Operation) {
        if let Some((capability, name)) = Capability::required_by(operation) {
            if !self.renderer.supports(capability) {
                self.unsupported(
                    capability,
                    &format!("{} {}", operation.label(), name),
                    ErrorLocation {
                        schema: Some(name.schema.clone()),
                        ..ErrorLocation::default()
                    },
                );
                return;
            }
        }
        for sql in self.renderer.render(operation) {
            self.output.push(Statement::generated(stage, sql));
        }
    }

    pub(crate) fn emit_all<'o>(
        &mut self,
        stage: Stage,
        operations: impl IntoIterator<Item = &'o Operation>,
    ) {
        for operation in operations {
            self.emit(stage, operation);
        }
    }

    /// 方言が表現できない機能をスキップしたことを警告として記録
    pub(crate) fn unsupported(
        &mut self,
        capability: Capability,
        subject: &str,
        location: ErrorLocation,
    ) {
        let dialect = self.renderer.dialect();
        warn!(
            subject = %subject,
            capability = %capability,
            dialect = %dialect,
            "Skipping construct not supported by dialect"
        );
        self.output.warn(EngineWarning::unsupported_change(
            format!("{} skipped: {} not supported by {}", subject, capability, dialect),
            Some(location),
        ));
    }

    pub(crate) fn literal(&mut self, stage: Stage, sql: &str, tag: Option<SqlStage>) {
        self.output.push(Statement::literal(stage, sql, tag));
    }

    pub(crate) fn warn_all(&mut self, warnings: impl IntoIterator<Item = EngineWarning>) {
        for warning in warnings {
            self.output.warn(warning);
        }
    }

    fn finish(self) -> StageOutput {
        self.output
    }
}

/// 1回の差分実行の状態
///
/// 新旧の定義、解決済みの順序、検証済みのリネームを保持します。
pub(crate) struct DiffContext<'a> {
    pub ctx: RunContext,
    pub old: &'a Definition,
    pub new: &'a Definition,
    pub old_references: ReferenceResolver<'a>,
    pub new_references: ReferenceResolver<'a>,
    pub renames: RenameRegistry<'a>,
    pub old_tables: Vec<TableRef<'a>>,
    pub new_tables: Vec<TableRef<'a>>,
    pub old_views: Vec<ViewRef<'a>>,
    pub new_views: Vec<ViewRef<'a>>,
}

impl<'a> DiffContext<'a> {
    fn new(ctx: RunContext, old: &'a Definition, new: &'a Definition) -> Result<Self, EngineError> {
        let validator = DefinitionValidator::new();
        validator.validate(old)?;
        validator.validate(new)?;

        let old_resolver = DependencyResolver::new(old);
        let new_resolver = DependencyResolver::new(new);

        Ok(Self {
            ctx,
            old,
            new,
            old_references: ReferenceResolver::new(old),
            new_references: ReferenceResolver::new(new),
            renames: RenameRegistry::build(old, new, &ctx)?,
            old_tables: old_resolver.table_order()?,
            new_tables: new_resolver.table_order()?,
            old_views: old_resolver.view_order()?,
            new_views: new_resolver.view_order()?,
        })
    }

    /// 新しいテーブルに対応する古いテーブル（リネーム元、または同名のテーブル）
    pub fn old_counterpart(&self, new: TableRef<'a>) -> Option<TableRef<'a>> {
        self.renames.old_table_for(new).or_else(|| {
            self.old_references
                .find_table(&new.schema.name, &new.table.name)
        })
    }

    /// 古いテーブルに対応する新しいテーブル
    pub fn new_counterpart(&self, old: TableRef<'a>) -> Option<TableRef<'a>> {
        self.renames.new_table_for(old).or_else(|| {
            self.new_references
                .find_table(&old.schema.name, &old.table.name)
                .filter(|new| !self.renames.is_renamed(*new))
        })
    }

    pub fn reconciler(&self) -> ConstraintReconciler<'_, 'a> {
        ConstraintReconciler::new(self.old_references, self.new_references, &self.renames)
    }
}

/// 差分オーケストレーター
pub struct DiffOrchestrator<'r> {
    ctx: RunContext,
    renderer: &'r dyn StatementRenderer,
}

impl<'r> DiffOrchestrator<'r> {
    /// 新しいDiffOrchestratorを作成
    ///
    /// # Arguments
    ///
    /// * `ctx` - 実行コンテキスト
    /// * `renderer` - 対象方言のレンダラー
    pub fn new(ctx: RunContext, renderer: &'r dyn StatementRenderer) -> Self {
        Self { ctx, renderer }
    }

    /// 定義からデータベースを新規構築するスクリプトを生成
    ///
    /// # Returns
    ///
    /// 1ストリームにまとめられたステージ出力
    pub fn build(&self, definition: &Definition) -> Result<StageOutput, EngineError> {
        DefinitionValidator::new().validate(definition)?;
        let references = ReferenceResolver::new(definition);
        let resolver = DependencyResolver::new(definition);
        let tables = resolver.table_order()?;
        let views = resolver.view_order()?;

        let mut sink = StageSink::new(StageOutput::build(), self.renderer);

        literal_sql::emit_before(&mut sink, definition);
        structure_stages::build_schemas(&mut sink, definition);
        for &table in &tables {
            structure_stages::create_table(&mut sink, &references, table)?;
        }
        structure_stages::build_other_constraints(&mut sink, &references, &tables)?;
        view_stages::build_views(&mut sink, &views);
        data_stages::build_data(&mut sink, &references, &tables)?;
        literal_sql::emit_after(&mut sink, None, definition);

        let output = sink.finish();
        info!(
            dialect = %self.ctx.dialect,
            tables = tables.len(),
            statements = output.len(),
            warnings = output.warnings().len(),
            "Build script generated"
        );
        Ok(output)
    }

    /// 2つの定義の差分からアップグレードスクリプトを生成
    ///
    /// # Arguments
    ///
    /// * `old` - 現在の定義
    /// * `new` - 目標の定義
    ///
    /// # Returns
    ///
    /// 4ステージの出力（`single_stage` の場合は1ストリーム）
    pub fn diff(&self, old: &Definition, new: &Definition) -> Result<StageOutput, EngineError> {
        let dc = DiffContext::new(self.ctx, old, new)?;
        debug!(
            old_tables = dc.old_tables.len(),
            new_tables = dc.new_tables.len(),
            renames = dc.renames.len(),
            "Resolved dependency order"
        );

        let mut sink = StageSink::new(StageOutput::upgrade(), self.renderer);

        // 1. BEFORE タグ付きのカスタムSQL
        literal_sql::emit_before(&mut sink, new);

        // 2. ビューの削除、スキーマとスキーマレベルオブジェクトの作成
        let dropped_views = view_stages::drop_views(&mut sink, &dc);
        let schema_object_drops = structure_stages::diff_schemas(&mut sink, &dc);

        // 3. 制約の削除
        structure_stages::drop_constraints(&mut sink, &dc)?;

        // 4. テーブル構造
        let created_tables = structure_stages::diff_tables(&mut sink, &dc)?;
        structure_stages::drop_tables(&mut sink, &dc);
        structure_stages::drop_schema_objects(&mut sink, &dc, &schema_object_drops);

        // 5. 主キー・外部キー以外の制約の作成
        structure_stages::create_other_constraints(&mut sink, &dc)?;

        // 6. ビューの作成
        view_stages::create_views(&mut sink, &dc, &dropped_views);

        // 7. データ
        data_stages::diff_data(&mut sink, &dc, &created_tables)?;

        // 8. 残りのカスタムSQL
        literal_sql::emit_after(&mut sink, Some(old), new);

        let mut output = sink.finish();
        if self.ctx.single_stage {
            output.collapse();
        }
        info!(
            dialect = %self.ctx.dialect,
            statements = output.len(),
            warnings = output.warnings().len(),
            "Upgrade script generated"
        );
        Ok(output)
    }
}
