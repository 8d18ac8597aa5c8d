// 構造変更のパス
//
// スキーマとスキーマレベルオブジェクト、制約の削除、テーブルの作成・変更・削除を
// ステージに振り分けて出力する。

use super::{DiffContext, StageSink};
use crate::adapters::sql_renderer::Capability;
use crate::core::definition::{Definition, Schema};
use crate::core::error::{EngineError, ErrorLocation};
use crate::core::object_ref::TableRef;
use crate::core::operation::{Operation, QualifiedName};
use crate::core::stage::Stage;
use crate::core::table_constraint::{ConstraintFilter, ConstraintKind};
use crate::services::constraint_reconciler::collect_constraints;
use crate::services::object_differ::ObjectDiffer;
use crate::services::reference_resolver::ReferenceResolver;
use crate::services::table_differ::{column_spec, TableDiffer};
use tracing::debug;

/// 構築時のスキーマと型・シーケンス・関数
pub(super) fn build_schemas(sink: &mut StageSink<'_>, definition: &Definition) {
    for schema in &definition.schemas {
        sink.emit(
            Stage::Stage1,
            &Operation::CreateSchema {
                name: schema.name.clone(),
            },
        );
    }
    let objects = ObjectDiffer::new();
    for schema in &definition.schemas {
        let changes = objects.diff_schema_objects(None, schema);
        sink.emit_all(Stage::Stage1, &changes.creates);
        sink.warn_all(changes.warnings);
    }
}

/// 新しいスキーマとスキーマレベルオブジェクトの作成・変更（Stage1）
///
/// # Returns
///
/// Stage3 で実行する削除操作
pub(super) fn diff_schemas(sink: &mut StageSink<'_>, dc: &DiffContext<'_>) -> Vec<Operation> {
    for schema in &dc.new.schemas {
        if dc.old.get_schema(&schema.name).is_none() {
            sink.emit(
                Stage::Stage1,
                &Operation::CreateSchema {
                    name: schema.name.clone(),
                },
            );
        }
    }

    let objects = ObjectDiffer::new();
    let mut drops = Vec::new();
    for schema in &dc.new.schemas {
        let changes = objects.diff_schema_objects(dc.old.get_schema(&schema.name), schema);
        sink.emit_all(Stage::Stage1, &changes.creates);
        sink.warn_all(changes.warnings);
        drops.extend(changes.drops);
    }
    for schema in &dc.old.schemas {
        if dc.new.get_schema(&schema.name).is_none() {
            let removed = Schema::new(schema.name.clone());
            drops.extend(objects.diff_schema_objects(Some(schema), &removed).drops);
        }
    }
    drops
}

/// 削除された関数・シーケンス・型とスキーマ（Stage3）
pub(super) fn drop_schema_objects(
    sink: &mut StageSink<'_>,
    dc: &DiffContext<'_>,
    drops: &[Operation],
) {
    sink.emit_all(Stage::Stage3, drops);
    for schema in &dc.old.schemas {
        if dc.new.get_schema(&schema.name).is_none() {
            sink.emit(
                Stage::Stage3,
                &Operation::DropSchema {
                    name: schema.name.clone(),
                },
            );
        }
    }
}

/// 制約の削除パス（古いテーブルの逆順）
///
/// プライマリキー、外部キー、同名で再作成される制約、リネームされたテーブルの制約は
/// Stage1 で、それ以外の不要になった制約は Stage3 で削除します。
/// プライマリキーが再作成されるテーブルを参照する外部キーも Stage1 で削除し、
/// Stage4 で再作成します。
/// 削除されるテーブルは外部キーのみを Stage1 で削除します。
pub(super) fn drop_constraints(
    sink: &mut StageSink<'_>,
    dc: &DiffContext<'_>,
) -> Result<(), EngineError> {
    let reconciler = dc.reconciler();

    for &old in dc.old_tables.iter().rev() {
        let Some(new) = dc.new_counterpart(old) else {
            for constraint in
                reconciler.constraints_to_drop(Some(old), None, ConstraintFilter::Foreign)?
            {
                sink.emit(Stage::Stage1, &constraint.drop_operation());
            }
            continue;
        };

        // 自己参照の外部キーはプライマリキーより先に削除する
        let mut drops =
            reconciler.constraints_to_drop(Some(old), Some(new), ConstraintFilter::All)?;
        drops.sort_by_key(|constraint| constraint.kind != ConstraintKind::Foreign);

        if dc.renames.is_renamed(new) {
            for constraint in &drops {
                sink.emit(Stage::Stage1, &constraint.drop_operation());
            }
            continue;
        }

        let creates =
            reconciler.constraints_to_create(Some(old), Some(new), ConstraintFilter::All)?;
        for constraint in drops {
            let recreated = creates.iter().any(|c| c.same_identity(&constraint));
            let stage = if constraint.kind != ConstraintKind::Other || recreated {
                Stage::Stage1
            } else {
                Stage::Stage3
            };
            debug!(
                table = %old,
                constraint = %constraint.name,
                stage = %stage,
                "Dropping constraint"
            );
            sink.emit(stage, &constraint.drop_operation());
        }
    }
    Ok(())
}

/// テーブルの新規作成（Stage1）
///
/// CREATE TABLE、プライマリキー、インデックス、トリガー、権限を出力します。
/// 方言が理解できないテーブルオプション、継承、パーティションは警告として記録して除外します。
pub(super) fn create_table<'a>(
    sink: &mut StageSink<'_>,
    references: &ReferenceResolver<'a>,
    table: TableRef<'a>,
) -> Result<(), EngineError> {
    let mut warnings = Vec::new();
    let options =
        TableDiffer::supported_options(sink.renderer(), table, &table.table.options, &mut warnings);
    let columns = table
        .table
        .columns
        .iter()
        .map(|column| Ok(column_spec(column, references.column_type(table, column)?)))
        .collect::<Result<Vec<_>, EngineError>>()?;
    let target = QualifiedName::from(table);
    let location = ErrorLocation::table(&table.schema.name, &table.table.name);

    let mut inherits = references.parent_table(table)?.map(QualifiedName::from);
    if let Some(parent) = &inherits {
        if !sink.renderer().supports(Capability::TableInheritance) {
            let subject = format!("inheritance of {} from {}", target, parent);
            sink.unsupported(Capability::TableInheritance, &subject, location.clone());
            inherits = None;
        }
    }
    let mut partition = table.table.partition.clone();
    if partition.is_some() && !sink.renderer().supports(Capability::Partitioning) {
        let subject = format!("partitioning of {}", target);
        sink.unsupported(Capability::Partitioning, &subject, location);
        partition = None;
    }

    sink.emit(
        Stage::Stage1,
        &Operation::CreateTable {
            table: target.clone(),
            columns,
            options,
            inherits,
            partition,
        },
    );
    for constraint in collect_constraints(references, table, ConstraintFilter::PrimaryKey)? {
        sink.emit(Stage::Stage1, &constraint.add_operation());
    }
    let objects = ObjectDiffer::new().diff_table_objects(None, table.table, &target);
    sink.emit_all(Stage::Stage1, &objects.creates);
    sink.warn_all(warnings);

    debug!(table = %table, "Creating table");
    Ok(())
}

/// テーブル構造のパス（新しいテーブルの順序）
///
/// # Returns
///
/// 新規作成したテーブル
pub(super) fn diff_tables<'a>(
    sink: &mut StageSink<'_>,
    dc: &DiffContext<'a>,
) -> Result<Vec<TableRef<'a>>, EngineError> {
    let differ = TableDiffer::new(dc.old_references, dc.new_references, sink.renderer(), dc.ctx);
    let reconciler = dc.reconciler();
    let objects = ObjectDiffer::new();
    let mut created = Vec::new();

    for &new in &dc.new_tables {
        let Some(old) = dc.old_counterpart(new) else {
            create_table(sink, &dc.new_references, new)?;
            created.push(new);
            continue;
        };
        let target = QualifiedName::from(new);

        if dc.renames.is_renamed(new) {
            sink.emit(
                Stage::Stage1,
                &Operation::RenameTable {
                    from: QualifiedName::from(old),
                    to: target.clone(),
                },
            );
        }

        let object_changes = objects.diff_table_objects(Some(old.table), new.table, &target);
        sink.emit_all(Stage::Stage1, &object_changes.drops);

        let changes = differ.diff(old, new)?;
        sink.emit_all(Stage::Stage1, &changes.stage1);
        for constraint in
            reconciler.constraints_to_create(Some(old), Some(new), ConstraintFilter::PrimaryKey)?
        {
            sink.emit(Stage::Stage1, &constraint.add_operation());
        }
        sink.emit_all(Stage::Stage1, &object_changes.creates);
        sink.emit_all(Stage::Stage3, &changes.stage3);
        sink.warn_all(changes.warnings);
    }
    Ok(created)
}

/// 削除されたテーブル（古いテーブルの逆順、Stage3）
pub(super) fn drop_tables(sink: &mut StageSink<'_>, dc: &DiffContext<'_>) {
    for &old in dc.old_tables.iter().rev() {
        if dc.new_counterpart(old).is_none() {
            sink.emit(
                Stage::Stage3,
                &Operation::DropTable {
                    table: QualifiedName::from(old),
                },
            );
        }
    }
}

/// プライマリキー・外部キー以外の制約の作成（Stage1）
pub(super) fn create_other_constraints(
    sink: &mut StageSink<'_>,
    dc: &DiffContext<'_>,
) -> Result<(), EngineError> {
    let reconciler = dc.reconciler();
    for &new in &dc.new_tables {
        let old = dc.old_counterpart(new);
        for constraint in reconciler.constraints_to_create(old, Some(new), ConstraintFilter::Other)?
        {
            sink.emit(Stage::Stage1, &constraint.add_operation());
        }
    }
    Ok(())
}

/// 構築時のプライマリキー・外部キー以外の制約
pub(super) fn build_other_constraints<'a>(
    sink: &mut StageSink<'_>,
    references: &ReferenceResolver<'a>,
    tables: &[TableRef<'a>],
) -> Result<(), EngineError> {
    for &table in tables {
        for constraint in collect_constraints(references, table, ConstraintFilter::Other)? {
            sink.emit(Stage::Stage1, &constraint.add_operation());
        }
    }
    Ok(())
}
