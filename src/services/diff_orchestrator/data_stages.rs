// データのパス
//
// 行の削除（Stage2）、挿入と更新、外部キーの作成、シリアル列の開始値（Stage4）。

use super::{DiffContext, StageSink};
use crate::core::error::EngineError;
use crate::core::object_ref::TableRef;
use crate::core::stage::Stage;
use crate::core::table_constraint::ConstraintFilter;
use crate::services::constraint_reconciler::collect_constraints;
use crate::services::data_row_differ::DataRowDiffer;
use crate::services::reference_resolver::ReferenceResolver;

pub(super) fn diff_data<'a>(
    sink: &mut StageSink<'_>,
    dc: &DiffContext<'a>,
    created: &[TableRef<'a>],
) -> Result<(), EngineError> {
    let rows = DataRowDiffer::new(dc.new_references);
    let reconciler = dc.reconciler();

    let mut changes = Vec::with_capacity(dc.new_tables.len());
    for &new in &dc.new_tables {
        changes.push((new, rows.diff(dc.old_counterpart(new), new)?));
    }

    // 参照する側のテーブルの行から削除する
    for (_, table_changes) in changes.iter().rev() {
        sink.emit_all(Stage::Stage2, &table_changes.deletes);
    }

    for (new, table_changes) in &changes {
        sink.emit_all(Stage::Stage4, &table_changes.upserts);
        let old = dc.old_counterpart(*new);
        for constraint in reconciler.constraints_to_create(old, Some(*new), ConstraintFilter::Foreign)?
        {
            sink.emit(Stage::Stage4, &constraint.add_operation());
        }
    }

    for &table in created {
        sink.emit_all(Stage::Stage4, &rows.serial_starts(table)?);
    }
    Ok(())
}

/// 構築時のデータ
///
/// 行の挿入は宣言順、シリアル列の開始値は全挿入の後、外部キーは依存順です。
pub(super) fn build_data<'a>(
    sink: &mut StageSink<'_>,
    references: &ReferenceResolver<'a>,
    tables: &[TableRef<'a>],
) -> Result<(), EngineError> {
    let rows = DataRowDiffer::new(*references);
    let declared = references.tables();

    for &table in &declared {
        sink.emit_all(Stage::Stage4, &rows.diff(None, table)?.upserts);
    }
    for &table in &declared {
        sink.emit_all(Stage::Stage4, &rows.serial_starts(table)?);
    }
    for &table in tables {
        for constraint in collect_constraints(references, table, ConstraintFilter::Foreign)? {
            sink.emit(Stage::Stage4, &constraint.add_operation());
        }
    }
    Ok(())
}
