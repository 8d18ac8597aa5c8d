// データ行差分サービス
//
// 新しいプライマリキーの値で新旧の行を照合し、
// 挿入・更新・削除に分類します。

use crate::core::definition::{same_data_value, DataRow, DataRows, DataValue};
use crate::core::error::EngineError;
use crate::core::object_ref::TableRef;
use crate::core::operation::{ColumnValue, Operation, QualifiedName};
use crate::services::reference_resolver::{is_serial_type, ReferenceResolver};
use std::collections::HashMap;
use tracing::debug;

/// 行の分類結果（行インデックスで表現）
///
/// 新しい行はすべて `unchanged` / `updated` / `inserted` のいずれか1つに、
/// 古い行はすべて `matched` / `deleted` のいずれか1つに含まれます。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowClassification {
    pub unchanged: Vec<usize>,
    /// (新しい行, 古い行)
    pub updated: Vec<(usize, usize)>,
    pub inserted: Vec<usize>,
    pub matched: Vec<usize>,
    pub deleted: Vec<usize>,
}

/// 行差分の操作
#[derive(Debug, Clone, Default)]
pub struct RowChanges {
    pub deletes: Vec<Operation>,
    /// 挿入と更新（新しい行の順序）
    pub upserts: Vec<Operation>,
}

impl RowChanges {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.upserts.is_empty()
    }
}

/// データ行差分サービス
pub struct DataRowDiffer<'a> {
    new_references: ReferenceResolver<'a>,
}

type RowKey = Vec<Option<String>>;

impl<'a> DataRowDiffer<'a> {
    pub fn new(new_references: ReferenceResolver<'a>) -> Self {
        Self { new_references }
    }

    /// 新旧の行を分類
    ///
    /// # Arguments
    ///
    /// * `old` - 古いテーブル（新規テーブルの場合は `None`）
    /// * `new` - 新しいテーブル
    ///
    /// # Errors
    ///
    /// キーカラムが `rows.columns` にない場合、行の幅がカラム数と異なる場合、
    /// キーが重複する場合は `InvalidDataRows` を返します。
    pub fn classify(
        &self,
        old: Option<TableRef<'a>>,
        new: TableRef<'a>,
    ) -> Result<RowClassification, EngineError> {
        let mut classification = RowClassification::default();
        let Some(new_rows) = new.table.rows.as_ref() else {
            return Ok(classification);
        };
        let key_columns = self.new_references.primary_key_names(new)?;

        validate_rows(new, new_rows)?;
        let new_key_positions = key_positions(new, new_rows, &key_columns)?;
        unique_keys(new, new_rows, |row| Some(row_key(row, &new_key_positions)))?;

        let old_rows = old.and_then(|t| t.table.rows.as_ref().map(|rows| (t, rows)));
        let old_lookup: HashMap<RowKey, usize> = match old_rows {
            Some((old_table, rows)) => {
                validate_rows(old_table, rows)?;
                let positions: Vec<Option<usize>> = key_columns
                    .iter()
                    .map(|c| rows.column_position(c))
                    .collect();
                unique_keys(old_table, rows, |row| old_key(row, &positions))?
            }
            None => HashMap::new(),
        };

        let mut matched_old = vec![false; old_rows.map_or(0, |(_, rows)| rows.rows.len())];
        for (new_index, row) in new_rows.rows.iter().enumerate() {
            let key = row_key(row, &new_key_positions);
            match old_lookup.get(&key) {
                None => classification.inserted.push(new_index),
                Some(&old_index) => {
                    matched_old[old_index] = true;
                    let Some((_, rows)) = old_rows else {
                        continue;
                    };
                    if changed_values(new_rows, row, rows, &rows.rows[old_index], &key_columns)
                        .is_empty()
                    {
                        classification.unchanged.push(new_index);
                    } else {
                        classification.updated.push((new_index, old_index));
                    }
                }
            }
        }
        for (old_index, matched) in matched_old.into_iter().enumerate() {
            if matched {
                classification.matched.push(old_index);
            } else {
                classification.deleted.push(old_index);
            }
        }

        Ok(classification)
    }

    /// 新旧の行から挿入・更新・削除の操作を生成
    ///
    /// 新しいテーブルが行を宣言していない場合、そのテーブルのデータは管理対象外です。
    pub fn diff(
        &self,
        old: Option<TableRef<'a>>,
        new: TableRef<'a>,
    ) -> Result<RowChanges, EngineError> {
        let mut changes = RowChanges::default();
        let Some(new_rows) = new.table.rows.as_ref() else {
            return Ok(changes);
        };
        let classification = self.classify(old, new)?;
        let key_columns = self.new_references.primary_key_names(new)?;
        let key_positions = key_positions(new, new_rows, &key_columns)?;
        let target = QualifiedName::from(new);

        if let Some(old_rows) = old.and_then(|t| t.table.rows.as_ref()) {
            let positions: Vec<Option<usize>> = key_columns
                .iter()
                .map(|c| old_rows.column_position(c))
                .collect();
            for &old_index in &classification.deleted {
                let row = &old_rows.rows[old_index];
                // 新しいキーカラムを持たない古い行はキーで特定できない
                let key: Option<Vec<ColumnValue>> = key_columns
                    .iter()
                    .zip(&positions)
                    .map(|(column, position)| position.map(|p| (column.clone(), value_at(row, p))))
                    .collect();
                if let Some(key) = key {
                    changes.deletes.push(Operation::DeleteRow {
                        table: target.clone(),
                        key,
                    });
                }
            }

            let updated: HashMap<usize, usize> = classification.updated.iter().copied().collect();
            for (new_index, row) in new_rows.rows.iter().enumerate() {
                if let Some(&old_index) = updated.get(&new_index) {
                    let values = changed_values(
                        new_rows,
                        row,
                        old_rows,
                        &old_rows.rows[old_index],
                        &key_columns,
                    );
                    changes.upserts.push(Operation::UpdateRow {
                        table: target.clone(),
                        key: key_values(row, &key_columns, &key_positions),
                        values,
                    });
                } else if classification.inserted.contains(&new_index) {
                    changes.upserts.push(insert_row(&target, new_rows, row));
                }
            }
        } else {
            for &new_index in &classification.inserted {
                changes
                    .upserts
                    .push(insert_row(&target, new_rows, &new_rows.rows[new_index]));
            }
        }

        if !changes.is_empty() {
            debug!(
                table = %new,
                deletes = changes.deletes.len(),
                upserts = changes.upserts.len(),
                "Detected data row changes"
            );
        }
        Ok(changes)
    }

    /// 新規テーブルのシリアル列のシーケンス開始値を合わせる操作
    ///
    /// 行を持つテーブルで、宣言型がシリアル型のプライマリキーカラムが対象です。
    pub fn serial_starts(&self, new: TableRef<'a>) -> Result<Vec<Operation>, EngineError> {
        if !new.table.has_rows() {
            return Ok(Vec::new());
        }
        let target = QualifiedName::from(new);
        Ok(self
            .new_references
            .primary_key_columns(new)?
            .into_iter()
            .filter(|(_, column)| column.column_type.as_deref().is_some_and(is_serial_type))
            .map(|(_, column)| Operation::SerialStart {
                table: target.clone(),
                column: column.name.clone(),
            })
            .collect())
    }
}

fn invalid_rows(table: TableRef<'_>, message: String) -> EngineError {
    EngineError::InvalidDataRows {
        schema: table.schema.name.clone(),
        table: table.table.name.clone(),
        message,
    }
}

fn validate_rows(table: TableRef<'_>, rows: &DataRows) -> Result<(), EngineError> {
    for (index, row) in rows.rows.iter().enumerate() {
        if row.values.len() != rows.columns.len() {
            return Err(invalid_rows(
                table,
                format!(
                    "row {} has {} values but {} columns are declared",
                    index + 1,
                    row.values.len(),
                    rows.columns.len()
                ),
            ));
        }
    }
    Ok(())
}

fn key_positions(
    table: TableRef<'_>,
    rows: &DataRows,
    key_columns: &[String],
) -> Result<Vec<usize>, EngineError> {
    key_columns
        .iter()
        .map(|column| {
            rows.column_position(column).ok_or_else(|| {
                invalid_rows(
                    table,
                    format!("primary key column '{}' is missing from rows.columns", column),
                )
            })
        })
        .collect()
}

fn unique_keys<F>(
    table: TableRef<'_>,
    rows: &DataRows,
    key_of: F,
) -> Result<HashMap<RowKey, usize>, EngineError>
where
    F: Fn(&DataRow) -> Option<RowKey>,
{
    let mut keys = HashMap::with_capacity(rows.rows.len());
    for (index, row) in rows.rows.iter().enumerate() {
        let Some(key) = key_of(row) else {
            continue;
        };
        if let Some(previous) = keys.insert(key, index) {
            return Err(invalid_rows(
                table,
                format!(
                    "rows {} and {} have the same primary key",
                    previous + 1,
                    index + 1
                ),
            ));
        }
    }
    Ok(keys)
}

fn value_at(row: &DataRow, position: usize) -> Option<DataValue> {
    row.values.get(position).cloned().flatten()
}

fn row_key(row: &DataRow, positions: &[usize]) -> RowKey {
    positions
        .iter()
        .map(|&p| value_at(row, p).map(|v| v.canonical()))
        .collect()
}

/// 古い行のキー（新しいキーカラムが古い行にない場合は照合対象外）
fn old_key(row: &DataRow, positions: &[Option<usize>]) -> Option<RowKey> {
    positions
        .iter()
        .map(|position| position.map(|p| value_at(row, p).map(|v| v.canonical())))
        .collect()
}

fn key_values(row: &DataRow, key_columns: &[String], positions: &[usize]) -> Vec<ColumnValue> {
    key_columns
        .iter()
        .zip(positions)
        .map(|(column, &p)| (column.clone(), value_at(row, p)))
        .collect()
}

/// キー以外で値が変わったカラム
fn changed_values(
    new_rows: &DataRows,
    new_row: &DataRow,
    old_rows: &DataRows,
    old_row: &DataRow,
    key_columns: &[String],
) -> Vec<ColumnValue> {
    new_rows
        .columns
        .iter()
        .enumerate()
        .filter(|(_, column)| !key_columns.contains(column))
        .filter_map(|(position, column)| {
            let new_value = value_at(new_row, position);
            let old_value = old_rows
                .column_position(column)
                .and_then(|p| value_at(old_row, p));
            if same_data_value(new_value.as_ref(), old_value.as_ref()) {
                None
            } else {
                Some((column.clone(), new_value))
            }
        })
        .collect()
}

fn insert_row(target: &QualifiedName, rows: &DataRows, row: &DataRow) -> Operation {
    Operation::InsertRow {
        table: target.clone(),
        values: rows
            .columns
            .iter()
            .enumerate()
            .map(|(position, column)| (column.clone(), value_at(row, position)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::definition::{Column, Definition, Schema, Table};

    fn table(name: &str, rows: Vec<Vec<Option<DataValue>>>) -> Definition {
        let mut table = Table::new(name);
        table.primary_key = vec!["id".to_string()];
        table.add_column(Column::new("id", "serial", false));
        table.add_column(Column::new("name", "text", true));
        table.rows = Some(DataRows {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: rows.into_iter().map(DataRow::new).collect(),
        });
        let mut schema = Schema::new("app");
        schema.add_table(table);
        let mut definition = Definition::new();
        definition.add_schema(schema);
        definition
    }

    fn row(id: i64, name: &str) -> Vec<Option<DataValue>> {
        vec![Some(DataValue::Integer(id)), Some(DataValue::text(name))]
    }

    #[test]
    fn test_classification_is_partition() {
        let old = table("t", vec![row(1, "a"), row(3, "x")]);
        let new = table("t", vec![row(1, "b"), row(2, "c")]);
        let old_refs = ReferenceResolver::new(&old);
        let new_refs = ReferenceResolver::new(&new);

        let classification = DataRowDiffer::new(new_refs)
            .classify(
                old_refs.find_table("app", "t"),
                new_refs.find_table("app", "t").unwrap(),
            )
            .unwrap();

        assert!(classification.unchanged.is_empty());
        assert_eq!(classification.updated, vec![(0, 0)]);
        assert_eq!(classification.inserted, vec![1]);
        assert_eq!(classification.matched, vec![0]);
        assert_eq!(classification.deleted, vec![1]);
    }

    #[test]
    fn test_width_mismatch_is_fatal() {
        let new = table("t", vec![vec![Some(DataValue::Integer(1))]]);
        let refs = ReferenceResolver::new(&new);
        let result = DataRowDiffer::new(refs).classify(None, refs.find_table("app", "t").unwrap());
        assert!(matches!(result, Err(EngineError::InvalidDataRows { .. })));
    }

    #[test]
    fn test_duplicate_key_is_fatal() {
        let new = table("t", vec![row(1, "a"), row(1, "b")]);
        let refs = ReferenceResolver::new(&new);
        let result = DataRowDiffer::new(refs).classify(None, refs.find_table("app", "t").unwrap());
        assert!(matches!(result, Err(EngineError::InvalidDataRows { .. })));
    }

    #[test]
    fn test_serial_start_for_serial_key() {
        let new = table("t", vec![row(1, "a")]);
        let refs = ReferenceResolver::new(&new);
        let ops = DataRowDiffer::new(refs)
            .serial_starts(refs.find_table("app", "t").unwrap())
            .unwrap();
        assert_eq!(
            ops,
            vec![Operation::SerialStart {
                table: QualifiedName::new("app", "t"),
                column: "id".to_string(),
            }]
        );
    }

    #[test]
    fn test_unchanged_rows_produce_nothing() {
        let old = table("t", vec![row(1, "a")]);
        let new = table("t", vec![row(1, "a")]);
        let old_refs = ReferenceResolver::new(&old);
        let new_refs = ReferenceResolver::new(&new);
        let changes = DataRowDiffer::new(new_refs)
            .diff(
                old_refs.find_table("app", "t"),
                new_refs.find_table("app", "t").unwrap(),
            )
            .unwrap();
        assert!(changes.is_empty());
    }
}
