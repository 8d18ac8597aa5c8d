// 定義バリデーターサービス
//
// 差分・構築の前に定義ツリーの不変条件を検証します。
// 最初に見つかった致命的な問題をエラーとして返します。

use crate::core::definition::Definition;
use crate::core::error::{EngineError, ErrorLocation};
use crate::core::table_constraint::ConstraintFilter;
use crate::services::constraint_reconciler::collect_constraints;
use crate::services::data_row_differ::DataRowDiffer;
use crate::services::reference_resolver::ReferenceResolver;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 検証結果の概要
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    pub schemas: usize,
    pub tables: usize,
    pub views: usize,
    pub constraints: usize,
    pub rows: usize,
}

/// 定義バリデーターサービス
#[derive(Debug, Clone, Default)]
pub struct DefinitionValidator {}

impl DefinitionValidator {
    /// 新しいDefinitionValidatorを作成
    pub fn new() -> Self {
        Self {}
    }

    /// 定義ツリー全体を検証
    ///
    /// # Arguments
    ///
    /// * `definition` - 検証対象の定義
    ///
    /// # Returns
    ///
    /// 検証したオブジェクト数の概要
    ///
    /// # Errors
    ///
    /// テーブル名・インデックス名の重複、プライマリキーの欠落、
    /// 解決できない参照、不正なデータ行
    pub fn validate(&self, definition: &Definition) -> Result<ValidationSummary, EngineError> {
        let references = ReferenceResolver::new(definition);
        let mut summary = ValidationSummary {
            schemas: definition.schemas.len(),
            ..ValidationSummary::default()
        };

        for schema in &definition.schemas {
            let mut table_names = HashSet::new();
            let mut index_owners: HashMap<&str, &str> = HashMap::new();

            for table in &schema.tables {
                if !table_names.insert(table.name.as_str()) {
                    return Err(EngineError::DuplicateTable {
                        schema: schema.name.clone(),
                        table: table.name.clone(),
                    });
                }

                for index in &table.indexes {
                    if let Some(first) = index_owners.insert(&index.name, &table.name) {
                        return Err(EngineError::DuplicateIndexName {
                            schema: schema.name.clone(),
                            index: index.name.clone(),
                            first_table: first.to_string(),
                            second_table: table.name.clone(),
                        });
                    }
                }
            }
            summary.views += schema.views.len();
        }

        let row_differ = DataRowDiffer::new(references);
        for table in references.tables() {
            let location = ErrorLocation::table(&table.schema.name, &table.table.name);
            for column in &table.table.columns {
                references.column_type(table, column).map_err(|error| match error {
                    EngineError::UnresolvedColumnType { message, .. } => {
                        EngineError::UnresolvedColumnType {
                            message,
                            location: location.clone().with_column(&column.name),
                        }
                    }
                    other => other,
                })?;
            }

            let constraints = collect_constraints(&references, table, ConstraintFilter::All)?;
            summary.constraints += constraints.len();

            let classification = row_differ.classify(None, table)?;
            summary.rows += classification.inserted.len();
            summary.tables += 1;
        }

        debug!(
            schemas = summary.schemas,
            tables = summary.tables,
            constraints = summary.constraints,
            "Definition validated"
        );
        Ok(summary)
    }
}
