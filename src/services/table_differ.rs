// テーブル/カラム差分サービス
//
// 同じテーブルの新旧バージョンを比較し、テーブルオプションと
// カラムの変更操作をステージごとに振り分けて生成します。

use crate::adapters::sql_renderer::StatementRenderer;
use crate::core::config::RunContext;
use crate::core::definition::{Column, TableOption};
use crate::core::error::{EngineError, EngineWarning, ErrorLocation};
use crate::core::object_ref::TableRef;
use crate::core::operation::{ColumnSpec, Operation, QualifiedName};
use crate::core::table_constraint::normalize_type;
use crate::services::reference_resolver::ReferenceResolver;
use std::collections::HashMap;
use tracing::{debug, warn};

/// テーブル差分の結果
#[derive(Debug, Clone, Default)]
pub struct TableChanges {
    /// 非破壊的な変更（追加、リネーム、型変更、デフォルト変更、NOT NULL解除、埋め戻し）
    pub stage1: Vec<Operation>,
    /// 破壊的な変更（NOT NULL化、カラム削除）
    pub stage3: Vec<Operation>,
    pub warnings: Vec<EngineWarning>,
}

impl TableChanges {
    pub fn is_empty(&self) -> bool {
        self.stage1.is_empty() && self.stage3.is_empty()
    }
}

/// テーブル/カラム差分サービス
pub struct TableDiffer<'r, 'a> {
    old_references: ReferenceResolver<'a>,
    new_references: ReferenceResolver<'a>,
    renderer: &'r dyn StatementRenderer,
    ctx: RunContext,
}

impl<'r, 'a> TableDiffer<'r, 'a> {
    /// 新しいTableDifferを作成
    pub fn new(
        old_references: ReferenceResolver<'a>,
        new_references: ReferenceResolver<'a>,
        renderer: &'r dyn StatementRenderer,
        ctx: RunContext,
    ) -> Self {
        Self {
            old_references,
            new_references,
            renderer,
            ctx,
        }
    }

    /// 新旧テーブルの差分を検出
    ///
    /// # Arguments
    ///
    /// * `old` - 古いテーブル（リネームの場合はリネーム元）
    /// * `new` - 新しいテーブル
    ///
    /// # Returns
    ///
    /// ステージ別の操作と警告。操作は新しいテーブル名を対象とします。
    pub fn diff(&self, old: TableRef<'a>, new: TableRef<'a>) -> Result<TableChanges, EngineError> {
        let mut changes = TableChanges::default();
        let target = QualifiedName::from(new);

        self.diff_options(old, new, &target, &mut changes);
        self.diff_columns(old, new, &target, &mut changes)?;

        if !changes.is_empty() {
            debug!(
                table = %new,
                stage1 = changes.stage1.len(),
                stage3 = changes.stage3.len(),
                "Detected table changes"
            );
        }
        Ok(changes)
    }

    /// 方言が理解するオプションのみを残す
    ///
    /// 理解できないオプションは警告として記録しスキップします。
    pub fn supported_options(
        renderer: &dyn StatementRenderer,
        table: TableRef<'_>,
        options: &[TableOption],
        warnings: &mut Vec<EngineWarning>,
    ) -> Vec<TableOption> {
        options
            .iter()
            .filter(|option| {
                if renderer.supports_table_option(&option.name) {
                    return true;
                }
                warn!(
                    table = %table,
                    option = %option.name,
                    dialect = %renderer.dialect(),
                    "Skipping table option not supported by dialect"
                );
                warnings.push(EngineWarning::unsupported_option(
                    format!(
                        "table option '{}' is not supported by {}",
                        option.name,
                        renderer.dialect()
                    ),
                    Some(ErrorLocation::table(&table.schema.name, &table.table.name)),
                ));
                false
            })
            .cloned()
            .collect()
    }

    fn diff_options(
        &self,
        old: TableRef<'a>,
        new: TableRef<'a>,
        target: &QualifiedName,
        changes: &mut TableChanges,
    ) {
        let old_options: HashMap<String, &TableOption> = old
            .table
            .options
            .iter()
            .map(|o| (o.name.to_ascii_lowercase(), o))
            .collect();

        let changed: Vec<TableOption> = new
            .table
            .options
            .iter()
            .filter(|option| {
                old_options
                    .get(&option.name.to_ascii_lowercase())
                    .map_or(true, |previous| previous.value != option.value)
            })
            .cloned()
            .collect();
        let changed =
            Self::supported_options(self.renderer, new, &changed, &mut changes.warnings);
        if !changed.is_empty() {
            changes.stage1.push(Operation::SetTableOptions {
                table: target.clone(),
                options: changed,
            });
        }

        let removed: Vec<TableOption> = old
            .table
            .options
            .iter()
            .filter(|option| new.table.get_option(&option.name).is_none())
            .cloned()
            .collect();
        let removed =
            Self::supported_options(self.renderer, new, &removed, &mut changes.warnings);
        if !removed.is_empty() {
            changes.stage1.push(Operation::ResetTableOptions {
                table: target.clone(),
                names: removed.into_iter().map(|o| o.name).collect(),
            });
        }
    }

    /// カラムのリネーム元を決定
    ///
    /// 旧テーブルに宣言された旧名があり、新しい名前がまだ存在しない場合のみリネームです。
    fn rename_source(&self, old: TableRef<'a>, column: &Column) -> Option<&'a Column> {
        if self.ctx.ignore_old_names {
            return None;
        }
        let old_name = column.old_column_name.as_deref()?;
        if old_name == column.name || old.table.get_column(&column.name).is_some() {
            return None;
        }
        old.table.get_column(old_name)
    }

    /// カラムリネームの検証
    ///
    /// # Errors
    ///
    /// * `AmbiguousColumnRename` - 旧名のカラムが新しいテーブルにも残っている
    /// * `DuplicateColumnRename` - 2つのカラムが同じ旧カラムを宣言している
    fn validate_column_renames(
        &self,
        old: TableRef<'a>,
        new: TableRef<'a>,
    ) -> Result<(), EngineError> {
        let mut claimed: HashMap<&str, &str> = HashMap::new();
        for column in &new.table.columns {
            let Some(source) = self.rename_source(old, column) else {
                continue;
            };
            let location =
                ErrorLocation::table(&new.schema.name, &new.table.name).with_column(&column.name);

            if new.table.get_column(&source.name).is_some() {
                return Err(EngineError::AmbiguousColumnRename {
                    old_column: source.name.clone(),
                    location,
                });
            }
            if let Some(first) = claimed.insert(source.name.as_str(), column.name.as_str()) {
                return Err(EngineError::DuplicateColumnRename {
                    old_column: source.name.clone(),
                    first: first.to_string(),
                    second: column.name.clone(),
                    location: ErrorLocation::table(&new.schema.name, &new.table.name),
                });
            }
        }
        Ok(())
    }

    fn diff_columns(
        &self,
        old: TableRef<'a>,
        new: TableRef<'a>,
        target: &QualifiedName,
        changes: &mut TableChanges,
    ) -> Result<(), EngineError> {
        self.validate_column_renames(old, new)?;

        let renamed_from: Vec<&str> = new
            .table
            .columns
            .iter()
            .filter_map(|c| self.rename_source(old, c).map(|source| source.name.as_str()))
            .collect();

        for column in &new.table.columns {
            if let Some(source) = self.rename_source(old, column) {
                changes.stage1.push(Operation::RenameColumn {
                    table: target.clone(),
                    from: source.name.clone(),
                    to: column.name.clone(),
                });
                self.diff_column(old, source, new, column, target, changes)?;
            } else if let Some(previous) = old.table.get_column(&column.name) {
                self.diff_column(old, previous, new, column, target, changes)?;
            } else {
                self.add_column(new, column, target, changes)?;
            }
        }

        for column in &old.table.columns {
            if new.table.get_column(&column.name).is_none()
                && !renamed_from.contains(&column.name.as_str())
            {
                changes.stage3.push(Operation::DropColumn {
                    table: target.clone(),
                    column: column.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// カラム追加
    ///
    /// NULL許可で追加し、デフォルトがあれば既存行を埋めてから Stage3 で NOT NULL にします。
    fn add_column(
        &self,
        new: TableRef<'a>,
        column: &'a Column,
        target: &QualifiedName,
        changes: &mut TableChanges,
    ) -> Result<(), EngineError> {
        let column_type = self.new_references.column_type(new, column)?;
        changes.stage1.push(Operation::AddColumn {
            table: target.clone(),
            column: ColumnSpec {
                name: column.name.clone(),
                column_type: column_type.clone(),
                nullable: true,
                default: column.default.clone(),
            },
        });

        if !column.nullable {
            if let Some(default) = &column.default {
                changes.stage1.push(Operation::FillColumnDefault {
                    table: target.clone(),
                    column: column.name.clone(),
                    default: default.clone(),
                });
            }
            changes.stage3.push(Operation::SetNotNull {
                table: target.clone(),
                column: column_spec(column, column_type),
            });
        }
        Ok(())
    }

    fn diff_column(
        &self,
        old: TableRef<'a>,
        previous: &'a Column,
        new: TableRef<'a>,
        column: &'a Column,
        target: &QualifiedName,
        changes: &mut TableChanges,
    ) -> Result<(), EngineError> {
        let old_type = self.old_references.column_type(old, previous)?;
        let new_type = self.new_references.column_type(new, column)?;

        if normalize_type(&old_type) != normalize_type(&new_type) {
            changes.stage1.push(Operation::AlterColumnType {
                table: target.clone(),
                column: ColumnSpec {
                    // NOT NULL化は Stage3 で行うため、ここでは旧カラムのNULL許可を保つ
                    nullable: previous.nullable || column.nullable,
                    ..column_spec(column, new_type.clone())
                },
            });
        }

        if previous.default != column.default {
            match &column.default {
                Some(default) => changes.stage1.push(Operation::SetColumnDefault {
                    table: target.clone(),
                    column: column.name.clone(),
                    default: default.clone(),
                }),
                None => changes.stage1.push(Operation::DropColumnDefault {
                    table: target.clone(),
                    column: column.name.clone(),
                }),
            }
        }

        match (previous.nullable, column.nullable) {
            (false, true) => changes.stage1.push(Operation::DropNotNull {
                table: target.clone(),
                column: column_spec(column, new_type),
            }),
            (true, false) => {
                if let Some(default) = &column.default {
                    changes.stage1.push(Operation::FillColumnDefault {
                        table: target.clone(),
                        column: column.name.clone(),
                        default: default.clone(),
                    });
                }
                changes.stage3.push(Operation::SetNotNull {
                    table: target.clone(),
                    column: column_spec(column, new_type),
                });
            }
            _ => {}
        }

        Ok(())
    }
}

/// 新しいカラム定義から型解決済みの仕様を作成
pub fn column_spec(column: &Column, column_type: String) -> ColumnSpec {
    ColumnSpec {
        name: column.name.clone(),
        column_type,
        nullable: column.nullable,
        default: column.default.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sql_renderer::PostgresRenderer;
    use crate::core::config::Dialect;
    use crate::core::definition::{Definition, Schema, Table};

    fn definition(table: Table) -> Definition {
        let mut schema = Schema::new("app");
        schema.add_table(table);
        let mut definition = Definition::new();
        definition.add_schema(schema);
        definition
    }

    fn users() -> Table {
        let mut table = Table::new("users");
        table.primary_key = vec!["id".to_string()];
        table.add_column(Column::new("id", "integer", false));
        table.add_column(Column::new("name", "text", true));
        table
    }

    fn diff(old: &Definition, new: &Definition) -> TableChanges {
        let renderer = PostgresRenderer::default();
        let old_refs = ReferenceResolver::new(old);
        let new_refs = ReferenceResolver::new(new);
        let differ = TableDiffer::new(
            old_refs,
            new_refs,
            &renderer,
            RunContext::new(Dialect::PostgreSQL),
        );
        differ
            .diff(
                old_refs.find_table("app", "users").unwrap(),
                new_refs.find_table("app", "users").unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn test_identical_tables_have_no_changes() {
        let old = definition(users());
        let new = definition(users());
        let changes = diff(&old, &new);
        assert!(changes.is_empty());
        assert!(changes.warnings.is_empty());
    }

    #[test]
    fn test_column_rename_instead_of_drop_and_add() {
        let old = definition(users());
        let mut table = users();
        table.columns[1].name = "full_name".to_string();
        table.columns[1].old_column_name = Some("name".to_string());
        let new = definition(table);

        let changes = diff(&old, &new);
        assert_eq!(
            changes.stage1,
            vec![Operation::RenameColumn {
                table: QualifiedName::new("app", "users"),
                from: "name".to_string(),
                to: "full_name".to_string(),
            }]
        );
        assert!(changes.stage3.is_empty());
    }

    #[test]
    fn test_not_null_column_with_default_is_backfilled() {
        let old = definition(users());
        let mut table = users();
        let mut status = Column::new("status", "text", false);
        status.default = Some("'active'".to_string());
        table.add_column(status);
        let new = definition(table);

        let changes = diff(&old, &new);
        let labels: Vec<&str> = changes.stage1.iter().map(|op| op.label()).collect();
        assert_eq!(labels, vec!["add_column", "fill_column_default"]);
        let stage3: Vec<&str> = changes.stage3.iter().map(|op| op.label()).collect();
        assert_eq!(stage3, vec!["set_not_null"]);
    }

    #[test]
    fn test_drop_column_goes_to_stage3() {
        let old = definition(users());
        let mut table = users();
        table.columns.pop();
        let new = definition(table);

        let changes = diff(&old, &new);
        assert!(changes.stage1.is_empty());
        assert_eq!(
            changes.stage3,
            vec![Operation::DropColumn {
                table: QualifiedName::new("app", "users"),
                column: "name".to_string(),
            }]
        );
    }

    #[test]
    fn test_unsupported_option_is_warned_and_skipped() {
        let old = definition(users());
        let mut table = users();
        table.options.push(TableOption::new("engine", "InnoDB"));
        table.options.push(TableOption::new("fillfactor", "80"));
        let new = definition(table);

        let changes = diff(&old, &new);
        assert_eq!(changes.warnings.len(), 1);
        assert_eq!(
            changes.stage1,
            vec![Operation::SetTableOptions {
                table: QualifiedName::new("app", "users"),
                options: vec![TableOption::new("fillfactor", "80")],
            }]
        );
    }

    #[test]
    fn test_type_change_and_nullability() {
        let old = definition(users());
        let mut table = users();
        table.columns[1].column_type = Some("varchar(100)".to_string());
        table.columns[1].nullable = false;
        let new = definition(table);

        let changes = diff(&old, &new);
        let labels: Vec<&str> = changes.stage1.iter().map(|op| op.label()).collect();
        assert_eq!(labels, vec!["alter_column_type"]);
        let stage3: Vec<&str> = changes.stage3.iter().map(|op| op.label()).collect();
        assert_eq!(stage3, vec!["set_not_null"]);
    }
}
