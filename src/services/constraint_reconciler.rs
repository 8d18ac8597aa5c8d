// 制約調整サービス
//
// 新旧テーブルの制約を1つの正規化表現（TableConstraint）に揃え、
// 削除すべき制約と作成すべき制約を最小限に決定します。

use crate::core::definition::ConstraintType;
use crate::core::error::{EngineError, ErrorLocation};
use crate::core::naming;
use crate::core::object_ref::TableRef;
use crate::core::table_constraint::{
    ConstraintFilter, ConstraintKind, ForeignReference, ReferencedName, ResolvedColumn,
    TableConstraint,
};
use crate::services::reference_resolver::ReferenceResolver;
use crate::services::rename_registry::RenameRegistry;
use regex::Regex;
use std::sync::LazyLock;

static REFERENCES_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\bREFERENCES\s+(?:"?([A-Za-z_][A-Za-z0-9_$]{0,62})"?\s*\.\s*)?"?([A-Za-z_][A-Za-z0-9_$]{0,62})"?"#,
    )
    .expect("REFERENCES pattern is a valid regex")
});

/// 生の制約定義から `REFERENCES schema.table` を抽出する
pub fn parse_references(definition: &str) -> Option<ReferencedName> {
    let captures = REFERENCES_PATTERN.captures(definition)?;
    Some(ReferencedName {
        schema: captures.get(1).map(|m| m.as_str().to_string()),
        table: captures.get(2)?.as_str().to_string(),
    })
}

/// テーブルの制約を正規化して収集
///
/// 収集順: プライマリキー、テーブル制約、明示的外部キー、
/// インライン外部キー、カラムCHECK制約
pub fn collect_constraints<'a>(
    references: &ReferenceResolver<'a>,
    table: TableRef<'a>,
    filter: ConstraintFilter,
) -> Result<Vec<TableConstraint<'a>>, EngineError> {
    let mut constraints = Vec::new();
    let table_name = table.table.name.as_str();
    let location = ErrorLocation::table(&table.schema.name, table_name);

    if filter.includes(ConstraintKind::PrimaryKey) {
        let key = references.primary_key_columns(table)?;
        let mut columns = Vec::with_capacity(key.len());
        for (owner, column) in key {
            columns.push(ResolvedColumn {
                column,
                column_type: references.column_type(owner, column)?,
            });
        }
        constraints.push(TableConstraint {
            name: table
                .table
                .primary_key_name
                .clone()
                .unwrap_or_else(|| naming::primary_key_name(table_name)),
            kind: ConstraintKind::PrimaryKey,
            sql_type: ConstraintType::PrimaryKey,
            table,
            columns,
            foreign: None,
            referenced_name: None,
            on_update: None,
            on_delete: None,
            definition: None,
        });
    }

    for constraint in &table.table.constraints {
        let kind = match constraint.constraint_type {
            ConstraintType::PrimaryKey => ConstraintKind::PrimaryKey,
            ConstraintType::ForeignKey => ConstraintKind::Foreign,
            _ => ConstraintKind::Other,
        };
        if !filter.includes(kind) {
            continue;
        }

        let foreign = references
            .constraint_foreign_table(table, constraint)?
            .map(|foreign_table| ForeignReference {
                table: foreign_table,
                columns: Vec::new(),
            });
        let referenced_name = match (&foreign, kind) {
            (None, ConstraintKind::Foreign) => parse_references(&constraint.definition),
            _ => None,
        };

        constraints.push(TableConstraint {
            name: constraint.name.clone(),
            kind,
            sql_type: constraint.constraint_type,
            table,
            columns: Vec::new(),
            foreign,
            referenced_name,
            on_update: None,
            on_delete: None,
            definition: Some(constraint.definition.trim().to_string()),
        });
    }

    if filter.includes(ConstraintKind::Foreign) {
        for foreign_key in &table.table.foreign_keys {
            let foreign_table = references.foreign_key_table(table, foreign_key)?;
            let column_names: Vec<&str> = foreign_key.columns.iter().map(String::as_str).collect();
            let name = foreign_key
                .constraint_name
                .clone()
                .unwrap_or_else(|| naming::foreign_key_name(table_name, &column_names));
            let fk_location = location.clone().with_constraint(&name);

            let mut columns = Vec::with_capacity(column_names.len());
            let mut foreign_columns = Vec::with_capacity(column_names.len());
            for (position, column_name) in column_names.iter().enumerate() {
                columns.push(references.resolve_column(table, column_name, &fk_location)?);

                let explicit = foreign_key.foreign_columns.get(position).map(String::as_str);
                let (owner, column) = references.foreign_column_for(
                    foreign_table,
                    explicit,
                    column_name,
                    &fk_location,
                )?;
                foreign_columns.push(ResolvedColumn {
                    column,
                    column_type: references.column_type(owner, column)?,
                });
            }

            constraints.push(TableConstraint {
                name,
                kind: ConstraintKind::Foreign,
                sql_type: ConstraintType::ForeignKey,
                table,
                columns,
                foreign: Some(ForeignReference {
                    table: foreign_table,
                    columns: foreign_columns,
                }),
                referenced_name: None,
                on_update: foreign_key.on_update,
                on_delete: foreign_key.on_delete,
                definition: None,
            });
        }

        for column in &table.table.columns {
            let Some((foreign_owner, foreign_column)) =
                references.column_foreign_column(table, column)?
            else {
                continue;
            };
            let foreign_table = references
                .column_foreign_table(table, column)?
                .unwrap_or(foreign_owner);

            constraints.push(TableConstraint {
                name: column.foreign_key_name.clone().unwrap_or_else(|| {
                    naming::foreign_key_name(table_name, &[column.name.as_str()])
                }),
                kind: ConstraintKind::Foreign,
                sql_type: ConstraintType::ForeignKey,
                table,
                columns: vec![ResolvedColumn {
                    column,
                    column_type: references.column_type(table, column)?,
                }],
                foreign: Some(ForeignReference {
                    table: foreign_table,
                    columns: vec![ResolvedColumn {
                        column: foreign_column,
                        column_type: references.column_type(foreign_owner, foreign_column)?,
                    }],
                }),
                referenced_name: None,
                on_update: column.foreign_on_update,
                on_delete: column.foreign_on_delete,
                definition: None,
            });
        }
    }

    if filter.includes(ConstraintKind::Other) {
        for column in &table.table.columns {
            let Some(check) = &column.check else {
                continue;
            };
            constraints.push(TableConstraint {
                name: naming::check_constraint_name(table_name, &column.name),
                kind: ConstraintKind::Other,
                sql_type: ConstraintType::Check,
                table,
                columns: vec![ResolvedColumn {
                    column,
                    column_type: references.column_type(table, column)?,
                }],
                foreign: None,
                referenced_name: None,
                on_update: None,
                on_delete: None,
                definition: Some(format!("({})", check.trim())),
            });
        }
    }

    Ok(constraints)
}

/// 制約調整サービス
pub struct ConstraintReconciler<'r, 'a> {
    old_references: ReferenceResolver<'a>,
    new_references: ReferenceResolver<'a>,
    renames: &'r RenameRegistry<'a>,
}

impl<'r, 'a> ConstraintReconciler<'r, 'a> {
    /// 新しいConstraintReconcilerを作成
    ///
    /// # Arguments
    ///
    /// * `old_references` - 古い定義の参照解決
    /// * `new_references` - 新しい定義の参照解決
    /// * `renames` - 検証済みのテーブルリネーム
    pub fn new(
        old_references: ReferenceResolver<'a>,
        new_references: ReferenceResolver<'a>,
        renames: &'r RenameRegistry<'a>,
    ) -> Self {
        Self {
            old_references,
            new_references,
            renames,
        }
    }

    /// 削除すべき制約（古いテーブル側）
    ///
    /// # Arguments
    ///
    /// * `old` - 古いテーブル（リネームの場合はリネーム元）
    /// * `new` - 新しいテーブル（削除されたテーブルの場合は `None`）
    /// * `filter` - 対象とする制約の種類
    pub fn constraints_to_drop(
        &self,
        old: Option<TableRef<'a>>,
        new: Option<TableRef<'a>>,
        filter: ConstraintFilter,
    ) -> Result<Vec<TableConstraint<'a>>, EngineError> {
        let Some(old) = old else {
            return Ok(Vec::new());
        };
        let old_constraints = collect_constraints(&self.old_references, old, filter)?;

        let Some(new) = new else {
            return Ok(old_constraints);
        };
        if self.renames.is_renamed(new) {
            return Ok(old_constraints);
        }

        let new_constraints = collect_constraints(&self.new_references, new, filter)?;
        let mut drops = Vec::new();
        for old_constraint in old_constraints {
            let drop = match new_constraints
                .iter()
                .find(|n| n.same_identity(&old_constraint))
            {
                None => true,
                Some(new_constraint) => {
                    !old_constraint.equals(new_constraint)
                        || self.references_renamed_old(&old_constraint)
                        || self.references_renamed_new(new_constraint)
                        || self.references_recreated_key(&old_constraint)?
                }
            };
            if drop {
                drops.push(old_constraint);
            }
        }
        Ok(drops)
    }

    /// 作成すべき制約（新しいテーブル側）
    pub fn constraints_to_create(
        &self,
        old: Option<TableRef<'a>>,
        new: Option<TableRef<'a>>,
        filter: ConstraintFilter,
    ) -> Result<Vec<TableConstraint<'a>>, EngineError> {
        let Some(new) = new else {
            return Ok(Vec::new());
        };
        let new_constraints = collect_constraints(&self.new_references, new, filter)?;

        let Some(old) = old else {
            return Ok(new_constraints);
        };
        if self.renames.is_renamed(new) {
            return Ok(new_constraints);
        }

        let old_constraints = collect_constraints(&self.old_references, old, filter)?;
        let mut creates = Vec::new();
        for new_constraint in new_constraints {
            let create = match old_constraints
                .iter()
                .find(|o| o.same_identity(&new_constraint))
            {
                None => true,
                Some(old_constraint) => {
                    !new_constraint.equals(old_constraint)
                        || self.references_renamed_old(old_constraint)
                        || self.references_renamed_new(&new_constraint)
                        || self.references_recreated_key(old_constraint)?
                }
            };
            if create {
                creates.push(new_constraint);
            }
        }
        Ok(creates)
    }

    /// 古い制約の参照先がリネームされたテーブルか
    fn references_renamed_old(&self, constraint: &TableConstraint<'a>) -> bool {
        constraint
            .foreign_table_name()
            .is_some_and(|(schema, table)| self.renames.is_renamed_old_name(&schema, &table))
    }

    /// 新しい制約の参照先がリネームされたテーブルか
    fn references_renamed_new(&self, constraint: &TableConstraint<'a>) -> bool {
        constraint
            .foreign_table_name()
            .is_some_and(|(schema, table)| self.renames.is_renamed_new_name(&schema, &table))
    }

    /// 古い外部キーの参照先テーブルでプライマリキーが削除・再作成されるか
    ///
    /// 参照先のキーを削除する前に外部キーを削除し、キーの作成後に再作成する必要があります。
    fn references_recreated_key(
        &self,
        constraint: &TableConstraint<'a>,
    ) -> Result<bool, EngineError> {
        if constraint.kind != ConstraintKind::Foreign {
            return Ok(false);
        }
        let Some((schema, table)) = constraint.foreign_table_name() else {
            return Ok(false);
        };
        let Some(old_target) = self.old_references.find_table(&schema, &table) else {
            return Ok(false);
        };
        let Some(new_target) = self
            .new_references
            .find_table(&schema, &table)
            .filter(|target| !self.renames.is_renamed(*target))
        else {
            return Ok(false);
        };

        let old_keys =
            collect_constraints(&self.old_references, old_target, ConstraintFilter::PrimaryKey)?;
        let new_keys =
            collect_constraints(&self.new_references, new_target, ConstraintFilter::PrimaryKey)?;
        Ok(old_keys
            .iter()
            .any(|old_key| !new_keys.iter().any(|new_key| old_key.equals(new_key))))
    }
}
