// テーブルリネーム登録
//
// 新しい定義で old_schema_name / old_table_name を宣言したテーブルを検証し、
// 1回の差分実行の間だけ有効な (新テーブル → 旧テーブル) の対応表を保持します。

use crate::core::config::RunContext;
use crate::core::definition::Definition;
use crate::core::error::EngineError;
use crate::core::object_ref::TableRef;
use crate::services::reference_resolver::ReferenceResolver;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 検証済みのテーブルリネーム
#[derive(Debug, Clone, Default)]
pub struct RenameRegistry<'a> {
    /// 新テーブル → 旧テーブル
    renames: HashMap<TableRef<'a>, TableRef<'a>>,
    /// 旧テーブル → 新テーブル
    reverse: HashMap<TableRef<'a>, TableRef<'a>>,
    /// リネーム前の名前 (schema, table)
    old_names: HashSet<(String, String)>,
    /// リネーム後の名前 (schema, table)
    new_names: HashSet<(String, String)>,
}

impl<'a> RenameRegistry<'a> {
    /// リネームの無い空の登録
    pub fn empty() -> Self {
        Self::default()
    }

    /// 新旧の定義からリネームを検証して登録
    ///
    /// # Errors
    ///
    /// * `AmbiguousRename` - 旧名が新しい定義にもテーブルとして存在する
    /// * `RenameSourceMissing` - 旧テーブルが古い定義に存在しない
    /// * `DuplicateRename` - 2つのテーブルが同じ旧テーブルを宣言している
    pub fn build(
        old: &'a Definition,
        new: &'a Definition,
        ctx: &RunContext,
    ) -> Result<Self, EngineError> {
        let mut registry = Self::empty();
        if ctx.ignore_old_names {
            debug!("Table renames disabled by configuration");
            return Ok(registry);
        }

        let old_refs = ReferenceResolver::new(old);
        let new_refs = ReferenceResolver::new(new);

        for table in new_refs.tables() {
            if !table.table.declares_rename() {
                continue;
            }

            let old_schema = table
                .table
                .old_schema_name
                .as_deref()
                .unwrap_or(&table.schema.name);
            let old_table = table
                .table
                .old_table_name
                .as_deref()
                .unwrap_or(&table.table.name);

            if old_schema == table.schema.name && old_table == table.table.name {
                continue;
            }

            if new_refs.find_table(old_schema, old_table).is_some() {
                return Err(EngineError::AmbiguousRename {
                    schema: table.schema.name.clone(),
                    table: table.table.name.clone(),
                    old_schema: old_schema.to_string(),
                    old_table: old_table.to_string(),
                });
            }

            if old_refs
                .find_table(&table.schema.name, &table.table.name)
                .is_some()
            {
                debug!(
                    table = %table,
                    old_name = %format!("{}.{}", old_schema, old_table),
                    "Rename already applied, ignoring"
                );
                continue;
            }

            let Some(source) = old_refs.find_table(old_schema, old_table) else {
                return Err(EngineError::RenameSourceMissing {
                    schema: table.schema.name.clone(),
                    table: table.table.name.clone(),
                    old_schema: old_schema.to_string(),
                    old_table: old_table.to_string(),
                });
            };

            if let Some(first) = registry.reverse.get(&source) {
                return Err(EngineError::DuplicateRename {
                    old_schema: old_schema.to_string(),
                    old_table: old_table.to_string(),
                    first: first.qualified_name(),
                    second: table.qualified_name(),
                });
            }

            debug!(from = %source, to = %table, "Registered table rename");
            registry.insert(source, table);
        }

        Ok(registry)
    }

    fn insert(&mut self, old: TableRef<'a>, new: TableRef<'a>) {
        self.old_names
            .insert((old.schema.name.clone(), old.table.name.clone()));
        self.new_names
            .insert((new.schema.name.clone(), new.table.name.clone()));
        self.renames.insert(new, old);
        self.reverse.insert(old, new);
    }

    /// 新テーブルのリネーム元
    pub fn old_table_for(&self, new: TableRef<'a>) -> Option<TableRef<'a>> {
        self.renames.get(&new).copied()
    }

    /// 旧テーブルのリネーム先
    pub fn new_table_for(&self, old: TableRef<'a>) -> Option<TableRef<'a>> {
        self.reverse.get(&old).copied()
    }

    /// 新テーブルが検証済みのリネームかどうか
    pub fn is_renamed(&self, new: TableRef<'a>) -> bool {
        self.renames.contains_key(&new)
    }

    /// 旧定義側の名前がリネームされたテーブルを指すか
    pub fn is_renamed_old_name(&self, schema: &str, table: &str) -> bool {
        self.old_names
            .contains(&(schema.to_string(), table.to_string()))
    }

    /// 新定義側の名前がリネームされたテーブルを指すか
    pub fn is_renamed_new_name(&self, schema: &str, table: &str) -> bool {
        self.new_names
            .contains(&(schema.to_string(), table.to_string()))
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }
}
