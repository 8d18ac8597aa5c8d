// 参照解決サービス
//
// インライン外部キー・明示的外部キー・外部キー型の制約が指す
// スキーマ/テーブル/カラムを同じ定義ツリー内のオブジェクトに解決し、
// 外部キーの連鎖とテーブル継承をたどってカラムの実効型を導出します。

use crate::core::definition::{Column, Constraint, ConstraintType, Definition, ForeignKey};
use crate::core::error::{EngineError, ErrorLocation};
use crate::core::object_ref::TableRef;
use crate::core::table_constraint::ResolvedColumn;
use std::collections::HashSet;

/// 継承チェーンをたどる最大段数
const MAX_INHERITANCE_DEPTH: usize = 32;

/// 参照解決サービス
///
/// 1つの定義ツリーに束縛され、実行中は読み取り専用です。
#[derive(Debug, Clone, Copy)]
pub struct ReferenceResolver<'a> {
    definition: &'a Definition,
}

impl<'a> ReferenceResolver<'a> {
    /// 新しいReferenceResolverを作成
    pub fn new(definition: &'a Definition) -> Self {
        Self { definition }
    }

    pub fn definition(&self) -> &'a Definition {
        self.definition
    }

    /// 宣言順のすべてのテーブル
    pub fn tables(&self) -> Vec<TableRef<'a>> {
        self.definition
            .schemas
            .iter()
            .flat_map(|schema| schema.tables.iter().map(move |t| TableRef::new(schema, t)))
            .collect()
    }

    /// 名前でテーブルを検索
    pub fn find_table(&self, schema_name: &str, table_name: &str) -> Option<TableRef<'a>> {
        let schema = self.definition.get_schema(schema_name)?;
        let table = schema.get_table(table_name)?;
        Some(TableRef::new(schema, table))
    }

    /// 名前でテーブルを解決（見つからない場合は致命的エラー）
    pub fn resolve_table(
        &self,
        schema_name: &str,
        table_name: &str,
        location: &ErrorLocation,
    ) -> Result<TableRef<'a>, EngineError> {
        let schema = self.definition.get_schema(schema_name).ok_or_else(|| {
            EngineError::unresolved(
                format!("schema '{}' not found", schema_name),
                location.clone(),
            )
        })?;
        let table = schema.get_table(table_name).ok_or_else(|| {
            EngineError::unresolved(
                format!("table '{}.{}' not found", schema_name, table_name),
                location.clone(),
            )
        })?;
        Ok(TableRef::new(schema, table))
    }

    /// 継承元テーブル
    pub fn parent_table(&self, table: TableRef<'a>) -> Result<Option<TableRef<'a>>, EngineError> {
        let Some(parent_name) = &table.table.inherits_table else {
            return Ok(None);
        };
        let parent_schema = table
            .table
            .inherits_schema
            .as_deref()
            .unwrap_or(&table.schema.name);
        let location = ErrorLocation::table(&table.schema.name, &table.table.name);
        self.resolve_table(parent_schema, parent_name, &location)
            .map(Some)
    }

    /// インラインカラム外部キーの参照先テーブル
    pub fn column_foreign_table(
        &self,
        owner: TableRef<'a>,
        column: &Column,
    ) -> Result<Option<TableRef<'a>>, EngineError> {
        let Some(foreign_table) = &column.foreign_table else {
            return Ok(None);
        };
        let foreign_schema = column
            .foreign_schema
            .as_deref()
            .unwrap_or(&owner.schema.name);
        let location =
            ErrorLocation::table(&owner.schema.name, &owner.table.name).with_column(&column.name);
        self.resolve_table(foreign_schema, foreign_table, &location)
            .map(Some)
    }

    /// 明示的外部キーの参照先テーブル
    pub fn foreign_key_table(
        &self,
        owner: TableRef<'a>,
        foreign_key: &ForeignKey,
    ) -> Result<TableRef<'a>, EngineError> {
        let foreign_schema = foreign_key
            .foreign_schema
            .as_deref()
            .unwrap_or(&owner.schema.name);
        let mut location = ErrorLocation::table(&owner.schema.name, &owner.table.name);
        if let Some(name) = &foreign_key.constraint_name {
            location = location.with_constraint(name);
        }
        self.resolve_table(foreign_schema, &foreign_key.foreign_table, &location)
    }

    /// 外部キー型テーブル制約の構造化された参照先
    ///
    /// 構造化参照を持たない制約（生のREFERENCES句のみ）は `None` を返します。
    pub fn constraint_foreign_table(
        &self,
        owner: TableRef<'a>,
        constraint: &Constraint,
    ) -> Result<Option<TableRef<'a>>, EngineError> {
        if constraint.constraint_type != ConstraintType::ForeignKey {
            return Ok(None);
        }
        let Some(foreign_table) = &constraint.foreign_table else {
            return Ok(None);
        };
        let foreign_schema = constraint
            .foreign_schema
            .as_deref()
            .unwrap_or(&owner.schema.name);
        let location = ErrorLocation::table(&owner.schema.name, &owner.table.name)
            .with_constraint(&constraint.name);
        self.resolve_table(foreign_schema, foreign_table, &location)
            .map(Some)
    }

    /// カラムを検索（継承元も探索）
    ///
    /// 見つかったカラムとそれを宣言しているテーブルを返します。
    pub fn find_column(
        &self,
        table: TableRef<'a>,
        column_name: &str,
    ) -> Result<Option<(TableRef<'a>, &'a Column)>, EngineError> {
        let mut current = table;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Some(column) = current.table.get_column(column_name) {
                return Ok(Some((current, column)));
            }
            match self.parent_table(current)? {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    /// カラムを解決（見つからない場合は致命的エラー）
    pub fn require_column(
        &self,
        table: TableRef<'a>,
        column_name: &str,
        location: &ErrorLocation,
    ) -> Result<(TableRef<'a>, &'a Column), EngineError> {
        self.find_column(table, column_name)?.ok_or_else(|| {
            EngineError::unresolved(
                format!("column '{}' not found in table {}", column_name, table),
                location.clone(),
            )
        })
    }

    /// プライマリキーのカラム名
    ///
    /// テーブル自身が宣言していない場合は継承元のプライマリキーを使います。
    pub fn primary_key_names(&self, table: TableRef<'a>) -> Result<Vec<String>, EngineError> {
        let mut current = table;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if !current.table.primary_key.is_empty() {
                return Ok(current.table.primary_key.clone());
            }
            match self.parent_table(current)? {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Err(EngineError::MissingPrimaryKey {
            schema: table.schema.name.clone(),
            table: table.table.name.clone(),
            detail: None,
        })
    }

    /// プライマリキーのカラム
    pub fn primary_key_columns(
        &self,
        table: TableRef<'a>,
    ) -> Result<Vec<(TableRef<'a>, &'a Column)>, EngineError> {
        let names = self.primary_key_names(table)?;
        names
            .iter()
            .map(|name| {
                self.find_column(table, name)?
                    .ok_or_else(|| EngineError::MissingPrimaryKey {
                        schema: table.schema.name.clone(),
                        table: table.table.name.clone(),
                        detail: Some(format!("primary key column '{}' not found", name)),
                    })
            })
            .collect()
    }

    /// インライン外部キーの参照先カラム
    ///
    /// `foreign_column` が省略された場合は、参照先に同名カラムがあればそれを、
    /// 無ければ参照先の単一カラムのプライマリキーを使います。
    pub fn column_foreign_column(
        &self,
        owner: TableRef<'a>,
        column: &Column,
    ) -> Result<Option<(TableRef<'a>, &'a Column)>, EngineError> {
        let Some(foreign) = self.column_foreign_table(owner, column)? else {
            return Ok(None);
        };
        let location =
            ErrorLocation::table(&owner.schema.name, &owner.table.name).with_column(&column.name);
        self.foreign_column_for(foreign, column.foreign_column.as_deref(), &column.name, &location)
            .map(Some)
    }

    /// 参照先カラムを既定規則込みで解決
    pub fn foreign_column_for(
        &self,
        foreign: TableRef<'a>,
        explicit: Option<&str>,
        local_name: &str,
        location: &ErrorLocation,
    ) -> Result<(TableRef<'a>, &'a Column), EngineError> {
        if let Some(name) = explicit {
            return self.require_column(foreign, name, location);
        }

        if let Some(found) = self.find_column(foreign, local_name)? {
            return Ok(found);
        }

        let key = self.primary_key_columns(foreign)?;
        match key.as_slice() {
            [single] => Ok(*single),
            _ => Err(EngineError::unresolved(
                format!(
                    "cannot determine referenced column in {}: no column '{}' and primary key is not a single column",
                    foreign, local_name
                ),
                location.clone(),
            )),
        }
    }

    /// カラムの実効型
    ///
    /// 型が宣言されていればそのまま返します。宣言が無い場合は外部キーの
    /// 参照先（インライン、明示的外部キーの順）、次に継承元の同名カラムから導出し、
    /// 参照経由の serial 系は対応する整数型に置き換えます。
    pub fn column_type(
        &self,
        table: TableRef<'a>,
        column: &'a Column,
    ) -> Result<String, EngineError> {
        let mut visited = HashSet::new();
        self.column_type_guarded(table, column, &mut visited)
    }

    fn column_type_guarded(
        &self,
        table: TableRef<'a>,
        column: &'a Column,
        visited: &mut HashSet<usize>,
    ) -> Result<String, EngineError> {
        let location =
            ErrorLocation::table(&table.schema.name, &table.table.name).with_column(&column.name);

        if let Some(column_type) = &column.column_type {
            return Ok(column_type.clone());
        }

        if !visited.insert(column as *const Column as usize) {
            return Err(EngineError::UnresolvedColumnType {
                message: "circular type reference through foreign keys".to_string(),
                location,
            });
        }

        if let Some((foreign_table, foreign_column)) = self.column_foreign_column(table, column)? {
            let derived = self.column_type_guarded(foreign_table, foreign_column, visited)?;
            return Ok(referenced_type(&derived));
        }

        if let Some((foreign_table, foreign_column)) =
            self.explicit_foreign_column(table, &column.name, &location)?
        {
            let derived = self.column_type_guarded(foreign_table, foreign_column, visited)?;
            return Ok(referenced_type(&derived));
        }

        if let Some(parent) = self.parent_table(table)? {
            if let Some((parent_table, parent_column)) = self.find_column(parent, &column.name)? {
                return self.column_type_guarded(parent_table, parent_column, visited);
            }
        }

        Err(EngineError::UnresolvedColumnType {
            message: "column has no type and no foreign key to derive it from".to_string(),
            location,
        })
    }

    /// 明示的外部キーに含まれるカラムの参照先カラム
    fn explicit_foreign_column(
        &self,
        table: TableRef<'a>,
        column_name: &str,
        location: &ErrorLocation,
    ) -> Result<Option<(TableRef<'a>, &'a Column)>, EngineError> {
        for foreign_key in &table.table.foreign_keys {
            let Some(position) = foreign_key.columns.iter().position(|c| c == column_name) else {
                continue;
            };
            let foreign = self.foreign_key_table(table, foreign_key)?;
            let explicit = foreign_key.foreign_columns.get(position).map(String::as_str);
            return self
                .foreign_column_for(foreign, explicit, column_name, location)
                .map(Some);
        }
        Ok(None)
    }

    /// カラム名から型解決済みカラムを作成
    pub fn resolve_column(
        &self,
        table: TableRef<'a>,
        column_name: &str,
        location: &ErrorLocation,
    ) -> Result<ResolvedColumn<'a>, EngineError> {
        let (owner, column) = self.require_column(table, column_name, location)?;
        Ok(ResolvedColumn {
            column,
            column_type: self.column_type(owner, column)?,
        })
    }
}

/// 参照元カラムに使う型（serial 系を整数型に置き換え）
pub fn referenced_type(column_type: &str) -> String {
    match column_type.trim().to_ascii_lowercase().as_str() {
        "serial" | "serial4" => "integer".to_string(),
        "bigserial" | "serial8" => "bigint".to_string(),
        "smallserial" | "serial2" => "smallint".to_string(),
        _ => column_type.to_string(),
    }
}

/// serial 系の型かどうか
pub fn is_serial_type(column_type: &str) -> bool {
    matches!(
        column_type.trim().to_ascii_lowercase().as_str(),
        "serial" | "serial4" | "bigserial" | "serial8" | "smallserial" | "serial2"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::definition::{Schema, Table};

    fn definition() -> Definition {
        let mut schema = Schema::new("app");

        let mut users = Table::new("users");
        users.primary_key = vec!["id".to_string()];
        users.add_column(Column::new("id", "serial", false));
        schema.add_table(users);

        let mut posts = Table::new("posts");
        posts.primary_key = vec!["id".to_string()];
        posts.add_column(Column::new("id", "bigserial", false));
        let mut author = Column::untyped("author_id");
        author.foreign_table = Some("users".to_string());
        posts.add_column(author);
        schema.add_table(posts);

        let mut comments = Table::new("comments");
        comments.primary_key = vec!["id".to_string()];
        comments.add_column(Column::new("id", "integer", false));
        let mut post = Column::untyped("post_author_id");
        post.foreign_table = Some("posts".to_string());
        post.foreign_column = Some("author_id".to_string());
        comments.add_column(post);
        schema.add_table(comments);

        let mut definition = Definition::new();
        definition.add_schema(schema);
        definition
    }

    #[test]
    fn test_serial_is_mapped_through_foreign_key() {
        let definition = definition();
        let resolver = ReferenceResolver::new(&definition);
        let posts = resolver.find_table("app", "posts").unwrap();
        let author = posts.table.get_column("author_id").unwrap();

        assert_eq!(resolver.column_type(posts, author).unwrap(), "integer");
    }

    #[test]
    fn test_type_follows_foreign_key_chain() {
        let definition = definition();
        let resolver = ReferenceResolver::new(&definition);
        let comments = resolver.find_table("app", "comments").unwrap();
        let column = comments.table.get_column("post_author_id").unwrap();

        assert_eq!(resolver.column_type(comments, column).unwrap(), "integer");
    }

    #[test]
    fn test_foreign_column_defaults_to_single_primary_key() {
        let definition = definition();
        let resolver = ReferenceResolver::new(&definition);
        let posts = resolver.find_table("app", "posts").unwrap();
        let author = posts.table.get_column("author_id").unwrap();

        let (table, column) = resolver.column_foreign_column(posts, author).unwrap().unwrap();
        assert_eq!(table.table.name, "users");
        assert_eq!(column.name, "id");
    }

    #[test]
    fn test_unknown_foreign_table_is_fatal() {
        let mut definition = definition();
        let mut broken = Column::untyped("owner_id");
        broken.foreign_table = Some("missing".to_string());
        definition.schemas[0].tables[0].add_column(broken);

        let resolver = ReferenceResolver::new(&definition);
        let users = resolver.find_table("app", "users").unwrap();
        let column = users.table.get_column("owner_id").unwrap();
        let error = resolver.column_type(users, column).unwrap_err();
        assert!(error.is_unresolved_reference());
    }

    #[test]
    fn test_primary_key_inherited_from_parent() {
        let mut definition = definition();
        let mut child = Table::new("admins");
        child.inherits_table = Some("users".to_string());
        child.add_column(Column::new("level", "integer", true));
        definition.schemas[0].add_table(child);

        let resolver = ReferenceResolver::new(&definition);
        let admins = resolver.find_table("app", "admins").unwrap();
        let key = resolver.primary_key_columns(admins).unwrap();
        assert_eq!(key.len(), 1);
        assert_eq!(key[0].0.table.name, "users");
    }

    #[test]
    fn test_missing_primary_key() {
        let mut definition = definition();
        definition.schemas[0].add_table(Table::new("loose"));
        let resolver = ReferenceResolver::new(&definition);
        let loose = resolver.find_table("app", "loose").unwrap();

        assert!(matches!(
            resolver.primary_key_names(loose),
            Err(EngineError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn test_referenced_type() {
        assert_eq!(referenced_type("SERIAL"), "integer");
        assert_eq!(referenced_type("bigserial"), "bigint");
        assert_eq!(referenced_type("smallserial"), "smallint");
        assert_eq!(referenced_type("text"), "text");
        assert!(is_serial_type("BigSerial"));
        assert!(!is_serial_type("integer"));
    }
}
