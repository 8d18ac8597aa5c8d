// 依存関係解決サービス
//
// テーブル（外部キーのエッジ）とビュー（明示的に宣言された依存）の
// 安全な作成順序を決定します。

use crate::core::definition::Definition;
use crate::core::error::{EngineError, ErrorLocation};
use crate::core::object_ref::{TableRef, ViewRef};
use crate::services::reference_resolver::ReferenceResolver;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 依存関係解決サービス
#[derive(Debug, Clone, Copy)]
pub struct DependencyResolver<'a> {
    references: ReferenceResolver<'a>,
}

impl<'a> DependencyResolver<'a> {
    /// 新しいDependencyResolverを作成
    pub fn new(definition: &'a Definition) -> Self {
        Self {
            references: ReferenceResolver::new(definition),
        }
    }

    /// テーブルが外部キーで参照しているテーブル
    ///
    /// 継承元テーブル、インライン外部キー、明示的外部キー、構造化参照を持つ
    /// 外部キー型制約を走査します。自己参照は依存として扱いません。
    pub fn table_dependencies(&self, table: TableRef<'a>) -> Result<Vec<TableRef<'a>>, EngineError> {
        let mut dependencies = Vec::new();

        if let Some(parent) = self.references.parent_table(table)? {
            dependencies.push(parent);
        }

        for column in &table.table.columns {
            if let Some(foreign) = self.references.column_foreign_table(table, column)? {
                dependencies.push(foreign);
            }
        }

        for foreign_key in &table.table.foreign_keys {
            dependencies.push(self.references.foreign_key_table(table, foreign_key)?);
        }

        for constraint in &table.table.constraints {
            if let Some(foreign) = self.references.constraint_foreign_table(table, constraint)? {
                dependencies.push(foreign);
            }
        }

        let mut seen = HashSet::new();
        dependencies.retain(|dependency| *dependency != table && seen.insert(*dependency));
        Ok(dependencies)
    }

    /// テーブルの作成順序
    ///
    /// 依存の無いテーブルをバッチ単位で取り出し、各バッチを
    /// (スキーマ名, テーブル名) でソートして連結します。
    ///
    /// # Returns
    ///
    /// どのテーブルも依存先より後に現れる順序。循環がある場合は
    /// 残ったテーブルを列挙した `DependencyCycle` エラー
    pub fn table_order(&self) -> Result<Vec<TableRef<'a>>, EngineError> {
        let tables = self.references.tables();

        let mut forward: HashMap<TableRef<'a>, HashSet<TableRef<'a>>> = HashMap::new();
        let mut reverse: HashMap<TableRef<'a>, HashSet<TableRef<'a>>> = HashMap::new();

        for table in &tables {
            forward.entry(*table).or_default();
            for dependency in self.table_dependencies(*table)? {
                forward.entry(*table).or_default().insert(dependency);
                reverse.entry(dependency).or_default().insert(*table);
            }
        }

        let mut order = Vec::with_capacity(tables.len());
        let mut batch_number = 0usize;

        while !forward.is_empty() {
            let mut batch: Vec<TableRef<'a>> = forward
                .iter()
                .filter(|(_, dependencies)| dependencies.is_empty())
                .map(|(table, _)| *table)
                .collect();

            if batch.is_empty() {
                let mut remaining: Vec<TableRef<'a>> = forward.keys().copied().collect();
                remaining.sort_by_key(|t| t.sort_key());
                return Err(EngineError::DependencyCycle {
                    tables: remaining.iter().map(|t| t.qualified_name()).collect(),
                });
            }

            batch.sort_by_key(|t| t.sort_key());
            batch_number += 1;
            debug!(
                batch = batch_number,
                tables = %batch.iter().map(|t| t.qualified_name()).collect::<Vec<_>>().join(", "),
                "Resolved table batch"
            );

            for table in &batch {
                forward.remove(table);
                if let Some(dependents) = reverse.remove(table) {
                    for dependent in dependents {
                        if let Some(dependencies) = forward.get_mut(&dependent) {
                            dependencies.remove(table);
                        }
                    }
                }
            }

            order.extend(batch);
        }

        Ok(order)
    }

    /// ビューの作成順序
    ///
    /// 宣言順に全ビューを起点とする深さ優先の帰りがけ順。
    /// 依存先のスキーマを省略した場合はビュー自身のスキーマを使います。
    pub fn view_order(&self) -> Result<Vec<ViewRef<'a>>, EngineError> {
        let definition = self.references.definition();
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut in_progress = Vec::new();

        for schema in &definition.schemas {
            for view in &schema.views {
                self.visit_view(
                    ViewRef::new(schema, view),
                    &mut visited,
                    &mut in_progress,
                    &mut order,
                )?;
            }
        }

        Ok(order)
    }

    fn visit_view(
        &self,
        view: ViewRef<'a>,
        visited: &mut HashSet<ViewRef<'a>>,
        in_progress: &mut Vec<ViewRef<'a>>,
        order: &mut Vec<ViewRef<'a>>,
    ) -> Result<(), EngineError> {
        if visited.contains(&view) {
            return Ok(());
        }

        if let Some(start) = in_progress.iter().position(|v| *v == view) {
            let mut path: Vec<String> = in_progress[start..]
                .iter()
                .map(|v| v.qualified_name())
                .collect();
            path.push(view.qualified_name());
            return Err(EngineError::ViewDependencyCycle { path });
        }

        in_progress.push(view);
        for dependency in &view.view.depends_on {
            let schema_name = dependency.schema.as_deref().unwrap_or(&view.schema.name);
            let target = self.resolve_view(view, schema_name, &dependency.view)?;
            self.visit_view(target, visited, in_progress, order)?;
        }
        in_progress.pop();

        visited.insert(view);
        order.push(view);
        Ok(())
    }

    fn resolve_view(
        &self,
        from: ViewRef<'a>,
        schema_name: &str,
        view_name: &str,
    ) -> Result<ViewRef<'a>, EngineError> {
        let definition = self.references.definition();
        let location = ErrorLocation::table(&from.schema.name, &from.view.name);
        let schema = definition.get_schema(schema_name).ok_or_else(|| {
            EngineError::unresolved(
                format!("schema '{}' of view dependency not found", schema_name),
                location.clone(),
            )
        })?;
        let view = schema.get_view(view_name).ok_or_else(|| {
            EngineError::unresolved(
                format!("view '{}.{}' not found", schema_name, view_name),
                location.clone(),
            )
        })?;
        Ok(ViewRef::new(schema, view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::definition::{Column, Schema, Table, View, ViewDependency};

    fn table(name: &str, references: &[&str]) -> Table {
        let mut table = Table::new(name);
        table.primary_key = vec!["id".to_string()];
        table.add_column(Column::new("id", "integer", false));
        for target in references {
            let mut column = Column::untyped(format!("{}_id", target));
            column.foreign_table = Some(target.to_string());
            table.add_column(column);
        }
        table
    }

    #[test]
    fn test_self_reference_is_not_a_dependency() {
        let mut schema = Schema::new("app");
        let mut tree = table("node", &[]);
        let mut parent = Column::untyped("parent_id");
        parent.foreign_table = Some("node".to_string());
        parent.foreign_column = Some("id".to_string());
        tree.add_column(parent);
        schema.add_table(tree);
        let mut definition = Definition::new();
        definition.add_schema(schema);

        let resolver = DependencyResolver::new(&definition);
        let order = resolver.table_order().unwrap();
        assert_eq!(order.len(), 1);
    }

    #[test]
    fn test_inherited_table_follows_parent() {
        let mut schema = Schema::new("app");
        let mut child = table("achild", &[]);
        child.inherits_table = Some("zparent".to_string());
        schema.add_table(child);
        schema.add_table(table("zparent", &[]));
        let mut definition = Definition::new();
        definition.add_schema(schema);

        let resolver = DependencyResolver::new(&definition);
        let order: Vec<String> = resolver
            .table_order()
            .unwrap()
            .iter()
            .map(|t| t.table.name.clone())
            .collect();
        assert_eq!(order, vec!["zparent", "achild"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut schema = Schema::new("app");
        schema.add_table(table("a", &["b"]));
        schema.add_table(table("b", &["a"]));
        schema.add_table(table("c", &[]));
        let mut definition = Definition::new();
        definition.add_schema(schema);

        let error = DependencyResolver::new(&definition).table_order().unwrap_err();
        assert_eq!(
            error,
            EngineError::DependencyCycle {
                tables: vec!["app.a".to_string(), "app.b".to_string()]
            }
        );
    }

    #[test]
    fn test_view_order_is_post_order() {
        let mut schema = Schema::new("app");
        let mut top = View::new("top", "SELECT * FROM app.middle");
        top.depends_on.push(ViewDependency {
            schema: None,
            view: "middle".to_string(),
        });
        let mut middle = View::new("middle", "SELECT * FROM app.base");
        middle.depends_on.push(ViewDependency {
            schema: Some("app".to_string()),
            view: "base".to_string(),
        });
        schema.add_view(top);
        schema.add_view(middle);
        schema.add_view(View::new("base", "SELECT 1"));
        let mut definition = Definition::new();
        definition.add_schema(schema);

        let order = DependencyResolver::new(&definition).view_order().unwrap();
        let names: Vec<String> = order.iter().map(|v| v.view.name.clone()).collect();
        assert_eq!(names, vec!["base", "middle", "top"]);
    }

    #[test]
    fn test_view_cycle_is_rejected() {
        let mut schema = Schema::new("app");
        let mut a = View::new("a", "SELECT 1");
        a.depends_on.push(ViewDependency {
            schema: None,
            view: "b".to_string(),
        });
        let mut b = View::new("b", "SELECT 1");
        b.depends_on.push(ViewDependency {
            schema: None,
            view: "a".to_string(),
        });
        schema.add_view(a);
        schema.add_view(b);
        let mut definition = Definition::new();
        definition.add_schema(schema);

        let error = DependencyResolver::new(&definition).view_order().unwrap_err();
        assert!(error.is_cycle());
        assert_eq!(
            error,
            EngineError::ViewDependencyCycle {
                path: vec!["app.a".to_string(), "app.b".to_string(), "app.a".to_string()]
            }
        );
    }

    #[test]
    fn test_unknown_view_dependency() {
        let mut schema = Schema::new("app");
        let mut a = View::new("a", "SELECT 1");
        a.depends_on.push(ViewDependency {
            schema: None,
            view: "ghost".to_string(),
        });
        schema.add_view(a);
        let mut definition = Definition::new();
        definition.add_schema(schema);

        let error = DependencyResolver::new(&definition).view_order().unwrap_err();
        assert!(error.is_unresolved_reference());
    }
}
