// 依存グラフのノード参照
//
// TableRef / ViewRef は1つの定義ツリーから借用した (スキーマ, オブジェクト) の組。
// 差分実行では新旧2つのツリーを同時に扱うため、等価性とハッシュは
// 名前ではなく参照先オブジェクトの同一性（アドレス）で判定します。

use crate::core::definition::{Schema, Table, View};
use std::fmt;
use std::hash::{Hash, Hasher};

/// テーブル参照
#[derive(Debug, Clone, Copy)]
pub struct TableRef<'a> {
    pub schema: &'a Schema,
    pub table: &'a Table,
}

impl<'a> TableRef<'a> {
    pub fn new(schema: &'a Schema, table: &'a Table) -> Self {
        Self { schema, table }
    }

    /// `schema.table` 形式の修飾名
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema.name, self.table.name)
    }

    /// 安定ソート用のキー
    pub fn sort_key(&self) -> (&'a str, &'a str) {
        (self.schema.name.as_str(), self.table.name.as_str())
    }
}

impl PartialEq for TableRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && std::ptr::eq(self.table, other.table)
    }
}

impl Eq for TableRef<'_> {}

impl Hash for TableRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.schema, state);
        std::ptr::hash(self.table, state);
    }
}

impl fmt::Display for TableRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema.name, self.table.name)
    }
}

/// ビュー参照
#[derive(Debug, Clone, Copy)]
pub struct ViewRef<'a> {
    pub schema: &'a Schema,
    pub view: &'a View,
}

impl<'a> ViewRef<'a> {
    pub fn new(schema: &'a Schema, view: &'a View) -> Self {
        Self { schema, view }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema.name, self.view.name)
    }
}

impl PartialEq for ViewRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && std::ptr::eq(self.view, other.view)
    }
}

impl Eq for ViewRef<'_> {}

impl Hash for ViewRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.schema, state);
        std::ptr::hash(self.view, state);
    }
}

impl fmt::Display for ViewRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema.name, self.view.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_ref_identity_not_name() {
        let mut old_schema = Schema::new("app");
        old_schema.add_table(Table::new("users"));
        let new_schema = old_schema.clone();

        let old_ref = TableRef::new(&old_schema, &old_schema.tables[0]);
        let new_ref = TableRef::new(&new_schema, &new_schema.tables[0]);

        // 同名でも別ツリーのオブジェクトは等しくない
        assert_ne!(old_ref, new_ref);
        assert_eq!(old_ref, TableRef::new(&old_schema, &old_schema.tables[0]));

        let mut set = HashSet::new();
        set.insert(old_ref);
        set.insert(new_ref);
        assert_eq!(set.len(), 2);
        assert_eq!(old_ref.qualified_name(), "app.users");
    }

    #[test]
    fn test_view_ref_display() {
        let mut schema = Schema::new("app");
        schema.add_view(View::new("active_users", "SELECT 1"));
        let view_ref = ViewRef::new(&schema, &schema.views[0]);
        assert_eq!(view_ref.to_string(), "app.active_users");
    }
}
