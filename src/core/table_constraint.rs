// 正規化された制約モデル
//
// プライマリキー、テーブル制約、明示的外部キー、インライン外部キー、
// カラムCHECK制約の5つの入力源を1つの比較可能な形に統一します。
// 入力フォーマットには現れないエンジン内部の派生型です。

use crate::core::definition::{Column, ConstraintType, ForeignKeyAction};
use crate::core::object_ref::TableRef;
use crate::core::operation::{ConstraintSpec, Operation, QualifiedName};

/// 制約の正規化された種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    PrimaryKey,
    Foreign,
    Other,
}

/// 制約の種類によるフィルタ
///
/// | filter       | PrimaryKey | Foreign | Other |
/// |--------------|------------|---------|-------|
/// | `PrimaryKey` | yes        |         |       |
/// | `Foreign`    |            | yes     |       |
/// | `Other`      |            |         | yes   |
/// | `Constraint` |            | yes     | yes   |
/// | `All`        | yes        | yes     | yes   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintFilter {
    PrimaryKey,
    Foreign,
    Other,
    Constraint,
    All,
}

impl ConstraintFilter {
    /// 指定された種類を含むかどうか
    pub fn includes(&self, kind: ConstraintKind) -> bool {
        match (self, kind) {
            (ConstraintFilter::All, _) => true,
            (ConstraintFilter::PrimaryKey, ConstraintKind::PrimaryKey) => true,
            (ConstraintFilter::Foreign, ConstraintKind::Foreign) => true,
            (ConstraintFilter::Other, ConstraintKind::Other) => true,
            (ConstraintFilter::Constraint, ConstraintKind::Foreign | ConstraintKind::Other) => {
                true
            }
            _ => false,
        }
    }
}

/// 型解決済みのカラム
#[derive(Debug, Clone)]
pub struct ResolvedColumn<'a> {
    pub column: &'a Column,
    /// 外部キーの連鎖と継承をたどって決定した実効型
    pub column_type: String,
}

impl ResolvedColumn<'_> {
    pub fn name(&self) -> &str {
        &self.column.name
    }

    /// 型の等価判定（大文字小文字と前後の空白を無視）
    pub fn same_type(&self, other: &ResolvedColumn<'_>) -> bool {
        normalize_type(&self.column_type) == normalize_type(&other.column_type)
    }
}

/// 型名の正規化
pub fn normalize_type(column_type: &str) -> String {
    column_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

/// 外部キーの参照先
#[derive(Debug, Clone)]
pub struct ForeignReference<'a> {
    pub table: TableRef<'a>,
    pub columns: Vec<ResolvedColumn<'a>>,
}

/// 生のREFERENCES句から抽出した参照先名（構造化参照が無い場合のみ）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencedName {
    pub schema: Option<String>,
    pub table: String,
}

/// 正規化された制約
#[derive(Debug, Clone)]
pub struct TableConstraint<'a> {
    pub name: String,
    pub kind: ConstraintKind,
    /// 元のSQL制約種別
    pub sql_type: ConstraintType,
    pub table: TableRef<'a>,
    pub columns: Vec<ResolvedColumn<'a>>,
    pub foreign: Option<ForeignReference<'a>>,
    /// 構造化参照が無いときに生定義から抽出した参照先
    pub referenced_name: Option<ReferencedName>,
    pub on_update: Option<ForeignKeyAction>,
    pub on_delete: Option<ForeignKeyAction>,
    /// 生の制約定義（テーブル制約・CHECK式）
    pub definition: Option<String>,
}

impl<'a> TableConstraint<'a> {
    /// 名前と種類が一致するか（名前は大文字小文字を区別しない）
    pub fn same_identity(&self, other: &TableConstraint<'_>) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.kind == other.kind
    }

    /// 制約の等価判定
    ///
    /// 名前・種類・SQL種別・生定義・参照アクションに加えて、
    /// 対応するカラム同士の名前と型が等しいことを要求します。参照先カラムの型が
    /// 変わった外部キーは定義文字列が同じでも再作成の対象になります。
    pub fn equals(&self, other: &TableConstraint<'_>) -> bool {
        if !self.same_identity(other)
            || self.sql_type != other.sql_type
            || self.definition != other.definition
            || self.on_update != other.on_update
            || self.on_delete != other.on_delete
        {
            return false;
        }

        if !same_column_names(&self.columns, &other.columns)
            || !same_column_types(&self.columns, &other.columns)
        {
            return false;
        }

        match (&self.foreign, &other.foreign) {
            (None, None) => true,
            (Some(left), Some(right)) => {
                left.table.table.name == right.table.table.name
                    && left.table.schema.name == right.table.schema.name
                    && same_column_names(&left.columns, &right.columns)
                    && same_column_types(&left.columns, &right.columns)
            }
            _ => false,
        }
    }

    /// カラム名のリスト
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    /// 参照先の (スキーマ名, テーブル名)
    ///
    /// 構造化参照を優先し、無い場合のみ生定義から抽出した名前を返します。
    pub fn foreign_table_name(&self) -> Option<(String, String)> {
        if let Some(foreign) = &self.foreign {
            return Some((
                foreign.table.schema.name.clone(),
                foreign.table.table.name.clone(),
            ));
        }
        self.referenced_name.as_ref().map(|r| {
            (
                r.schema
                    .clone()
                    .unwrap_or_else(|| self.table.schema.name.clone()),
                r.table.clone(),
            )
        })
    }

    /// 制約作成の操作に変換
    pub fn add_operation(&self) -> Operation {
        let (foreign_table, foreign_columns) = match &self.foreign {
            Some(foreign) => (
                Some(QualifiedName::from(foreign.table)),
                foreign
                    .columns
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
            ),
            None => (None, Vec::new()),
        };

        Operation::AddConstraint(ConstraintSpec {
            name: self.name.clone(),
            table: QualifiedName::from(self.table),
            kind: self.kind,
            sql_type: self.sql_type,
            columns: self.column_names(),
            foreign_table,
            foreign_columns,
            on_update: self.on_update,
            on_delete: self.on_delete,
            definition: self.definition.clone(),
        })
    }

    /// 制約削除の操作に変換
    pub fn drop_operation(&self) -> Operation {
        Operation::DropConstraint {
            table: QualifiedName::from(self.table),
            name: self.name.clone(),
            kind: self.kind,
            sql_type: self.sql_type,
        }
    }
}

fn same_column_types(left: &[ResolvedColumn<'_>], right: &[ResolvedColumn<'_>]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(l, r)| l.same_type(r))
}

fn same_column_names(left: &[ResolvedColumn<'_>], right: &[ResolvedColumn<'_>]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(l, r)| l.name() == r.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::definition::{Schema, Table};

    #[test]
    fn test_filter_includes_table() {
        use ConstraintKind::*;

        assert!(ConstraintFilter::All.includes(PrimaryKey));
        assert!(ConstraintFilter::All.includes(Foreign));
        assert!(ConstraintFilter::All.includes(Other));

        assert!(ConstraintFilter::Constraint.includes(Foreign));
        assert!(ConstraintFilter::Constraint.includes(Other));
        assert!(!ConstraintFilter::Constraint.includes(PrimaryKey));

        assert!(ConstraintFilter::PrimaryKey.includes(PrimaryKey));
        assert!(!ConstraintFilter::PrimaryKey.includes(Foreign));

        assert!(ConstraintFilter::Foreign.includes(Foreign));
        assert!(!ConstraintFilter::Foreign.includes(Other));

        assert!(ConstraintFilter::Other.includes(Other));
        assert!(!ConstraintFilter::Other.includes(PrimaryKey));
    }

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("  Character  Varying(20) "), "character varying(20)");
        assert_eq!(normalize_type("INT"), normalize_type("int"));
    }

    fn unique_constraint<'a>(
        table_ref: TableRef<'a>,
        name: &str,
        column: &'a Column,
        column_type: &str,
    ) -> TableConstraint<'a> {
        TableConstraint {
            name: name.to_string(),
            kind: ConstraintKind::Other,
            sql_type: ConstraintType::Unique,
            table: table_ref,
            columns: vec![ResolvedColumn {
                column,
                column_type: column_type.to_string(),
            }],
            foreign: None,
            referenced_name: None,
            on_update: None,
            on_delete: None,
            definition: Some("(email)".to_string()),
        }
    }

    #[test]
    fn test_equals_is_reflexive_and_symmetric() {
        let mut schema = Schema::new("app");
        let mut table = Table::new("users");
        table.add_column(Column::new("email", "text", false));
        schema.add_table(table);
        let table_ref = TableRef::new(&schema, &schema.tables[0]);
        let column = &schema.tables[0].columns[0];

        let a = unique_constraint(table_ref, "users_email_key", column, "text");
        let b = unique_constraint(table_ref, "USERS_EMAIL_KEY", column, "TEXT");
        let c = unique_constraint(table_ref, "users_email_key", column, "varchar(10)");

        assert!(a.equals(&a));
        assert!(a.equals(&b));
        assert!(b.equals(&a));
        assert!(!a.equals(&c));
        assert!(!c.equals(&a));
    }
}
