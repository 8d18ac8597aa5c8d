// スキーマ操作モデル
//
// エンジンが生成する方言非依存の操作を表現します。
// SQLテキストへの変換は adapters::sql_renderer の責務で、
// エンジン自身はSQLを組み立てません。

use crate::core::definition::{
    ConstraintType, DataValue, ForeignKeyAction, Function, Grant, Index, Partition, Sequence,
    TableOption, Trigger,
};
use crate::core::object_ref::{TableRef, ViewRef};
use crate::core::table_constraint::ConstraintKind;
use std::fmt;

/// スキーマ修飾名
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub schema: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl From<TableRef<'_>> for QualifiedName {
    fn from(table: TableRef<'_>) -> Self {
        QualifiedName::new(&table.schema.name, &table.table.name)
    }
}

impl From<ViewRef<'_>> for QualifiedName {
    fn from(view: ViewRef<'_>) -> Self {
        QualifiedName::new(&view.schema.name, &view.view.name)
    }
}

/// 型解決済みのカラム仕様
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// 制約の作成仕様
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSpec {
    pub name: String,
    pub table: QualifiedName,
    pub kind: ConstraintKind,
    pub sql_type: ConstraintType,
    pub columns: Vec<String>,
    /// 構造化された参照先（外部キーのみ）
    pub foreign_table: Option<QualifiedName>,
    pub foreign_columns: Vec<String>,
    pub on_update: Option<ForeignKeyAction>,
    pub on_delete: Option<ForeignKeyAction>,
    /// 生の制約定義（型キーワード以降のテキスト）
    pub definition: Option<String>,
}

/// 列挙値の追加位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumValuePosition {
    Before(String),
    After(String),
}

/// カラム値の組（カラム名, 値）
pub type ColumnValue = (String, Option<DataValue>);

/// スキーマ操作
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateSchema {
        name: String,
    },
    DropSchema {
        name: String,
    },

    CreateType {
        name: QualifiedName,
        values: Vec<String>,
    },
    AddEnumValue {
        name: QualifiedName,
        value: String,
        position: Option<EnumValuePosition>,
    },
    DropType {
        name: QualifiedName,
    },

    CreateSequence {
        name: QualifiedName,
        sequence: Sequence,
    },
    AlterSequence {
        name: QualifiedName,
        sequence: Sequence,
    },
    DropSequence {
        name: QualifiedName,
    },

    /// CREATE OR REPLACE
    CreateFunction {
        name: QualifiedName,
        function: Function,
    },
    DropFunction {
        name: QualifiedName,
        signature: String,
    },

    CreateTable {
        table: QualifiedName,
        columns: Vec<ColumnSpec>,
        options: Vec<TableOption>,
        inherits: Option<QualifiedName>,
        partition: Option<Partition>,
    },
    DropTable {
        table: QualifiedName,
    },
    RenameTable {
        from: QualifiedName,
        to: QualifiedName,
    },
    SetTableOptions {
        table: QualifiedName,
        options: Vec<TableOption>,
    },
    ResetTableOptions {
        table: QualifiedName,
        names: Vec<String>,
    },

    AddColumn {
        table: QualifiedName,
        column: ColumnSpec,
    },
    DropColumn {
        table: QualifiedName,
        column: String,
    },
    RenameColumn {
        table: QualifiedName,
        from: String,
        to: String,
    },
    AlterColumnType {
        table: QualifiedName,
        column: ColumnSpec,
    },
    SetColumnDefault {
        table: QualifiedName,
        column: String,
        default: String,
    },
    DropColumnDefault {
        table: QualifiedName,
        column: String,
    },
    SetNotNull {
        table: QualifiedName,
        column: ColumnSpec,
    },
    DropNotNull {
        table: QualifiedName,
        column: ColumnSpec,
    },
    /// NULLの既存行をデフォルト値で埋める
    FillColumnDefault {
        table: QualifiedName,
        column: String,
        default: String,
    },

    CreateIndex {
        table: QualifiedName,
        index: Index,
    },
    DropIndex {
        table: QualifiedName,
        name: String,
    },
    CreateTrigger {
        table: QualifiedName,
        trigger: Trigger,
    },
    DropTrigger {
        table: QualifiedName,
        name: String,
    },
    Grant {
        table: QualifiedName,
        grant: Grant,
    },
    Revoke {
        table: QualifiedName,
        grant: Grant,
    },

    AddConstraint(ConstraintSpec),
    DropConstraint {
        table: QualifiedName,
        name: String,
        kind: ConstraintKind,
        sql_type: ConstraintType,
    },

    CreateView {
        name: QualifiedName,
        query: String,
    },
    DropView {
        name: QualifiedName,
    },

    InsertRow {
        table: QualifiedName,
        values: Vec<ColumnValue>,
    },
    UpdateRow {
        table: QualifiedName,
        key: Vec<ColumnValue>,
        values: Vec<ColumnValue>,
    },
    DeleteRow {
        table: QualifiedName,
        key: Vec<ColumnValue>,
    },
    /// シリアル列のシーケンスを現在の最大値に合わせる
    SerialStart {
        table: QualifiedName,
        column: String,
    },
}

impl Operation {
    /// 操作の短い名前（ログ用）
    pub fn label(&self) -> &'static str {
        match self {
            Operation::CreateSchema { .. } => "create_schema",
            Operation::DropSchema { .. } => "drop_schema",
            Operation::CreateType { .. } => "create_type",
            Operation::AddEnumValue { .. } => "add_enum_value",
            Operation::DropType { .. } => "drop_type",
            Operation::CreateSequence { .. } => "create_sequence",
            Operation::AlterSequence { .. } => "alter_sequence",
            Operation::DropSequence { .. } => "drop_sequence",
            Operation::CreateFunction { .. } => "create_function",
            Operation::DropFunction { .. } => "drop_function",
            Operation::CreateTable { .. } => "create_table",
            Operation::DropTable { .. } => "drop_table",
            Operation::RenameTable { .. } => "rename_table",
            Operation::SetTableOptions { .. } => "set_table_options",
            Operation::ResetTableOptions { .. } => "reset_table_options",
            Operation::AddColumn { .. } => "add_column",
            Operation::DropColumn { .. } => "drop_column",
            Operation::RenameColumn { .. } => "rename_column",
            Operation::AlterColumnType { .. } => "alter_column_type",
            Operation::SetColumnDefault { .. } => "set_column_default",
            Operation::DropColumnDefault { .. } => "drop_column_default",
            Operation::SetNotNull { .. } => "set_not_null",
            Operation::DropNotNull { .. } => "drop_not_null",
            Operation::FillColumnDefault { .. } => "fill_column_default",
            Operation::CreateIndex { .. } => "create_index",
            Operation::DropIndex { .. } => "drop_index",
            Operation::CreateTrigger { .. } => "create_trigger",
            Operation::DropTrigger { .. } => "drop_trigger",
            Operation::Grant { .. } => "grant",
            Operation::Revoke { .. } => "revoke",
            Operation::AddConstraint(_) => "add_constraint",
            Operation::DropConstraint { .. } => "drop_constraint",
            Operation::CreateView { .. } => "create_view",
            Operation::DropView { .. } => "drop_view",
            Operation::InsertRow { .. } => "insert_row",
            Operation::UpdateRow { .. } => "update_row",
            Operation::DeleteRow { .. } => "delete_row",
            Operation::SerialStart { .. } => "serial_start",
        }
    }
}
