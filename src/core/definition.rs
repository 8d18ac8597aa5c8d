// 定義ドメインモデル
//
// データベースに依存しないスキーマ定義ツリーを表現する型システム。
// Definition, Schema, Table, Column, Constraint, View, DataRows などの
// 構造体を提供します。1回の実行の間は読み取り専用として扱われます。

use serde::{Deserialize, Serialize};

/// 定義ツリーのルート
///
/// ある時点のスキーマ全体（複数のスキーマとカスタムSQL）を表現します。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// スキーマ定義のリスト（宣言順）
    #[serde(default)]
    pub schemas: Vec<Schema>,

    /// カスタムSQL（ステージタグ付き）
    #[serde(default)]
    pub sql: Vec<LiteralSql>,
}

impl Definition {
    /// 空の定義を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// スキーマを追加
    pub fn add_schema(&mut self, schema: Schema) {
        self.schemas.push(schema);
    }

    /// 指定されたスキーマを取得
    pub fn get_schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// 指定されたテーブルを取得
    pub fn get_table(&self, schema_name: &str, table_name: &str) -> Option<(&Schema, &Table)> {
        let schema = self.get_schema(schema_name)?;
        let table = schema.get_table(table_name)?;
        Some((schema, table))
    }

    /// テーブル総数を取得
    pub fn table_count(&self) -> usize {
        self.schemas.iter().map(|s| s.tables.len()).sum()
    }
}

/// スキーマ定義
///
/// テーブル、ビュー、シーケンス、関数、型の名前付きコンテナ。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// スキーマ名
    pub name: String,

    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default)]
    pub views: Vec<View>,

    #[serde(default)]
    pub sequences: Vec<Sequence>,

    #[serde(default)]
    pub functions: Vec<Function>,

    /// 列挙型の定義
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

impl Schema {
    /// 新しいスキーマを作成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// テーブルを追加
    pub fn add_table(&mut self, table: Table) {
        self.tables.push(table);
    }

    /// ビューを追加
    pub fn add_view(&mut self, view: View) {
        self.views.push(view);
    }

    /// 指定されたテーブルを取得
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// 指定されたテーブルが存在するか確認
    pub fn has_table(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// 指定されたビューを取得
    pub fn get_view(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn get_sequence(&self, name: &str) -> Option<&Sequence> {
        self.sequences.iter().find(|s| s.name == name)
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name == name)
    }
}

/// テーブル定義
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// テーブル名
    pub name: String,

    /// プライマリキーのカラム名リスト
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// プライマリキー制約名（省略時は `{table}_pkey`）
    #[serde(default)]
    pub primary_key_name: Option<String>,

    #[serde(default)]
    pub columns: Vec<Column>,

    /// テーブルレベルの制約（生のSQL定義を含む）
    #[serde(default)]
    pub constraints: Vec<Constraint>,

    /// 明示的な外部キー
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,

    #[serde(default)]
    pub indexes: Vec<Index>,

    #[serde(default)]
    pub triggers: Vec<Trigger>,

    #[serde(default)]
    pub grants: Vec<Grant>,

    /// テーブルオプション（方言固有のキー/値）
    #[serde(default)]
    pub options: Vec<TableOption>,

    /// 継承元スキーマ（省略時は同一スキーマ）
    #[serde(default)]
    pub inherits_schema: Option<String>,

    /// 継承元テーブル
    #[serde(default)]
    pub inherits_table: Option<String>,

    /// パーティショニング指定
    #[serde(default)]
    pub partition: Option<Partition>,

    /// データ行
    #[serde(default)]
    pub rows: Option<DataRows>,

    /// リネーム前のスキーマ名
    #[serde(default)]
    pub old_schema_name: Option<String>,

    /// リネーム前のテーブル名
    #[serde(default)]
    pub old_table_name: Option<String>,
}

impl Table {
    /// 新しいテーブルを作成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// カラムを追加
    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// 指定されたカラムを取得
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 指定されたオプションを取得（キーは大文字小文字を区別しない）
    pub fn get_option(&self, name: &str) -> Option<&TableOption> {
        self.options
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(name))
    }

    /// リネームを宣言しているかどうか
    pub fn declares_rename(&self) -> bool {
        self.old_table_name.is_some() || self.old_schema_name.is_some()
    }

    /// データ行を持つかどうか
    pub fn has_rows(&self) -> bool {
        self.rows.as_ref().is_some_and(|r| !r.rows.is_empty())
    }
}

/// カラム定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// カラム名
    pub name: String,

    /// カラム型（外部キー参照から導出する場合は省略可）
    #[serde(rename = "type", default)]
    pub column_type: Option<String>,

    /// NULL許可フラグ
    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// デフォルト値（SQL式）
    #[serde(default)]
    pub default: Option<String>,

    /// カラムCHECK制約の式
    #[serde(default)]
    pub check: Option<String>,

    /// 参照先スキーマ（省略時は同一スキーマ）
    #[serde(default)]
    pub foreign_schema: Option<String>,

    /// 参照先テーブル
    #[serde(default)]
    pub foreign_table: Option<String>,

    /// 参照先カラム
    #[serde(default)]
    pub foreign_column: Option<String>,

    /// 外部キー制約名（省略時は `{table}_{column}_fkey`）
    #[serde(default)]
    pub foreign_key_name: Option<String>,

    #[serde(default)]
    pub foreign_on_update: Option<ForeignKeyAction>,

    #[serde(default)]
    pub foreign_on_delete: Option<ForeignKeyAction>,

    /// リネーム前のカラム名
    #[serde(default)]
    pub old_column_name: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl Column {
    /// 新しいカラムを作成
    pub fn new(name: impl Into<String>, column_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            column_type: Some(column_type.into()),
            nullable,
            ..Self::untyped(name)
        }
    }

    /// 型を持たないカラムを作成（外部キー参照から型を導出する）
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: None,
            nullable: true,
            default: None,
            check: None,
            foreign_schema: None,
            foreign_table: None,
            foreign_column: None,
            foreign_key_name: None,
            foreign_on_update: None,
            foreign_on_delete: None,
            old_column_name: None,
        }
    }

    /// インライン外部キーを持つかどうか
    pub fn has_foreign_key(&self) -> bool {
        self.foreign_table.is_some()
    }
}

/// テーブルレベル制約の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintType {
    #[serde(rename = "PRIMARY KEY", alias = "PRIMARY_KEY")]
    PrimaryKey,
    #[serde(rename = "UNIQUE")]
    Unique,
    #[serde(rename = "CHECK")]
    Check,
    #[serde(rename = "FOREIGN KEY", alias = "FOREIGN_KEY")]
    ForeignKey,
    #[serde(rename = "EXCLUDE")]
    Exclude,
}

impl ConstraintType {
    /// SQLキーワード表記
    pub fn as_sql(&self) -> &'static str {
        match self {
            ConstraintType::PrimaryKey => "PRIMARY KEY",
            ConstraintType::Unique => "UNIQUE",
            ConstraintType::Check => "CHECK",
            ConstraintType::ForeignKey => "FOREIGN KEY",
            ConstraintType::Exclude => "EXCLUDE",
        }
    }
}

/// テーブルレベル制約（生のSQL定義）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// 制約名
    pub name: String,

    /// 制約の種類
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,

    /// 制約定義（例: `(email)`、`CHECK (age > 0)` の括弧内、`(a) REFERENCES s.t (b)`）
    pub definition: String,

    /// 外部キー型の場合の構造化された参照先スキーマ
    #[serde(default)]
    pub foreign_schema: Option<String>,

    /// 外部キー型の場合の構造化された参照先テーブル
    #[serde(default)]
    pub foreign_table: Option<String>,
}

/// 外部キーの参照アクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeignKeyAction {
    #[serde(alias = "NO ACTION")]
    NoAction,
    Restrict,
    Cascade,
    #[serde(alias = "SET NULL")]
    SetNull,
    #[serde(alias = "SET DEFAULT")]
    SetDefault,
}

impl ForeignKeyAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// 明示的な外部キー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// 参照元カラム
    pub columns: Vec<String>,

    #[serde(default)]
    pub foreign_schema: Option<String>,

    pub foreign_table: String,

    /// 参照先カラム（省略時は参照元と同名）
    #[serde(default)]
    pub foreign_columns: Vec<String>,

    #[serde(default)]
    pub constraint_name: Option<String>,

    #[serde(default)]
    pub on_update: Option<ForeignKeyAction>,

    #[serde(default)]
    pub on_delete: Option<ForeignKeyAction>,
}

/// インデックス定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// インデックス名
    pub name: String,

    /// インデックス対象（カラム名または式）
    pub dimensions: Vec<String>,

    #[serde(default)]
    pub unique: bool,

    /// インデックス方式（btree, hash, gin など）
    #[serde(default)]
    pub using: Option<String>,
}

/// トリガー定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,

    /// BEFORE / AFTER / INSTEAD OF
    pub timing: String,

    /// INSERT / UPDATE / DELETE
    pub events: Vec<String>,

    /// ROW / STATEMENT
    #[serde(default = "default_for_each")]
    pub for_each: String,

    /// 実行する関数（PostgreSQL）または文（MySQL）
    pub function: String,
}

fn default_for_each() -> String {
    "ROW".to_string()
}

/// 権限付与
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub roles: Vec<String>,
    pub operations: Vec<String>,
}

/// テーブルオプション
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOption {
    pub name: String,
    pub value: String,
}

impl TableOption {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// パーティショニング指定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// RANGE / LIST / HASH
    pub kind: String,
    pub columns: Vec<String>,
}

/// シーケンス定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub increment: Option<i64>,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    #[serde(default)]
    pub cache: Option<i64>,
    #[serde(default)]
    pub cycle: bool,
    /// 所有カラム（`table.column`）
    #[serde(default)]
    pub owned_by: Option<String>,
}

/// 関数定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<FunctionParameter>,
    pub returns: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub definition: String,
}

fn default_language() -> String {
    "sql".to_string()
}

impl Function {
    /// 引数の型を含むシグネチャ（`name(int, text)`）
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self
            .parameters
            .iter()
            .map(|p| p.parameter_type.as_str())
            .collect();
        format!("{}({})", self.name, types.join(", "))
    }
}

/// 関数パラメータ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionParameter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub parameter_type: String,
}

/// 列挙型定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub values: Vec<String>,
}

/// ビュー定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub name: String,

    /// ビューのSELECT文
    pub query: String,

    /// 明示的に宣言された依存ビュー
    #[serde(default)]
    pub depends_on: Vec<ViewDependency>,
}

impl View {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            depends_on: Vec::new(),
        }
    }
}

/// ビュー依存の宣言
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDependency {
    /// 依存先スキーマ（省略時はビューと同一スキーマ）
    #[serde(default)]
    pub schema: Option<String>,
    pub view: String,
}

/// データ行の集合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRows {
    /// 各行の値に対応するカラム名
    pub columns: Vec<String>,

    #[serde(default)]
    pub rows: Vec<DataRow>,
}

impl DataRows {
    /// カラムの位置を取得
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// データ行（`columns` と同じ順序の値のリスト）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRow {
    pub values: Vec<Option<DataValue>>,
}

impl DataRow {
    pub fn new(values: Vec<Option<DataValue>>) -> Self {
        Self { values }
    }
}

/// データ値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl DataValue {
    /// 比較用の正規化テキスト表現
    ///
    /// YAML上で `1` と `"1"` のように表記が異なっても同じ値として扱います。
    pub fn canonical(&self) -> String {
        match self {
            DataValue::Boolean(b) => b.to_string(),
            DataValue::Integer(i) => i.to_string(),
            DataValue::Float(f) => f.to_string(),
            DataValue::Text(s) => s.clone(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        DataValue::Text(value.into())
    }
}

/// NULLを含むデータ値の等価判定
pub fn same_data_value(left: Option<&DataValue>, right: Option<&DataValue>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => l.canonical() == r.canonical(),
        _ => false,
    }
}

/// カスタムSQLのステージタグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlStage {
    #[serde(rename = "STAGE1BEFORE")]
    Stage1Before,
    #[serde(rename = "STAGE2BEFORE")]
    Stage2Before,
    #[serde(rename = "STAGE1")]
    Stage1,
    #[serde(rename = "STAGE2")]
    Stage2,
    #[serde(rename = "STAGE3")]
    Stage3,
    #[serde(rename = "STAGE4")]
    Stage4,
}

/// カスタムSQL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralSql {
    pub sql: String,

    #[serde(default)]
    pub stage: Option<SqlStage>,
}

impl LiteralSql {
    pub fn new(sql: impl Into<String>, stage: Option<SqlStage>) -> Self {
        Self {
            sql: sql.into(),
            stage,
        }
    }
}
