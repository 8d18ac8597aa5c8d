// SQLレンダラーアダプター
//
// エンジンが生成した方言非依存の操作（Operation）を
// 各データベース方言のSQL文に変換するアダプター層。

pub mod mysql;
pub mod postgres;

use crate::core::config::{Dialect, RunContext};
use crate::core::definition::DataValue;
use crate::core::operation::{ColumnValue, Operation, QualifiedName};
use std::fmt;

pub use mysql::MysqlRenderer;
pub use postgres::PostgresRenderer;

/// 方言によって有無が分かれる機能
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// スキーマオブジェクトとしての列挙型
    EnumTypes,
    /// 独立したシーケンス
    Sequences,
    /// テーブル継承（INHERITS）
    TableInheritance,
    /// 宣言的パーティショニング
    Partitioning,
}

impl Capability {
    /// 操作全体が必要とする機能と対象オブジェクト
    ///
    /// CREATE TABLE の継承・パーティションは操作の一部なので含みません。
    pub fn required_by(operation: &Operation) -> Option<(Capability, &QualifiedName)> {
        match operation {
            Operation::CreateType { name, .. }
            | Operation::AddEnumValue { name, .. }
            | Operation::DropType { name } => Some((Capability::EnumTypes, name)),
            Operation::CreateSequence { name, .. }
            | Operation::AlterSequence { name, .. }
            | Operation::DropSequence { name } => Some((Capability::Sequences, name)),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::EnumTypes => write!(f, "enum types"),
            Capability::Sequences => write!(f, "sequences"),
            Capability::TableInheritance => write!(f, "table inheritance"),
            Capability::Partitioning => write!(f, "partitioning"),
        }
    }
}

/// SQLレンダラートレイト
///
/// 各データベース方言用のレンダラーが実装すべきインターフェース。
pub trait StatementRenderer {
    /// 対象の方言
    fn dialect(&self) -> Dialect;

    /// テーブルオプションを理解できるかどうか
    ///
    /// # Arguments
    ///
    /// * `name` - オプション名（大文字小文字を区別しない）
    fn supports_table_option(&self, name: &str) -> bool;

    /// 機能を表現できるかどうか
    ///
    /// 表現できない機能を必要とする操作は出力されず、警告として記録されます。
    fn supports(&self, capability: Capability) -> bool;

    /// 操作をSQL文に変換
    ///
    /// `supports` が偽を返す機能だけの操作は空のリストを返します。
    ///
    /// # Returns
    ///
    /// 末尾にセミコロンを含むSQL文のリスト
    fn render(&self, operation: &Operation) -> Vec<String>;
}

/// 実行コンテキストに対応するレンダラーを取得
pub fn renderer_for(ctx: &RunContext) -> Box<dyn StatementRenderer> {
    match ctx.dialect {
        Dialect::PostgreSQL => Box::new(PostgresRenderer::new(ctx.quote_identifiers)),
        Dialect::MySQL => Box::new(MysqlRenderer::new(ctx.quote_identifiers)),
    }
}

/// 常にクォートが必要な予約語（両方言の主要なもの）
const RESERVED_WORDS: &[&str] = &[
    "all", "and", "as", "asc", "between", "by", "case", "check", "column", "constraint",
    "create", "default", "delete", "desc", "distinct", "drop", "else", "end", "foreign", "from",
    "grant", "group", "having", "in", "index", "insert", "into", "is", "join", "key", "like",
    "limit", "not", "null", "on", "or", "order", "primary", "references", "select", "set",
    "table", "then", "to", "union", "unique", "update", "user", "using", "values", "when",
    "where", "with",
];

/// 識別子のクォート規則
#[derive(Debug, Clone, Copy)]
pub(crate) struct IdentifierQuoter {
    quote: char,
    force: bool,
}

impl IdentifierQuoter {
    pub(crate) fn new(quote: char, force: bool) -> Self {
        Self { quote, force }
    }

    /// 識別子をクォート（必要な場合のみ、`force` なら常に）
    pub(crate) fn ident(&self, name: &str) -> String {
        if self.force || needs_quoting(name) {
            let escaped = name.replace(self.quote, &format!("{0}{0}", self.quote));
            format!("{0}{1}{0}", self.quote, escaped)
        } else {
            name.to_string()
        }
    }

    pub(crate) fn qualified(&self, name: &QualifiedName) -> String {
        format!("{}.{}", self.ident(&name.schema), self.ident(&name.name))
    }

    pub(crate) fn list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.ident(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// インデックス対象（カラム名はクォート、式はそのまま）
    pub(crate) fn dimension(&self, dimension: &str) -> String {
        if is_plain_identifier(dimension) {
            self.ident(dimension)
        } else {
            dimension.to_string()
        }
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn needs_quoting(name: &str) -> bool {
    !is_plain_identifier(name)
        || name.chars().any(|c| c.is_ascii_uppercase())
        || RESERVED_WORDS.contains(&name)
}

/// 文字列リテラル
pub(crate) fn string_literal(value: &str, escape_backslash: bool) -> String {
    let mut escaped = value.replace('\'', "''");
    if escape_backslash {
        escaped = escaped.replace('\\', "\\\\");
    }
    format!("'{}'", escaped)
}

/// データ値のリテラル
pub(crate) fn value_literal(value: Option<&DataValue>, escape_backslash: bool) -> String {
    match value {
        None => "NULL".to_string(),
        Some(DataValue::Boolean(true)) => "TRUE".to_string(),
        Some(DataValue::Boolean(false)) => "FALSE".to_string(),
        Some(DataValue::Integer(i)) => i.to_string(),
        Some(DataValue::Float(f)) => f.to_string(),
        Some(DataValue::Text(s)) => string_literal(s, escape_backslash),
    }
}

/// WHERE句（NULLは IS NULL で比較）
pub(crate) fn where_clause(
    quoter: &IdentifierQuoter,
    key: &[ColumnValue],
    escape_backslash: bool,
) -> String {
    key.iter()
        .map(|(column, value)| match value {
            None => format!("{} IS NULL", quoter.ident(column)),
            Some(v) => format!(
                "{} = {}",
                quoter.ident(column),
                value_literal(Some(v), escape_backslash)
            ),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// SET句
pub(crate) fn assignments(
    quoter: &IdentifierQuoter,
    values: &[ColumnValue],
    escape_backslash: bool,
) -> String {
    values
        .iter()
        .map(|(column, value)| {
            format!(
                "{} = {}",
                quoter.ident(column),
                value_literal(value.as_ref(), escape_backslash)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// ビュー定義末尾のセミコロンを除去
pub(crate) fn trim_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_quoting() {
        let quoter = IdentifierQuoter::new('"', false);
        assert_eq!(quoter.ident("users"), "users");
        assert_eq!(quoter.ident("Users"), "\"Users\"");
        assert_eq!(quoter.ident("order"), "\"order\"");
        assert_eq!(quoter.ident("first name"), "\"first name\"");

        let forced = IdentifierQuoter::new('`', true);
        assert_eq!(forced.ident("users"), "`users`");
        assert_eq!(forced.ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_capability_required_by_schema_objects() {
        let mood = QualifiedName::new("app", "mood");
        let drop_type = Operation::DropType { name: mood.clone() };
        assert_eq!(
            Capability::required_by(&drop_type),
            Some((Capability::EnumTypes, &mood))
        );

        let drop_view = Operation::DropView { name: mood };
        assert_eq!(Capability::required_by(&drop_view), None);
    }

    #[test]
    fn test_dimension_keeps_expressions() {
        let quoter = IdentifierQuoter::new('"', true);
        assert_eq!(quoter.dimension("email"), "\"email\"");
        assert_eq!(quoter.dimension("lower(email)"), "lower(email)");
    }

    #[test]
    fn test_value_literals() {
        assert_eq!(value_literal(None, false), "NULL");
        assert_eq!(value_literal(Some(&DataValue::Boolean(true)), false), "TRUE");
        assert_eq!(value_literal(Some(&DataValue::Integer(42)), false), "42");
        assert_eq!(value_literal(Some(&DataValue::text("it's")), false), "'it''s'");
        assert_eq!(value_literal(Some(&DataValue::text("a\\b")), true), "'a\\\\b'");
    }

    #[test]
    fn test_where_clause_handles_null() {
        let quoter = IdentifierQuoter::new('"', false);
        let key = vec![
            ("id".to_string(), Some(DataValue::Integer(1))),
            ("tenant".to_string(), None),
        ];
        assert_eq!(where_clause(&quoter, &key, false), "id = 1 AND tenant IS NULL");
    }

    #[test]
    fn test_renderer_for_dialect() {
        let pg = renderer_for(&RunContext::new(Dialect::PostgreSQL));
        assert_eq!(pg.dialect(), Dialect::PostgreSQL);
        let my = renderer_for(&RunContext::new(Dialect::MySQL));
        assert_eq!(my.dialect(), Dialect::MySQL);
    }
}
