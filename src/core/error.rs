// エラー型定義
//
// エンジン全体で使用されるカスタムエラー型を提供します。
// thiserrorを使用して、EngineError（致命的エラー）, IoError と
// 処理を継続する警告 EngineWarning を定義します。

use thiserror::Error;

/// エンジンエラー
///
/// ビルド/差分実行を中断する致命的なエラーを表現します。
/// 部分的な出力は保証されません。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Table dependency cycle
    #[error("Circular foreign key dependency detected between tables: {}", .tables.join(", "))]
    DependencyCycle {
        /// 循環に含まれる（未解決の）テーブル（schema.table）
        tables: Vec<String>,
    },

    /// View dependency cycle
    #[error("Circular view dependency detected: {}", .path.join(" -> "))]
    ViewDependencyCycle {
        /// 循環経路（schema.view）
        path: Vec<String>,
    },

    /// Unresolved schema/table/column reference
    #[error("Reference error: {message}{}", .location.format())]
    UnresolvedReference {
        /// エラーメッセージ
        message: String,
        /// エラー発生位置
        location: ErrorLocation,
    },

    /// Column type cannot be determined
    #[error("Column type error: {message}{}", .location.format())]
    UnresolvedColumnType {
        /// エラーメッセージ
        message: String,
        /// エラー発生位置
        location: ErrorLocation,
    },

    /// Renamed table whose old name is still a current table
    #[error("Ambiguous rename: table {schema}.{table} declares old name {old_schema}.{old_table}, but {old_schema}.{old_table} still exists in the new definition")]
    AmbiguousRename {
        schema: String,
        table: String,
        old_schema: String,
        old_table: String,
    },

    /// Renamed table whose old table does not exist
    #[error("Rename source missing: table {schema}.{table} declares old name {old_schema}.{old_table}, which does not exist in the old definition")]
    RenameSourceMissing {
        schema: String,
        table: String,
        old_schema: String,
        old_table: String,
    },

    /// Two renamed tables claiming the same old table
    #[error("Duplicate rename: tables {first} and {second} both declare old name {old_schema}.{old_table}")]
    DuplicateRename {
        old_schema: String,
        old_table: String,
        first: String,
        second: String,
    },

    /// Renamed column whose old name is still a current column
    #[error("Ambiguous column rename: column declares old name '{old_column}', which still exists in the new definition{}", .location.format())]
    AmbiguousColumnRename {
        old_column: String,
        /// リネーム後のカラムを指す位置
        location: ErrorLocation,
    },

    /// Two renamed columns claiming the same old column
    #[error("Duplicate column rename: columns {first} and {second} both declare old name '{old_column}'{}", .location.format())]
    DuplicateColumnRename {
        old_column: String,
        first: String,
        second: String,
        /// テーブルを指す位置
        location: ErrorLocation,
    },

    /// Table without a primary key
    #[error("Table {schema}.{table} has no primary key{}", .detail.as_ref().map(|d| format!(": {}", d)).unwrap_or_default())]
    MissingPrimaryKey {
        schema: String,
        table: String,
        /// 追加の詳細（存在しないカラム名など）
        detail: Option<String>,
    },

    /// Duplicate index name within a schema
    #[error("Duplicate index name '{index}' in schema {schema} (tables: {first_table}, {second_table})")]
    DuplicateIndexName {
        schema: String,
        index: String,
        first_table: String,
        second_table: String,
    },

    /// Duplicate table within a schema
    #[error("Duplicate table {schema}.{table}")]
    DuplicateTable { schema: String, table: String },

    /// Malformed data rows
    #[error("Invalid data rows for table {schema}.{table}: {message}")]
    InvalidDataRows {
        schema: String,
        table: String,
        message: String,
    },
}

impl EngineError {
    /// 参照エラーを作成
    pub fn unresolved(message: impl Into<String>, location: ErrorLocation) -> Self {
        EngineError::UnresolvedReference {
            message: message.into(),
            location,
        }
    }

    /// 循環依存エラーかどうか
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            EngineError::DependencyCycle { .. } | EngineError::ViewDependencyCycle { .. }
        )
    }

    /// 参照エラーかどうか
    pub fn is_unresolved_reference(&self) -> bool {
        matches!(self, EngineError::UnresolvedReference { .. })
    }

    /// リネーム関連のエラーかどうか
    pub fn is_rename_error(&self) -> bool {
        matches!(
            self,
            EngineError::AmbiguousRename { .. }
                | EngineError::RenameSourceMissing { .. }
                | EngineError::DuplicateRename { .. }
                | EngineError::AmbiguousColumnRename { .. }
                | EngineError::DuplicateColumnRename { .. }
        )
    }
}

/// エラー発生位置
///
/// 定義ツリー内のエラー発生位置を表現します。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLocation {
    /// スキーマ名
    pub schema: Option<String>,
    /// テーブル名
    pub table: Option<String>,
    /// カラム名
    pub column: Option<String>,
    /// 制約名
    pub constraint: Option<String>,
}

impl ErrorLocation {
    /// 新しいエラー位置を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// スキーマ・テーブル名を指定してエラー位置を作成
    pub fn table(schema: &str, table: &str) -> Self {
        Self {
            schema: Some(schema.to_string()),
            table: Some(table.to_string()),
            ..Self::default()
        }
    }

    /// カラム名を追加
    pub fn with_column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    /// 制約名を追加
    pub fn with_constraint(mut self, constraint: &str) -> Self {
        self.constraint = Some(constraint.to_string());
        self
    }

    /// 位置情報をフォーマット
    pub fn format(&self) -> String {
        let mut parts = Vec::new();

        if let Some(schema) = &self.schema {
            parts.push(format!("schema: {}", schema));
        }
        if let Some(table) = &self.table {
            parts.push(format!("table: {}", table));
        }
        if let Some(column) = &self.column {
            parts.push(format!("column: {}", column));
        }
        if let Some(constraint) = &self.constraint {
            parts.push(format!("constraint: {}", constraint));
        }

        if parts.is_empty() {
            String::new()
        } else {
            format!(" ({})", parts.join(", "))
        }
    }
}

/// エンジン警告
///
/// 処理は継続するが、ユーザーに注意を促すべき事項を表します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineWarning {
    /// 警告メッセージ
    pub message: String,
    /// 警告発生位置
    pub location: Option<ErrorLocation>,
    /// 警告の種類
    pub kind: WarningKind,
}

/// 警告の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// 方言が理解しないオプション
    UnsupportedOption,
    /// 自動生成できない変更
    UnsupportedChange,
}

impl EngineWarning {
    /// 新しい警告を作成
    pub fn new(message: String, location: Option<ErrorLocation>, kind: WarningKind) -> Self {
        Self {
            message,
            location,
            kind,
        }
    }

    /// 未対応オプションの警告を作成
    pub fn unsupported_option(message: String, location: Option<ErrorLocation>) -> Self {
        Self::new(message, location, WarningKind::UnsupportedOption)
    }

    /// 未対応の変更の警告を作成
    pub fn unsupported_change(message: String, location: Option<ErrorLocation>) -> Self {
        Self::new(message, location, WarningKind::UnsupportedChange)
    }

    /// 位置情報をフォーマット
    pub fn format(&self) -> String {
        let location_str = self
            .location
            .as_ref()
            .map_or(String::new(), |loc| loc.format());
        format!("Warning: {}{}", self.message, location_str)
    }
}

/// I/Oエラー
///
/// ファイル操作時に発生するエラーを表現します。
#[derive(Debug, Error)]
pub enum IoError {
    /// File not found
    #[error("File not found: {path}")]
    FileNotFound {
        /// ファイルパス
        path: String,
    },

    /// File read error
    #[error("Failed to read file: {path} (cause: {cause})")]
    FileRead {
        /// ファイルパス
        path: String,
        /// エラー原因
        cause: String,
    },

    /// File write error
    #[error("Failed to write file: {path} (cause: {cause})")]
    FileWrite {
        /// ファイルパス
        path: String,
        /// エラー原因
        cause: String,
    },

    /// Directory creation error
    #[error("Failed to create directory: {path} (cause: {cause})")]
    DirectoryCreate {
        /// ディレクトリパス
        path: String,
        /// エラー原因
        cause: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_location_format() {
        let location = ErrorLocation::table("public", "users")
            .with_column("email")
            .with_constraint("users_email_key");

        let formatted = location.format();
        assert!(formatted.contains("public"));
        assert!(formatted.contains("users"));
        assert!(formatted.contains("email"));
        assert!(formatted.contains("users_email_key"));
        assert_eq!(ErrorLocation::new().format(), "");
    }

    #[test]
    fn test_dependency_cycle_message() {
        let error = EngineError::DependencyCycle {
            tables: vec!["public.a".to_string(), "public.b".to_string()],
        };
        assert!(error.is_cycle());
        assert_eq!(
            error.to_string(),
            "Circular foreign key dependency detected between tables: public.a, public.b"
        );
    }

    #[test]
    fn test_unresolved_reference_message() {
        let error = EngineError::unresolved(
            "foreign table public.missing not found",
            ErrorLocation::table("public", "orders").with_column("customer_id"),
        );
        assert!(error.is_unresolved_reference());
        let message = error.to_string();
        assert!(message.contains("public.missing"));
        assert!(message.contains("column: customer_id"));
    }

    #[test]
    fn test_rename_errors() {
        let ambiguous = EngineError::AmbiguousRename {
            schema: "app".to_string(),
            table: "bar".to_string(),
            old_schema: "app".to_string(),
            old_table: "foo".to_string(),
        };
        assert!(ambiguous.is_rename_error());
        assert!(ambiguous.to_string().contains("app.foo still exists"));

        let column = EngineError::AmbiguousColumnRename {
            old_column: "name".to_string(),
            location: ErrorLocation::table("app", "t").with_column("full_name"),
        };
        assert!(column.is_rename_error());
        assert!(column.to_string().contains("'name'"));
        assert!(column.to_string().contains("column: full_name"));
    }

    #[test]
    fn test_missing_primary_key_message() {
        let error = EngineError::MissingPrimaryKey {
            schema: "app".to_string(),
            table: "t".to_string(),
            detail: None,
        };
        assert_eq!(error.to_string(), "Table app.t has no primary key");

        let detailed = EngineError::MissingPrimaryKey {
            schema: "app".to_string(),
            table: "t".to_string(),
            detail: Some("column 'id' not found".to_string()),
        };
        assert!(detailed.to_string().ends_with(": column 'id' not found"));
    }

    #[test]
    fn test_warning_format() {
        let warning = EngineWarning::unsupported_option(
            "option 'fillfactor' is not supported".to_string(),
            Some(ErrorLocation::table("app", "t")),
        );
        assert_eq!(warning.kind, WarningKind::UnsupportedOption);
        assert!(warning.format().starts_with("Warning: option 'fillfactor'"));
    }

    #[test]
    fn test_io_error_messages() {
        let not_found = IoError::FileNotFound {
            path: "/path/to/file".to_string(),
        };
        assert_eq!(not_found.to_string(), "File not found: /path/to/file");

        let write_error = IoError::FileWrite {
            path: "/path/to/file".to_string(),
            cause: "Disk full".to_string(),
        };
        assert_eq!(
            write_error.to_string(),
            "Failed to write file: /path/to/file (cause: Disk full)"
        );
    }
}
