// 命名ポリシー
//
// アプリケーション名と関連パスの単一ソース、および
// テーブル名から導出される制約名の命名規約を提供します。

/// 現行アプリケーション名
pub const APP_NAME: &str = "stagediff";

/// 既定の設定ファイル名
pub const CONFIG_FILE: &str = ".stagediff.yaml";

/// バイナリ名
pub const BINARY_NAME: &str = "stagediff";

/// 識別子の最大長（PostgreSQLのNAMEDATALEN - 1）
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// プライマリキー制約の既定名（`{table}_pkey`）
pub fn primary_key_name(table_name: &str) -> String {
    truncate_identifier(&format!("{}_pkey", table_name))
}

/// カラム外部キー制約の既定名（`{table}_{column}_fkey`）
pub fn foreign_key_name(table_name: &str, column_names: &[&str]) -> String {
    truncate_identifier(&format!("{}_{}_fkey", table_name, column_names.join("_")))
}

/// カラムCHECK制約の既定名（`{table}_{column}_check`）
pub fn check_constraint_name(table_name: &str, column_name: &str) -> String {
    truncate_identifier(&format!("{}_{}_check", table_name, column_name))
}

/// 識別子を最大長に切り詰める
///
/// マルチバイト文字の途中で切らないよう文字境界で切り詰めます。
pub fn truncate_identifier(name: &str) -> String {
    if name.len() <= MAX_IDENTIFIER_LENGTH {
        return name.to_string();
    }

    let mut end = MAX_IDENTIFIER_LENGTH;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}
