// 定義チェックサム計算サービス
//
// 定義ツリーの正規化JSON表現からSHA-256ハッシュを計算します。

use crate::core::definition::Definition;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// 定義チェックサムサービス
#[derive(Debug, Clone, Default)]
pub struct DefinitionChecksum {}

impl DefinitionChecksum {
    /// 新しいDefinitionChecksumを作成
    pub fn new() -> Self {
        Self {}
    }

    /// 定義のチェックサムを計算
    ///
    /// # Returns
    ///
    /// SHA-256ハッシュ（64文字の16進数文字列）
    pub fn calculate(&self, definition: &Definition) -> Result<String> {
        let normalized = self.normalize(definition)?;

        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// 正規化されたJSON文字列
    ///
    /// `serde_json::Value` のオブジェクトはキー順に並ぶため、
    /// フィールドの宣言順に依存しない表現になります。
    pub fn normalize(&self, definition: &Definition) -> Result<String> {
        let value =
            serde_json::to_value(definition).context("Failed to serialize definition to JSON")?;
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::definition::{Column, Schema, Table};

    fn definition(column_type: &str) -> Definition {
        let mut table = Table::new("users");
        table.primary_key = vec!["id".to_string()];
        table.add_column(Column::new("id", column_type, false));
        let mut schema = Schema::new("app");
        schema.add_table(table);
        let mut definition = Definition::new();
        definition.add_schema(schema);
        definition
    }

    #[test]
    fn test_checksum_is_stable() {
        let service = DefinitionChecksum::new();
        let first = service.calculate(&definition("integer")).unwrap();
        let second = service.calculate(&definition("integer")).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_checksum_changes_with_definition() {
        let service = DefinitionChecksum::new();
        let integer = service.calculate(&definition("integer")).unwrap();
        let bigint = service.calculate(&definition("bigint")).unwrap();

        assert_ne!(integer, bigint);
    }
}
