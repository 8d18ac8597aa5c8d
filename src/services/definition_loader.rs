// 定義ローダーサービス
//
// YAML定義ファイルの読み込み、解析、マージ処理を行うサービス。
// ディレクトリ全体の定義ファイルをスキャンし、統合された定義を生成します。

use crate::core::definition::{Definition, Schema};
use crate::core::error::{EngineError, IoError};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 定義ローダーサービス
///
/// YAML定義ファイルの解析とマージを行います。
#[derive(Debug, Clone)]
pub struct DefinitionLoader {}

impl DefinitionLoader {
    /// 新しいDefinitionLoaderを作成
    pub fn new() -> Self {
        Self {}
    }

    /// ファイルまたはディレクトリから定義を読み込む
    ///
    /// # Arguments
    ///
    /// * `path` - 定義ファイル、または `*.yaml` / `*.yml` を含むディレクトリ
    ///
    /// # Errors
    ///
    /// - パスが存在しない場合
    /// - YAMLの解析に失敗した場合
    /// - 同じスキーマに同名のテーブルが複数ある場合
    pub fn load(&self, path: &Path) -> Result<Definition> {
        if !path.exists() {
            return Err(IoError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        if path.is_dir() {
            self.load_directory(path)
        } else {
            self.load_file(path)
        }
    }

    /// ディレクトリ内のすべての定義ファイルをパス順に読み込んでマージ
    pub fn load_directory(&self, dir: &Path) -> Result<Definition> {
        let mut merged = Definition::new();
        for file_path in self.scan_yaml_files(dir)? {
            let definition = self.load_file(&file_path)?;
            merge_into(&mut merged, definition)
                .with_context(|| format!("Failed to merge definition file: {:?}", file_path))?;
        }
        debug!(
            path = %dir.display(),
            schemas = merged.schemas.len(),
            tables = merged.table_count(),
            "Loaded definition directory"
        );
        Ok(merged)
    }

    /// 単一のYAMLファイルを解析して定義に変換
    ///
    /// 1ファイル内で同じスキーマ名が複数回現れた場合もマージされます。
    pub fn load_file(&self, file_path: &Path) -> Result<Definition> {
        if !file_path.exists() {
            return Err(IoError::FileNotFound {
                path: file_path.display().to_string(),
            }
            .into());
        }

        let content = fs::read_to_string(file_path).map_err(|e| IoError::FileRead {
            path: file_path.display().to_string(),
            cause: e.to_string(),
        })?;

        self.parse(&content)
            .with_context(|| format!("Failed to parse definition file: {:?}", file_path))
    }

    /// YAML文字列を解析
    pub fn parse(&self, content: &str) -> Result<Definition> {
        let parsed: Definition = serde_saphyr::from_str(content)?;
        let mut definition = Definition::new();
        merge_into(&mut definition, parsed)?;
        Ok(definition)
    }

    /// ディレクトリ内のYAMLファイルをスキャン（パス順）
    fn scan_yaml_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut yaml_files = Vec::new();

        let entries = fs::read_dir(dir).map_err(|e| IoError::FileRead {
            path: dir.display().to_string(),
            cause: e.to_string(),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| IoError::FileRead {
                path: dir.display().to_string(),
                cause: e.to_string(),
            })?;

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            if let Some(extension) = path.extension() {
                if extension == "yaml" || extension == "yml" {
                    yaml_files.push(path);
                }
            }
        }

        yaml_files.sort();
        Ok(yaml_files)
    }
}

impl Default for DefinitionLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// 定義をマージ
///
/// 同名のスキーマは1つにまとめ、テーブルが重複する場合はエラーにします。
fn merge_into(target: &mut Definition, source: Definition) -> Result<(), EngineError> {
    for schema in source.schemas {
        match target.schemas.iter_mut().find(|s| s.name == schema.name) {
            Some(existing) => merge_schema(existing, schema)?,
            None => {
                let mut fresh = Schema::new(schema.name.clone());
                merge_schema(&mut fresh, schema)?;
                target.add_schema(fresh);
            }
        }
    }
    target.sql.extend(source.sql);
    Ok(())
}

fn merge_schema(target: &mut Schema, source: Schema) -> Result<(), EngineError> {
    for table in source.tables {
        if target.has_table(&table.name) {
            return Err(EngineError::DuplicateTable {
                schema: target.name.clone(),
                table: table.name,
            });
        }
        target.add_table(table);
    }
    target.views.extend(source.views);
    target.sequences.extend(source.sequences);
    target.functions.extend(source.functions);
    target.types.extend(source.types);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const USERS: &str = r#"
schemas:
  - name: app
    tables:
      - name: users
        primary_key: [id]
        columns:
          - name: id
            type: serial
            nullable: false
"#;

    #[test]
    fn test_scan_yaml_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        fs::write(dir.join("b.yaml"), "test").unwrap();
        fs::write(dir.join("a.yml"), "test").unwrap();
        fs::write(dir.join("readme.txt"), "test").unwrap();

        let files = DefinitionLoader::new().scan_yaml_files(dir).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.yml", "b.yaml"]);
    }

    #[test]
    fn test_load_nonexistent_path() {
        let result = DefinitionLoader::new().load(Path::new("/nonexistent/definition"));
        let error = result.unwrap_err();
        assert!(error.to_string().contains("File not found"));
    }

    #[test]
    fn test_parse_merges_same_schema_in_one_file() {
        let content = r#"
schemas:
  - name: app
    tables:
      - name: a
        primary_key: [id]
        columns:
          - name: id
            type: integer
  - name: app
    tables:
      - name: b
        primary_key: [id]
        columns:
          - name: id
            type: integer
"#;
        let definition = DefinitionLoader::new().parse(content).unwrap();
        assert_eq!(definition.schemas.len(), 1);
        assert_eq!(definition.table_count(), 2);
    }

    #[test]
    fn test_duplicate_table_across_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("one.yaml"), USERS).unwrap();
        fs::write(temp_dir.path().join("two.yaml"), USERS).unwrap();

        let error = DefinitionLoader::new()
            .load(temp_dir.path())
            .unwrap_err();
        let engine_error = error.downcast_ref::<EngineError>().unwrap();
        assert!(matches!(engine_error, EngineError::DuplicateTable { .. }));
    }
}
