// コマンド共通コンテキスト
//
// 設定ファイル読み込み、フラグによる上書き、パス解決をCLI層で集約する。

use crate::cli::GenerationOptions;
use crate::core::config::{Config, Dialect, RunContext};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// CLIコマンド共通の実行コンテキスト
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub project_path: PathBuf,
    /// 読み込んだ設定ファイル（フラグのみで構成した場合は `None`）
    pub config_path: Option<PathBuf>,
    pub config: Config,
}

impl CommandContext {
    /// 設定を読み込み、コマンドラインのオプションで上書きしてコンテキストを作成
    ///
    /// # Arguments
    ///
    /// * `project_path` - 相対パスの基準ディレクトリ
    /// * `config_path` - 明示された設定ファイル（省略時は `.stagediff.yaml` があれば使用）
    /// * `options` - 設定を上書きするオプション
    ///
    /// # Errors
    ///
    /// - 明示された設定ファイルが存在しない、または不正な場合
    /// - 設定ファイルがなく `--dialect` も指定されていない場合
    pub fn load(
        project_path: &Path,
        config_path: Option<&Path>,
        options: &GenerationOptions,
    ) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => Some(resolve(project_path, path)),
            None => {
                let default_path = project_path.join(Config::DEFAULT_CONFIG_PATH);
                default_path.exists().then_some(default_path)
            }
        };

        let mut config = match &config_path {
            Some(path) => {
                Config::from_file(path).with_context(|| "Failed to read config file")?
            }
            None => {
                let dialect = options.dialect.as_deref().ok_or_else(|| {
                    anyhow!(
                        "No config file found at {:?} and no --dialect given.",
                        project_path.join(Config::DEFAULT_CONFIG_PATH)
                    )
                })?;
                Config::new(dialect.parse::<Dialect>()?)
            }
        };

        apply_overrides(&mut config, options)?;
        config.validate()?;
        debug!(
            config = ?config_path,
            dialect = %config.dialect,
            statement_limit = config.statement_limit,
            "Loaded configuration"
        );

        Ok(Self {
            project_path: project_path.to_path_buf(),
            config_path,
            config,
        })
    }

    /// 実行コンテキスト
    pub fn run_context(&self) -> RunContext {
        self.config.run_context()
    }

    /// 出力ファイルプレフィックスの絶対パス
    pub fn output_prefix(&self) -> PathBuf {
        resolve(&self.project_path, &self.config.output_prefix)
    }

    /// プロジェクトルートを基準にパスを解決
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        resolve(&self.project_path, path)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn apply_overrides(config: &mut Config, options: &GenerationOptions) -> Result<()> {
    if let Some(dialect) = &options.dialect {
        config.dialect = dialect.parse()?;
    }
    if let Some(output) = &options.output {
        config.output_prefix = output.clone();
    }
    if let Some(limit) = options.statement_limit {
        config.statement_limit = limit;
    }
    // フラグは有効化のみ
    config.quote_identifiers |= options.quote_identifiers;
    config.slonik_mode |= options.slonik;
    config.single_stage |= options.single_stage;
    config.ignore_old_names |= options.ignore_old_names;
    config.always_recreate_views |= options.always_recreate_views;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_flags_only_without_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let options = GenerationOptions {
            dialect: Some("mysql".to_string()),
            single_stage: true,
            ..GenerationOptions::default()
        };

        let context = CommandContext::load(temp_dir.path(), None, &options).unwrap();
        assert!(context.config_path.is_none());
        assert_eq!(context.config.dialect, Dialect::MySQL);
        assert!(context.run_context().single_stage);
    }

    #[test]
    fn test_missing_dialect_without_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = CommandContext::load(temp_dir.path(), None, &GenerationOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(Config::DEFAULT_CONFIG_PATH),
            "dialect: postgresql\nstatement_limit: 20\n",
        )
        .unwrap();
        let options = GenerationOptions {
            statement_limit: Some(5),
            output: Some(PathBuf::from("out/app")),
            ..GenerationOptions::default()
        };

        let context = CommandContext::load(temp_dir.path(), None, &options).unwrap();
        assert_eq!(context.config.dialect, Dialect::PostgreSQL);
        assert_eq!(context.config.statement_limit, 5);
        assert_eq!(context.output_prefix(), temp_dir.path().join("out/app"));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let result = CommandContext::load(
            temp_dir.path(),
            Some(Path::new("missing.yaml")),
            &GenerationOptions::default(),
        );
        assert!(result.is_err());
    }
}
