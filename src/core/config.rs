// 設定ファイル管理
//
// プロジェクトの設定ファイル（YAML形式）の読み込みと検証、
// および1回のビルド/差分実行に渡す不変の実行コンテキストを提供します。

use anyhow::{anyhow, Context, Result};
use crate::core::error::IoError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// データベース方言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[serde(rename = "postgresql")]
    PostgreSQL,
    #[serde(rename = "mysql")]
    MySQL,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::PostgreSQL => write!(f, "postgresql"),
            Dialect::MySQL => write!(f, "mysql"),
        }
    }
}

impl FromStr for Dialect {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pgsql" => Ok(Dialect::PostgreSQL),
            "mysql" => Ok(Dialect::MySQL),
            other => Err(anyhow!(
                "Unsupported database dialect: {}. Please specify one of: postgresql, mysql.",
                other
            )),
        }
    }
}

/// プロジェクト設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// データベース方言
    pub dialect: Dialect,

    /// 出力ファイルのプレフィックス
    #[serde(default = "default_output_prefix")]
    pub output_prefix: PathBuf,

    /// 出力ファイルあたりの最大ステートメント数
    #[serde(default = "default_statement_limit")]
    pub statement_limit: usize,

    /// すべての識別子をクォートするか
    #[serde(default)]
    pub quote_identifiers: bool,

    /// レプリケーションツール（slonik）が独自にトランザクションを張る前提で出力するか
    #[serde(default)]
    pub slonik_mode: bool,

    /// 4ステージを1つのストリームにまとめるか
    #[serde(default)]
    pub single_stage: bool,

    /// old_table_name / old_column_name を無視するか
    #[serde(default)]
    pub ignore_old_names: bool,

    /// 変更の有無にかかわらずすべてのビューを再作成するか
    #[serde(default)]
    pub always_recreate_views: bool,
}

fn default_output_prefix() -> PathBuf {
    PathBuf::from("output/stagediff")
}

fn default_statement_limit() -> usize {
    900
}

impl Config {
    /// デフォルトの設定ファイルパス
    pub const DEFAULT_CONFIG_PATH: &'static str = crate::core::naming::CONFIG_FILE;

    /// 方言だけを指定した既定の設定を作成
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            output_prefix: default_output_prefix(),
            statement_limit: default_statement_limit(),
            quote_identifiers: false,
            slonik_mode: false,
            single_stage: false,
            ignore_old_names: false,
            always_recreate_views: false,
        }
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> Result<()> {
        if self.statement_limit == 0 {
            return Err(anyhow!("statement_limit must be greater than 0"));
        }

        if self.output_prefix.as_os_str().is_empty() {
            return Err(anyhow!("output_prefix must not be empty"));
        }

        Ok(())
    }

    /// 設定ファイルを読み込んで解析
    ///
    /// # Errors
    ///
    /// ファイルが存在しない、読み込めない、またはYAMLとして不正な場合
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IoError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = fs::read_to_string(path).map_err(|e| IoError::FileRead {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;
        let config: Config = content.parse()?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path))?;
        Ok(config)
    }

    /// 実行コンテキストに変換
    pub fn run_context(&self) -> RunContext {
        RunContext {
            dialect: self.dialect,
            quote_identifiers: self.quote_identifiers,
            statement_limit: self.statement_limit,
            slonik_mode: self.slonik_mode,
            single_stage: self.single_stage,
            ignore_old_names: self.ignore_old_names,
            always_recreate_views: self.always_recreate_views,
        }
    }
}

/// std::str::FromStrトレイトの実装
impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(yaml: &str) -> Result<Self, Self::Err> {
        serde_saphyr::from_str(yaml).with_context(|| "Failed to parse config file")
    }
}

/// 実行コンテキスト
///
/// 1回のビルド/差分実行の間だけ有効な不変の設定。
/// すべてのコンポーネントに明示的に渡されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub dialect: Dialect,
    pub quote_identifiers: bool,
    pub statement_limit: usize,
    pub slonik_mode: bool,
    pub single_stage: bool,
    pub ignore_old_names: bool,
    pub always_recreate_views: bool,
}

impl RunContext {
    /// 方言だけを指定した既定のコンテキストを作成
    pub fn new(dialect: Dialect) -> Self {
        Config::new(dialect).run_context()
    }

    pub fn with_single_stage(mut self, single_stage: bool) -> Self {
        self.single_stage = single_stage;
        self
    }

    pub fn with_slonik_mode(mut self, slonik_mode: bool) -> Self {
        self.slonik_mode = slonik_mode;
        self
    }

    pub fn with_quote_identifiers(mut self, quote_identifiers: bool) -> Self {
        self.quote_identifiers = quote_identifiers;
        self
    }

    pub fn with_ignore_old_names(mut self, ignore_old_names: bool) -> Self {
        self.ignore_old_names = ignore_old_names;
        self
    }

    pub fn with_always_recreate_views(mut self, always_recreate_views: bool) -> Self {
        self.always_recreate_views = always_recreate_views;
        self
    }

    pub fn with_statement_limit(mut self, statement_limit: usize) -> Self {
        self.statement_limit = statement_limit;
        self
    }
}
