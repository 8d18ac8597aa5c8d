// ステージ出力モデル
//
// アップグレードスクリプトを4つの順序付きストリームとして保持します。
//
// - Stage1: 非破壊的な構造変更（作成、追加、リネーム、型変更）
// - Stage2: データ移行（カスタムSQL、行の削除）
// - Stage3: 破壊的な構造変更（カラム・テーブルの削除、NOT NULL化、ビュー作成）
// - Stage4: データ投入と外部キーの作成

use crate::core::definition::SqlStage;
use crate::core::error::EngineWarning;
use std::fmt;

/// 出力ステージ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Stage1,
    Stage2,
    Stage3,
    Stage4,
}

impl Stage {
    /// すべてのステージ（実行順）
    pub const ALL: [Stage; 4] = [Stage::Stage1, Stage::Stage2, Stage::Stage3, Stage::Stage4];

    /// ステージ番号（1始まり）
    pub fn number(&self) -> usize {
        match self {
            Stage::Stage1 => 1,
            Stage::Stage2 => 2,
            Stage::Stage3 => 3,
            Stage::Stage4 => 4,
        }
    }

    /// レプリケーションツール配下でトランザクションを張れるステージか
    ///
    /// slonik モードでは構造変更ステージ（1, 3）はツール側がトランザクションを管理します。
    pub fn is_transactional(&self, slonik_mode: bool) -> bool {
        match self {
            Stage::Stage1 | Stage::Stage3 => !slonik_mode,
            Stage::Stage2 | Stage::Stage4 => true,
        }
    }

    fn index(&self) -> usize {
        self.number() - 1
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage{}", self.number())
    }
}

/// ステートメントの出所
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementSource {
    /// エンジンが生成した文
    Generated,
    /// 定義に含まれるカスタムSQL（タグ付きの場合はタグ）
    Literal(Option<SqlStage>),
}

/// 1つのSQL文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub stage: Stage,
    pub sql: String,
    pub source: StatementSource,
}

impl Statement {
    pub fn generated(stage: Stage, sql: impl Into<String>) -> Self {
        Self {
            stage,
            sql: sql.into(),
            source: StatementSource::Generated,
        }
    }

    pub fn literal(stage: Stage, sql: impl Into<String>, tag: Option<SqlStage>) -> Self {
        Self {
            stage,
            sql: sql.into(),
            source: StatementSource::Literal(tag),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.source, StatementSource::Literal(_))
    }
}

/// 出力の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// 新規構築（1ストリーム）
    Build,
    /// 差分アップグレード
    Upgrade,
}

/// ステージ出力
///
/// 4つのストリームは互いに独立した追記専用のバッファです。
/// `collapsed` の場合はすべての文が Stage1 のバッファにステージ順で格納されます
/// （各文の `stage` は元のステージを保持します）。
#[derive(Debug, Clone)]
pub struct StageOutput {
    kind: OutputKind,
    streams: [Vec<Statement>; 4],
    collapsed: bool,
    warnings: Vec<EngineWarning>,
}

impl StageOutput {
    /// 差分用の空の出力を作成
    pub fn upgrade() -> Self {
        Self {
            kind: OutputKind::Upgrade,
            streams: Default::default(),
            collapsed: false,
            warnings: Vec::new(),
        }
    }

    /// 構築用の空の出力を作成（常に1ストリーム）
    pub fn build() -> Self {
        Self {
            kind: OutputKind::Build,
            collapsed: true,
            ..Self::upgrade()
        }
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// 文を追加
    pub fn push(&mut self, statement: Statement) {
        let index = if self.collapsed {
            0
        } else {
            statement.stage.index()
        };
        self.streams[index].push(statement);
    }

    /// 警告を追加
    pub fn warn(&mut self, warning: EngineWarning) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[EngineWarning] {
        &self.warnings
    }

    /// 指定ステージのストリーム
    ///
    /// まとめられた出力では Stage1 がすべての文を返し、他は空になります。
    pub fn stage(&self, stage: Stage) -> &[Statement] {
        &self.streams[stage.index()]
    }

    /// 4ストリームを1つにまとめる（ステージ順）
    pub fn collapse(&mut self) {
        if self.collapsed {
            return;
        }
        let mut merged = Vec::with_capacity(self.len());
        for stream in self.streams.iter_mut() {
            merged.append(stream);
        }
        self.streams[0] = merged;
        self.collapsed = true;
    }

    /// すべての文（ステージ順）
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.streams.iter().flatten()
    }

    /// 空でないストリームと対応するステージ
    pub fn streams(&self) -> impl Iterator<Item = (Stage, &[Statement])> {
        Stage::ALL
            .into_iter()
            .map(|stage| (stage, self.stage(stage)))
            .filter(|(_, statements)| !statements.is_empty())
    }

    /// カスタムSQL由来の文
    pub fn literal_statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements().filter(|s| s.is_literal())
    }

    /// エンジンが生成した文
    pub fn generated_statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements().filter(|s| !s.is_literal())
    }

    pub fn len(&self) -> usize {
        self.streams.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
