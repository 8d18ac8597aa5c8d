// カスタムSQLの配置

use super::StageSink;
use crate::core::definition::{Definition, LiteralSql, SqlStage};
use crate::core::stage::Stage;

/// タグに対応する出力ステージ
fn stage_for(tag: SqlStage) -> Stage {
    match tag {
        SqlStage::Stage1Before | SqlStage::Stage1 => Stage::Stage1,
        SqlStage::Stage2Before | SqlStage::Stage2 => Stage::Stage2,
        SqlStage::Stage3 => Stage::Stage3,
        SqlStage::Stage4 => Stage::Stage4,
    }
}

fn is_before(literal: &LiteralSql) -> bool {
    matches!(
        literal.stage,
        Some(SqlStage::Stage1Before) | Some(SqlStage::Stage2Before)
    )
}

/// STAGE1BEFORE / STAGE2BEFORE のSQLを各ステージの先頭に配置
pub(super) fn emit_before(sink: &mut StageSink<'_>, new: &Definition) {
    for literal in new.sql.iter().filter(|l| is_before(l)) {
        if let Some(tag) = literal.stage {
            sink.literal(stage_for(tag), &literal.sql, Some(tag));
        }
    }
}

/// 残りのSQLを配置
///
/// タグ付きのSQLは常に対応するステージの末尾に追加します。
/// タグの無いSQLは古い定義に同じ文が無い場合のみ Stage2 に追加します
/// （構築時はすべて追加）。
pub(super) fn emit_after(sink: &mut StageSink<'_>, old: Option<&Definition>, new: &Definition) {
    for literal in new.sql.iter().filter(|l| !is_before(l)) {
        match literal.stage {
            Some(tag) => sink.literal(stage_for(tag), &literal.sql, Some(tag)),
            None => {
                let applied = old.is_some_and(|old| {
                    old.sql
                        .iter()
                        .any(|previous| previous.sql.trim() == literal.sql.trim())
                });
                if !applied {
                    sink.literal(Stage::Stage2, &literal.sql, None);
                }
            }
        }
    }
}
