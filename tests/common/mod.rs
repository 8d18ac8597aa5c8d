// テスト共通ヘルパー
//
// 定義ツリーの組み立てと、PostgreSQL方言での構築・差分の実行を提供する。

#![allow(dead_code)]

use stagediff::adapters::sql_renderer::renderer_for;
use stagediff::core::config::{Dialect, RunContext};
use stagediff::core::definition::{
    Column, DataRow, DataRows, DataValue, Definition, Schema, Table,
};
use stagediff::core::error::EngineError;
use stagediff::core::stage::{Stage, StageOutput};
use stagediff::services::diff_orchestrator::DiffOrchestrator;

/// `id integer NOT NULL` を主キーに持つテーブル
pub fn id_table(name: &str) -> Table {
    let mut table = Table::new(name);
    table.primary_key = vec!["id".to_string()];
    table.add_column(Column::new("id", "integer", false));
    table
}

/// `{target}_id` カラムで `target` を参照するテーブル
pub fn referencing_table(name: &str, targets: &[&str]) -> Table {
    let mut table = id_table(name);
    for target in targets {
        let mut column = Column::untyped(format!("{}_id", target));
        column.foreign_table = Some(target.to_string());
        table.add_column(column);
    }
    table
}

pub fn schema(name: &str, tables: Vec<Table>) -> Schema {
    let mut schema = Schema::new(name);
    for table in tables {
        schema.add_table(table);
    }
    schema
}

pub fn definition(schemas: Vec<Schema>) -> Definition {
    let mut definition = Definition::new();
    for schema in schemas {
        definition.add_schema(schema);
    }
    definition
}

/// `app` スキーマだけを持つ定義
pub fn app(tables: Vec<Table>) -> Definition {
    definition(vec![schema("app", tables)])
}

pub fn int(value: i64) -> Option<DataValue> {
    Some(DataValue::Integer(value))
}

pub fn text(value: &str) -> Option<DataValue> {
    Some(DataValue::text(value))
}

pub fn rows(columns: &[&str], rows: Vec<Vec<Option<DataValue>>>) -> DataRows {
    DataRows {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows: rows.into_iter().map(DataRow::new).collect(),
    }
}

pub fn postgres() -> RunContext {
    RunContext::new(Dialect::PostgreSQL)
}

pub fn mysql() -> RunContext {
    RunContext::new(Dialect::MySQL)
}

pub fn diff_with(
    ctx: RunContext,
    old: &Definition,
    new: &Definition,
) -> Result<StageOutput, EngineError> {
    let renderer = renderer_for(&ctx);
    DiffOrchestrator::new(ctx, renderer.as_ref()).diff(old, new)
}

pub fn diff(old: &Definition, new: &Definition) -> Result<StageOutput, EngineError> {
    diff_with(postgres(), old, new)
}

pub fn build_with(ctx: RunContext, definition: &Definition) -> Result<StageOutput, EngineError> {
    let renderer = renderer_for(&ctx);
    DiffOrchestrator::new(ctx, renderer.as_ref()).build(definition)
}

pub fn build(definition: &Definition) -> Result<StageOutput, EngineError> {
    build_with(postgres(), definition)
}

/// ステージのSQL文
pub fn sql(output: &StageOutput, stage: Stage) -> Vec<String> {
    output.stage(stage).iter().map(|s| s.sql.clone()).collect()
}

/// 文の位置（見つからなければパニック）
pub fn position(statements: &[String], expected: &str) -> usize {
    statements
        .iter()
        .position(|s| s == expected)
        .unwrap_or_else(|| panic!("statement not found: {}\nin: {:#?}", expected, statements))
}
