// 出力ライターの統合テスト

mod common;

use chrono::{TimeZone, Utc};
use stagediff::adapters::output_writer::OutputWriter;
use stagediff::core::stage::{Stage, StageOutput, Statement};
use std::fs;
use tempfile::TempDir;

fn upgrade_with(stage: Stage, count: usize) -> StageOutput {
    let mut output = StageOutput::upgrade();
    for i in 0..count {
        output.push(Statement::generated(stage, format!("SELECT {};", i)));
    }
    output
}

#[test]
fn test_files_are_split_by_statement_limit() {
    let ctx = common::postgres().with_statement_limit(2);
    let writer = OutputWriter::new("out/app", &ctx);
    let time = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();

    let files = writer.render_files(&upgrade_with(Stage::Stage1, 5), "c0ffee", time);

    let parts: Vec<(usize, usize)> = files.iter().map(|f| (f.part, f.statement_count)).collect();
    assert_eq!(parts, vec![(1, 2), (2, 2), (3, 1)]);
    assert_eq!(
        files[2].path,
        std::path::PathBuf::from("out/app_upgrade_stage1_3.sql")
    );
    assert!(files.iter().all(|f| f.stage == Some(Stage::Stage1)));
}

#[test]
fn test_write_creates_output_directory() {
    let temp_dir = TempDir::new().unwrap();
    let prefix = temp_dir.path().join("nested/dir/app");
    let writer = OutputWriter::new(prefix.clone(), &common::postgres());

    let mut output = upgrade_with(Stage::Stage2, 1);
    output.push(Statement::generated(Stage::Stage4, "INSERT INTO t VALUES (1);"));
    let files = writer.write(&output, "abc").unwrap();

    assert_eq!(files.len(), 2);
    let stage2 = temp_dir.path().join("nested/dir/app_upgrade_stage2_1.sql");
    let stage4 = temp_dir.path().join("nested/dir/app_upgrade_stage4_1.sql");
    let content = fs::read_to_string(&stage2).unwrap();
    assert!(content.contains("-- Definition checksum: abc"));
    assert!(content.contains("SELECT 0;"));
    assert!(fs::read_to_string(&stage4)
        .unwrap()
        .contains("INSERT INTO t VALUES (1);"));
}

#[test]
fn test_collapsed_output_names_and_slonik_wrapping() {
    let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut build = StageOutput::build();
    build.push(Statement::generated(Stage::Stage1, "CREATE SCHEMA IF NOT EXISTS app;"));

    let writer = OutputWriter::new("app", &common::postgres());
    let files = writer.render_files(&build, "x", time);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, std::path::PathBuf::from("app_build_1.sql"));
    assert_eq!(files[0].stage, None);
    assert!(files[0].content.contains("BEGIN;\n\nCREATE SCHEMA IF NOT EXISTS app;\n\nCOMMIT;\n"));

    let slonik = common::postgres().with_slonik_mode(true);
    let files = OutputWriter::new("app", &slonik).render_files(&build, "x", time);
    assert!(!files[0].content.contains("BEGIN;"));

    let mut upgrade = upgrade_with(Stage::Stage3, 1);
    upgrade.collapse();
    let files = OutputWriter::new("app", &common::postgres()).render_files(&upgrade, "x", time);
    assert_eq!(files[0].path, std::path::PathBuf::from("app_upgrade_1.sql"));
}

#[test]
fn test_empty_output_writes_no_files() {
    let writer = OutputWriter::new("app", &common::postgres());
    let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert!(writer
        .render_files(&StageOutput::upgrade(), "x", time)
        .is_empty());
}
