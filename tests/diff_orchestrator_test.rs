// 差分オーケストレーターの統合テスト

mod common;

use common::*;
use stagediff::core::definition::{
    Column, Definition, Index, LiteralSql, Partition, Schema, Sequence, SqlStage, TypeDef, View,
    ViewDependency,
};
use stagediff::core::error::{EngineError, ErrorLocation, WarningKind};
use stagediff::core::stage::Stage;

/// 外部キー、CHECK、インデックス、ビュー、行、カスタムSQLを含む定義
fn catalog() -> Definition {
    let mut users = id_table("users");
    let mut email = Column::new("email", "text", false);
    email.check = Some("email LIKE '%@%'".to_string());
    users.add_column(email);
    users.indexes.push(Index {
        name: "users_email_idx".to_string(),
        dimensions: vec!["email".to_string()],
        unique: true,
        using: None,
    });
    users.rows = Some(rows(&["id", "email"], vec![vec![int(1), text("root@example.com")]]));

    let mut posts = referencing_table("posts", &["users"]);
    posts.add_column(Column::new("title", "text", true));

    let mut definition = app(vec![posts, users]);
    definition.schemas[0].add_view(View::new("recent_posts", "SELECT * FROM app.posts"));
    definition
        .sql
        .push(LiteralSql::new("GRANT USAGE ON SCHEMA app TO reader;", None));
    definition
}

#[test]
fn test_diff_against_itself_generates_nothing() {
    let definition = catalog();
    let output = diff(&definition, &definition.clone()).unwrap();

    assert_eq!(output.generated_statements().count(), 0);
    assert!(output.is_empty());
    assert!(output.warnings().is_empty());
}

#[test]
fn test_not_null_column_with_default_is_filled_before_constraint() {
    let old = app(vec![id_table("users")]);
    let mut users = id_table("users");
    let mut status = Column::new("status", "text", false);
    status.default = Some("'active'".to_string());
    users.add_column(status);
    let new = app(vec![users]);

    let output = diff(&old, &new).unwrap();
    assert_eq!(
        sql(&output, Stage::Stage1),
        vec![
            "ALTER TABLE app.users ADD COLUMN status text DEFAULT 'active';",
            "UPDATE app.users SET status = 'active' WHERE status IS NULL;",
        ]
    );
    assert_eq!(
        sql(&output, Stage::Stage3),
        vec!["ALTER TABLE app.users ALTER COLUMN status SET NOT NULL;"]
    );
}

#[test]
fn test_removed_table_drops_foreign_keys_early_and_table_late() {
    let old = app(vec![id_table("users"), referencing_table("sessions", &["users"])]);
    let new = app(vec![id_table("users")]);

    let output = diff(&old, &new).unwrap();
    assert_eq!(
        sql(&output, Stage::Stage1),
        vec!["ALTER TABLE app.sessions DROP CONSTRAINT sessions_users_id_fkey;"]
    );
    assert_eq!(sql(&output, Stage::Stage3), vec!["DROP TABLE app.sessions;"]);
}

#[test]
fn test_changed_view_recreates_dependents() {
    let base = |query: &str| {
        let mut definition = app(vec![id_table("t")]);
        definition.schemas[0].add_view(View::new("v1", query));
        let mut v2 = View::new("v2", "SELECT * FROM app.v1");
        v2.depends_on.push(ViewDependency {
            schema: None,
            view: "v1".to_string(),
        });
        definition.schemas[0].add_view(v2);
        definition
    };
    let old = base("SELECT id FROM app.t");
    let new = base("SELECT id FROM app.t WHERE id > 0");

    let output = diff(&old, &new).unwrap();
    assert_eq!(
        sql(&output, Stage::Stage1),
        vec!["DROP VIEW app.v2;", "DROP VIEW app.v1;"]
    );
    assert_eq!(
        sql(&output, Stage::Stage3),
        vec![
            "CREATE VIEW app.v1 AS SELECT id FROM app.t WHERE id > 0;",
            "CREATE VIEW app.v2 AS SELECT * FROM app.v1;",
        ]
    );
}

#[test]
fn test_literal_sql_placement() {
    let mut old = app(vec![id_table("t")]);
    old.sql.push(LiteralSql::new("SELECT 'applied';", None));

    let mut t = id_table("t");
    t.add_column(Column::new("note", "text", true));
    let mut new = app(vec![t]);
    new.sql.push(LiteralSql::new("SELECT 'applied';", None));
    new.sql.push(LiteralSql::new("SELECT 'fresh';", None));
    new.sql
        .push(LiteralSql::new("SELECT 'late';", Some(SqlStage::Stage4)));
    new.sql.push(LiteralSql::new(
        "SELECT 'first';",
        Some(SqlStage::Stage1Before),
    ));

    let output = diff(&old, &new).unwrap();
    assert_eq!(
        sql(&output, Stage::Stage1),
        vec!["SELECT 'first';", "ALTER TABLE app.t ADD COLUMN note text;"]
    );
    assert_eq!(sql(&output, Stage::Stage2), vec!["SELECT 'fresh';"]);
    assert_eq!(sql(&output, Stage::Stage4), vec!["SELECT 'late';"]);
    assert_eq!(output.generated_statements().count(), 1);
}

#[test]
fn test_single_stage_collapses_streams() {
    let old = app(vec![id_table("users")]);
    let mut users = id_table("users");
    users.add_column(Column::new("email", "text", false));
    let new = app(vec![users]);

    let output = diff_with(postgres().with_single_stage(true), &old, &new).unwrap();
    assert!(output.is_collapsed());
    assert!(output.stage(Stage::Stage3).is_empty());
    assert_eq!(
        sql(&output, Stage::Stage1),
        vec![
            "ALTER TABLE app.users ADD COLUMN email text;",
            "ALTER TABLE app.users ALTER COLUMN email SET NOT NULL;",
        ]
    );
}

#[test]
fn test_build_orders_schema_tables_data_and_foreign_keys() {
    let output = build(&catalog()).unwrap();
    let statements = sql(&output, Stage::Stage1);

    assert_eq!(statements[0], "CREATE SCHEMA IF NOT EXISTS app;");
    let users = statements
        .iter()
        .position(|s| s.starts_with("CREATE TABLE app.users"))
        .unwrap();
    let posts = statements
        .iter()
        .position(|s| s.starts_with("CREATE TABLE app.posts"))
        .unwrap();
    let insert = position(
        &statements,
        "INSERT INTO app.users (id, email) VALUES (1, 'root@example.com');",
    );
    let foreign_key = position(
        &statements,
        "ALTER TABLE app.posts ADD CONSTRAINT posts_users_id_fkey FOREIGN KEY (users_id) REFERENCES app.users (id);",
    );
    let view = position(
        &statements,
        "CREATE VIEW app.recent_posts AS SELECT * FROM app.posts;",
    );

    assert!(users < posts);
    assert!(posts < view);
    assert!(insert < foreign_key);
    assert_eq!(
        statements.last().map(String::as_str),
        Some("GRANT USAGE ON SCHEMA app TO reader;")
    );
}

#[test]
fn test_removed_schema_is_dropped_last() {
    let mut archive = Schema::new("archive");
    archive.add_table(id_table("old_orders"));
    archive.types.push(TypeDef {
        name: "state".to_string(),
        values: vec!["open".to_string()],
    });
    let old = definition(vec![schema("app", vec![id_table("t")]), archive]);
    let new = app(vec![id_table("t")]);

    let output = diff(&old, &new).unwrap();
    assert_eq!(
        sql(&output, Stage::Stage3),
        vec![
            "DROP TABLE archive.old_orders;",
            "DROP TYPE archive.state;",
            "DROP SCHEMA archive;",
        ]
    );
}

#[test]
fn test_enum_values_are_added_in_place() {
    let with_type = |values: &[&str]| {
        let mut definition = app(vec![id_table("t")]);
        definition.schemas[0].types.push(TypeDef {
            name: "status".to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        definition
    };

    let output = diff(&with_type(&["a", "c"]), &with_type(&["a", "b", "c"])).unwrap();
    assert_eq!(
        sql(&output, Stage::Stage1),
        vec!["ALTER TYPE app.status ADD VALUE 'b' AFTER 'a';"]
    );

    let output = diff(&with_type(&["a", "c"]), &with_type(&["c", "a"])).unwrap();
    assert!(output.is_empty());
    assert_eq!(output.warnings().len(), 1);
}

#[test]
fn test_column_rename_and_ignore_old_names() {
    let mut old_table = id_table("users");
    old_table.add_column(Column::new("mail", "text", true));
    let old = app(vec![old_table]);

    let mut new_table = id_table("users");
    let mut email = Column::new("email", "text", true);
    email.old_column_name = Some("mail".to_string());
    new_table.add_column(email);
    let new = app(vec![new_table]);

    let output = diff(&old, &new).unwrap();
    assert_eq!(
        sql(&output, Stage::Stage1),
        vec!["ALTER TABLE app.users RENAME COLUMN mail TO email;"]
    );
    assert!(sql(&output, Stage::Stage3).is_empty());

    let output = diff_with(postgres().with_ignore_old_names(true), &old, &new).unwrap();
    assert_eq!(
        sql(&output, Stage::Stage1),
        vec!["ALTER TABLE app.users ADD COLUMN email text;"]
    );
    assert_eq!(
        sql(&output, Stage::Stage3),
        vec!["ALTER TABLE app.users DROP COLUMN mail;"]
    );
}

fn renamed(name: &str, old_name: &str) -> Column {
    let mut column = Column::new(name, "text", true);
    column.old_column_name = Some(old_name.to_string());
    column
}

#[test]
fn test_column_rename_onto_kept_column_is_fatal() {
    let mut old_table = id_table("t");
    old_table.add_column(Column::new("name", "text", true));
    let old = app(vec![old_table]);

    let mut new_table = id_table("t");
    new_table.add_column(Column::new("name", "text", true));
    new_table.add_column(renamed("full_name", "name"));
    let new = app(vec![new_table]);

    let error = diff(&old, &new).unwrap_err();
    assert!(error.is_rename_error());
    assert_eq!(
        error,
        EngineError::AmbiguousColumnRename {
            old_column: "name".to_string(),
            location: ErrorLocation::table("app", "t").with_column("full_name"),
        }
    );

    // 旧名を無視する場合は単なるカラム追加
    let output = diff_with(postgres().with_ignore_old_names(true), &old, &new).unwrap();
    assert_eq!(
        sql(&output, Stage::Stage1),
        vec!["ALTER TABLE app.t ADD COLUMN full_name text;"]
    );
}

#[test]
fn test_two_columns_claiming_one_old_column_is_fatal() {
    let mut old_table = id_table("t");
    old_table.add_column(Column::new("name", "text", true));
    let old = app(vec![old_table]);

    let mut new_table = id_table("t");
    new_table.add_column(renamed("a", "name"));
    new_table.add_column(renamed("b", "name"));
    let new = app(vec![new_table]);

    let error = diff(&old, &new).unwrap_err();
    assert!(error.is_rename_error());
    assert_eq!(
        error,
        EngineError::DuplicateColumnRename {
            old_column: "name".to_string(),
            first: "a".to_string(),
            second: "b".to_string(),
            location: ErrorLocation::table("app", "t"),
        }
    );
}

#[test]
fn test_unsupported_table_option_is_warned_and_skipped() {
    let old = app(vec![]);
    let mut users = id_table("users");
    users
        .options
        .push(stagediff::core::definition::TableOption::new("engine", "InnoDB"));
    let new = app(vec![users]);

    let output = diff(&old, &new).unwrap();
    assert_eq!(output.warnings().len(), 1);
    assert!(sql(&output, Stage::Stage1)
        .iter()
        .all(|s| !s.contains("InnoDB")));
}

fn order_seq() -> Sequence {
    Sequence {
        name: "order_seq".to_string(),
        start: Some(1),
        increment: Some(1),
        min: None,
        max: None,
        cache: None,
        cycle: false,
        owned_by: None,
    }
}

#[test]
fn test_mysql_build_warns_about_unsupported_constructs() {
    let mut child = id_table("child");
    child.inherits_table = Some("parent".to_string());
    let mut events = id_table("events");
    events.partition = Some(Partition {
        kind: "hash".to_string(),
        columns: vec!["id".to_string()],
    });
    let mut app_schema = schema("app", vec![id_table("parent"), child, events]);
    app_schema.types.push(TypeDef {
        name: "mood".to_string(),
        values: vec!["sad".to_string(), "happy".to_string()],
    });
    app_schema.sequences.push(order_seq());
    let definition = definition(vec![app_schema]);

    let output = build_with(mysql(), &definition).unwrap();
    let statements = sql(&output, Stage::Stage1);

    assert!(!statements.iter().any(|s| s.contains("INHERITS")));
    assert!(!statements.iter().any(|s| s.contains("PARTITION BY")));
    assert!(!statements.iter().any(|s| s.contains("mood")));
    assert!(!statements.iter().any(|s| s.contains("order_seq")));
    assert_eq!(
        statements
            .iter()
            .filter(|s| s.starts_with("CREATE TABLE"))
            .count(),
        3
    );

    let warnings = output.warnings();
    assert_eq!(warnings.len(), 4);
    assert!(warnings
        .iter()
        .all(|w| w.kind == WarningKind::UnsupportedChange));
    assert!(warnings.iter().any(|w| w.message.contains("enum types")));
    assert!(warnings.iter().any(|w| w.message.contains("sequences")));
    assert!(warnings
        .iter()
        .any(|w| w.message.contains("table inheritance")));
    assert!(warnings.iter().any(|w| w.message.contains("partitioning")));
}

#[test]
fn test_mysql_diff_warns_about_enum_extension() {
    let mut old_schema = schema("app", vec![id_table("users")]);
    old_schema.types.push(TypeDef {
        name: "mood".to_string(),
        values: vec!["sad".to_string()],
    });
    let mut new_schema = old_schema.clone();
    new_schema.types[0].values.push("happy".to_string());

    let output = diff_with(
        mysql(),
        &definition(vec![old_schema]),
        &definition(vec![new_schema]),
    )
    .unwrap();

    assert!(output.is_empty());
    assert_eq!(output.warnings().len(), 1);
    assert!(output.warnings()[0].message.contains("add_enum_value app.mood"));
}
