// MySQL用SQLレンダラー
//
// 操作をMySQL用のDDL/DML文に変換します。
// 列挙型、シーケンス、テーブル継承、パーティショニングは未対応の機能として扱います。

use crate::adapters::sql_renderer::{
    assignments, string_literal, trim_statement, value_literal, where_clause, Capability,
    IdentifierQuoter, StatementRenderer,
};
use crate::core::config::Dialect;
use crate::core::definition::{ConstraintType, Function, TableOption};
use crate::core::operation::{ColumnSpec, ConstraintSpec, Operation, QualifiedName};
use crate::core::table_constraint::ConstraintKind;

/// MySQLが理解するテーブルオプション
const TABLE_OPTIONS: &[&str] = &[
    "engine",
    "charset",
    "default charset",
    "character set",
    "collate",
    "comment",
    "auto_increment",
    "row_format",
];

/// MySQL用SQLレンダラー
#[derive(Debug, Clone)]
pub struct MysqlRenderer {
    quoter: IdentifierQuoter,
}

impl MysqlRenderer {
    /// 新しいMysqlRendererを作成
    pub fn new(quote_identifiers: bool) -> Self {
        Self {
            quoter: IdentifierQuoter::new('`', quote_identifiers),
        }
    }

    fn ident(&self, name: &str) -> String {
        self.quoter.ident(name)
    }

    fn table(&self, name: &QualifiedName) -> String {
        self.quoter.qualified(name)
    }

    fn column_definition(&self, column: &ColumnSpec) -> String {
        let mut parts = vec![self.ident(&column.name), map_column_type(&column.column_type)];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default));
        }
        parts.join(" ")
    }

    /// `ENGINE=InnoDB COMMENT='...'` 形式のオプション
    fn table_options(&self, options: &[TableOption]) -> Vec<String> {
        options
            .iter()
            .filter(|o| self.supports_table_option(&o.name))
            .map(|o| {
                let name = o.name.to_ascii_uppercase();
                if name == "COMMENT" {
                    format!("{}={}", name, string_literal(&o.value, true))
                } else {
                    format!("{}={}", name, o.value)
                }
            })
            .collect()
    }

    fn modify_column(&self, table: &QualifiedName, column: &ColumnSpec) -> String {
        format!(
            "ALTER TABLE {} MODIFY COLUMN {};",
            self.table(table),
            self.column_definition(column)
        )
    }

    fn add_constraint(&self, constraint: &ConstraintSpec) -> String {
        let table = self.table(&constraint.table);

        if constraint.kind == ConstraintKind::PrimaryKey && constraint.definition.is_none() {
            return format!(
                "ALTER TABLE {} ADD PRIMARY KEY ({});",
                table,
                self.quoter.list(&constraint.columns)
            );
        }

        let body = match (&constraint.foreign_table, constraint.columns.is_empty()) {
            (Some(foreign_table), false) => {
                let mut body = format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.quoter.list(&constraint.columns),
                    self.table(foreign_table),
                    self.quoter.list(&constraint.foreign_columns)
                );
                if let Some(action) = constraint.on_update {
                    body.push_str(&format!(" ON UPDATE {}", action.as_sql()));
                }
                if let Some(action) = constraint.on_delete {
                    body.push_str(&format!(" ON DELETE {}", action.as_sql()));
                }
                body
            }
            _ => match &constraint.definition {
                Some(definition) => format!("{} {}", constraint.sql_type.as_sql(), definition),
                None => format!(
                    "{} ({})",
                    constraint.sql_type.as_sql(),
                    self.quoter.list(&constraint.columns)
                ),
            },
        };

        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {};",
            table,
            self.ident(&constraint.name),
            body
        )
    }

    fn drop_constraint(
        &self,
        table: &QualifiedName,
        name: &str,
        kind: ConstraintKind,
        sql_type: ConstraintType,
    ) -> String {
        let table = self.table(table);
        match (kind, sql_type) {
            (ConstraintKind::PrimaryKey, _) => format!("ALTER TABLE {} DROP PRIMARY KEY;", table),
            (ConstraintKind::Foreign, _) => {
                format!("ALTER TABLE {} DROP FOREIGN KEY {};", table, self.ident(name))
            }
            (_, ConstraintType::Unique) => {
                format!("ALTER TABLE {} DROP INDEX {};", table, self.ident(name))
            }
            (_, ConstraintType::Check) => {
                format!("ALTER TABLE {} DROP CHECK {};", table, self.ident(name))
            }
            _ => format!("ALTER TABLE {} DROP CONSTRAINT {};", table, self.ident(name)),
        }
    }

    fn function_parameters(function: &Function) -> String {
        function
            .parameters
            .iter()
            .map(|p| match &p.name {
                Some(name) => format!("{} {}", name, p.parameter_type),
                None => p.parameter_type.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for MysqlRenderer {
    fn default() -> Self {
        Self::new(false)
    }
}

/// PostgreSQL由来の型名をMySQLの型名に置き換える
fn map_column_type(column_type: &str) -> String {
    match column_type.trim().to_ascii_lowercase().as_str() {
        "serial" | "serial4" => "INT AUTO_INCREMENT".to_string(),
        "bigserial" | "serial8" => "BIGINT AUTO_INCREMENT".to_string(),
        "smallserial" | "serial2" => "SMALLINT AUTO_INCREMENT".to_string(),
        "boolean" | "bool" => "TINYINT(1)".to_string(),
        "bytea" => "BLOB".to_string(),
        "jsonb" => "JSON".to_string(),
        "double precision" => "DOUBLE".to_string(),
        _ => column_type.to_string(),
    }
}

impl StatementRenderer for MysqlRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::MySQL
    }

    fn supports_table_option(&self, name: &str) -> bool {
        TABLE_OPTIONS.contains(&name.to_ascii_lowercase().as_str())
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::EnumTypes
            | Capability::Sequences
            | Capability::TableInheritance
            | Capability::Partitioning => false,
        }
    }

    fn render(&self, operation: &Operation) -> Vec<String> {
        match operation {
            Operation::CreateSchema { name } => {
                vec![format!("CREATE SCHEMA IF NOT EXISTS {};", self.ident(name))]
            }
            Operation::DropSchema { name } => vec![format!("DROP SCHEMA {};", self.ident(name))],

            Operation::CreateType { .. }
            | Operation::AddEnumValue { .. }
            | Operation::DropType { .. }
            | Operation::CreateSequence { .. }
            | Operation::AlterSequence { .. }
            | Operation::DropSequence { .. } => Vec::new(),

            Operation::CreateFunction { name, function } => vec![
                format!("DROP FUNCTION IF EXISTS {};", self.table(name)),
                format!(
                    "CREATE FUNCTION {}({}) RETURNS {}\n{};",
                    self.table(name),
                    Self::function_parameters(function),
                    function.returns,
                    trim_statement(&function.definition)
                ),
            ],
            Operation::DropFunction { name, .. } => {
                vec![format!("DROP FUNCTION {};", self.table(name))]
            }

            Operation::CreateTable {
                table,
                columns,
                options,
                ..
            } => {
                let column_lines: Vec<String> = columns
                    .iter()
                    .map(|c| format!("    {}", self.column_definition(c)))
                    .collect();
                let mut sql = format!(
                    "CREATE TABLE {} (\n{}\n)",
                    self.table(table),
                    column_lines.join(",\n")
                );
                let options = self.table_options(options);
                if !options.is_empty() {
                    sql.push(' ');
                    sql.push_str(&options.join(" "));
                }
                sql.push(';');
                vec![sql]
            }
            Operation::DropTable { table } => vec![format!("DROP TABLE {};", self.table(table))],
            Operation::RenameTable { from, to } => vec![format!(
                "RENAME TABLE {} TO {};",
                self.table(from),
                self.table(to)
            )],
            Operation::SetTableOptions { table, options } => {
                let options = self.table_options(options);
                if options.is_empty() {
                    return Vec::new();
                }
                vec![format!(
                    "ALTER TABLE {} {};",
                    self.table(table),
                    options.join(", ")
                )]
            }
            Operation::ResetTableOptions { table, names } => {
                if names.iter().any(|n| n.eq_ignore_ascii_case("comment")) {
                    vec![format!("ALTER TABLE {} COMMENT='';", self.table(table))]
                } else {
                    Vec::new()
                }
            }

            Operation::AddColumn { table, column } => vec![format!(
                "ALTER TABLE {} ADD COLUMN {};",
                self.table(table),
                self.column_definition(column)
            )],
            Operation::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {};",
                self.table(table),
                self.ident(column)
            )],
            Operation::RenameColumn { table, from, to } => vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                self.table(table),
                self.ident(from),
                self.ident(to)
            )],
            Operation::AlterColumnType { table, column }
            | Operation::SetNotNull { table, column }
            | Operation::DropNotNull { table, column } => vec![self.modify_column(table, column)],
            Operation::SetColumnDefault {
                table,
                column,
                default,
            } => vec![format!(
                "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                self.table(table),
                self.ident(column),
                default
            )],
            Operation::DropColumnDefault { table, column } => vec![format!(
                "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                self.table(table),
                self.ident(column)
            )],
            Operation::FillColumnDefault {
                table,
                column,
                default,
            } => vec![format!(
                "UPDATE {} SET {} = {} WHERE {} IS NULL;",
                self.table(table),
                self.ident(column),
                default,
                self.ident(column)
            )],

            Operation::CreateIndex { table, index } => {
                let dimensions: Vec<String> = index
                    .dimensions
                    .iter()
                    .map(|d| self.quoter.dimension(d))
                    .collect();
                let using = index
                    .using
                    .as_ref()
                    .map(|u| format!(" USING {}", u.to_ascii_uppercase()))
                    .unwrap_or_default();
                vec![format!(
                    "CREATE {}INDEX {}{} ON {} ({});",
                    if index.unique { "UNIQUE " } else { "" },
                    self.ident(&index.name),
                    using,
                    self.table(table),
                    dimensions.join(", ")
                )]
            }
            Operation::DropIndex { table, name } => vec![format!(
                "DROP INDEX {} ON {};",
                self.ident(name),
                self.table(table)
            )],
            Operation::CreateTrigger { table, trigger } => {
                // MySQLのトリガーは1イベントのみ
                let multiple = trigger.events.len() > 1;
                trigger
                    .events
                    .iter()
                    .map(|event| {
                        let name = if multiple {
                            format!("{}_{}", trigger.name, event.to_ascii_lowercase())
                        } else {
                            trigger.name.clone()
                        };
                        format!(
                            "CREATE TRIGGER {} {} {} ON {} FOR EACH ROW {};",
                            self.ident(&name),
                            trigger.timing.to_ascii_uppercase(),
                            event.to_ascii_uppercase(),
                            self.table(table),
                            trim_statement(&trigger.function)
                        )
                    })
                    .collect()
            }
            Operation::DropTrigger { table, name } => vec![format!(
                "DROP TRIGGER {}.{};",
                self.ident(&table.schema),
                self.ident(name)
            )],
            Operation::Grant { table, grant } => vec![format!(
                "GRANT {} ON {} TO {};",
                grant.operations.join(", ").to_ascii_uppercase(),
                self.table(table),
                self.quoter.list(&grant.roles)
            )],
            Operation::Revoke { table, grant } => vec![format!(
                "REVOKE {} ON {} FROM {};",
                grant.operations.join(", ").to_ascii_uppercase(),
                self.table(table),
                self.quoter.list(&grant.roles)
            )],

            Operation::AddConstraint(constraint) => vec![self.add_constraint(constraint)],
            Operation::DropConstraint {
                table,
                name,
                kind,
                sql_type,
            } => vec![self.drop_constraint(table, name, *kind, *sql_type)],

            Operation::CreateView { name, query } => vec![format!(
                "CREATE VIEW {} AS {};",
                self.table(name),
                trim_statement(query)
            )],
            Operation::DropView { name } => vec![format!("DROP VIEW {};", self.table(name))],

            Operation::InsertRow { table, values } => {
                let columns: Vec<String> = values.iter().map(|(c, _)| self.ident(c)).collect();
                let literals: Vec<String> = values
                    .iter()
                    .map(|(_, v)| value_literal(v.as_ref(), true))
                    .collect();
                vec![format!(
                    "INSERT INTO {} ({}) VALUES ({});",
                    self.table(table),
                    columns.join(", "),
                    literals.join(", ")
                )]
            }
            Operation::UpdateRow { table, key, values } => vec![format!(
                "UPDATE {} SET {} WHERE {};",
                self.table(table),
                assignments(&self.quoter, values, true),
                where_clause(&self.quoter, key, true)
            )],
            Operation::DeleteRow { table, key } => vec![format!(
                "DELETE FROM {} WHERE {};",
                self.table(table),
                where_clause(&self.quoter, key, true)
            )],
            // InnoDBは現在の最大値より小さい値を指定すると最大値+1に調整する
            Operation::SerialStart { table, .. } => {
                vec![format!("ALTER TABLE {} AUTO_INCREMENT = 1;", self.table(table))]
            }
        }
    }
}
