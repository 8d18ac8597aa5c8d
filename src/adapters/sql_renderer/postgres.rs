// PostgreSQL用SQLレンダラー
//
// 操作をPostgreSQL用のDDL/DML文に変換します。

use crate::adapters::sql_renderer::{
    assignments, string_literal, trim_statement, value_literal, where_clause, Capability,
    IdentifierQuoter, StatementRenderer,
};
use crate::core::config::Dialect;
use crate::core::definition::{Function, Partition, Sequence, TableOption};
use crate::core::operation::{
    ColumnSpec, ConstraintSpec, EnumValuePosition, Operation, QualifiedName,
};

/// WITH (...) で指定するストレージパラメータ
const STORAGE_PARAMETERS: &[&str] = &[
    "fillfactor",
    "parallel_workers",
    "toast_tuple_target",
    "user_catalog_table",
    "autovacuum_enabled",
];

/// PostgreSQL用SQLレンダラー
#[derive(Debug, Clone)]
pub struct PostgresRenderer {
    quoter: IdentifierQuoter,
}

impl PostgresRenderer {
    /// 新しいPostgresRendererを作成
    pub fn new(quote_identifiers: bool) -> Self {
        Self {
            quoter: IdentifierQuoter::new('"', quote_identifiers),
        }
    }

    fn ident(&self, name: &str) -> String {
        self.quoter.ident(name)
    }

    fn table(&self, name: &QualifiedName) -> String {
        self.quoter.qualified(name)
    }

    /// カラム定義のSQL文字列を生成
    fn column_definition(&self, column: &ColumnSpec) -> String {
        let mut parts = vec![self.ident(&column.name), column.column_type.clone()];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default));
        }
        parts.join(" ")
    }

    fn is_storage_parameter(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        STORAGE_PARAMETERS.contains(&lower.as_str())
            || lower.starts_with("autovacuum_")
            || lower.starts_with("toast.")
    }

    fn storage_parameters(options: &[TableOption]) -> Vec<String> {
        options
            .iter()
            .filter(|o| Self::is_storage_parameter(&o.name))
            .map(|o| format!("{} = {}", o.name.to_ascii_lowercase(), o.value))
            .collect()
    }

    fn tablespace(options: &[TableOption]) -> Option<&TableOption> {
        options
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case("tablespace"))
    }

    fn create_table(
        &self,
        table: &QualifiedName,
        columns: &[ColumnSpec],
        options: &[TableOption],
        inherits: Option<&QualifiedName>,
        partition: Option<&Partition>,
    ) -> String {
        let column_lines: Vec<String> = columns
            .iter()
            .map(|c| format!("    {}", self.column_definition(c)))
            .collect();

        let mut sql = format!(
            "CREATE TABLE {} (\n{}\n)",
            self.table(table),
            column_lines.join(",\n")
        );

        if let Some(parent) = inherits {
            sql.push_str(&format!(" INHERITS ({})", self.table(parent)));
        }
        if let Some(partition) = partition {
            sql.push_str(&format!(
                " PARTITION BY {} ({})",
                partition.kind.to_ascii_uppercase(),
                self.quoter.list(&partition.columns)
            ));
        }
        let parameters = Self::storage_parameters(options);
        if !parameters.is_empty() {
            sql.push_str(&format!(" WITH ({})", parameters.join(", ")));
        }
        if let Some(tablespace) = Self::tablespace(options) {
            sql.push_str(&format!(" TABLESPACE {}", self.ident(&tablespace.value)));
        }
        sql.push(';');
        sql
    }

    fn sequence_clauses(sequence: &Sequence) -> Vec<String> {
        let mut clauses = Vec::new();
        if let Some(increment) = sequence.increment {
            clauses.push(format!("INCREMENT BY {}", increment));
        }
        if let Some(min) = sequence.min {
            clauses.push(format!("MINVALUE {}", min));
        }
        if let Some(max) = sequence.max {
            clauses.push(format!("MAXVALUE {}", max));
        }
        if let Some(start) = sequence.start {
            clauses.push(format!("START WITH {}", start));
        }
        if let Some(cache) = sequence.cache {
            clauses.push(format!("CACHE {}", cache));
        }
        clauses
    }

    fn add_constraint(&self, constraint: &ConstraintSpec) -> String {
        let table = self.table(&constraint.table);
        let name = self.ident(&constraint.name);

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

        format!("ALTER TABLE {} ADD CONSTRAINT {} {};", table, name, body)
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

impl Default for PostgresRenderer {
    fn default() -> Self {
        Self::new(false)
    }
}

impl StatementRenderer for PostgresRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSQL
    }

    fn supports_table_option(&self, name: &str) -> bool {
        Self::is_storage_parameter(name) || name.eq_ignore_ascii_case("tablespace")
    }

    fn supports(&self, _capability: Capability) -> bool {
        true
    }

    fn render(&self, operation: &Operation) -> Vec<String> {
        match operation {
            Operation::CreateSchema { name } => {
                vec![format!("CREATE SCHEMA IF NOT EXISTS {};", self.ident(name))]
            }
            Operation::DropSchema { name } => vec![format!("DROP SCHEMA {};", self.ident(name))],

            Operation::CreateType { name, values } => {
                let values: Vec<String> = values.iter().map(|v| string_literal(v, false)).collect();
                vec![format!(
                    "CREATE TYPE {} AS ENUM ({});",
                    self.table(name),
                    values.join(", ")
                )]
            }
            Operation::AddEnumValue {
                name,
                value,
                position,
            } => {
                let position = match position {
                    Some(EnumValuePosition::Before(other)) => {
                        format!(" BEFORE {}", string_literal(other, false))
                    }
                    Some(EnumValuePosition::After(other)) => {
                        format!(" AFTER {}", string_literal(other, false))
                    }
                    None => String::new(),
                };
                vec![format!(
                    "ALTER TYPE {} ADD VALUE {}{};",
                    self.table(name),
                    string_literal(value, false),
                    position
                )]
            }
            Operation::DropType { name } => vec![format!("DROP TYPE {};", self.table(name))],

            Operation::CreateSequence { name, sequence } => {
                let mut sql = format!("CREATE SEQUENCE {}", self.table(name));
                for clause in Self::sequence_clauses(sequence) {
                    sql.push(' ');
                    sql.push_str(&clause);
                }
                if sequence.cycle {
                    sql.push_str(" CYCLE");
                }
                sql.push(';');
                vec![sql]
            }
            Operation::AlterSequence { name, sequence } => {
                let mut sql = format!("ALTER SEQUENCE {}", self.table(name));
                for clause in Self::sequence_clauses(sequence) {
                    sql.push(' ');
                    sql.push_str(&clause);
                }
                sql.push_str(if sequence.cycle { " CYCLE" } else { " NO CYCLE" });
                if let Some(owned_by) = &sequence.owned_by {
                    sql.push_str(&format!(
                        " OWNED BY {}.{}",
                        self.ident(&name.schema),
                        owned_by
                    ));
                }
                sql.push(';');
                vec![sql]
            }
            Operation::DropSequence { name } => {
                vec![format!("DROP SEQUENCE {};", self.table(name))]
            }

            Operation::CreateFunction { name, function } => vec![format!(
                "CREATE OR REPLACE FUNCTION {}({}) RETURNS {} AS $$\n{}\n$$ LANGUAGE {};",
                self.table(name),
                Self::function_parameters(function),
                function.returns,
                function.definition.trim(),
                function.language
            )],
            Operation::DropFunction { name, signature } => {
                vec![format!("DROP FUNCTION {}.{};", self.ident(&name.schema), signature)]
            }

            Operation::CreateTable {
                table,
                columns,
                options,
                inherits,
                partition,
            } => vec![self.create_table(
                table,
                columns,
                options,
                inherits.as_ref(),
                partition.as_ref(),
            )],
            Operation::DropTable { table } => vec![format!("DROP TABLE {};", self.table(table))],
            Operation::RenameTable { from, to } => {
                let mut statements = Vec::new();
                let mut current = from.clone();
                if from.schema != to.schema {
                    statements.push(format!(
                        "ALTER TABLE {} SET SCHEMA {};",
                        self.table(&current),
                        self.ident(&to.schema)
                    ));
                    current.schema = to.schema.clone();
                }
                if from.name != to.name {
                    statements.push(format!(
                        "ALTER TABLE {} RENAME TO {};",
                        self.table(&current),
                        self.ident(&to.name)
                    ));
                }
                statements
            }
            Operation::SetTableOptions { table, options } => {
                let mut statements = Vec::new();
                let parameters = Self::storage_parameters(options);
                if !parameters.is_empty() {
                    statements.push(format!(
                        "ALTER TABLE {} SET ({});",
                        self.table(table),
                        parameters.join(", ")
                    ));
                }
                if let Some(tablespace) = Self::tablespace(options) {
                    statements.push(format!(
                        "ALTER TABLE {} SET TABLESPACE {};",
                        self.table(table),
                        self.ident(&tablespace.value)
                    ));
                }
                statements
            }
            Operation::ResetTableOptions { table, names } => {
                let mut statements = Vec::new();
                let parameters: Vec<String> = names
                    .iter()
                    .filter(|n| Self::is_storage_parameter(n))
                    .map(|n| n.to_ascii_lowercase())
                    .collect();
                if !parameters.is_empty() {
                    statements.push(format!(
                        "ALTER TABLE {} RESET ({});",
                        self.table(table),
                        parameters.join(", ")
                    ));
                }
                if names.iter().any(|n| n.eq_ignore_ascii_case("tablespace")) {
                    statements.push(format!(
                        "ALTER TABLE {} SET TABLESPACE pg_default;",
                        self.table(table)
                    ));
                }
                statements
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
            Operation::AlterColumnType { table, column } => vec![format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
                self.table(table),
                self.ident(&column.name),
                column.column_type,
                self.ident(&column.name),
                column.column_type
            )],
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
            Operation::SetNotNull { table, column } => vec![format!(
                "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL;",
                self.table(table),
                self.ident(&column.name)
            )],
            Operation::DropNotNull { table, column } => vec![format!(
                "ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL;",
                self.table(table),
                self.ident(&column.name)
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
                    .map(|u| format!(" USING {}", u))
                    .unwrap_or_default();
                vec![format!(
                    "CREATE {}INDEX {} ON {}{} ({});",
                    if index.unique { "UNIQUE " } else { "" },
                    self.ident(&index.name),
                    self.table(table),
                    using,
                    dimensions.join(", ")
                )]
            }
            Operation::DropIndex { table, name } => vec![format!(
                "DROP INDEX {}.{};",
                self.ident(&table.schema),
                self.ident(name)
            )],
            Operation::CreateTrigger { table, trigger } => vec![format!(
                "CREATE TRIGGER {} {} {} ON {} FOR EACH {} EXECUTE FUNCTION {};",
                self.ident(&trigger.name),
                trigger.timing.to_ascii_uppercase(),
                trigger
                    .events
                    .iter()
                    .map(|e| e.to_ascii_uppercase())
                    .collect::<Vec<_>>()
                    .join(" OR "),
                self.table(table),
                trigger.for_each.to_ascii_uppercase(),
                trigger.function
            )],
            Operation::DropTrigger { table, name } => vec![format!(
                "DROP TRIGGER {} ON {};",
                self.ident(name),
                self.table(table)
            )],
            Operation::Grant { table, grant } => vec![format!(
                "GRANT {} ON TABLE {} TO {};",
                grant.operations.join(", ").to_ascii_uppercase(),
                self.table(table),
                self.quoter.list(&grant.roles)
            )],
            Operation::Revoke { table, grant } => vec![format!(
                "REVOKE {} ON TABLE {} FROM {};",
                grant.operations.join(", ").to_ascii_uppercase(),
                self.table(table),
                self.quoter.list(&grant.roles)
            )],

            Operation::AddConstraint(constraint) => vec![self.add_constraint(constraint)],
            Operation::DropConstraint { table, name, .. } => vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                self.table(table),
                self.ident(name)
            )],

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
                    .map(|(_, v)| value_literal(v.as_ref(), false))
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
                assignments(&self.quoter, values, false),
                where_clause(&self.quoter, key, false)
            )],
            Operation::DeleteRow { table, key } => vec![format!(
                "DELETE FROM {} WHERE {};",
                self.table(table),
                where_clause(&self.quoter, key, false)
            )],
            Operation::SerialStart { table, column } => vec![format!(
                "SELECT setval(pg_get_serial_sequence({}, {}), COALESCE((SELECT MAX({}) FROM {}), 1));",
                string_literal(&self.table(table), false),
                string_literal(column, false),
                self.ident(column),
                self.table(table)
            )],
        }
    }
}
