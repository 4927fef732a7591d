//! Alter script generator
//!
//! Turns [`CatalogChanges`] into MySQL DDL, in dependency order:
//! schemas, foreign key drops, table drops, table creates, table alters,
//! foreign key adds, then views, routines and triggers.

use semver::Version;

use livedb_core::sql::{quote_identifier, quote_qualified, quote_string};
use livedb_core::{Column, IndexType, LiveDbOptions, parse_server_version, supports_online_ddl};

use super::script::{AlterScript, OnlineDdl};
use crate::compare::{
    CatalogChanges, ColumnChange, DefinedObject, DefinitionChange, DiffError, DiffResult,
    ForeignKeySpec, IndexSpec, Placement, SchemaChange, TableChange, TableDiff, TableOption,
    TableSpec,
};

/// Options for alter script generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Version of the target server; online DDL hints need 5.6 or later
    pub server_version: Option<Version>,
    /// `ALGORITHM=` value, `None` for the server default
    pub algorithm: Option<String>,
    /// `LOCK=` value, `None` for the server default
    pub lock: Option<String>,
    /// Write unqualified names and switch schemas with `USE`
    pub omit_schema_qualifier: bool,
}

impl DiffOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options as configured for a server reporting `server_version`
    pub fn from_options(options: &LiveDbOptions, server_version: Option<&str>) -> Self {
        Self {
            server_version: server_version.and_then(parse_server_version),
            algorithm: options.online_ddl_algorithm().map(str::to_uppercase),
            lock: options.online_ddl_lock().map(str::to_uppercase),
            omit_schema_qualifier: options.omit_schema_qualifier,
        }
    }

    pub fn with_server_version(mut self, version: Version) -> Self {
        self.server_version = Some(version);
        self
    }

    pub fn with_online_ddl(mut self, algorithm: Option<&str>, lock: Option<&str>) -> Self {
        self.algorithm = algorithm.map(str::to_uppercase);
        self.lock = lock.map(str::to_uppercase);
        self
    }

    pub fn with_omit_schema_qualifier(mut self, omit: bool) -> Self {
        self.omit_schema_qualifier = omit;
        self
    }

    /// Online DDL hints in effect for the target server
    pub fn online_ddl(&self) -> Option<OnlineDdl> {
        let supported = self.server_version.as_ref().is_some_and(supports_online_ddl);
        let hints = OnlineDdl {
            algorithm: self.algorithm.clone(),
            lock: self.lock.clone(),
        };
        (supported && !hints.is_empty()).then_some(hints)
    }
}

struct Pending {
    schema: Option<String>,
    /// Verbatim definitions carry unqualified names and need a default schema
    requires_use: bool,
    sql: String,
}

/// Generator for alter scripts from catalog changes
#[derive(Debug, Clone, Default)]
pub struct AlterScriptGenerator {
    options: DiffOptions,
}

impl AlterScriptGenerator {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    fn qualify(&self, schema: &str, name: &str) -> String {
        if self.options.omit_schema_qualifier {
            quote_identifier(name)
        } else {
            quote_qualified(Some(schema), name)
        }
    }

    /// Generates the alter script for a set of changes
    pub fn generate(&self, changes: &CatalogChanges) -> DiffResult<AlterScript> {
        let online = self.options.online_ddl();
        let online_clause = online.as_ref().map(OnlineDdl::clause).unwrap_or_default();
        let mut pending = Vec::new();

        let mut push = |schema: Option<&str>, requires_use: bool, sql: String| {
            pending.push(Pending {
                schema: schema.map(str::to_string),
                requires_use,
                sql,
            })
        };

        for change in &changes.schemas {
            push(None, false, self.schema_statement(change));
        }

        // Foreign keys go first so that columns, indexes and tables they use can change
        for change in &changes.tables {
            if let TableChange::Alter(diff) = change
                && !diff.dropped_foreign_keys.is_empty()
            {
                let clauses: Vec<String> = diff
                    .dropped_foreign_keys
                    .iter()
                    .map(|fk| format!("DROP FOREIGN KEY {}", quote_identifier(&fk.name)))
                    .collect();
                push(
                    Some(&diff.schema),
                    false,
                    format!(
                        "ALTER TABLE {} {}{}",
                        self.qualify(&diff.schema, &diff.old_name),
                        clauses.join(",\n    "),
                        online_clause
                    ),
                );
            }
        }

        for change in &changes.tables {
            if let TableChange::Drop { schema, name } = change {
                push(
                    Some(schema),
                    false,
                    format!("DROP TABLE {}", self.qualify(schema, name)),
                );
            }
        }

        for change in &changes.tables {
            if let TableChange::Create(spec) = change {
                push(Some(&spec.schema), false, self.create_table(spec)?);
            }
        }

        for change in &changes.tables {
            if let TableChange::Alter(diff) = change
                && let Some(sql) = self.alter_table(diff, &online_clause)?
            {
                push(Some(&diff.schema), false, sql);
            }
        }

        for change in &changes.tables {
            let (schema, table, foreign_keys) = match change {
                TableChange::Create(spec) => (&spec.schema, &spec.name, &spec.foreign_keys),
                TableChange::Alter(diff) => (&diff.schema, &diff.name, &diff.added_foreign_keys),
                TableChange::Drop { .. } => continue,
            };
            if foreign_keys.is_empty() {
                continue;
            }
            let clauses: Vec<String> = foreign_keys
                .iter()
                .map(|fk| format!("ADD {}", self.foreign_key_clause(schema, fk)))
                .collect();
            push(
                Some(schema),
                false,
                // No online hints: INPLACE is refused for ADD FOREIGN KEY while
                // foreign_key_checks is on
                format!(
                    "ALTER TABLE {} {}",
                    self.qualify(schema, table),
                    clauses.join(",\n    ")
                ),
            );
        }

        for change in &changes.definitions {
            match change {
                DefinitionChange::Create(object) => {
                    push(Some(&object.schema), true, verbatim(object));
                }
                DefinitionChange::Drop(object) => {
                    push(Some(&object.schema), false, self.drop_definition(object));
                }
                DefinitionChange::Replace { old, new } => {
                    push(Some(&old.schema), false, self.drop_definition(old));
                    push(Some(&new.schema), true, verbatim(new));
                }
            }
        }

        let script = self.finish(pending, online);
        tracing::debug!(
            statement_count = script.len(),
            noop = script.is_noop(),
            "generated alter script"
        );
        Ok(script)
    }

    fn finish(&self, pending: Vec<Pending>, online: Option<OnlineDdl>) -> AlterScript {
        let mut script = AlterScript {
            statements: Vec::with_capacity(pending.len()),
            online_ddl: online,
        };
        let mut current: Option<String> = None;

        for statement in pending {
            if (self.options.omit_schema_qualifier || statement.requires_use)
                && let Some(schema) = statement.schema
                && current.as_deref() != Some(schema.as_str())
            {
                script.push(format!("USE {}", quote_identifier(&schema)));
                current = Some(schema);
            }
            script.push(statement.sql);
        }
        script
    }

    // ========== Schemas ==========

    fn schema_statement(&self, change: &SchemaChange) -> String {
        match change {
            SchemaChange::Create {
                name,
                charset,
                collation,
            } => {
                let mut sql = format!("CREATE SCHEMA {}", quote_identifier(name));
                if let Some(charset) = charset {
                    sql.push_str(&format!(" DEFAULT CHARACTER SET {}", charset));
                }
                if let Some(collation) = collation {
                    sql.push_str(&format!(" COLLATE {}", collation));
                }
                sql
            }
            SchemaChange::Drop { name } => format!("DROP SCHEMA {}", quote_identifier(name)),
            SchemaChange::Alter {
                name,
                charset,
                collation,
            } => {
                let mut sql = format!("ALTER SCHEMA {}", quote_identifier(name));
                if let Some(charset) = charset {
                    sql.push_str(&format!(" DEFAULT CHARACTER SET {}", charset));
                }
                if let Some(collation) = collation {
                    sql.push_str(&format!(" DEFAULT COLLATE {}", collation));
                }
                sql
            }
        }
    }

    // ========== Tables ==========

    fn create_table(&self, spec: &TableSpec) -> DiffResult<String> {
        let mut lines = Vec::with_capacity(spec.columns.len() + spec.indexes.len());
        for column in &spec.columns {
            lines.push(column_definition(&spec.name, column)?);
        }
        for index in &spec.indexes {
            lines.push(index_definition(index));
        }

        let mut sql = format!(
            "CREATE TABLE {} (\n  {})",
            self.qualify(&spec.schema, &spec.name),
            lines.join(",\n  ")
        );
        if let Some(engine) = &spec.engine {
            sql.push_str(&format!("\nENGINE = {}", engine));
        }
        if let Some(charset) = &spec.charset {
            sql.push_str(&format!("\nDEFAULT CHARACTER SET = {}", charset));
        }
        if let Some(collation) = &spec.collation {
            sql.push_str(&format!("\nCOLLATE = {}", collation));
        }
        if !spec.comment.is_empty() {
            sql.push_str(&format!("\nCOMMENT = {}", quote_string(&spec.comment)));
        }
        Ok(sql)
    }

    fn alter_table(&self, diff: &TableDiff, online_clause: &str) -> DiffResult<Option<String>> {
        let mut clauses = Vec::new();

        if diff.is_renamed() {
            clauses.push(format!(
                "RENAME TO {}",
                self.qualify(&diff.schema, &diff.name)
            ));
        }

        for index in &diff.dropped_indexes {
            clauses.push(match index.index_type {
                IndexType::Primary => "DROP PRIMARY KEY".to_string(),
                _ => format!("DROP INDEX {}", quote_identifier(&index.name)),
            });
        }

        let mut drops = Vec::new();
        for change in &diff.columns {
            match change {
                ColumnChange::Add { column, placement } => clauses.push(format!(
                    "ADD COLUMN {} {}",
                    column_definition(&diff.name, column)?,
                    placement_clause(placement)
                )),
                ColumnChange::Change {
                    old_name,
                    column,
                    placement,
                } => {
                    let mut clause = format!(
                        "CHANGE COLUMN {} {}",
                        quote_identifier(old_name),
                        column_definition(&diff.name, column)?
                    );
                    if let Some(placement) = placement {
                        clause.push(' ');
                        clause.push_str(&placement_clause(placement));
                    }
                    clauses.push(clause);
                }
                ColumnChange::Drop { name } => {
                    drops.push(format!("DROP COLUMN {}", quote_identifier(name)));
                }
            }
        }
        clauses.extend(drops);

        for index in &diff.added_indexes {
            clauses.push(format!("ADD {}", index_definition(index)));
        }

        for option in &diff.options {
            clauses.push(match option {
                TableOption::Engine(engine) => format!("ENGINE = {}", engine),
                TableOption::Charset(charset) => format!("DEFAULT CHARACTER SET = {}", charset),
                TableOption::Collation(collation) => format!("COLLATE = {}", collation),
                TableOption::Comment(comment) => format!("COMMENT = {}", quote_string(comment)),
            });
        }

        if clauses.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "ALTER TABLE {}\n    {}{}",
            self.qualify(&diff.schema, &diff.old_name),
            clauses.join(",\n    "),
            online_clause
        )))
    }

    fn foreign_key_clause(&self, schema: &str, fk: &ForeignKeySpec) -> String {
        let referenced = if self.options.omit_schema_qualifier && fk.referenced_schema == schema {
            quote_identifier(&fk.referenced_table)
        } else {
            quote_qualified(Some(&fk.referenced_schema), &fk.referenced_table)
        };
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            quote_identifier(&fk.name),
            identifier_list(&fk.columns),
            referenced,
            identifier_list(&fk.referenced_columns),
            fk.delete_rule.as_sql(),
            fk.update_rule.as_sql()
        )
    }

    // ========== Views, Routines, Triggers ==========

    fn drop_definition(&self, object: &DefinedObject) -> String {
        format!(
            "DROP {} IF EXISTS {}",
            object.object_type.sql_keyword(),
            self.qualify(&object.schema, &object.name)
        )
    }
}

/// Column definition as written in CREATE TABLE and ALTER TABLE
pub fn column_definition(table: &str, column: &Column) -> DiffResult<String> {
    if column.datatype.is_none() {
        return Err(DiffError::MissingDatatype {
            table: table.to_string(),
            column: column.name.clone(),
        });
    }

    let mut sql = format!(
        "{} {}",
        quote_identifier(&column.name),
        column.formatted_type()
    );
    if let Some(charset) = &column.charset {
        sql.push_str(&format!(" CHARACTER SET {}", charset));
    }
    if let Some(collation) = &column.collation {
        sql.push_str(&format!(" COLLATE {}", collation));
    }
    if column.is_not_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default_value
        && !(column.is_not_null && column.default_is_null())
    {
        sql.push_str(" DEFAULT ");
        sql.push_str(default.trim());
    }
    if column.auto_increment {
        sql.push_str(" AUTO_INCREMENT");
    }
    if !column.comment.is_empty() {
        sql.push_str(&format!(" COMMENT {}", quote_string(&column.comment)));
    }
    Ok(sql)
}

fn index_definition(index: &IndexSpec) -> String {
    let columns: Vec<String> = index
        .columns
        .iter()
        .map(|c| {
            let mut text = quote_identifier(&c.name);
            if let Some(length) = c.length {
                text.push_str(&format!("({})", length));
            }
            if c.descending {
                text.push_str(" DESC");
            }
            text
        })
        .collect();
    let columns = columns.join(", ");

    let mut sql = match index.index_type {
        IndexType::Primary => format!("PRIMARY KEY ({})", columns),
        IndexType::Unique => format!("UNIQUE INDEX {} ({})", quote_identifier(&index.name), columns),
        IndexType::Index => format!("INDEX {} ({})", quote_identifier(&index.name), columns),
        IndexType::Fulltext => {
            format!("FULLTEXT INDEX {} ({})", quote_identifier(&index.name), columns)
        }
        IndexType::Spatial => {
            format!("SPATIAL INDEX {} ({})", quote_identifier(&index.name), columns)
        }
    };
    if !index.comment.is_empty() {
        sql.push_str(&format!(" COMMENT {}", quote_string(&index.comment)));
    }
    if !index.visible {
        sql.push_str(" INVISIBLE");
    }
    sql
}

fn placement_clause(placement: &Placement) -> String {
    match placement {
        Placement::First => "FIRST".to_string(),
        Placement::After(column) => format!("AFTER {}", quote_identifier(column)),
    }
}

fn identifier_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn verbatim(object: &DefinedObject) -> String {
    object
        .definition
        .trim()
        .trim_end_matches(';')
        .trim_end()
        .to_string()
}
