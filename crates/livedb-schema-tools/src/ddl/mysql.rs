//! MySQL DDL parser
//!
//! Tables and schemas are parsed into catalog objects. Views, routines and
//! triggers are recognized by their header and stored with the statement
//! text verbatim, since the diff engine only ever replaces them whole.

use sqlparser::tokenizer::Token;

use livedb_core::{
    Catalog, Column, DdlParser, ForeignKey, Index, IndexColumn, LiveObjectType, ObjectId,
    ParseIssue, ParseOutcome, ParsedObject, Result, Routine, RoutineType, Schema, SqlMode, Table,
    TableRef, Trigger, TypeSpec, View,
};

use super::column_type::resolve_column_type;
use super::table::{ParsedForeignKey, ParsedTable, parse_create_table};
use super::tokens::{Cursor, SyntaxError, SyntaxResult, split_statements, tokenize};

const OBJECT_KEYWORDS: &[&str] = &[
    "VIEW",
    "PROCEDURE",
    "FUNCTION",
    "AGGREGATE",
    "TRIGGER",
    "EVENT",
    "SQL",
];

/// DDL parser for MySQL `CREATE` statements
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDdlParser;

impl MySqlDdlParser {
    pub fn new() -> Self {
        Self
    }
}

impl DdlParser for MySqlDdlParser {
    fn parse_into_catalog(
        &self,
        catalog: &mut Catalog,
        sql: &str,
        target_schema: &str,
        mode: &SqlMode,
    ) -> ParseOutcome {
        let tokens = match tokenize(sql, mode) {
            Ok(tokens) => tokens,
            Err(e) => return ParseOutcome::failed(e.message),
        };

        let mut outcome = ParseOutcome::default();
        match definition_header(&tokens) {
            Ok(Some(header)) => {
                let object = apply_definition(catalog, header, verbatim(sql), target_schema);
                outcome.objects.push(object);
            }
            Ok(None) => {
                let mut current_schema = target_schema.to_string();
                for statement in split_statements(tokens) {
                    match apply_statement(catalog, &statement, &mut current_schema) {
                        Ok(Applied::Object(object, warnings)) => {
                            outcome.objects.push(object);
                            outcome.issues.extend(warnings.into_iter().map(warning));
                        }
                        Ok(Applied::Nothing) => {}
                        Err(e) => {
                            outcome.error_count += 1;
                            outcome.issues.push(warning(e.message));
                        }
                    }
                }
            }
            Err(e) => {
                outcome.error_count += 1;
                outcome.issues.push(warning(e.message));
            }
        }

        tracing::debug!(
            target_schema,
            ansi_quotes = mode.ansi_quotes(),
            objects = outcome.objects.len(),
            errors = outcome.error_count,
            "parsed DDL into catalog"
        );
        outcome
    }

    fn parse_column_type(&self, catalog: &Catalog, text: &str) -> Result<TypeSpec> {
        resolve_column_type(catalog, text)
    }
}

fn warning(message: String) -> ParseIssue {
    ParseIssue {
        message,
        line: None,
        column: None,
    }
}

fn verbatim(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim_end().to_string()
}

// ========== Views, Routines, Triggers ==========

struct DefinitionHeader {
    object_type: LiveObjectType,
    schema: Option<String>,
    name: String,
    trigger: Option<TriggerTarget>,
}

struct TriggerTarget {
    timing: String,
    event: String,
    schema: Option<String>,
    table: String,
}

/// Header of a `CREATE VIEW/PROCEDURE/FUNCTION/TRIGGER` statement, if it is one
fn definition_header(tokens: &[Token]) -> SyntaxResult<Option<DefinitionHeader>> {
    let mut cursor = Cursor::new(tokens);
    if !cursor.eat_keyword("CREATE") {
        return Ok(None);
    }
    cursor.eat_keywords(&["OR", "REPLACE"]);
    loop {
        if cursor.eat_keyword("ALGORITHM") {
            cursor.eat_equals();
            cursor.option_value()?;
        } else if cursor.eat_keyword("DEFINER") {
            cursor.eat_equals();
            while !cursor.is_done() && !cursor.peek_any_keyword(OBJECT_KEYWORDS) {
                cursor.advance();
            }
        } else if cursor.eat_keywords(&["SQL", "SECURITY"]) {
            cursor.identifier()?;
        } else {
            break;
        }
    }

    let object_type = if cursor.eat_keyword("VIEW") {
        LiveObjectType::View
    } else if cursor.eat_keyword("PROCEDURE") {
        LiveObjectType::Procedure
    } else if cursor.eat_keyword("FUNCTION") || cursor.eat_keywords(&["AGGREGATE", "FUNCTION"]) {
        LiveObjectType::Function
    } else if cursor.eat_keyword("TRIGGER") {
        LiveObjectType::Trigger
    } else {
        return Ok(None);
    };

    cursor.eat_keywords(&["IF", "NOT", "EXISTS"]);
    let (schema, name) = cursor.qualified_name()?;

    let trigger = if object_type == LiveObjectType::Trigger {
        let timing = cursor
            .eat_one_of(&["BEFORE", "AFTER"])
            .ok_or_else(|| cursor.unexpected("BEFORE or AFTER"))?;
        let event = cursor
            .eat_one_of(&["INSERT", "UPDATE", "DELETE"])
            .ok_or_else(|| cursor.unexpected("INSERT, UPDATE or DELETE"))?;
        cursor.expect_keyword("ON")?;
        let (table_schema, table) = cursor.qualified_name()?;
        Some(TriggerTarget {
            timing,
            event,
            schema: table_schema,
            table,
        })
    } else {
        None
    };

    Ok(Some(DefinitionHeader {
        object_type,
        schema,
        name,
        trigger,
    }))
}

fn apply_definition(
    catalog: &mut Catalog,
    header: DefinitionHeader,
    definition: String,
    target_schema: &str,
) -> ParsedObject {
    let schema_name = header.schema.unwrap_or_else(|| target_schema.to_string());
    let name = header.name;

    match header.object_type {
        LiveObjectType::View => {
            let schema = catalog.ensure_schema(&schema_name);
            match schema.views.iter_mut().find(|v| v.name == name) {
                Some(view) => view.definition = definition,
                None => schema.views.push(View::new(name.clone(), definition)),
            }
        }
        LiveObjectType::Procedure | LiveObjectType::Function => {
            let routine_type = if header.object_type == LiveObjectType::Procedure {
                RoutineType::Procedure
            } else {
                RoutineType::Function
            };
            let schema = catalog.ensure_schema(&schema_name);
            match schema
                .routines
                .iter_mut()
                .find(|r| r.name == name && r.routine_type == routine_type)
            {
                Some(routine) => routine.definition = definition,
                None => schema
                    .routines
                    .push(Routine::new(name.clone(), routine_type, definition)),
            }
        }
        LiveObjectType::Trigger => {
            if let Some(target) = header.trigger {
                let table_schema = target.schema.unwrap_or_else(|| schema_name.clone());
                let table = table_or_stub(catalog, &table_schema, &target.table);
                let trigger = match table.triggers.iter().position(|t| t.name == name) {
                    Some(position) => &mut table.triggers[position],
                    None => {
                        table.triggers.push(Trigger::new(name.clone()));
                        let last = table.triggers.len() - 1;
                        &mut table.triggers[last]
                    }
                };
                trigger.timing = target.timing;
                trigger.event = target.event;
                trigger.definition = definition;
            }
        }
        LiveObjectType::Schema | LiveObjectType::Table => {}
    }

    ParsedObject {
        object_type: header.object_type,
        schema: schema_name,
        name,
    }
}

/// A table by name, adding a stub when it is not in the catalog
fn table_or_stub<'a>(catalog: &'a mut Catalog, schema: &str, name: &str) -> &'a mut Table {
    let schema = catalog.ensure_schema(schema);
    let position = match schema.tables.iter().position(|t| t.name == name) {
        Some(position) => position,
        None => {
            schema.tables.push(Table::stub(name));
            schema.tables.len() - 1
        }
    };
    &mut schema.tables[position]
}

// ========== Tables, Schemas ==========

enum Applied {
    Object(ParsedObject, Vec<String>),
    Nothing,
}

fn apply_statement(
    catalog: &mut Catalog,
    tokens: &[Token],
    current_schema: &mut String,
) -> SyntaxResult<Applied> {
    let mut cursor = Cursor::new(tokens);

    if cursor.eat_keyword("USE") {
        *current_schema = cursor.identifier()?;
        return Ok(Applied::Nothing);
    }
    if cursor.eat_keyword("SET") {
        return Ok(Applied::Nothing);
    }

    cursor.expect_keyword("CREATE")?;
    if cursor.eat_one_of(&["SCHEMA", "DATABASE"]).is_some() {
        let object = apply_schema(catalog, &mut cursor)?;
        return Ok(Applied::Object(object, Vec::new()));
    }

    cursor.eat_keyword("TEMPORARY");
    if cursor.eat_keyword("TABLE") {
        let parsed = parse_create_table(&mut cursor)?;
        let (object, warnings) = apply_table(catalog, parsed, current_schema)?;
        return Ok(Applied::Object(object, warnings));
    }

    Err(SyntaxError::new(format!(
        "unsupported statement '{}'",
        super::tokens::render(&tokens[..tokens.len().min(3)])
    )))
}

fn apply_schema(catalog: &mut Catalog, cursor: &mut Cursor<'_>) -> SyntaxResult<ParsedObject> {
    cursor.eat_keywords(&["IF", "NOT", "EXISTS"]);
    let name = cursor.identifier()?;
    let mut charset = None;
    let mut collation = None;
    while !cursor.is_done() {
        cursor.eat_keyword("DEFAULT");
        if cursor.eat_keywords(&["CHARACTER", "SET"]) || cursor.eat_keyword("CHARSET") {
            cursor.eat_equals();
            charset = Some(cursor.option_value()?);
        } else if cursor.eat_keyword("COLLATE") {
            cursor.eat_equals();
            collation = Some(cursor.option_value()?);
        } else {
            cursor.skip_item()?;
        }
    }

    let schema = match catalog.schemata.iter().position(|s| s.name == name) {
        Some(position) => &mut catalog.schemata[position],
        None => {
            catalog.schemata.push(Schema::new(name.clone()));
            let last = catalog.schemata.len() - 1;
            &mut catalog.schemata[last]
        }
    };
    schema.is_stub = false;
    schema.default_charset = charset;
    schema.default_collation = collation;

    Ok(ParsedObject {
        object_type: LiveObjectType::Schema,
        schema: name.clone(),
        name,
    })
}

/// Build the table, then replace the catalog's table of the same name in place.
///
/// Columns, indexes and foreign keys keep the id of their same-named
/// predecessor. Nothing in the catalog changes when the statement fails.
fn apply_table(
    catalog: &mut Catalog,
    parsed: ParsedTable,
    target_schema: &str,
) -> SyntaxResult<(ParsedObject, Vec<String>)> {
    let schema_name = parsed
        .schema
        .clone()
        .unwrap_or_else(|| target_schema.to_string());
    let previous = catalog.table(&schema_name, &parsed.name).cloned();

    let mut table = Table::new(parsed.name.clone());
    if let Some(previous) = &previous {
        table.id = previous.id;
        table.old_name = previous.old_name.clone();
        table.triggers = previous.triggers.clone();
        table.is_stub_expanded = previous.is_stub || previous.is_stub_expanded;
    }
    table.engine = parsed.engine;
    table.default_charset = parsed.charset;
    table.default_collation = parsed.collation;
    table.comment = parsed.comment;

    for parsed_column in parsed.columns {
        let spec = resolve_column_type(catalog, &parsed_column.type_text).map_err(|e| {
            SyntaxError::new(format!("column '{}': {}", parsed_column.name, e))
        })?;
        let mut column = Column::new(parsed_column.name.clone());
        if let Some(old) = previous
            .as_ref()
            .and_then(|p| p.column_by_name(&parsed_column.name))
        {
            column.id = old.id;
            column.old_name = old.old_name.clone();
        }
        column.datatype = Some(spec.datatype);
        column.flags = spec.flags;
        column.is_not_null = parsed_column.not_null;
        column.default_value = parsed_column.default_value;
        column.auto_increment = parsed_column.auto_increment;
        column.charset = parsed_column.charset;
        column.collation = parsed_column.collation;
        column.comment = parsed_column.comment;
        table.columns.push(column);
    }

    for parsed_index in parsed.indexes {
        let mut index = Index::new(parsed_index.name.clone(), parsed_index.index_type);
        if let Some(old) = previous
            .as_ref()
            .and_then(|p| p.index_by_name(&parsed_index.name))
        {
            index.id = old.id;
            index.old_name = old.old_name.clone();
        }
        for part in parsed_index.columns {
            let column = column_id(&table, &part.name, "index", &parsed_index.name)?;
            index.columns.push(IndexColumn {
                column,
                length: part.length,
                descending: part.descending,
            });
        }
        index.comment = parsed_index.comment;
        index.visible = parsed_index.visible;
        if index.is_primary() {
            for part in &index.columns {
                if let Some(column) = table.columns.iter_mut().find(|c| c.id == part.column) {
                    column.is_not_null = true;
                }
            }
        }
        table.indices.push(index);
    }

    let mut pending = Vec::with_capacity(parsed.foreign_keys.len());
    for parsed_fk in parsed.foreign_keys {
        let columns = parsed_fk
            .columns
            .iter()
            .map(|c| column_id(&table, c, "foreign key", &parsed_fk.name))
            .collect::<SyntaxResult<Vec<_>>>()?;
        pending.push((parsed_fk, columns));
    }

    let mut warnings = Vec::new();
    for (parsed_fk, columns) in pending {
        if let Some(fk) = build_foreign_key(
            catalog,
            &table,
            &schema_name,
            parsed_fk,
            columns,
            previous.as_ref(),
            &mut warnings,
        ) {
            table.foreign_keys.push(fk);
        }
    }

    let object = ParsedObject {
        object_type: LiveObjectType::Table,
        schema: schema_name.clone(),
        name: table.name.clone(),
    };
    let schema = catalog.ensure_schema(&schema_name);
    match schema.tables.iter_mut().find(|t| t.id == table.id) {
        Some(existing) => *existing = table,
        None => schema.tables.push(table),
    }
    Ok((object, warnings))
}

fn column_id(table: &Table, name: &str, owner_kind: &str, owner: &str) -> SyntaxResult<ObjectId> {
    table.column_by_name(name).map(|c| c.id).ok_or_else(|| {
        SyntaxError::new(format!(
            "{} '{}' references unknown column '{}'",
            owner_kind, owner, name
        ))
    })
}

fn build_foreign_key(
    catalog: &mut Catalog,
    table: &Table,
    schema_name: &str,
    parsed: ParsedForeignKey,
    columns: Vec<ObjectId>,
    previous: Option<&Table>,
    warnings: &mut Vec<String>,
) -> Option<ForeignKey> {
    let referenced_schema = parsed
        .referenced_schema
        .clone()
        .unwrap_or_else(|| schema_name.to_string());

    let self_reference = referenced_schema == schema_name && parsed.referenced_table == table.name;
    let (referenced_table, referenced_columns) = if self_reference {
        let ids = parsed
            .referenced_columns
            .iter()
            .map(|c| table.column_by_name(c).map(|col| col.id))
            .collect::<Option<Vec<_>>>();
        let table_ref = TableRef {
            id: table.id,
            schema: schema_name.to_string(),
            name: table.name.clone(),
        };
        (table_ref, ids)
    } else {
        let target = table_or_stub(catalog, &referenced_schema, &parsed.referenced_table);
        let mut ids = Some(Vec::with_capacity(parsed.referenced_columns.len()));
        for name in &parsed.referenced_columns {
            let id = match target.column_by_name(name) {
                Some(column) => Some(column.id),
                None if target.is_stub => {
                    let column = Column::new(name.clone());
                    let id = column.id;
                    target.columns.push(column);
                    Some(id)
                }
                None => None,
            };
            ids = ids.zip(id).map(|(mut ids, id)| {
                ids.push(id);
                ids
            });
        }
        let table_ref = TableRef {
            id: target.id,
            schema: referenced_schema.clone(),
            name: target.name.clone(),
        };
        (table_ref, ids)
    };

    let Some(referenced_columns) = referenced_columns else {
        warnings.push(format!(
            "foreign key '{}' references columns missing from {}.{}",
            parsed.name, referenced_table.schema, referenced_table.name
        ));
        return None;
    };

    let mut fk = ForeignKey::new(parsed.name.clone());
    if let Some(old) = previous.and_then(|p| p.foreign_key_by_name(&parsed.name)) {
        fk.id = old.id;
        fk.old_name = old.old_name.clone();
    }
    fk.index = table
        .indices
        .iter()
        .find(|i| {
            i.columns.len() >= columns.len()
                && i.columns.iter().zip(&columns).all(|(ic, c)| ic.column == *c)
        })
        .map(|i| i.id);
    fk.mandatory = columns
        .iter()
        .all(|c| table.column(*c).is_some_and(|col| col.is_not_null));
    fk.columns = columns;
    fk.referenced_table = Some(referenced_table);
    fk.referenced_columns = referenced_columns;
    fk.update_rule = parsed.update_rule;
    fk.delete_rule = parsed.delete_rule;
    Some(fk)
}
