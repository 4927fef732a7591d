//! Catalog comparator
//!
//! Walks a server snapshot and a client snapshot in parallel, pairing
//! objects by id first and by name second, and records every difference
//! as a [`CatalogChanges`] value.

use std::cmp::max;
use std::collections::{HashMap, HashSet};

use thiserror::Error;
use livedb_core::{
    Catalog, Column, ForeignKey, Index, LiveObjectType, ObjectId, Routine, RoutineType, Schema,
    Table, Trigger, View,
};

use super::diff::{
    CatalogChanges, ColumnChange, DefinedObject, DefinitionChange, ForeignKeySpec,
    IndexColumnSpec, IndexSpec, Placement, SchemaChange, TableChange, TableDiff, TableOption,
    TableSpec,
};

/// Errors that can occur while diffing catalogs
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    /// A foreign key points at a table or column missing from the catalog
    #[error("foreign key '{foreign_key}' of table '{table}' references an object that is not in the catalog")]
    UnresolvedReference { table: String, foreign_key: String },
    /// A column cannot be written without a type
    #[error("column '{table}.{column}' has no datatype")]
    MissingDatatype { table: String, column: String },
    /// MySQL has no statement for renaming a schema
    #[error("renaming schema '{old_name}' to '{name}' is not supported")]
    SchemaRename { old_name: String, name: String },
}

/// Result type for diff operations
pub type DiffResult<T> = Result<T, DiffError>;

/// Configuration for catalog comparison
#[derive(Debug, Clone, Default)]
pub struct CompareConfig {
    /// Match object names case-insensitively (`lower_case_table_names != 0`)
    pub case_insensitive_names: bool,
}

impl CompareConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case_insensitive_names(mut self, enabled: bool) -> Self {
        self.case_insensitive_names = enabled;
        self
    }
}

/// Identity of a catalog object for pairing
pub(crate) trait CatalogObject {
    fn object_id(&self) -> ObjectId;
    fn object_name(&self) -> &str;
    fn previous_name(&self) -> &str;
}

macro_rules! impl_catalog_object {
    ($($ty:ty),*) => {
        $(
            impl CatalogObject for $ty {
                fn object_id(&self) -> ObjectId {
                    self.id
                }
                fn object_name(&self) -> &str {
                    &self.name
                }
                fn previous_name(&self) -> &str {
                    &self.old_name
                }
            }
        )*
    };
}

impl_catalog_object!(Schema, Table, Column, Index, ForeignKey, Trigger, View, Routine);

struct Pairing<'a, T> {
    /// (server, client), in client order
    matched: Vec<(&'a T, &'a T)>,
    added: Vec<&'a T>,
    removed: Vec<&'a T>,
}

/// Compares a server catalog against a client catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogComparator {
    config: CompareConfig,
}

impl CatalogComparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CompareConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompareConfig {
        &self.config
    }

    fn names_equal(&self, a: &str, b: &str) -> bool {
        if self.config.case_insensitive_names {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    /// Compare two catalogs; the result transforms `server` into `client`
    pub fn compare(&self, server: &Catalog, client: &Catalog) -> DiffResult<CatalogChanges> {
        let mut changes = CatalogChanges::new();
        let mut views = Vec::new();
        let mut routines = Vec::new();
        let mut triggers = Vec::new();

        let schemas = self.pair(
            server.schemata.iter().filter(|s| !s.is_stub).collect(),
            client.schemata.iter().filter(|s| !s.is_stub).collect(),
        );

        for schema in schemas.removed {
            changes.schemas.push(SchemaChange::Drop {
                name: schema.name.clone(),
            });
        }

        for schema in schemas.added {
            changes.schemas.push(SchemaChange::Create {
                name: schema.name.clone(),
                charset: schema.default_charset.clone(),
                collation: schema.default_collation.clone(),
            });
            for table in schema.tables.iter().filter(|t| !t.is_stub) {
                changes
                    .tables
                    .push(TableChange::Create(self.table_spec(client, &schema.name, table)?));
                triggers.extend(
                    table
                        .triggers
                        .iter()
                        .map(|t| DefinitionChange::Create(defined_trigger(&schema.name, t))),
                );
            }
            views.extend(
                schema
                    .views
                    .iter()
                    .map(|v| DefinitionChange::Create(defined_view(&schema.name, v))),
            );
            routines.extend(
                schema
                    .routines
                    .iter()
                    .map(|r| DefinitionChange::Create(defined_routine(&schema.name, r))),
            );
        }

        for (server_schema, client_schema) in schemas.matched {
            if server_schema.name != client_schema.name {
                return Err(DiffError::SchemaRename {
                    old_name: server_schema.name.clone(),
                    name: client_schema.name.clone(),
                });
            }
            if server_schema.default_charset != client_schema.default_charset
                || server_schema.default_collation != client_schema.default_collation
            {
                changes.schemas.push(SchemaChange::Alter {
                    name: client_schema.name.clone(),
                    charset: client_schema.default_charset.clone(),
                    collation: client_schema.default_collation.clone(),
                });
            }

            self.compare_tables(
                server,
                client,
                server_schema,
                client_schema,
                &mut changes,
                &mut triggers,
            )?;
            views.extend(self.compare_definitions(
                &client_schema.name,
                server_schema.views.iter().collect(),
                client_schema.views.iter().collect(),
                defined_view,
            ));
            for routine_type in [RoutineType::Procedure, RoutineType::Function] {
                routines.extend(self.compare_definitions(
                    &client_schema.name,
                    server_schema
                        .routines
                        .iter()
                        .filter(|r| r.routine_type == routine_type)
                        .collect(),
                    client_schema
                        .routines
                        .iter()
                        .filter(|r| r.routine_type == routine_type)
                        .collect(),
                    defined_routine,
                ));
            }
        }

        changes.definitions.extend(views);
        changes.definitions.extend(routines);
        changes.definitions.extend(triggers);

        tracing::debug!(
            schema_changes = changes.schemas.len(),
            table_changes = changes.tables.len(),
            definition_changes = changes.definitions.len(),
            "compared catalogs"
        );
        Ok(changes)
    }

    fn compare_tables(
        &self,
        server: &Catalog,
        client: &Catalog,
        server_schema: &Schema,
        client_schema: &Schema,
        changes: &mut CatalogChanges,
        triggers: &mut Vec<DefinitionChange>,
    ) -> DiffResult<()> {
        let schema_name = client_schema.name.as_str();
        let tables = self.pair(
            server_schema.tables.iter().filter(|t| !t.is_stub).collect(),
            client_schema.tables.iter().filter(|t| !t.is_stub).collect(),
        );

        for table in tables.removed {
            changes.tables.push(TableChange::Drop {
                schema: schema_name.to_string(),
                name: table.name.clone(),
            });
        }

        for table in tables.added {
            changes
                .tables
                .push(TableChange::Create(self.table_spec(client, schema_name, table)?));
            triggers.extend(
                table
                    .triggers
                    .iter()
                    .map(|t| DefinitionChange::Create(defined_trigger(schema_name, t))),
            );
        }

        for (server_table, client_table) in tables.matched {
            let diff = self.diff_table(server, client, schema_name, server_table, client_table)?;
            if !diff.is_empty() {
                changes.tables.push(TableChange::Alter(diff));
            }
            triggers.extend(self.compare_definitions(
                schema_name,
                server_table.triggers.iter().collect(),
                client_table.triggers.iter().collect(),
                defined_trigger,
            ));
        }
        Ok(())
    }

    fn compare_definitions<'a, T: CatalogObject>(
        &self,
        schema: &str,
        server: Vec<&'a T>,
        client: Vec<&'a T>,
        define: fn(&str, &T) -> DefinedObject,
    ) -> Vec<DefinitionChange> {
        let pairing = self.pair(server, client);
        let mut changes = Vec::new();

        for object in pairing.removed {
            changes.push(DefinitionChange::Drop(define(schema, object)));
        }
        for (server_object, client_object) in pairing.matched {
            let old = define(schema, server_object);
            let new = define(schema, client_object);
            if old.name != new.name || old.definition.trim() != new.definition.trim() {
                changes.push(DefinitionChange::Replace { old, new });
            }
        }
        for object in pairing.added {
            changes.push(DefinitionChange::Create(define(schema, object)));
        }
        changes
    }

    // ========== Tables ==========

    fn diff_table(
        &self,
        server: &Catalog,
        client: &Catalog,
        schema: &str,
        server_table: &Table,
        client_table: &Table,
    ) -> DiffResult<TableDiff> {
        let mut diff = TableDiff::new(schema, &server_table.name, &client_table.name);

        self.diff_columns(server_table, client_table, &mut diff);

        let indexes = self.pair(
            server_table.indices.iter().collect(),
            client_table.indices.iter().collect(),
        );
        for index in indexes.removed {
            diff.dropped_indexes.push(index_spec(server_table, index));
        }
        for (server_index, client_index) in indexes.matched {
            let old = index_spec(server_table, server_index);
            let new = index_spec(client_table, client_index);
            if old != new {
                diff.dropped_indexes.push(old);
                diff.added_indexes.push(new);
            }
        }
        for index in indexes.added {
            diff.added_indexes.push(index_spec(client_table, index));
        }

        let foreign_keys = self.pair(
            server_table.foreign_keys.iter().collect(),
            client_table.foreign_keys.iter().collect(),
        );
        for fk in foreign_keys.removed {
            if let Some(spec) = foreign_key_spec(server, schema, server_table, fk)? {
                diff.dropped_foreign_keys.push(spec);
            }
        }
        for (server_fk, client_fk) in foreign_keys.matched {
            let old = foreign_key_spec(server, schema, server_table, server_fk)?;
            let new = foreign_key_spec(client, schema, client_table, client_fk)?;
            if old != new {
                diff.dropped_foreign_keys.extend(old);
                diff.added_foreign_keys.extend(new);
            }
        }
        for fk in foreign_keys.added {
            if let Some(spec) = foreign_key_spec(client, schema, client_table, fk)? {
                diff.added_foreign_keys.push(spec);
            }
        }

        if client_table.engine.is_some() && server_table.engine != client_table.engine {
            diff.options
                .push(TableOption::Engine(client_table.engine.clone().unwrap_or_default()));
        }
        if client_table.default_charset.is_some()
            && server_table.default_charset != client_table.default_charset
        {
            diff.options.push(TableOption::Charset(
                client_table.default_charset.clone().unwrap_or_default(),
            ));
        }
        if client_table.default_collation.is_some()
            && server_table.default_collation != client_table.default_collation
        {
            diff.options.push(TableOption::Collation(
                client_table.default_collation.clone().unwrap_or_default(),
            ));
        }
        if server_table.comment != client_table.comment {
            diff.options
                .push(TableOption::Comment(client_table.comment.clone()));
        }

        Ok(diff)
    }

    fn diff_columns(&self, server_table: &Table, client_table: &Table, diff: &mut TableDiff) {
        let columns = self.pair(
            server_table.columns.iter().collect(),
            client_table.columns.iter().collect(),
        );

        let partners: HashMap<ObjectId, &Column> = columns
            .matched
            .iter()
            .map(|(server, client)| (client.id, *server))
            .collect();

        let client_order: Vec<ObjectId> = columns.matched.iter().map(|(s, _)| s.id).collect();
        let matched_ids: HashSet<ObjectId> = client_order.iter().copied().collect();
        let server_order: Vec<ObjectId> = server_table
            .columns
            .iter()
            .map(|c| c.id)
            .filter(|id| matched_ids.contains(id))
            .collect();
        let in_place = longest_common_subsequence(&server_order, &client_order);

        for (position, column) in client_table.columns.iter().enumerate() {
            let placement = match position {
                0 => Placement::First,
                _ => Placement::After(client_table.columns[position - 1].name.clone()),
            };

            match partners.get(&column.id) {
                None => diff.columns.push(ColumnChange::Add {
                    column: column.clone(),
                    placement,
                }),
                Some(server_column) => {
                    let moved = !in_place.contains(&server_column.id);
                    if moved || column_changed(server_column, column) {
                        diff.columns.push(ColumnChange::Change {
                            old_name: server_column.name.clone(),
                            column: column.clone(),
                            placement: moved.then_some(placement),
                        });
                    }
                }
            }
        }

        for column in columns.removed {
            diff.columns.push(ColumnChange::Drop {
                name: column.name.clone(),
            });
        }
    }

    fn table_spec(&self, catalog: &Catalog, schema: &str, table: &Table) -> DiffResult<TableSpec> {
        let mut foreign_keys = Vec::new();
        for fk in &table.foreign_keys {
            foreign_keys.extend(foreign_key_spec(catalog, schema, table, fk)?);
        }
        Ok(TableSpec {
            schema: schema.to_string(),
            name: table.name.clone(),
            columns: table.columns.clone(),
            indexes: table.indices.iter().map(|i| index_spec(table, i)).collect(),
            foreign_keys,
            engine: table.engine.clone(),
            charset: table.default_charset.clone(),
            collation: table.default_collation.clone(),
            comment: table.comment.clone(),
        })
    }

    // ========== Pairing ==========

    fn pair<'a, T: CatalogObject>(&self, server: Vec<&'a T>, client: Vec<&'a T>) -> Pairing<'a, T> {
        let mut used = vec![false; server.len()];
        let mut partner: Vec<Option<usize>> = vec![None; client.len()];

        for (ci, object) in client.iter().enumerate() {
            partner[ci] = (0..server.len())
                .find(|&si| !used[si] && server[si].object_id() == object.object_id());
            if let Some(si) = partner[ci] {
                used[si] = true;
            }
        }

        // Objects that lost their id (e.g. re-parsed) still pair up by name
        for by_previous_name in [true, false] {
            for (ci, object) in client.iter().enumerate() {
                if partner[ci].is_some() {
                    continue;
                }
                let name = if by_previous_name {
                    object.previous_name()
                } else {
                    object.object_name()
                };
                if name.is_empty() {
                    continue;
                }
                partner[ci] = (0..server.len())
                    .find(|&si| !used[si] && self.names_equal(server[si].object_name(), name));
                if let Some(si) = partner[ci] {
                    used[si] = true;
                }
            }
        }

        let mut pairing = Pairing {
            matched: Vec::new(),
            added: Vec::new(),
            removed: Vec::new(),
        };
        for (ci, object) in client.iter().enumerate() {
            match partner[ci] {
                Some(si) => pairing.matched.push((server[si], *object)),
                None => pairing.added.push(*object),
            }
        }
        pairing.removed = server
            .iter()
            .enumerate()
            .filter(|(si, _)| !used[*si])
            .map(|(_, object)| *object)
            .collect();
        pairing
    }
}

fn column_changed(server: &Column, client: &Column) -> bool {
    server.name != client.name
        || server.datatype != client.datatype
        || !same_flags(&server.flags, &client.flags)
        || server.is_not_null != client.is_not_null
        || server.auto_increment != client.auto_increment
        || server.default_value != client.default_value
        || server.charset != client.charset
        || server.collation != client.collation
        || server.comment != client.comment
}

fn same_flags(a: &[String], b: &[String]) -> bool {
    let normalize = |flags: &[String]| {
        let mut flags: Vec<String> = flags.iter().map(|f| f.to_uppercase()).collect();
        flags.sort();
        flags.dedup();
        flags
    };
    normalize(a) == normalize(b)
}

/// Ids of `b` that keep their relative order from `a`
fn longest_common_subsequence(a: &[ObjectId], b: &[ObjectId]) -> HashSet<ObjectId> {
    let (n, m) = (a.len(), b.len());
    let mut lengths = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lengths[i][j] = if a[i] == b[j] {
                lengths[i + 1][j + 1] + 1
            } else {
                max(lengths[i + 1][j], lengths[i][j + 1])
            };
        }
    }

    let mut kept = HashSet::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            kept.insert(a[i]);
            i += 1;
            j += 1;
        } else if lengths[i + 1][j] >= lengths[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    kept
}

fn index_spec(table: &Table, index: &Index) -> IndexSpec {
    IndexSpec {
        name: index.name.clone(),
        index_type: index.index_type,
        columns: index
            .columns
            .iter()
            .map(|c| IndexColumnSpec {
                name: table.column_name(c.column).to_string(),
                length: c.length,
                descending: c.descending,
            })
            .collect(),
        comment: index.comment.clone(),
        visible: index.visible,
    }
}

/// Resolve a foreign key to names; incomplete keys (no columns or no target) yield `None`
fn foreign_key_spec(
    catalog: &Catalog,
    schema: &str,
    table: &Table,
    fk: &ForeignKey,
) -> DiffResult<Option<ForeignKeySpec>> {
    let Some(reference) = &fk.referenced_table else {
        return Ok(None);
    };
    if fk.columns.is_empty() {
        return Ok(None);
    }

    let unresolved = || DiffError::UnresolvedReference {
        table: format!("{}.{}", schema, table.name),
        foreign_key: fk.name.clone(),
    };

    let referenced = if reference.id == table.id {
        Some((schema, table))
    } else {
        catalog
            .find_table(reference.id)
            .map(|(s, t)| (s.name.as_str(), t))
            .or_else(|| {
                catalog
                    .table(&reference.schema, &reference.name)
                    .map(|t| (reference.schema.as_str(), t))
            })
    };
    let (referenced_schema, referenced_table) = referenced.ok_or_else(unresolved)?;

    let referenced_columns = fk
        .referenced_columns
        .iter()
        .map(|id| referenced_table.column(*id).map(|c| c.name.clone()))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(unresolved)?;

    Ok(Some(ForeignKeySpec {
        name: fk.name.clone(),
        columns: fk
            .columns
            .iter()
            .map(|id| table.column_name(*id).to_string())
            .collect(),
        referenced_schema: referenced_schema.to_string(),
        referenced_table: referenced_table.name.clone(),
        referenced_columns,
        update_rule: fk.update_rule,
        delete_rule: fk.delete_rule,
    }))
}

fn defined_view(schema: &str, view: &View) -> DefinedObject {
    DefinedObject {
        object_type: LiveObjectType::View,
        schema: schema.to_string(),
        name: view.name.clone(),
        definition: view.definition.clone(),
    }
}

fn defined_routine(schema: &str, routine: &Routine) -> DefinedObject {
    DefinedObject {
        object_type: routine.routine_type.object_type(),
        schema: schema.to_string(),
        name: routine.name.clone(),
        definition: routine.definition.clone(),
    }
}

fn defined_trigger(schema: &str, trigger: &Trigger) -> DefinedObject {
    DefinedObject {
        object_type: LiveObjectType::Trigger,
        schema: schema.to_string(),
        name: trigger.name.clone(),
        definition: trigger.definition.clone(),
    }
}
