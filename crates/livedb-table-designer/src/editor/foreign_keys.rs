//! Foreign key list editing
//!
//! Every foreign key keeps a backing index over its columns. The index is
//! created, resynchronised and dropped automatically as the foreign key's
//! columns change; an existing index whose leading columns already cover
//! the foreign key is reused instead of creating a new one.

use livedb_core::sql::split_qualified_name;
use livedb_core::{
    Catalog, Column, ColumnType, DataTypeGroup, ForeignKey, ForeignKeyAction, Index, IndexColumn,
    IndexType, LiveDbOptions, ObjectId, Table,
};

use super::{
    TableEditingModel, column_in, foreign_key_in, in_transaction, table_mut, table_ref,
    unique_name,
};
use crate::service::LiveObjectSource;
use crate::{EditError, EditResult, FieldValue, ForeignKeyField, RuleKind};

impl TableEditingModel {
    pub fn foreign_key_count(&self) -> usize {
        self.table().map(|t| t.foreign_keys.len()).unwrap_or(0)
    }

    pub fn foreign_key_id(&self, row: usize) -> EditResult<ObjectId> {
        self.table()?
            .foreign_keys
            .get(row)
            .map(|fk| fk.id)
            .ok_or(EditError::RowOutOfRange(row))
    }

    /// Add a foreign key without columns, using the configured default rules
    pub fn add_foreign_key(&mut self, name: &str) -> EditResult<ObjectId> {
        let table = self.table()?;
        if table.columns.is_empty() {
            tracing::warn!(table = %table.name, "cannot add foreign key on empty table");
            return Err(EditError::EmptyTableForeignKey);
        }
        let name = name.trim_end().to_string();
        if table.foreign_key_by_name(&name).is_some() {
            return Err(EditError::DuplicateName(name));
        }
        let (update_rule, delete_rule) = self
            .options
            .read(|o| (o.default_update_rule(), o.default_delete_rule()));
        let description = format!("Add Foreign Key '{}' to '{}'", name, table.name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let mut fk = ForeignKey::new(name.clone());
            fk.update_rule = update_rule;
            fk.delete_rule = delete_rule;
            let id = fk.id;
            table_mut(catalog, table_id)?.foreign_keys.push(fk);
            Ok(id)
        })
    }

    /// Remove a foreign key; its backing index stays in place
    pub fn remove_foreign_key(&mut self, fk: ObjectId) -> EditResult<()> {
        let table = self.table()?;
        let name = foreign_key_in(table, fk)?.name.clone();
        let description = format!("Remove Foreign Key '{}.{}'", table.name, name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            table_mut(catalog, table_id)?
                .foreign_keys
                .retain(|f| f.id != fk);
            Ok(())
        })
    }

    /// Rename a foreign key together with a backing index of the same name
    pub fn rename_foreign_key(&mut self, fk: ObjectId, name: &str) -> EditResult<()> {
        let table = self.table()?;
        let current = foreign_key_in(table, fk)?;
        let name = name.trim_end().to_string();
        if current.name == name {
            return Ok(());
        }
        if table
            .foreign_keys
            .iter()
            .any(|f| f.id != fk && f.name.eq_ignore_ascii_case(&name))
        {
            return Err(EditError::DuplicateName(name));
        }
        let old_name = current.name.clone();
        let description = format!("Rename Foreign Key '{}.{}' to '{}'", table.name, old_name, name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let table = table_mut(catalog, table_id)?;
            let Some(fk) = table.foreign_key_mut(fk) else {
                return Err(EditError::UnknownObject(fk.to_string()));
            };
            fk.name = name.clone();
            let index = fk.index;
            if let Some(index) = index.and_then(|id| table.index_mut(id))
                && index.name == old_name
            {
                index.name = name.clone();
            }
            Ok(())
        })
    }

    /// Set the ON UPDATE or ON DELETE rule.
    ///
    /// SET NULL on a foreign key with NOT NULL columns asks the prompt
    /// handler to drop NOT NULL from those columns. Declining reverts the
    /// rule change.
    pub fn set_foreign_key_rule(
        &mut self,
        fk: ObjectId,
        kind: RuleKind,
        action: ForeignKeyAction,
    ) -> EditResult<()> {
        let table = self.table()?;
        let current = foreign_key_in(table, fk)?;
        let unchanged = match kind {
            RuleKind::OnUpdate => current.update_rule == action,
            RuleKind::OnDelete => current.delete_rule == action,
        };
        if unchanged {
            return Ok(());
        }
        let description = format!(
            "Change {} for FK '{}.{}'",
            kind.sql_clause(),
            table.name,
            current.name
        );
        let prompt = &self.prompt;
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let table = table_mut(catalog, table_id)?;
            let Some(foreign_key) = table.foreign_key_mut(fk) else {
                return Err(EditError::UnknownObject(fk.to_string()));
            };
            match kind {
                RuleKind::OnUpdate => foreign_key.update_rule = action,
                RuleKind::OnDelete => foreign_key.delete_rule = action,
            }
            if action != ForeignKeyAction::SetNull {
                return Ok(());
            }

            let fk_name = foreign_key.name.clone();
            let fk_columns = foreign_key.columns.clone();
            let not_null: Vec<ObjectId> = fk_columns
                .into_iter()
                .filter(|c| table.column(*c).is_some_and(|col| col.is_not_null))
                .collect();
            if not_null.is_empty() {
                return Ok(());
            }
            let names: Vec<String> = not_null
                .iter()
                .map(|c| table.column_name(*c).to_string())
                .collect();
            if !prompt.confirm_remove_not_null(&table.name, &fk_name, &names) {
                return Err(EditError::Declined);
            }
            for column in not_null {
                // PK columns stay NOT NULL
                if table.is_primary_key_column(column) {
                    continue;
                }
                if let Some(col) = table.column_mut(column) {
                    col.is_not_null = false;
                }
            }
            Ok(())
        })
    }

    /// Point a foreign key at `qualified` (`table` or `schema.table`).
    ///
    /// The referenced table is expanded through `source` first when it is
    /// only a stub; if that fails the foreign key is left untouched. Column
    /// pairs are cleared when the referenced table changes.
    pub async fn set_foreign_key_referenced_table(
        &mut self,
        fk: ObjectId,
        qualified: &str,
        source: &dyn LiveObjectSource,
    ) -> EditResult<()> {
        foreign_key_in(self.table()?, fk)?;
        let (schema, table) = split_qualified_name(qualified, self.schema_name());

        source
            .expand_live_table_stub(&mut self.session, &schema, &table)
            .await
            .map_err(|e| EditError::StubExpansion {
                schema: schema.clone(),
                table: table.clone(),
                message: e.to_string(),
            })?;

        let referenced = self
            .options
            .read(|o| find_table_by_name(self.session.client(), o, &schema, &table))
            .ok_or_else(|| EditError::ReferencedTableNotFound {
                schema: schema.clone(),
                table: table.clone(),
            })?;

        let current = foreign_key_in(self.table()?, fk)?;
        if current
            .referenced_table
            .as_ref()
            .is_some_and(|r| r.id == referenced)
        {
            return Ok(());
        }
        let description = format!(
            "Change Referenced Table of FK '{}.{}'",
            self.name(),
            current.name
        );
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let reference = catalog.table_ref(referenced);
            let table = table_mut(catalog, table_id)?;
            let Some(foreign_key) = table.foreign_key_mut(fk) else {
                return Err(EditError::UnknownObject(fk.to_string()));
            };
            foreign_key.referenced_table = reference;
            foreign_key.columns.clear();
            foreign_key.referenced_columns.clear();
            update_foreign_key_index(table, fk);
            Ok(())
        })?;
        tracing::debug!(
            foreign_key = %fk,
            schema = %schema,
            table = %table,
            "linked foreign key to referenced table"
        );
        Ok(())
    }

    /// Columns of the referenced table `column` may reference, best guess first.
    ///
    /// Candidates are indexed and type compatible; primary key columns come
    /// before other indexed columns.
    pub fn referenced_column_candidates(
        &self,
        fk: ObjectId,
        column: ObjectId,
    ) -> EditResult<Vec<ObjectId>> {
        let catalog = self.session.client();
        let table = self.table()?;
        let foreign_key = foreign_key_in(table, fk)?;
        let local = column_in(table, column)?;
        let Some(reference) = &foreign_key.referenced_table else {
            return Ok(Vec::new());
        };
        let Ok(referenced) = table_ref(catalog, reference.id) else {
            return Ok(Vec::new());
        };
        Ok(candidates(catalog, local, referenced, table.id))
    }

    /// Enable or disable a local column of a foreign key.
    ///
    /// Enabling pairs the column with the best referenced column candidate.
    pub fn set_foreign_key_column(
        &mut self,
        fk: ObjectId,
        column: ObjectId,
        enabled: bool,
    ) -> EditResult<()> {
        let table = self.table()?;
        let foreign_key = foreign_key_in(table, fk)?;
        let local = column_in(table, column)?;
        if foreign_key.columns.contains(&column) == enabled {
            return Ok(());
        }

        if !enabled {
            let description = format!("Remove Column from FK '{}.{}'", table.name, foreign_key.name);
            return in_transaction(&mut self.session, description, |catalog, table_id| {
                let table = table_mut(catalog, table_id)?;
                if let Some(foreign_key) = table.foreign_key_mut(fk)
                    && let Some(position) = foreign_key.columns.iter().position(|c| *c == column)
                {
                    foreign_key.columns.remove(position);
                    if position < foreign_key.referenced_columns.len() {
                        foreign_key.referenced_columns.remove(position);
                    }
                }
                update_foreign_key_index(table, fk);
                Ok(())
            });
        }

        let reference = foreign_key
            .referenced_table
            .as_ref()
            .ok_or_else(|| EditError::NoReferencedTable(foreign_key.name.clone()))?;
        let catalog = self.session.client();
        let referenced = table_ref(catalog, reference.id).map_err(|_| {
            EditError::ReferencedTableNotFound {
                schema: reference.schema.clone(),
                table: reference.name.clone(),
            }
        })?;
        let guess = candidates(catalog, local, referenced, table.id)
            .first()
            .copied()
            .ok_or_else(|| EditError::NoReferenceCandidate {
                table: referenced.name.clone(),
                column: local.name.clone(),
            })?;

        let description = format!("Add Column to FK '{}.{}'", table.name, foreign_key.name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let table = table_mut(catalog, table_id)?;
            if let Some(foreign_key) = table.foreign_key_mut(fk) {
                foreign_key.columns.push(column);
                foreign_key.referenced_columns.push(guess);
            }
            update_foreign_key_index(table, fk);
            Ok(())
        })
    }

    /// Pick the referenced column for an enabled local column by name
    pub fn set_foreign_key_referenced_column(
        &mut self,
        fk: ObjectId,
        column: ObjectId,
        referenced_name: &str,
    ) -> EditResult<()> {
        let catalog = self.session.client();
        let table = self.table()?;
        let foreign_key = foreign_key_in(table, fk)?;
        let local = column_in(table, column)?;
        let position = foreign_key
            .columns
            .iter()
            .position(|c| *c == column)
            .ok_or_else(|| EditError::UnknownObject(local.name.clone()))?;
        let reference = foreign_key
            .referenced_table
            .as_ref()
            .ok_or_else(|| EditError::NoReferencedTable(foreign_key.name.clone()))?;
        let referenced = table_ref(catalog, reference.id).map_err(|_| {
            EditError::ReferencedTableNotFound {
                schema: reference.schema.clone(),
                table: reference.name.clone(),
            }
        })?;
        let target = referenced
            .column_by_name(referenced_name)
            .map(|c| c.id)
            .filter(|id| candidates(catalog, local, referenced, table.id).contains(id))
            .ok_or_else(|| EditError::IncompatibleReferencedColumn(referenced_name.to_string()))?;
        if foreign_key.referenced_columns.get(position) == Some(&target) {
            return Ok(());
        }

        let description = format!(
            "Set Referenced Column of FK '{}.{}'",
            table.name, foreign_key.name
        );
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let table = table_mut(catalog, table_id)?;
            if let Some(foreign_key) = table.foreign_key_mut(fk)
                && let Some(slot) = foreign_key.referenced_columns.get_mut(position)
            {
                *slot = target;
            }
            Ok(())
        })
    }

    /// Re-derive the backing index of a foreign key
    pub fn update_foreign_key_index(&mut self, fk: ObjectId) -> EditResult<()> {
        let table = self.table()?;
        let name = foreign_key_in(table, fk)?.name.clone();
        let description = format!("Update Index for FK '{}.{}'", table.name, name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            update_foreign_key_index(table_mut(catalog, table_id)?, fk);
            Ok(())
        })
    }

    // ========== Grid Accessors ==========

    pub fn foreign_key_field(&self, row: usize, field: ForeignKeyField) -> EditResult<FieldValue> {
        let table = self.table()?;
        if row == table.foreign_keys.len() {
            return Ok(FieldValue::Text(String::new()));
        }
        let fk = table
            .foreign_keys
            .get(row)
            .ok_or(EditError::RowOutOfRange(row))?;
        Ok(FieldValue::Text(match field {
            ForeignKeyField::Name => fk.name.clone(),
            ForeignKeyField::ReferencedTable => fk
                .referenced_table
                .as_ref()
                .map(|r| format!("{}.{}", r.schema, r.name))
                .unwrap_or_default(),
            ForeignKeyField::OnUpdate => fk.update_rule.as_sql().to_string(),
            ForeignKeyField::OnDelete => fk.delete_rule.as_sql().to_string(),
            ForeignKeyField::Index => fk
                .index
                .and_then(|id| table.index(id))
                .map(|i| i.name.clone())
                .unwrap_or_default(),
        }))
    }

    /// Set a foreign key grid cell.
    ///
    /// The referenced table is set through
    /// [`set_foreign_key_referenced_table`](Self::set_foreign_key_referenced_table)
    /// and the backing index is maintained automatically, so both cells are
    /// read-only here.
    pub fn set_foreign_key_field(
        &mut self,
        row: usize,
        field: ForeignKeyField,
        value: impl Into<FieldValue>,
    ) -> EditResult<()> {
        let text = value.into().to_string();
        if row == self.foreign_key_count() {
            return match field {
                ForeignKeyField::Name if !text.trim().is_empty() => {
                    self.add_foreign_key(text.trim()).map(|_| ())
                }
                _ => Err(EditError::InvalidValue {
                    field: field.name(),
                    value: text,
                }),
            };
        }
        let fk = self.foreign_key_id(row)?;

        match field {
            ForeignKeyField::Name => self.rename_foreign_key(fk, &text),
            ForeignKeyField::OnUpdate | ForeignKeyField::OnDelete => {
                let action = text
                    .parse::<ForeignKeyAction>()
                    .map_err(|_| EditError::InvalidValue {
                        field: field.name(),
                        value: text.clone(),
                    })?;
                let kind = if field == ForeignKeyField::OnUpdate {
                    RuleKind::OnUpdate
                } else {
                    RuleKind::OnDelete
                };
                self.set_foreign_key_rule(fk, kind, action)
            }
            ForeignKeyField::ReferencedTable | ForeignKeyField::Index => {
                Err(EditError::ReadOnlyField(field.name()))
            }
        }
    }
}

fn find_table_by_name(
    catalog: &Catalog,
    options: &LiveDbOptions,
    schema: &str,
    table: &str,
) -> Option<ObjectId> {
    catalog
        .schemata
        .iter()
        .filter(|s| options.names_equal(&s.name, schema))
        .flat_map(|s| s.tables.iter())
        .find(|t| options.names_equal(&t.name, table))
        .map(|t| t.id)
}

/// Indexed, type compatible columns of `referenced`; PK columns first
fn candidates(
    catalog: &Catalog,
    local: &Column,
    referenced: &Table,
    local_table: ObjectId,
) -> Vec<ObjectId> {
    let usable = |column: &Column| {
        !(referenced.id == local_table && column.id == local.id)
            && columns_compatible(catalog, local, column)
    };

    let mut result: Vec<ObjectId> = referenced
        .primary_key()
        .map(|pk| pk.column_ids())
        .unwrap_or_default()
        .into_iter()
        .filter(|id| referenced.column(*id).is_some_and(usable))
        .collect();
    for column in &referenced.columns {
        if !result.contains(&column.id) && referenced.is_indexed_column(column.id) && usable(column)
        {
            result.push(column.id);
        }
    }
    result
}

/// Whether `local` may reference `referenced`.
///
/// Types must have the same name. Numeric columns must agree on UNSIGNED
/// and, unless the type is integral, on precision and scale.
pub(crate) fn columns_compatible(catalog: &Catalog, local: &Column, referenced: &Column) -> bool {
    match (&local.datatype, &referenced.datatype) {
        (Some(ColumnType::Simple(a)), Some(ColumnType::Simple(b))) => {
            if !a.name.eq_ignore_ascii_case(&b.name) {
                return false;
            }
            let Some(datatype) = catalog.simple_datatype(&a.name) else {
                return true;
            };
            if datatype.group != DataTypeGroup::Numeric {
                return true;
            }
            if local.has_flag("UNSIGNED") != referenced.has_flag("UNSIGNED") {
                return false;
            }
            datatype.numeric_scale == Some(0) || (a.precision == b.precision && a.scale == b.scale)
        }
        (Some(ColumnType::User { name: a, .. }), Some(ColumnType::User { name: b, .. })) => {
            a.eq_ignore_ascii_case(b)
        }
        _ => false,
    }
}

/// An index other than `exclude` whose leading columns are exactly the
/// foreign key's columns, in any order
pub(crate) fn matching_index(
    table: &Table,
    fk: &ForeignKey,
    exclude: Option<ObjectId>,
) -> Option<ObjectId> {
    if fk.columns.is_empty() {
        return None;
    }
    table
        .indices
        .iter()
        .filter(|index| Some(index.id) != exclude)
        .find(|index| {
            index.columns.len() >= fk.columns.len()
                && index.columns[..fk.columns.len()]
                    .iter()
                    .all(|c| fk.columns.contains(&c.column))
        })
        .map(|index| index.id)
}

/// Keep the backing index of `fk_id` in line with its columns.
///
/// An index created for the foreign key is dropped in favour of another
/// covering index, resynchronised otherwise, and removed once the foreign
/// key has no columns. A foreign key without an index reuses a covering
/// index or gets a new `<fk>_idx` one.
pub(crate) fn update_foreign_key_index(table: &mut Table, fk_id: ObjectId) {
    let Some(fk) = table.foreign_key(fk_id) else {
        return;
    };
    let fk_name = fk.name.clone();
    let columns = fk.columns.clone();
    let own = fk.index.filter(|id| table.index(*id).is_some());

    // Indexes created for this foreign key alone; shared ones are never rewritten
    let owned = own.filter(|id| {
        table
            .index(*id)
            .is_some_and(|i| i.index_type == IndexType::Index)
            && !table
                .foreign_keys
                .iter()
                .any(|other| other.id != fk_id && other.index == Some(*id))
    });

    let replacement = matching_index(table, fk, own);
    let new_index = match (own, replacement) {
        (Some(own), Some(other)) => {
            if owned == Some(own) {
                table.indices.retain(|i| i.id != own);
            }
            Some(other)
        }
        (Some(own), None) if owned == Some(own) => {
            if columns.is_empty() {
                table.indices.retain(|i| i.id != own);
                None
            } else {
                if let Some(index) = table.index_mut(own) {
                    let previous = std::mem::take(&mut index.columns);
                    index.columns = columns
                        .iter()
                        .map(|c| {
                            previous
                                .iter()
                                .find(|p| p.column == *c)
                                .cloned()
                                .unwrap_or_else(|| IndexColumn::new(*c))
                        })
                        .collect();
                }
                Some(own)
            }
        }
        (Some(own), None)
            if table
                .foreign_key(fk_id)
                .is_some_and(|fk| matching_index(table, fk, None) == Some(own)) =>
        {
            Some(own)
        }
        (_, None) if columns.is_empty() => None,
        (_, None) => {
            let name = unique_name(
                &format!("{}_idx", fk_name),
                table.indices.iter().map(|i| i.name.as_str()),
            );
            let mut index = Index::new(name, IndexType::Index);
            index.columns = columns.iter().copied().map(IndexColumn::new).collect();
            let id = index.id;
            table.indices.push(index);
            Some(id)
        }
        (None, Some(other)) => Some(other),
    };

    if let Some(fk) = table.foreign_key_mut(fk_id) {
        fk.index = new_index;
    }
}
