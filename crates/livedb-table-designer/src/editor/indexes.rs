//! Index list editing

use livedb_core::{Index, IndexColumn, IndexType, ObjectId, Table};

use super::foreign_keys::matching_index;
use super::{TableEditingModel, column_in, in_transaction, index_in, table_mut, unique_name};
use crate::{EditError, EditResult, FieldValue, IndexField};

impl TableEditingModel {
    pub fn index_count(&self) -> usize {
        self.table().map(|t| t.indices.len()).unwrap_or(0)
    }

    pub fn index_id(&self, row: usize) -> EditResult<ObjectId> {
        self.table()?
            .indices
            .get(row)
            .map(|i| i.id)
            .ok_or(EditError::RowOutOfRange(row))
    }

    /// Add an empty INDEX; a table without columns can't have indexes
    pub fn add_index(&mut self, name: &str) -> EditResult<ObjectId> {
        self.add_index_with_columns(name, &[])
    }

    pub fn add_index_with_columns(
        &mut self,
        name: &str,
        columns: &[ObjectId],
    ) -> EditResult<ObjectId> {
        let table = self.table()?;
        if table.columns.is_empty() {
            tracing::warn!(table = %table.name, "cannot add index on empty table");
            return Err(EditError::EmptyTableIndex);
        }
        for column in columns {
            column_in(table, *column)?;
        }
        let name = name.trim_end();
        if table.index_by_name(name).is_some() {
            return Err(EditError::DuplicateName(name.to_string()));
        }
        let description = format!("Add Index '{}' to '{}'", name, table.name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let mut index = Index::new(name, IndexType::Index);
            index
                .columns
                .extend(columns.iter().copied().map(IndexColumn::new));
            let id = index.id;
            table_mut(catalog, table_id)?.indices.push(index);
            Ok(id)
        })
    }

    /// Remove an index.
    ///
    /// An index backing a foreign key is only removed when another index can
    /// take its place, or when `force` is set; the foreign key then moves to
    /// the replacement index, if any.
    pub fn remove_index(&mut self, index: ObjectId, force: bool) -> EditResult<()> {
        let table = self.table()?;
        let target = index_in(table, index)?;
        if target.is_primary() {
            return Err(EditError::PrimaryIndexReadOnly);
        }
        let owners: Vec<ObjectId> = owning_foreign_keys(table, index);
        if !force {
            for fk in &owners {
                if let Some(fk) = table.foreign_key(*fk)
                    && matching_index(table, fk, Some(index)).is_none()
                {
                    return Err(EditError::IndexUsedByForeignKey {
                        index: target.name.clone(),
                        foreign_key: fk.name.clone(),
                    });
                }
            }
        }
        let description = format!("Remove Index '{}.{}'", table.name, target.name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let table = table_mut(catalog, table_id)?;
            table.indices.retain(|i| i.id != index);
            for fk in &owners {
                let replacement = table
                    .foreign_key(*fk)
                    .and_then(|fk| matching_index(table, fk, None));
                if let Some(fk) = table.foreign_key_mut(*fk) {
                    fk.index = replacement;
                }
            }
            Ok(())
        })
    }

    /// Append a column to an index.
    ///
    /// The PRIMARY index is edited through the column primary key markers.
    pub fn add_index_column(&mut self, index: ObjectId, column: ObjectId) -> EditResult<()> {
        let table = self.table()?;
        let target = index_in(table, index)?;
        let column_name = column_in(table, column)?.name.clone();
        if target.is_primary() {
            return self.set_primary_key(column, true);
        }
        if target.contains_column(column) {
            return Ok(());
        }
        check_not_foreign_key_owned(table, target)?;
        let description = format!("Add column '{}' to index '{}'", column_name, target.name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            if let Some(index) = table_mut(catalog, table_id)?.index_mut(index) {
                index.columns.push(IndexColumn::new(column));
            }
            Ok(())
        })
    }

    pub fn remove_index_column(&mut self, index: ObjectId, column: ObjectId) -> EditResult<()> {
        let table = self.table()?;
        let target = index_in(table, index)?;
        if target.is_primary() {
            return self.set_primary_key(column, false);
        }
        if !target.contains_column(column) {
            return Ok(());
        }
        check_not_foreign_key_owned(table, target)?;
        let description = format!(
            "Remove column '{}' from index '{}'",
            table.column_name(column),
            target.name
        );
        in_transaction(&mut self.session, description, |catalog, table_id| {
            if let Some(index) = table_mut(catalog, table_id)?.index_mut(index) {
                index.columns.retain(|c| c.column != column);
            }
            Ok(())
        })
    }

    /// Change the index type; PRIMARY can be neither changed nor assigned
    pub fn set_index_type(&mut self, index: ObjectId, index_type: IndexType) -> EditResult<()> {
        let table = self.table()?;
        let target = index_in(table, index)?;
        if target.is_primary() {
            return Err(EditError::PrimaryIndexReadOnly);
        }
        if index_type == IndexType::Primary {
            return Err(EditError::InvalidIndexType(index_type.to_string()));
        }
        if target.index_type == index_type {
            return Ok(());
        }
        let description = format!("Change Type of Index '{}.{}'", table.name, target.name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            if let Some(index) = table_mut(catalog, table_id)?.index_mut(index) {
                index.index_type = index_type;
            }
            Ok(())
        })
    }

    pub fn rename_index(&mut self, index: ObjectId, name: &str) -> EditResult<()> {
        let table = self.table()?;
        let target = index_in(table, index)?;
        if target.is_primary() {
            return Err(EditError::PrimaryIndexReadOnly);
        }
        let name = name.trim_end().to_string();
        if target.name == name {
            return Ok(());
        }
        if table
            .indices
            .iter()
            .any(|i| i.id != index && i.name.eq_ignore_ascii_case(&name))
        {
            return Err(EditError::DuplicateName(name));
        }
        let description = format!("Rename Index '{}.{}' to '{}'", table.name, target.name, name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            if let Some(index) = table_mut(catalog, table_id)?.index_mut(index) {
                index.name = name.clone();
            }
            Ok(())
        })
    }

    pub fn set_index_comment(&mut self, index: ObjectId, comment: &str) -> EditResult<()> {
        let table = self.table()?;
        let target = index_in(table, index)?;
        if target.comment == comment {
            return Ok(());
        }
        let description = format!("Set Comment of Index '{}.{}'", table.name, target.name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            if let Some(index) = table_mut(catalog, table_id)?.index_mut(index) {
                index.comment = comment.to_string();
            }
            Ok(())
        })
    }

    pub fn set_index_visible(&mut self, index: ObjectId, visible: bool) -> EditResult<()> {
        let table = self.table()?;
        let target = index_in(table, index)?;
        if target.is_primary() {
            return Err(EditError::PrimaryIndexReadOnly);
        }
        if target.visible == visible {
            return Ok(());
        }
        let description = format!(
            "{} Index '{}.{}'",
            if visible { "Show" } else { "Hide" },
            table.name,
            target.name
        );
        in_transaction(&mut self.session, description, |catalog, table_id| {
            if let Some(index) = table_mut(catalog, table_id)?.index_mut(index) {
                index.visible = visible;
            }
            Ok(())
        })
    }

    // ========== Grid Accessors ==========

    pub fn index_field(&self, row: usize, field: IndexField) -> EditResult<FieldValue> {
        let table = self.table()?;
        if row == table.indices.len() {
            return Ok(match field {
                IndexField::Visible => FieldValue::Flag(true),
                _ => FieldValue::Text(String::new()),
            });
        }
        let index = table.indices.get(row).ok_or(EditError::RowOutOfRange(row))?;
        Ok(match field {
            IndexField::Name => FieldValue::Text(index.name.clone()),
            IndexField::Type => FieldValue::Text(index.index_type.to_string()),
            IndexField::Comment => FieldValue::Text(index.comment.clone()),
            IndexField::Visible => FieldValue::Flag(index.visible),
        })
    }

    /// Set an index grid cell.
    ///
    /// On the placeholder row any non-empty value adds an index, named after
    /// the value when it is the name field.
    pub fn set_index_field(
        &mut self,
        row: usize,
        field: IndexField,
        value: impl Into<FieldValue>,
    ) -> EditResult<()> {
        let value = value.into();
        let text = value.to_string();
        let count = self.index_count();

        if row == count {
            if text.trim().is_empty() {
                return Err(EditError::InvalidValue {
                    field: field.name(),
                    value: text,
                });
            }
            let name = match field {
                IndexField::Name => text.trim().to_string(),
                _ => {
                    let table = self.table()?;
                    unique_name(
                        &format!("index{}", count + 1),
                        table.indices.iter().map(|i| i.name.as_str()),
                    )
                }
            };
            let id = self.add_index(&name)?;
            return match field {
                IndexField::Name => Ok(()),
                _ => self.apply_index_field(id, field, value),
            };
        }

        let id = self.index_id(row)?;
        let is_primary = self.table()?.index(id).is_some_and(Index::is_primary);
        if is_primary && field != IndexField::Comment {
            return Err(EditError::PrimaryIndexReadOnly);
        }
        self.apply_index_field(id, field, value)
    }

    fn apply_index_field(
        &mut self,
        index: ObjectId,
        field: IndexField,
        value: FieldValue,
    ) -> EditResult<()> {
        match field {
            IndexField::Name => self.rename_index(index, &value.to_string()),
            IndexField::Type => {
                let text = value.to_string();
                let index_type = text
                    .parse::<IndexType>()
                    .map_err(|_| EditError::InvalidIndexType(text.clone()))?;
                self.set_index_type(index, index_type)
            }
            IndexField::Comment => self.set_index_comment(index, &value.to_string()),
            IndexField::Visible => self.set_index_visible(index, value.as_flag()),
        }
    }
}

fn owning_foreign_keys(table: &Table, index: ObjectId) -> Vec<ObjectId> {
    table
        .foreign_keys
        .iter()
        .filter(|fk| fk.index == Some(index))
        .map(|fk| fk.id)
        .collect()
}

/// Columns of an index backing a foreign key follow the foreign key
fn check_not_foreign_key_owned(table: &Table, index: &Index) -> EditResult<()> {
    match table.foreign_keys.iter().find(|fk| fk.index == Some(index.id)) {
        Some(fk) => Err(EditError::IndexUsedByForeignKey {
            index: index.name.clone(),
            foreign_key: fk.name.clone(),
        }),
        None => Ok(()),
    }
}
