//! Column list editing

use livedb_core::sql::quote_string;
use livedb_core::{
    Catalog, Column, ColumnType, DataTypeGroup, DdlParser, Index, IndexColumn, IndexType, ObjectId,
    SimpleDatatype, Table, TypeSpec,
};

use super::foreign_keys::update_foreign_key_index;
use super::{TableEditingModel, column_in, column_in_mut, in_transaction, table_mut};
use crate::{ColumnField, EditError, EditResult, FieldValue};

/// A parsed column type with the flags its datatype accepts
struct ResolvedType {
    spec: TypeSpec,
    /// `None` for user types, whose flags are never edited directly
    valid_flags: Option<Vec<String>>,
}

impl TableEditingModel {
    pub fn column_count(&self) -> usize {
        self.table().map(|t| t.columns.len()).unwrap_or(0)
    }

    /// Id of the column shown on `row`
    pub fn column_id(&self, row: usize) -> EditResult<ObjectId> {
        self.table()?
            .columns
            .get(row)
            .map(|c| c.id)
            .ok_or(EditError::RowOutOfRange(row))
    }

    /// Append a column without a type
    pub fn add_column(&mut self, name: &str) -> EditResult<ObjectId> {
        let name = name.trim_end().to_string();
        let description = format!("Add Column '{}' to '{}'", name, self.name());
        let id = in_transaction(&mut self.session, description, |catalog, table_id| {
            let column = Column::new(name.clone());
            let id = column.id;
            table_mut(catalog, table_id)?.columns.push(column);
            Ok(id)
        })?;
        tracing::debug!(table = %self.name(), column = %name, "added column");
        Ok(id)
    }

    /// Quick-add from the placeholder row.
    ///
    /// The first column of a table becomes its primary key and gets the
    /// default PK column type; later columns get the default column type.
    fn add_placeholder_column(&mut self, row: usize, name: &str) -> EditResult<ObjectId> {
        let name = name.trim_end().to_string();
        let primary = row == 0;
        let type_text = self.options.read(|o| {
            if primary {
                o.default_pk_column_type.clone()
            } else {
                o.default_column_type.clone()
            }
        });
        let description = format!("Add column '{}.{}'", self.name(), name);
        let parser = &self.parser;
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let resolved = resolve_type(parser.as_ref(), catalog, &type_text);
            let table = table_mut(catalog, table_id)?;
            let mut column = Column::new(name.clone());
            match resolved {
                Ok(resolved) => apply_type(&mut column, resolved),
                Err(e) => tracing::warn!(datatype = %type_text, error = %e, "invalid default column type"),
            }
            let id = column.id;
            table.columns.push(column);
            if primary {
                table.add_primary_key_column(id);
            }
            Ok(id)
        })
    }

    /// Remove a column together with its index and foreign key entries
    pub fn remove_column(&mut self, column: ObjectId) -> EditResult<()> {
        let column_name = column_in(self.table()?, column)?.name.clone();
        let description = format!("Remove '{}.{}'", self.name(), column_name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            remove_column_cascade(table_mut(catalog, table_id)?, column);
            Ok(())
        })
    }

    /// Copy a column under the name `<name>_copy<i>`.
    ///
    /// The copy is placed at `position` when given, else appended.
    pub fn duplicate_column(
        &mut self,
        column: ObjectId,
        position: Option<usize>,
    ) -> EditResult<ObjectId> {
        let table = self.table()?;
        let source = column_in(table, column)?;
        let mut copy = source.clone();
        copy.id = ObjectId::new();
        copy.old_name.clear();
        copy.name = (1..)
            .map(|i| format!("{}_copy{}", source.name, i))
            .find(|candidate| table.column_by_name(candidate).is_none())
            .unwrap_or_else(|| source.name.clone());

        let description = format!("Duplicate Column '{}.{}'", table.name, source.name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let table = table_mut(catalog, table_id)?;
            let id = copy.id;
            let position = position.unwrap_or(table.columns.len()).min(table.columns.len());
            table.columns.insert(position, copy);
            table.update_primary_index_order();
            Ok(id)
        })
    }

    pub fn rename_column(&mut self, column: ObjectId, name: &str) -> EditResult<()> {
        let name = name.trim_end().to_string();
        let old_name = column_in(self.table()?, column)?.name.clone();
        if old_name == name {
            return Ok(());
        }
        let description = format!("Rename '{}.{}' to '{}'", self.name(), old_name, name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            column_in_mut(table_mut(catalog, table_id)?, column)?.name = name.clone();
            Ok(())
        })
    }

    /// Move a column to `position`, keeping PRIMARY index order equal to column order
    pub fn reorder_column(&mut self, column: ObjectId, position: usize) -> EditResult<()> {
        let table = self.table()?;
        let current = table
            .column_position(column)
            .ok_or_else(|| EditError::UnknownObject(column.to_string()))?;
        let target = position.min(table.columns.len().saturating_sub(1));
        if current == target {
            return Ok(());
        }
        let description = format!("Reorder Column '{}.{}'", table.name, table.column_name(column));
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let table = table_mut(catalog, table_id)?;
            let moved = table.columns.remove(current);
            table.columns.insert(target, moved);
            table.update_primary_index_order();
            Ok(())
        })
    }

    /// Parse and assign a column type such as `varchar(40)` or `INT UNSIGNED`.
    ///
    /// Flags the new simple type does not accept are dropped. User types
    /// leave the column without flags.
    pub fn set_column_type(&mut self, column: ObjectId, text: &str) -> EditResult<()> {
        let table = self.table()?;
        let column_name = column_in(table, column)?.name.clone();
        let description = format!("Set Type of '{}.{}'", table.name, column_name);
        let parser = &self.parser;
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let resolved = resolve_type(parser.as_ref(), catalog, text).inspect_err(|e| {
                tracing::warn!(datatype = %text, error = %e, "not a valid column type");
            })?;
            apply_type(column_in_mut(table_mut(catalog, table_id)?, column)?, resolved);
            Ok(())
        })
    }

    /// Mark or unmark a primary key column
    pub fn set_primary_key(&mut self, column: ObjectId, flag: bool) -> EditResult<()> {
        let table = self.table()?;
        let column_name = column_in(table, column)?.name.clone();
        if table.is_primary_key_column(column) == flag {
            return Ok(());
        }
        let description = if flag {
            format!("Add '{}' to primary key of '{}'", column_name, table.name)
        } else {
            format!("Remove '{}' from primary key of '{}'", column_name, table.name)
        };
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let table = table_mut(catalog, table_id)?;
            if flag {
                table.add_primary_key_column(column);
                let col = column_in_mut(table, column)?;
                if col.default_is_null() {
                    col.default_value = None;
                }
            } else {
                table.remove_primary_key_column(column);
            }
            Ok(())
        })
    }

    /// Setting NOT NULL clears an explicit NULL default
    pub fn set_not_null(&mut self, column: ObjectId, flag: bool) -> EditResult<()> {
        let table = self.table()?;
        let col = column_in(table, column)?;
        if col.is_not_null == flag {
            return Ok(());
        }
        if !flag && table.is_primary_key_column(column) {
            return Err(EditError::PrimaryKeyNullable(col.name.clone()));
        }
        let description = format!(
            "{} NOT NULL of '{}.{}'",
            if flag { "Set" } else { "Unset" },
            table.name,
            col.name
        );
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let col = column_in_mut(table_mut(catalog, table_id)?, column)?;
            col.is_not_null = flag;
            if flag && col.default_is_null() {
                col.default_value = None;
            }
            Ok(())
        })
    }

    /// Whether the column has its own single-column UNIQUE index
    pub fn has_unique_index(&self, column: ObjectId) -> bool {
        self.table()
            .is_ok_and(|table| unique_index_of(table, column).is_some())
    }

    /// Add or remove the single-column UNIQUE index `<col>_UNIQUE`
    pub fn set_unique(&mut self, column: ObjectId, flag: bool) -> EditResult<()> {
        let table = self.table()?;
        let column_name = column_in(table, column)?.name.clone();
        if unique_index_of(table, column).is_some() == flag {
            return Ok(());
        }
        let description = if flag {
            format!("Add Unique Index for '{}'.'{}'", table.name, column_name)
        } else {
            format!("Remove Unique Index for '{}'.'{}'", table.name, column_name)
        };
        in_transaction(&mut self.session, description, |catalog, table_id| {
            let table = table_mut(catalog, table_id)?;
            if flag {
                let mut index = Index::new(format!("{}_UNIQUE", column_name), IndexType::Unique);
                index.columns.push(IndexColumn::new(column));
                table.indices.push(index);
            } else if let Some(index) = unique_index_of(table, column) {
                table.indices.retain(|i| i.id != index);
                for fk in &mut table.foreign_keys {
                    if fk.index == Some(index) {
                        fk.index = None;
                    }
                }
            }
            Ok(())
        })
    }

    pub fn set_auto_increment(&mut self, column: ObjectId, flag: bool) -> EditResult<()> {
        let table = self.table()?;
        let col = column_in(table, column)?;
        if col.auto_increment == flag {
            return Ok(());
        }
        let description = format!("Set Auto Increment of '{}.{}'", table.name, col.name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            column_in_mut(table_mut(catalog, table_id)?, column)?.auto_increment = flag;
            Ok(())
        })
    }

    /// Toggle a type flag (UNSIGNED, ZEROFILL, BINARY) the column's type accepts
    pub fn set_column_flag(&mut self, column: ObjectId, flag: &str, enabled: bool) -> EditResult<()> {
        let table = self.table()?;
        let col = column_in(table, column)?;
        if col.has_flag(flag) == enabled {
            return Ok(());
        }
        if enabled {
            let accepted = self
                .session
                .client()
                .column_datatype(col)
                .is_some_and(|datatype| datatype.accepts_flag(flag));
            if !accepted {
                return Err(EditError::InvalidFlag {
                    flag: flag.to_uppercase(),
                    datatype: col
                        .datatype
                        .as_ref()
                        .map(|t| t.name().to_string())
                        .unwrap_or_default(),
                });
            }
        }
        let description = format!(
            "Set {} of '{}.{}'",
            flag.to_uppercase(),
            table.name,
            col.name
        );
        in_transaction(&mut self.session, description, |catalog, table_id| {
            column_in_mut(table_mut(catalog, table_id)?, column)?.set_flag(flag, enabled);
            Ok(())
        })
    }

    /// Set the default value as typed by the user.
    ///
    /// `true`/`false` become `1`/`0` for integer types and string-like
    /// values are quoted unless they are `NULL`, `0` or already quoted. An
    /// empty value removes the default.
    pub fn set_default(&mut self, column: ObjectId, value: &str) -> EditResult<()> {
        let table = self.table()?;
        let col = column_in(table, column)?;
        let normalized = normalize_default(self.session.client(), col, value);
        if col.default_value == normalized {
            return Ok(());
        }
        let description = format!("Set Default Value of '{}.{}'", table.name, col.name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            column_in_mut(table_mut(catalog, table_id)?, column)?.default_value = normalized;
            Ok(())
        })
    }

    pub fn set_column_comment(&mut self, column: ObjectId, comment: &str) -> EditResult<()> {
        let table = self.table()?;
        let col = column_in(table, column)?;
        if col.comment == comment {
            return Ok(());
        }
        let description = format!("Set Comment of '{}.{}'", table.name, col.name);
        in_transaction(&mut self.session, description, |catalog, table_id| {
            column_in_mut(table_mut(catalog, table_id)?, column)?.comment = comment.to_string();
            Ok(())
        })
    }

    // ========== Grid Accessors ==========

    /// Value of a column grid cell; `row == column_count()` is the placeholder row
    pub fn column_field(&self, row: usize, field: ColumnField) -> EditResult<FieldValue> {
        let table = self.table()?;
        if row == table.columns.len() {
            return Ok(if field.is_checkbox() {
                FieldValue::Flag(false)
            } else {
                FieldValue::Text(String::new())
            });
        }
        let column = table.columns.get(row).ok_or(EditError::RowOutOfRange(row))?;

        Ok(match field {
            ColumnField::Name => FieldValue::Text(column.name.clone()),
            ColumnField::Type => FieldValue::Text(
                column
                    .datatype
                    .as_ref()
                    .map(|t| t.to_string())
                    .unwrap_or_default(),
            ),
            ColumnField::IsPK => FieldValue::Flag(table.is_primary_key_column(column.id)),
            ColumnField::IsNotNull => FieldValue::Flag(column.is_not_null),
            ColumnField::IsUnique => FieldValue::Flag(unique_index_of(table, column.id).is_some()),
            ColumnField::IsBinary | ColumnField::IsUnsigned | ColumnField::IsZerofill => {
                FieldValue::Flag(field.type_flag().is_some_and(|flag| column.has_flag(flag)))
            }
            ColumnField::IsAutoIncrement => FieldValue::Flag(column.auto_increment),
            ColumnField::Default => FieldValue::Text(column.default_value.clone().unwrap_or_default()),
            ColumnField::Comment => FieldValue::Text(column.comment.clone()),
        })
    }

    /// Set a column grid cell.
    ///
    /// Entering a name on the placeholder row adds a column.
    pub fn set_column_field(
        &mut self,
        row: usize,
        field: ColumnField,
        value: impl Into<FieldValue>,
    ) -> EditResult<()> {
        let value = value.into();
        let count = self.column_count();
        if row == count {
            return match (field, value.as_text().map(str::trim)) {
                (ColumnField::Name, Some(name)) if !name.is_empty() => {
                    self.add_placeholder_column(row, name).map(|_| ())
                }
                _ => Err(EditError::InvalidValue {
                    field: field.name(),
                    value: value.to_string(),
                }),
            };
        }
        let column = self.column_id(row)?;

        match field {
            ColumnField::Name => self.rename_column(column, &value.to_string()),
            ColumnField::Type => self.set_column_type(column, &value.to_string()),
            ColumnField::IsPK => self.set_primary_key(column, value.as_flag()),
            ColumnField::IsNotNull => self.set_not_null(column, value.as_flag()),
            ColumnField::IsUnique => self.set_unique(column, value.as_flag()),
            ColumnField::IsBinary | ColumnField::IsUnsigned | ColumnField::IsZerofill => {
                let flag = field.type_flag().unwrap_or_default();
                self.set_column_flag(column, flag, value.as_flag())
            }
            ColumnField::IsAutoIncrement => self.set_auto_increment(column, value.as_flag()),
            ColumnField::Default => self.set_default(column, &value.to_string()),
            ColumnField::Comment => self.set_column_comment(column, &value.to_string()),
        }
    }
}

fn resolve_type(parser: &dyn DdlParser, catalog: &Catalog, text: &str) -> EditResult<ResolvedType> {
    let spec = parser
        .parse_column_type(catalog, text)
        .map_err(|e| EditError::InvalidType {
            text: text.to_string(),
            message: e.to_string(),
        })?;
    let valid_flags = match &spec.datatype {
        ColumnType::Simple(simple) => Some(
            catalog
                .simple_datatype(&simple.name)
                .map(|datatype| datatype.flags.clone())
                .unwrap_or_default(),
        ),
        ColumnType::User { .. } => None,
    };
    Ok(ResolvedType { spec, valid_flags })
}

fn apply_type(column: &mut Column, resolved: ResolvedType) {
    column.datatype = Some(resolved.spec.datatype);
    match resolved.valid_flags {
        Some(valid) => {
            column
                .flags
                .retain(|flag| valid.iter().any(|v| v.eq_ignore_ascii_case(flag)));
            for flag in &resolved.spec.flags {
                column.set_flag(flag, true);
            }
        }
        None => column.flags.clear(),
    }
}

fn unique_index_of(table: &Table, column: ObjectId) -> Option<ObjectId> {
    table
        .indices
        .iter()
        .find(|index| {
            index.index_type == IndexType::Unique
                && index.columns.len() == 1
                && index.columns[0].column == column
        })
        .map(|index| index.id)
}

/// Registry entry of a column's type; user types resolve through their definition
fn effective_datatype<'a>(catalog: &'a Catalog, column: &Column) -> Option<&'a SimpleDatatype> {
    match column.datatype.as_ref()? {
        ColumnType::Simple(simple) => catalog.simple_datatype(&simple.name),
        ColumnType::User { definition, .. } => {
            let name = definition.split('(').next().unwrap_or(definition).trim();
            catalog.simple_datatype(name)
        }
    }
}

pub(crate) fn normalize_default(catalog: &Catalog, column: &Column, value: &str) -> Option<String> {
    let value = value.trim_end();
    if value.is_empty() {
        return None;
    }
    let datatype = effective_datatype(catalog, column);
    let mut value = value.to_string();

    if let Some(datatype) = datatype
        && datatype.group == DataTypeGroup::Numeric
        && datatype.numeric_scale == Some(0)
    {
        if value.eq_ignore_ascii_case("true") {
            value = "1".to_string();
        } else if value.eq_ignore_ascii_case("false") {
            value = "0".to_string();
        }
    }

    let string_like = match column.datatype.as_ref() {
        Some(ColumnType::Simple(_)) => datatype.is_some_and(SimpleDatatype::is_string_like),
        // Aliases only quote for ENUM and SET definitions
        Some(ColumnType::User { .. }) => {
            datatype.is_some_and(|d| d.group == DataTypeGroup::Various)
        }
        None => false,
    };
    if string_like && value != "NULL" && value != "0" && !value.starts_with('\'') {
        value = quote_string(&value);
    }
    Some(value)
}

/// Remove a column and every reference to it inside its table.
///
/// Indexes and foreign keys left without columns are removed. A PK column
/// is unmarked first, so the PRIMARY index disappears only once no PK
/// column remains.
pub(crate) fn remove_column_cascade(table: &mut Table, column: ObjectId) {
    let table_id = table.id;
    table.remove_primary_key_column(column);
    table.columns.retain(|c| c.id != column);

    for index in table.indices.iter_mut().filter(|i| !i.is_primary()) {
        index.columns.retain(|c| c.column != column);
    }
    table
        .indices
        .retain(|index| index.is_primary() || !index.columns.is_empty());

    let mut changed = Vec::new();
    for fk in &mut table.foreign_keys {
        let self_reference = fk.referenced_table.as_ref().is_some_and(|r| r.id == table_id);
        let pairs: Vec<(ObjectId, ObjectId)> = fk
            .columns
            .iter()
            .copied()
            .zip(fk.referenced_columns.iter().copied())
            .filter(|(local, referenced)| {
                *local != column && !(self_reference && *referenced == column)
            })
            .collect();
        if pairs.len() != fk.columns.len() {
            let (columns, referenced): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
            fk.columns = columns;
            fk.referenced_columns = referenced;
            changed.push(fk.id);
        }
    }
    table.foreign_keys.retain(|fk| !fk.columns.is_empty());

    let index_ids: Vec<ObjectId> = table.indices.iter().map(|i| i.id).collect();
    for fk in &mut table.foreign_keys {
        if fk.index.is_some_and(|index| !index_ids.contains(&index)) {
            fk.index = None;
        }
    }
    for fk in changed {
        if table.foreign_key(fk).is_some() {
            update_foreign_key_index(table, fk);
        }
    }
}
