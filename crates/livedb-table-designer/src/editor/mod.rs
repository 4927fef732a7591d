//! Table editing model
//!
//! [`TableEditingModel`] is the mutation surface of a live-edited table. It
//! owns the [`LiveEditSession`] holding the client and server snapshots and
//! runs every edit inside one undo transaction: the transaction is committed
//! with a readable description when the edit succeeds and rolled back when
//! it is rejected, so a failed edit never leaves a partial change behind.
//!
//! Edits are refused while the session is applying changes to the server.

mod columns;
mod foreign_keys;
mod indexes;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use livedb_core::{
    Catalog, Column, DdlParser, EditState, ForeignKey, Index, LiveEditSession, LiveObjectType,
    ObjectId, SharedOptions, Table,
};

use crate::service::{DeclinePrompt, PromptHandler};
use crate::{EditError, EditResult};

/// Editing model for one live-edited table
pub struct TableEditingModel {
    session: LiveEditSession,
    parser: Arc<dyn DdlParser>,
    options: SharedOptions,
    prompt: Arc<dyn PromptHandler>,
}

impl TableEditingModel {
    /// Create a model over a session whose target is a table
    pub fn new(
        session: LiveEditSession,
        parser: Arc<dyn DdlParser>,
        options: SharedOptions,
    ) -> EditResult<Self> {
        if session.target().object_type != LiveObjectType::Table || session.target_table().is_none()
        {
            return Err(EditError::TableNotFound);
        }
        Ok(Self {
            session,
            parser,
            options,
            prompt: Arc::new(DeclinePrompt),
        })
    }

    /// Builder: confirm side effects through `prompt` instead of declining them
    pub fn with_prompt_handler(mut self, prompt: Arc<dyn PromptHandler>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn session(&self) -> &LiveEditSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut LiveEditSession {
        &mut self.session
    }

    pub fn into_session(self) -> LiveEditSession {
        self.session
    }

    pub fn state(&self) -> EditState {
        self.session.state()
    }

    pub fn table(&self) -> EditResult<&Table> {
        self.session.target_table().ok_or(EditError::TableNotFound)
    }

    pub fn table_id(&self) -> ObjectId {
        self.session.target().id
    }

    pub fn schema_name(&self) -> &str {
        &self.session.target().schema
    }

    /// Current table name
    pub fn name(&self) -> String {
        self.table().map(|t| t.name.clone()).unwrap_or_default()
    }

    // ========== Table ==========

    pub fn set_name(&mut self, name: &str) -> EditResult<()> {
        let name = name.trim_end().to_string();
        if name.is_empty() {
            return Err(EditError::InvalidValue {
                field: "Name",
                value: name,
            });
        }
        if name == self.name() {
            return Ok(());
        }
        in_transaction(
            &mut self.session,
            format!("Rename Table to '{}'", name),
            |catalog, table_id| {
                table_mut(catalog, table_id)?.name = name.clone();
                Ok(())
            },
        )
    }

    pub fn set_comment(&mut self, comment: &str) -> EditResult<()> {
        if self.table()?.comment == comment {
            return Ok(());
        }
        let description = format!("Set Comment of '{}'", self.name());
        in_transaction(&mut self.session, description, |catalog, table_id| {
            table_mut(catalog, table_id)?.comment = comment.to_string();
            Ok(())
        })
    }

    /// Set the storage engine; an empty value restores the server default
    pub fn set_engine(&mut self, engine: &str) -> EditResult<()> {
        let engine = Some(engine.trim().to_string()).filter(|e| !e.is_empty());
        if self.table()?.engine == engine {
            return Ok(());
        }
        let description = format!("Set Engine of '{}'", self.name());
        in_transaction(&mut self.session, description, |catalog, table_id| {
            table_mut(catalog, table_id)?.engine = engine.clone();
            Ok(())
        })
    }

    // ========== Undo ==========

    /// Revert the newest edit; returns its description
    pub fn undo(&mut self) -> Option<String> {
        self.session.undo()
    }

    pub fn redo(&mut self) -> Option<String> {
        self.session.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.session.undo_stack().can_undo()
    }

    /// Description of the edit `undo` would revert
    pub fn undo_description(&self) -> Option<String> {
        self.session
            .undo_stack()
            .undo_description()
            .map(str::to_string)
    }
}

/// Run `edit` against the client catalog inside one undo transaction
pub(crate) fn in_transaction<T>(
    session: &mut LiveEditSession,
    description: impl Into<String>,
    edit: impl FnOnce(&mut Catalog, ObjectId) -> EditResult<T>,
) -> EditResult<T> {
    let tx = session.begin_edit(description)?;
    let table_id = session.target().id;
    match edit(session.client_mut(), table_id) {
        Ok(value) => {
            session.commit(tx);
            Ok(value)
        }
        Err(e) => {
            tracing::debug!(edit = %tx.description(), error = %e, "edit rejected");
            session.rollback(tx);
            Err(e)
        }
    }
}

pub(crate) fn table_ref(catalog: &Catalog, table_id: ObjectId) -> EditResult<&Table> {
    catalog
        .find_table(table_id)
        .map(|(_, table)| table)
        .ok_or(EditError::TableNotFound)
}

pub(crate) fn table_mut(catalog: &mut Catalog, table_id: ObjectId) -> EditResult<&mut Table> {
    catalog.find_table_mut(table_id).ok_or(EditError::TableNotFound)
}

pub(crate) fn column_in(table: &Table, column: ObjectId) -> EditResult<&Column> {
    table
        .column(column)
        .ok_or_else(|| EditError::UnknownObject(column.to_string()))
}

pub(crate) fn column_in_mut(table: &mut Table, column: ObjectId) -> EditResult<&mut Column> {
    table
        .column_mut(column)
        .ok_or_else(|| EditError::UnknownObject(column.to_string()))
}

pub(crate) fn index_in(table: &Table, index: ObjectId) -> EditResult<&Index> {
    table
        .index(index)
        .ok_or_else(|| EditError::UnknownObject(index.to_string()))
}

pub(crate) fn foreign_key_in(table: &Table, fk: ObjectId) -> EditResult<&ForeignKey> {
    table
        .foreign_key(fk)
        .ok_or_else(|| EditError::UnknownObject(fk.to_string()))
}

/// `base`, or `base` with the lowest numeric suffix that is not taken
pub(crate) fn unique_name<'a>(base: &str, taken: impl Iterator<Item = &'a str> + Clone) -> String {
    let is_taken = |candidate: &str| taken.clone().any(|name| name.eq_ignore_ascii_case(candidate));
    if !is_taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{}{}", base, i))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| base.to_string())
}
