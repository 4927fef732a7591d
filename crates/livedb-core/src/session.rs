//! Live edit session
//!
//! Holds the client/server catalog pair for one object being edited against
//! a live server, the edit state machine and the undo history.

use std::collections::HashSet;

use crate::{Catalog, EditTransaction, LiveDbError, LiveObjectType, ObjectId, Result, Table, UndoStack};

/// Edit state of a live-edited object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    /// No edits since the session started
    #[default]
    Clean,
    /// Uncommitted structural edits
    Dirty,
    /// An alter script is being applied; structural edits are rejected
    Applying,
    /// The last apply succeeded
    Applied,
    /// The last apply failed; edits are preserved
    Failed,
}

/// The object a session edits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveObjectRef {
    pub object_type: LiveObjectType,
    pub schema: String,
    pub id: ObjectId,
}

/// Client and server snapshots of one live-edited object
#[derive(Debug, Clone)]
pub struct LiveEditSession {
    client: Catalog,
    server: Catalog,
    target: LiveObjectRef,
    state: EditState,
    sql_editor_errors: usize,
    undo: UndoStack<Catalog>,
    live_table_lists: HashSet<String>,
}

impl LiveEditSession {
    /// Start a session; the server snapshot is a structural copy of `catalog`
    pub fn new(catalog: Catalog, target: LiveObjectRef) -> Self {
        Self {
            server: catalog.clone(),
            client: catalog,
            target,
            state: EditState::Clean,
            sql_editor_errors: 0,
            undo: UndoStack::new(),
            live_table_lists: HashSet::new(),
        }
    }

    pub fn client(&self) -> &Catalog {
        &self.client
    }

    /// Mutable client catalog; prefer `begin_edit` for user-visible edits
    pub fn client_mut(&mut self) -> &mut Catalog {
        &mut self.client
    }

    pub fn server(&self) -> &Catalog {
        &self.server
    }

    pub fn target(&self) -> &LiveObjectRef {
        &self.target
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn is_applying(&self) -> bool {
        self.state == EditState::Applying
    }

    // ========== Undo Transactions ==========

    /// Open an undo transaction over the client catalog
    pub fn begin_edit(&self, description: impl Into<String>) -> Result<EditTransaction<Catalog>> {
        if self.is_applying() {
            return Err(LiveDbError::InvalidState(
                "changes are being applied to the server".to_string(),
            ));
        }
        Ok(self.undo.begin_edit(&self.client, description))
    }

    pub fn commit(&mut self, tx: EditTransaction<Catalog>) {
        self.undo.commit(tx);
        self.state = EditState::Dirty;
    }

    pub fn rollback(&mut self, tx: EditTransaction<Catalog>) {
        self.undo.rollback(tx, &mut self.client);
    }

    pub fn undo(&mut self) -> Option<String> {
        if self.is_applying() {
            return None;
        }
        let description = self.undo.undo(&mut self.client)?;
        self.state = EditState::Dirty;
        Some(description)
    }

    pub fn redo(&mut self) -> Option<String> {
        if self.is_applying() {
            return None;
        }
        let description = self.undo.redo(&mut self.client)?;
        self.state = EditState::Dirty;
        Some(description)
    }

    pub fn undo_stack(&self) -> &UndoStack<Catalog> {
        &self.undo
    }

    // ========== Apply Lifecycle ==========

    pub fn begin_apply(&mut self) -> Result<()> {
        if self.is_applying() {
            return Err(LiveDbError::InvalidState(
                "an apply is already in progress".to_string(),
            ));
        }
        self.state = EditState::Applying;
        Ok(())
    }

    pub fn finish_apply(&mut self, success: bool) {
        self.state = if success {
            EditState::Applied
        } else {
            EditState::Failed
        };
    }

    /// Leave the Applying state without a result (e.g. nothing to apply)
    pub fn cancel_apply(&mut self) {
        if self.is_applying() {
            self.state = if self.undo.can_undo() {
                EditState::Dirty
            } else {
                EditState::Clean
            };
        }
    }

    /// Return a failed session to editing, keeping its edits
    pub fn resume_editing(&mut self) {
        if self.state == EditState::Failed {
            self.state = EditState::Dirty;
        }
    }

    /// Make the server snapshot a structural copy of the client snapshot
    pub fn rebase_server_state(&mut self) {
        self.server = self.client.clone();
    }

    // ========== SQL Editor ==========

    /// Syntax error count reported by the raw DDL editor, if one is attached
    pub fn set_sql_editor_errors(&mut self, count: usize) {
        self.sql_editor_errors = count;
    }

    pub fn sql_editor_errors(&self) -> usize {
        self.sql_editor_errors
    }

    // ========== Live Table Stubs ==========

    pub fn has_live_table_list(&self, schema: &str) -> bool {
        self.live_table_lists.contains(schema)
    }

    pub fn mark_live_table_list(&mut self, schema: &str) {
        self.live_table_lists.insert(schema.to_string());
    }

    // ========== Target Lookup ==========

    /// Current (name, old_name) of the target in the client catalog
    pub fn target_names(&self) -> Option<(String, String)> {
        object_names(&self.client, &self.target)
    }

    pub fn target_table(&self) -> Option<&Table> {
        match self.target.object_type {
            LiveObjectType::Table => self.client.find_table(self.target.id).map(|(_, t)| t),
            _ => None,
        }
    }

    pub fn target_table_mut(&mut self) -> Option<&mut Table> {
        match self.target.object_type {
            LiveObjectType::Table => self.client.find_table_mut(self.target.id),
            _ => None,
        }
    }
}

/// (name, old_name) of an object in a catalog
pub fn object_names(catalog: &Catalog, target: &LiveObjectRef) -> Option<(String, String)> {
    let schema = catalog.schemata.iter().find(|s| s.name == target.schema);
    match target.object_type {
        LiveObjectType::Schema => catalog
            .schema_by_id(target.id)
            .map(|s| (s.name.clone(), s.old_name.clone())),
        LiveObjectType::Table => catalog
            .find_table(target.id)
            .map(|(_, t)| (t.name.clone(), t.old_name.clone())),
        LiveObjectType::View => schema?
            .views
            .iter()
            .find(|v| v.id == target.id)
            .map(|v| (v.name.clone(), v.old_name.clone())),
        LiveObjectType::Procedure | LiveObjectType::Function => schema?
            .routines
            .iter()
            .find(|r| r.id == target.id)
            .map(|r| (r.name.clone(), r.old_name.clone())),
        LiveObjectType::Trigger => schema?
            .tables
            .iter()
            .flat_map(|t| t.triggers.iter())
            .find(|t| t.id == target.id)
            .map(|t| (t.name.clone(), t.old_name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Schema, Table};

    fn table_session() -> LiveEditSession {
        let mut catalog = Catalog::new();
        let mut schema = Schema::new("shop");
        let table = Table::new("orders");
        let target = LiveObjectRef {
            object_type: LiveObjectType::Table,
            schema: "shop".to_string(),
            id: table.id,
        };
        schema.tables.push(table);
        catalog.schemata.push(schema);
        LiveEditSession::new(catalog, target)
    }

    #[test]
    fn test_edits_are_rejected_while_applying() {
        let mut session = table_session();
        session.begin_apply().expect("should start apply");
        assert!(session.begin_edit("rename").is_err());
        assert!(session.begin_apply().is_err());

        session.finish_apply(false);
        assert_eq!(session.state(), EditState::Failed);
        session.resume_editing();
        assert_eq!(session.state(), EditState::Dirty);
    }

    #[test]
    fn test_commit_marks_dirty_and_rollback_restores() {
        let mut session = table_session();
        assert_eq!(session.state(), EditState::Clean);

        let tx = session.begin_edit("Rename table").expect("editable");
        if let Some(table) = session.target_table_mut() {
            table.name = "purchases".to_string();
        }
        session.rollback(tx);
        assert_eq!(session.target_names().map(|n| n.0).as_deref(), Some("orders"));
        assert_eq!(session.state(), EditState::Clean);

        let tx = session.begin_edit("Rename table").expect("editable");
        if let Some(table) = session.target_table_mut() {
            table.name = "purchases".to_string();
        }
        session.commit(tx);
        assert_eq!(session.state(), EditState::Dirty);
        assert_eq!(session.server().table("shop", "orders").map(|t| t.id), Some(session.target().id));
    }
}
