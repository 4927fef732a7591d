//! Undo transactions
//!
//! An edit begins with [`UndoStack::begin_edit`], which snapshots the state
//! into an [`EditTransaction`]. The caller mutates the state and then either
//! commits the transaction (recording it for undo under its description) or
//! rolls it back, which restores the snapshot. There is no hidden global
//! stack: the transaction object is owned by the caller until it is closed.

/// An open edit: the state before the edit plus its description
#[derive(Debug)]
#[must_use = "an edit transaction must be committed or rolled back"]
pub struct EditTransaction<T> {
    description: String,
    before: T,
}

impl<T> EditTransaction<T> {
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }
}

#[derive(Debug, Clone)]
struct UndoRecord<T> {
    description: String,
    state: T,
}

/// Committed edits, newest last
#[derive(Debug, Clone)]
pub struct UndoStack<T> {
    undo: Vec<UndoRecord<T>>,
    redo: Vec<UndoRecord<T>>,
    limit: usize,
}

impl<T: Clone> Default for UndoStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> UndoStack<T> {
    const DEFAULT_LIMIT: usize = 100;

    pub fn new() -> Self {
        Self::with_limit(Self::DEFAULT_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Open a transaction over the current state
    pub fn begin_edit(&self, state: &T, description: impl Into<String>) -> EditTransaction<T> {
        EditTransaction {
            description: description.into(),
            before: state.clone(),
        }
    }

    /// Record the transaction as one undoable step
    pub fn commit(&mut self, tx: EditTransaction<T>) {
        tracing::trace!(description = %tx.description, "committed edit");
        self.undo.push(UndoRecord {
            description: tx.description,
            state: tx.before,
        });
        if self.undo.len() > self.limit {
            self.undo.remove(0);
        }
        self.redo.clear();
    }

    /// Discard the transaction, restoring the state it captured
    pub fn rollback(&self, tx: EditTransaction<T>, state: &mut T) {
        tracing::trace!(description = %tx.description, "rolled back edit");
        *state = tx.before;
    }

    /// Revert the newest committed edit; returns its description
    pub fn undo(&mut self, state: &mut T) -> Option<String> {
        let record = self.undo.pop()?;
        let current = std::mem::replace(state, record.state);
        self.redo.push(UndoRecord {
            description: record.description.clone(),
            state: current,
        });
        Some(record.description)
    }

    /// Re-apply the newest undone edit; returns its description
    pub fn redo(&mut self, state: &mut T) -> Option<String> {
        let record = self.redo.pop()?;
        let current = std::mem::replace(state, record.state);
        self.undo.push(UndoRecord {
            description: record.description.clone(),
            state: current,
        });
        Some(record.description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Description of the edit `undo` would revert
    pub fn undo_description(&self) -> Option<&str> {
        self.undo.last().map(|r| r.description.as_str())
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
