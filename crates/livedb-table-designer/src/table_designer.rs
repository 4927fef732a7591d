//! Table Designer for LiveDB
//!
//! The editing model behind the table editor of a live-edited table.
//!
//! ## Features
//!
//! - Column list editing with type parsing, flags, defaults and PK markers
//! - Index management with PRIMARY and foreign key index protection
//! - Foreign key editing with referenced column guessing and automatic
//!   backing index maintenance
//! - Tabular field accessors for the column, index and foreign key grids
//! - One undo step per edit, rolled back when an edit is rejected
//!
//! ## Usage
//!
//! ```rust,ignore
//! use livedb_table_designer::{ColumnField, TableEditingModel};
//!
//! let mut model = TableEditingModel::new(session, parser, options)?;
//!
//! // Typing a name into the placeholder row adds a column
//! model.set_column_field(0, ColumnField::Name, "id")?;
//! let name = model.add_column("name")?;
//! model.set_column_type(name, "varchar(40)")?;
//! model.set_column_field(1, ColumnField::Default, "hello")?;
//! ```

mod editor;
mod error;
pub mod models;
pub mod service;

// Re-exports for convenience
pub use editor::TableEditingModel;
pub use error::{EditError, EditResult};
pub use models::{ColumnField, FieldValue, ForeignKeyField, IndexField, RuleKind};
pub use service::{DeclinePrompt, LiveObjectSource, PromptHandler};
