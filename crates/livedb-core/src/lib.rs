//! LiveDB Core - shared model and collaborator traits for live schema editing
//!
//! This crate provides the types every other LiveDB crate depends on:
//!
//! - `Connection` - Trait for the external database connection collaborator
//! - `Catalog` - In-memory catalog snapshot (schemas, tables, columns, indexes,
//!   foreign keys, views, routines, triggers) with stable object ids
//! - `DdlParser` - Trait for the external DDL-to-catalog parser collaborator
//! - `UndoStack` / `EditTransaction` - Explicit undo transactions
//! - `LiveEditSession` - Client/server snapshot pair for one live-edited object
//! - `LiveDbOptions` / `OptionsStore` - Process-wide options
//! - Common types like `Value`, `Row`, `QueryResult`, etc.

mod catalog;
mod connection;
mod datatypes;
mod error;
mod options;
mod parser;
mod session;
pub mod sql;
mod types;
mod undo;
mod version;

pub use catalog::*;
pub use connection::*;
pub use datatypes::*;
pub use error::*;
pub use options::*;
pub use parser::*;
pub use session::*;
pub use types::*;
pub use undo::*;
pub use version::*;
