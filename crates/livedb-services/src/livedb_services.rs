//! LiveDB Services Layer
//!
//! This crate connects the live schema model to a running server: it fetches
//! metadata for the live schema tree and applies edited objects back.
//!
//! # Architecture
//!
//! ```text
//! Control loop (tree, edit sessions)
//!     ↓ FetchRequest            ↑ FetchResponse
//! Service Layer (livedb-services) ← This crate
//!     ↓
//! Domain Layer (livedb-schema, livedb-schema-tools, livedb-table-designer)
//!     ↓
//! Core (livedb-core: catalog, Connection, DdlParser)
//! ```
//!
//! # Services
//!
//! - [`SchemaFetcher`] - Metadata queries packaged as tree detail records
//! - [`LiveSchemaWorker`] - Background fetch tasks with a result channel
//! - [`LiveTreeSync`] - Applies fetch results to the tree on the control loop
//! - [`LiveTableStubs`] - Stub tables for foreign key targets
//! - [`AlterApplyController`] - Validate, diff, execute and read back edits
//!
//! # Design Principles
//!
//! 1. **Fetches never throw** - Failures come back as data plus an action log entry
//! 2. **Only the control loop mutates** - Workers read the server, never the tree
//! 3. **One query per connection** - The auxiliary connection is mutex-guarded

mod action_log;
mod alter_apply;
mod aux_connection;
mod error;
mod live_stubs;
pub mod live_worker;
pub mod logging;
mod notifications;
mod schema_fetcher;
pub mod tree_sync;

pub use action_log::{ActionEntry, ActionKind, ActionLog, MemoryActionLog};
pub use alter_apply::{AlterApplyController, ApplyOutcome};
pub use aux_connection::{AuxConnection, AuxConnectionGuard};
pub use error::{ServiceError, ServiceResult};
pub use live_stubs::LiveTableStubs;
pub use live_worker::{FetchRequest, FetchResponse, LiveSchemaWorker, ObjectKey, run_request};
pub use notifications::{Notification, NotificationBus};
pub use schema_fetcher::{
    FetchStatus, Fetched, METADATA_SCHEMATA, OBJECT_INVALID_ERROR_CODES, SchemaFetcher,
    format_column_type, parse_foreign_keys,
};
pub use tree_sync::{LiveTreeSync, apply_fetch_response, begin_fetch};
