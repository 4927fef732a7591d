//! Live schema tree
//!
//! Nodes are created lazily as the user navigates or as fetch results arrive,
//! and reconciled against fresh name lists without discarding the detail
//! already cached for unchanged children.

mod cache;
mod details;
mod node;

pub use cache::{
    ObjectTreeCache, SharedObjectTreeCache, TreeConfig, TreeError, TreeResult, TreeStats,
    new_shared_tree,
};
pub use details::{ColumnDetail, ForeignKeyDetail, IndexDetail, SchemaContents, TriggerDetail};
pub use node::{GroupKind, LoadedData, NodeData, NodeId, ObjectType, SchemaObjectNode};

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
