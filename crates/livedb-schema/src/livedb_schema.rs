//! LiveDB Schema - live schema object tree
//!
//! This crate provides:
//! - `ObjectTreeCache`, an in-memory tree mirroring server schemas and their
//!   tables, views, routines, columns, indexes, triggers and foreign keys
//! - Detail records cached per node (`ColumnDetail`, `IndexDetail`, ...)
//! - Per-node loaded masks, error flags and HTML descriptions
//!
//! The tree is mutated only by the control thread. Background fetches package
//! their results as detail records which are then applied here.

pub mod tree;

pub use tree::{
    ColumnDetail, ForeignKeyDetail, GroupKind, IndexDetail, LoadedData, NodeData, NodeId,
    ObjectTreeCache, ObjectType, SchemaContents, SchemaObjectNode, SharedObjectTreeCache,
    TreeConfig, TreeError, TreeResult, TreeStats, TriggerDetail, new_shared_tree,
};
