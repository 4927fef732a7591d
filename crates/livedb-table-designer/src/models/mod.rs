//! Models for the table editor grids
//!
//! Field identifiers and values for the tabular column, index and foreign
//! key accessors of [`TableEditingModel`](crate::TableEditingModel).

mod fields;

pub use fields::{ColumnField, FieldValue, ForeignKeyField, IndexField, RuleKind};
