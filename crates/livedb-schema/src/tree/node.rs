//! Tree node types

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::details::{ColumnDetail, ForeignKeyDetail, IndexDetail, TriggerDetail};

/// Handle to a node of an [`ObjectTreeCache`](super::ObjectTreeCache)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Detail categories already fetched for a table or view node
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LoadedData: u8 {
        const COLUMNS = 1 << 0;
        const INDEXES = 1 << 1;
        const TRIGGERS = 1 << 2;
        const FOREIGN_KEYS = 1 << 3;
    }
}

/// Fixed child slot of a schema or table node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKind {
    Tables,
    Views,
    Procedures,
    Functions,
    Columns,
    Indexes,
    ForeignKeys,
    Triggers,
}

impl GroupKind {
    /// Slots of a schema node, in display order
    pub const SCHEMA_SLOTS: [GroupKind; 4] = [
        GroupKind::Tables,
        GroupKind::Views,
        GroupKind::Procedures,
        GroupKind::Functions,
    ];

    /// Slots of a table node, in display order
    pub const TABLE_SLOTS: [GroupKind; 4] = [
        GroupKind::Columns,
        GroupKind::Indexes,
        GroupKind::ForeignKeys,
        GroupKind::Triggers,
    ];

    pub fn caption(&self) -> &'static str {
        match self {
            GroupKind::Tables => "Tables",
            GroupKind::Views => "Views",
            GroupKind::Procedures => "Stored Procedures",
            GroupKind::Functions => "Functions",
            GroupKind::Columns => "Columns",
            GroupKind::Indexes => "Indexes",
            GroupKind::ForeignKeys => "Foreign Keys",
            GroupKind::Triggers => "Triggers",
        }
    }

    /// Type of the objects held in this slot
    pub fn child_type(&self) -> ObjectType {
        match self {
            GroupKind::Tables => ObjectType::Table,
            GroupKind::Views => ObjectType::View,
            GroupKind::Procedures => ObjectType::Procedure,
            GroupKind::Functions => ObjectType::Function,
            GroupKind::Columns => ObjectType::TableColumn,
            GroupKind::Indexes => ObjectType::Index,
            GroupKind::ForeignKeys => ObjectType::ForeignKey,
            GroupKind::Triggers => ObjectType::Trigger,
        }
    }
}

/// Type of a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    /// The invisible root holding schema nodes
    Root,
    Schema,
    Table,
    View,
    Procedure,
    Function,
    Column,
    Index,
    Trigger,
    ForeignKey,
    TableColumn,
    ViewColumn,
    Group(GroupKind),
}

impl ObjectType {
    /// Objects addressable by (schema, type, name)
    pub fn is_schema_level(&self) -> bool {
        matches!(
            self,
            ObjectType::Schema
                | ObjectType::Table
                | ObjectType::View
                | ObjectType::Procedure
                | ObjectType::Function
        )
    }

    /// Slot of a schema node holding objects of this type
    pub fn schema_slot(&self) -> Option<GroupKind> {
        match self {
            ObjectType::Table => Some(GroupKind::Tables),
            ObjectType::View => Some(GroupKind::Views),
            ObjectType::Procedure => Some(GroupKind::Procedures),
            ObjectType::Function => Some(GroupKind::Functions),
            _ => None,
        }
    }

    /// Name used as the heading of a node description
    pub fn display_name(&self) -> &'static str {
        match self {
            ObjectType::Root => "Root",
            ObjectType::Schema => "Schema",
            ObjectType::Table => "Table",
            ObjectType::View => "View",
            ObjectType::Procedure => "Procedure",
            ObjectType::Function => "Function",
            ObjectType::Column | ObjectType::TableColumn | ObjectType::ViewColumn => "Column",
            ObjectType::Index => "Index",
            ObjectType::Trigger => "Trigger",
            ObjectType::ForeignKey => "Foreign Key",
            ObjectType::Group(kind) => kind.caption(),
        }
    }
}

/// Detail cached on a leaf node
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeData {
    #[default]
    None,
    Column(ColumnDetail),
    Index(IndexDetail),
    Trigger(TriggerDetail),
    ForeignKey(ForeignKeyDetail),
}

/// A node of the live schema tree
#[derive(Debug, Clone)]
pub struct SchemaObjectNode {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) object_type: ObjectType,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) loaded: LoadedData,
    pub(crate) columns_load_error: bool,
    pub(crate) error_details: Option<String>,
    pub(crate) fetching: bool,
    pub(crate) contents_loaded: bool,
    pub(crate) data: NodeData,
    pub(crate) details_html: Option<String>,
}

impl SchemaObjectNode {
    pub(crate) fn new(id: NodeId, name: String, object_type: ObjectType, parent: Option<NodeId>) -> Self {
        Self {
            id,
            name,
            object_type,
            parent,
            children: Vec::new(),
            loaded: LoadedData::empty(),
            columns_load_error: false,
            error_details: None,
            fetching: false,
            contents_loaded: false,
            data: NodeData::None,
            details_html: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn loaded_data(&self) -> LoadedData {
        self.loaded
    }

    /// Sticky flag set when the server reported the object as invalid
    pub fn columns_load_error(&self) -> bool {
        self.columns_load_error
    }

    /// Server message recorded with `columns_load_error`
    pub fn error_details(&self) -> Option<&str> {
        self.error_details.as_deref()
    }

    /// A fetch for this node has been requested and not yet applied
    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    /// The schema's object lists have been fetched at least once
    pub fn contents_loaded(&self) -> bool {
        self.contents_loaded
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }
}
