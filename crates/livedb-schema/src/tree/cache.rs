//! Object tree cache
//!
//! Nodes live in an arena keyed by [`NodeId`]. Schema-level objects (schemas,
//! tables, views, routines) are also indexed by (schema, type, name) so that
//! lookups do not depend on the order in which nodes were inserted.

use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use livedb_core::LiveDbOptions;

use super::details::{self, ColumnDetail, ForeignKeyDetail, IndexDetail, SchemaContents, TriggerDetail};
use super::node::{GroupKind, LoadedData, NodeData, NodeId, ObjectType, SchemaObjectNode};

/// Errors from tree operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("{0:?} nodes are not addressable by schema and name")]
    UnsupportedType(ObjectType),

    #[error("node {node} is a {actual:?}, expected {expected}")]
    WrongNodeType {
        node: NodeId,
        actual: ObjectType,
        expected: &'static str,
    },
}

/// Result type for tree operations
pub type TreeResult<T> = Result<T, TreeError>;

/// Configuration for the object tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// Keep schema-level children sorted by name
    pub sort_children: bool,
    /// Compare names case-sensitively when sorting
    pub case_sensitive: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            sort_children: true,
            case_sensitive: false,
        }
    }
}

impl TreeConfig {
    pub fn from_options(options: &LiveDbOptions) -> Self {
        Self {
            sort_children: options.sort_tree_children,
            case_sensitive: options.case_sensitive_identifiers,
        }
    }
}

/// Node counts for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub schemas: usize,
    pub tables: usize,
    pub views: usize,
    pub routines: usize,
    pub columns: usize,
    pub indexes: usize,
    pub triggers: usize,
    pub foreign_keys: usize,
    pub total_nodes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeKey {
    schema: String,
    object_type: ObjectType,
    name: String,
}

/// In-memory tree mirroring the server's schema objects
#[derive(Debug)]
pub struct ObjectTreeCache {
    config: TreeConfig,
    nodes: HashMap<NodeId, SchemaObjectNode>,
    keys: HashMap<NodeKey, NodeId>,
    root: NodeId,
    next_id: u64,
}

/// Tree shared with the control loop
pub type SharedObjectTreeCache = Arc<RwLock<ObjectTreeCache>>;

/// Create a new shared tree
pub fn new_shared_tree(config: TreeConfig) -> SharedObjectTreeCache {
    Arc::new(RwLock::new(ObjectTreeCache::new(config)))
}

impl Default for ObjectTreeCache {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

impl ObjectTreeCache {
    pub fn new(config: TreeConfig) -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            SchemaObjectNode::new(root, String::new(), ObjectType::Root, None),
        );
        Self {
            config,
            nodes,
            keys: HashMap::new(),
            root,
            next_id: 1,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&SchemaObjectNode> {
        self.nodes.get(&id)
    }

    /// Children of a node, empty for unknown nodes
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.children()).unwrap_or(&[])
    }

    pub fn child_names(&self, id: NodeId) -> Vec<String> {
        self.children(id)
            .iter()
            .filter_map(|c| self.nodes.get(c).map(|n| n.name.clone()))
            .collect()
    }

    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    /// The fixed slot node of a schema or table
    pub fn group(&self, node: NodeId, kind: GroupKind) -> Option<NodeId> {
        self.children(node).iter().copied().find(|c| {
            self.nodes
                .get(c)
                .is_some_and(|n| n.object_type == ObjectType::Group(kind))
        })
    }

    /// Look up a schema-level node
    pub fn find_node(&self, schema: &str, object_type: ObjectType, name: &str) -> Option<NodeId> {
        self.keys.get(&Self::key(schema, object_type, name)).copied()
    }

    // ========== Node Creation ==========

    /// Get the node for (schema, type, name), creating it and its schema if needed
    pub fn get_or_create_node(
        &mut self,
        schema: &str,
        object_type: ObjectType,
        name: &str,
    ) -> TreeResult<NodeId> {
        if !object_type.is_schema_level() {
            return Err(TreeError::UnsupportedType(object_type));
        }
        if let Some(id) = self.find_node(schema, object_type, name) {
            return Ok(id);
        }

        let schema_id = match self.find_node(schema, ObjectType::Schema, schema) {
            Some(id) => id,
            None => {
                let root = self.root;
                let id = self.allocate(schema, ObjectType::Schema, root);
                self.insert_child(root, id, self.config.sort_children);
                id
            }
        };
        if object_type == ObjectType::Schema {
            return Ok(schema_id);
        }

        let slot = object_type
            .schema_slot()
            .ok_or(TreeError::UnsupportedType(object_type))?;
        let group = self
            .group(schema_id, slot)
            .ok_or(TreeError::NodeNotFound(schema_id))?;
        let id = self.allocate(name, object_type, group);
        self.insert_child(group, id, self.config.sort_children);

        tracing::trace!(schema = %schema, name = %name, object_type = ?object_type, "created tree node");
        Ok(id)
    }

    // ========== Reconciliation ==========

    /// Reconcile a node's children against a freshly fetched name list.
    ///
    /// With `replace`, children whose name is missing from `names` are
    /// removed; otherwise missing names are only appended. Children whose
    /// name is still present keep their node, and with it any detail
    /// already loaded. Returns whether anything changed.
    pub fn update_children(
        &mut self,
        parent: NodeId,
        child_type: ObjectType,
        names: &[String],
        replace: bool,
    ) -> TreeResult<bool> {
        let sorted = self.config.sort_children && child_type.is_schema_level();
        self.reconcile(parent, child_type, names, replace, sorted)
    }

    /// Replace the schema list wholesale
    pub fn update_schema_list(&mut self, names: &[String]) -> bool {
        let root = self.root;
        let changed = self
            .update_children(root, ObjectType::Schema, names, true)
            .unwrap_or(false);
        tracing::debug!(schema_count = names.len(), changed, "updated schema list");
        changed
    }

    /// Apply the object lists of one schema
    pub fn apply_schema_contents(&mut self, schema: &str, contents: &SchemaContents) -> TreeResult<bool> {
        let schema_id = self.get_or_create_node(schema, ObjectType::Schema, schema)?;

        let mut changed = false;
        for (kind, names) in [
            (GroupKind::Tables, &contents.tables),
            (GroupKind::Views, &contents.views),
            (GroupKind::Procedures, &contents.procedures),
            (GroupKind::Functions, &contents.functions),
        ] {
            let group = self
                .group(schema_id, kind)
                .ok_or(TreeError::NodeNotFound(schema_id))?;
            changed |= self.update_children(group, kind.child_type(), names, true)?;
        }

        let node = self.node_mut(schema_id)?;
        node.contents_loaded = true;
        node.fetching = false;

        tracing::debug!(
            schema = %schema,
            tables = contents.tables.len(),
            views = contents.views.len(),
            procedures = contents.procedures.len(),
            functions = contents.functions.len(),
            changed,
            "applied schema contents"
        );
        Ok(changed)
    }

    fn reconcile(
        &mut self,
        parent: NodeId,
        child_type: ObjectType,
        names: &[String],
        replace: bool,
        sorted: bool,
    ) -> TreeResult<bool> {
        let existing = self.node(parent).ok_or(TreeError::NodeNotFound(parent))?.children.clone();

        let mut by_name: HashMap<String, NodeId> = HashMap::new();
        let mut duplicates = Vec::new();
        for id in &existing {
            if let Some(node) = self.nodes.get(id) {
                if by_name.contains_key(&node.name) {
                    duplicates.push(*id);
                } else {
                    by_name.insert(node.name.clone(), *id);
                }
            }
        }

        let mut changed = false;
        let mut seen = HashSet::new();
        let mut new_children = if replace {
            Vec::with_capacity(names.len())
        } else {
            existing.clone()
        };

        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            match (replace, by_name.remove(name)) {
                (true, Some(id)) => new_children.push(id),
                (false, Some(_)) => {}
                (_, None) => {
                    let id = self.allocate(name, child_type, parent);
                    new_children.push(id);
                    changed = true;
                }
            }
        }

        if replace {
            let stale: Vec<NodeId> = by_name.into_values().chain(duplicates).collect();
            for id in stale {
                self.destroy(id);
                changed = true;
            }
        }

        if sorted {
            let mut named: Vec<(String, NodeId)> = new_children
                .iter()
                .filter_map(|id| self.nodes.get(id).map(|n| (n.name.clone(), *id)))
                .collect();
            named.sort_by(|a, b| self.compare_names(&a.0, &b.0));
            new_children = named.into_iter().map(|(_, id)| id).collect();
        }

        if new_children != existing {
            changed = true;
        }

        self.node_mut(parent)?.children = new_children;
        if changed {
            self.invalidate_details(parent);
        }

        tracing::trace!(parent = %parent, child_count = names.len(), changed, "reconciled children");
        Ok(changed)
    }

    // ========== Detail Data ==========

    /// Store fetched columns of a table or view and mark them loaded
    pub fn set_column_data(&mut self, node: NodeId, columns: &[ColumnDetail]) -> TreeResult<()> {
        let (container, child_type) = match self.node(node).map(|n| n.object_type) {
            Some(ObjectType::Table) => (
                self.group(node, GroupKind::Columns)
                    .ok_or(TreeError::NodeNotFound(node))?,
                ObjectType::TableColumn,
            ),
            Some(ObjectType::View) => (node, ObjectType::ViewColumn),
            Some(actual) => {
                return Err(TreeError::WrongNodeType {
                    node,
                    actual,
                    expected: "table or view",
                });
            }
            None => return Err(TreeError::NodeNotFound(node)),
        };

        let entries = columns
            .iter()
            .map(|c| (c.name.clone(), NodeData::Column(c.clone())))
            .collect();
        self.store_entries(container, child_type, entries)?;

        let target = self.node_mut(node)?;
        target.loaded |= LoadedData::COLUMNS;
        target.columns_load_error = false;
        target.error_details = None;
        target.details_html = None;

        tracing::debug!(node = %node, column_count = columns.len(), "cached columns");
        Ok(())
    }

    /// Record that the server reported the object as invalid (e.g. a broken view)
    pub fn set_columns_load_error(&mut self, node: NodeId, message: impl Into<String>) -> TreeResult<()> {
        let target = self.node_mut(node)?;
        target.columns_load_error = true;
        target.error_details = Some(message.into());
        target.details_html = None;
        Ok(())
    }

    /// Record a failed fetch; cached data and the loaded mask are kept
    pub fn set_fetch_error(&mut self, node: NodeId, message: impl Into<String>) -> TreeResult<()> {
        let target = self.node_mut(node)?;
        target.error_details = Some(message.into());
        target.details_html = None;
        Ok(())
    }

    /// Drop the message of an earlier failed fetch. The sticky column error stays.
    pub fn clear_fetch_error(&mut self, node: NodeId) -> TreeResult<()> {
        let target = self.node_mut(node)?;
        if !target.columns_load_error && target.error_details.take().is_some() {
            target.details_html = None;
        }
        Ok(())
    }

    pub fn set_index_data(&mut self, table: NodeId, indexes: &[IndexDetail]) -> TreeResult<()> {
        let entries = indexes
            .iter()
            .map(|i| (i.name.clone(), NodeData::Index(i.clone())))
            .collect();
        self.store_slot(table, GroupKind::Indexes, LoadedData::INDEXES, entries)?;
        tracing::debug!(node = %table, index_count = indexes.len(), "cached indexes");
        Ok(())
    }

    pub fn set_trigger_data(&mut self, table: NodeId, triggers: &[TriggerDetail]) -> TreeResult<()> {
        let entries = triggers
            .iter()
            .map(|t| (t.name.clone(), NodeData::Trigger(t.clone())))
            .collect();
        self.store_slot(table, GroupKind::Triggers, LoadedData::TRIGGERS, entries)?;
        tracing::debug!(node = %table, trigger_count = triggers.len(), "cached triggers");
        Ok(())
    }

    pub fn set_foreign_key_data(&mut self, table: NodeId, foreign_keys: &[ForeignKeyDetail]) -> TreeResult<()> {
        let entries = foreign_keys
            .iter()
            .map(|fk| (fk.name.clone(), NodeData::ForeignKey(fk.clone())))
            .collect();
        self.store_slot(table, GroupKind::ForeignKeys, LoadedData::FOREIGN_KEYS, entries)?;
        tracing::debug!(node = %table, foreign_key_count = foreign_keys.len(), "cached foreign keys");
        Ok(())
    }

    fn store_slot(
        &mut self,
        table: NodeId,
        kind: GroupKind,
        category: LoadedData,
        entries: Vec<(String, NodeData)>,
    ) -> TreeResult<()> {
        match self.node(table).map(|n| n.object_type) {
            Some(ObjectType::Table) => {}
            Some(actual) => {
                return Err(TreeError::WrongNodeType {
                    node: table,
                    actual,
                    expected: "table",
                });
            }
            None => return Err(TreeError::NodeNotFound(table)),
        }
        let container = self.group(table, kind).ok_or(TreeError::NodeNotFound(table))?;
        self.store_entries(container, kind.child_type(), entries)?;

        let target = self.node_mut(table)?;
        target.loaded |= category;
        target.details_html = None;
        Ok(())
    }

    fn store_entries(
        &mut self,
        container: NodeId,
        child_type: ObjectType,
        entries: Vec<(String, NodeData)>,
    ) -> TreeResult<()> {
        let names: Vec<String> = entries.iter().map(|(name, _)| name.clone()).collect();
        self.reconcile(container, child_type, &names, true, false)?;

        let mut data: HashMap<String, NodeData> = entries.into_iter().collect();
        for child in self.children(container).to_vec() {
            let Some(node) = self.nodes.get_mut(&child) else {
                continue;
            };
            if let Some(value) = data.remove(&node.name)
                && node.data != value
            {
                node.data = value;
                node.details_html = None;
            }
        }
        Ok(())
    }

    // ========== Loaded Mask ==========

    pub fn set_loaded(&mut self, node: NodeId, category: LoadedData) -> TreeResult<()> {
        self.node_mut(node)?.loaded |= category;
        Ok(())
    }

    pub fn clear_loaded(&mut self, node: NodeId, category: LoadedData) -> TreeResult<()> {
        self.node_mut(node)?.loaded.remove(category);
        Ok(())
    }

    /// Whether every category in `category` has been fetched successfully
    pub fn is_loaded(&self, node: NodeId, category: LoadedData) -> bool {
        self.node(node).is_some_and(|n| n.loaded.contains(category))
    }

    pub fn set_fetching(&mut self, node: NodeId, fetching: bool) -> TreeResult<()> {
        self.node_mut(node)?.fetching = fetching;
        Ok(())
    }

    // ========== Details ==========

    /// HTML description of a node.
    ///
    /// `full` adds the heading (and, for columns, collation) used by the
    /// object info panel; without it only the detail table is returned.
    pub fn details_html(&mut self, id: NodeId, full: bool) -> Option<String> {
        let (object_type, name) = {
            let node = self.nodes.get(&id)?;
            (node.object_type, node.name.clone())
        };

        match object_type {
            ObjectType::Table | ObjectType::View => Some(self.object_details(id, full)),
            ObjectType::Column | ObjectType::TableColumn | ObjectType::ViewColumn => {
                if full {
                    match &self.nodes.get(&id)?.data {
                        NodeData::Column(column) => Some(column.full_details(object_type.display_name())),
                        _ => Some(details::heading(object_type.display_name(), &name)),
                    }
                } else {
                    self.leaf_fragment(id)
                }
            }
            ObjectType::Index | ObjectType::Trigger | ObjectType::ForeignKey => {
                let fragment = self.leaf_fragment(id).unwrap_or_default();
                if full {
                    Some(details::definition_block(object_type.display_name(), &name, &fragment))
                } else {
                    Some(fragment)
                }
            }
            _ if full => Some(details::heading(object_type.display_name(), &name)),
            _ => Some(String::new()),
        }
    }

    fn leaf_fragment(&mut self, id: NodeId) -> Option<String> {
        let node = self.nodes.get_mut(&id)?;
        if let Some(cached) = &node.details_html {
            return Some(cached.clone());
        }
        let fragment = match &node.data {
            NodeData::Column(column) => column.details_fragment(),
            NodeData::Index(index) => index.details_fragment(),
            NodeData::Trigger(trigger) => trigger.details_fragment(),
            NodeData::ForeignKey(fk) => fk.details_fragment(),
            NodeData::None => return None,
        };
        node.details_html = Some(fragment.clone());
        Some(fragment)
    }

    fn object_details(&mut self, id: NodeId, full: bool) -> String {
        let Some(node) = self.nodes.get(&id) else {
            return String::new();
        };
        let object_type = node.object_type;
        let mut html = if full {
            details::heading(object_type.display_name(), &node.name)
        } else {
            String::new()
        };
        let columns_loaded = node.loaded.contains(LoadedData::COLUMNS);
        let error = node
            .columns_load_error
            .then(|| node.error_details.clone().unwrap_or_default());

        if columns_loaded {
            let container = match object_type {
                ObjectType::Table => self.group(id, GroupKind::Columns),
                _ => Some(id),
            };
            let column_ids = container
                .map(|c| self.children(c).to_vec())
                .unwrap_or_default();
            let rows: Vec<String> = column_ids
                .into_iter()
                .filter_map(|c| self.leaf_fragment(c))
                .collect();
            html.push_str(&details::columns_table(&rows));
        }

        if let Some(error) = error {
            html.push_str(&details::escape_html(&error));
        }
        html
    }

    // ========== Removal ==========

    /// Remove a node and its subtree; the root cannot be removed
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if id == self.root {
            return false;
        }
        let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) else {
            return false;
        };
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|c| *c != id);
        }
        self.destroy(id);
        self.invalidate_details(parent);
        true
    }

    /// Drop every node except the root
    pub fn clear(&mut self) {
        let root = self.root;
        let count = self.nodes.len() - 1;
        self.nodes.retain(|id, _| *id == root);
        self.keys.clear();
        if let Some(node) = self.nodes.get_mut(&root) {
            node.children.clear();
        }
        tracing::info!(node_count = count, "cleared object tree");
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            total_nodes: self.nodes.len(),
            ..Default::default()
        };
        for node in self.nodes.values() {
            match node.object_type {
                ObjectType::Schema => stats.schemas += 1,
                ObjectType::Table => stats.tables += 1,
                ObjectType::View => stats.views += 1,
                ObjectType::Procedure | ObjectType::Function => stats.routines += 1,
                ObjectType::Column | ObjectType::TableColumn | ObjectType::ViewColumn => {
                    stats.columns += 1
                }
                ObjectType::Index => stats.indexes += 1,
                ObjectType::Trigger => stats.triggers += 1,
                ObjectType::ForeignKey => stats.foreign_keys += 1,
                ObjectType::Root | ObjectType::Group(_) => {}
            }
        }
        stats
    }

    // ========== Internals ==========

    fn key(schema: &str, object_type: ObjectType, name: &str) -> NodeKey {
        NodeKey {
            schema: schema.to_string(),
            object_type,
            name: if object_type == ObjectType::Schema {
                schema.to_string()
            } else {
                name.to_string()
            },
        }
    }

    fn node_mut(&mut self, id: NodeId) -> TreeResult<&mut SchemaObjectNode> {
        self.nodes.get_mut(&id).ok_or(TreeError::NodeNotFound(id))
    }

    fn compare_names(&self, a: &str, b: &str) -> Ordering {
        if self.config.case_sensitive {
            a.cmp(b)
        } else {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        }
    }

    /// Create a node (and its fixed slots) without linking it into the parent's children
    fn allocate(&mut self, name: &str, object_type: ObjectType, parent: NodeId) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            SchemaObjectNode::new(id, name.to_string(), object_type, Some(parent)),
        );

        let slots: &[GroupKind] = match object_type {
            ObjectType::Schema => &GroupKind::SCHEMA_SLOTS,
            ObjectType::Table => &GroupKind::TABLE_SLOTS,
            _ => &[],
        };
        for kind in slots {
            let slot = self.allocate(kind.caption(), ObjectType::Group(*kind), id);
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children.push(slot);
            }
        }

        if let Some(key) = self.key_of(id) {
            self.keys.insert(key, id);
        }
        id
    }

    fn insert_child(&mut self, parent: NodeId, child: NodeId, sorted: bool) {
        let child_name = self
            .nodes
            .get(&child)
            .map(|n| n.name.clone())
            .unwrap_or_default();
        let position = if sorted {
            let children = self.children(parent);
            children
                .iter()
                .position(|c| {
                    self.nodes.get(c).is_some_and(|n| {
                        self.compare_names(&n.name, &child_name) == Ordering::Greater
                    })
                })
                .unwrap_or(children.len())
        } else {
            self.children(parent).len()
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.insert(position, child);
        }
        self.invalidate_details(parent);
    }

    fn schema_name_of(&self, id: NodeId) -> Option<String> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.nodes.get(&node_id)?;
            if node.object_type == ObjectType::Schema {
                return Some(node.name.clone());
            }
            current = node.parent;
        }
        None
    }

    fn key_of(&self, id: NodeId) -> Option<NodeKey> {
        let node = self.nodes.get(&id)?;
        if !node.object_type.is_schema_level() {
            return None;
        }
        let schema = self.schema_name_of(id)?;
        Some(Self::key(&schema, node.object_type, &node.name))
    }

    /// Remove a subtree bottom-up so keys can still be resolved through parents
    fn destroy(&mut self, id: NodeId) {
        let children = self
            .nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in children {
            self.destroy(child);
        }
        if let Some(key) = self.key_of(id)
            && self.keys.get(&key) == Some(&id)
        {
            self.keys.remove(&key);
        }
        self.nodes.remove(&id);
    }

    /// Drop cached descriptions of a node and its ancestors
    fn invalidate_details(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.nodes.get_mut(&node_id) else {
                break;
            };
            node.details_html = None;
            current = node.parent;
        }
    }
}
