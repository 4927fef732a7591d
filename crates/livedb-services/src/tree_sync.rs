//! Applying fetch results to the live schema tree
//!
//! The control loop owns the tree. It marks nodes as fetching when a request
//! is queued and applies each [`FetchResponse`] as it arrives.

use livedb_core::LiveObjectType;
use livedb_schema::{LoadedData, NodeId, ObjectTreeCache, ObjectType, SharedObjectTreeCache, TreeResult};
use tokio::sync::mpsc;

use crate::live_worker::{FetchRequest, FetchResponse, LiveSchemaWorker, ObjectKey};
use crate::notifications::{Notification, NotificationBus};
use crate::schema_fetcher::{FetchStatus, Fetched};

/// Set the in-flight marker of the node a request will refresh
pub fn begin_fetch(tree: &mut ObjectTreeCache, request: &FetchRequest) -> TreeResult<()> {
    let node = match request {
        FetchRequest::SchemaList => tree.root(),
        FetchRequest::SchemaContents { schema } => {
            tree.get_or_create_node(schema, ObjectType::Schema, schema)?
        }
        FetchRequest::ObjectDetails {
            schema,
            object_type,
            name,
            ..
        } => tree.get_or_create_node(schema, *object_type, name)?,
    };
    tree.set_fetching(node, true)
}

/// Apply one fetch result to the tree.
///
/// Failed fetches leave cached data alone, clear the in-flight marker and
/// keep the error message on the node; an object the server reports as
/// invalid also gets its sticky column error flag. Returns the
/// notification to publish, if any.
pub fn apply_fetch_response(
    tree: &mut ObjectTreeCache,
    response: FetchResponse,
) -> TreeResult<Option<Notification>> {
    match response {
        FetchResponse::SchemaList(fetched) => {
            let root = tree.root();
            tree.set_fetching(root, false)?;
            if let Some(message) = failure_message(&fetched.status) {
                tracing::warn!(error = %message, "schema list refresh failed");
                tree.set_fetch_error(root, message)?;
                return Ok(None);
            }
            tree.clear_fetch_error(root)?;
            tree.update_schema_list(&fetched.value);
            Ok(Some(Notification::SchemaListRefreshed))
        }
        FetchResponse::SchemaContents { schema, contents } => {
            if let Some(message) = failure_message(&contents.status) {
                tracing::warn!(schema = %schema, error = %message, "schema contents refresh failed");
                if let Some(node) = tree.find_node(&schema, ObjectType::Schema, &schema) {
                    tree.set_fetching(node, false)?;
                    tree.set_fetch_error(node, message)?;
                }
                return Ok(None);
            }
            tree.apply_schema_contents(&schema, &contents.value)?;
            if let Some(node) = tree.find_node(&schema, ObjectType::Schema, &schema) {
                tree.clear_fetch_error(node)?;
            }
            Ok(Some(Notification::SchemaContentsRefreshed { schema }))
        }
        FetchResponse::Columns { object, columns } => {
            apply_details(tree, &object, columns, |tree, node, columns| {
                tree.set_column_data(node, columns)
            })
        }
        FetchResponse::Indexes { object, indexes } => {
            apply_details(tree, &object, indexes, |tree, node, indexes| {
                tree.set_index_data(node, indexes)
            })
        }
        FetchResponse::Triggers { object, triggers } => {
            apply_details(tree, &object, triggers, |tree, node, triggers| {
                tree.set_trigger_data(node, triggers)
            })
        }
        FetchResponse::ForeignKeys {
            object,
            foreign_keys,
        } => apply_details(tree, &object, foreign_keys, |tree, node, foreign_keys| {
            tree.set_foreign_key_data(node, foreign_keys)
        }),
    }
}

fn apply_details<T>(
    tree: &mut ObjectTreeCache,
    object: &ObjectKey,
    fetched: Fetched<Vec<T>>,
    store: impl FnOnce(&mut ObjectTreeCache, NodeId, &[T]) -> TreeResult<()>,
) -> TreeResult<Option<Notification>> {
    let node = match fetched.status {
        FetchStatus::Loaded => tree.get_or_create_node(&object.schema, object.object_type, &object.name)?,
        _ => match tree.find_node(&object.schema, object.object_type, &object.name) {
            Some(node) => node,
            None => return Ok(None),
        },
    };
    tree.set_fetching(node, false)?;

    match fetched.status {
        FetchStatus::Loaded => {
            tree.clear_fetch_error(node)?;
            store(tree, node, &fetched.value)?;
            Ok(Some(Notification::ObjectChanged {
                schema: object.schema.clone(),
                object_type: live_object_type(object.object_type),
                name: object.name.clone(),
            }))
        }
        FetchStatus::ObjectInvalid { message, .. } => {
            tree.set_columns_load_error(node, message)?;
            Ok(None)
        }
        FetchStatus::Failed { code, message } => {
            tracing::warn!(
                schema = %object.schema,
                name = %object.name,
                ?code,
                error = %message,
                "object detail fetch failed"
            );
            tree.set_fetch_error(node, message)?;
            Ok(None)
        }
    }
}

fn failure_message(status: &FetchStatus) -> Option<String> {
    match status {
        FetchStatus::Loaded => None,
        FetchStatus::ObjectInvalid { message, .. } | FetchStatus::Failed { message, .. } => {
            Some(message.clone())
        }
    }
}

fn live_object_type(object_type: ObjectType) -> LiveObjectType {
    match object_type {
        ObjectType::View => LiveObjectType::View,
        ObjectType::Procedure => LiveObjectType::Procedure,
        ObjectType::Function => LiveObjectType::Function,
        ObjectType::Schema => LiveObjectType::Schema,
        _ => LiveObjectType::Table,
    }
}

/// Control-loop side of the live schema tree.
///
/// Queues requests on the worker and applies the results it sends back,
/// publishing a notification for every change.
pub struct LiveTreeSync {
    tree: SharedObjectTreeCache,
    worker: LiveSchemaWorker,
    responses: mpsc::UnboundedReceiver<FetchResponse>,
    notifications: NotificationBus,
}

impl LiveTreeSync {
    pub fn new(
        tree: SharedObjectTreeCache,
        worker: LiveSchemaWorker,
        responses: mpsc::UnboundedReceiver<FetchResponse>,
        notifications: NotificationBus,
    ) -> Self {
        Self {
            tree,
            worker,
            responses,
            notifications,
        }
    }

    pub fn tree(&self) -> &SharedObjectTreeCache {
        &self.tree
    }

    pub fn notifications(&self) -> &NotificationBus {
        &self.notifications
    }

    /// Mark the target node as fetching and queue the request
    pub fn request(&self, request: FetchRequest) -> bool {
        if let Err(e) = begin_fetch(&mut self.tree.write(), &request) {
            tracing::warn!(error = %e, ?request, "cannot mark node as fetching");
        }
        self.worker.submit(request)
    }

    pub fn refresh_schema_list(&self) -> bool {
        self.request(FetchRequest::SchemaList)
    }

    pub fn refresh_schema_contents(&self, schema: &str) -> bool {
        self.request(FetchRequest::SchemaContents {
            schema: schema.to_string(),
        })
    }

    /// Queue the detail categories of a table or view not loaded yet
    pub fn load_object_details(
        &self,
        schema: &str,
        object_type: ObjectType,
        name: &str,
        categories: LoadedData,
    ) -> bool {
        let missing = {
            let tree = self.tree.read();
            match tree.find_node(schema, object_type, name) {
                Some(node) => tree
                    .node(node)
                    .map(|n| categories.difference(n.loaded_data()))
                    .unwrap_or(categories),
                None => categories,
            }
        };
        if missing.is_empty() {
            return false;
        }
        self.request(FetchRequest::ObjectDetails {
            schema: schema.to_string(),
            object_type,
            name: name.to_string(),
            categories: missing,
        })
    }

    /// Apply every result received so far; returns how many were applied
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(response) = self.responses.try_recv() {
            self.apply(response);
            applied += 1;
        }
        applied
    }

    /// Wait for the next result and apply it; false once the worker is gone
    pub async fn apply_next(&mut self) -> bool {
        match self.responses.recv().await {
            Some(response) => {
                self.apply(response);
                true
            }
            None => false,
        }
    }

    fn apply(&self, response: FetchResponse) {
        let result = apply_fetch_response(&mut self.tree.write(), response);
        match result {
            Ok(Some(notification)) => self.notifications.publish(notification),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "cannot apply fetch result"),
        }
    }
}
