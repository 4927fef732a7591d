//! Background fetch worker
//!
//! Network I/O for the live schema tree runs off the control loop. Requests
//! go in on an unbounded channel, each one runs as its own task, and the
//! packaged results come back on a second channel that the control loop
//! drains and applies to the tree (see [`crate::tree_sync`]).
//!
//! Results may arrive out of request order. Applying them is idempotent and
//! last-writer-wins per node and category, so a late result can only show
//! older detail until the newer one lands.

use livedb_schema::{
    ColumnDetail, ForeignKeyDetail, IndexDetail, LoadedData, ObjectType, SchemaContents,
    TriggerDetail,
};
use futures::future::OptionFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::schema_fetcher::{Fetched, SchemaFetcher};

/// Work item for the fetch worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    SchemaList,
    SchemaContents {
        schema: String,
    },
    /// Detail categories of a table or view
    ObjectDetails {
        schema: String,
        object_type: ObjectType,
        name: String,
        categories: LoadedData,
    },
}

/// Identity of a table or view node in a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub schema: String,
    pub object_type: ObjectType,
    pub name: String,
}

/// Result of a request, delivered as data whether it succeeded or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    SchemaList(Fetched<Vec<String>>),
    SchemaContents {
        schema: String,
        contents: Fetched<SchemaContents>,
    },
    Columns {
        object: ObjectKey,
        columns: Fetched<Vec<ColumnDetail>>,
    },
    Indexes {
        object: ObjectKey,
        indexes: Fetched<Vec<IndexDetail>>,
    },
    Triggers {
        object: ObjectKey,
        triggers: Fetched<Vec<TriggerDetail>>,
    },
    ForeignKeys {
        object: ObjectKey,
        foreign_keys: Fetched<Vec<ForeignKeyDetail>>,
    },
}

/// Run a request to completion on the current task.
///
/// For callers that are already off the control loop; everyone else
/// submits to a [`LiveSchemaWorker`].
pub async fn run_request(fetcher: &SchemaFetcher, request: FetchRequest) -> Vec<FetchResponse> {
    match request {
        FetchRequest::SchemaList => vec![FetchResponse::SchemaList(fetcher.fetch_schema_list().await)],
        FetchRequest::SchemaContents { schema } => {
            let contents = fetcher.fetch_schema_contents(&schema).await;
            vec![FetchResponse::SchemaContents { schema, contents }]
        }
        FetchRequest::ObjectDetails {
            schema,
            object_type,
            name,
            categories,
        } => {
            let object = ObjectKey {
                schema,
                object_type,
                name,
            };
            // Views only have columns
            let wants = |category: LoadedData| {
                categories.contains(category)
                    && (category == LoadedData::COLUMNS || object_type == ObjectType::Table)
            };
            let (columns, indexes, triggers, foreign_keys) = futures::join!(
                OptionFuture::from(
                    wants(LoadedData::COLUMNS)
                        .then(|| fetcher.fetch_column_data(&object.schema, &object.name))
                ),
                OptionFuture::from(
                    wants(LoadedData::INDEXES)
                        .then(|| fetcher.fetch_index_data(&object.schema, &object.name))
                ),
                OptionFuture::from(
                    wants(LoadedData::TRIGGERS)
                        .then(|| fetcher.fetch_trigger_data(&object.schema, &object.name))
                ),
                OptionFuture::from(
                    wants(LoadedData::FOREIGN_KEYS)
                        .then(|| fetcher.fetch_foreign_key_data(&object.schema, &object.name))
                ),
            );

            let mut responses = Vec::new();
            if let Some(columns) = columns {
                responses.push(FetchResponse::Columns {
                    object: object.clone(),
                    columns,
                });
            }
            if let Some(indexes) = indexes {
                responses.push(FetchResponse::Indexes {
                    object: object.clone(),
                    indexes,
                });
            }
            if let Some(triggers) = triggers {
                responses.push(FetchResponse::Triggers {
                    object: object.clone(),
                    triggers,
                });
            }
            if let Some(foreign_keys) = foreign_keys {
                responses.push(FetchResponse::ForeignKeys {
                    object,
                    foreign_keys,
                });
            }
            responses
        }
    }
}

/// Handle for submitting fetch requests to the background worker
#[derive(Debug, Clone)]
pub struct LiveSchemaWorker {
    requests: mpsc::UnboundedSender<FetchRequest>,
}

impl LiveSchemaWorker {
    /// Start the worker on the current runtime.
    ///
    /// Returns the submission handle, the receiver the control loop drains,
    /// and the dispatcher task, which ends once every handle is dropped.
    pub fn spawn(
        fetcher: SchemaFetcher,
    ) -> (Self, mpsc::UnboundedReceiver<FetchResponse>, JoinHandle<()>) {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<FetchRequest>();
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        let dispatcher = tokio::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                let fetcher = fetcher.clone();
                let responses = response_tx.clone();
                let span = match &request {
                    FetchRequest::SchemaList => tracing::info_span!("live schemata refresh"),
                    other => tracing::info_span!("live schema fetch", request = ?other),
                };
                tokio::spawn(
                    async move {
                        for response in run_request(&fetcher, request).await {
                            if responses.send(response).is_err() {
                                tracing::debug!("result channel closed, dropping fetch result");
                                break;
                            }
                        }
                    }
                    .instrument(span),
                );
            }
            tracing::debug!("live schema worker stopped");
        });

        (
            Self {
                requests: request_tx,
            },
            response_rx,
            dispatcher,
        )
    }

    /// Queue a request; returns false once the worker has stopped
    pub fn submit(&self, request: FetchRequest) -> bool {
        tracing::trace!(?request, "queue fetch request");
        self.requests.send(request).is_ok()
    }
}
