//! Stub tables for live editing
//!
//! A live-edited table may reference any table of the server through its
//! foreign keys. The tables of a schema are first added to the session's
//! client catalog as empty stubs; a stub is expanded (its DDL fetched and
//! parsed) only when an edit needs its columns. Stub tables stay out of
//! alter script generation.

use std::sync::Arc;

use async_trait::async_trait;
use livedb_core::{DdlParser, LiveDbError, LiveEditSession, LiveObjectType, SqlMode, Table};
use livedb_table_designer::LiveObjectSource;

use crate::error::{ServiceError, ServiceResult};
use crate::schema_fetcher::{FetchStatus, SchemaFetcher};

/// Loads stub tables into live edit sessions
#[derive(Clone)]
pub struct LiveTableStubs {
    fetcher: SchemaFetcher,
    parser: Arc<dyn DdlParser>,
}

impl LiveTableStubs {
    pub fn new(fetcher: SchemaFetcher, parser: Arc<dyn DdlParser>) -> Self {
        Self { fetcher, parser }
    }

    /// Add a stub for every table of `schema` not yet in the client catalog.
    ///
    /// The table list of a schema is fetched once per session. Returns the
    /// number of stubs added.
    #[tracing::instrument(skip(self, session), fields(schema = %schema))]
    pub async fn create_live_table_stubs(
        &self,
        session: &mut LiveEditSession,
        schema: &str,
    ) -> ServiceResult<usize> {
        if session.has_live_table_list(schema) {
            return Ok(0);
        }

        let contents = self.fetcher.fetch_schema_contents(schema).await;
        if let FetchStatus::Failed { message, .. } | FetchStatus::ObjectInvalid { message, .. } =
            contents.status
        {
            return Err(ServiceError::Core(LiveDbError::Query(message)));
        }

        let catalog_schema = session.client_mut().ensure_schema(schema);
        let mut added = 0;
        for name in contents.value.tables {
            if catalog_schema.table(&name).is_none() {
                catalog_schema.tables.push(Table::stub(name));
                added += 1;
            }
        }
        session.mark_live_table_list(schema);

        tracing::debug!(added, "created live table stubs");
        Ok(added)
    }

    async fn session_sql_mode(&self) -> SqlMode {
        match self.fetcher.fetch_sql_mode().await {
            Ok(mode) => SqlMode::from_session_value(&mode),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read sql_mode, using defaults");
                SqlMode::default()
            }
        }
    }
}

#[async_trait]
impl LiveObjectSource for LiveTableStubs {
    #[tracing::instrument(skip(self, session), fields(schema = %schema, table = %table))]
    async fn expand_live_table_stub(
        &self,
        session: &mut LiveEditSession,
        schema: &str,
        table: &str,
    ) -> livedb_core::Result<()> {
        if let Some(existing) = session.client().table(schema, table)
            && (existing.is_stub_expanded || !existing.is_stub)
        {
            return Ok(());
        }

        let ddl = self
            .fetcher
            .fetch_object_ddl(LiveObjectType::Table, schema, table)
            .await?
            .ok_or_else(|| LiveDbError::NotFound(format!("table `{}`.`{}`", schema, table)))?;

        let mode = self.session_sql_mode().await;
        let client = session.client_mut();
        client.ensure_schema(schema);
        let outcome = self.parser.parse_into_catalog(client, &ddl, schema, &mode);
        if !outcome.is_ok() {
            let message = outcome
                .issues
                .first()
                .map(|issue| issue.message.clone())
                .unwrap_or_default();
            tracing::warn!(error = %message, "cannot parse stub table DDL");
            return Err(LiveDbError::Parse(message));
        }

        let expanded = client
            .table_mut(schema, table)
            .ok_or_else(|| LiveDbError::NotFound(format!("table `{}`.`{}`", schema, table)))?;
        expanded.is_stub = true;
        expanded.is_stub_expanded = true;

        tracing::debug!(columns = expanded.columns.len(), "expanded live table stub");
        Ok(())
    }
}
