//! Source of tables that are not loaded in the client catalog yet

use async_trait::async_trait;
use livedb_core::{LiveEditSession, Result};

/// Materializes stub tables on demand.
///
/// Foreign keys of a live-edited table may reference any table on the
/// server. Before a reference is linked the referenced table is expanded:
/// its DDL is fetched and parsed into the session's client catalog.
#[async_trait]
pub trait LiveObjectSource: Send + Sync {
    /// Make `schema.table` available in the client catalog.
    ///
    /// Returns immediately when the table is already expanded. Fails when
    /// the server has no such table or its DDL can't be parsed.
    async fn expand_live_table_stub(
        &self,
        session: &mut LiveEditSession,
        schema: &str,
        table: &str,
    ) -> Result<()>;
}
