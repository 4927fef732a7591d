//! Auxiliary connection for metadata queries
//!
//! Metadata fetches run next to the user's own queries on a separate
//! connection handle. Only one statement is in flight on that handle at a
//! time, so every query goes through an async mutex.

use std::sync::Arc;

use livedb_core::{Connection, QueryResult, Result, StatementResult, Value};
use tokio::sync::{Mutex, MutexGuard};

/// Mutex-guarded connection shared by fetchers and the apply controller
#[derive(Clone)]
pub struct AuxConnection {
    connection: Arc<dyn Connection>,
    lock: Arc<Mutex<()>>,
}

impl AuxConnection {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn server_version(&self) -> Option<String> {
        self.connection.server_version()
    }

    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let _guard = self.lock.lock().await;
        tracing::trace!(sql = %sql, "aux query");
        self.connection.query(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let _guard = self.lock.lock().await;
        tracing::trace!(sql = %sql, "aux execute");
        self.connection.execute(sql, params).await
    }

    /// Hold the handle for a sequence of statements that must not interleave
    pub async fn acquire(&self) -> AuxConnectionGuard<'_> {
        AuxConnectionGuard {
            connection: &self.connection,
            _guard: self.lock.lock().await,
        }
    }
}

/// Exclusive use of the auxiliary connection until dropped
pub struct AuxConnectionGuard<'a> {
    connection: &'a Arc<dyn Connection>,
    _guard: MutexGuard<'a, ()>,
}

impl AuxConnectionGuard<'_> {
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.connection.query(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.connection.execute(sql, params).await
    }
}
