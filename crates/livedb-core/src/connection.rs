//! Connection trait for the external database client

use crate::{QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;

/// A live database connection.
///
/// Connection pooling and the wire protocol belong to the driver; LiveDB only
/// needs to run metadata queries and DDL statements through this trait.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a statement that does not return rows (DDL, SET, USE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows (SELECT, SHOW)
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Version string reported by the server (e.g. "8.0.34-log")
    fn server_version(&self) -> Option<String> {
        None
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
