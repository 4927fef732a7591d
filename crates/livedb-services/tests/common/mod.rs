//! Common test utilities and mocks

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use livedb_core::{
    Catalog, ColumnMeta, Connection, LiveDbError, LiveDbOptions, OptionsStore, QueryResult,
    Result, Row, Schema, StatementResult, Value,
};
use livedb_services::{AuxConnection, MemoryActionLog, SchemaFetcher};

/// Mock connection for testing service-layer logic without a real server.
///
/// Queries are answered from SQL-pattern-based responses: the first
/// registered pattern contained in the statement wins. Patterns registered
/// as errors fail with a server error code instead.
pub struct MockConnection {
    pub driver: String,
    pub server_version: Option<String>,
    /// SQL-pattern-based responses, checked in registration order
    pub query_responses: Vec<(String, QueryResult)>,
    /// SQL patterns that fail with (code, message)
    pub errors: Vec<(String, u32, String)>,
    /// Log of all queries, for assertion in tests
    pub query_log: Arc<parking_lot::Mutex<Vec<String>>>,
    /// Log of all executed statements, including failed ones
    pub execute_log: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            driver: "mysql".to_string(),
            server_version: None,
            query_responses: vec![],
            errors: vec![],
            query_log: Arc::new(parking_lot::Mutex::new(Vec::new())),
            execute_log: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = Some(version.into());
        self
    }

    /// Register a response for queries containing the given SQL pattern.
    pub fn with_query_response(
        mut self,
        sql_contains: impl Into<String>,
        result: QueryResult,
    ) -> Self {
        self.query_responses.push((sql_contains.into(), result));
        self
    }

    /// Fail statements containing the given SQL pattern with a server error.
    pub fn with_server_error(
        mut self,
        sql_contains: impl Into<String>,
        code: u32,
        message: impl Into<String>,
    ) -> Self {
        self.errors.push((sql_contains.into(), code, message.into()));
        self
    }

    pub fn query_log(&self) -> Vec<String> {
        self.query_log.lock().clone()
    }

    pub fn execute_log(&self) -> Vec<String> {
        self.execute_log.lock().clone()
    }

    fn check_error(&self, sql: &str) -> Result<()> {
        match self.errors.iter().find(|(pattern, _, _)| sql.contains(pattern.as_str())) {
            Some((_, code, message)) => Err(LiveDbError::Server {
                code: *code,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        &self.driver
    }

    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<StatementResult> {
        self.execute_log.lock().push(sql.to_string());
        self.check_error(sql)?;
        Ok(StatementResult::default())
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.query_log.lock().push(sql.to_string());
        self.check_error(sql)?;
        Ok(self
            .query_responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(QueryResult::empty))
    }

    fn server_version(&self) -> Option<String> {
        self.server_version.clone()
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// A result set of text cells; `None` cells are NULL
pub fn text_rows(columns: &[&str], rows: &[&[Option<&str>]]) -> QueryResult {
    let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    let mut result = QueryResult::empty();
    result.columns = names
        .iter()
        .enumerate()
        .map(|(ordinal, name)| ColumnMeta {
            name: name.clone(),
            data_type: "VARCHAR".to_string(),
            nullable: true,
            ordinal,
        })
        .collect();
    result.rows = rows
        .iter()
        .map(|cells| {
            Row::new(
                names.clone(),
                cells
                    .iter()
                    .map(|cell| cell.map(Value::from).unwrap_or(Value::Null))
                    .collect(),
            )
        })
        .collect();
    result
}

/// A result set where every cell is set
pub fn rows(columns: &[&str], rows: &[&[&str]]) -> QueryResult {
    let cells: Vec<Vec<Option<&str>>> = rows
        .iter()
        .map(|row| row.iter().map(|cell| Some(*cell)).collect())
        .collect();
    let borrowed: Vec<&[Option<&str>]> = cells.iter().map(Vec::as_slice).collect();
    text_rows(columns, &borrowed)
}

/// `SHOW CREATE TABLE` answer for one table
pub fn create_table_result(table: &str, ddl: &str) -> QueryResult {
    rows(&["Table", "Create Table"], &[&[table, ddl]])
}

/// Fetcher over the mock with its action log
pub fn fetcher(mock: &Arc<MockConnection>) -> (SchemaFetcher, Arc<MemoryActionLog>) {
    fetcher_with_options(mock, LiveDbOptions::default())
}

pub fn fetcher_with_options(
    mock: &Arc<MockConnection>,
    options: LiveDbOptions,
) -> (SchemaFetcher, Arc<MemoryActionLog>) {
    let connection: Arc<dyn Connection> = mock.clone();
    let log = Arc::new(MemoryActionLog::new());
    let fetcher = SchemaFetcher::new(
        AuxConnection::new(connection),
        OptionsStore::shared(options),
        log.clone(),
    );
    (fetcher, log)
}

/// Catalog with one existing (already applied) schema
pub fn schema_catalog(name: &str) -> Catalog {
    let mut catalog = Catalog::new();
    let mut schema = Schema::new(name);
    schema.old_name = name.to_string();
    catalog.schemata.push(schema);
    catalog
}
