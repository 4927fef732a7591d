//! Applying live edits to the server
//!
//! [`AlterApplyController`] turns the pending edits of a [`LiveEditSession`]
//! into an alter script and runs it, in this order:
//!
//! 1. Refuse when the raw DDL editor reports syntax errors.
//! 2. When the object was renamed or is new, look for a server object of a
//!    compatible type with the new name.
//! 3. Generate the script with the current online DDL options.
//! 4. Stop with [`ApplyOutcome::NoChanges`] when the script is a no-op.
//! 5. Execute the statements one by one. A failure stops the batch; what
//!    already ran stays applied, MySQL DDL is not transactional.
//! 6. Reload the object's DDL from the server and parse it back into the
//!    client catalog, so the editor shows what the server stored.
//! 7. Advance old names and make the server snapshot match the client.
//!
//! The statement loop can be aborted between statements.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use livedb_core::{
    Catalog, DdlParser, LiveEditSession, LiveObjectRef, LiveObjectType, SharedOptions, SqlMode,
    Value,
    sql::quote_identifier,
};
use livedb_schema_tools::{AlterScript, CatalogDiffEngine, DiffOptions};

use crate::error::{ServiceError, ServiceResult};
use crate::notifications::{Notification, NotificationBus};
use crate::schema_fetcher::SchemaFetcher;

/// Result of an apply that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The script had nothing to create, alter or drop
    NoChanges,
    /// Dry run: the script that would have been executed
    Script(AlterScript),
    /// Every statement ran and the object was reloaded
    Applied { statements: usize },
}

/// Runs the apply protocol for live edit sessions
pub struct AlterApplyController {
    fetcher: SchemaFetcher,
    parser: Arc<dyn DdlParser>,
    options: SharedOptions,
    notifications: Option<NotificationBus>,
    abort: Arc<AtomicBool>,
}

impl AlterApplyController {
    pub fn new(fetcher: SchemaFetcher, parser: Arc<dyn DdlParser>) -> Self {
        let options = fetcher.options().clone();
        Self {
            fetcher,
            parser,
            options,
            notifications: None,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Builder: publish an `ObjectApplied` notification after each apply
    pub fn with_notifications(mut self, notifications: NotificationBus) -> Self {
        self.notifications = Some(notifications);
        self
    }

    /// Flag checked before each statement; setting it stops the batch
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Apply the session's pending edits; with `dry_run` only the script is built
    #[tracing::instrument(skip(self, session), fields(schema = %session.target().schema, object_type = ?session.target().object_type))]
    pub async fn apply_changes(
        &self,
        session: &mut LiveEditSession,
        dry_run: bool,
    ) -> ServiceResult<ApplyOutcome> {
        let errors = session.sql_editor_errors();
        if errors > 0 {
            return Err(ServiceError::SqlEditorErrors(errors));
        }

        self.check_name_conflict(session).await?;

        let script = self.generate_script(session).await?;
        if script.is_noop() {
            tracing::info!("no changes detected");
            self.fetcher
                .action_log()
                .info("Apply changes", "No changes detected");
            return Ok(ApplyOutcome::NoChanges);
        }
        if dry_run {
            return Ok(ApplyOutcome::Script(script));
        }

        session.begin_apply()?;
        self.abort.store(false, Ordering::SeqCst);

        if let Err(e) = self.execute_script(&script).await {
            session.finish_apply(false);
            return Err(e);
        }
        if let Err(e) = self.read_back(session).await {
            tracing::error!(error = %e, "read-back after apply failed");
            self.fetcher
                .action_log()
                .error("Reload object after apply", &e.to_string());
            session.finish_apply(false);
            return Err(e);
        }
        session.finish_apply(true);

        if let Some(notifications) = &self.notifications
            && let Some((name, _)) = session.target_names()
        {
            notifications.publish(Notification::ObjectApplied {
                schema: session.target().schema.clone(),
                object_type: session.target().object_type,
                name,
            });
        }
        tracing::info!(statements = script.len(), "applied changes");
        Ok(ApplyOutcome::Applied {
            statements: script.len(),
        })
    }

    /// Alter script from the server snapshot to the client snapshot
    pub async fn generate_script(&self, session: &LiveEditSession) -> ServiceResult<AlterScript> {
        let server_version = self.server_version().await;
        let options = self
            .options
            .read(|o| DiffOptions::from_options(o, server_version.as_deref()));
        let engine = CatalogDiffEngine::new(options);
        Ok(engine.diff(session.server(), session.client())?)
    }

    async fn server_version(&self) -> Option<String> {
        if let Some(version) = self.fetcher.aux_connection().server_version() {
            return Some(version);
        }
        match self.fetcher.aux_connection().query("SELECT VERSION()", &[]).await {
            Ok(result) => result.rows.first().and_then(|row| row.get_string(0)),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read server version");
                None
            }
        }
    }

    /// Fail with `NameConflict` when a renamed or new object would clash on the server
    pub async fn check_name_conflict(&self, session: &LiveEditSession) -> ServiceResult<()> {
        let target = session.target();
        let (name, old_name) = session
            .target_names()
            .ok_or_else(|| ServiceError::ObjectNotFound(target.schema.clone()))?;
        if name == old_name {
            return Ok(());
        }

        let schema = target.schema.as_str();
        let tables_query = |view: bool| {
            format!(
                "SHOW FULL TABLES FROM {} WHERE {} = ? AND Table_type {} 'VIEW'",
                quote_identifier(schema),
                quote_identifier(&format!("Tables_in_{}", schema)),
                if view { "=" } else { "!=" }
            )
        };
        // (query, params, name column, type of the object it finds)
        let checks: Vec<(String, Vec<Value>, usize, LiveObjectType)> = match target.object_type {
            LiveObjectType::Schema => vec![(
                "SHOW DATABASES LIKE ?".to_string(),
                vec![Value::from(name.as_str())],
                0,
                LiveObjectType::Schema,
            )],
            // Tables and views share one namespace
            LiveObjectType::Table | LiveObjectType::View => vec![
                (
                    tables_query(false),
                    vec![Value::from(name.as_str())],
                    0,
                    LiveObjectType::Table,
                ),
                (
                    tables_query(true),
                    vec![Value::from(name.as_str())],
                    0,
                    LiveObjectType::View,
                ),
            ],
            LiveObjectType::Function => vec![(
                "SHOW FUNCTION STATUS WHERE Db = ? AND NAME = ?".to_string(),
                vec![Value::from(schema), Value::from(name.as_str())],
                1,
                LiveObjectType::Function,
            )],
            LiveObjectType::Procedure => vec![(
                "SHOW PROCEDURE STATUS WHERE Db = ? AND NAME = ?".to_string(),
                vec![Value::from(schema), Value::from(name.as_str())],
                1,
                LiveObjectType::Procedure,
            )],
            LiveObjectType::Trigger => return Ok(()),
        };

        for (sql, params, name_column, existing_type) in checks {
            let result = self.fetcher.aux_connection().query(&sql, &params).await?;
            let conflict = self.options.read(|o| {
                result
                    .rows
                    .iter()
                    .filter_map(|row| row.get_string(name_column))
                    .any(|existing| o.names_equal(&existing, &name))
            });
            if conflict {
                tracing::warn!(
                    name = %name,
                    existing = existing_type.display_name(),
                    "name conflicts with existing object"
                );
                return Err(ServiceError::NameConflict {
                    object_type: existing_type.display_name().to_string(),
                    name,
                });
            }
        }
        Ok(())
    }

    /// Run statements in order; returns how many ran
    pub async fn execute_script(&self, script: &AlterScript) -> ServiceResult<usize> {
        let connection = self.fetcher.aux_connection();
        let log = self.fetcher.action_log();

        for (index, statement) in script.statements.iter().enumerate() {
            if self.abort.load(Ordering::SeqCst) {
                tracing::warn!(applied = index, "apply aborted");
                log.warning("Apply changes", "Aborted by user");
                return Err(ServiceError::Aborted { applied: index });
            }

            let (code, message) = match connection.execute(statement, &[]).await {
                Ok(_) => {
                    tracing::debug!(index, "statement executed");
                    log.info(statement, "OK");
                    continue;
                }
                Err(e) => (e.server_code(), e.to_string()),
            };

            tracing::error!(index, code = ?code, error = %message, "statement failed");
            log.error(statement, &message);
            return Err(ServiceError::Execution {
                index,
                statement: statement.clone(),
                code,
                message,
            });
        }
        Ok(script.len())
    }

    /// Replace the edited object with the server's own definition.
    ///
    /// On any failure the client catalog is left exactly as it was.
    pub async fn read_back(&self, session: &mut LiveEditSession) -> ServiceResult<()> {
        let target = session.target().clone();
        let (name, _) = session
            .target_names()
            .ok_or_else(|| ServiceError::ObjectNotFound(target.schema.clone()))?;

        let snapshot = session.client().clone();
        if target.object_type == LiveObjectType::Table
            && let Some(table) = session.client_mut().find_table_mut(target.id)
        {
            table.reset_to_stub();
        }

        match self.reload_object(session, &target, &name).await {
            Ok(()) => {
                mark_object_applied(session.client_mut(), &target);
                session.rebase_server_state();
                Ok(())
            }
            Err(e) => {
                *session.client_mut() = snapshot;
                Err(e)
            }
        }
    }

    async fn reload_object(
        &self,
        session: &mut LiveEditSession,
        target: &LiveObjectRef,
        name: &str,
    ) -> ServiceResult<()> {
        let ddl = self
            .fetcher
            .fetch_object_ddl(target.object_type, &target.schema, name)
            .await?
            .ok_or_else(|| {
                ServiceError::ReadBack(format!(
                    "the server returned no definition for {} `{}`",
                    target.object_type.display_name(),
                    name
                ))
            })?;
        let mode = SqlMode::from_session_value(&self.fetcher.fetch_sql_mode().await?);

        let mut last_error = String::new();
        for mode in [mode.clone(), mode.with_ansi_quotes_toggled()] {
            let mut catalog = session.client().clone();
            let outcome = self
                .parser
                .parse_into_catalog(&mut catalog, &ddl, &target.schema, &mode);
            if outcome.is_ok() {
                *session.client_mut() = catalog;
                return Ok(());
            }
            last_error = outcome
                .issues
                .first()
                .map(|issue| issue.message.clone())
                .unwrap_or_default();
            tracing::debug!(ansi_quotes = mode.ansi_quotes(), error = %last_error, "server DDL did not parse");
        }
        Err(ServiceError::ReadBack(last_error))
    }
}

/// Make the current names of the object the baseline of the next diff
fn mark_object_applied(catalog: &mut Catalog, target: &LiveObjectRef) {
    match target.object_type {
        LiveObjectType::Schema => {
            if let Some(schema) = catalog.schema_by_id_mut(target.id) {
                schema.old_name = schema.name.clone();
            }
        }
        LiveObjectType::Table => {
            if let Some(table) = catalog.find_table_mut(target.id) {
                table.mark_applied();
            }
        }
        LiveObjectType::View => {
            if let Some(view) = catalog
                .schemata
                .iter_mut()
                .flat_map(|s| s.views.iter_mut())
                .find(|v| v.id == target.id)
            {
                view.old_name = view.name.clone();
            }
        }
        LiveObjectType::Procedure | LiveObjectType::Function => {
            if let Some(routine) = catalog
                .schemata
                .iter_mut()
                .flat_map(|s| s.routines.iter_mut())
                .find(|r| r.id == target.id)
            {
                routine.old_name = routine.name.clone();
            }
        }
        LiveObjectType::Trigger => {
            if let Some(trigger) = catalog
                .schemata
                .iter_mut()
                .flat_map(|s| s.tables.iter_mut())
                .flat_map(|t| t.triggers.iter_mut())
                .find(|t| t.id == target.id)
            {
                trigger.old_name = trigger.name.clone();
            }
        }
    }
}
