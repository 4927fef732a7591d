//! Live schema metadata fetching
//!
//! [`SchemaFetcher`] runs the metadata queries behind the live schema tree
//! and packages the answers as detail records. It never touches the tree
//! or any edit session itself: results are delivered as data and applied by
//! the control loop (see [`crate::live_worker`]).
//!
//! Query failures are caught per category. They are logged, reported to
//! the [`ActionLog`] and returned as a [`FetchStatus`] next to an empty
//! value, so a broken object never aborts the refresh of its siblings.

use std::sync::{Arc, LazyLock};

use livedb_core::sql::{quote_identifier, quote_qualified, split_qualified_name, unquote_identifier};
use livedb_core::{ForeignKeyAction, LiveDbError, LiveObjectType, Result, Row, SharedOptions, Value};
use livedb_schema::{ColumnDetail, ForeignKeyDetail, IndexDetail, SchemaContents, TriggerDetail};
use indexmap::IndexMap;
use itertools::Itertools;
use regex::Regex;
use tokio::sync::Mutex;

use crate::action_log::ActionLog;
use crate::aux_connection::AuxConnection;

/// Schemas hidden from the tree unless metadata schemas are shown
pub const METADATA_SCHEMATA: &[&str] = &["information_schema", "performance_schema", "mysql"];

/// Server errors meaning the object itself is broken (e.g. a view whose
/// base table was dropped), as opposed to the query failing
pub const OBJECT_INVALID_ERROR_CODES: &[u32] = &[1356];

/// One foreign key line of `SHOW CREATE TABLE` output
static FOREIGN_KEY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"CONSTRAINT\s*(\S*)\s*FOREIGN KEY\s*\((\S*)\)\s*REFERENCES\s*(\S*)\s*\((\S*)\)\s*((?:\w*\s*)*),?$",
    )
    .expect("valid regex")
});

/// How a fetch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Loaded,
    /// The server reported the object as invalid
    ObjectInvalid { code: u32, message: String },
    Failed { code: Option<u32>, message: String },
}

/// A fetched value; on failure the value is empty and the status says why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched<T> {
    pub value: T,
    pub status: FetchStatus,
}

impl<T> Fetched<T> {
    pub fn loaded(value: T) -> Self {
        Self {
            value,
            status: FetchStatus::Loaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status == FetchStatus::Loaded
    }
}

impl<T: Default> Fetched<T> {
    fn from_error(error: &LiveDbError) -> Self {
        let status = match error.server_code() {
            Some(code) if OBJECT_INVALID_ERROR_CODES.contains(&code) => FetchStatus::ObjectInvalid {
                code,
                message: error.to_string(),
            },
            code => FetchStatus::Failed {
                code,
                message: error.to_string(),
            },
        };
        Self {
            value: T::default(),
            status,
        }
    }
}

/// Runs metadata queries over the auxiliary connection
#[derive(Clone)]
pub struct SchemaFetcher {
    aux: AuxConnection,
    options: SharedOptions,
    action_log: Arc<dyn ActionLog>,
    /// Serializes whole-schema refreshes
    contents_lock: Arc<Mutex<()>>,
}

impl SchemaFetcher {
    pub fn new(aux: AuxConnection, options: SharedOptions, action_log: Arc<dyn ActionLog>) -> Self {
        Self {
            aux,
            options,
            action_log,
            contents_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn aux_connection(&self) -> &AuxConnection {
        &self.aux
    }

    pub fn options(&self) -> &SharedOptions {
        &self.options
    }

    pub fn action_log(&self) -> &Arc<dyn ActionLog> {
        &self.action_log
    }

    /// Names of the schemas on the server.
    ///
    /// Names starting with `.` are always dropped; metadata schemas are
    /// dropped unless `show_metadata_schemata` is set.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_schema_list(&self) -> Fetched<Vec<String>> {
        let result = match self.aux.query("SHOW DATABASES", &[]).await {
            Ok(result) => result,
            Err(e) => return self.failed("Get schemata", e),
        };

        let show_metadata = self.options.read(|o| o.show_metadata_schemata);
        let names = result
            .rows
            .iter()
            .filter_map(|row| row.get_string(0))
            .filter(|name| !name.starts_with('.'))
            .filter(|name| show_metadata || !METADATA_SCHEMATA.contains(&name.as_str()))
            .collect::<Vec<_>>();

        tracing::debug!(schema_count = names.len(), "fetched schema list");
        Fetched::loaded(names)
    }

    /// Tables, views, procedures and functions of one schema.
    ///
    /// The three queries run as one sequence on the auxiliary connection,
    /// and only one contents refresh runs at a time.
    #[tracing::instrument(skip(self), fields(schema = %schema))]
    pub async fn fetch_schema_contents(&self, schema: &str) -> Fetched<SchemaContents> {
        let _contents = self.contents_lock.lock().await;
        match self.query_schema_contents(schema).await {
            Ok(contents) => {
                tracing::debug!(
                    tables = contents.tables.len(),
                    views = contents.views.len(),
                    procedures = contents.procedures.len(),
                    functions = contents.functions.len(),
                    "fetched schema contents"
                );
                Fetched::loaded(contents)
            }
            Err(e) => self.failed("Error loading schema content", e),
        }
    }

    async fn query_schema_contents(&self, schema: &str) -> Result<SchemaContents> {
        let connection = self.aux.acquire().await;
        let mut contents = SchemaContents::default();

        let tables = connection
            .query(&format!("SHOW FULL TABLES FROM {}", quote_identifier(schema)), &[])
            .await?;
        for row in &tables.rows {
            let Some(name) = row.get_string(0) else {
                continue;
            };
            if row.get_string(1).as_deref() == Some("VIEW") {
                contents.views.push(name);
            } else {
                contents.tables.push(name);
            }
        }

        let params = [Value::from(schema)];
        let procedures = connection
            .query("SHOW PROCEDURE STATUS WHERE Db = ?", &params)
            .await?;
        contents
            .procedures
            .extend(procedures.rows.iter().filter_map(|row| row.get_string(1)));

        let functions = connection
            .query("SHOW FUNCTION STATUS WHERE Db = ?", &params)
            .await?;
        contents
            .functions
            .extend(functions.rows.iter().filter_map(|row| row.get_string(1)));

        Ok(contents)
    }

    /// Columns of a table or view, in server order
    #[tracing::instrument(skip(self), fields(schema = %schema, object = %object))]
    pub async fn fetch_column_data(&self, schema: &str, object: &str) -> Fetched<Vec<ColumnDetail>> {
        let sql = format!("SHOW FULL COLUMNS FROM {}", quote_qualified(Some(schema), object));
        match self.aux.query(&sql, &[]).await {
            Ok(result) => Fetched::loaded(result.rows.iter().map(column_detail).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "error fetching column information");
                self.failed(&format!("Fetch columns of '{}'.'{}'", schema, object), e)
            }
        }
    }

    /// Indexes of a table, one record per index with its columns in order
    #[tracing::instrument(skip(self), fields(schema = %schema, table = %table))]
    pub async fn fetch_index_data(&self, schema: &str, table: &str) -> Fetched<Vec<IndexDetail>> {
        let sql = format!("SHOW INDEXES FROM {}", quote_qualified(Some(schema), table));
        match self.aux.query(&sql, &[]).await {
            Ok(result) => Fetched::loaded(index_details(&result.rows)),
            Err(e) => self.failed(&format!("Fetch indexes of '{}'.'{}'", schema, table), e),
        }
    }

    #[tracing::instrument(skip(self), fields(schema = %schema, table = %table))]
    pub async fn fetch_trigger_data(&self, schema: &str, table: &str) -> Fetched<Vec<TriggerDetail>> {
        let sql = format!("SHOW TRIGGERS FROM {} LIKE ?", quote_identifier(schema));
        match self.aux.query(&sql, &[Value::from(table)]).await {
            Ok(result) => Fetched::loaded(
                result
                    .rows
                    .iter()
                    .filter_map(|row| {
                        Some(TriggerDetail {
                            name: row.get_string(0)?,
                            event: text_by_name(row, "Event", 1),
                            timing: text_by_name(row, "Timing", 4),
                        })
                    })
                    .collect(),
            ),
            Err(e) => self.failed(&format!("Fetch triggers of '{}'.'{}'", schema, table), e),
        }
    }

    /// Foreign keys of a table, parsed from its `SHOW CREATE TABLE` text
    #[tracing::instrument(skip(self), fields(schema = %schema, table = %table))]
    pub async fn fetch_foreign_key_data(&self, schema: &str, table: &str) -> Fetched<Vec<ForeignKeyDetail>> {
        match self.fetch_object_ddl(LiveObjectType::Table, schema, table).await {
            Ok(ddl) => Fetched::loaded(ddl.as_deref().map(parse_foreign_keys).unwrap_or_default()),
            Err(e) => self.failed(&format!("Fetch foreign keys of '{}'.'{}'", schema, table), e),
        }
    }

    /// `SHOW CREATE ...` text of an object, `None` when the server returns no row
    pub async fn fetch_object_ddl(
        &self,
        object_type: LiveObjectType,
        schema: &str,
        name: &str,
    ) -> Result<Option<String>> {
        let (sql, column) = match object_type {
            LiveObjectType::Schema => (format!("SHOW CREATE SCHEMA {}", quote_identifier(name)), 1),
            LiveObjectType::Table | LiveObjectType::View => (
                format!(
                    "SHOW CREATE {} {}",
                    object_type.sql_keyword(),
                    quote_qualified(Some(schema), name)
                ),
                1,
            ),
            LiveObjectType::Procedure | LiveObjectType::Function | LiveObjectType::Trigger => (
                format!(
                    "SHOW CREATE {} {}",
                    object_type.sql_keyword(),
                    quote_qualified(Some(schema), name)
                ),
                2,
            ),
        };
        let result = self.aux.query(&sql, &[]).await?;
        Ok(result
            .rows
            .first()
            .and_then(|row| row.get_string(column))
            .filter(|ddl| !ddl.trim().is_empty()))
    }

    /// Current `sql_mode` of the auxiliary session
    pub async fn fetch_sql_mode(&self) -> Result<String> {
        let result = self.aux.query("SELECT @@SESSION.sql_mode", &[]).await?;
        Ok(result
            .rows
            .first()
            .and_then(|row| row.get_string(0))
            .unwrap_or_default())
    }

    fn failed<T: Default>(&self, action: &str, error: LiveDbError) -> Fetched<T> {
        tracing::error!(action = %action, error = %error, "metadata fetch failed");
        self.action_log.error(action, &error.to_string());
        Fetched::from_error(&error)
    }
}

fn text_by_name(row: &Row, name: &str, position: usize) -> String {
    row.get_string_by_name(name)
        .or_else(|| row.get_string(position))
        .unwrap_or_default()
}

/// Type text as shown in the tree: `unsigned` abbreviated, `AI` appended
pub fn format_column_type(type_text: &str, extra: &str) -> String {
    let mut formatted = type_text.replace("unsigned", "UN");
    if extra.contains("auto_increment") {
        formatted.push_str(" AI");
    }
    formatted
}

/// One row of `SHOW FULL COLUMNS`
fn column_detail(row: &Row) -> ColumnDetail {
    let collation = row.get_string_by_name("Collation").filter(|c| !c.is_empty());
    let key = text_by_name(row, "Key", 4);
    let is_not_null = text_by_name(row, "Null", 3) == "NO";
    let is_pk = key == "PRI";

    ColumnDetail {
        name: text_by_name(row, "Field", 0),
        type_name: format_column_type(&text_by_name(row, "Type", 1), &text_by_name(row, "Extra", 6)),
        default_value: row.get_string_by_name("Default"),
        charset: collation
            .as_deref()
            .and_then(|c| c.split('_').next())
            .map(str::to_string),
        collation,
        is_pk,
        is_id: is_pk || (is_not_null && key == "UNI"),
        is_idx: !key.is_empty(),
        is_not_null,
    }
}

/// Group `SHOW INDEXES` rows by index name, keeping first-seen order
fn index_details(rows: &[Row]) -> Vec<IndexDetail> {
    let mut indexes: IndexMap<String, IndexDetail> = IndexMap::new();
    for row in rows {
        let name = text_by_name(row, "Key_name", 2);
        let column = text_by_name(row, "Column_name", 4);
        if let Some(index) = indexes.get_mut(&name) {
            index.columns.push(column);
            continue;
        }
        let non_unique = row
            .get_by_name("Non_unique")
            .or_else(|| row.get(1))
            .and_then(Value::as_i64)
            .unwrap_or(1);
        indexes.insert(
            name.clone(),
            IndexDetail {
                name,
                index_type: text_by_name(row, "Index_type", 10),
                unique: non_unique == 0,
                visible: row
                    .get_string_by_name("Visible")
                    .is_none_or(|v| v.eq_ignore_ascii_case("YES")),
                columns: vec![column],
            },
        );
    }
    indexes.into_values().collect()
}

/// Foreign keys declared in `SHOW CREATE TABLE` output.
///
/// Each `CONSTRAINT ... FOREIGN KEY` line is matched on its own. The rule
/// tail is read in groups of three tokens (`ON <UPDATE|DELETE> <action>`),
/// where `SET NULL`, `SET DEFAULT` and `NO ACTION` take one extra token.
/// Rules that are not written default to RESTRICT.
pub fn parse_foreign_keys(create_table: &str) -> Vec<ForeignKeyDetail> {
    let (Some(start), Some(end)) = (create_table.find('('), create_table.rfind(')')) else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }

    let mut foreign_keys = Vec::new();
    for line in create_table[start..end].lines() {
        let Some(captures) = FOREIGN_KEY_LINE.captures(line.trim_end()) else {
            continue;
        };
        let (update_rule, delete_rule) = parse_rules(&captures[5]);
        let (ref_schema, ref_table) = split_qualified_name(&captures[3], "");
        foreign_keys.push(ForeignKeyDetail {
            name: unquote_identifier(&captures[1]),
            referenced_table: if ref_schema.is_empty() {
                ref_table
            } else {
                format!("{}.{}", ref_schema, ref_table)
            },
            from_columns: column_list(&captures[2]),
            to_columns: column_list(&captures[4]),
            update_rule,
            delete_rule,
        });
    }
    foreign_keys
}

fn column_list(text: &str) -> String {
    text.split(',').map(unquote_identifier).join(", ")
}

/// (update rule, delete rule) of a rule tail like `ON DELETE SET NULL ON UPDATE CASCADE`
fn parse_rules(text: &str) -> (ForeignKeyAction, ForeignKeyAction) {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut update_rule = ForeignKeyAction::Restrict;
    let mut delete_rule = ForeignKeyAction::Restrict;

    let mut offset = 0;
    for _ in 0..tokens.len() / 3 {
        // ON
        offset += 1;
        let (Some(rule), Some(first)) = (tokens.get(offset), tokens.get(offset + 1)) else {
            break;
        };
        offset += 2;
        let mut action = first.to_string();
        if matches!(*first, "SET" | "NO")
            && let Some(second) = tokens.get(offset)
        {
            action = format!("{} {}", first, second);
            offset += 1;
        }
        let Ok(action) = action.parse::<ForeignKeyAction>() else {
            tracing::warn!(action = %action, "unknown foreign key rule");
            continue;
        };
        if *rule == "UPDATE" {
            update_rule = action;
        } else {
            delete_rule = action;
        }
    }
    (update_rule, delete_rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn index_row(name: &str, non_unique: i64, column: &str) -> Row {
        Row::new(
            vec![
                "Table".into(),
                "Non_unique".into(),
                "Key_name".into(),
                "Seq_in_index".into(),
                "Column_name".into(),
                "Index_type".into(),
                "Visible".into(),
            ],
            vec![
                Value::from("t"),
                Value::Int64(non_unique),
                Value::from(name),
                Value::Int64(1),
                Value::from(column),
                Value::from("BTREE"),
                Value::from("YES"),
            ],
        )
    }

    #[test]
    fn test_delete_rule_only() {
        let ddl = indoc! {"
            CREATE TABLE `t` (
              `x` int DEFAULT NULL,
              KEY `fk_a_idx` (`x`),
              CONSTRAINT `fk_a` FOREIGN KEY (`x`) REFERENCES `other` (`y`) ON DELETE CASCADE
            ) ENGINE=InnoDB
        "};
        let fks = parse_foreign_keys(ddl);
        assert_eq!(
            fks,
            vec![ForeignKeyDetail {
                name: "fk_a".to_string(),
                referenced_table: "other".to_string(),
                from_columns: "x".to_string(),
                to_columns: "y".to_string(),
                update_rule: ForeignKeyAction::Restrict,
                delete_rule: ForeignKeyAction::Cascade,
            }]
        );
    }

    #[test]
    fn test_two_word_actions_and_multiple_keys() {
        let ddl = indoc! {"
            CREATE TABLE `orders` (
              `id` int NOT NULL,
              `a` int NOT NULL,
              `b` int NOT NULL,
              PRIMARY KEY (`id`),
              CONSTRAINT `fk_ab` FOREIGN KEY (`a`,`b`) REFERENCES `shop`.`pairs` (`x`,`y`) ON DELETE SET NULL ON UPDATE NO ACTION,
              CONSTRAINT `fk_b` FOREIGN KEY (`b`) REFERENCES `other` (`id`)
            ) ENGINE=InnoDB
        "};
        let fks = parse_foreign_keys(ddl);
        assert_eq!(fks.len(), 2);
        assert_eq!(fks[0].referenced_table, "shop.pairs");
        assert_eq!(fks[0].from_columns, "a, b");
        assert_eq!(fks[0].to_columns, "x, y");
        assert_eq!(fks[0].delete_rule, ForeignKeyAction::SetNull);
        assert_eq!(fks[0].update_rule, ForeignKeyAction::NoAction);
        assert_eq!(fks[1].name, "fk_b");
        assert_eq!(fks[1].update_rule, ForeignKeyAction::Restrict);
        assert_eq!(fks[1].delete_rule, ForeignKeyAction::Restrict);
    }

    #[test]
    fn test_no_foreign_keys() {
        assert!(parse_foreign_keys("CREATE TABLE `t` (`id` int)").is_empty());
        assert!(parse_foreign_keys("").is_empty());
    }

    #[test]
    fn test_format_column_type() {
        assert_eq!(format_column_type("int unsigned", "auto_increment"), "int UN AI");
        assert_eq!(format_column_type("varchar(45)", ""), "varchar(45)");
    }

    #[test]
    fn test_index_rows_grouped_by_name() {
        let rows = vec![
            index_row("PRIMARY", 0, "id"),
            index_row("idx_ab", 1, "a"),
            index_row("idx_ab", 1, "b"),
        ];
        let indexes = index_details(&rows);
        assert_eq!(indexes.len(), 2);
        assert!(indexes[0].unique);
        assert_eq!(indexes[1].columns, vec!["a".to_string(), "b".to_string()]);
        assert!(!indexes[1].unique);
        assert!(indexes[1].visible);
    }
}
