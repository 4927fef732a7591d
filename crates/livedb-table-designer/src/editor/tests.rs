//! Tests for the table editing model

use std::sync::Arc;

use async_trait::async_trait;
use indoc::indoc;
use livedb_core::{
    Catalog, Column, ColumnType, ForeignKeyAction, Index, IndexColumn, IndexType, LiveDbError,
    LiveDbOptions, LiveEditSession, LiveObjectRef, LiveObjectType, ObjectId, OptionsStore, Schema,
    SimpleType, Table,
};
use livedb_schema_tools::{CatalogDiffEngine, DiffOptions, MySqlDdlParser};

use super::*;
use crate::service::{LiveObjectSource, PromptHandler};
use crate::{ColumnField, FieldValue, ForeignKeyField, IndexField, RuleKind};

// ============ Fixtures ============

fn int_column(name: &str) -> Column {
    Column::new(name).with_type(ColumnType::Simple(SimpleType::named("INT")))
}

fn varchar_column(name: &str, length: u32) -> Column {
    Column::new(name).with_type(ColumnType::Simple(SimpleType::named("VARCHAR").with_length(length)))
}

fn text_column(name: &str) -> Column {
    Column::new(name).with_type(ColumnType::Simple(SimpleType::named("TEXT")))
}

fn test_schema() -> Schema {
    let mut schema = Schema::new("test");
    schema.old_name = "test".to_string();
    schema
}

/// `customers(id PK, code UNIQUE, note)`
fn customers() -> Table {
    let mut table = Table::new("customers");
    table.old_name = "customers".to_string();
    table.columns.push(int_column("id").not_null());
    table.columns.push(varchar_column("code", 10));
    table.columns.push(text_column("note"));
    let id = table.columns[0].id;
    let code = table.columns[1].id;
    table.add_primary_key_column(id);
    let mut unique = Index::new("code_UNIQUE", IndexType::Unique);
    unique.columns.push(IndexColumn::new(code));
    table.indices.push(unique);
    table
}

/// `orders(id PK, customer_id NOT NULL, code)`
fn orders() -> Table {
    let mut table = Table::new("orders");
    table.old_name = "orders".to_string();
    table.columns.push(int_column("id").not_null());
    table.columns.push(int_column("customer_id").not_null());
    table.columns.push(varchar_column("code", 10));
    let id = table.columns[0].id;
    table.add_primary_key_column(id);
    table
}

fn model_for(catalog: Catalog, table: ObjectId) -> TableEditingModel {
    let session = LiveEditSession::new(
        catalog,
        LiveObjectRef {
            object_type: LiveObjectType::Table,
            schema: "test".to_string(),
            id: table,
        },
    );
    TableEditingModel::new(
        session,
        Arc::new(MySqlDdlParser::new()),
        OptionsStore::shared(LiveDbOptions::default()),
    )
    .expect("table model")
}

fn new_table_model() -> TableEditingModel {
    let table = Table::new("t");
    let id = table.id;
    let mut schema = test_schema();
    schema.tables.push(table);
    let mut catalog = Catalog::new();
    catalog.schemata.push(schema);
    model_for(catalog, id)
}

fn orders_model() -> TableEditingModel {
    let table = orders();
    let id = table.id;
    let mut schema = test_schema();
    schema.tables.push(customers());
    schema.tables.push(table);
    schema.tables.push(Table::stub("suppliers"));
    let mut catalog = Catalog::new();
    catalog.schemata.push(schema);
    model_for(catalog, id)
}

fn column(model: &TableEditingModel, name: &str) -> ObjectId {
    model
        .table()
        .expect("table")
        .column_by_name(name)
        .expect("column")
        .id
}

fn referenced_column(model: &TableEditingModel, table: &str, name: &str) -> ObjectId {
    model
        .session()
        .client()
        .table("test", table)
        .and_then(|t| t.column_by_name(name))
        .expect("referenced column")
        .id
}

/// Orders with `fk_customer` on `customer_id` referencing `customers.id`
fn orders_with_foreign_key() -> (TableEditingModel, ObjectId) {
    let mut model = orders_model();
    let fk = model.add_foreign_key("fk_customer").expect("add fk");
    let customers_id = model
        .session()
        .client()
        .table("test", "customers")
        .expect("customers")
        .id;
    let reference = model.session().client().table_ref(customers_id);
    let table_id = model.table_id();
    model
        .session_mut()
        .client_mut()
        .find_table_mut(table_id)
        .and_then(|t| t.foreign_key_mut(fk))
        .expect("fk")
        .referenced_table = reference;
    let customer_id = column(&model, "customer_id");
    model
        .set_foreign_key_column(fk, customer_id, true)
        .expect("enable column");
    (model, fk)
}

struct AcceptPrompt;

impl PromptHandler for AcceptPrompt {
    fn confirm_remove_not_null(&self, _table: &str, _foreign_key: &str, _columns: &[String]) -> bool {
        true
    }
}

/// Expands `suppliers` with an `id` primary key, or fails every request
struct FakeSource {
    fail: bool,
}

#[async_trait]
impl LiveObjectSource for FakeSource {
    async fn expand_live_table_stub(
        &self,
        session: &mut LiveEditSession,
        schema: &str,
        table: &str,
    ) -> livedb_core::Result<()> {
        if self.fail {
            return Err(LiveDbError::Connection("server went away".to_string()));
        }
        let Some(stub) = session.client_mut().table_mut(schema, table) else {
            return Ok(());
        };
        if stub.is_stub && !stub.is_stub_expanded {
            stub.columns.push(int_column("id").not_null());
            let id = stub.columns[0].id;
            stub.add_primary_key_column(id);
            stub.is_stub_expanded = true;
        }
        Ok(())
    }
}

// ============ Table Tests ============

mod table_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_model_requires_table_target() {
        let catalog = Catalog::new();
        let session = LiveEditSession::new(
            catalog,
            LiveObjectRef {
                object_type: LiveObjectType::Table,
                schema: "test".to_string(),
                id: ObjectId::new(),
            },
        );
        let result = TableEditingModel::new(
            session,
            Arc::new(MySqlDdlParser::new()),
            OptionsStore::shared(LiveDbOptions::default()),
        );
        assert!(matches!(result, Err(EditError::TableNotFound)));
    }

    #[test]
    fn test_rename_undo_redo() {
        let mut model = orders_model();
        model.set_name("purchases  ").expect("rename");
        assert_eq!(model.name(), "purchases");
        assert_eq!(model.state(), livedb_core::EditState::Dirty);

        assert_eq!(model.undo().as_deref(), Some("Rename Table to 'purchases'"));
        assert_eq!(model.name(), "orders");
        assert_eq!(model.redo().as_deref(), Some("Rename Table to 'purchases'"));
        assert_eq!(model.name(), "purchases");
    }

    #[test]
    fn test_unchanged_value_records_no_undo() {
        let mut model = orders_model();
        model.set_name("orders").expect("same name");
        model.set_comment("").expect("same comment");
        assert!(!model.can_undo());
    }

    #[test]
    fn test_edits_rejected_while_applying() {
        let mut model = orders_model();
        model.session_mut().begin_apply().expect("begin apply");

        assert!(matches!(model.add_column("extra"), Err(EditError::Applying)));
        assert!(matches!(model.set_name("other"), Err(EditError::Applying)));
        assert_eq!(model.column_count(), 3);
        assert_eq!(model.name(), "orders");
    }
}

// ============ Column Tests ============

mod column_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_placeholder_column_becomes_primary_key() {
        let mut model = new_table_model();
        model
            .set_column_field(0, ColumnField::Name, "id")
            .expect("add id");
        model
            .set_column_field(1, ColumnField::Name, "name")
            .expect("add name");

        let table = model.table().expect("table");
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.columns[0].formatted_type(), "INT");
        assert!(table.columns[0].is_not_null);
        assert!(table.is_primary_key_column(table.columns[0].id));
        assert_eq!(table.columns[1].formatted_type(), "VARCHAR(45)");
        assert!(!table.is_primary_key_column(table.columns[1].id));

        assert_eq!(
            model.column_field(0, ColumnField::IsPK).expect("pk"),
            FieldValue::Flag(true)
        );
        assert_eq!(
            model.column_field(1, ColumnField::IsPK).expect("pk"),
            FieldValue::Flag(false)
        );
        assert_eq!(
            model.undo_description().as_deref(),
            Some("Add column 't.name'")
        );
    }

    #[test]
    fn test_placeholder_row_needs_a_name() {
        let mut model = new_table_model();
        let result = model.set_column_field(0, ColumnField::Type, "INT");
        assert!(matches!(result, Err(EditError::InvalidValue { .. })));
        assert_eq!(model.column_count(), 0);

        assert_eq!(
            model.column_field(0, ColumnField::Name).expect("placeholder"),
            FieldValue::Text(String::new())
        );
        assert!(matches!(
            model.column_field(5, ColumnField::Name),
            Err(EditError::RowOutOfRange(5))
        ));
    }

    #[test]
    fn test_add_column_has_no_type() {
        let mut model = orders_model();
        let id = model.add_column("extra").expect("add");
        let table = model.table().expect("table");
        assert_eq!(table.columns.len(), 4);
        assert!(table.column(id).expect("column").datatype.is_none());
    }

    #[test]
    fn test_remove_column_cascades_to_indexes_and_foreign_keys() {
        let (mut model, fk) = orders_with_foreign_key();
        let customer_id = column(&model, "customer_id");
        let code = column(&model, "code");
        model
            .add_index_with_columns("idx_multi", &[customer_id, code])
            .expect("multi column index");

        model.remove_column(customer_id).expect("remove");

        let table = model.table().expect("table");
        assert_eq!(table.columns.len(), 2);
        assert!(table.foreign_key(fk).is_none());
        let names: Vec<&str> = table.indices.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["PRIMARY", "idx_multi"]);
        assert_eq!(table.index_by_name("idx_multi").expect("index").column_ids(), vec![code]);

        model.undo();
        let table = model.table().expect("table");
        assert_eq!(table.columns.len(), 3);
        assert!(table.foreign_key(fk).is_some());
    }

    #[test]
    fn test_remove_primary_key_column_keeps_remaining_key() {
        let mut model = orders_model();
        let id = column(&model, "id");
        let customer_id = column(&model, "customer_id");
        model.set_primary_key(customer_id, true).expect("composite pk");

        model.remove_column(id).expect("remove id");
        let pk = model.table().expect("table").primary_key().expect("primary");
        assert_eq!(pk.column_ids(), vec![customer_id]);

        model.remove_column(customer_id).expect("remove last pk column");
        assert!(model.table().expect("table").primary_key().is_none());
    }

    #[test]
    fn test_duplicate_column_names() {
        let mut model = orders_model();
        let code = column(&model, "code");
        let first = model.duplicate_column(code, None).expect("duplicate");
        let second = model.duplicate_column(code, Some(1)).expect("duplicate");

        let table = model.table().expect("table");
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "code_copy2", "customer_id", "code", "code_copy1"]);
        let copy = table.column(first).expect("copy");
        assert_ne!(first, code);
        assert!(copy.old_name.is_empty());
        assert_eq!(copy.formatted_type(), "VARCHAR(10)");
        assert_eq!(table.column_position(second), Some(1));
    }

    #[test]
    fn test_reorder_keeps_primary_index_in_column_order() {
        let mut model = orders_model();
        let id = column(&model, "id");
        let code = column(&model, "code");
        model.set_primary_key(code, true).expect("composite pk");
        assert_eq!(
            model.table().expect("table").primary_key().expect("pk").column_ids(),
            vec![id, code]
        );

        model.reorder_column(code, 0).expect("reorder");
        let table = model.table().expect("table");
        assert_eq!(table.columns[0].id, code);
        assert_eq!(table.primary_key().expect("pk").column_ids(), vec![code, id]);
    }

    #[test]
    fn test_type_change_drops_flags_the_new_type_rejects() {
        let mut model = orders_model();
        let customer_id = column(&model, "customer_id");
        model
            .set_column_type(customer_id, "int unsigned")
            .expect("unsigned");
        model
            .set_column_flag(customer_id, "zerofill", true)
            .expect("zerofill");
        assert_eq!(
            model.table().expect("table").column(customer_id).expect("column").formatted_type(),
            "INT UNSIGNED ZEROFILL"
        );

        model.set_column_type(customer_id, "varchar(40)").expect("varchar");
        let col = model.table().expect("table").column(customer_id).expect("column");
        assert_eq!(col.formatted_type(), "VARCHAR(40)");
        assert!(col.flags.is_empty());
        assert_eq!(
            model.undo_description().as_deref(),
            Some("Set Type of 'orders.customer_id'")
        );
    }

    #[test]
    fn test_invalid_type_leaves_no_undo_entry() {
        let mut model = orders_model();
        let code = column(&model, "code");
        let result = model.set_column_type(code, "varchar(");
        assert!(matches!(result, Err(EditError::InvalidType { .. })));
        assert!(!model.can_undo());
        assert_eq!(
            model.table().expect("table").column(code).expect("column").formatted_type(),
            "VARCHAR(10)"
        );
    }

    #[test]
    fn test_flag_must_be_accepted_by_type() {
        let mut model = orders_model();
        let code = column(&model, "code");
        let result = model.set_column_flag(code, "UNSIGNED", true);
        assert!(matches!(result, Err(EditError::InvalidFlag { .. })));

        model
            .set_column_field(2, ColumnField::IsBinary, true)
            .expect("binary");
        assert_eq!(
            model.column_field(2, ColumnField::IsBinary).expect("binary"),
            FieldValue::Flag(true)
        );
    }

    #[test]
    fn test_primary_key_clears_null_default() {
        let mut model = orders_model();
        let code = column(&model, "code");
        model.set_default(code, "NULL").expect("null default");
        assert_eq!(
            model.table().expect("table").column(code).expect("column").default_value.as_deref(),
            Some("NULL")
        );

        model.set_primary_key(code, true).expect("pk");
        let col = model.table().expect("table").column(code).expect("column");
        assert!(col.is_not_null);
        assert_eq!(col.default_value, None);
    }

    #[test]
    fn test_primary_key_column_cannot_be_nullable() {
        let mut model = orders_model();
        let id = column(&model, "id");
        let result = model.set_not_null(id, false);
        assert!(matches!(result, Err(EditError::PrimaryKeyNullable(name)) if name == "id"));
    }

    #[test]
    fn test_unique_flag_manages_single_column_index() {
        let mut model = orders_model();
        let code = column(&model, "code");
        model
            .set_column_field(2, ColumnField::IsUnique, true)
            .expect("unique");

        let table = model.table().expect("table");
        let index = table.index_by_name("code_UNIQUE").expect("unique index");
        assert_eq!(index.index_type, IndexType::Unique);
        assert_eq!(index.column_ids(), vec![code]);
        assert!(model.has_unique_index(code));
        assert_eq!(
            model.undo_description().as_deref(),
            Some("Add Unique Index for 'orders'.'code'")
        );

        model.set_unique(code, false).expect("not unique");
        assert!(model.table().expect("table").index_by_name("code_UNIQUE").is_none());
    }

    #[test]
    fn test_default_value_normalization() {
        let mut model = orders_model();
        let code = column(&model, "code");
        let customer_id = column(&model, "customer_id");
        let flag = model.add_column("active").expect("add");
        model.set_column_type(flag, "BOOL").expect("bool");

        let default_of = |model: &TableEditingModel, id: ObjectId| {
            model
                .table()
                .expect("table")
                .column(id)
                .expect("column")
                .default_value
                .clone()
        };

        model.set_default(flag, "true").expect("bool default");
        assert_eq!(default_of(&model, flag).as_deref(), Some("1"));
        model.set_default(customer_id, "FALSE").expect("int default");
        assert_eq!(default_of(&model, customer_id).as_deref(), Some("0"));
        model.set_default(customer_id, "42").expect("int default");
        assert_eq!(default_of(&model, customer_id).as_deref(), Some("42"));

        model.set_default(code, "it's").expect("string default");
        assert_eq!(default_of(&model, code).as_deref(), Some("'it\\'s'"));
        model.set_default(code, "'quoted'").expect("already quoted");
        assert_eq!(default_of(&model, code).as_deref(), Some("'quoted'"));
        model.set_default(code, "NULL").expect("null");
        assert_eq!(default_of(&model, code).as_deref(), Some("NULL"));
        model.set_default(code, "").expect("no default");
        assert_eq!(default_of(&model, code), None);
    }
}

// ============ Index Tests ============

mod index_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_index_on_empty_table_rejected() {
        let mut model = new_table_model();
        let error = model.add_index("idx").expect_err("empty table");
        assert_eq!(
            error.to_string(),
            "Cannot add Index on empty table, add some columns first"
        );
        assert!(!model.can_undo());
    }

    #[test]
    fn test_primary_index_is_read_only() {
        let mut model = orders_model();
        let result = model.set_index_field(0, IndexField::Name, "pk");
        assert!(matches!(result, Err(EditError::PrimaryIndexReadOnly)));

        let primary = model.index_id(0).expect("primary");
        assert!(matches!(
            model.remove_index(primary, true),
            Err(EditError::PrimaryIndexReadOnly)
        ));

        model
            .set_index_field(0, IndexField::Comment, "row identity")
            .expect("comment");
        assert_eq!(
            model.index_field(0, IndexField::Comment).expect("comment"),
            FieldValue::Text("row identity".to_string())
        );
    }

    #[test]
    fn test_primary_type_cannot_be_assigned() {
        let mut model = orders_model();
        let code = column(&model, "code");
        let index = model
            .add_index_with_columns("idx_code", &[code])
            .expect("index");
        let result = model.set_index_type(index, IndexType::Primary);
        assert!(matches!(result, Err(EditError::InvalidIndexType(_))));

        model.set_index_type(index, IndexType::Unique).expect("unique");
        assert_eq!(
            model.index_field(1, IndexField::Type).expect("type"),
            FieldValue::Text("UNIQUE".to_string())
        );
    }

    #[test]
    fn test_placeholder_row_adds_index() {
        let mut model = orders_model();
        model
            .set_index_field(1, IndexField::Name, "idx_code")
            .expect("named index");
        model
            .set_index_field(2, IndexField::Type, "FULLTEXT")
            .expect("typed index");

        let table = model.table().expect("table");
        let names: Vec<&str> = table.indices.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["PRIMARY", "idx_code", "index3"]);
        assert_eq!(table.indices[1].index_type, IndexType::Index);
        assert_eq!(table.indices[2].index_type, IndexType::Fulltext);
    }

    #[test]
    fn test_primary_index_columns_follow_pk_markers() {
        let mut model = orders_model();
        let primary = model.index_id(0).expect("primary");
        let code = column(&model, "code");
        model.add_index_column(primary, code).expect("add to pk");

        let table = model.table().expect("table");
        assert!(table.is_primary_key_column(code));
        assert!(table.column(code).expect("code").is_not_null);
    }

    #[test]
    fn test_foreign_key_index_removal_guard() {
        let (mut model, fk) = orders_with_foreign_key();
        let index = model
            .table()
            .expect("table")
            .foreign_key(fk)
            .and_then(|fk| fk.index)
            .expect("backing index");
        let customer_id = column(&model, "customer_id");

        let result = model.remove_index(index, false);
        assert!(matches!(
            result,
            Err(EditError::IndexUsedByForeignKey { ref foreign_key, .. }) if foreign_key == "fk_customer"
        ));
        assert!(matches!(
            model.remove_index_column(index, customer_id),
            Err(EditError::IndexUsedByForeignKey { .. })
        ));

        model.remove_index(index, true).expect("forced removal");
        let table = model.table().expect("table");
        assert!(table.index(index).is_none());
        assert_eq!(table.foreign_key(fk).expect("fk").index, None);
    }
}

// ============ Foreign Key Tests ============

mod foreign_key_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_foreign_key_on_empty_table_rejected() {
        let mut model = new_table_model();
        let error = model.add_foreign_key("fk").expect_err("empty table");
        assert_eq!(
            error.to_string(),
            "Cannot add FK on empty table, add some columns first"
        );
    }

    #[test]
    fn test_new_foreign_key_uses_configured_rules() {
        let mut model = orders_model();
        let fk = model.add_foreign_key("fk_a").expect("fk");
        let foreign_key = model.table().expect("table").foreign_key(fk).expect("fk").clone();
        assert_eq!(foreign_key.update_rule, ForeignKeyAction::NoAction);
        assert_eq!(foreign_key.delete_rule, ForeignKeyAction::NoAction);
        assert!(foreign_key.columns.is_empty());

        assert!(matches!(
            model.add_foreign_key("fk_a"),
            Err(EditError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_enabling_column_guesses_primary_key_and_creates_index() {
        let (model, fk) = orders_with_foreign_key();
        let table = model.table().expect("table");
        let foreign_key = table.foreign_key(fk).expect("fk");
        assert_eq!(foreign_key.columns, vec![column(&model, "customer_id")]);
        assert_eq!(
            foreign_key.referenced_columns,
            vec![referenced_column(&model, "customers", "id")]
        );

        let index = table.index(foreign_key.index.expect("index")).expect("index");
        assert_eq!(index.name, "fk_customer_idx");
        assert_eq!(index.index_type, IndexType::Index);
        assert_eq!(index.column_ids(), foreign_key.columns);
        assert_eq!(
            model.foreign_key_field(0, ForeignKeyField::Index).expect("index"),
            FieldValue::Text("fk_customer_idx".to_string())
        );
        assert_eq!(
            model
                .foreign_key_field(0, ForeignKeyField::ReferencedTable)
                .expect("referenced"),
            FieldValue::Text("test.customers".to_string())
        );
    }

    #[test]
    fn test_disabling_last_column_drops_backing_index() {
        let (mut model, fk) = orders_with_foreign_key();
        let customer_id = column(&model, "customer_id");
        model
            .set_foreign_key_column(fk, customer_id, false)
            .expect("disable");
        let table = model.table().expect("table");
        let foreign_key = table.foreign_key(fk).expect("fk");
        assert!(foreign_key.columns.is_empty());
        assert!(foreign_key.referenced_columns.is_empty());
        assert_eq!(foreign_key.index, None);
        assert!(table.index_by_name("fk_customer_idx").is_none());
    }

    #[test]
    fn test_candidates_are_indexed_and_compatible() {
        let (mut model, fk) = orders_with_foreign_key();
        let code = column(&model, "code");
        let customer_id = column(&model, "customer_id");

        assert_eq!(
            model.referenced_column_candidates(fk, code).expect("candidates"),
            vec![referenced_column(&model, "customers", "code")]
        );
        assert_eq!(
            model
                .referenced_column_candidates(fk, customer_id)
                .expect("candidates"),
            vec![referenced_column(&model, "customers", "id")]
        );

        let error = model
            .set_foreign_key_referenced_column(fk, customer_id, "note")
            .expect_err("note is not indexed");
        assert_eq!(
            error.to_string(),
            "Selected column note must be indexed and be of a compatible type for a Foreign Key to be created."
        );
    }

    #[test]
    fn test_column_needs_referenced_table() {
        let mut model = orders_model();
        let fk = model.add_foreign_key("fk_a").expect("fk");
        let code = column(&model, "code");
        assert!(matches!(
            model.set_foreign_key_column(fk, code, true),
            Err(EditError::NoReferencedTable(_))
        ));
    }

    #[test]
    fn test_set_null_declined_reverts_rule() {
        let (mut model, fk) = orders_with_foreign_key();
        let before = model.undo_description();

        let result = model.set_foreign_key_field(0, ForeignKeyField::OnDelete, "SET NULL");
        assert!(matches!(result, Err(EditError::Declined)));

        let table = model.table().expect("table");
        assert_eq!(
            table.foreign_key(fk).expect("fk").delete_rule,
            ForeignKeyAction::NoAction
        );
        assert!(table.column_by_name("customer_id").expect("column").is_not_null);
        assert_eq!(model.undo_description(), before);
    }

    #[test]
    fn test_set_null_accepted_drops_not_null() {
        let (model, fk) = orders_with_foreign_key();
        let mut model = model.with_prompt_handler(Arc::new(AcceptPrompt));
        model
            .set_foreign_key_rule(fk, RuleKind::OnDelete, ForeignKeyAction::SetNull)
            .expect("set null");

        let table = model.table().expect("table");
        assert_eq!(
            table.foreign_key(fk).expect("fk").delete_rule,
            ForeignKeyAction::SetNull
        );
        assert!(!table.column_by_name("customer_id").expect("column").is_not_null);
        assert_eq!(
            model.undo_description().as_deref(),
            Some("Change ON DELETE for FK 'orders.fk_customer'")
        );
    }

    #[test]
    fn test_rename_also_renames_backing_index() {
        let (mut model, fk) = orders_with_foreign_key();
        model
            .set_foreign_key_field(0, ForeignKeyField::Name, "fk_buyer")
            .expect("rename");
        assert!(matches!(
            model.set_foreign_key_field(0, ForeignKeyField::Index, "x"),
            Err(EditError::ReadOnlyField(_))
        ));

        let table = model.table().expect("table");
        let foreign_key = table.foreign_key(fk).expect("fk");
        assert_eq!(foreign_key.name, "fk_buyer");
        // the index kept the name it was created with
        let index = table.index(foreign_key.index.expect("index")).expect("index");
        assert_eq!(index.name, "fk_customer_idx");
    }

    #[tokio::test]
    async fn test_referenced_table_expands_stub() {
        let (mut model, fk) = orders_with_foreign_key();
        model
            .set_foreign_key_referenced_table(fk, "suppliers", &FakeSource { fail: false })
            .await
            .expect("link suppliers");

        let foreign_key = model.table().expect("table").foreign_key(fk).expect("fk").clone();
        let reference = foreign_key.referenced_table.expect("reference");
        assert_eq!(reference.name, "suppliers");
        assert!(foreign_key.columns.is_empty());
        assert_eq!(foreign_key.index, None);

        let customer_id = column(&model, "customer_id");
        model
            .set_foreign_key_column(fk, customer_id, true)
            .expect("enable");
        let foreign_key = model.table().expect("table").foreign_key(fk).expect("fk").clone();
        assert_eq!(
            foreign_key.referenced_columns,
            vec![referenced_column(&model, "suppliers", "id")]
        );
    }

    #[tokio::test]
    async fn test_failed_expansion_leaves_foreign_key_untouched() {
        let (mut model, fk) = orders_with_foreign_key();
        let before = model.table().expect("table").foreign_key(fk).expect("fk").clone();

        let result = model
            .set_foreign_key_referenced_table(fk, "test.suppliers", &FakeSource { fail: true })
            .await;
        assert!(matches!(result, Err(EditError::StubExpansion { .. })));
        assert_eq!(
            model.table().expect("table").foreign_key(fk).expect("fk"),
            &before
        );

        let result = model
            .set_foreign_key_referenced_table(fk, "`test`.`missing`", &FakeSource { fail: false })
            .await;
        assert!(matches!(
            result,
            Err(EditError::ReferencedTableNotFound { ref table, .. }) if table == "missing"
        ));
    }
}

// ============ Alter Script Tests ============

mod alter_script_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_table_produces_create_statement() {
        let mut model = new_table_model();
        model
            .set_column_field(0, ColumnField::Name, "id")
            .expect("id");
        model
            .set_column_field(1, ColumnField::Name, "name")
            .expect("name");
        model
            .set_column_field(1, ColumnField::Type, "varchar(40)")
            .expect("type");
        model
            .set_column_field(1, ColumnField::Default, "hello")
            .expect("default");

        let mut server = Catalog::new();
        server.schemata.push(test_schema());
        let script = CatalogDiffEngine::new(DiffOptions::new())
            .diff(&server, model.session().client())
            .expect("diff");

        assert_eq!(
            script.statements,
            vec![
                indoc! {"
                    CREATE TABLE `test`.`t` (
                      `id` INT NOT NULL,
                      `name` VARCHAR(40) DEFAULT 'hello',
                      PRIMARY KEY (`id`))"}
                .to_string()
            ]
        );
    }
}
