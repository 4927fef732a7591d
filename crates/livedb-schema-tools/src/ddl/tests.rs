//! Tests for DDL parsing

use indoc::indoc;
use livedb_core::{
    Catalog, ColumnType, DdlParser, ForeignKeyAction, IndexType, LiveObjectType, RoutineType,
    Schema, SimpleType, SqlMode,
};

use super::{MySqlDdlParser, resolve_column_type};

const ORDERS_DDL: &str = indoc! {"
    CREATE TABLE `orders` (
      `id` int NOT NULL AUTO_INCREMENT,
      `customer_id` int DEFAULT NULL,
      `note` varchar(200) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin DEFAULT 'n/a' COMMENT 'free text',
      `total` decimal(10,2) unsigned NOT NULL DEFAULT '0.00',
      `created` timestamp NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
      PRIMARY KEY (`id`),
      UNIQUE KEY `uq_note` (`note`(20)),
      KEY `fk_orders_customer_idx` (`customer_id`),
      CONSTRAINT `fk_orders_customer` FOREIGN KEY (`customer_id`) REFERENCES `customers` (`id`) ON DELETE SET NULL
    ) ENGINE=InnoDB AUTO_INCREMENT=5 DEFAULT CHARSET=utf8mb4 COMMENT='orders'
"};

fn shop_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    let mut schema = Schema::new("shop");
    schema.old_name = "shop".to_string();
    catalog.schemata.push(schema);
    catalog
}

fn parse(catalog: &mut Catalog, sql: &str) -> livedb_core::ParseOutcome {
    MySqlDdlParser::new().parse_into_catalog(catalog, sql, "shop", &SqlMode::default())
}

// ============ Table Tests ============

mod table_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_show_create_table_output() {
        let mut catalog = shop_catalog();
        let outcome = parse(&mut catalog, ORDERS_DDL);
        assert!(outcome.is_ok(), "{:?}", outcome.issues);
        assert_eq!(outcome.objects.len(), 1);
        assert_eq!(outcome.objects[0].object_type, LiveObjectType::Table);

        let table = catalog.table("shop", "orders").expect("orders");
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "customer_id", "note", "total", "created"]);
        assert_eq!(table.engine.as_deref(), Some("InnoDB"));
        assert_eq!(table.default_charset.as_deref(), Some("utf8mb4"));
        assert_eq!(table.comment, "orders");

        let id = &table.columns[0];
        assert!(id.is_not_null);
        assert!(id.auto_increment);
        assert!(table.is_primary_key_column(id.id));

        let note = &table.columns[2];
        assert_eq!(note.formatted_type(), "VARCHAR(200)");
        assert_eq!(note.charset.as_deref(), Some("utf8mb4"));
        assert_eq!(note.collation.as_deref(), Some("utf8mb4_bin"));
        assert_eq!(note.default_value.as_deref(), Some("'n/a'"));
        assert_eq!(note.comment, "free text");

        let total = &table.columns[3];
        assert_eq!(total.formatted_type(), "DECIMAL(10,2) UNSIGNED");
        assert_eq!(total.default_value.as_deref(), Some("'0.00'"));

        let created = &table.columns[4];
        assert!(!created.is_not_null);
        assert_eq!(created.default_value.as_deref(), Some("CURRENT_TIMESTAMP"));

        let unique = table.index_by_name("uq_note").expect("uq_note");
        assert_eq!(unique.index_type, IndexType::Unique);
        assert_eq!(unique.columns[0].length, Some(20));
    }

    #[test]
    fn test_foreign_key_creates_referenced_stub() {
        let mut catalog = shop_catalog();
        let outcome = parse(&mut catalog, ORDERS_DDL);
        assert!(outcome.is_ok(), "{:?}", outcome.issues);

        let customers = catalog.table("shop", "customers").expect("stub table");
        assert!(customers.is_stub);
        assert_eq!(customers.columns.len(), 1);
        assert_eq!(customers.columns[0].name, "id");
        assert!(customers.columns[0].datatype.is_none());

        let orders = catalog.table("shop", "orders").expect("orders");
        let fk = orders
            .foreign_key_by_name("fk_orders_customer")
            .expect("fk");
        assert_eq!(fk.delete_rule, ForeignKeyAction::SetNull);
        assert_eq!(fk.update_rule, ForeignKeyAction::Restrict);
        assert_eq!(fk.columns, vec![orders.columns[1].id]);
        assert_eq!(fk.referenced_columns, vec![customers.columns[0].id]);
        let referenced = fk.referenced_table.as_ref().expect("reference");
        assert_eq!(referenced.id, customers.id);
        assert_eq!(referenced.name, "customers");
        assert_eq!(
            fk.index,
            orders.index_by_name("fk_orders_customer_idx").map(|i| i.id)
        );
        assert!(!fk.mandatory);
    }

    #[test]
    fn test_reparse_preserves_ids() {
        let mut catalog = shop_catalog();
        parse(&mut catalog, ORDERS_DDL);
        let before = catalog.table("shop", "orders").expect("orders").clone();

        let changed = ORDERS_DDL.replace("`note` varchar(200)", "`note` varchar(250)");
        let outcome = parse(&mut catalog, &changed);
        assert!(outcome.is_ok(), "{:?}", outcome.issues);

        let after = catalog.table("shop", "orders").expect("orders");
        assert_eq!(after.id, before.id);
        assert_eq!(after.columns[2].id, before.columns[2].id);
        assert_eq!(after.columns[2].formatted_type(), "VARCHAR(250)");
        assert_eq!(after.foreign_keys[0].id, before.foreign_keys[0].id);
        assert_eq!(
            catalog.schema("shop").expect("schema").tables.len(),
            2,
            "orders and the customers stub"
        );
    }

    #[test]
    fn test_stub_table_is_expanded_in_place() {
        let mut catalog = shop_catalog();
        let stub = livedb_core::Table::stub("orders");
        let stub_id = stub.id;
        catalog
            .schema_mut("shop")
            .expect("schema")
            .tables
            .push(stub);

        parse(&mut catalog, ORDERS_DDL);
        let table = catalog.table("shop", "orders").expect("orders");
        assert_eq!(table.id, stub_id);
        assert!(!table.is_stub);
        assert!(table.is_stub_expanded);
        assert_eq!(table.old_name, "orders");
    }

    #[test]
    fn test_self_reference_and_unnamed_keys() {
        let mut catalog = shop_catalog();
        let outcome = parse(
            &mut catalog,
            indoc! {"
                CREATE TABLE shop.category (
                  id INT PRIMARY KEY,
                  parent_id INT,
                  INDEX (parent_id),
                  FOREIGN KEY (parent_id) REFERENCES category (id) ON DELETE CASCADE ON UPDATE NO ACTION
                );
            "},
        );
        assert!(outcome.is_ok(), "{:?}", outcome.issues);

        let table = catalog.table("shop", "category").expect("category");
        assert_eq!(table.index_by_name("parent_id").map(|i| i.index_type), Some(IndexType::Index));
        let fk = &table.foreign_keys[0];
        assert_eq!(fk.name, "category_ibfk_1");
        assert_eq!(fk.referenced_table.as_ref().map(|r| r.id), Some(table.id));
        assert_eq!(fk.referenced_columns, vec![table.columns[0].id]);
        assert_eq!(fk.update_rule, ForeignKeyAction::NoAction);
        assert_eq!(fk.delete_rule, ForeignKeyAction::Cascade);
        assert_eq!(catalog.schema("shop").map(|s| s.tables.len()), Some(1));
    }

    #[test]
    fn test_unknown_type_leaves_catalog_untouched() {
        let mut catalog = shop_catalog();
        parse(&mut catalog, ORDERS_DDL);
        let before = catalog.clone();

        let broken = ORDERS_DDL.replace("`total` decimal(10,2)", "`total` money(10,2)");
        let outcome = parse(&mut catalog, &broken);
        assert_eq!(outcome.error_count, 1);
        assert!(outcome.issues[0].message.contains("total"));
        assert_eq!(catalog, before);
    }
}

// ============ Sql Mode Tests ============

mod sql_mode_tests {
    use super::*;

    const ANSI_DDL: &str = r#"CREATE TABLE "people" ("id" INT NOT NULL, PRIMARY KEY ("id"))"#;

    #[test]
    fn test_double_quoted_identifiers_need_ansi_quotes() {
        let parser = MySqlDdlParser::new();
        let mut catalog = shop_catalog();

        let plain = SqlMode::from_session_value("STRICT_TRANS_TABLES");
        let outcome = parser.parse_into_catalog(&mut catalog, ANSI_DDL, "shop", &plain);
        assert!(!outcome.is_ok());
        assert!(catalog.table("shop", "people").is_none());

        let outcome = parser.parse_into_catalog(
            &mut catalog,
            ANSI_DDL,
            "shop",
            &plain.with_ansi_quotes_toggled(),
        );
        assert!(outcome.is_ok(), "{:?}", outcome.issues);
        assert!(catalog.table("shop", "people").is_some());
    }
}

// ============ Definition Tests ============

mod definition_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_view_is_stored_verbatim() {
        let mut catalog = shop_catalog();
        let sql = "CREATE ALGORITHM=UNDEFINED DEFINER=`root`@`localhost` SQL SECURITY DEFINER VIEW `v_orders` AS select 1 AS `one`;";
        let outcome = parse(&mut catalog, sql);
        assert!(outcome.is_ok(), "{:?}", outcome.issues);
        assert_eq!(outcome.objects[0].object_type, LiveObjectType::View);

        let view = catalog
            .schema("shop")
            .and_then(|s| s.view("v_orders"))
            .expect("view");
        assert_eq!(view.definition, sql.trim_end_matches(';'));

        let id = view.id;
        parse(&mut catalog, "CREATE OR REPLACE VIEW v_orders AS SELECT 2");
        let view = catalog
            .schema("shop")
            .and_then(|s| s.view("v_orders"))
            .expect("view");
        assert_eq!(view.id, id);
        assert_eq!(view.definition, "CREATE OR REPLACE VIEW v_orders AS SELECT 2");
    }

    #[test]
    fn test_routine_body_with_semicolons() {
        let mut catalog = shop_catalog();
        let sql = indoc! {"
            CREATE PROCEDURE `archive`.`restock`(IN qty INT)
            BEGIN
              UPDATE stock SET amount = amount + qty;
              SELECT amount FROM stock;
            END
        "};
        let outcome = parse(&mut catalog, sql);
        assert!(outcome.is_ok(), "{:?}", outcome.issues);
        assert_eq!(outcome.objects[0].schema, "archive");

        let routine = catalog
            .schema("archive")
            .and_then(|s| s.routine("restock", RoutineType::Procedure))
            .expect("procedure");
        assert!(routine.definition.ends_with("END"));
        assert!(catalog.schema("archive").is_some_and(|s| s.is_stub));
    }

    #[test]
    fn test_trigger_attaches_to_table() {
        let mut catalog = shop_catalog();
        parse(&mut catalog, ORDERS_DDL);
        let outcome = parse(
            &mut catalog,
            "CREATE TRIGGER orders_bi BEFORE INSERT ON orders FOR EACH ROW SET NEW.total = 0",
        );
        assert!(outcome.is_ok(), "{:?}", outcome.issues);

        let table = catalog.table("shop", "orders").expect("orders");
        assert_eq!(table.triggers.len(), 1);
        assert_eq!(table.triggers[0].timing, "BEFORE");
        assert_eq!(table.triggers[0].event, "INSERT");

        // Reparsing the table keeps its triggers
        parse(&mut catalog, ORDERS_DDL);
        let table = catalog.table("shop", "orders").expect("orders");
        assert_eq!(table.triggers.len(), 1);
    }
}

// ============ Schema Tests ============

mod schema_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_versioned_comment_options() {
        let mut catalog = Catalog::new();
        let outcome = parse(
            &mut catalog,
            "CREATE DATABASE `archive` /*!40100 DEFAULT CHARACTER SET latin1 COLLATE latin1_swedish_ci */ /*!80016 DEFAULT ENCRYPTION='N' */",
        );
        assert!(outcome.is_ok(), "{:?}", outcome.issues);

        let schema = catalog.schema("archive").expect("schema");
        assert_eq!(schema.default_charset.as_deref(), Some("latin1"));
        assert_eq!(schema.default_collation.as_deref(), Some("latin1_swedish_ci"));
        assert!(!schema.is_stub);
    }

    #[test]
    fn test_use_switches_target_schema() {
        let mut catalog = shop_catalog();
        let outcome = parse(
            &mut catalog,
            "CREATE SCHEMA archive; USE archive; CREATE TABLE t (id INT)",
        );
        assert!(outcome.is_ok(), "{:?}", outcome.issues);
        assert_eq!(outcome.objects.len(), 2);
        assert!(catalog.table("archive", "t").is_some());
        assert!(catalog.table("shop", "t").is_none());
    }

    #[test]
    fn test_unsupported_statement_is_an_error() {
        let mut catalog = shop_catalog();
        let outcome = parse(&mut catalog, "DROP TABLE orders");
        assert_eq!(outcome.error_count, 1);
    }
}

// ============ Column Type Tests ============

mod column_type_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_synonyms_resolve_to_canonical_name() {
        let catalog = Catalog::new();
        let spec = resolve_column_type(&catalog, "integer(11) unsigned zerofill").expect("type");
        assert_eq!(
            spec.datatype,
            ColumnType::Simple(SimpleType::named("INT").with_length(11))
        );
        assert_eq!(spec.flags, vec!["UNSIGNED", "ZEROFILL"]);

        let spec = resolve_column_type(&catalog, "double precision(8,3)").expect("type");
        assert_eq!(
            spec.datatype,
            ColumnType::Simple(SimpleType::named("DOUBLE").with_precision(8, Some(3)))
        );
    }

    #[test]
    fn test_enum_values_are_normalized() {
        let catalog = Catalog::new();
        let spec = resolve_column_type(&catalog, "ENUM( 'a' , 'b,c' ,'d' )").expect("type");
        assert_eq!(
            spec.datatype,
            ColumnType::Simple(SimpleType::named("ENUM").with_values("'a','b,c','d'"))
        );
        assert!(resolve_column_type(&catalog, "ENUM").is_err());
    }

    #[test]
    fn test_user_types() {
        let catalog = Catalog::new();
        let spec = resolve_column_type(&catalog, "bool").expect("type");
        assert_eq!(spec.datatype.name(), "BOOL");
        assert!(resolve_column_type(&catalog, "BOOL(1)").is_err());
        assert!(resolve_column_type(&catalog, "BOOLEAN UNSIGNED").is_err());
    }

    #[test]
    fn test_invalid_types() {
        let catalog = Catalog::new();
        assert!(resolve_column_type(&catalog, "").is_err());
        assert!(resolve_column_type(&catalog, "money").is_err());
        assert!(resolve_column_type(&catalog, "DATE(3)").is_err());
        assert!(resolve_column_type(&catalog, "VARCHAR(abc)").is_err());
        assert!(resolve_column_type(&catalog, "VARCHAR(10) UNSIGNED").is_err());
        assert!(resolve_column_type(&catalog, "VARCHAR(10").is_err());
    }

    #[test]
    fn test_parser_delegates_type_resolution() {
        let catalog = Catalog::new();
        let spec = MySqlDdlParser::new()
            .parse_column_type(&catalog, "varchar(40) binary")
            .expect("type");
        assert_eq!(spec.flags, vec!["BINARY"]);
    }
}
