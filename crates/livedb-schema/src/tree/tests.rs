use super::*;

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn column(name: &str, type_name: &str, is_pk: bool) -> ColumnDetail {
    ColumnDetail {
        name: name.to_string(),
        type_name: type_name.to_string(),
        is_pk,
        is_id: is_pk,
        is_idx: is_pk,
        ..Default::default()
    }
}

fn tree_with_table() -> (ObjectTreeCache, NodeId) {
    let mut tree = ObjectTreeCache::default();
    let table = tree
        .get_or_create_node("shop", ObjectType::Table, "orders")
        .expect("table node");
    (tree, table)
}

// ============ Node Creation Tests ============

mod creation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_creates_schema_and_slots() {
        let (tree, table) = tree_with_table();

        let schema = tree
            .find_node("shop", ObjectType::Schema, "shop")
            .expect("schema created");
        assert_eq!(tree.child_names(tree.root()), names(&["shop"]));
        assert_eq!(
            tree.child_names(schema),
            names(&["Tables", "Views", "Stored Procedures", "Functions"])
        );
        assert_eq!(
            tree.child_names(table),
            names(&["Columns", "Indexes", "Foreign Keys", "Triggers"])
        );
        assert_eq!(tree.find_node("shop", ObjectType::Table, "orders"), Some(table));
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let (mut tree, table) = tree_with_table();
        let again = tree
            .get_or_create_node("shop", ObjectType::Table, "orders")
            .expect("table node");
        assert_eq!(again, table);
        assert_eq!(tree.stats().tables, 1);
    }

    #[test]
    fn test_views_have_no_slots() {
        let mut tree = ObjectTreeCache::default();
        let view = tree
            .get_or_create_node("shop", ObjectType::View, "v_orders")
            .expect("view node");
        assert!(tree.children(view).is_empty());
    }

    #[test]
    fn test_columns_are_not_addressable() {
        let mut tree = ObjectTreeCache::default();
        let result = tree.get_or_create_node("shop", ObjectType::TableColumn, "id");
        assert_eq!(result, Err(TreeError::UnsupportedType(ObjectType::TableColumn)));
    }

    #[test]
    fn test_new_nodes_are_inserted_sorted() {
        let mut tree = ObjectTreeCache::default();
        for name in ["zeta", "Alpha", "mid"] {
            tree.get_or_create_node("shop", ObjectType::Table, name)
                .expect("table node");
        }
        let schema = tree.find_node("shop", ObjectType::Schema, "shop").expect("schema");
        let tables = tree.group(schema, GroupKind::Tables).expect("tables slot");
        assert_eq!(tree.child_names(tables), names(&["Alpha", "mid", "zeta"]));
    }
}

// ============ Reconciliation Tests ============

mod reconcile_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_schema_list_replace_removes_missing() {
        let mut tree = ObjectTreeCache::default();
        assert!(tree.update_schema_list(&names(&["b", "a", "c"])));
        assert_eq!(tree.child_names(tree.root()), names(&["a", "b", "c"]));

        assert!(tree.update_schema_list(&names(&["c", "a"])));
        assert_eq!(tree.child_names(tree.root()), names(&["a", "c"]));
        assert_eq!(tree.find_node("b", ObjectType::Schema, "b"), None);
    }

    #[test]
    fn test_unchanged_list_reports_no_change() {
        let mut tree = ObjectTreeCache::default();
        tree.update_schema_list(&names(&["a", "b"]));
        assert!(!tree.update_schema_list(&names(&["b", "a"])));
    }

    #[test]
    fn test_append_mode_keeps_existing() {
        let mut tree = ObjectTreeCache::default();
        let root = tree.root();
        tree.update_children(root, ObjectType::Schema, &names(&["a"]), true)
            .expect("update");
        tree.update_children(root, ObjectType::Schema, &names(&["b"]), false)
            .expect("update");
        assert_eq!(tree.child_names(root), names(&["a", "b"]));
    }

    #[test]
    fn test_schema_contents_preserve_loaded_tables() {
        let (mut tree, table) = tree_with_table();
        tree.set_column_data(table, &[column("id", "int(11)", true)])
            .expect("columns");

        let contents = SchemaContents {
            tables: names(&["orders", "customers"]),
            views: names(&["v_totals"]),
            procedures: vec![],
            functions: names(&["f_tax"]),
        };
        tree.apply_schema_contents("shop", &contents).expect("contents");

        let kept = tree
            .find_node("shop", ObjectType::Table, "orders")
            .expect("orders kept");
        assert_eq!(kept, table);
        assert!(tree.is_loaded(kept, LoadedData::COLUMNS));

        let schema = tree.find_node("shop", ObjectType::Schema, "shop").expect("schema");
        let node = tree.node(schema).expect("schema node");
        assert!(node.contents_loaded());
        assert!(!node.is_fetching());
        let tables = tree.group(schema, GroupKind::Tables).expect("tables slot");
        assert_eq!(tree.child_names(tables), names(&["customers", "orders"]));
    }

    #[test]
    fn test_dropped_table_is_unindexed() {
        let (mut tree, _) = tree_with_table();
        let contents = SchemaContents {
            tables: names(&["customers"]),
            ..Default::default()
        };
        tree.apply_schema_contents("shop", &contents).expect("contents");
        assert_eq!(tree.find_node("shop", ObjectType::Table, "orders"), None);
        assert_eq!(tree.stats().tables, 1);
    }

    #[test]
    fn test_columns_keep_server_order() {
        let (mut tree, table) = tree_with_table();
        tree.set_column_data(
            table,
            &[column("z", "int", false), column("a", "int", false)],
        )
        .expect("columns");
        let slot = tree.group(table, GroupKind::Columns).expect("columns slot");
        assert_eq!(tree.child_names(slot), names(&["z", "a"]));
    }

    #[test]
    fn test_unknown_parent_is_an_error() {
        let mut tree = ObjectTreeCache::default();
        let missing = NodeId(999);
        assert_eq!(
            tree.update_children(missing, ObjectType::Schema, &[], true),
            Err(TreeError::NodeNotFound(missing))
        );
    }
}

// ============ Detail Data Tests ============

mod detail_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_column_data_marks_loaded_and_clears_error() {
        let (mut tree, table) = tree_with_table();
        tree.set_columns_load_error(table, "View references invalid table(s)")
            .expect("error");
        assert!(tree.node(table).is_some_and(|n| n.columns_load_error()));

        tree.set_column_data(table, &[column("id", "int(11)", true)])
            .expect("columns");
        let node = tree.node(table).expect("table");
        assert!(!node.columns_load_error());
        assert_eq!(node.error_details(), None);
        assert!(tree.is_loaded(table, LoadedData::COLUMNS));
        assert!(!tree.is_loaded(table, LoadedData::COLUMNS | LoadedData::INDEXES));
    }

    #[test]
    fn test_fetch_error_keeps_cached_data() {
        let (mut tree, table) = tree_with_table();
        tree.set_column_data(table, &[column("id", "int(11)", true)])
            .expect("columns");

        tree.set_fetch_error(table, "Lost connection to MySQL server")
            .expect("error");
        let node = tree.node(table).expect("table");
        assert_eq!(node.error_details(), Some("Lost connection to MySQL server"));
        assert!(!node.columns_load_error());
        assert!(tree.is_loaded(table, LoadedData::COLUMNS));

        tree.clear_fetch_error(table).expect("cleared");
        assert_eq!(tree.node(table).and_then(|n| n.error_details()), None);
    }

    #[test]
    fn test_clear_fetch_error_keeps_sticky_column_error() {
        let (mut tree, table) = tree_with_table();
        tree.set_columns_load_error(table, "View references invalid table(s)")
            .expect("error");

        tree.clear_fetch_error(table).expect("cleared");

        let node = tree.node(table).expect("table");
        assert!(node.columns_load_error());
        assert_eq!(node.error_details(), Some("View references invalid table(s)"));
    }

    #[test]
    fn test_view_columns_are_direct_children() {
        let mut tree = ObjectTreeCache::default();
        let view = tree
            .get_or_create_node("shop", ObjectType::View, "v")
            .expect("view");
        tree.set_column_data(view, &[column("total", "decimal(10,2)", false)])
            .expect("columns");
        let child = tree.children(view)[0];
        assert_eq!(
            tree.node(child).map(|n| n.object_type()),
            Some(ObjectType::ViewColumn)
        );
    }

    #[test]
    fn test_empty_trigger_list_still_marks_loaded() {
        let (mut tree, table) = tree_with_table();
        tree.set_trigger_data(table, &[]).expect("triggers");
        assert!(tree.is_loaded(table, LoadedData::TRIGGERS));
    }

    #[test]
    fn test_index_data_on_schema_is_rejected() {
        let mut tree = ObjectTreeCache::default();
        let schema = tree
            .get_or_create_node("shop", ObjectType::Schema, "shop")
            .expect("schema");
        assert!(matches!(
            tree.set_index_data(schema, &[]),
            Err(TreeError::WrongNodeType { .. })
        ));
    }

    #[test]
    fn test_foreign_key_data_is_stored() {
        let (mut tree, table) = tree_with_table();
        let fk = ForeignKeyDetail {
            name: "fk_customer".to_string(),
            referenced_table: "customers".to_string(),
            from_columns: "customer_id".to_string(),
            to_columns: "id".to_string(),
            ..Default::default()
        };
        tree.set_foreign_key_data(table, &[fk.clone()]).expect("fks");

        let slot = tree.group(table, GroupKind::ForeignKeys).expect("fk slot");
        let node = tree.node(tree.children(slot)[0]).expect("fk node");
        assert_eq!(node.data(), &NodeData::ForeignKey(fk));
        assert_eq!(tree.stats().foreign_keys, 1);
    }

    #[test]
    fn test_loaded_mask_can_be_cleared() {
        let (mut tree, table) = tree_with_table();
        tree.set_loaded(table, LoadedData::INDEXES | LoadedData::TRIGGERS)
            .expect("loaded");
        tree.clear_loaded(table, LoadedData::INDEXES).expect("cleared");
        assert!(!tree.is_loaded(table, LoadedData::INDEXES));
        assert!(tree.is_loaded(table, LoadedData::TRIGGERS));
    }
}

// ============ Details HTML Tests ============

mod details_html_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pk_column_fragment() {
        let fragment = column("id", "int(11)", true).details_fragment();
        assert!(fragment.contains("<b><u>id</u></b>"));
        assert!(fragment.contains("int(11) PK"));
    }

    #[test]
    fn test_table_details_list_columns() {
        let (mut tree, table) = tree_with_table();
        assert_eq!(tree.details_html(table, false), Some(String::new()));

        tree.set_column_data(
            table,
            &[column("id", "int(11)", true), column("note", "text", false)],
        )
        .expect("columns");
        let html = tree.details_html(table, true).expect("details");
        assert!(html.starts_with("<b>Table:</b>"));
        assert!(html.contains("<b>Columns:</b>"));
        assert!(html.contains("note"));
    }

    #[test]
    fn test_cached_fragment_is_refreshed_when_data_changes() {
        let (mut tree, table) = tree_with_table();
        tree.set_column_data(table, &[column("id", "int(11)", false)])
            .expect("columns");
        let slot = tree.group(table, GroupKind::Columns).expect("slot");
        let id_node = tree.children(slot)[0];
        let before = tree.details_html(id_node, false).expect("fragment");

        tree.set_column_data(table, &[column("id", "bigint(20)", false)])
            .expect("columns");
        assert_eq!(tree.children(slot)[0], id_node);
        let after = tree.details_html(id_node, false).expect("fragment");
        assert!(before.contains("int(11)"));
        assert!(after.contains("bigint(20)"));
    }

    #[test]
    fn test_error_details_are_appended() {
        let mut tree = ObjectTreeCache::default();
        let view = tree
            .get_or_create_node("shop", ObjectType::View, "broken")
            .expect("view");
        tree.set_columns_load_error(view, "references <missing> table")
            .expect("error");
        let html = tree.details_html(view, false).expect("details");
        assert!(html.contains("references &lt;missing&gt; table"));
    }

    #[test]
    fn test_index_full_details() {
        let (mut tree, table) = tree_with_table();
        let index = IndexDetail {
            name: "PRIMARY".to_string(),
            index_type: "BTREE".to_string(),
            unique: true,
            visible: true,
            columns: names(&["id"]),
        };
        tree.set_index_data(table, &[index]).expect("indexes");
        let slot = tree.group(table, GroupKind::Indexes).expect("slot");
        let html = tree
            .details_html(tree.children(slot)[0], true)
            .expect("details");
        assert!(html.starts_with("<b>Index:</b>"));
        assert!(html.contains("BTREE"));
    }
}

// ============ Removal Tests ============

mod removal_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_remove_node_drops_subtree() {
        let (mut tree, table) = tree_with_table();
        tree.set_column_data(table, &[column("id", "int", true)])
            .expect("columns");
        assert!(tree.remove_node(table));
        assert!(tree.node(table).is_none());
        assert_eq!(tree.stats().columns, 0);
        assert_eq!(tree.find_node("shop", ObjectType::Table, "orders"), None);
    }

    #[test]
    fn test_root_cannot_be_removed() {
        let mut tree = ObjectTreeCache::default();
        let root = tree.root();
        assert!(!tree.remove_node(root));
    }

    #[test]
    fn test_clear_keeps_only_root() {
        let (mut tree, _) = tree_with_table();
        tree.clear();
        assert_eq!(tree.stats().total_nodes, 1);
        assert!(tree.children(tree.root()).is_empty());
    }

    #[test]
    fn test_shared_tree() {
        let shared = new_shared_tree(TreeConfig::default());
        shared.write().update_schema_list(&names(&["shop"]));
        assert_eq!(shared.read().stats().schemas, 1);
    }
}
