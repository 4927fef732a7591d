//! Integration tests for the background worker and tree synchronization

mod common;

use std::sync::Arc;

use common::{MockConnection, fetcher, rows};
use livedb_core::LiveObjectType;
use livedb_schema::{LoadedData, ObjectTreeCache, ObjectType, TreeConfig, new_shared_tree};
use livedb_services::{
    FetchRequest, FetchResponse, LiveSchemaWorker, LiveTreeSync, Notification, NotificationBus,
    apply_fetch_response, begin_fetch, run_request,
};
use pretty_assertions::assert_eq;

fn shop_server() -> MockConnection {
    MockConnection::new()
        .with_query_response(
            "SHOW DATABASES",
            rows(&["Database"], &[&["mysql"], &["shop"], &["archive"]]),
        )
        .with_query_response(
            "SHOW FULL TABLES FROM `shop`",
            rows(
                &["Tables_in_shop", "Table_type"],
                &[&["orders", "BASE TABLE"], &["order_totals", "VIEW"]],
            ),
        )
        .with_query_response(
            "SHOW FULL COLUMNS FROM `shop`.`orders`",
            rows(
                &["Field", "Type", "Collation", "Null", "Key", "Default", "Extra"],
                &[
                    &["id", "int", "", "NO", "PRI", "", "auto_increment"],
                    &["total", "decimal(10,2)", "", "NO", "", "0.00", ""],
                ],
            ),
        )
        .with_query_response(
            "SHOW INDEXES FROM `shop`.`orders`",
            rows(
                &["Table", "Non_unique", "Key_name", "Seq_in_index", "Column_name"],
                &[&["orders", "0", "PRIMARY", "1", "id"]],
            ),
        )
        .with_server_error(
            "SHOW FULL COLUMNS FROM `shop`.`order_totals`",
            1356,
            "View 'shop.order_totals' references invalid table(s) or column(s)",
        )
}

fn start_sync(mock: &Arc<MockConnection>) -> LiveTreeSync {
    let (fetcher, _log) = fetcher(mock);
    let (worker, responses, _dispatcher) = LiveSchemaWorker::spawn(fetcher);
    LiveTreeSync::new(
        new_shared_tree(TreeConfig::default()),
        worker,
        responses,
        NotificationBus::new(),
    )
}

// ============ Schema List Tests ============

#[tokio::test]
async fn test_schema_list_refresh_through_worker() {
    let mock = Arc::new(shop_server());
    let mut sync = start_sync(&mock);
    let mut notifications = sync.notifications().subscribe();

    assert!(sync.refresh_schema_list());
    {
        let tree = sync.tree().read();
        assert!(tree.node(tree.root()).is_some_and(|n| n.is_fetching()));
    }
    assert!(sync.apply_next().await);

    let tree = sync.tree().read();
    assert_eq!(tree.child_names(tree.root()), vec!["archive", "shop"]);
    assert!(!tree.node(tree.root()).is_some_and(|n| n.is_fetching()));
    assert_eq!(
        notifications.try_recv().expect("notification"),
        Notification::SchemaListRefreshed
    );
}

// ============ Object Detail Tests ============

#[tokio::test]
async fn test_details_survive_contents_refresh() {
    let mock = Arc::new(shop_server());
    let mut sync = start_sync(&mock);

    assert!(sync.refresh_schema_contents("shop"));
    assert!(sync.apply_next().await);

    assert!(sync.load_object_details(
        "shop",
        ObjectType::Table,
        "orders",
        LoadedData::COLUMNS | LoadedData::INDEXES,
    ));
    assert!(sync.apply_next().await);
    assert!(sync.apply_next().await);

    let orders = {
        let tree = sync.tree().read();
        let orders = tree
            .find_node("shop", ObjectType::Table, "orders")
            .expect("orders node");
        assert!(tree.is_loaded(orders, LoadedData::COLUMNS));
        assert!(tree.is_loaded(orders, LoadedData::INDEXES));
        orders
    };

    // Already cached categories are not fetched again
    assert!(!sync.load_object_details("shop", ObjectType::Table, "orders", LoadedData::COLUMNS));

    assert!(sync.refresh_schema_contents("shop"));
    assert!(sync.apply_next().await);

    let tree = sync.tree().read();
    assert_eq!(tree.find_node("shop", ObjectType::Table, "orders"), Some(orders));
    assert!(tree.is_loaded(orders, LoadedData::COLUMNS));
    let schema = tree
        .find_node("shop", ObjectType::Schema, "shop")
        .expect("schema node");
    assert!(tree.node(schema).is_some_and(|n| n.contents_loaded()));
}

#[tokio::test]
async fn test_broken_view_sets_column_error() {
    let mock = Arc::new(shop_server());
    let mut sync = start_sync(&mock);

    assert!(sync.refresh_schema_contents("shop"));
    assert!(sync.apply_next().await);
    assert!(sync.load_object_details("shop", ObjectType::View, "order_totals", LoadedData::COLUMNS));
    assert!(sync.apply_next().await);

    let tree = sync.tree().read();
    let view = tree
        .find_node("shop", ObjectType::View, "order_totals")
        .expect("view node");
    let node = tree.node(view).expect("view node");
    assert!(node.columns_load_error());
    assert!(node.error_details().is_some_and(|m| m.contains("invalid table")));
    assert!(!tree.is_loaded(view, LoadedData::COLUMNS));
    assert!(!node.is_fetching());
}

// ============ Direct Application Tests ============

#[tokio::test]
async fn test_run_request_and_apply_on_plain_tree() {
    let mock = Arc::new(shop_server());
    let (fetcher, _log) = fetcher(&mock);
    let mut tree = ObjectTreeCache::default();

    let request = FetchRequest::ObjectDetails {
        schema: "shop".to_string(),
        object_type: ObjectType::Table,
        name: "orders".to_string(),
        categories: LoadedData::COLUMNS,
    };
    begin_fetch(&mut tree, &request).expect("node is created");
    let responses = run_request(&fetcher, request).await;
    assert_eq!(responses.len(), 1);

    let mut notifications = Vec::new();
    for response in responses {
        assert!(matches!(response, FetchResponse::Columns { .. }));
        notifications.extend(apply_fetch_response(&mut tree, response).expect("applies"));
    }

    assert_eq!(
        notifications,
        vec![Notification::ObjectChanged {
            schema: "shop".to_string(),
            object_type: LiveObjectType::Table,
            name: "orders".to_string(),
        }]
    );
    let orders = tree
        .find_node("shop", ObjectType::Table, "orders")
        .expect("orders node");
    assert!(tree.is_loaded(orders, LoadedData::COLUMNS));
    assert!(!tree.node(orders).is_some_and(|n| n.is_fetching()));
}

#[tokio::test]
async fn test_failed_schema_list_keeps_previous_names() {
    let mock = Arc::new(MockConnection::new().with_server_error(
        "SHOW DATABASES",
        2006,
        "MySQL server has gone away",
    ));
    let (fetcher, log) = fetcher(&mock);
    let mut tree = ObjectTreeCache::default();
    tree.update_schema_list(&["shop".to_string()]);

    begin_fetch(&mut tree, &FetchRequest::SchemaList).expect("root exists");
    for response in run_request(&fetcher, FetchRequest::SchemaList).await {
        assert_eq!(apply_fetch_response(&mut tree, response).expect("applies"), None);
    }

    assert_eq!(tree.child_names(tree.root()), vec!["shop"]);
    let root = tree.node(tree.root()).expect("root");
    assert!(!root.is_fetching());
    assert!(root.error_details().is_some_and(|m| m.contains("gone away")));
    assert_eq!(log.errors().len(), 1);
}

#[tokio::test]
async fn test_failed_detail_fetch_keeps_error_on_node() {
    let mock = Arc::new(shop_server().with_server_error(
        "SHOW INDEXES FROM",
        2013,
        "Lost connection to MySQL server during query",
    ));
    let (fetcher, log) = fetcher(&mock);
    let mut tree = ObjectTreeCache::default();

    let request = FetchRequest::ObjectDetails {
        schema: "shop".to_string(),
        object_type: ObjectType::Table,
        name: "orders".to_string(),
        categories: LoadedData::COLUMNS | LoadedData::INDEXES,
    };
    begin_fetch(&mut tree, &request).expect("node is created");
    for response in run_request(&fetcher, request).await {
        apply_fetch_response(&mut tree, response).expect("applies");
    }

    let orders = tree
        .find_node("shop", ObjectType::Table, "orders")
        .expect("orders node");
    assert!(tree.is_loaded(orders, LoadedData::COLUMNS));
    assert!(!tree.is_loaded(orders, LoadedData::INDEXES));
    let node = tree.node(orders).expect("orders node");
    assert!(!node.is_fetching());
    assert!(!node.columns_load_error());
    assert!(node.error_details().is_some_and(|m| m.contains("Lost connection")));
    assert_eq!(log.errors().len(), 1);

    // A later successful fetch clears the message
    let retry = FetchRequest::ObjectDetails {
        schema: "shop".to_string(),
        object_type: ObjectType::Table,
        name: "orders".to_string(),
        categories: LoadedData::COLUMNS,
    };
    for response in run_request(&fetcher, retry).await {
        apply_fetch_response(&mut tree, response).expect("applies");
    }
    assert_eq!(tree.node(orders).and_then(|n| n.error_details()), None);
}
