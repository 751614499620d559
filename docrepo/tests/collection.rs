mod common;

use bson::{Bson, doc};
use docrepo::prelude::*;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use common::connect;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    sku: String,
    qty: i32,
    status: String,
}

fn order(sku: &str, qty: i32, status: &str) -> Order {
    Order {
        sku: sku.into(),
        qty,
        status: status.into(),
    }
}

#[tokio::test]
async fn test_insert_one_then_find_one_round_trips() {
    let database = connect("app").await;
    let things = database.collection("things", None);

    let inserted = things.insert_one(&doc! { "a": 1, "b": "x" }, None).await.unwrap();
    let found = things.find_one(doc! { "a": 1 }, None).await.unwrap().unwrap();

    assert_eq!(found.get("_id"), Some(&inserted.inserted_id));
    assert_eq!(found.get_i32("a").unwrap(), 1);
    assert_eq!(found.get_str("b").unwrap(), "x");
}

#[tokio::test]
async fn test_typed_insert_and_decode() {
    let database = connect("app").await;
    let orders = database.collection("orders", None);

    orders.insert_one(&order("A-1", 2, "open"), None).await.unwrap();

    let decoded: Option<Order> = orders.find_one_as(doc! { "sku": "A-1" }, None).await.unwrap();
    assert_eq!(decoded, Some(order("A-1", 2, "open")));

    let err = orders.insert_one(&42, None).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
}

#[tokio::test]
async fn test_every_operation_passes_through() {
    let database = connect("app").await;
    let orders = database.collection("orders", None);

    let inserted = orders
        .insert_many(
            [
                order("A-1", 2, "open"),
                order("B-2", 7, "open"),
                order("C-3", 1, "paid"),
            ],
            InsertManyOptions { ordered: Some(true), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(inserted.inserted_ids.len(), 3);

    let open: Vec<Order> = orders
        .find(doc! { "status": "open" }, FindOptions::default().with_sort(doc! { "qty": -1 }))
        .await
        .unwrap()
        .deserialize::<Order>()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(open.iter().map(|o| o.sku.as_str()).collect::<Vec<_>>(), vec!["B-2", "A-1"]);

    assert_eq!(orders.count_documents(doc! { "qty": { "$gte": 2 } }, None).await.unwrap(), 2);

    let updated = orders
        .update_one(doc! { "sku": "A-1" }, doc! { "$inc": { "qty": 3 } }, None)
        .await
        .unwrap();
    assert_eq!((updated.matched_count, updated.modified_count), (1, 1));

    let updated = orders
        .update_many(doc! { "status": "open" }, doc! { "$set": { "status": "packed" } }, None)
        .await
        .unwrap();
    assert_eq!(updated.modified_count, 2);

    let after = orders
        .find_one_and_update(
            doc! { "sku": "C-3" },
            doc! { "$set": { "status": "shipped" } },
            FindOneAndUpdateOptions {
                return_document: Some(ReturnDocument::After),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.get_str("status").unwrap(), "shipped");

    let totals = orders
        .aggregate(
            [
                doc! { "$group": { "_id": "$status", "qty": { "$sum": "$qty" } } },
                doc! { "$sort": { "_id": 1 } },
            ],
            None,
        )
        .await
        .unwrap()
        .collect_documents()
        .await
        .unwrap();
    assert_eq!(
        totals,
        vec![doc! { "_id": "packed", "qty": 12 }, doc! { "_id": "shipped", "qty": 1 }]
    );

    let bulk = orders
        .bulk_write(
            [
                WriteModel::insert_one(doc! { "sku": "D-4", "qty": 4, "status": "open" }),
                WriteModel::update_one(doc! { "sku": "D-4" }, doc! { "$set": { "qty": 5 } }),
                WriteModel::delete_many(doc! { "status": "shipped" }),
            ],
            None,
        )
        .await
        .unwrap();
    assert_eq!((bulk.inserted_count, bulk.modified_count, bulk.deleted_count), (1, 1, 1));

    let removed = orders
        .find_one_and_delete(doc! { "sku": "D-4" }, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(removed.get_i32("qty").unwrap(), 5);

    let deleted = orders.delete_one(doc! { "sku": "A-1" }, None).await.unwrap();
    assert_eq!(deleted.deleted_count, 1);

    let deleted = orders.delete_many(doc! {}, None).await.unwrap();
    assert_eq!(deleted.deleted_count, 1);

    orders.insert_one(&order("E-5", 1, "open"), None).await.unwrap();
    orders.drop().await.unwrap();
    assert_eq!(orders.count_documents(doc! {}, None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_driver_errors_are_returned_unchanged() {
    let database = connect("app").await;
    let orders = database.collection("orders", None);

    orders.insert_one(&doc! { "_id": 1 }, None).await.unwrap();

    assert!(matches!(
        orders.insert_one(&doc! { "_id": 1 }, None).await,
        Err(DocumentStoreError::DocumentAlreadyExists(id, collection)) if id == "1" && collection == "orders"
    ));
    assert!(matches!(
        orders.find_one(doc! { "sku": { "$regex": "^A" } }, None).await,
        Err(DocumentStoreError::UnsupportedOperator(_))
    ));
}

#[tokio::test]
async fn test_upsert_creates_document_from_filter() {
    let database = connect("app").await;
    let counters = database.collection("counters", None);

    let first = counters
        .update_one(doc! { "_id": "visits" }, doc! { "$inc": { "n": 1 } }, UpdateOptions::upsert())
        .await
        .unwrap();
    assert_eq!(first.upserted_id, Some(Bson::String("visits".into())));

    let second = counters
        .update_one(doc! { "_id": "visits" }, doc! { "$inc": { "n": 1 } }, UpdateOptions::upsert())
        .await
        .unwrap();
    assert_eq!((second.matched_count, second.upserted_id), (1, None));

    let counter = counters.find_one(doc! { "_id": "visits" }, None).await.unwrap().unwrap();
    assert_eq!(counter, doc! { "_id": "visits", "n": 2 });
}

#[tokio::test]
async fn test_dyn_collections_share_one_type() {
    let database = connect("app").await;

    let handles: Vec<DynCollection> = vec![
        database.collection("a", None).into_dyn(),
        database.collection("b", None).into_dyn(),
    ];

    for handle in &handles {
        handle.insert_one(&doc! { "from": handle.name() }, None).await.unwrap();
    }

    let b = database.collection("b", None);
    let found = b.find_one(doc! {}, None).await.unwrap().unwrap();
    assert_eq!(found.get_str("from").unwrap(), "b");
}
