//! In-memory database backend for docrepo.
//!
//! This crate provides a thread-safe, in-memory implementation of the docrepo backend traits.
//! It evaluates filters, updates and aggregation pipelines itself, so code written against
//! [`Collection`](docrepo_core::collection::Collection) can be exercised without a running
//! server.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Server-like semantics** - Generated `_id`s, duplicate key errors, upserts, ordered and
//!   unordered batch writes
//! - **Query support** - Comparison, element, array and logical filter operators
//! - **Update support** - Field, arithmetic and array update operators, and update pipelines
//! - **Aggregation** - `$match`, `$project`, `$sort`, `$skip`, `$limit`, `$count`, `$set`,
//!   `$unset` and `$group`
//! - **Fault injection** - A builder option that makes every health check fail
//!
//! Operators outside the supported subset are rejected with
//! [`DocumentStoreError::UnsupportedOperator`](docrepo_core::error::DocumentStoreError::UnsupportedOperator)
//! rather than silently ignored.
//!
//! # Quick Start
//!
//! ```ignore
//! use docrepo::{prelude::*, memory::InMemoryDatabase};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let database = Database::connect(InMemoryDatabase::builder("app")).await?;
//!     let orders = database.collection("orders", None);
//!
//!     orders.insert_many([doc! { "sku": "A", "qty": 2 }, doc! { "sku": "B", "qty": 5 }], None).await?;
//!     orders.update_many(doc! { "qty": { "$gt": 3 } }, doc! { "$set": { "bulk": true } }, None).await?;
//!
//!     database.disconnect().await
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_memory;

pub mod store;
mod evaluator;
mod pipeline;
mod update;

pub use store::{InMemoryCollection, InMemoryDatabase, InMemoryDatabaseBuilder};
