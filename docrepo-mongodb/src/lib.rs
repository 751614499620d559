//! MongoDB backend implementation for docrepo.
//!
//! This crate adapts the official MongoDB driver to the docrepo backend traits. It adds no
//! semantics of its own: every collection operation is the driver's equivalent call, and
//! driver errors are returned unchanged inside `DocumentStoreError::Backend`.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docrepo = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The builder takes a [`ConnectionConfig`](docrepo_core::config::ConnectionConfig) and
//! derives the connection string `<uri>/<database>[?retryWrites=true]` from it. Empty
//! parameters are rejected before the driver is touched. `Database::connect` then pings the
//! primary once before handing out the handle.
//!
//! Bulk writes go through the driver's client-level bulk write API, which requires MongoDB
//! 8.0 or newer.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::{prelude::*, mongodb::MongoDbBackend};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let config = ConnectionConfig::new("mongodb://localhost:27017", "my_database", true);
//!     let database = Database::connect(MongoDbBackend::builder(config)).await?;
//!
//!     database.disconnect().await
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_mongodb;

pub mod collection;
pub mod store;
mod convert;

pub use collection::MongoDbCollection;
pub use store::{MongoDbBackend, MongoDbBackendBuilder};
