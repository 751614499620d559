//! A thin repository layer over document databases.
//!
//! This crate is the entry point of the docrepo project. It re-exports the core handles and
//! types and provides access to the available backends.
//!
//! # Features
//!
//! - **One-shot bootstrap** - [`Database::connect`](database::Database::connect) validates the
//!   connection parameters, builds the client and pings the primary before returning a handle
//! - **Pass-through collections** - Every collection operation is the driver's own call with
//!   the driver's own options, results and errors
//! - **Substitutable backends** - A live MongoDB backend and an in-memory backend implement the
//!   same capability set
//! - **Struct validation** - A shared, attribute-driven validator constructed once per process
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
//!     let users = database.collection("users", None);
//!
//!     users.insert_one(&doc! { "name": "Alice", "age": 30 }, None).await?;
//!     users
//!         .update_one(doc! { "name": "Alice" }, doc! { "$inc": { "age": 1 } }, None)
//!         .await?;
//!
//!     let alice = users.find_one(doc! { "name": "Alice" }, None).await?;
//!     println!("{alice:?}");
//!
//!     database.disconnect().await
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! Collection handles can erase their backend type with
//! [`Collection::into_dyn`](collection::Collection::into_dyn), so code that stores handles
//! does not need to be generic over the backend.
//!
//! ```ignore
//! use docrepo::prelude::*;
//!
//! struct UserRepository {
//!     users: DynCollection,
//! }
//!
//! let repository = UserRepository {
//!     users: database.collection("users", None).into_dyn(),
//! };
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory backend for development and testing
//! - `mongodb` - MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docrepo_core::{
    backend, collection, config, cursor, database, error, model, options, results, validation,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory backend implementations.
pub mod memory {
    pub use docrepo_memory::{InMemoryCollection, InMemoryDatabase, InMemoryDatabaseBuilder};
}

/// MongoDB backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docrepo_mongodb::{MongoDbBackend, MongoDbBackendBuilder, MongoDbCollection};
}
