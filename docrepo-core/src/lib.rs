//! A thin repository layer over document databases.
//!
//! This crate is the core of the docrepo project and provides:
//!
//! - **Backend abstraction** ([`backend`]) - The capability set a database driver adapter implements
//! - **Database handle** ([`database`]) - Connection lifecycle and collection acquisition
//! - **Collection handle** ([`collection`]) - Pass-through CRUD and aggregation operations
//! - **Operation options** ([`options`]) - Per-operation option sets native to each call
//! - **Write results** ([`results`]) - Typed results returned by write operations
//! - **Write models** ([`model`]) - Individual writes submitted through a bulk write
//! - **Cursors** ([`cursor`]) - Lazy streams over multi-document reads
//! - **Configuration** ([`config`]) - Connection parameters and connection string construction
//! - **Struct validation** ([`validation`]) - A shared, attribute-driven struct validator
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
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
//!     users.insert_one(&doc! { "name": "Alice" }, None).await?;
//!     let alice = users.find_one(doc! { "name": "Alice" }, None).await?;
//!
//!     database.disconnect().await
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod database;
pub mod error;
pub mod model;
pub mod options;
pub mod results;
pub mod validation;
