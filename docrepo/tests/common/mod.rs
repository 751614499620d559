#![allow(dead_code)]

use docrepo::{memory::InMemoryDatabase, prelude::*};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn connect(name: &str) -> Database<InMemoryDatabase> {
    init_tracing();

    Database::connect(InMemoryDatabase::builder(name))
        .await
        .expect("in-memory database connects")
}
