mod sqlite_impl;

pub mod orders;
pub mod registrations;
pub mod sessions;
pub mod settlements;

use std::{env, str::FromStr};

use log::*;
pub use sqlite_impl::SqliteDatabase;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

const SQLITE_DB_URL: &str = "sqlite://data/bazaar_store.db";

pub fn db_url() -> String {
    let result = env::var("BZR_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ BZR_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Maps a unique-constraint violation to `on_conflict`, and every other driver error to a database error.
pub(crate) fn on_unique_violation<F>(e: sqlx::Error, on_conflict: F) -> crate::traits::OrderFlowError
where F: FnOnce(&str) -> crate::traits::OrderFlowError {
    match &e {
        sqlx::Error::Database(de) if de.is_unique_violation() => on_conflict(de.message()),
        _ => e.into(),
    }
}
