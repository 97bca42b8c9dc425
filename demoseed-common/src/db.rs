//! Datastore connection management
//!
//! One pool per run, opened during setup and closed explicitly at run end.
//! A connection failure here is fatal for the whole run; nothing downstream
//! can proceed without the datastore.

use crate::Result;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use tracing::info;

/// Open the datastore pool for a seeding run.
pub async fn connect(database_url: &str) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Datastore connection established");
    Ok(pool)
}

/// Tear the pool down. Safe to call once at any exit path.
pub async fn close(pool: &MySqlPool) {
    pool.close().await;
    info!("Datastore connection closed");
}
