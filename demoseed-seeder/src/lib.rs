//! demoseed seeding pipeline
//!
//! Library interface for the `demoseed` binary, exposed for integration
//! testing. The pipeline: generated (or loaded) records are deduplicated,
//! submitted through the target application's form interface, and the
//! fields the forms cannot set (creation/modification timestamps and
//! ownership) are backfilled by direct datastore mutation.

pub mod db;
pub mod generate;
pub mod models;
pub mod services;
pub mod utils;

use demoseed_common::config::Settings;
use demoseed_common::Result;
use services::app_client::AppClient;
use sqlx::MySqlPool;
use tracing::info;

/// Everything a seeding run reaches the network or storage through:
/// one datastore pool and one authenticated application session, built at
/// run start and torn down on every exit path.
pub struct SeedContext {
    pub settings: Settings,
    pub db: MySqlPool,
    pub app: AppClient,
}

impl SeedContext {
    /// Connect the datastore and authenticate the application session.
    /// Either failing aborts the run; nothing downstream can proceed.
    pub async fn initialize(settings: Settings) -> Result<Self> {
        let db = demoseed_common::db::connect(&settings.database_url).await?;
        let app = AppClient::new(&settings)?;
        if let Err(err) = app.login().await {
            demoseed_common::db::close(&db).await;
            return Err(err);
        }
        Ok(SeedContext { settings, db, app })
    }

    pub async fn shutdown(self) {
        demoseed_common::db::close(&self.db).await;
        info!("Run context released");
    }
}
