// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Removal of the attribution is not allowed, as covered under the AGPL license
use crate::schema;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// This type alias is the pool, which can be queried for connections.
/// Writers take a transaction per feed; readers share the same pool.
pub type FeedStorePool = SqlitePool;

pub async fn make_pool(database_url: &str) -> Result<FeedStorePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        // readers keep seeing the last committed batch while a writer is busy
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub async fn apply_schema(pool: &FeedStorePool) -> Result<(), sqlx::Error> {
    let mut transaction = pool.begin().await?;

    for statement in schema::statements() {
        sqlx::query(statement).execute(&mut *transaction).await?;
    }

    transaction.commit().await?;

    Ok(())
}
