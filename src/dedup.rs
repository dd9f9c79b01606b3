use sqlx::SqliteConnection;

/// Whether an entity id has already been stored as a trip update.
///
/// Runs on the caller's connection so rows inserted earlier in the same
/// transaction count as seen.
pub async fn update_id_exists(
    conn: &mut SqliteConnection,
    update_id: &str,
) -> Result<bool, sqlx::Error> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM trip_update WHERE update_id = ?")
        .bind(update_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(existing.is_some())
}
