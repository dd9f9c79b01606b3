// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use crate::errors::IngestError;
use crate::feed_entity::{Alert, AlertTarget, EntityPayload, FeedEntity};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileResult {
    /// Rows of the previous snapshot that were replaced.
    pub rows_cleared: u64,
    pub alerts: usize,
    pub informed_rows: usize,
    /// Informed entities naming neither a stop nor a route.
    pub skipped_informed_entities: usize,
    pub active_now: usize,
    pub ignored: usize,
}

/// Replaces the stored alerts with the given snapshot.
///
/// The table is a point-in-time view of the upstream feed, so whatever was
/// there before is removed first. Clearing and re-inserting share one
/// transaction: on any failure the previous snapshot is left untouched.
pub async fn reconcile_alerts(
    pool: &SqlitePool,
    entities: &[FeedEntity],
    now_epoch: u64,
) -> Result<ReconcileResult, IngestError> {
    let mut transaction = pool.begin().await?;
    let mut result = ReconcileResult::default();

    result.rows_cleared = sqlx::query("DELETE FROM alerts")
        .execute(&mut *transaction)
        .await?
        .rows_affected();

    for entity in entities {
        let EntityPayload::Alert(alert) = &entity.payload else {
            result.ignored += 1;
            continue;
        };

        insert_alert(&mut *transaction, &entity.entity_id, alert, &mut result).await?;

        if alert.is_active_at(now_epoch) {
            result.active_now += 1;
        }
    }

    transaction.commit().await?;

    Ok(result)
}

async fn insert_alert(
    conn: &mut SqliteConnection,
    alert_id: &str,
    alert: &Alert,
    result: &mut ReconcileResult,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO alerts (alert_id) VALUES (?)")
        .bind(alert_id)
        .execute(&mut *conn)
        .await?;
    result.alerts += 1;

    for informed_entity in &alert.informed_entities {
        let (stop_id, route_id) = match informed_entity.target() {
            Some(AlertTarget::Stop(stop_id)) => (Some(stop_id), None),
            Some(AlertTarget::Route(route_id)) => (None, Some(route_id)),
            None => {
                tracing::debug!(alert_id, "informed entity names neither stop nor route");
                result.skipped_informed_entities += 1;
                continue;
            }
        };

        sqlx::query(
            "INSERT INTO alerts (alert_id, stop_id, route_id, alert_text) VALUES (?, ?, ?, ?)",
        )
        .bind(alert_id)
        .bind(stop_id)
        .bind(route_id)
        .bind(alert.header_text.as_deref())
        .execute(&mut *conn)
        .await?;
        result.informed_rows += 1;
    }

    Ok(())
}
