//! Read side of the store. Every call reads inside its own transaction so a
//! batch committed halfway through a call is either fully visible or not at
//! all.

use crate::feed_entity::AlertTarget;
use crate::models::{
    AlertNotice, AlertRecord, StopUpdateRecord, TripUpdateRecord, TripUpdateWithStops,
    VehicleUpdateRecord,
};
use itertools::Itertools;
use sqlx::SqlitePool;

/// Alerts attached to a stop or a route, in the order they were stored.
pub async fn alerts_for(
    pool: &SqlitePool,
    target: &AlertTarget,
) -> Result<Vec<AlertNotice>, sqlx::Error> {
    let (sql, id) = match target {
        AlertTarget::Stop(stop_id) => (
            "SELECT alert_id, alert_text AS text FROM alerts WHERE stop_id = ? ORDER BY id",
            stop_id,
        ),
        AlertTarget::Route(route_id) => (
            "SELECT alert_id, alert_text AS text FROM alerts WHERE route_id = ? ORDER BY id",
            route_id,
        ),
    };

    let mut transaction = pool.begin().await?;

    let notices = sqlx::query_as::<_, AlertNotice>(sql)
        .bind(id)
        .fetch_all(&mut *transaction)
        .await?;

    transaction.commit().await?;

    Ok(notices)
}

pub async fn current_alert_snapshot(pool: &SqlitePool) -> Result<Vec<AlertRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM alerts ORDER BY id")
        .fetch_all(pool)
        .await
}

/// Every stored trip update on a route, oldest first, each with its stop
/// updates in feed order.
pub async fn trip_updates_for(
    pool: &SqlitePool,
    route_id: &str,
) -> Result<Vec<TripUpdateWithStops>, sqlx::Error> {
    let mut transaction = pool.begin().await?;

    let trip_updates: Vec<TripUpdateRecord> =
        sqlx::query_as("SELECT * FROM trip_update WHERE route_id = ? ORDER BY id")
            .bind(route_id)
            .fetch_all(&mut *transaction)
            .await?;

    let stop_updates: Vec<StopUpdateRecord> = sqlx::query_as(
        "SELECT stop_update.* FROM stop_update
         JOIN trip_update ON trip_update.id = stop_update.trip_update_id
         WHERE trip_update.route_id = ?
         ORDER BY stop_update.id",
    )
    .bind(route_id)
    .fetch_all(&mut *transaction)
    .await?;

    transaction.commit().await?;

    let mut stops_by_trip_update = stop_updates
        .into_iter()
        .into_group_map_by(|stop_update| stop_update.trip_update_id);

    Ok(trip_updates
        .into_iter()
        .map(|trip_update| TripUpdateWithStops {
            stop_updates: stops_by_trip_update
                .remove(&trip_update.id)
                .unwrap_or_default(),
            trip_update,
        })
        .collect())
}

/// Stop updates of the most recently stored trip update for `trip_id`.
pub async fn stop_updates_for_trip(
    pool: &SqlitePool,
    trip_id: &str,
) -> Result<Vec<StopUpdateRecord>, sqlx::Error> {
    let mut transaction = pool.begin().await?;

    let stop_updates = sqlx::query_as(
        "SELECT * FROM stop_update
         WHERE trip_update_id = (SELECT MAX(id) FROM trip_update WHERE trip_id = ?)
         ORDER BY id",
    )
    .bind(trip_id)
    .fetch_all(&mut *transaction)
    .await?;

    transaction.commit().await?;

    Ok(stop_updates)
}

pub async fn latest_vehicle_for_trip(
    pool: &SqlitePool,
    trip_id: &str,
) -> Result<Option<VehicleUpdateRecord>, sqlx::Error> {
    let mut transaction = pool.begin().await?;

    let vehicle = sqlx::query_as(
        "SELECT vehicle_update.* FROM vehicle_update
         JOIN trip_update ON trip_update.id = vehicle_update.trip_update_id
         WHERE trip_update.trip_id = ?
         ORDER BY vehicle_update.id DESC
         LIMIT 1",
    )
    .bind(trip_id)
    .fetch_optional(&mut *transaction)
    .await?;

    transaction.commit().await?;

    Ok(vehicle)
}
