use crate::config::VehicleAssociation;
use crate::dedup::update_id_exists;
use crate::errors::IngestError;
use crate::feed_entity::{EntityPayload, FeedEntity, StopTimeUpdate, TripUpdate, VehiclePosition};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    pub trip_updates: usize,
    pub stop_updates: usize,
    pub vehicle_updates: usize,
    pub duplicates_skipped: usize,
    /// Vehicles that arrived with no trip update to attach to.
    pub orphan_vehicles: usize,
    /// Alerts showing up in a trip feed.
    pub ignored: usize,
}

/// Which trip update the next vehicle position belongs to. Lives for one
/// batch only.
struct TripContext {
    association: VehicleAssociation,
    current: Option<i64>,
    by_trip_id: HashMap<String, i64>,
}

impl TripContext {
    fn new(association: VehicleAssociation) -> Self {
        Self {
            association,
            current: None,
            by_trip_id: HashMap::new(),
        }
    }

    fn establish(&mut self, trip_update_id: i64, trip_id: Option<&str>) {
        self.current = Some(trip_update_id);
        if let Some(trip_id) = trip_id {
            self.by_trip_id.insert(trip_id.to_string(), trip_update_id);
        }
    }

    fn skip_duplicate(&mut self) {
        if self.association == VehicleAssociation::BatchOrder {
            self.current = None;
        }
    }

    fn for_vehicle(&self, vehicle: &VehiclePosition) -> Option<i64> {
        match self.association {
            VehicleAssociation::BatchOrder | VehicleAssociation::LastInserted => self.current,
            VehicleAssociation::TripId => vehicle
                .trip_id()
                .and_then(|trip_id| self.by_trip_id.get(trip_id).copied()),
        }
    }
}

/// Writes one trip/vehicle feed in a single transaction.
///
/// Entities are handled strictly in feed order: a vehicle position is linked
/// to the trip update established before it in the same batch, which relies on
/// the upstream placing each vehicle right after its trip update. Entities
/// whose id is already stored are skipped, so replaying a snapshot adds no
/// rows. Under `BatchOrder` a skipped trip update also drops the context, so
/// the vehicle that follows it is counted as an orphan instead of landing on
/// an unrelated trip; `LastInserted` keeps the earlier context instead. Any
/// failed insert rolls the whole batch back.
pub async fn ingest_trip_feed(
    pool: &SqlitePool,
    entities: &[FeedEntity],
    association: VehicleAssociation,
) -> Result<IngestResult, IngestError> {
    let mut transaction = pool.begin().await?;
    let mut context = TripContext::new(association);
    let mut result = IngestResult::default();

    for entity in entities {
        if update_id_exists(&mut *transaction, &entity.entity_id).await? {
            result.duplicates_skipped += 1;
            if matches!(entity.payload, EntityPayload::TripUpdate(_)) {
                context.skip_duplicate();
            }
            continue;
        }

        match &entity.payload {
            EntityPayload::TripUpdate(trip_update) => {
                let trip_update_id =
                    insert_trip_update(&mut *transaction, &entity.entity_id, trip_update).await?;
                context.establish(trip_update_id, trip_update.trip.trip_id.as_deref());
                result.trip_updates += 1;

                for stop_time_update in &trip_update.stop_time_updates {
                    insert_stop_update(&mut *transaction, trip_update_id, stop_time_update).await?;
                    result.stop_updates += 1;
                }
            }
            EntityPayload::VehiclePosition(vehicle) => match context.for_vehicle(vehicle) {
                Some(trip_update_id) => {
                    insert_vehicle_update(&mut *transaction, trip_update_id, vehicle).await?;
                    result.vehicle_updates += 1;
                }
                None => {
                    tracing::debug!(
                        entity_id = entity.entity_id.as_str(),
                        "vehicle position has no trip update in this batch"
                    );
                    result.orphan_vehicles += 1;
                }
            },
            EntityPayload::Alert(_) => {
                result.ignored += 1;
            }
        }
    }

    transaction.commit().await?;

    Ok(result)
}

async fn insert_trip_update(
    conn: &mut SqliteConnection,
    update_id: &str,
    trip_update: &TripUpdate,
) -> Result<i64, sqlx::Error> {
    let trip = &trip_update.trip;

    let inserted = sqlx::query(
        "INSERT INTO trip_update (update_id, trip_id, start_time, start_date, route_id)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(update_id)
    .bind(trip.trip_id.as_deref())
    .bind(trip.start_time.as_deref())
    .bind(trip.start_date.as_deref())
    .bind(trip.route_id.as_deref())
    .execute(&mut *conn)
    .await?;

    Ok(inserted.last_insert_rowid())
}

async fn insert_stop_update(
    conn: &mut SqliteConnection,
    trip_update_id: i64,
    stop_time_update: &StopTimeUpdate,
) -> Result<(), sqlx::Error> {
    let (stop_id, direction) = stop_time_update.stop_id_and_direction();

    sqlx::query(
        "INSERT INTO stop_update (trip_update_id, arrival, departure, stop_id, direction)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(trip_update_id)
    .bind(stop_time_update.arrival)
    .bind(stop_time_update.departure)
    .bind(stop_id)
    .bind(direction)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_vehicle_update(
    conn: &mut SqliteConnection,
    trip_update_id: i64,
    vehicle: &VehiclePosition,
) -> Result<(), sqlx::Error> {
    // sqlite integers are signed
    let timestamp = vehicle.timestamp.and_then(|ts| i64::try_from(ts).ok());

    sqlx::query(
        "INSERT INTO vehicle_update (trip_update_id, timestamp, current_stop_id)
         VALUES (?, ?, ?)",
    )
    .bind(trip_update_id)
    .bind(timestamp)
    .bind(vehicle.current_stop_id.as_deref())
    .execute(&mut *conn)
    .await?;

    Ok(())
}
