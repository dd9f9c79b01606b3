//! Builders for GTFS-realtime messages and an in-memory store, shared by the
//! unit tests.

use crate::db_tools::apply_schema;
use crate::feed_entity::FeedEntity;
use crate::gtfs_rt_handlers::decode_feed;
use gtfs_realtime::trip_update::{StopTimeEvent, StopTimeUpdate};
use prost::Message;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

pub const FEED_TIMESTAMP: u64 = 1742855500;

/// A single connection keeps the in-memory database alive for the whole test.
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();

    apply_schema(&pool).await.unwrap();

    pool
}

pub fn make_stu(stop_id: &str, time: i64) -> StopTimeUpdate {
    StopTimeUpdate {
        stop_id: Some(stop_id.to_string()),
        arrival: Some(StopTimeEvent {
            time: Some(time),
            ..Default::default()
        }),
        departure: Some(StopTimeEvent {
            time: Some(time),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn trip_descriptor(trip_id: &str, route_id: &str) -> gtfs_realtime::TripDescriptor {
    gtfs_realtime::TripDescriptor {
        trip_id: Some(trip_id.to_string()),
        route_id: Some(route_id.to_string()),
        start_time: Some("18:31:30".to_string()),
        start_date: Some("20250324".to_string()),
        ..Default::default()
    }
}

pub fn trip_update_entity(
    id: &str,
    trip_id: &str,
    route_id: &str,
    stops: &[(&str, i64)],
) -> gtfs_realtime::FeedEntity {
    gtfs_realtime::FeedEntity {
        id: id.to_string(),
        trip_update: Some(gtfs_realtime::TripUpdate {
            trip: trip_descriptor(trip_id, route_id),
            stop_time_update: stops
                .iter()
                .map(|(stop_id, time)| make_stu(stop_id, *time))
                .collect(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn vehicle_entity(
    id: &str,
    trip_id: &str,
    route_id: &str,
    timestamp: u64,
    stop_id: &str,
) -> gtfs_realtime::FeedEntity {
    gtfs_realtime::FeedEntity {
        id: id.to_string(),
        vehicle: Some(gtfs_realtime::VehiclePosition {
            trip: Some(trip_descriptor(trip_id, route_id)),
            timestamp: Some(timestamp),
            stop_id: Some(stop_id.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn translation(text: &str, language: &str) -> gtfs_realtime::translated_string::Translation {
    gtfs_realtime::translated_string::Translation {
        text: text.to_string(),
        language: Some(language.to_string()),
    }
}

pub fn stop_selector(stop_id: &str) -> gtfs_realtime::EntitySelector {
    gtfs_realtime::EntitySelector {
        stop_id: Some(stop_id.to_string()),
        ..Default::default()
    }
}

pub fn route_selector(route_id: &str) -> gtfs_realtime::EntitySelector {
    gtfs_realtime::EntitySelector {
        route_id: Some(route_id.to_string()),
        ..Default::default()
    }
}

pub fn alert_entity(
    id: &str,
    informed: &[gtfs_realtime::EntitySelector],
    header: &str,
) -> gtfs_realtime::FeedEntity {
    gtfs_realtime::FeedEntity {
        id: id.to_string(),
        alert: Some(gtfs_realtime::Alert {
            active_period: vec![gtfs_realtime::TimeRange {
                start: Some(1747360800),
                end: Some(1759204800),
            }],
            informed_entity: informed.to_vec(),
            header_text: Some(gtfs_realtime::TranslatedString {
                translation: vec![translation(header, "en")],
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn create_feed_message(entities: &[gtfs_realtime::FeedEntity]) -> gtfs_realtime::FeedMessage {
    gtfs_realtime::FeedMessage {
        header: gtfs_realtime::FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            timestamp: Some(FEED_TIMESTAMP),
            ..Default::default()
        },
        entity: entities.to_vec(),
    }
}

pub fn encode_feed(entities: &[gtfs_realtime::FeedEntity]) -> Vec<u8> {
    create_feed_message(entities).encode_to_vec()
}

/// Round trips through the wire format so tests feed the pipelines exactly
/// what the decoder produces.
pub fn decoded(entities: &[gtfs_realtime::FeedEntity]) -> Vec<FeedEntity> {
    decode_feed("http://feeds.test", &encode_feed(entities))
        .unwrap()
        .entities
}
