//! Decoded feed entities.
//!
//! A GTFS-realtime entity carries at most one of a trip update, a vehicle
//! position or an alert. The decoder turns it into a [`FeedEntity`] whose
//! [`EntityPayload`] names that variant, so the pipelines dispatch on the
//! enum instead of probing optional fields.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedEntity {
    /// Source-assigned id, reused on every poll while the condition persists.
    pub entity_id: String,
    pub payload: EntityPayload,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EntityPayload {
    TripUpdate(TripUpdate),
    VehiclePosition(VehiclePosition),
    Alert(Alert),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripInfo {
    pub trip_id: Option<String>,
    pub route_id: Option<String>,
    pub start_time: Option<String>,
    pub start_date: Option<String>,
}

impl From<gtfs_realtime::TripDescriptor> for TripInfo {
    fn from(trip_descriptor: gtfs_realtime::TripDescriptor) -> Self {
        TripInfo {
            trip_id: trip_descriptor.trip_id,
            route_id: trip_descriptor.route_id,
            start_time: trip_descriptor.start_time,
            start_date: trip_descriptor.start_date,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripUpdate {
    pub trip: TripInfo,
    /// Future stops in the order the feed lists them.
    pub stop_time_updates: Vec<StopTimeUpdate>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopTimeUpdate {
    /// Stop id with the direction character still attached, e.g. `D26S`.
    pub stop_id_raw: String,
    pub arrival: Option<i64>,
    pub departure: Option<i64>,
}

impl StopTimeUpdate {
    pub fn stop_id_and_direction(&self) -> (&str, Option<&str>) {
        split_stop_id(&self.stop_id_raw)
    }
}

/// Splits a raw stop id into the stop identifier and its trailing direction
/// character. `"D26S"` becomes `("D26", Some("S"))`; an empty id has no
/// direction.
pub fn split_stop_id(raw: &str) -> (&str, Option<&str>) {
    match raw.char_indices().next_back() {
        Some((idx, _)) => (&raw[..idx], Some(&raw[idx..])),
        None => (raw, None),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehiclePosition {
    pub trip: Option<TripInfo>,
    pub timestamp: Option<u64>,
    pub current_stop_id: Option<String>,
}

impl VehiclePosition {
    pub fn trip_id(&self) -> Option<&str> {
        self.trip.as_ref().and_then(|trip| trip.trip_id.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub active_periods: Vec<ActivePeriod>,
    pub informed_entities: Vec<InformedEntity>,
    pub header_text: Option<String>,
}

impl Alert {
    /// An alert without any active period is in effect until removed from
    /// the feed.
    pub fn is_active_at(&self, epoch_seconds: u64) -> bool {
        self.active_periods.is_empty()
            || self
                .active_periods
                .iter()
                .any(|period| period.contains(epoch_seconds))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePeriod {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ActivePeriod {
    pub fn contains(&self, epoch_seconds: u64) -> bool {
        self.start.is_none_or(|start| start <= epoch_seconds)
            && self.end.is_none_or(|end| epoch_seconds <= end)
    }
}

impl From<gtfs_realtime::TimeRange> for ActivePeriod {
    fn from(time_range: gtfs_realtime::TimeRange) -> Self {
        ActivePeriod {
            start: time_range.start,
            end: time_range.end,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InformedEntity {
    pub stop_id: Option<String>,
    pub route_id: Option<String>,
}

impl InformedEntity {
    /// The stop wins when a selector names both a stop and a route.
    pub fn target(&self) -> Option<AlertTarget> {
        match (&self.stop_id, &self.route_id) {
            (Some(stop_id), _) => Some(AlertTarget::Stop(stop_id.clone())),
            (None, Some(route_id)) => Some(AlertTarget::Route(route_id.clone())),
            (None, None) => None,
        }
    }
}

impl From<gtfs_realtime::EntitySelector> for InformedEntity {
    fn from(selector: gtfs_realtime::EntitySelector) -> Self {
        InformedEntity {
            stop_id: selector.stop_id,
            route_id: selector.route_id,
        }
    }
}

/// What an alert row is attached to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTarget {
    Stop(String),
    Route(String),
}
