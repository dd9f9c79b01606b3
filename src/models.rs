// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TripUpdateRecord {
    pub id: i64,
    pub update_id: String,
    pub trip_id: Option<String>,
    pub start_time: Option<String>,
    pub start_date: Option<String>,
    pub route_id: Option<String>,
}

#[derive(FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StopUpdateRecord {
    pub id: i64,
    pub trip_update_id: i64,
    pub arrival: Option<i64>,
    pub departure: Option<i64>,
    pub stop_id: String,
    pub direction: String,
}

#[derive(FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VehicleUpdateRecord {
    pub id: i64,
    pub trip_update_id: i64,
    pub timestamp: Option<i64>,
    pub current_stop_id: Option<String>,
}

#[derive(FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub id: i64,
    pub alert_id: String,
    pub stop_id: Option<String>,
    pub route_id: Option<String>,
    pub alert_text: Option<String>,
}

/// A trip update with its stop updates in feed order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TripUpdateWithStops {
    #[serde(flatten)]
    pub trip_update: TripUpdateRecord,
    pub stop_updates: Vec<StopUpdateRecord>,
}

/// What collaborators get back when asking for alerts on a stop or route.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AlertNotice {
    pub alert_id: String,
    pub text: Option<String>,
}
