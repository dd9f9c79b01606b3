// Tables written by the ingestion pipelines and read by the query interface.
// Statements are idempotent so they can run on every start.

pub const CREATE_TRIP_UPDATE: &str = "CREATE TABLE IF NOT EXISTS trip_update (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    update_id TEXT NOT NULL UNIQUE,
    trip_id TEXT,
    start_time TEXT,
    start_date TEXT,
    route_id TEXT
)";

pub const CREATE_STOP_UPDATE: &str = "CREATE TABLE IF NOT EXISTS stop_update (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trip_update_id INTEGER NOT NULL REFERENCES trip_update (id),
    arrival INTEGER,
    departure INTEGER,
    stop_id TEXT NOT NULL,
    direction TEXT NOT NULL CHECK (length(direction) = 1)
)";

pub const CREATE_VEHICLE_UPDATE: &str = "CREATE TABLE IF NOT EXISTS vehicle_update (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trip_update_id INTEGER NOT NULL REFERENCES trip_update (id),
    timestamp INTEGER,
    current_stop_id TEXT
)";

pub const CREATE_ALERTS: &str = "CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_id TEXT NOT NULL,
    stop_id TEXT,
    route_id TEXT,
    alert_text TEXT,
    CHECK (stop_id IS NULL OR route_id IS NULL)
)";

pub const INDEXES: [&str; 6] = [
    "CREATE INDEX IF NOT EXISTS trip_update_route_id_idx ON trip_update (route_id)",
    "CREATE INDEX IF NOT EXISTS trip_update_trip_id_idx ON trip_update (trip_id)",
    "CREATE INDEX IF NOT EXISTS stop_update_trip_update_id_idx ON stop_update (trip_update_id)",
    "CREATE INDEX IF NOT EXISTS vehicle_update_trip_update_id_idx ON vehicle_update (trip_update_id)",
    "CREATE INDEX IF NOT EXISTS alerts_stop_id_idx ON alerts (stop_id)",
    "CREATE INDEX IF NOT EXISTS alerts_route_id_idx ON alerts (route_id)",
];

pub fn statements() -> impl Iterator<Item = &'static str> {
    [
        CREATE_TRIP_UPDATE,
        CREATE_STOP_UPDATE,
        CREATE_VEHICLE_UPDATE,
        CREATE_ALERTS,
    ]
    .into_iter()
    .chain(INDEXES)
}
