// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use crate::alerts_processing::{ReconcileResult, reconcile_alerts};
use crate::config::{FeedCategory, FeedEndpoint, IngestConfig};
use crate::duration_since_unix_epoch;
use crate::errors::{ErrorKind, IngestError};
use crate::feed_entity::FeedEntity;
use crate::fetcher::{FeedSource, fetch_feed};
use crate::gtfs_rt_handlers::DecodedFeed;
use crate::trip_ingest::{IngestResult, ingest_trip_feed};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeedOutcome {
    Ingested(IngestResult),
    /// Alert feed fetched and queued for the shared reconciliation.
    Fetched { entities: usize },
    /// Same header timestamp as the last successful ingestion of this feed.
    Unchanged,
    Failed { kind: ErrorKind, message: String },
}

impl FeedOutcome {
    fn failed(err: &IngestError) -> Self {
        FeedOutcome::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedReport {
    pub url: String,
    pub category: FeedCategory,
    pub outcome: FeedOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Applied(ReconcileResult),
    /// An alert feed failed or none is configured; the stored snapshot was kept.
    Skipped,
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub feeds: Vec<FeedReport>,
    pub alerts: ReconcileOutcome,
}

impl RunReport {
    pub fn failed_feeds(&self) -> usize {
        self.feeds
            .iter()
            .filter(|feed| matches!(feed.outcome, FeedOutcome::Failed { .. }))
            .count()
    }
}

/// Runs one polling cycle over every configured endpoint.
///
/// All fetches finish before the first transaction opens. Trip feeds are
/// then written one after another, one transaction each. Alert payloads are
/// merged by entity id and reconciled together, but only when every alert
/// endpoint delivered. A failing endpoint only shows up in its own report
/// entry.
pub struct Orchestrator<S: FeedSource> {
    config: IngestConfig,
    source: S,
    pool: SqlitePool,
    last_header_timestamps: HashMap<String, u64>,
}

impl<S: FeedSource> Orchestrator<S> {
    pub fn new(config: IngestConfig, source: S, pool: SqlitePool) -> Self {
        Self {
            config,
            source,
            pool,
            last_header_timestamps: HashMap::new(),
        }
    }

    pub async fn run_once(&mut self) -> RunReport {
        let started_at = Utc::now();

        let endpoints: Vec<(FeedCategory, &FeedEndpoint)> = self
            .config
            .trip_feeds
            .iter()
            .map(|endpoint| (FeedCategory::TripUpdates, endpoint))
            .chain(
                self.config
                    .alert_feeds
                    .iter()
                    .map(|endpoint| (FeedCategory::Alerts, endpoint)),
            )
            .collect();

        let source = &self.source;

        // buffered keeps results in configuration order
        let fetched: Vec<Result<DecodedFeed, IngestError>> = futures::stream::iter(&endpoints)
            .map(|(_, endpoint)| fetch_feed(source, endpoint))
            .buffered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut feeds = Vec::with_capacity(endpoints.len());
        let mut alert_entities: Vec<FeedEntity> = Vec::new();
        let mut alert_ids: HashSet<String> = HashSet::new();
        let mut alert_payloads = 0;
        let mut alert_failures = 0;

        for ((category, endpoint), fetch_result) in endpoints.iter().zip(fetched) {
            let outcome = match (category, fetch_result) {
                (_, Err(err)) => {
                    tracing::warn!(url = endpoint.url.as_str(), "{}", err);
                    if *category == FeedCategory::Alerts {
                        alert_failures += 1;
                    }
                    FeedOutcome::failed(&err)
                }
                (FeedCategory::TripUpdates, Ok(feed)) => {
                    ingest_trip(
                        &self.pool,
                        &self.config,
                        &mut self.last_header_timestamps,
                        endpoint,
                        feed,
                    )
                    .await
                }
                (FeedCategory::Alerts, Ok(feed)) => {
                    alert_payloads += 1;
                    let entities = feed.entities.len();
                    // feeds overlap; the first endpoint in configuration order wins
                    alert_entities.extend(
                        feed.entities
                            .into_iter()
                            .filter(|entity| alert_ids.insert(entity.entity_id.clone())),
                    );
                    FeedOutcome::Fetched { entities }
                }
            };

            feeds.push(FeedReport {
                url: endpoint.url.clone(),
                category: *category,
                outcome,
            });
        }

        // a partial snapshot would drop every alert of the endpoint that failed
        let alerts = if alert_failures > 0 {
            tracing::warn!(
                failed = alert_failures,
                "alert feed could not be fetched, keeping stored alerts"
            );
            ReconcileOutcome::Skipped
        } else if alert_payloads == 0 {
            ReconcileOutcome::Skipped
        } else {
            let now = duration_since_unix_epoch().as_secs();

            match reconcile_alerts(&self.pool, &alert_entities, now).await {
                Ok(result) => {
                    tracing::info!(
                        alerts = result.alerts,
                        informed_rows = result.informed_rows,
                        active_now = result.active_now,
                        "reconciled alerts"
                    );
                    ReconcileOutcome::Applied(result)
                }
                Err(err) => {
                    tracing::error!("alert reconciliation failed: {}", err);
                    ReconcileOutcome::Failed {
                        kind: err.kind(),
                        message: err.to_string(),
                    }
                }
            }
        };

        RunReport {
            started_at,
            finished_at: Utc::now(),
            feeds,
            alerts,
        }
    }
}

async fn ingest_trip(
    pool: &SqlitePool,
    config: &IngestConfig,
    last_header_timestamps: &mut HashMap<String, u64>,
    endpoint: &FeedEndpoint,
    feed: DecodedFeed,
) -> FeedOutcome {
    let url = endpoint.url.as_str();

    if let Some(timestamp) = feed.header_timestamp
        && last_header_timestamps.get(url) == Some(&timestamp)
    {
        tracing::debug!(url, timestamp, "feed unchanged since last poll");
        return FeedOutcome::Unchanged;
    }

    match ingest_trip_feed(pool, &feed.entities, config.vehicle_association).await {
        Ok(result) => {
            tracing::info!(
                url,
                trip_updates = result.trip_updates,
                stop_updates = result.stop_updates,
                vehicle_updates = result.vehicle_updates,
                duplicates = result.duplicates_skipped,
                orphan_vehicles = result.orphan_vehicles,
                "ingested trip feed"
            );

            if let Some(timestamp) = feed.header_timestamp {
                last_header_timestamps.insert(url.to_string(), timestamp);
            }

            FeedOutcome::Ingested(result)
        }
        Err(err) => {
            tracing::error!(url, "trip feed rolled back: {}", err);
            FeedOutcome::failed(&err)
        }
    }
}
