use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:dailycommuter.db";
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedCategory {
    TripUpdates,
    Alerts,
}

/// How a vehicle position finds the trip update it belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleAssociation {
    /// The trip update inserted most recently in the same batch. A skipped
    /// duplicate trip update leaves no context, so its vehicle is an orphan.
    #[default]
    BatchOrder,
    /// Like `batch_order`, but a skipped duplicate keeps the previously
    /// inserted trip update as the context, so the duplicate's vehicle is
    /// attached to it.
    LastInserted,
    /// The trip update inserted earlier in the same batch with the same trip_id.
    TripId,
}

impl std::str::FromStr for VehicleAssociation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "batch_order" => Ok(VehicleAssociation::BatchOrder),
            "last_inserted" => Ok(VehicleAssociation::LastInserted),
            "trip_id" => Ok(VehicleAssociation::TripId),
            other => Err(ConfigError::InvalidValue {
                name: "VEHICLE_ASSOCIATION",
                expected: "batch_order, last_inserted or trip_id",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct FeedEndpoint {
    pub url: String,
    pub key: Option<String>,
}

impl FeedEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        FeedEndpoint {
            url: url.into(),
            key: None,
        }
    }

    pub fn with_key(url: impl Into<String>, key: impl Into<String>) -> Self {
        FeedEndpoint {
            url: url.into(),
            key: Some(key.into()),
        }
    }
}

// keys must never end up in logs
impl std::fmt::Debug for FeedEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedEndpoint")
            .field("url", &self.url)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub database_url: String,
    pub trip_feeds: Vec<FeedEndpoint>,
    pub alert_feeds: Vec<FeedEndpoint>,
    pub fetch_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub max_concurrent_fetches: usize,
    pub vehicle_association: VehicleAssociation,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            trip_feeds: vec![],
            alert_feeds: vec![],
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            vehicle_association: VehicleAssociation::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    url: String,
    key: Option<String>,
    key_env: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    database_url: Option<String>,
    #[serde(default)]
    trip_feeds: Vec<RawEndpoint>,
    #[serde(default)]
    alert_feeds: Vec<RawEndpoint>,
    fetch_timeout_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    max_concurrent_fetches: Option<usize>,
    vehicle_association: Option<VehicleAssociation>,
}

impl IngestConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from named variables:
    /// `DATABASE_URL`, `TRIP_FEED_URLS`, `TRIP_FEED_KEY`, `ALERT_FEED_URLS`,
    /// `ALERT_FEED_KEY`, `FETCH_TIMEOUT_MS`, `POLL_INTERVAL_MS`,
    /// `MAX_CONCURRENT_FETCHES` and `VEHICLE_ASSOCIATION`. URL lists are
    /// comma separated; a category key applies to every URL of that category.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = IngestConfig::default();

        let endpoints = |urls_var: &str, key_var: &str| -> Vec<FeedEndpoint> {
            let key = lookup(key_var).filter(|key| !key.trim().is_empty());
            lookup(urls_var)
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(|url| FeedEndpoint {
                    url: url.to_string(),
                    key: key.clone(),
                })
                .collect()
        };

        IngestConfig {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            trip_feeds: endpoints("TRIP_FEED_URLS", "TRIP_FEED_KEY"),
            alert_feeds: endpoints("ALERT_FEED_URLS", "ALERT_FEED_KEY"),
            fetch_timeout_ms: parse_number(&lookup, "FETCH_TIMEOUT_MS")?
                .unwrap_or(defaults.fetch_timeout_ms),
            poll_interval_ms: parse_number(&lookup, "POLL_INTERVAL_MS")?
                .unwrap_or(defaults.poll_interval_ms),
            max_concurrent_fetches: parse_number(&lookup, "MAX_CONCURRENT_FETCHES")?
                .unwrap_or(defaults.max_concurrent_fetches),
            vehicle_association: match lookup("VEHICLE_ASSOCIATION") {
                Some(value) => value.parse()?,
                None => defaults.vehicle_association,
            },
        }
        .validated()
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json_str(&contents, |name| std::env::var(name).ok())
    }

    /// Endpoint keys come either inline (`key`) or from a named variable
    /// (`key_env`) resolved through `lookup`.
    pub fn from_json_str<F>(contents: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = serde_json::from_str(contents)?;
        let defaults = IngestConfig::default();

        let resolve = |endpoints: Vec<RawEndpoint>| -> Result<Vec<FeedEndpoint>, ConfigError> {
            endpoints
                .into_iter()
                .map(|raw_endpoint| {
                    let key = match (raw_endpoint.key, raw_endpoint.key_env) {
                        (Some(key), _) => Some(key),
                        (None, Some(key_env)) => Some(lookup(&key_env).ok_or_else(|| {
                            ConfigError::MissingKey {
                                url: raw_endpoint.url.clone(),
                                key_env: key_env.clone(),
                            }
                        })?),
                        (None, None) => None,
                    };

                    Ok(FeedEndpoint {
                        url: raw_endpoint.url,
                        key,
                    })
                })
                .collect()
        };

        IngestConfig {
            database_url: raw.database_url.unwrap_or(defaults.database_url),
            trip_feeds: resolve(raw.trip_feeds)?,
            alert_feeds: resolve(raw.alert_feeds)?,
            fetch_timeout_ms: raw.fetch_timeout_ms.unwrap_or(defaults.fetch_timeout_ms),
            poll_interval_ms: raw.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
            max_concurrent_fetches: raw
                .max_concurrent_fetches
                .unwrap_or(defaults.max_concurrent_fetches),
            vehicle_association: raw
                .vehicle_association
                .unwrap_or(defaults.vehicle_association),
        }
        .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                name: "fetch_timeout_ms",
                expected: "greater than zero",
                value: self.fetch_timeout_ms.to_string(),
            });
        }

        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_concurrent_fetches",
                expected: "greater than zero",
                value: self.max_concurrent_fetches.to_string(),
            });
        }

        Ok(self)
    }
}

fn parse_number<F, N>(lookup: &F, name: &'static str) -> Result<Option<N>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    N: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<N>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name,
                expected: "a non-negative integer",
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_env_lists_and_keys() {
        let config = IngestConfig::from_lookup(lookup_from(&[
            (
                "TRIP_FEED_URLS",
                "https://feeds.test/nyct%2Fgtfs-ace, https://feeds.test/nyct%2Fgtfs-bdfm,",
            ),
            ("TRIP_FEED_KEY", "secret"),
            ("ALERT_FEED_URLS", "https://feeds.test/camsys%2Fsubway-alerts"),
            ("FETCH_TIMEOUT_MS", "2500"),
            ("VEHICLE_ASSOCIATION", "trip_id"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.trip_feeds.len(), 2);
        assert_eq!(config.trip_feeds[1].url, "https://feeds.test/nyct%2Fgtfs-bdfm");
        assert_eq!(config.trip_feeds[0].key.as_deref(), Some("secret"));
        assert_eq!(config.alert_feeds.len(), 1);
        assert_eq!(config.alert_feeds[0].key, None);
        assert_eq!(config.fetch_timeout_ms, 2500);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.vehicle_association, VehicleAssociation::TripId);
    }

    #[test]
    fn test_env_rejects_bad_numbers() {
        let result = IngestConfig::from_lookup(lookup_from(&[("FETCH_TIMEOUT_MS", "soon")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                name: "FETCH_TIMEOUT_MS",
                ..
            })
        ));

        let result = IngestConfig::from_lookup(lookup_from(&[("FETCH_TIMEOUT_MS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_json_config_resolves_key_env() {
        let json = r#"{
            "database_url": "sqlite::memory:",
            "trip_feeds": [
                {"url": "https://feeds.test/ace"},
                {"url": "https://feeds.test/bus", "key_env": "BUS_FEED_KEY"}
            ],
            "alert_feeds": [{"url": "https://feeds.test/alerts", "key": "inline"}],
            "max_concurrent_fetches": 2,
            "vehicle_association": "batch_order"
        }"#;

        let config =
            IngestConfig::from_json_str(json, lookup_from(&[("BUS_FEED_KEY", "bus-secret")]))
                .unwrap();

        assert_eq!(config.trip_feeds[0].key, None);
        assert_eq!(config.trip_feeds[1].key.as_deref(), Some("bus-secret"));
        assert_eq!(config.alert_feeds[0].key.as_deref(), Some("inline"));
        assert_eq!(config.max_concurrent_fetches, 2);
        assert_eq!(config.fetch_timeout_ms, DEFAULT_FETCH_TIMEOUT_MS);
    }

    #[test]
    fn test_json_config_missing_key_env_is_an_error() {
        let json = r#"{"trip_feeds": [{"url": "https://feeds.test/bus", "key_env": "BUS_FEED_KEY"}]}"#;

        let result = IngestConfig::from_json_str(json, lookup_from(&[]));

        assert!(matches!(result, Err(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn test_vehicle_association_names() {
        assert_eq!(
            "last_inserted".parse::<VehicleAssociation>().unwrap(),
            VehicleAssociation::LastInserted
        );
        assert_eq!(
            serde_json::from_str::<VehicleAssociation>("\"last_inserted\"").unwrap(),
            VehicleAssociation::LastInserted
        );
        assert!("newest".parse::<VehicleAssociation>().is_err());
    }

    #[test]
    fn test_debug_output_hides_keys() {
        let endpoint = FeedEndpoint::with_key("https://feeds.test/bus", "hunter2");
        let printed = format!("{:?}", endpoint);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("redacted"));
    }
}
