use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a failed feed, used in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    Decode,
    ConstraintViolation,
    Persistence,
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("fetching {url} returned HTTP status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("fetching {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("payload from {url} is not a GTFS-realtime feed: {source}")]
    Decode {
        url: String,
        #[source]
        source: prost::DecodeError,
    },
    #[error("constraint violation while writing batch: {0}")]
    ConstraintViolation(#[source] sqlx::Error),
    #[error("storage failure: {0}")]
    Persistence(#[source] sqlx::Error),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::HttpStatus { .. } | IngestError::Transport { .. } => ErrorKind::Fetch,
            IngestError::Decode { .. } => ErrorKind::Decode,
            IngestError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            IngestError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

// SQLITE_CONSTRAINT, the primary result code shared by every constraint failure
const SQLITE_CONSTRAINT: i32 = 19;

pub fn is_constraint_violation(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };

    match db_err.kind() {
        sqlx::error::ErrorKind::UniqueViolation
        | sqlx::error::ErrorKind::ForeignKeyViolation
        | sqlx::error::ErrorKind::NotNullViolation
        | sqlx::error::ErrorKind::CheckViolation => true,
        _ => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| code & 0xff == SQLITE_CONSTRAINT),
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        if is_constraint_violation(&err) {
            IngestError::ConstraintViolation(err)
        } else {
            IngestError::Persistence(err)
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{name} must be {expected}, got {value:?}")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("feed endpoint {url} names key variable {key_env}, which is not set")]
    MissingKey { url: String, key_env: String },
}
