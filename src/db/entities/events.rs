//! System events worth keeping around: startup, failures
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{from_document, to_document};
use crate::db::{FindQuery, RecordStore, StoreError};

/// Directory name in the store
pub const MODEL: &str = "SystemEvent";

/// Severity of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    /// Routine
    Info,
    /// Something failed but we carried on
    Warn,
    /// Something failed
    Error,
}

impl EventLevel {
    /// Lowercase name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Info => "info",
            EventLevel::Warn => "warn",
            EventLevel::Error => "error",
        }
    }
}

impl FromStr for EventLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(EventLevel::Info),
            "warn" | "warning" => Ok(EventLevel::Warn),
            "error" => Ok(EventLevel::Error),
            other => Err(format!("level must be one of: info, warn, error (got {other:?})")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A logged event
pub struct Model {
    /// Assigned by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Assigned by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Severity
    pub level: EventLevel,
    /// Short machine friendly name, eg `server_started`
    pub event_type: String,
    /// Human readable description
    pub message: String,
    /// Anything else
    #[serde(default)]
    pub details: Value,
}

/// Persists an event
pub async fn create<S: RecordStore>(store: &S, record: &Model) -> Result<Model, StoreError> {
    from_document(store.create(MODEL, to_document(record)?).await?)
}

/// Most recent events first, optionally only one level
pub async fn recent<S: RecordStore>(
    store: &S,
    limit: usize,
    level: Option<EventLevel>,
) -> Result<Vec<Model>, StoreError> {
    let mut query = FindQuery::newest_first().with_limit(limit);
    if let Some(level) = level {
        query = query.with_filter("level", level.as_str());
    }
    store
        .find(MODEL, &query)
        .await?
        .into_iter()
        .map(from_document)
        .collect()
}

/// Number of logged events
pub async fn count<S: RecordStore>(store: &S) -> Result<usize, StoreError> {
    Ok(store.find(MODEL, &FindQuery::default()).await?.len())
}
