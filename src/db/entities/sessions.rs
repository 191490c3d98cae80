//! Running request counters per caller
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{from_document, to_document};
use crate::db::{Document, FindQuery, RecordStore, StoreError};

/// Directory name in the store
pub const MODEL: &str = "Session";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Aggregate for one caller address and user agent pair
pub struct Model {
    /// Assigned by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Assigned by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Lookup key, see [`session_key`]
    pub session_key: String,
    /// Caller address
    pub client_ip: Option<String>,
    /// Caller user agent
    pub user_agent: Option<String>,
    /// All generation attempts
    pub total_requests: u64,
    /// Attempts that worked
    pub successful_requests: u64,
    /// Attempts that failed
    pub failed_requests: u64,
    /// First attempt
    pub first_seen: String,
    /// Latest attempt
    pub last_seen: String,
}

/// Key a caller's aggregate is stored under
pub fn session_key(client_ip: Option<&str>, user_agent: Option<&str>) -> String {
    format!(
        "{}|{}",
        client_ip.unwrap_or("unknown"),
        user_agent.unwrap_or("unknown")
    )
}

/// Bumps the counters for a caller, creating the aggregate on first sight.
///
/// This is a plain read-modify-write; concurrent attempts from the same
/// caller can lose an increment.
pub async fn record_attempt<S: RecordStore>(
    store: &S,
    client_ip: Option<&str>,
    user_agent: Option<&str>,
    success: bool,
) -> Result<Model, StoreError> {
    let key = session_key(client_ip, user_agent);
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let existing = store
        .find(
            MODEL,
            &FindQuery::default()
                .with_filter("sessionKey", key.clone())
                .with_limit(1),
        )
        .await?
        .into_iter()
        .next()
        .map(from_document::<Model>)
        .transpose()?;

    let Some(mut session) = existing else {
        let fresh = Model {
            id: None,
            created_at: None,
            session_key: key,
            client_ip: client_ip.map(str::to_string),
            user_agent: user_agent.map(str::to_string),
            total_requests: 1,
            successful_requests: u64::from(success),
            failed_requests: u64::from(!success),
            first_seen: now.clone(),
            last_seen: now,
        };
        return from_document(store.create(MODEL, to_document(&fresh)?).await?);
    };

    session.total_requests += 1;
    if success {
        session.successful_requests += 1;
    } else {
        session.failed_requests += 1;
    }
    session.last_seen = now;

    let Some(id) = session.id.clone() else {
        return Err(StoreError::InvalidId(String::new()));
    };
    let mut patch = Document::new();
    patch.insert("totalRequests".to_string(), session.total_requests.into());
    patch.insert(
        "successfulRequests".to_string(),
        session.successful_requests.into(),
    );
    patch.insert("failedRequests".to_string(), session.failed_requests.into());
    patch.insert("lastSeen".to_string(), session.last_seen.clone().into());
    match store.update(MODEL, &id, patch).await? {
        Some(updated) => from_document(updated),
        None => Ok(session),
    }
}

/// Number of known sessions
pub async fn count<S: RecordStore>(store: &S) -> Result<usize, StoreError> {
    Ok(store.find(MODEL, &FindQuery::default()).await?.len())
}
