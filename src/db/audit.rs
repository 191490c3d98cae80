//! Applies the logging toggles on top of a record store.
//!
//! Nothing in here ever fails the caller: persistence errors are logged and
//! dropped.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::entities::events::{self, EventLevel};
use super::entities::transactions::{self, TransactionCounts};
use super::entities::{api_requests, sessions};
use super::{JsonFileStore, RecordStore};
use crate::config::LoggingToggles;
use crate::generator::GenerationOutcome;

/// Who made a request, as far as we can tell
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Peer or forwarded address
    pub ip: Option<String>,
    /// User-Agent header
    pub user_agent: Option<String>,
}

/// Totals for `/api/stats`
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Generation attempts by outcome
    pub transactions: TransactionCounts,
    /// Successful share of all attempts, 0 when there are none
    pub success_rate: f64,
    /// Distinct callers
    pub sessions: usize,
    /// Logged HTTP calls
    pub api_requests: usize,
    /// Logged system events
    pub events: usize,
}

/// Toggle-aware writer and reader for the audit records.
#[derive(Debug)]
pub struct AuditLog<S: RecordStore = JsonFileStore> {
    store: S,
    toggles: LoggingToggles,
}

impl<S: RecordStore> AuditLog<S> {
    /// Wraps a store
    pub fn new(store: S, toggles: LoggingToggles) -> Self {
        Self { store, toggles }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active switches
    pub fn toggles(&self) -> LoggingToggles {
        self.toggles
    }

    /// Persists the session aggregate and then the transaction for one attempt.
    pub async fn record_generation(&self, outcome: &GenerationOutcome, client: &ClientInfo) {
        if !self.toggles.transactions {
            return;
        }
        let session_id = match sessions::record_attempt(
            &self.store,
            client.ip.as_deref(),
            client.user_agent.as_deref(),
            outcome.success(),
        )
        .await
        {
            Ok(session) => session.id,
            Err(err) => {
                warn!("Failed to update session aggregate: {err}");
                None
            }
        };

        let record = transactions::Model::from_outcome(
            outcome,
            client.ip.clone(),
            client.user_agent.clone(),
            session_id,
        );
        match transactions::create(&self.store, &record).await {
            Ok(stored) => debug!("Recorded transaction {:?}", stored.id),
            Err(err) => warn!("Failed to record transaction: {err}"),
        }
    }

    /// Persists one sanitized HTTP call.
    pub async fn record_api_request(&self, record: &api_requests::Model) {
        if !self.toggles.api_requests {
            return;
        }
        if let Err(err) = api_requests::create(&self.store, record).await {
            warn!("Failed to record API request {} {}: {err}", record.method, record.path);
        }
    }

    /// Persists a system event.
    pub async fn record_event(
        &self,
        level: EventLevel,
        event_type: &str,
        message: &str,
        details: Value,
    ) {
        if !self.toggles.system_events {
            return;
        }
        let record = events::Model {
            id: None,
            created_at: None,
            level,
            event_type: event_type.to_string(),
            message: message.to_string(),
            details,
        };
        if let Err(err) = events::create(&self.store, &record).await {
            warn!("Failed to record {event_type} event: {err}");
        }
    }

    /// Counts across every model. Read failures count as zero.
    pub async fn stats(&self) -> StoreStats {
        let transactions = transactions::counts(&self.store)
            .await
            .unwrap_or_else(|err| {
                warn!("Failed to count transactions: {err}");
                TransactionCounts::default()
            });
        let success_rate = if transactions.total == 0 {
            0.0
        } else {
            transactions.successful as f64 / transactions.total as f64
        };
        StoreStats {
            transactions,
            success_rate,
            sessions: self.count_or_zero("sessions", sessions::count(&self.store).await),
            api_requests: self
                .count_or_zero("API requests", api_requests::count(&self.store).await),
            events: self.count_or_zero("events", events::count(&self.store).await),
        }
    }

    fn count_or_zero(&self, what: &str, counted: Result<usize, super::StoreError>) -> usize {
        counted.unwrap_or_else(|err| {
            warn!("Failed to count {what}: {err}");
            0
        })
    }

    /// Newest transactions, empty on read failure.
    pub async fn recent_transactions(&self, limit: usize) -> Vec<transactions::Model> {
        transactions::recent(&self.store, limit)
            .await
            .unwrap_or_else(|err| {
                warn!("Failed to list transactions: {err}");
                Vec::new()
            })
    }

    /// Newest events, optionally of one level, empty on read failure.
    pub async fn recent_events(&self, limit: usize, level: Option<EventLevel>) -> Vec<events::Model> {
        events::recent(&self.store, limit, level)
            .await
            .unwrap_or_else(|err| {
                warn!("Failed to list events: {err}");
                Vec::new()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationRequest, GenerationTimings, ImageKind};

    fn toggles(enabled: bool) -> LoggingToggles {
        LoggingToggles {
            enabled,
            transactions: enabled,
            api_requests: enabled,
            system_events: enabled,
        }
    }

    fn failed_outcome() -> GenerationOutcome {
        GenerationOutcome {
            request: GenerationRequest {
                prompt: "red square".to_string(),
                kind: ImageKind::Icon,
                enhance: false,
            },
            enhanced_prompt: None,
            final_prompt: Some("red square, flat icon".to_string()),
            remote_url: None,
            timings: GenerationTimings::default(),
            result: None,
            error: Some("Rate limit exceeded".to_string()),
            image_model: "dall-e-3".to_string(),
            image_endpoint: "http://localhost/images".to_string(),
            text_model: None,
        }
    }

    fn client() -> ClientInfo {
        ClientInfo {
            ip: Some("10.0.0.1".to_string()),
            user_agent: Some("tests".to_string()),
        }
    }

    #[tokio::test]
    async fn generation_creates_transaction_and_session() {
        let root = tempfile::tempdir().expect("tempdir");
        let audit = AuditLog::new(JsonFileStore::new(root.path(), 10), toggles(true));

        audit.record_generation(&failed_outcome(), &client()).await;
        audit.record_generation(&failed_outcome(), &client()).await;

        let stats = audit.stats().await;
        assert_eq!(stats.transactions.total, 2);
        assert_eq!(stats.transactions.failed, 2);
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.success_rate, 0.0);

        let recent = audit.recent_transactions(10).await;
        assert_eq!(recent.len(), 2);
        assert!(!recent[0].success);
        assert_eq!(recent[0].client_ip.as_deref(), Some("10.0.0.1"));
        assert!(recent[0].session_id.is_some());
    }

    #[tokio::test]
    async fn disabled_toggles_write_nothing() {
        let root = tempfile::tempdir().expect("tempdir");
        let audit = AuditLog::new(JsonFileStore::new(root.path(), 10), toggles(false));

        audit.record_generation(&failed_outcome(), &client()).await;
        audit
            .record_event(EventLevel::Info, "server_started", "up", Value::Null)
            .await;

        assert_eq!(audit.stats().await, StoreStats::default());
        assert!(std::fs::read_dir(root.path()).expect("read_dir").next().is_none());
    }

    #[tokio::test]
    async fn events_filter_by_level() {
        let root = tempfile::tempdir().expect("tempdir");
        let audit = AuditLog::new(JsonFileStore::new(root.path(), 10), toggles(true));
        audit
            .record_event(EventLevel::Info, "server_started", "up", Value::Null)
            .await;
        audit
            .record_event(EventLevel::Error, "boom", "down", Value::Null)
            .await;

        let errors = audit.recent_events(10, Some(EventLevel::Error)).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].event_type, "boom");
        assert_eq!(audit.recent_events(10, None).await.len(), 2);
        assert_eq!(audit.recent_events(1, None).await.len(), 1);
    }
}
