//! One record per HTTP call
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{from_document, to_document};
use crate::db::{FindQuery, RecordStore, StoreError};

/// Directory name in the store
pub const MODEL: &str = "ApiRequest";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A sanitized request/response pair
pub struct Model {
    /// Assigned by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Assigned by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Raw query string
    pub query: Option<String>,
    /// Response status
    pub status: u16,
    /// Time to build the response
    pub duration_ms: u64,
    /// Caller address
    pub client_ip: Option<String>,
    /// Caller user agent
    pub user_agent: Option<String>,
    /// Request headers minus anything secret
    pub request_headers: BTreeMap<String, String>,
    /// JSON request body with secrets redacted
    pub request_body: Option<Value>,
    /// JSON response body with secrets redacted
    pub response_body: Option<Value>,
}

/// Persists an API request log entry
pub async fn create<S: RecordStore>(store: &S, record: &Model) -> Result<Model, StoreError> {
    from_document(store.create(MODEL, to_document(record)?).await?)
}

/// Number of logged requests
pub async fn count<S: RecordStore>(store: &S) -> Result<usize, StoreError> {
    Ok(store.find(MODEL, &FindQuery::default()).await?.len())
}
