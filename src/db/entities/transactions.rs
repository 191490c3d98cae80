//! One record per generation attempt
use serde::{Deserialize, Serialize};

use super::{from_document, to_document};
use crate::db::{FindQuery, RecordStore, StoreError};
use crate::generator::GenerationOutcome;
use crate::models::{ArtifactRef, Dimensions, GenerationTimings, ImageKind};

/// Directory name in the store
pub const MODEL: &str = "Transaction";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A generation attempt, successful or not
pub struct Model {
    /// Assigned by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Assigned by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Session aggregate this attempt was counted against
    pub session_id: Option<String>,
    /// Caller address
    pub client_ip: Option<String>,
    /// Caller user agent
    pub user_agent: Option<String>,
    /// Requested kind
    pub image_type: ImageKind,
    /// Prompt as submitted
    pub original_prompt: String,
    /// Rewritten prompt
    pub enhanced_prompt: Option<String>,
    /// Styled prompt sent upstream
    pub final_prompt: Option<String>,
    /// Whether the caller asked for enhancement
    pub enhancement_requested: bool,
    /// URL returned by the image API
    pub remote_url: Option<String>,
    /// Processed artifact
    pub image: Option<ArtifactRef>,
    /// Original artifact
    pub original: Option<ArtifactRef>,
    /// Processed dimensions
    pub dimensions: Option<Dimensions>,
    /// Phase durations
    pub timings: GenerationTimings,
    /// Did it work
    pub success: bool,
    /// Why it didn't
    pub error_message: Option<String>,
    /// Image model
    pub image_model: String,
    /// Image endpoint
    pub image_endpoint: String,
    /// Text model, when enhancement ran
    pub text_model: Option<String>,
}

impl Model {
    /// Builds a record from an attempt and the caller's details.
    pub fn from_outcome(
        outcome: &GenerationOutcome,
        client_ip: Option<String>,
        user_agent: Option<String>,
        session_id: Option<String>,
    ) -> Self {
        let result = outcome.result.as_ref();
        Self {
            id: None,
            created_at: None,
            session_id,
            client_ip,
            user_agent,
            image_type: outcome.request.kind,
            original_prompt: outcome.request.prompt.clone(),
            enhanced_prompt: outcome.enhanced_prompt.clone(),
            final_prompt: outcome.final_prompt.clone(),
            enhancement_requested: outcome.request.enhance,
            remote_url: outcome.remote_url.clone(),
            image: result.map(|result| result.image.clone()),
            original: result.map(|result| result.original.clone()),
            dimensions: result.map(|result| result.dimensions),
            timings: outcome.timings,
            success: outcome.success(),
            error_message: outcome.error.clone(),
            image_model: outcome.image_model.clone(),
            image_endpoint: outcome.image_endpoint.clone(),
            text_model: outcome.text_model.clone(),
        }
    }
}

/// Success and failure totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TransactionCounts {
    /// All attempts
    pub total: usize,
    /// Attempts that produced artifacts
    pub successful: usize,
    /// Attempts that didn't
    pub failed: usize,
}

/// Persists a transaction
pub async fn create<S: RecordStore>(store: &S, record: &Model) -> Result<Model, StoreError> {
    let stored = store.create(MODEL, to_document(record)?).await?;
    from_document(stored)
}

/// Most recent transactions first
pub async fn recent<S: RecordStore>(store: &S, limit: usize) -> Result<Vec<Model>, StoreError> {
    store
        .find(MODEL, &FindQuery::newest_first().with_limit(limit))
        .await?
        .into_iter()
        .map(from_document)
        .collect()
}

/// Counts every transaction by outcome
pub async fn counts<S: RecordStore>(store: &S) -> Result<TransactionCounts, StoreError> {
    let all = store.find(MODEL, &FindQuery::default()).await?;
    let successful = all
        .iter()
        .filter(|record| record.get("success").and_then(|value| value.as_bool()) == Some(true))
        .count();
    Ok(TransactionCounts {
        total: all.len(),
        successful,
        failed: all.len() - successful,
    })
}
