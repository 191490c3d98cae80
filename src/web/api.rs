//! JSON endpoints under `/api`

use axum::extract::rejection::{JsonRejection, QueryRejection};

use super::prelude::*;
use crate::db::audit::AuditLog;
use crate::db::entities::events::EventLevel;
use crate::models::{GenerationRequest, GenerationResult, GenerationTimings};

/// Body of `POST /api/generate`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateBody {
    prompt: Option<String>,
    image_type: Option<String>,
    #[serde(default)]
    enhance_prompt: bool,
}

impl GenerateBody {
    fn validate(self) -> Result<GenerationRequest, GeneratorError> {
        let prompt = self
            .prompt
            .map(|prompt| prompt.trim().to_string())
            .filter(|prompt| !prompt.is_empty())
            .ok_or_else(|| GeneratorError::BadRequest("prompt is required".to_string()))?;
        let kind = self
            .image_type
            .ok_or_else(|| {
                GeneratorError::BadRequest("imageType must be one of: icon, logo".to_string())
            })?
            .parse::<ImageKind>()
            .map_err(GeneratorError::BadRequest)?;
        Ok(GenerationRequest {
            prompt,
            kind,
            enhance: self.enhance_prompt,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    success: bool,
    #[serde(flatten)]
    result: GenerationResult,
    timings: GenerationTimings,
}

/// Runs one generation. The outcome rides along in the response extensions
/// for the request observer.
///
/// The pipeline runs in its own task, so a client hanging up doesn't cut the
/// attempt short.
pub(crate) async fn generate_handler(
    State(state): State<AppState>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Response, GeneratorError> {
    let Json(body) = body.map_err(|rejection| GeneratorError::BadRequest(rejection.body_text()))?;
    let request = body.validate()?;
    info!("Generating {} for {:?}", request.kind, request.prompt);

    let generator = Arc::clone(&state.generator);
    let report = tokio::spawn(async move { generator.generate(request).await })
        .await
        .map_err(|err| {
            GeneratorError::InternalServerError(format!("generation task failed: {err}"))
        })?;
    let outcome = state.generator.outcome(&report);
    let timings = report.timings;

    let mut response = match report.outcome {
        Ok(result) => Json(GenerateResponse {
            success: true,
            result,
            timings,
        })
        .into_response(),
        Err(err) => err.into_response(),
    };
    response.extensions_mut().insert(outcome);
    Ok(response)
}

/// Liveness plus the non-secret parts of the config.
pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let directories = state.artifacts.directory_status().await;
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "uptimeSecs": state.started.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "imageModel": state.generator.images().model(),
        "promptEnhancement": state.generator.enhancer().is_available(),
        "databaseLogging": state.audit.is_some(),
        "directories": directories,
    }))
}

/// Processed artifacts on disk, newest first.
pub(crate) async fn images_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GeneratorError> {
    let images = state.artifacts.list_artifacts().await?;
    Ok(Json(json!({
        "success": true,
        "count": images.len(),
        "images": images,
    })))
}

/// What the frontend needs to know to build a request.
pub(crate) async fn config_handler(State(state): State<AppState>) -> impl IntoResponse {
    let output = &state.config.output;
    Json(json!({
        "success": true,
        "supportedTypes": ImageKind::ALL,
        "sizes": {
            "icon": output.icon_size,
            "logo": output.logo_size,
        },
        "promptEnhancement": state.generator.enhancer().is_available(),
        "databaseLogging": state.audit.is_some(),
        "maxDownloadBytes": output.max_download_bytes,
    }))
}

fn require_audit(state: &AppState) -> Result<Arc<AuditLog>, GeneratorError> {
    state.audit.clone().ok_or(GeneratorError::LoggingDisabled)
}

/// `?limit=` for the listings
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    limit: Option<usize>,
    level: Option<String>,
}

impl ListParams {
    fn from_query(query: Result<Query<Self>, QueryRejection>) -> Result<Self, GeneratorError> {
        query
            .map(|Query(params)| params)
            .map_err(|rejection| GeneratorError::BadRequest(rejection.body_text()))
    }

    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }
}

/// Record store totals.
pub(crate) async fn stats_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GeneratorError> {
    let audit = require_audit(&state)?;
    let stats = audit.stats().await;
    Ok(Json(json!({
        "success": true,
        "stats": stats,
        "cachedRecords": audit.store().cached_records(),
    })))
}

/// Most recent generation attempts.
pub(crate) async fn transactions_handler(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, GeneratorError> {
    let params = ListParams::from_query(query)?;
    let audit = require_audit(&state)?;
    let transactions = audit.recent_transactions(params.limit()).await;
    Ok(Json(json!({
        "success": true,
        "count": transactions.len(),
        "transactions": transactions,
    })))
}

/// Most recent system events, optionally filtered by level.
pub(crate) async fn events_handler(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, GeneratorError> {
    let params = ListParams::from_query(query)?;
    let audit = require_audit(&state)?;
    let level = params
        .level
        .as_deref()
        .map(str::parse::<EventLevel>)
        .transpose()
        .map_err(GeneratorError::BadRequest)?;
    debug!("Listing events, level {:?}", level);
    let events = audit.recent_events(params.limit(), level).await;
    Ok(Json(json!({
        "success": true,
        "count": events.len(),
        "events": events,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(prompt: Option<&str>, image_type: Option<&str>) -> GenerateBody {
        GenerateBody {
            prompt: prompt.map(str::to_string),
            image_type: image_type.map(str::to_string),
            enhance_prompt: false,
        }
    }

    #[test]
    fn validation_trims_prompt() {
        let request = body(Some("  blue circle icon \n"), Some("Icon"))
            .validate()
            .expect("valid");
        assert_eq!(request.prompt, "blue circle icon");
        assert_eq!(request.kind, ImageKind::Icon);
        assert!(!request.enhance);
    }

    #[test]
    fn validation_rejects_blank_prompt_and_unknown_kind() {
        assert!(matches!(
            body(Some("   "), Some("icon")).validate(),
            Err(GeneratorError::BadRequest(_))
        ));
        assert!(matches!(
            body(None, Some("icon")).validate(),
            Err(GeneratorError::BadRequest(_))
        ));
        assert!(matches!(
            body(Some("cat"), Some("banner")).validate(),
            Err(GeneratorError::BadRequest(_))
        ));
        assert!(matches!(
            body(Some("cat"), None).validate(),
            Err(GeneratorError::BadRequest(_))
        ));
    }

    #[test]
    fn enhance_flag_defaults_to_false() {
        let parsed: GenerateBody =
            serde_json::from_str(r#"{"prompt":"cat","imageType":"logo"}"#).expect("parse");
        assert!(!parsed.enhance_prompt);
        let parsed: GenerateBody = serde_json::from_str(
            r#"{"prompt":"cat","imageType":"logo","enhancePrompt":true}"#,
        )
        .expect("parse");
        assert!(parsed.validate().expect("valid").enhance);
    }

    #[test]
    fn list_limit_is_clamped() {
        assert_eq!(ListParams::default().limit(), DEFAULT_LIST_LIMIT);
        let params = ListParams {
            limit: Some(10_000),
            level: None,
        };
        assert_eq!(params.limit(), MAX_LIST_LIMIT);
        let params = ListParams {
            limit: Some(0),
            level: None,
        };
        assert_eq!(params.limit(), 1);
    }
}
