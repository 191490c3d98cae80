//! Client for an OpenAI style image generation endpoint

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ImageApiConfig;
use crate::error::GeneratorError;
use crate::models::ImageKind;

/// Appends the house style for a kind to the prompt that goes upstream.
pub fn style_prompt(prompt: &str, kind: ImageKind) -> String {
    let style = match kind {
        ImageKind::Icon => {
            "simple flat icon, minimal design, bold clean shapes, centered, plain white background"
        }
        ImageKind::Logo => {
            "professional logo design, vector style, clean and memorable, centered, plain white background"
        }
    };
    format!("{}, {}", prompt.trim(), style)
}

/// Request body for POST /v1/images/generations
#[derive(Serialize, Debug)]
struct ImagesGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    response_format: &'a str,
}

#[derive(Deserialize, Debug)]
struct ImagesGenerateResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    url: Option<String>,
    revised_prompt: Option<String>,
}

/// Maps a failed upstream response to the error the caller sees.
pub fn classify_failure(status: StatusCode, body: &str) -> GeneratorError {
    match status {
        StatusCode::UNAUTHORIZED => GeneratorError::InvalidCredential,
        StatusCode::TOO_MANY_REQUESTS => GeneratorError::RateLimited,
        StatusCode::FORBIDDEN => GeneratorError::Forbidden,
        _ => {
            let detail = upstream_error_message(body)
                .map(|message| format!("{status}: {message}"))
                .unwrap_or_else(|| status.to_string());
            GeneratorError::GenerationFailed(detail)
        }
    }
}

fn upstream_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}

/// Client for the image generation endpoint.
#[derive(Clone, Debug)]
pub struct ImageGenerator {
    client: Client,
    config: ImageApiConfig,
}

impl ImageGenerator {
    /// Builds a generator sharing the given HTTP client
    pub fn new(client: Client, config: ImageApiConfig) -> Self {
        Self { client, config }
    }

    /// Model sent upstream
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Endpoint we talk to
    pub fn endpoint(&self) -> &str {
        &self.config.url
    }

    /// Requests a single image and returns its URL. Nothing is retried.
    pub async fn generate(&self, prompt: &str, kind: ImageKind) -> Result<String, GeneratorError> {
        debug!("Requesting {kind} from {} with model {}", self.config.url, self.config.model);
        let body = ImagesGenerateRequest {
            model: &self.config.model,
            prompt,
            n: 1,
            response_format: "url",
        };

        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GeneratorError::GenerationFailed(format!(
                        "timed out after {}s",
                        self.config.timeout.as_secs()
                    ))
                } else {
                    GeneratorError::GenerationFailed(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Image API returned {status}");
            return Err(classify_failure(status, &text));
        }

        let parsed: ImagesGenerateResponse = response.json().await.map_err(|err| {
            GeneratorError::GenerationFailed(format!("unreadable response: {err}"))
        })?;
        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| GeneratorError::GenerationFailed("no image data returned".to_string()))?;
        if let Some(revised) = first.revised_prompt {
            debug!("Upstream revised the prompt to {revised:?}");
        }
        let raw_url = first
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| GeneratorError::GenerationFailed("response has no image url".to_string()))?;

        let parsed_url = Url::parse(raw_url.trim()).map_err(|err| {
            GeneratorError::GenerationFailed(format!("invalid image url: {err}"))
        })?;
        match parsed_url.scheme() {
            "http" | "https" => Ok(parsed_url.to_string()),
            scheme => Err(GeneratorError::GenerationFailed(format!(
                "unsupported image url scheme: {scheme}"
            ))),
        }
    }
}
