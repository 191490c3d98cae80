//! Prompt enhancement through a text completion endpoint.
//!
//! Enhancement is best effort: any failure hands back the original prompt.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EnhancementConfig;
use crate::constants::{
    ENHANCE_FAILURE_PHRASES, ENHANCE_MAX_TOKENS, ENHANCE_STOP_SEQUENCES, ENHANCE_TEMPERATURE,
    MIN_ENHANCED_PROMPT_LEN,
};
use crate::models::ImageKind;

const DEFAULT_TEMPLATE: &str = "Rewrite this image idea as a short, vivid description for an image generator. Keep the subject, add concrete visual details.\nIdea: {prompt}\nDescription:";

const KIND_TEMPLATES: &[(&str, &str)] = &[
    (
        "icon",
        "Rewrite this icon idea as a short description for an image generator. Describe one simple, recognizable symbol with bold shapes and a limited color palette that stays readable at small sizes.\nIdea: {prompt}\nDescription:",
    ),
    (
        "logo",
        "Rewrite this logo idea as a short description for an image generator. Describe a clean, memorable mark with balanced composition, professional typography cues and a clear color scheme.\nIdea: {prompt}\nDescription:",
    ),
];

/// Template for a kind, falling back to the generic one.
pub fn template_for(kind: ImageKind) -> &'static str {
    KIND_TEMPLATES
        .iter()
        .find(|(name, _)| *name == kind.as_str())
        .map(|(_, template)| *template)
        .unwrap_or(DEFAULT_TEMPLATE)
}

/// Decides whether a raw completion is good enough to replace `original`.
pub fn accept_completion(original: &str, raw: &str) -> Option<String> {
    let candidate = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string();

    if candidate.chars().count() < MIN_ENHANCED_PROMPT_LEN {
        debug!("Rejecting enhancement: too short ({candidate:?})");
        return None;
    }
    let lowered = candidate.to_lowercase();
    if lowered == original.trim().to_lowercase() {
        debug!("Rejecting enhancement: identical to the input");
        return None;
    }
    if let Some(phrase) = ENHANCE_FAILURE_PHRASES
        .iter()
        .find(|phrase| lowered.contains(*phrase))
    {
        debug!("Rejecting enhancement: contains {phrase:?}");
        return None;
    }
    Some(candidate)
}

#[derive(Serialize, Debug)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    stop: &'a [&'a str],
}

#[derive(Deserialize, Debug)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the text completion endpoint.
#[derive(Clone, Debug)]
pub struct PromptEnhancer {
    client: Client,
    config: EnhancementConfig,
}

impl PromptEnhancer {
    /// Builds an enhancer sharing the given HTTP client
    pub fn new(client: Client, config: EnhancementConfig) -> Self {
        Self { client, config }
    }

    /// True when enhance calls will actually reach the endpoint.
    pub fn is_available(&self) -> bool {
        self.config.is_available()
    }

    /// Model used for completions
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Rewrites `prompt` for `kind`, or returns it unchanged. Never fails.
    pub async fn enhance(&self, prompt: &str, kind: ImageKind) -> String {
        let Some(api_key) = self.config.api_key.as_deref().filter(|_| self.config.enabled) else {
            return prompt.to_string();
        };

        match self.complete(api_key, prompt, kind).await {
            Ok(raw) => match accept_completion(prompt, &raw) {
                Some(enhanced) => {
                    debug!("Enhanced prompt {prompt:?} -> {enhanced:?}");
                    enhanced
                }
                None => prompt.to_string(),
            },
            Err(err) => {
                warn!("Prompt enhancement unavailable, using the original prompt: {err}");
                prompt.to_string()
            }
        }
    }

    async fn complete(
        &self,
        api_key: &str,
        prompt: &str,
        kind: ImageKind,
    ) -> Result<String, String> {
        let filled = template_for(kind).replace("{prompt}", prompt);
        let body = CompletionRequest {
            model: &self.config.model,
            prompt: &filled,
            max_tokens: ENHANCE_MAX_TOKENS,
            temperature: ENHANCE_TEMPERATURE,
            stop: ENHANCE_STOP_SEQUENCES,
        };

        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(api_key)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|err| err.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("completion API returned {status}: {text}"));
        }

        let parsed: CompletionResponse = response.json().await.map_err(|err| err.to_string())?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.text)
            .ok_or_else(|| "completion API returned no choices".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn disabled_config() -> EnhancementConfig {
        EnhancementConfig {
            enabled: false,
            api_key: Some("key".to_string()),
            url: "http://127.0.0.1:9/v1/completions".to_string(),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn each_kind_has_a_template_with_placeholder() {
        for kind in ImageKind::ALL {
            assert!(template_for(kind).contains("{prompt}"));
        }
        assert_ne!(template_for(ImageKind::Icon), template_for(ImageKind::Logo));
    }

    #[test]
    fn gate_rejects_short_results() {
        assert_eq!(accept_completion("a cat", "cat"), None);
        assert_eq!(accept_completion("a cat", "   "), None);
    }

    #[test]
    fn gate_rejects_echo_of_the_input() {
        assert_eq!(
            accept_completion("Blue Circle Icon", "blue circle icon"),
            None
        );
        assert_eq!(
            accept_completion("Blue Circle Icon", "\"BLUE CIRCLE ICON\""),
            None
        );
    }

    #[test]
    fn gate_rejects_failure_phrases() {
        assert_eq!(
            accept_completion("a cat", "I'm sorry, but I can't help with that request"),
            None
        );
        assert_eq!(
            accept_completion("a cat", "Enhanced prompt: a fluffy orange cat"),
            None
        );
    }

    #[test]
    fn gate_accepts_and_trims_good_results() {
        assert_eq!(
            accept_completion("a cat", "  \"A fluffy orange cat, flat vector style\"\n"),
            Some("A fluffy orange cat, flat vector style".to_string())
        );
    }

    #[tokio::test]
    async fn disabled_enhancer_returns_prompt_unchanged() {
        let enhancer = PromptEnhancer::new(Client::new(), disabled_config());
        assert!(!enhancer.is_available());
        for prompt in ["blue circle icon", "", "Modern Tech! Co."] {
            assert_eq!(enhancer.enhance(prompt, ImageKind::Icon).await, prompt);
        }
    }

    #[tokio::test]
    async fn missing_key_returns_prompt_unchanged() {
        let mut config = disabled_config();
        config.enabled = true;
        config.api_key = None;
        let enhancer = PromptEnhancer::new(Client::new(), config);
        assert_eq!(enhancer.enhance("a cat", ImageKind::Logo).await, "a cat");
    }

    #[tokio::test]
    async fn unreachable_endpoint_falls_back() {
        let mut config = disabled_config();
        config.enabled = true;
        let enhancer = PromptEnhancer::new(Client::new(), config);
        assert_eq!(enhancer.enhance("a cat", ImageKind::Logo).await, "a cat");
    }
}
