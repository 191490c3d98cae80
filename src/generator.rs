//! Runs one generation: enhance, generate, process

use std::time::Instant;

use chrono::Utc;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::enhance::PromptEnhancer;
use crate::error::GeneratorError;
use crate::imagegen::{ImageGenerator, style_prompt};
use crate::models::{GenerationRequest, GenerationResult, GenerationTimings};
use crate::pipeline::ImageProcessor;
use crate::storage::ArtifactStore;

/// What happened during one attempt, whether or not it worked.
#[derive(Debug)]
pub struct GenerationReport {
    /// The validated request
    pub request: GenerationRequest,
    /// Rewritten prompt, only when it differs from the original
    pub enhanced_prompt: Option<String>,
    /// Styled prompt, once we got that far
    pub final_prompt: Option<String>,
    /// URL the upstream API handed back, once we got that far
    pub remote_url: Option<String>,
    /// Phase durations
    pub timings: GenerationTimings,
    /// The result or the error that stopped the attempt
    pub outcome: Result<GenerationResult, GeneratorError>,
}

/// Cloneable summary of an attempt, attached to the response so the request
/// observer can persist it after the response is built.
#[derive(Clone, Debug)]
pub struct GenerationOutcome {
    /// The validated request
    pub request: GenerationRequest,
    /// Rewritten prompt, if any
    pub enhanced_prompt: Option<String>,
    /// Styled prompt
    pub final_prompt: Option<String>,
    /// URL returned by the image API
    pub remote_url: Option<String>,
    /// Phase durations
    pub timings: GenerationTimings,
    /// Present on success
    pub result: Option<GenerationResult>,
    /// Present on failure
    pub error: Option<String>,
    /// Image model used
    pub image_model: String,
    /// Image endpoint used
    pub image_endpoint: String,
    /// Text model, when enhancement actually ran
    pub text_model: Option<String>,
}

impl GenerationOutcome {
    /// Whether the attempt produced artifacts
    pub fn success(&self) -> bool {
        self.result.is_some()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Everything needed to turn a request into artifacts.
#[derive(Clone, Debug)]
pub struct Generator {
    enhancer: PromptEnhancer,
    images: ImageGenerator,
    processor: ImageProcessor,
}

impl Generator {
    /// Wires the clients from the config, sharing one HTTP client.
    pub fn new(config: &AppConfig, store: ArtifactStore) -> Result<Self, GeneratorError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| GeneratorError::InternalServerError(err.to_string()))?;
        Ok(Self {
            enhancer: PromptEnhancer::new(client.clone(), config.enhancement.clone()),
            images: ImageGenerator::new(client.clone(), config.image_api.clone()),
            processor: ImageProcessor::new(client, config.output.clone(), store),
        })
    }

    /// Prompt enhancement client
    pub fn enhancer(&self) -> &PromptEnhancer {
        &self.enhancer
    }

    /// Image generation client
    pub fn images(&self) -> &ImageGenerator {
        &self.images
    }

    /// Summarizes a report for the record store.
    pub fn outcome(&self, report: &GenerationReport) -> GenerationOutcome {
        let (result, error) = match &report.outcome {
            Ok(result) => (Some(result.clone()), None),
            Err(err) => (None, Some(err.to_string())),
        };
        let enhancement_ran = report.request.enhance && self.enhancer.is_available();
        GenerationOutcome {
            request: report.request.clone(),
            enhanced_prompt: report.enhanced_prompt.clone(),
            final_prompt: report.final_prompt.clone(),
            remote_url: report.remote_url.clone(),
            timings: report.timings,
            result,
            error,
            image_model: self.images.model().to_string(),
            image_endpoint: self.images.endpoint().to_string(),
            text_model: enhancement_ran.then(|| self.enhancer.model().to_string()),
        }
    }

    /// Runs the whole pipeline. Enhancement problems never fail the attempt,
    /// anything after it does.
    pub async fn generate(&self, request: GenerationRequest) -> GenerationReport {
        let started = Instant::now();
        let mut timings = GenerationTimings::default();

        let base_prompt = if request.enhance {
            let phase = Instant::now();
            let enhanced = self.enhancer.enhance(&request.prompt, request.kind).await;
            timings.enhancement_ms = elapsed_ms(phase);
            enhanced
        } else {
            request.prompt.clone()
        };
        let enhanced_prompt = (base_prompt != request.prompt).then(|| base_prompt.clone());
        let final_prompt = style_prompt(&base_prompt, request.kind);

        let mut report = GenerationReport {
            request,
            enhanced_prompt,
            final_prompt: Some(final_prompt.clone()),
            remote_url: None,
            timings,
            outcome: Err(GeneratorError::InternalServerError(
                "generation did not run".to_string(),
            )),
        };

        let phase = Instant::now();
        let generated = self.images.generate(&final_prompt, report.request.kind).await;
        report.timings.generation_ms = elapsed_ms(phase);
        let remote_url = match generated {
            Ok(url) => url,
            Err(err) => {
                warn!("Image generation failed for {:?}: {}", report.request.prompt, err);
                report.timings.total_ms = elapsed_ms(started);
                report.outcome = Err(err);
                return report;
            }
        };
        report.remote_url = Some(remote_url.clone());

        let phase = Instant::now();
        let processed = self
            .processor
            .process(&remote_url, report.request.kind, &report.request.prompt)
            .await;
        report.timings.processing_ms = elapsed_ms(phase);
        report.timings.total_ms = elapsed_ms(started);

        report.outcome = processed.map(|artifacts| {
            info!(
                "Generated {} for {:?} in {}ms",
                report.request.kind, report.request.prompt, report.timings.total_ms
            );
            GenerationResult {
                image_type: report.request.kind,
                image: artifacts.processed,
                original: artifacts.original,
                dimensions: artifacts.dimensions,
                original_prompt: report.request.prompt.clone(),
                enhanced_prompt: report.enhanced_prompt.clone(),
                final_prompt,
                generated_at: Utc::now(),
            }
        });
        if let Err(err) = &report.outcome {
            warn!("Image processing failed for {:?}: {}", report.request.prompt, err);
        }
        report
    }
}
