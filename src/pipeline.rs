//! Download, resize and persist a generated image

use std::io::Cursor;

use chrono::Utc;
use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat};
use reqwest::Client;
use tracing::{debug, info};

use crate::config::OutputConfig;
use crate::error::GeneratorError;
use crate::models::{ArtifactRef, Dimensions, ImageKind};
use crate::storage::{ArtifactStore, artifact_filename, original_url, processed_url};

/// Both artifacts written for one generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedArtifacts {
    /// Resized PNG
    pub processed: ArtifactRef,
    /// Bytes exactly as downloaded
    pub original: ArtifactRef,
    /// Dimensions of the processed image
    pub dimensions: Dimensions,
}

/// Resizes raw image bytes for a kind and re-encodes them as PNG.
///
/// Icons are cropped to fill an exact square, logos are scaled to fit the
/// bounding box keeping their aspect ratio (and may be enlarged).
pub fn resize_for_kind(bytes: &[u8], kind: ImageKind, size: u32) -> Result<Vec<u8>, GeneratorError> {
    let source = image::load_from_memory(bytes)?;
    let resized = match kind {
        ImageKind::Icon => source.resize_to_fill(size, size, FilterType::Lanczos3),
        ImageKind::Logo => source.resize(size, size, FilterType::Lanczos3),
    };
    let mut output = Vec::new();
    resized.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}

/// Reads dimensions back out of encoded bytes.
pub fn read_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    image::load_from_memory(bytes)
        .ok()
        .map(|decoded| decoded.dimensions())
        .map(|(width, height)| Dimensions { width, height })
}

/// Turns a remote image URL into stored artifacts.
#[derive(Clone, Debug)]
pub struct ImageProcessor {
    client: Client,
    output: OutputConfig,
    store: ArtifactStore,
}

impl ImageProcessor {
    /// Processor writing into `store`
    pub fn new(client: Client, output: OutputConfig, store: ArtifactStore) -> Self {
        Self {
            client,
            output,
            store,
        }
    }

    /// Downloads `url`, keeps the raw bytes, writes the resized version and
    /// describes both. Any step failing aborts the whole thing.
    pub async fn process(
        &self,
        url: &str,
        kind: ImageKind,
        original_prompt: &str,
    ) -> Result<ProcessedArtifacts, GeneratorError> {
        let raw = self.download(url).await?;

        let timestamp = Utc::now().timestamp_millis();
        let original_name = artifact_filename(original_prompt, kind, timestamp, true);
        let processed_name = artifact_filename(original_prompt, kind, timestamp, false);

        let original_path = self.store.original_path(&original_name);
        self.store.persist(&original_path, &raw).await?;

        let original_size = raw.len() as u64;
        let (processed, original_dimensions, dimensions) =
            match self.resize_and_store(raw, kind, &processed_name).await {
                Ok(resized) => resized,
                Err(err) => {
                    self.store.discard(&original_path).await;
                    return Err(err);
                }
            };

        info!(
            "Stored {} ({}x{}, {} bytes)",
            processed_name,
            dimensions.width,
            dimensions.height,
            processed.len()
        );

        Ok(ProcessedArtifacts {
            processed: ArtifactRef {
                url: processed_url(&processed_name),
                filename: processed_name,
                size: processed.len() as u64,
                dimensions: Some(dimensions),
            },
            original: ArtifactRef {
                url: original_url(&original_name),
                filename: original_name,
                size: original_size,
                dimensions: original_dimensions,
            },
            dimensions,
        })
    }

    /// Resizes off the async runtime and writes the processed PNG.
    async fn resize_and_store(
        &self,
        raw: Vec<u8>,
        kind: ImageKind,
        processed_name: &str,
    ) -> Result<(Vec<u8>, Option<Dimensions>, Dimensions), GeneratorError> {
        let target = self.output.target_size(kind);
        let (processed, original_dimensions, dimensions) =
            tokio::task::spawn_blocking(move || {
                let processed = resize_for_kind(&raw, kind, target)?;
                let original_dimensions = read_dimensions(&raw);
                let dimensions = read_dimensions(&processed).unwrap_or(Dimensions {
                    width: target,
                    height: target,
                });
                Ok::<_, GeneratorError>((processed, original_dimensions, dimensions))
            })
            .await
            .map_err(|err| GeneratorError::ProcessingFailed(err.to_string()))??;

        self.store
            .persist(&self.store.processed_path(processed_name), &processed)
            .await?;
        Ok((processed, original_dimensions, dimensions))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, GeneratorError> {
        let limit = self.output.max_download_bytes;
        debug!("Downloading generated image from {url}");
        let mut response = self
            .client
            .get(url)
            .timeout(self.output.download_timeout)
            .send()
            .await
            .map_err(|err| GeneratorError::DownloadFailed(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeneratorError::DownloadFailed(format!("HTTP {status}")));
        }
        if response
            .content_length()
            .is_some_and(|length| length > limit)
        {
            return Err(GeneratorError::DownloadTooLarge(limit));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| GeneratorError::DownloadFailed(err.to_string()))?
        {
            if (bytes.len() + chunk.len()) as u64 > limit {
                return Err(GeneratorError::DownloadTooLarge(limit));
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(GeneratorError::DownloadFailed("empty response body".to_string()));
        }
        Ok(bytes)
    }
}
