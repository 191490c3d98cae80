//! Request and result types shared by the pipeline, the web layer and the record store

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two kinds of artifact we know how to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Small square, crop to fill
    Icon,
    /// Larger bounding box, aspect ratio preserved
    Logo,
}

impl ImageKind {
    /// Every supported kind, in display order
    pub const ALL: [ImageKind; 2] = [ImageKind::Icon, ImageKind::Logo];

    /// Lowercase name used on the wire and in filenames
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Icon => "icon",
            ImageKind::Logo => "logo",
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "icon" => Ok(ImageKind::Icon),
            "logo" => Ok(ImageKind::Logo),
            other => Err(format!(
                "imageType must be one of: icon, logo (got {other:?})"
            )),
        }
    }
}

/// A validated generation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    /// What the caller asked for, trimmed and non-empty
    pub prompt: String,
    /// Which artifact to produce
    pub kind: ImageKind,
    /// Whether to try enhancing the prompt first
    pub enhance: bool,
}

/// Pixel dimensions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Reference to a stored artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    /// File name on disk
    pub filename: String,
    /// Public relative URL path
    pub url: String,
    /// Size in bytes
    pub size: u64,
    /// Pixel dimensions, if known
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dimensions: Option<Dimensions>,
}

/// Everything a successful generation produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// Kind of artifact
    pub image_type: ImageKind,
    /// Processed artifact
    pub image: ArtifactRef,
    /// Raw downloaded artifact
    pub original: ArtifactRef,
    /// Dimensions of the processed artifact
    pub dimensions: Dimensions,
    /// The prompt as submitted
    pub original_prompt: String,
    /// The rewritten prompt, `None` when enhancement wasn't used or fell back
    pub enhanced_prompt: Option<String>,
    /// The styled prompt that was actually sent upstream
    pub final_prompt: String,
    /// When the result was produced
    pub generated_at: DateTime<Utc>,
}

/// Per-phase durations of a generation attempt, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTimings {
    /// Prompt enhancement
    pub enhancement_ms: u64,
    /// Upstream image generation
    pub generation_ms: u64,
    /// Download, resize and persist
    pub processing_ms: u64,
    /// Whole attempt
    pub total_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Icon".parse::<ImageKind>(), Ok(ImageKind::Icon));
        assert_eq!(" logo ".parse::<ImageKind>(), Ok(ImageKind::Logo));
        assert!("banner".parse::<ImageKind>().is_err());
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = GenerationResult {
            image_type: ImageKind::Icon,
            image: ArtifactRef {
                filename: "icon_a_1.png".to_string(),
                url: "/generated/icon_a_1.png".to_string(),
                size: 10,
                dimensions: Some(Dimensions {
                    width: 64,
                    height: 64,
                }),
            },
            original: ArtifactRef {
                filename: "icon_a_1_original.png".to_string(),
                url: "/generated/original/icon_a_1_original.png".to_string(),
                size: 20,
                dimensions: None,
            },
            dimensions: Dimensions {
                width: 64,
                height: 64,
            },
            original_prompt: "a".to_string(),
            enhanced_prompt: None,
            final_prompt: "a, styled".to_string(),
            generated_at: Utc::now(),
        };
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["imageType"], "icon");
        assert!(value["enhancedPrompt"].is_null());
        assert_eq!(value["dimensions"]["width"], 64);
        assert!(value["original"].get("dimensions").is_none());
    }
}
