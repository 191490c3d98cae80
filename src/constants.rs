//! Shared constants for things
//!

/// Subdirectory of the output directory that holds the raw downloads
pub const ORIGINAL_SUBDIR: &str = "original";

/// Public path prefix processed artifacts are served under
pub const GENERATED_URL_PREFIX: &str = "/generated";

/// Extensions `list_artifacts` treats as images
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Longest prompt slice kept in an artifact filename
pub const FILENAME_SLUG_MAX_LEN: usize = 50;

/// Cache-Control value for artifact responses; artifacts never change once written.
pub const ARTIFACT_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Completions shorter than this are discarded by the enhancement quality gate
pub const MIN_ENHANCED_PROMPT_LEN: usize = 10;

/// Token budget for an enhancement completion
pub const ENHANCE_MAX_TOKENS: u32 = 100;

/// Sampling temperature for an enhancement completion
pub const ENHANCE_TEMPERATURE: f32 = 0.7;

/// Stop sequences for an enhancement completion
pub const ENHANCE_STOP_SEQUENCES: &[&str] = &["\n\n", "Original:", "Prompt:"];

/// Phrases that mark a completion as an echo, refusal or otherwise unusable
pub const ENHANCE_FAILURE_PHRASES: &[&str] = &[
    "enhanced prompt",
    "original prompt",
    "rewrite the following",
    "improve this prompt",
    "i cannot",
    "i can't",
    "i'm sorry",
    "i am sorry",
    "as an ai",
    "language model",
];

/// Largest request or response body the request observer buffers for logging
pub const OBSERVED_BODY_LIMIT: usize = 64 * 1024;

/// Default `limit` for the transaction and event listings
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Upper bound for `limit` on the transaction and event listings
pub const MAX_LIST_LIMIT: usize = 500;

/// Replacement text for redacted values in logged payloads
pub const REDACTED: &str = "[REDACTED]";
