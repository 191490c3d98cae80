//! Artifact files on local disk: directory setup, naming, writing and listing

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::constants::{
    FILENAME_SLUG_MAX_LEN, GENERATED_URL_PREFIX, IMAGE_EXTENSIONS, ORIGINAL_SUBDIR,
};
use crate::models::ImageKind;

#[allow(clippy::expect_used)]
static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9\s]").expect("valid regex"));
#[allow(clippy::expect_used)]
static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Builds `{kind}_{slug}_{timestamp}[_original].png` for a prompt.
///
/// Anything outside ASCII letters, digits and whitespace is dropped,
/// whitespace runs become a single underscore and the slug is cut to 50
/// characters. Two calls in the same millisecond with the same prompt and
/// kind give the same name, and the second write wins.
pub fn artifact_filename(
    prompt: &str,
    kind: ImageKind,
    timestamp_ms: i64,
    is_original: bool,
) -> String {
    let stripped = DISALLOWED_CHARS.replace_all(prompt, "");
    let collapsed = WHITESPACE_RUNS.replace_all(stripped.trim(), "_");
    let mut slug: String = collapsed.chars().take(FILENAME_SLUG_MAX_LEN).collect();
    if slug.is_empty() {
        slug.push_str("untitled");
    }
    let suffix = if is_original { "_original" } else { "" };
    format!("{}_{}_{}{}.png", kind.as_str(), slug, timestamp_ms, suffix)
}

/// Public path of a processed artifact.
pub fn processed_url(filename: &str) -> String {
    format!("{GENERATED_URL_PREFIX}/{filename}")
}

/// Public path of an original artifact.
pub fn original_url(filename: &str) -> String {
    format!("{GENERATED_URL_PREFIX}/{ORIGINAL_SUBDIR}/{filename}")
}

/// A processed artifact found on disk.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
    /// File name
    pub filename: String,
    /// Public relative URL path
    pub url: String,
    /// Size in bytes
    pub size: u64,
    /// Kind parsed from the name prefix, if it has one
    pub image_type: Option<ImageKind>,
    /// Birth time, or modification time where the filesystem has no birth time
    pub created_at: DateTime<Utc>,
}

/// Which directories exist right now, for the health endpoint.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct DirectoryStatus {
    /// Processed artifacts
    pub generated: bool,
    /// Originals
    pub original: bool,
    /// Scratch
    pub temp: bool,
}

/// The local artifact directories.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    original_dir: PathBuf,
    temp_dir: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at the configured directories
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            original_dir: config.original_dir.clone(),
            temp_dir: config.temp_dir.clone(),
        }
    }

    /// Processed artifact directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where a processed artifact with this name lives
    pub fn processed_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    /// Where an original artifact with this name lives
    pub fn original_path(&self, filename: &str) -> PathBuf {
        self.original_dir.join(filename)
    }

    /// Creates the processed, original and scratch directories.
    ///
    /// Permission problems are returned, anything else is logged and ignored.
    pub async fn ensure_directories(&self) -> Result<(), std::io::Error> {
        for dir in [&self.output_dir, &self.original_dir, &self.temp_dir] {
            match fs::create_dir_all(dir).await {
                Ok(()) => debug!("Directory ready: {}", dir.display()),
                Err(err) if err.kind() == ErrorKind::PermissionDenied => return Err(err),
                Err(err) => warn!("Failed to create {}: {}", dir.display(), err),
            }
        }
        Ok(())
    }

    /// Reports which directories currently exist.
    pub async fn directory_status(&self) -> DirectoryStatus {
        DirectoryStatus {
            generated: is_dir(&self.output_dir).await,
            original: is_dir(&self.original_dir).await,
            temp: is_dir(&self.temp_dir).await,
        }
    }

    /// Writes `bytes` to `path`, creating parent directories as needed.
    pub async fn persist(&self, path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, bytes).await
    }

    /// Removes an artifact left behind by a failed attempt. Already gone is fine.
    pub async fn discard(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove {}: {}", path.display(), err),
        }
    }

    /// Lists processed artifacts, newest first.
    pub async fn list_artifacts(&self) -> Result<Vec<StoredArtifact>, std::io::Error> {
        let mut dir = match fs::read_dir(&self.output_dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if !has_image_extension(&path) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            artifacts.push(StoredArtifact {
                filename: filename.to_string(),
                url: processed_url(filename),
                size: metadata.len(),
                image_type: kind_from_filename(filename),
                created_at: DateTime::<Utc>::from(created),
            });
        }

        artifacts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(artifacts)
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn kind_from_filename(filename: &str) -> Option<ImageKind> {
    filename.split('_').next()?.parse().ok()
}
