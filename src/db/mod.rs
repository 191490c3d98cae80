//! JSON document store used for transaction, request and event logging.
//!
//! Every model is a directory under the data root and every record is one
//! `<id>.json` file in it. There is no locking: two writers updating the same
//! record race and the last write wins.

pub mod audit;
mod cache;
pub mod entities;

use std::cmp::Ordering;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use cache::RecordCache;

/// A stored record
pub type Document = Map<String, Value>;

/// Field holding the record id
pub const ID_FIELD: &str = "id";
/// Field holding the creation timestamp
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Field holding the last update timestamp
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Errors returned by record stores.
#[derive(Debug)]
pub enum StoreError {
    /// Filesystem failure
    Io(std::io::Error),
    /// A record couldn't be (de)serialized
    Serde(serde_json::Error),
    /// Ids may only hold ASCII letters, digits and dashes
    InvalidId(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "record store I/O error: {err}"),
            Self::Serde(err) => write!(f, "record store serialization error: {err}"),
            Self::InvalidId(id) => write!(f, "invalid record id: {id:?}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err)
    }
}

/// Sort direction for [`FindQuery`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first
    Ascending,
    /// Largest first
    #[default]
    Descending,
}

/// Filter, sort and page options for `find`.
#[derive(Clone, Debug, Default)]
pub struct FindQuery {
    /// Top-level fields that must equal the given values
    pub filter: Document,
    /// Field to sort by, with direction
    pub sort: Option<(String, SortOrder)>,
    /// Records to skip after sorting
    pub offset: usize,
    /// Maximum records to return
    pub limit: Option<usize>,
}

impl FindQuery {
    /// Everything, newest first
    pub fn newest_first() -> Self {
        Self {
            sort: Some((CREATED_AT_FIELD.to_string(), SortOrder::Descending)),
            ..Self::default()
        }
    }

    /// Adds an equality filter
    pub fn with_filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filter.insert(field.to_string(), value.into());
        self
    }

    /// Caps the number of results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, document: &Document) -> bool {
        self.filter
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }
}

/// Create, read, update, delete and find over JSON documents grouped by model.
pub trait RecordStore: Send + Sync {
    /// Assigns an id and timestamps, persists and returns the stored document.
    fn create(
        &self,
        model: &str,
        document: Document,
    ) -> impl Future<Output = Result<Document, StoreError>> + Send;

    /// Fetches a document by id.
    fn read(
        &self,
        model: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Merges `patch` into the stored document's top-level fields.
    /// `id` and `createdAt` can't be changed. Returns `None` if there's no such record.
    fn update(
        &self,
        model: &str,
        id: &str,
        patch: Document,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Removes a document, returning whether it existed.
    fn delete(&self, model: &str, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Scans every document of a model and applies the query.
    fn find(
        &self,
        model: &str,
        query: &FindQuery,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn validate_id(id: &str) -> Result<(), StoreError> {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

fn validate_model(model: &str) -> Result<(), StoreError> {
    if !model.is_empty() && model.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidId(model.to_string()))
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// The file-per-record store.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    cache: Mutex<RecordCache>,
}

impl JsonFileStore {
    /// Store rooted at `root` caching up to `cache_size` records
    pub fn new(root: impl Into<PathBuf>, cache_size: usize) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(RecordCache::new(cache_size)),
        }
    }

    /// Data root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of records currently held in memory
    pub fn cached_records(&self) -> usize {
        self.cache().len()
    }

    fn cache(&self) -> MutexGuard<'_, RecordCache> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn model_dir(&self, model: &str) -> PathBuf {
        self.root.join(model)
    }

    fn record_path(&self, model: &str, id: &str) -> PathBuf {
        self.model_dir(model).join(format!("{id}.json"))
    }

    fn cache_key(model: &str, id: &str) -> String {
        format!("{model}/{id}")
    }

    async fn write(&self, model: &str, id: &str, document: &Document) -> Result<(), StoreError> {
        fs::create_dir_all(self.model_dir(model)).await?;
        let payload = serde_json::to_vec_pretty(document)?;
        fs::write(self.record_path(model, id), payload).await?;
        Ok(())
    }

    async fn load(&self, model: &str, id: &str) -> Result<Option<Document>, StoreError> {
        match fs::read(self.record_path(model, id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl RecordStore for JsonFileStore {
    async fn create(&self, model: &str, mut document: Document) -> Result<Document, StoreError> {
        validate_model(model)?;
        let id = Uuid::new_v4().to_string();
        let now = now_string();
        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        document.insert(CREATED_AT_FIELD.to_string(), Value::String(now.clone()));
        document.insert(UPDATED_AT_FIELD.to_string(), Value::String(now));

        self.write(model, &id, &document).await?;
        self.cache()
            .insert(Self::cache_key(model, &id), document.clone());
        Ok(document)
    }

    async fn read(&self, model: &str, id: &str) -> Result<Option<Document>, StoreError> {
        validate_model(model)?;
        validate_id(id)?;
        let key = Self::cache_key(model, id);
        let cached = self.cache().get(&key);
        if let Some(hit) = cached {
            return Ok(Some(hit));
        }
        let loaded = self.load(model, id).await?;
        if let Some(document) = &loaded {
            self.cache().insert(key, document.clone());
        }
        Ok(loaded)
    }

    async fn update(
        &self,
        model: &str,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        let Some(mut document) = self.read(model, id).await? else {
            return Ok(None);
        };
        for (field, value) in patch {
            if field == ID_FIELD || field == CREATED_AT_FIELD {
                continue;
            }
            document.insert(field, value);
        }
        document.insert(UPDATED_AT_FIELD.to_string(), Value::String(now_string()));

        self.write(model, id, &document).await?;
        self.cache()
            .insert(Self::cache_key(model, id), document.clone());
        Ok(Some(document))
    }

    async fn delete(&self, model: &str, id: &str) -> Result<bool, StoreError> {
        validate_model(model)?;
        validate_id(id)?;
        self.cache().remove(&Self::cache_key(model, id));
        match fs::remove_file(self.record_path(model, id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn find(&self, model: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        validate_model(model)?;
        let mut dir = match fs::read_dir(self.model_dir(model)).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut documents = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                // deleted between listing and reading
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            match serde_json::from_slice::<Document>(&bytes) {
                Ok(document) if query.matches(&document) => documents.push(document),
                Ok(_) => {}
                Err(err) => warn!("Skipping unreadable record {}: {}", path.display(), err),
            }
        }

        if let Some((field, order)) = &query.sort {
            documents.sort_by(|a, b| {
                let ordering = compare_values(a.get(field), b.get(field));
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(documents
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .collect())
    }
}
