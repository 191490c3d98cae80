//! Typed records kept in the JSON store
pub mod api_requests;
pub mod events;
pub mod sessions;
pub mod transactions;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Document, StoreError};

pub(crate) fn to_document<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serde(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        )))),
    }
}

pub(crate) fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(document))?)
}
