pub(crate) use crate::constants::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
pub(crate) use crate::error::GeneratorError;
pub(crate) use crate::models::ImageKind;
pub(crate) use crate::web::AppState;
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::Json;
pub(crate) use axum::extract::{Query, State};
pub(crate) use axum::http::{StatusCode, header::CONTENT_TYPE};
pub(crate) use axum::response::{IntoResponse, Response};
pub(crate) use chrono::Utc;
pub(crate) use serde::{Deserialize, Serialize};
pub(crate) use serde_json::json;
pub(crate) use std::sync::Arc;
pub(crate) use tracing::{debug, info};
