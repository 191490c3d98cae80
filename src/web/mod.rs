//! HTTP layer: router, shared state and the server loop

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderValue, Response};
use axum::routing::{get, post};
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::services::fs::ServeFileSystemResponseBody;
use tower_http::set_header::SetResponseHeader;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::constants::{ARTIFACT_CACHE_CONTROL, GENERATED_URL_PREFIX};
use crate::db::JsonFileStore;
use crate::db::audit::AuditLog;
use crate::db::entities::events::EventLevel;
use crate::error::GeneratorError;
use crate::generator::Generator;
use crate::storage::ArtifactStore;

mod api;
mod middleware;
mod prelude;
mod views;

/// Everything a handler can reach.
#[derive(Clone, Debug)]
pub struct AppState {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) generator: Arc<Generator>,
    pub(crate) artifacts: ArtifactStore,
    pub(crate) audit: Option<Arc<AuditLog>>,
    pub(crate) started: Instant,
}

impl AppState {
    /// Builds the clients and, when logging is on, the record store.
    pub fn new(config: AppConfig) -> Result<Self, GeneratorError> {
        let artifacts = ArtifactStore::new(&config.storage);
        let generator = Generator::new(&config, artifacts.clone())?;
        let audit = config.logging.any().then(|| {
            Arc::new(AuditLog::new(
                JsonFileStore::new(&config.storage.data_dir, config.storage.cache_size),
                config.logging,
            ))
        });
        Ok(Self {
            config: Arc::new(config),
            generator: Arc::new(generator),
            artifacts,
            audit,
            started: Instant::now(),
        })
    }

    /// The record store wrapper, if persistence logging is on
    pub fn audit(&self) -> Option<&Arc<AuditLog>> {
        self.audit.as_ref()
    }

    /// Local artifact directories
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }
}

/// Immutable caching only for artifacts that were actually found.
fn artifact_cache_control(
    response: &Response<ServeFileSystemResponseBody>,
) -> Option<HeaderValue> {
    response
        .status()
        .is_success()
        .then(|| HeaderValue::from_static(ARTIFACT_CACHE_CONTROL))
}

/// Builds the full application router for `state`.
pub fn create_router(state: AppState) -> Router {
    let artifacts = SetResponseHeader::overriding(
        ServeDir::new(state.artifacts.output_dir()),
        CACHE_CONTROL,
        artifact_cache_control,
    );

    Router::new()
        .route("/", get(views::index_handler))
        .route("/static/styles.css", get(views::styles_handler))
        .route("/api/generate", post(api::generate_handler))
        .route("/api/health", get(api::health_handler))
        .route("/api/images", get(api::images_handler))
        .route("/api/config", get(api::config_handler))
        .route("/api/stats", get(api::stats_handler))
        .route("/api/transactions", get(api::transactions_handler))
        .route("/api/events", get(api::events_handler))
        .nest_service(GENERATED_URL_PREFIX, artifacts)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::observe_request,
        ))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Binds the listener and serves until Ctrl-C.
pub async fn setup_server(config: AppConfig) -> Result<(), anyhow::Error> {
    let addr = format!("{}:{}", config.server.listen_address, config.server.port);
    let state = AppState::new(config)?;

    if let Some(audit) = state.audit() {
        audit
            .record_event(
                EventLevel::Info,
                "server_started",
                &format!("Server started on {addr}"),
                json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "imageModel": state.generator.images().model(),
                    "promptEnhancement": state.generator.enhancer().is_available(),
                }),
            )
            .await;
    }

    let app = create_router(state);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}
