//! Cardex Card Extractor Service
//!
//! Batch extraction of contact rows from business-card images with a
//! vision-capable model, backed by Google Drive or a local folder and
//! exporting to Google Sheets.

use anyhow::Result;
use axum::{
    http::{header, Method},
    routing::{get, post},
    serve, Router,
};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use cardex_utils::{init_logging, AppConfig};

mod extraction;
mod google_auth;
mod handlers;
mod middleware;
mod pipeline;
mod sheets;
mod sources;
mod vision_client;

#[cfg(test)]
mod test_support;

use google_auth::{GoogleAuth, ServiceAccountKey};
use middleware::request_id_middleware;
use pipeline::BatchPipeline;
use sheets::{RowSink, SheetsService};
use sources::{DriveService, RemoteSource};
use vision_client::{CardExtractor, OpenRouterClient, VisionExtractor};

const GOOGLE_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        AppConfig::default()
    });

    init_logging(&config.logging)?;
    info!("Starting Cardex Card Extractor");

    if config.openrouter.api_key.trim().is_empty() {
        warn!("openrouter_api_key_missing");
    }

    let config = Arc::new(config);
    let state = AppState::from_config(config.clone())?;
    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Card Extractor listening on {}", addr);

    serve(listener, app).await?;

    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<BatchPipeline>,
    pub openrouter: Arc<OpenRouterClient>,
    pub drive: Option<Arc<dyn RemoteSource>>,
    pub sheets: Option<Arc<dyn RowSink>>,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self> {
        let openrouter = Arc::new(OpenRouterClient::new(&config.openrouter)?);
        let extractor: Arc<dyn CardExtractor> = Arc::new(VisionExtractor::new(openrouter.clone()));
        let (drive, sheets) = google_services(&config)?;

        let pipeline = Arc::new(BatchPipeline::new(
            config.clone(),
            extractor,
            drive.clone(),
            sheets.clone(),
        ));

        Ok(Self {
            config,
            pipeline,
            openrouter,
            drive,
            sheets,
        })
    }
}

type GoogleServices = (Option<Arc<dyn RemoteSource>>, Option<Arc<dyn RowSink>>);

/// Drive and Sheets clients sharing one token cache, when credentials are configured.
fn google_services(config: &AppConfig) -> Result<GoogleServices> {
    let raw_key = match config.google.service_account_json.as_deref() {
        Some(raw) if config.google.has_credentials() => raw,
        _ => {
            warn!("google_credentials_missing");
            return Ok((None, None));
        }
    };

    let key = ServiceAccountKey::from_config(raw_key)?;
    let client = Client::builder().timeout(GOOGLE_TIMEOUT).build()?;
    let auth = Arc::new(GoogleAuth::new(key, client.clone())?);
    info!(client_email = %auth.client_email(), "google_credentials_loaded");

    let drive: Arc<dyn RemoteSource> = Arc::new(DriveService::new(client.clone(), auth.clone()));
    let sheets: Arc<dyn RowSink> = Arc::new(SheetsService::new(client, auth));
    Ok((Some(drive), Some(sheets)))
}

fn create_app(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_seconds);

    Router::new()
        .route("/models", get(handlers::list_models))
        .route("/healthz", get(handlers::health_check))
        .route("/batch/folder", post(handlers::batch_folder))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST])
                        .allow_headers([header::CONTENT_TYPE]),
                )
                .layer(TimeoutLayer::new(request_timeout))
                .layer(axum::middleware::from_fn(request_id_middleware)),
        )
        .with_state(state)
}
