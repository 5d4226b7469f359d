use axum::{extract::State, response::Json};
use chrono::Utc;

use cardex_models::{HealthResponse, ModelsResponse, ServiceStatus};

use crate::AppState;

/// GET /models
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let openrouter = &state.config.openrouter;
    Json(ModelsResponse {
        default: openrouter.default_model.clone(),
        allowed: openrouter.allowed_models(),
    })
}

/// GET /healthz
///
/// Probes every upstream concurrently. A failed probe degrades the status
/// but never fails the request.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let drive_probe = async {
        match &state.drive {
            Some(drive) => drive.check_connectivity().await,
            None => false,
        }
    };
    let sheets_probe = async {
        match &state.sheets {
            Some(sheets) => sheets.check_connectivity().await,
            None => false,
        }
    };

    let (openrouter, google_drive, google_sheets) = tokio::join!(
        state.openrouter.check_connectivity(),
        drive_probe,
        sheets_probe
    );

    let services = ServiceStatus::from_checks(openrouter, google_drive, google_sheets);
    Json(HealthResponse::new(services, Utc::now().to_rfc3339()))
}
