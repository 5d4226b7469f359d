use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use serde_json::{json, Value};

use cardex_models::{BatchRequest, BatchResponse};
use cardex_utils::{CardexError, ProcessingConfig};

use super::ApiError;
use crate::AppState;

/// POST /batch/folder
pub async fn batch_folder(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(mut body) =
        payload.map_err(|rejection| CardexError::validation("body", rejection.body_text()))?;
    apply_processing_defaults(&mut body, &state.config.processing);

    let request: BatchRequest = serde_json::from_value(body)
        .map_err(|e| CardexError::validation("body", e.to_string()))?;

    let response = state.pipeline.run(request).await?;
    Ok(Json(response))
}

/// Fill `maxFiles`/`concurrency` from configuration when the caller left them out.
fn apply_processing_defaults(body: &mut Value, processing: &ProcessingConfig) {
    let Value::Object(fields) = body else { return };

    let defaults = [
        ("maxFiles", processing.max_files_default),
        ("concurrency", processing.concurrency_default),
    ];
    for (key, default) in defaults {
        if matches!(fields.get(key), None | Some(Value::Null)) {
            fields.insert(key.to_string(), json!(default));
        }
    }
}
