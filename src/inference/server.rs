use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use super::{InferenceError, InferenceService, PredictRequest};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub service: Arc<InferenceService>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: HttpState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Inference service listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn status_for(error: &InferenceError) -> StatusCode {
    match error {
        InferenceError::EmptyRequest
        | InferenceError::InvalidPayload { .. }
        | InferenceError::UndecodableImage(_) => StatusCode::BAD_REQUEST,
        InferenceError::Storage(_) | InferenceError::Detection(_) | InferenceError::MissingResult(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn predict(State(st): State<HttpState>, Json(request): Json<PredictRequest>) -> Response {
    let service = st.service.clone();
    // Detection shells out and blocks until the framework exits.
    match tokio::task::spawn_blocking(move || service.predict(&request)).await {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(e)) => {
            tracing::warn!("Prediction failed: {}", e);
            (status_for(&e), Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e) => {
            tracing::error!("Prediction task panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "prediction task failed" })),
            )
                .into_response()
        }
    }
}

async fn health(State(st): State<HttpState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "model": st.service.model_path().to_string_lossy(),
    }))
}
