//! HTTP surface: `POST /predict` and `GET /health`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::ml::{PredictError, VisitorPredictor};

/// Message returned for every internal failure; details stay in the logs.
pub const INTERNAL_ERROR_MESSAGE: &str = "모델 예측 중 내부 오류가 발생했습니다.";

/// Shared router state
#[derive(Clone, Debug)]
pub struct AppState {
    pub predictor: Arc<VisitorPredictor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predicted_visitors: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler failure mapped onto a status code
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal,
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Validation(e) => {
                warn!("Rejected prediction request: {}", e);
                ApiError::BadRequest(e.to_string())
            }
            PredictError::Model(e) => {
                error!("Prediction failed: {:#}", anyhow::Error::new(e));
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR_MESSAGE.to_string(),
            ),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

/// Build the application router around a loaded predictor.
pub fn create_router(predictor: Arc<VisitorPredictor>) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .with_state(AppState { predictor })
}

/// Serve the router on an already-bound listener until the process exits.
pub async fn serve(
    listener: TcpListener,
    predictor: Arc<VisitorPredictor>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on {}", addr);
    }
    axum::serve(listener, create_router(predictor)).await
}

async fn predict_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    info!("Received prediction request ({} bytes)", body.len());

    let prediction = state.predictor.predict_json(&body)?;
    let predicted_visitors = prediction.rounded();

    info!(
        "Predicted {} visitors (log value {:.4})",
        predicted_visitors, prediction.log_value
    );
    Ok(Json(PredictResponse { predicted_visitors }))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}
