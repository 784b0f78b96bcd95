use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::runner::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: DateTime<Utc>,
    environment: String,
    finished: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.status.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        environment: state.cfg.target.environment.to_string(),
        finished: status.finished,
    })
}
