use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::runner::{AppState, StatsSnapshot};

/// Full run status: where the shape is, how many users exist, and the same
/// stats the console table prints.
#[derive(Debug, Serialize)]
pub struct RunStatus {
    timestamp: DateTime<Utc>,
    environment: String,
    stage: StageInfo,
    users: UserInfo,
    finished: bool,
    stats: StatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct StageInfo {
    index: usize,
    count: usize,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    desired: u32,
    active: usize,
}

pub async fn status(State(state): State<AppState>) -> Json<RunStatus> {
    let runner = state.status.read().await;
    Json(RunStatus {
        timestamp: Utc::now(),
        environment: state.cfg.target.environment.to_string(),
        stage: StageInfo {
            index: runner.stage_index,
            count: runner.stage_count,
        },
        users: UserInfo {
            desired: runner.desired_users,
            active: runner.active_users,
        },
        finished: runner.finished,
        stats: state.stats.snapshot(),
    })
}
