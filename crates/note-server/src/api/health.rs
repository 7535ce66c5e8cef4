use axum::{
    Json,
    response::{IntoResponse, Response},
};
use chrono::{Local, TimeZone};
use note_core::HealthResponse;

use super::error::ApiError;
use crate::AppState;

/// GET action=health
pub async fn health(state: &AppState) -> Result<Response, ApiError> {
    let now = state.clock.now_millis();
    let time = Local
        .timestamp_millis_opt(now)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .ok_or_else(|| ApiError::Internal(format!("Clock value out of range: {now}")))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        time,
        db_size: state.db.size_bytes().await?,
        backup_count: state.backups.count().await?,
    })
    .into_response())
}
