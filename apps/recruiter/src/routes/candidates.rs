//! Ingestion endpoint: the résumé pipeline deposits normalized candidate records here.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::candidate::NewCandidate;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct UpsertCandidateResponse {
    pub id: Uuid,
}

/// POST /api/v1/candidates
///
/// Inserts a candidate, or replaces the one with the same name and phone.
pub async fn handle_upsert_candidate(
    State(state): State<AppState>,
    Json(record): Json<NewCandidate>,
) -> Result<(StatusCode, Json<UpsertCandidateResponse>), AppError> {
    let record = record.normalized().map_err(AppError::Validation)?;

    let id = state
        .candidates
        .upsert(record)
        .await
        .map_err(|err| match err {
            StoreError::InvalidRecord(msg) => AppError::Validation(msg),
            other => AppError::Store(other),
        })?;

    Ok((StatusCode::OK, Json(UpsertCandidateResponse { id })))
}
