//! Note actions. Every handler here runs after the session has been resolved.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use note_core::{CountResponse, NoteDraft, NoteId, NoteInput, NoteUpdate, SuccessResponse};

use super::error::ApiError;
use super::parse_json;
use crate::AppState;
use crate::session::UserId;

/// GET action=notes
pub async fn list(state: &AppState, user: UserId) -> Result<Response, ApiError> {
    let notes = state.notes.list(user).await?;
    Ok(Json(notes).into_response())
}

/// POST action=notes: replace the whole set
pub async fn replace_all(state: &AppState, user: UserId, body: &[u8]) -> Result<Response, ApiError> {
    let notes: Vec<NoteInput> = parse_json(body)?;
    let count = state.notes.replace_all(user, notes).await?;
    Ok(Json(CountResponse {
        success: true,
        count,
    })
    .into_response())
}

/// POST action=create_note. An empty body creates a note with all defaults.
pub async fn create(state: &AppState, user: UserId, body: &[u8]) -> Result<Response, ApiError> {
    let draft: NoteDraft = if body.iter().all(u8::is_ascii_whitespace) {
        NoteDraft::default()
    } else {
        parse_json(body)?
    };
    let note = state.notes.create(user, draft).await?;
    Ok(Json(note).into_response())
}

/// PUT action=note&id=
pub async fn update(
    state: &AppState,
    user: UserId,
    id: Option<&str>,
    body: &[u8],
) -> Result<Response, ApiError> {
    let id = note_id(id)?;
    let update: NoteUpdate = parse_json(body)?;
    state.notes.update(user, &id, update).await?;
    Ok(Json(SuccessResponse::OK).into_response())
}

/// DELETE action=notes&id=
pub async fn delete(state: &AppState, user: UserId, id: Option<&str>) -> Result<Response, ApiError> {
    let id = note_id(id)?;
    state.notes.delete(user, &id).await?;
    Ok(Json(SuccessResponse::OK).into_response())
}

fn note_id(id: Option<&str>) -> Result<NoteId, ApiError> {
    match id.map(str::trim) {
        None | Some("") => Err(ApiError::bad_request("Note ID required")),
        // A malformed id cannot name a stored note
        Some(raw) => raw.parse().map_err(|_| ApiError::NotFound),
    }
}
