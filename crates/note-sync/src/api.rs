//! NoteApi trait for talking to the notes service.
//!
//! Implementations:
//! - HTTP: [`crate::http::HttpNoteApi`] over reqwest
//! - Tests: in-memory fakes

use async_trait::async_trait;
use note_core::{Credentials, LoginResponse, Note, NoteDraft, NoteId, NoteInput, NoteUpdate};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The session is missing, expired or revoked (HTTP 401)
    #[error("Session expired. Please login again.")]
    Unauthorized,

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Note not found")]
    NotFound,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Remote operations the sync coordinator relies on
#[async_trait]
pub trait NoteApi: Send + Sync {
    async fn register(&self, credentials: &Credentials) -> Result<()>;

    /// Open a session. On success the implementation holds on to whatever it
    /// needs to authenticate later calls.
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse>;

    async fn logout(&self) -> Result<()>;

    async fn fetch_notes(&self) -> Result<Vec<Note>>;

    /// Replace the server's note set. Returns the number stored.
    async fn replace_all(&self, notes: &[NoteInput]) -> Result<usize>;

    async fn create_note(&self, draft: &NoteDraft) -> Result<Note>;

    async fn update_note(&self, id: &NoteId, update: &NoteUpdate) -> Result<()>;

    async fn delete_note(&self, id: &NoteId) -> Result<()>;

    /// Forget the current session locally.
    fn clear_session(&self);
}
