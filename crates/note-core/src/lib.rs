//! note-core: Shared types for the notes service and its sync client.
//!
//! This crate provides:
//! - The `Note` model and its field defaults
//! - `NoteId`, the single identifier scheme used by guest and synced notes
//! - Request/response bodies for the `/api?action=...` endpoint

pub mod note;
pub mod note_id;
pub mod protocol;

pub use note::{Note, NoteDraft, NoteInput, NoteType, NoteUpdate, display_date, today};
pub use note_id::{NoteId, NoteIdError};
pub use protocol::{
    API_PATH, Action, AuthTransport, CountResponse, Credentials, ErrorBody, HealthResponse,
    LoginResponse, SuccessResponse,
};
