//! Client-side sync for the notes service.
//!
//! [`SyncCoordinator`] owns the in-memory note list and keeps it in step with
//! the server through a [`NoteApi`] implementation, normally [`HttpNoteApi`].

pub mod api;
pub mod coordinator;
pub mod events;
pub mod http;

pub use api::{ApiError, NoteApi};
pub use coordinator::{SessionState, SyncConfig, SyncCoordinator, SyncError, SyncHandle};
pub use events::{EventBus, Subscription, SyncEvent};
pub use http::HttpNoteApi;
