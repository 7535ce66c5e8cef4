//! Keeps an in-memory note list in step with the server.
//!
//! Local state is the authority between syncs. Title and content edits are
//! debounced and sent as one PUT per note; type and urgency toggles, creates
//! and deletes go out immediately. A periodic bulk sync pushes the whole local
//! list. Nothing is sent until the server list has loaded after sign-in. Any
//! 401 drops queued edits and moves the coordinator to
//! [`SessionState::Expired`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use note_core::{Credentials, LoginResponse, Note, NoteDraft, NoteId, NoteInput, NoteUpdate, today};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::api::{ApiError, NoteApi};
use crate::events::{EventBus, SyncEvent};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period after a note's last title/content edit before it is sent
    pub debounce: Duration,
    /// Time between periodic bulk syncs
    pub sync_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            sync_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Notes live only in memory
    #[default]
    Guest,
    /// Signed in, but the server list has not loaded yet. Nothing is sent
    /// until [`SyncCoordinator::resume`] succeeds.
    Unsynced,
    Authenticated,
    /// The server rejected the session; local notes are kept
    Expired,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Unknown note: {0}")]
    UnknownNote(NoteId),
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Default)]
struct LocalState {
    session: SessionState,
    notes: Vec<Note>,
    /// Notes with edits waiting for the debounce window, in first-edit order
    pending: Vec<NoteId>,
    /// Bumped whenever the session changes, so late responses from an older
    /// session cannot expire the current one
    epoch: u64,
}

impl LocalState {
    fn note_mut(&mut self, id: &NoteId) -> Result<&mut Note> {
        self.notes
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| SyncError::UnknownNote(id.clone()))
    }
}

struct Shared {
    api: Arc<dyn NoteApi>,
    local: Mutex<LocalState>,
    /// Held for the duration of a bulk sync
    bulk_gate: tokio::sync::Mutex<()>,
    events: Arc<EventBus>,
    edits: mpsc::UnboundedSender<NoteId>,
}

/// Background tasks owned by a coordinator. Dropping aborts them.
#[derive(Debug, Default)]
pub struct SyncHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    fn abort(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

pub struct SyncCoordinator {
    shared: Arc<Shared>,
    handle: SyncHandle,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("state", &self.state())
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl SyncCoordinator {
    /// Start the coordinator and its background tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(api: Arc<dyn NoteApi>, config: SyncConfig) -> Self {
        let (edits, edit_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            api,
            local: Mutex::new(LocalState::default()),
            bulk_gate: tokio::sync::Mutex::new(()),
            events: Arc::new(EventBus::new()),
            edits,
        });

        let tasks = vec![
            tokio::spawn(debounce_loop(shared.clone(), edit_rx, config.debounce)),
            tokio::spawn(periodic_loop(shared.clone(), config.sync_interval)),
        ];

        Self {
            shared,
            handle: SyncHandle { tasks },
        }
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.shared.events.clone()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().session
    }

    /// Snapshot of the local notes.
    pub fn notes(&self) -> Vec<Note> {
        self.shared.lock().notes.clone()
    }

    /// Number of notes with edits waiting to be sent.
    pub fn pending_edits(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<()> {
        self.shared
            .api
            .register(&Credentials::new(email, password))
            .await?;
        Ok(())
    }

    /// Log in and replace local notes with the server's list.
    ///
    /// Notes created as a guest are discarded once the list loads. If the
    /// load fails the coordinator stays [`SessionState::Unsynced`].
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        self.shared.lock().epoch += 1;
        let login = self
            .shared
            .api
            .login(&Credentials::new(email, password))
            .await?;
        let epoch = {
            let mut local = self.shared.lock();
            local.session = SessionState::Unsynced;
            local.pending.clear();
            local.epoch
        };
        self.shared.load(epoch).await?;
        Ok(login)
    }

    /// Load the server list for a session the API client already holds
    /// (e.g. after a restart, or to retry a failed load after login).
    pub async fn resume(&self) -> Result<usize> {
        let epoch = {
            let mut local = self.shared.lock();
            if local.session != SessionState::Authenticated {
                local.session = SessionState::Unsynced;
                local.epoch += 1;
            }
            local.epoch
        };
        self.shared.load(epoch).await
    }

    /// Push the full local list now, waiting for any bulk sync in flight.
    pub async fn sync_now(&self) -> Result<usize> {
        let _gate = self.shared.bulk_gate.lock().await;
        self.shared.bulk_sync().await
    }

    /// Create a note. When signed in the server assigns its id and defaults.
    pub async fn create_note(&self, draft: NoteDraft) -> Result<Note> {
        let epoch = {
            let mut local = self.shared.lock();
            if local.session != SessionState::Authenticated {
                let note = draft.into_note(NoteId::generate(), today());
                local.notes.push(note.clone());
                return Ok(note);
            }
            local.epoch
        };

        match self.shared.api.create_note(&draft).await {
            Ok(note) => {
                self.shared.lock().notes.push(note.clone());
                Ok(note)
            }
            Err(e) => {
                let unauthorized = matches!(e, ApiError::Unauthorized);
                self.shared
                    .report(epoch, &e, |message| SyncEvent::MutationFailed {
                        operation: "create".to_string(),
                        note_id: None,
                        message,
                    });
                if unauthorized {
                    return Err(e.into());
                }
                // Keep it locally; the next bulk sync stores it
                let note = draft.into_note(NoteId::generate(), today());
                self.shared.lock().notes.push(note.clone());
                Ok(note)
            }
        }
    }

    pub fn edit_title(&self, id: &NoteId, title: impl Into<String>) -> Result<()> {
        let title = title.into();
        self.edit(id, |note| note.title = title)
    }

    pub fn edit_content(&self, id: &NoteId, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        self.edit(id, |note| note.content = content)
    }

    /// Flip work/personal and send the change immediately.
    pub async fn toggle_type(&self, id: &NoteId) -> Result<()> {
        self.toggle(id, |note| note.note_type = note.note_type.toggled())
            .await
    }

    /// Flip the urgent flag and send the change immediately.
    pub async fn toggle_urgent(&self, id: &NoteId) -> Result<()> {
        self.toggle(id, |note| note.urgent = !note.urgent).await
    }

    pub async fn delete_note(&self, id: &NoteId) -> Result<()> {
        let epoch = {
            let mut local = self.shared.lock();
            let before = local.notes.len();
            local.notes.retain(|n| &n.id != id);
            if local.notes.len() == before {
                return Err(SyncError::UnknownNote(id.clone()));
            }
            local.pending.retain(|p| p != id);
            if local.session != SessionState::Authenticated {
                return Ok(());
            }
            local.epoch
        };

        match self.shared.api.delete_note(id).await {
            Ok(()) => {}
            // Never reached the server
            Err(ApiError::NotFound) => tracing::debug!("Deleted note {} was not on the server", id),
            Err(e) => self.shared.report(epoch, &e, |message| SyncEvent::MutationFailed {
                operation: "delete".to_string(),
                note_id: Some(id.to_string()),
                message,
            }),
        }
        Ok(())
    }

    /// End the session and forget local notes.
    pub async fn logout(&self) {
        if self.state() == SessionState::Authenticated {
            self.shared.flush_edits(None).await;
        }
        if matches!(
            self.state(),
            SessionState::Authenticated | SessionState::Unsynced
        ) {
            if let Err(e) = self.shared.api.logout().await {
                tracing::warn!("Server logout failed: {}", e);
            }
        }
        {
            let mut local = self.shared.lock();
            local.notes.clear();
            local.pending.clear();
            local.session = SessionState::Guest;
            local.epoch += 1;
        }
        self.shared.api.clear_session();
        self.shared.events.emit(SyncEvent::LoggedOut);
    }

    /// Send queued edits, then stop the background tasks.
    pub async fn shutdown(mut self) {
        self.shared.flush_edits(None).await;
        self.handle.abort();
    }

    fn edit(&self, id: &NoteId, apply: impl FnOnce(&mut Note)) -> Result<()> {
        {
            let mut local = self.shared.lock();
            apply(local.note_mut(id)?);
            if local.session != SessionState::Authenticated {
                return Ok(());
            }
            if !local.pending.contains(id) {
                local.pending.push(id.clone());
            }
        }
        // Each signal restarts this note's debounce window
        if self.shared.edits.send(id.clone()).is_err() {
            tracing::warn!("Edit worker has stopped; edit to {} stays local", id);
        }
        Ok(())
    }

    async fn toggle(&self, id: &NoteId, apply: impl FnOnce(&mut Note)) -> Result<()> {
        let (epoch, update) = {
            let mut local = self.shared.lock();
            let note = local.note_mut(id)?;
            apply(note);
            let update = NoteUpdate::from(&*note);
            if local.session != SessionState::Authenticated {
                return Ok(());
            }
            // The PUT carries any queued title/content edits too
            local.pending.retain(|p| p != id);
            (local.epoch, update)
        };

        if let Err(e) = self.shared.api.update_note(id, &update).await {
            self.shared.report(epoch, &e, |message| SyncEvent::MutationFailed {
                operation: "update".to_string(),
                note_id: Some(id.to_string()),
                message,
            });
        }
        Ok(())
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LocalState> {
        self.local.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace local notes with the server's, skipping blank ones. Only a
    /// successful load makes the session [`SessionState::Authenticated`].
    async fn load(&self, epoch: u64) -> Result<usize> {
        let notes = match self.api.fetch_notes().await {
            Ok(notes) => notes,
            Err(e) => {
                if matches!(e, ApiError::Unauthorized) {
                    self.expire(epoch);
                } else {
                    tracing::warn!("Failed to load notes: {}", e);
                }
                return Err(e.into());
            }
        };

        let notes: Vec<Note> = notes.into_iter().filter(|n| !n.is_blank()).collect();
        let count = notes.len();
        {
            let mut local = self.lock();
            if local.epoch != epoch {
                tracing::debug!("Session changed while loading; discarding server list");
                return Err(SyncError::NotAuthenticated);
            }
            local.notes = notes;
            local.pending.clear();
            local.session = SessionState::Authenticated;
        }
        tracing::info!("Loaded {} notes from server", count);
        self.events.emit(SyncEvent::NotesLoaded { count });
        Ok(count)
    }

    /// Send the full local list. Callers hold `bulk_gate`.
    async fn bulk_sync(&self) -> Result<usize> {
        let (epoch, snapshot): (u64, Vec<NoteInput>) = {
            let local = self.lock();
            if local.session != SessionState::Authenticated {
                return Err(SyncError::NotAuthenticated);
            }
            (local.epoch, local.notes.iter().map(NoteInput::from).collect())
        };

        match self.api.replace_all(&snapshot).await {
            Ok(count) => {
                tracing::debug!("Synced {} notes", count);
                self.events.emit(SyncEvent::SyncCompleted { count });
                Ok(count)
            }
            Err(e) => {
                self.report(epoch, &e, |message| SyncEvent::SyncFailed { message });
                Err(e.into())
            }
        }
    }

    /// Send one PUT per note with queued edits, carrying its latest values.
    /// With `due`, only those notes are sent and the rest stay queued.
    async fn flush_edits(&self, due: Option<&[NoteId]>) {
        let (epoch, updates): (u64, Vec<(NoteId, NoteUpdate)>) = {
            let mut local = self.lock();
            let pending = std::mem::take(&mut local.pending);
            let (send, keep): (Vec<NoteId>, Vec<NoteId>) = pending
                .into_iter()
                .partition(|id| due.is_none_or(|due| due.contains(id)));
            local.pending = keep;
            if local.session != SessionState::Authenticated {
                return;
            }
            let updates = send
                .into_iter()
                .filter_map(|id| {
                    let note = local.notes.iter().find(|n| n.id == id)?;
                    let update = NoteUpdate::from(note);
                    Some((id, update))
                })
                .collect();
            (local.epoch, updates)
        };

        for (id, update) in updates {
            if let Err(e) = self.api.update_note(&id, &update).await {
                let unauthorized = matches!(e, ApiError::Unauthorized);
                self.report(epoch, &e, |message| SyncEvent::MutationFailed {
                    operation: "update".to_string(),
                    note_id: Some(id.to_string()),
                    message,
                });
                if unauthorized {
                    break;
                }
            }
        }
    }

    /// Log a background failure and tell subscribers. A 401 expires the
    /// session that issued the request.
    fn report(&self, epoch: u64, error: &ApiError, event: impl FnOnce(String) -> SyncEvent) {
        if matches!(error, ApiError::Unauthorized) {
            self.expire(epoch);
        } else {
            tracing::warn!("Sync request failed: {}", error);
            self.events.emit(event(error.to_string()));
        }
    }

    /// Expire the session, unless the 401 belongs to an older one.
    fn expire(&self, epoch: u64) {
        {
            let mut local = self.lock();
            let signed_in = matches!(
                local.session,
                SessionState::Authenticated | SessionState::Unsynced
            );
            if !signed_in || local.epoch != epoch {
                tracing::debug!("Ignoring 401 from a previous session");
                return;
            }
            let dropped = local.pending.len();
            local.pending.clear();
            local.session = SessionState::Expired;
            local.epoch += 1;
            if dropped > 0 {
                tracing::warn!("Dropped {} pending edits", dropped);
            }
        }
        self.api.clear_session();
        tracing::warn!("Session expired");
        self.events.emit(SyncEvent::SessionExpired);
    }
}

/// Tracks one deadline per edited note; editing one note never delays another.
async fn debounce_loop(
    shared: Arc<Shared>,
    mut edits: mpsc::UnboundedReceiver<NoteId>,
    window: Duration,
) {
    let mut deadlines: Vec<(NoteId, Instant)> = Vec::new();
    loop {
        let next = deadlines.iter().map(|(_, at)| *at).min();
        tokio::select! {
            edit = edits.recv() => match edit {
                Some(id) => {
                    let at = Instant::now() + window;
                    match deadlines.iter_mut().find(|(pending, _)| *pending == id) {
                        Some(entry) => entry.1 = at,
                        None => deadlines.push((id, at)),
                    }
                }
                None => break,
            },
            _ = tokio::time::sleep_until(next.unwrap_or_else(Instant::now)), if next.is_some() => {
                let now = Instant::now();
                let mut due = Vec::new();
                deadlines.retain(|(id, at)| {
                    if *at <= now {
                        due.push(id.clone());
                        false
                    } else {
                        true
                    }
                });
                shared.flush_edits(Some(&due)).await;
            }
        }
    }
}

async fn periodic_loop(shared: Arc<Shared>, period: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        if shared.lock().session != SessionState::Authenticated {
            continue;
        }
        let Ok(_gate) = shared.bulk_gate.try_lock() else {
            tracing::debug!("Bulk sync still in flight, skipping tick");
            continue;
        };
        // Failures are already logged and emitted
        let _ = shared.bulk_sync().await;
    }
}
