//! Account, session and note persistence service for the notes app.
//!
//! Exposes internal modules so integration tests can build the router
//! around an in-memory database.

pub mod api;
pub mod backup;
pub mod clock;
pub mod config;
pub mod notes;
pub mod password;
pub mod session;
pub mod storage;
pub mod validation;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, header},
    routing::any,
};
use note_core::{API_PATH, AuthTransport};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::backup::BackupTask;
use crate::clock::Clock;
use crate::config::Config;
use crate::notes::NoteStore;
use crate::password::CredentialHasher;
use crate::session::{SessionError, SessionManager};
use crate::storage::Database;

/// Shared application state
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub sessions: SessionManager,
    pub notes: NoteStore,
    pub backups: BackupTask,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the components around an open database.
    pub fn new(
        config: Config,
        db: Database,
        backup_dir: PathBuf,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        let hasher = CredentialHasher::new(&config.password)?;
        let sessions = SessionManager::new(
            db.clone(),
            hasher,
            clock.clone(),
            Duration::from_secs(config.session.lifetime_secs),
        )?;
        let backups = BackupTask::new(
            db.clone(),
            backup_dir,
            config.backup.prefix.clone(),
            config.backup.keep,
            clock.clone(),
        );
        let notes = NoteStore::new(db.clone(), backups.clone(), clock.clone());

        Ok(Self {
            config,
            db,
            sessions,
            notes,
            backups,
            clock,
        })
    }
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    let bearer = state.config.session.transport == AuthTransport::Bearer;

    let router = Router::new()
        .route(API_PATH, any(api::dispatch))
        .fallback(api::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-cache, must-revalidate"),
                )),
        );

    // Cookies are SameSite=Strict; only token clients may call cross-origin
    let router = if bearer {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.with_state(state)
}

/// Periodically delete expired sessions until the task is aborted.
///
/// Returns `None` when `purge_interval_secs` is 0.
pub fn spawn_session_purge(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let secs = state.config.session.purge_interval_secs;
    if secs == 0 {
        tracing::info!("Session purge disabled");
        return None;
    }
    let period = Duration::from_secs(secs);
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            // First tick completes immediately, purging at startup
            interval.tick().await;
            if let Err(e) = state.sessions.purge_expired().await {
                tracing::warn!("Session cleanup failed: {}", e);
            }
        }
    }))
}
