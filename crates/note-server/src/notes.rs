//! Per-user note persistence.
//!
//! Every operation is scoped to one user; a note owned by someone else is
//! indistinguishable from one that does not exist.

use std::sync::Arc;

use note_core::{Note, NoteDraft, NoteId, NoteInput, NoteType, NoteUpdate, display_date};
use thiserror::Error;

use crate::backup::BackupTask;
use crate::clock::Clock;
use crate::session::UserId;
use crate::storage::{Database, SqlxResultExt, StorageError};

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("Note not found")]
    NotFound,

    #[error("Stored note is invalid: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, NoteError>;

type NoteRow = (String, String, String, String, bool, String, i64, i64);

const SELECT_NOTES: &str = "SELECT note_id, title, content, type, urgent, date, created_at, updated_at
     FROM notes WHERE user_id = ? ORDER BY seq";

const INSERT_NOTE: &str = "INSERT INTO notes
     (note_id, user_id, title, content, type, urgent, date, created_at, updated_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

#[derive(Debug, Clone)]
pub struct NoteStore {
    db: Database,
    backups: BackupTask,
    clock: Arc<dyn Clock>,
}

impl NoteStore {
    pub fn new(db: Database, backups: BackupTask, clock: Arc<dyn Clock>) -> Self {
        Self { db, backups, clock }
    }

    /// All of a user's notes, in insertion order.
    pub async fn list(&self, user: UserId) -> Result<Vec<Note>> {
        let rows: Vec<NoteRow> = sqlx::query_as(SELECT_NOTES)
            .bind(user)
            .fetch_all(self.db.pool())
            .await
            .sql_context("Failed to list notes")?;
        rows.into_iter().map(note_from_row).collect()
    }

    /// Create a note with a fresh id, filling omitted fields with defaults.
    pub async fn create(&self, user: UserId, draft: NoteDraft) -> Result<Note> {
        let now = self.clock.now_millis();
        let mut note = draft.into_note(NoteId::generate_at(now * 1000), display_date(now));
        note.created_at = Some(now);
        note.updated_at = Some(now);

        sqlx::query(INSERT_NOTE)
            .bind(note.id.as_str())
            .bind(user)
            .bind(&note.title)
            .bind(&note.content)
            .bind(note.note_type.as_str())
            .bind(note.urgent)
            .bind(&note.date)
            .bind(now)
            .bind(now)
            .execute(self.db.pool())
            .await
            .sql_context("Failed to create note")?;

        tracing::debug!("User {} created note {}", user, note.id);
        Ok(note)
    }

    /// Replace a note's editable fields.
    pub async fn update(&self, user: UserId, id: &NoteId, update: NoteUpdate) -> Result<()> {
        let done = sqlx::query(
            "UPDATE notes SET title = ?, content = ?, type = ?, urgent = ?, updated_at = ?
             WHERE user_id = ? AND note_id = ?",
        )
        .bind(&update.title)
        .bind(&update.content)
        .bind(update.note_type.as_str())
        .bind(update.urgent)
        .bind(self.clock.now_millis())
        .bind(user)
        .bind(id.as_str())
        .execute(self.db.pool())
        .await
        .sql_context("Failed to update note")?;

        if done.rows_affected() == 0 {
            return Err(NoteError::NotFound);
        }
        Ok(())
    }

    pub async fn delete(&self, user: UserId, id: &NoteId) -> Result<()> {
        let done = sqlx::query("DELETE FROM notes WHERE user_id = ? AND note_id = ?")
            .bind(user)
            .bind(id.as_str())
            .execute(self.db.pool())
            .await
            .sql_context("Failed to delete note")?;

        if done.rows_affected() == 0 {
            return Err(NoteError::NotFound);
        }
        Ok(())
    }

    /// Atomically replace the user's whole note set with `notes`.
    ///
    /// A backup of the database is taken first. If the backup fails the sync
    /// still goes ahead. If anything in the transaction fails, the previous
    /// set is left untouched.
    pub async fn replace_all(&self, user: UserId, notes: Vec<NoteInput>) -> Result<usize> {
        if let Err(e) = self.backups.snapshot().await {
            tracing::warn!("Backup before bulk sync failed: {}", e);
        }

        let now = self.clock.now_millis();
        let today = display_date(now);

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .sql_context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM notes WHERE user_id = ?")
            .bind(user)
            .execute(&mut *tx)
            .await
            .sql_context("Failed to clear notes")?;

        let count = notes.len();
        for input in notes {
            let note = input.into_note(|| NoteId::generate_at(now * 1000), today.clone());
            sqlx::query(INSERT_NOTE)
                .bind(note.id.as_str())
                .bind(user)
                .bind(&note.title)
                .bind(&note.content)
                .bind(note.note_type.as_str())
                .bind(note.urgent)
                .bind(&note.date)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .sql_context("Failed to insert note")?;
        }

        tx.commit()
            .await
            .sql_context("Failed to commit transaction")?;

        tracing::info!("User {} synced {} notes", user, count);
        Ok(count)
    }
}

fn note_from_row(row: NoteRow) -> Result<Note> {
    let (id, title, content, note_type, urgent, date, created_at, updated_at) = row;
    let id: NoteId = id
        .parse()
        .map_err(|e| NoteError::Corrupt(format!("{id:?}: {e}")))?;
    let note_type: NoteType = note_type.parse().map_err(NoteError::Corrupt)?;
    Ok(Note {
        id,
        title,
        content,
        note_type,
        urgent,
        date,
        created_at: Some(created_at),
        updated_at: Some(updated_at),
    })
}
