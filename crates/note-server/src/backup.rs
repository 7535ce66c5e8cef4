//! Timestamped database snapshots with rotation.
//!
//! Files are named `<prefix>_<YYYY-MM-DD_HH-MM-SS_mmm>.db`, so name order is
//! creation order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, TimeZone};
use thiserror::Error;

use crate::clock::Clock;
use crate::storage::{Database, StorageError};

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Clock value out of range: {0}")]
    InvalidTime(i64),
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Debug, Clone)]
pub struct BackupTask {
    db: Database,
    dir: PathBuf,
    prefix: String,
    keep: usize,
    clock: Arc<dyn Clock>,
}

impl BackupTask {
    pub fn new(
        db: Database,
        dir: PathBuf,
        prefix: impl Into<String>,
        keep: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            dir,
            prefix: prefix.into(),
            keep,
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy the live database into a new backup file, then rotate.
    pub async fn snapshot(&self) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let now = self.clock.now_millis();
        let stamp = Local
            .timestamp_millis_opt(now)
            .single()
            .ok_or(BackupError::InvalidTime(now))?
            .format("%Y-%m-%d_%H-%M-%S_%3f")
            .to_string();

        // Zero-padded so same-instant copies still sort oldest to newest
        let mut path = self.dir.join(format!("{}_{}.db", self.prefix, stamp));
        let mut attempt = 1;
        while tokio::fs::try_exists(&path).await? {
            path = self
                .dir
                .join(format!("{}_{}_{:03}.db", self.prefix, stamp, attempt));
            attempt += 1;
        }

        self.db.snapshot_to(&path).await?;
        tracing::info!("Created backup {:?}", path);

        let removed = self.rotate().await?;
        if removed > 0 {
            tracing::debug!("Rotated out {} old backups", removed);
        }
        Ok(path)
    }

    /// Delete all but the newest `keep` backups. Returns how many were deleted.
    pub async fn rotate(&self) -> Result<usize> {
        let mut files = self.list().await?;
        if files.len() <= self.keep {
            return Ok(0);
        }
        files.sort_unstable_by(|a, b| b.cmp(a));
        let stale = files.split_off(self.keep);
        for path in &stale {
            tokio::fs::remove_file(path).await?;
        }
        Ok(stale.len())
    }

    /// Number of backup files present.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }

    async fn list(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lead = format!("{}_", self.prefix);
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&lead) && name.ends_with(".db") && entry.file_type().await?.is_file()
            {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    async fn task(dir: &Path, keep: usize) -> (BackupTask, Arc<ManualClock>) {
        let db = Database::in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(1_800_000_000_000));
        let task = BackupTask::new(db, dir.to_path_buf(), "notes", keep, clock.clone());
        (task, clock)
    }

    #[tokio::test]
    async fn test_snapshot_names_and_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("backups");
        let (backups, _) = task(&dir, 30).await;

        assert_eq!(backups.count().await.unwrap(), 0);
        let path = backups.snapshot().await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();

        assert!(name.starts_with("notes_"));
        assert!(name.ends_with(".db"));
        // notes_YYYY-MM-DD_HH-MM-SS_mmm.db
        assert_eq!(name.len(), "notes_".len() + 23 + ".db".len());
        assert_eq!(backups.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_instant_does_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let (backups, _) = task(tmp.path(), 30).await;
        let first = backups.snapshot().await.unwrap();
        let second = backups.snapshot().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(backups.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rotation_keeps_newest_within_one_instant() {
        let tmp = tempfile::tempdir().unwrap();
        let (backups, _) = task(tmp.path(), 3).await;

        let mut made = Vec::new();
        for _ in 0..12 {
            made.push(backups.snapshot().await.unwrap());
        }

        assert_eq!(backups.count().await.unwrap(), 3);
        let name = made[10].file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("_010.db"), "{name}");
        for (i, path) in made.iter().enumerate() {
            assert_eq!(path.exists(), i >= 9, "backup {i}");
        }
    }

    #[tokio::test]
    async fn test_rotation_keeps_newest() {
        let tmp = tempfile::tempdir().unwrap();
        let (backups, clock) = task(tmp.path(), 3).await;

        let mut made = Vec::new();
        for _ in 0..5 {
            made.push(backups.snapshot().await.unwrap());
            clock.advance(1_000);
        }

        assert_eq!(backups.count().await.unwrap(), 3);
        assert!(!made[0].exists());
        assert!(!made[1].exists());
        assert!(made[2].exists());
        assert!(made[4].exists());
    }

    #[tokio::test]
    async fn test_rotation_ignores_other_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("unrelated.db"), b"x").unwrap();
        std::fs::write(tmp.path().join("notes_readme.txt"), b"x").unwrap();

        let (backups, clock) = task(tmp.path(), 1).await;
        backups.snapshot().await.unwrap();
        clock.advance(1_000);
        backups.snapshot().await.unwrap();

        assert_eq!(backups.count().await.unwrap(), 1);
        assert!(tmp.path().join("unrelated.db").exists());
        assert!(tmp.path().join("notes_readme.txt").exists());
    }
}
