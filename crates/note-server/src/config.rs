//! Configuration loading and management

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use note_core::AuthTransport;
use serde::{Deserialize, Serialize};

/// Main configuration for the notes service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file, relative to the config directory unless absolute
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Prepared statements cached per pooled connection (keyed by SQL text)
    #[serde(default = "default_statement_cache_capacity")]
    pub statement_cache_capacity: usize,

    /// Backup configuration
    #[serde(default)]
    pub backup: BackupConfig,

    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Password hashing cost
    #[serde(default)]
    pub password: PasswordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory holding database snapshots, relative to the config directory unless absolute
    #[serde(default = "default_backup_dir")]
    pub dir: String,

    /// File name prefix for snapshots (`<prefix>_<timestamp>.db`)
    #[serde(default = "default_backup_prefix")]
    pub prefix: String,

    /// Number of snapshots to keep (default: 30)
    #[serde(default = "default_backup_keep")]
    pub keep: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            prefix: default_backup_prefix(),
            keep: default_backup_keep(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in seconds (default: 30 days)
    #[serde(default = "default_session_lifetime")]
    pub lifetime_secs: u64,

    /// How the token travels: "cookie" (HTTP-only) or "bearer"
    #[serde(default)]
    pub transport: AuthTransport,

    /// Name of the session cookie (cookie transport)
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Mark the session cookie `Secure`; disable only for plain-HTTP development
    #[serde(default = "default_true")]
    pub secure_cookie: bool,

    /// Seconds between expired-session purges (0 disables purging)
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: default_session_lifetime(),
            transport: AuthTransport::default(),
            cookie_name: default_cookie_name(),
            secure_cookie: true,
            purge_interval_secs: default_purge_interval(),
        }
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    #[serde(default = "default_iterations")]
    pub iterations: u32,

    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

fn default_database_file() -> String {
    "notes.db".to_string()
}

fn default_statement_cache_capacity() -> usize {
    100
}

fn default_backup_dir() -> String {
    "backups".to_string()
}

fn default_backup_prefix() -> String {
    "notes".to_string()
}

fn default_backup_keep() -> usize {
    30
}

fn default_session_lifetime() -> u64 {
    30 * 24 * 3600 // 30 days
}

fn default_cookie_name() -> String {
    "notes_session".to_string()
}

fn default_purge_interval() -> u64 {
    3600
}

fn default_memory_kib() -> u32 {
    19 * 1024
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
            statement_cache_capacity: default_statement_cache_capacity(),
            backup: BackupConfig::default(),
            session: SessionConfig::default(),
            password: PasswordConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config directory
    pub fn load(config_path: &str) -> Result<Self> {
        let config_file = Path::new(config_path).join("config.json");

        if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| "Failed to parse config.json")?;
            tracing::info!("Loaded configuration from {:?}", config_file);
            Ok(config)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_file
            );
            let config = Config::default();

            std::fs::create_dir_all(config_path)
                .with_context(|| format!("Failed to create config directory: {}", config_path))?;

            // Write default config for reference
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(&config_file, content)
                .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
            tracing::info!("Created default config at {:?}", config_file);

            Ok(config)
        }
    }

    /// Absolute path of the database file
    pub fn database_path(&self, config_path: &Path) -> PathBuf {
        resolve(config_path, &self.database_file)
    }

    /// Absolute path of the backup directory
    pub fn backup_dir(&self, config_path: &Path) -> PathBuf {
        resolve(config_path, &self.backup.dir)
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.database_file, "notes.db");
        assert_eq!(config.backup.keep, 30);
        assert_eq!(config.session.lifetime_secs, 30 * 24 * 3600);
        assert_eq!(config.session.transport, AuthTransport::Cookie);
        assert!(config.session.secure_cookie);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"session":{"transport":"bearer"}}"#).unwrap();
        assert_eq!(config.session.transport, AuthTransport::Bearer);
        assert_eq!(config.session.cookie_name, "notes_session");
        assert_eq!(config.password.iterations, 2);
    }

    #[test]
    fn test_paths_resolve_against_config_dir() {
        let mut config = Config::default();
        let base = Path::new("/srv/notes");
        assert_eq!(config.database_path(base), PathBuf::from("/srv/notes/notes.db"));
        config.backup.dir = "/var/backups/notes".into();
        assert_eq!(config.backup_dir(base), PathBuf::from("/var/backups/notes"));
    }

    #[test]
    fn test_load_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.backup.prefix, "notes");
        assert!(path.join("config.json").exists());

        let reloaded = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(reloaded.database_file, config.database_file);
    }
}
