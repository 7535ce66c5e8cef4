//! NoteId: Identifier for a note, shared by local-only and synced notes.
//!
//! Generated ids look like `note_<unix micros>_<16 hex chars>`. The timestamp
//! keeps ids roughly sortable and the random suffix makes collisions across
//! accounts practically impossible. Ids supplied by clients during a bulk sync
//! are accepted as opaque strings as long as they are well-formed.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Longest id accepted from a client.
pub const MAX_NOTE_ID_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NoteIdError {
    #[error("Note ID must not be empty")]
    Empty,
    #[error("Note ID exceeds 128 characters")]
    TooLong,
    #[error("Note ID contains whitespace or control characters")]
    InvalidCharacter,
}

/// A unique identifier for a note.
///
/// # Examples
/// ```
/// use note_core::NoteId;
///
/// let id = NoteId::generate();
/// assert!(id.as_str().starts_with("note_"));
///
/// let parsed: NoteId = "note_17000000000000_a1b2c3d4e5f67890".parse().unwrap();
/// assert_eq!(parsed.as_str(), "note_17000000000000_a1b2c3d4e5f67890");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(String);

impl NoteId {
    /// Generate a fresh id from the current time and 64 random bits.
    pub fn generate() -> Self {
        Self::generate_at(chrono::Utc::now().timestamp_micros())
    }

    /// Generate an id for the given timestamp (microseconds since the epoch).
    pub fn generate_at(micros: i64) -> Self {
        use rand::Rng;
        let suffix: u64 = rand::rng().random();
        Self(format!("note_{}_{:016x}", micros, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = NoteIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(NoteIdError::Empty);
        }
        if s.chars().count() > MAX_NOTE_ID_LEN {
            return Err(NoteIdError::TooLong);
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(NoteIdError::InvalidCharacter);
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for NoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NoteId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NoteId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_format() {
        let id = NoteId::generate_at(1_700_000_000_123_456);
        let s = id.as_str();
        assert!(s.starts_with("note_1700000000123456_"));
        let suffix = s.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 16);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_unique_within_same_instant() {
        let ids: std::collections::HashSet<NoteId> =
            (0..1000).map(|_| NoteId::generate_at(42)).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_parse_accepts_client_ids() {
        assert!("1699999999999".parse::<NoteId>().is_ok());
        assert!("abc-123".parse::<NoteId>().is_ok());
    }

    #[test]
    fn test_parse_rejects_bad_ids() {
        assert_eq!("".parse::<NoteId>(), Err(NoteIdError::Empty));
        assert_eq!("a b".parse::<NoteId>(), Err(NoteIdError::InvalidCharacter));
        assert_eq!("a\nb".parse::<NoteId>(), Err(NoteIdError::InvalidCharacter));
        let long = "x".repeat(MAX_NOTE_ID_LEN + 1);
        assert_eq!(long.parse::<NoteId>(), Err(NoteIdError::TooLong));
    }

    #[test]
    fn test_deserialize_rejects_numbers() {
        assert!(serde_json::from_str::<NoteId>("12345").is_err());
        let id: NoteId = serde_json::from_str("\"12345\"").unwrap();
        assert_eq!(id.as_str(), "12345");
    }
}
