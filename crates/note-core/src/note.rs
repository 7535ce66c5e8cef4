//! The note model shared by server and client.

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::note_id::NoteId;

/// Title given to notes created without one.
pub const DEFAULT_TITLE: &str = "New Note";
/// Content given to notes created without any.
pub const DEFAULT_CONTENT: &str = "Start typing...";

/// Category of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Work,
    #[default]
    Personal,
}

impl NoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Work => "work",
            NoteType::Personal => "personal",
        }
    }

    /// The other category (work <-> personal).
    pub fn toggled(self) -> Self {
        match self {
            NoteType::Work => NoteType::Personal,
            NoteType::Personal => NoteType::Work,
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(NoteType::Work),
            "personal" => Ok(NoteType::Personal),
            other => Err(format!("unknown note type: {other}")),
        }
    }
}

/// A note as stored on the server and held in client memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub urgent: bool,
    /// Display date, e.g. `10/17/2026`.
    pub date: String,
    /// Server-managed, milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Server-managed, milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Note {
    /// True when both title and content are empty.
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }
}

/// Body of a `create_note` request. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub note_type: Option<NoteType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl NoteDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Build the note this draft describes, filling omitted fields.
    pub fn into_note(self, id: NoteId, today: String) -> Note {
        Note {
            id,
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            content: self.content.unwrap_or_else(|| DEFAULT_CONTENT.to_string()),
            note_type: self.note_type.unwrap_or_default(),
            urgent: self.urgent.unwrap_or(false),
            date: self.date.unwrap_or(today),
            created_at: None,
            updated_at: None,
        }
    }
}

/// One element of a bulk `notes` POST.
///
/// Anything the client sends beyond these fields is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub note_type: Option<NoteType>,
    #[serde(default)]
    pub urgent: Option<bool>,
    #[serde(default)]
    pub date: Option<String>,
}

impl NoteInput {
    /// Resolve into a full note. Missing fields become empty text,
    /// `personal`, not urgent, and `today`.
    pub fn into_note(self, generate_id: impl FnOnce() -> NoteId, today: String) -> Note {
        Note {
            id: self.id.unwrap_or_else(generate_id),
            title: self.title.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            note_type: self.note_type.unwrap_or_default(),
            urgent: self.urgent.unwrap_or(false),
            date: self.date.unwrap_or(today),
            created_at: None,
            updated_at: None,
        }
    }
}

impl From<&Note> for NoteInput {
    fn from(note: &Note) -> Self {
        Self {
            id: Some(note.id.clone()),
            title: Some(note.title.clone()),
            content: Some(note.content.clone()),
            note_type: Some(note.note_type),
            urgent: Some(note.urgent),
            date: Some(note.date.clone()),
        }
    }
}

/// Body of a `note` PUT: the four editable fields, replaced together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub note_type: NoteType,
    #[serde(default)]
    pub urgent: bool,
}

impl From<&Note> for NoteUpdate {
    fn from(note: &Note) -> Self {
        Self {
            title: note.title.clone(),
            content: note.content.clone(),
            note_type: note.note_type,
            urgent: note.urgent,
        }
    }
}

/// Format a timestamp (ms since epoch) as a local `M/D/YYYY` display date.
pub fn display_date(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%-m/%-d/%Y").to_string(),
        None => today(),
    }
}

/// Today's local date as `M/D/YYYY`.
pub fn today() -> String {
    Local::now().format("%-m/%-d/%Y").to_string()
}
