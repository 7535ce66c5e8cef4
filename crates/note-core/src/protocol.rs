//! Wire protocol for the single `/api?action=...` endpoint.
//!
//! Every request names an [`Action`]; note-scoped actions additionally carry
//! an `id` query parameter. Bodies and responses are JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Path of the API endpoint relative to the server root.
pub const API_PATH: &str = "/api";

/// The `action` query parameter selecting an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Register,
    Login,
    Logout,
    /// GET lists, POST bulk-replaces, DELETE removes one note (`id=`)
    Notes,
    CreateNote,
    /// PUT updates one note (`id=`)
    Note,
    Health,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Register => "register",
            Action::Login => "login",
            Action::Logout => "logout",
            Action::Notes => "notes",
            Action::CreateNote => "create_note",
            Action::Note => "note",
            Action::Health => "health",
        }
    }

    /// Whether the action requires an authenticated session.
    pub fn requires_auth(&self) -> bool {
        matches!(self, Action::Notes | Action::CreateNote | Action::Note)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "register" => Ok(Action::Register),
            "login" => Ok(Action::Login),
            "logout" => Ok(Action::Logout),
            "notes" => Ok(Action::Notes),
            "create_note" => Ok(Action::CreateNote),
            "note" => Ok(Action::Note),
            "health" => Ok(Action::Health),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

/// How the session token travels between client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthTransport {
    /// HTTP-only cookie set by the server on login
    #[default]
    Cookie,
    /// Token returned in the login body, sent back in `Authorization`
    Bearer,
}

/// Body of `register` and `login`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Successful `login` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user_id: i64,
    pub email: String,
    /// Present only with the bearer transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub const OK: SuccessResponse = SuccessResponse { success: true };
}

/// Response to a bulk `notes` POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub success: bool,
    pub count: usize,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Server local time, `YYYY-MM-DD HH:MM:SS`
    pub time: String,
    /// Database size in bytes
    pub db_size: u64,
    pub backup_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trips_through_str() {
        for action in [
            Action::Register,
            Action::Login,
            Action::Logout,
            Action::Notes,
            Action::CreateNote,
            Action::Note,
            Action::Health,
        ] {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
        assert!("sync".parse::<Action>().is_err());
    }

    #[test]
    fn test_only_note_actions_require_auth() {
        assert!(Action::Notes.requires_auth());
        assert!(Action::CreateNote.requires_auth());
        assert!(Action::Note.requires_auth());
        assert!(!Action::Logout.requires_auth());
        assert!(!Action::Health.requires_auth());
    }

    #[test]
    fn test_login_response_omits_missing_token() {
        let body = LoginResponse {
            success: true,
            user_id: 7,
            email: "a@x.com".into(),
            token: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("token").is_none());
        assert_eq!(json["user_id"], 7);
    }

    #[test]
    fn test_auth_transport_config_names() {
        let t: AuthTransport = serde_json::from_str("\"bearer\"").unwrap();
        assert_eq!(t, AuthTransport::Bearer);
        assert_eq!(AuthTransport::default(), AuthTransport::Cookie);
    }
}
