//! reqwest implementation of [`NoteApi`].
//!
//! With [`AuthTransport::Cookie`] the server's HTTP-only session cookie is
//! kept in the client's cookie store. With [`AuthTransport::Bearer`] the
//! token from the login response is held in memory and sent in
//! `Authorization`.

use std::sync::RwLock;

use async_trait::async_trait;
use note_core::{
    API_PATH, Action, AuthTransport, CountResponse, Credentials, ErrorBody, LoginResponse, Note,
    NoteDraft, NoteId, NoteInput, NoteUpdate,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;

use crate::api::{ApiError, NoteApi, Result};

/// HTTP client for the `/api` endpoint
#[derive(Debug)]
pub struct HttpNoteApi {
    endpoint: String,
    transport: AuthTransport,
    session: RwLock<Session>,
}

#[derive(Debug)]
struct Session {
    /// Replaced on `clear_session` so the cookie store starts empty
    client: Client,
    token: Option<String>,
}

impl HttpNoteApi {
    /// `base_url` is the server root, e.g. `https://notes.example.com`.
    pub fn new(base_url: &str, transport: AuthTransport) -> Result<Self> {
        Ok(Self {
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), API_PATH),
            transport,
            session: RwLock::new(Session {
                client: build_client()?,
                token: None,
            }),
        })
    }

    /// Restore a bearer token saved from an earlier login.
    pub fn set_token(&self, token: Option<String>) {
        self.session.write().unwrap_or_else(|e| e.into_inner()).token = token;
    }

    /// Current bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .token
            .clone()
    }

    fn request(&self, method: Method, action: Action, id: Option<&NoteId>) -> RequestBuilder {
        let session = self.session.read().unwrap_or_else(|e| e.into_inner());
        let mut builder = session
            .client
            .request(method, &self.endpoint)
            .query(&[("action", action.as_str())]);
        if let Some(id) = id {
            builder = builder.query(&[("id", id.as_str())]);
        }
        if let (AuthTransport::Bearer, Some(token)) = (self.transport, &session.token) {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            status => {
                let message = match response.json::<ErrorBody>().await {
                    Ok(body) => body.error,
                    Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
                };
                Err(ApiError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

fn build_client() -> Result<Client> {
    Client::builder()
        .cookie_store(true)
        .build()
        .map_err(|e| ApiError::Transport(e.to_string()))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl NoteApi for HttpNoteApi {
    async fn register(&self, credentials: &Credentials) -> Result<()> {
        let builder = self.request(Method::POST, Action::Register, None).json(credentials);
        self.send(builder).await?;
        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let builder = self.request(Method::POST, Action::Login, None).json(credentials);
        let response = match self.send(builder).await {
            // A 401 here means wrong credentials, not an expired session
            Err(ApiError::Unauthorized) => {
                return Err(ApiError::Rejected {
                    status: StatusCode::UNAUTHORIZED.as_u16(),
                    message: "Invalid credentials".to_string(),
                });
            }
            other => other?,
        };
        let login: LoginResponse = decode(response).await?;

        if self.transport == AuthTransport::Bearer {
            let Some(token) = login.token.clone() else {
                return Err(ApiError::Decode("login response carried no token".to_string()));
            };
            self.set_token(Some(token));
        }
        tracing::debug!("Logged in as user {}", login.user_id);
        Ok(login)
    }

    async fn logout(&self) -> Result<()> {
        let builder = self.request(Method::POST, Action::Logout, None);
        let result = self.send(builder).await.map(|_| ());
        self.clear_session();
        result
    }

    async fn fetch_notes(&self) -> Result<Vec<Note>> {
        let response = self.send(self.request(Method::GET, Action::Notes, None)).await?;
        decode(response).await
    }

    async fn replace_all(&self, notes: &[NoteInput]) -> Result<usize> {
        let builder = self.request(Method::POST, Action::Notes, None).json(notes);
        let counted: CountResponse = decode(self.send(builder).await?).await?;
        Ok(counted.count)
    }

    async fn create_note(&self, draft: &NoteDraft) -> Result<Note> {
        let builder = self.request(Method::POST, Action::CreateNote, None).json(draft);
        decode(self.send(builder).await?).await
    }

    async fn update_note(&self, id: &NoteId, update: &NoteUpdate) -> Result<()> {
        let builder = self.request(Method::PUT, Action::Note, Some(id)).json(update);
        self.send(builder).await?;
        Ok(())
    }

    async fn delete_note(&self, id: &NoteId) -> Result<()> {
        let builder = self.request(Method::DELETE, Action::Notes, Some(id));
        self.send(builder).await?;
        Ok(())
    }

    fn clear_session(&self) {
        let mut session = self.session.write().unwrap_or_else(|e| e.into_inner());
        session.token = None;
        match build_client() {
            Ok(client) => session.client = client,
            Err(e) => tracing::warn!("Failed to reset HTTP client: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let api = HttpNoteApi::new("https://notes.example.com/", AuthTransport::Cookie).unwrap();
        assert_eq!(api.endpoint, "https://notes.example.com/api");
    }

    #[test]
    fn test_request_carries_action_id_and_bearer_token() {
        let api = HttpNoteApi::new("http://localhost:3000", AuthTransport::Bearer).unwrap();
        api.set_token(Some("abc".to_string()));
        let id: NoteId = "note_1_ff".parse().unwrap();

        let request = api
            .request(Method::PUT, Action::Note, Some(&id))
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://localhost:3000/api?action=note&id=note_1_ff"
        );
        assert_eq!(request.headers()[header::AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_cookie_transport_sends_no_authorization() {
        let api = HttpNoteApi::new("http://localhost:3000", AuthTransport::Cookie).unwrap();
        api.set_token(Some("abc".to_string()));
        let request = api.request(Method::GET, Action::Notes, None).build().unwrap();
        assert!(request.headers().get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_clear_session_drops_token() {
        let api = HttpNoteApi::new("http://localhost:3000", AuthTransport::Bearer).unwrap();
        api.set_token(Some("abc".to_string()));
        api.clear_session();
        assert_eq!(api.token(), None);
        let request = api.request(Method::GET, Action::Notes, None).build().unwrap();
        assert!(request.headers().get(header::AUTHORIZATION).is_none());
    }
}
