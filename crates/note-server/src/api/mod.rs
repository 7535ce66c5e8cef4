//! The `/api` endpoint.
//!
//! One route serves every action; [`dispatch`] picks the handler from the
//! `action` query parameter and the request method.

pub mod auth;
pub mod error;
pub mod health;
pub mod notes;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use note_core::Action;
use serde::{Deserialize, de::DeserializeOwned};

pub use error::ApiError;

use crate::AppState;

/// Query string of an `/api` request.
#[derive(Debug, Default, Deserialize)]
pub struct ApiQuery {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Resolved (action, method) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Register,
    Login,
    Logout,
    Health,
    ListNotes,
    ReplaceNotes,
    DeleteNote,
    CreateNote,
    UpdateNote,
}

fn route(action: Action, method: &Method) -> Option<Route> {
    let route = match (action, method) {
        (Action::Register, &Method::POST) => Route::Register,
        (Action::Login, &Method::POST) => Route::Login,
        (Action::Logout, &Method::POST) => Route::Logout,
        (Action::Health, &Method::GET) => Route::Health,
        (Action::Notes, &Method::GET) => Route::ListNotes,
        (Action::Notes, &Method::POST) => Route::ReplaceNotes,
        (Action::Notes, &Method::DELETE) => Route::DeleteNote,
        (Action::CreateNote, &Method::POST) => Route::CreateNote,
        (Action::Note, &Method::PUT) => Route::UpdateNote,
        _ => return None,
    };
    Some(route)
}

/// Handler for every method on `/api`
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    method: Method,
    query: Result<Query<ApiQuery>, QueryRejection>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    let query = match query {
        Ok(Query(query)) => query,
        Err(_) => return ApiError::UnknownAction.into_response(),
    };
    let Some(action) = query.action.as_deref().and_then(|a| a.parse::<Action>().ok()) else {
        return ApiError::UnknownAction.into_response();
    };
    let Some(route) = route(action, &method) else {
        return ApiError::MethodNotAllowed.into_response();
    };

    let result = match route {
        Route::Register => auth::register(&state, &body).await,
        Route::Login => auth::login(&state, &body, jar).await,
        Route::Logout => auth::logout(&state, &headers, jar).await,
        Route::Health => health::health(&state).await,
        note_route => match auth::require_user(&state, &headers, &jar).await {
            Ok(user) => {
                let id = query.id.as_deref();
                match note_route {
                    Route::ListNotes => notes::list(&state, user).await,
                    Route::ReplaceNotes => notes::replace_all(&state, user, &body).await,
                    Route::DeleteNote => notes::delete(&state, user, id).await,
                    Route::CreateNote => notes::create(&state, user, &body).await,
                    Route::UpdateNote => notes::update(&state, user, id, &body).await,
                    _ => Err(ApiError::UnknownAction),
                }
            }
            Err(e) => Err(e),
        },
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

/// Fallback for paths other than `/api`
pub async fn not_found() -> Response {
    ApiError::UnknownAction.into_response()
}

/// Decode a JSON body, reporting any failure as a 400.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        ApiError::bad_request("Invalid data format")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use note_core::Credentials;

    #[test]
    fn test_route_table() {
        assert_eq!(route(Action::Notes, &Method::GET), Some(Route::ListNotes));
        assert_eq!(route(Action::Notes, &Method::POST), Some(Route::ReplaceNotes));
        assert_eq!(route(Action::Notes, &Method::DELETE), Some(Route::DeleteNote));
        assert_eq!(route(Action::Note, &Method::PUT), Some(Route::UpdateNote));
        assert_eq!(route(Action::Login, &Method::GET), None);
        assert_eq!(route(Action::Health, &Method::POST), None);
        assert_eq!(route(Action::Note, &Method::DELETE), None);
    }

    #[test]
    fn test_parse_json() {
        let creds: Credentials = parse_json(br#"{"email":"a@x.com","password":"p"}"#).unwrap();
        assert_eq!(creds.email, "a@x.com");
        assert!(matches!(
            parse_json::<Credentials>(b"{not json"),
            Err(ApiError::BadRequest(m)) if m == "Invalid data format"
        ));
    }
}
