//! register, login and logout, plus session token extraction.
//!
//! With the cookie transport the token lives in an HTTP-only cookie that the
//! browser sends back automatically. With the bearer transport it is returned
//! in the login body and the client sends it in `Authorization`, with or
//! without a `Bearer ` prefix.

use axum::{
    Json,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use note_core::{AuthTransport, Credentials, LoginResponse, SuccessResponse};

use super::error::ApiError;
use super::parse_json;
use crate::AppState;
use crate::config::SessionConfig;
use crate::session::UserId;

/// Pull the session token from wherever the configured transport carries it.
pub fn extract_token(config: &SessionConfig, headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let token = match config.transport {
        AuthTransport::Cookie => jar.get(&config.cookie_name)?.value().to_string(),
        AuthTransport::Bearer => {
            let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
            value.strip_prefix("Bearer ").unwrap_or(value).trim().to_string()
        }
    };
    (!token.is_empty()).then_some(token)
}

/// Resolve the request's session to a user, or fail with 401.
pub async fn require_user(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Result<UserId, ApiError> {
    let Some(token) = extract_token(&state.config.session, headers, jar) else {
        return Err(ApiError::Unauthorized);
    };
    state
        .sessions
        .authenticate(&token)
        .await?
        .ok_or(ApiError::Unauthorized)
}

/// POST action=register
pub async fn register(state: &AppState, body: &[u8]) -> Result<Response, ApiError> {
    let credentials: Credentials = parse_json(body)?;
    state
        .sessions
        .register(credentials.email.trim(), &credentials.password)
        .await?;
    Ok(Json(SuccessResponse::OK).into_response())
}

/// POST action=login
pub async fn login(state: &AppState, body: &[u8], jar: CookieJar) -> Result<Response, ApiError> {
    let credentials: Credentials = parse_json(body)?;
    let email = credentials.email.trim().to_string();
    let issued = state.sessions.login(&email, &credentials.password).await?;

    let config = &state.config.session;
    match config.transport {
        AuthTransport::Cookie => {
            let cookie = Cookie::build((config.cookie_name.clone(), issued.token))
                .path("/")
                .http_only(true)
                .secure(config.secure_cookie)
                .same_site(SameSite::Strict)
                .max_age(time::Duration::seconds(config.lifetime_secs as i64))
                .build();
            let body = LoginResponse {
                success: true,
                user_id: issued.user_id,
                email,
                token: None,
            };
            Ok((jar.add(cookie), Json(body)).into_response())
        }
        AuthTransport::Bearer => Ok(Json(LoginResponse {
            success: true,
            user_id: issued.user_id,
            email,
            token: Some(issued.token),
        })
        .into_response()),
    }
}

/// POST action=logout. Always succeeds.
pub async fn logout(state: &AppState, headers: &HeaderMap, jar: CookieJar) -> Result<Response, ApiError> {
    let config = &state.config.session;
    let token = extract_token(config, headers, &jar);
    if let Err(e) = state.sessions.logout(token.as_deref()).await {
        tracing::warn!("Failed to revoke session on logout: {}", e);
    }

    match config.transport {
        AuthTransport::Cookie => {
            let cleared = Cookie::build((config.cookie_name.clone(), ""))
                .path("/")
                .http_only(true)
                .secure(config.secure_cookie)
                .same_site(SameSite::Strict)
                .max_age(time::Duration::ZERO)
                .build();
            Ok((jar.add(cleared), Json(SuccessResponse::OK)).into_response())
        }
        AuthTransport::Bearer => Ok(Json(SuccessResponse::OK).into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(transport: AuthTransport) -> SessionConfig {
        SessionConfig {
            transport,
            ..Default::default()
        }
    }

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[test]
    fn test_bearer_with_or_without_prefix() {
        let config = config(AuthTransport::Bearer);
        let jar = CookieJar::new();
        assert_eq!(
            extract_token(&config, &headers("Bearer abc123"), &jar).as_deref(),
            Some("abc123")
        );
        assert_eq!(
            extract_token(&config, &headers("abc123"), &jar).as_deref(),
            Some("abc123")
        );
        assert_eq!(extract_token(&config, &headers("Bearer "), &jar), None);
        assert_eq!(extract_token(&config, &HeaderMap::new(), &jar), None);
    }

    #[test]
    fn test_cookie_transport_reads_named_cookie() {
        let config = config(AuthTransport::Cookie);
        let jar = CookieJar::new().add(Cookie::new(config.cookie_name.clone(), "tok"));
        assert_eq!(
            extract_token(&config, &HeaderMap::new(), &jar).as_deref(),
            Some("tok")
        );

        let other = CookieJar::new().add(Cookie::new("other", "tok"));
        assert_eq!(extract_token(&config, &HeaderMap::new(), &other), None);
    }

    #[test]
    fn test_transports_do_not_mix() {
        let cookie_config = config(AuthTransport::Cookie);
        assert_eq!(
            extract_token(&cookie_config, &headers("Bearer abc"), &CookieJar::new()),
            None
        );

        let bearer_config = config(AuthTransport::Bearer);
        let jar = CookieJar::new().add(Cookie::new(bearer_config.cookie_name.clone(), "tok"));
        assert_eq!(extract_token(&bearer_config, &HeaderMap::new(), &jar), None);
    }
}
