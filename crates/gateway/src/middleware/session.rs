//! Session cookie plumbing
//!
//! Loads the session named by the request cookie (or starts a fresh one),
//! exposes it to handlers as a [`SessionHandle`], and persists it after the
//! handler ran if anything changed. A renewed token retires the old one in
//! the store and sends the new cookie.

use crate::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use quotetable_common::{
    config::SessionConfig,
    errors::{AppError, Result},
    session::Session,
};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Shared access to the current request's session
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().await
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or_else(|| AppError::Internal {
                message: "Session layer is not installed".to_string(),
            })
    }
}

/// Value of the cookie called `name`, if the request carries one
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, token)| token.to_string())
        .filter(|token| !token.is_empty())
}

fn session_set_cookie(config: &SessionConfig, token: &str) -> Result<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name, token, config.lifetime_secs
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal {
        message: format!("Invalid session cookie: {}", e),
    })
}

/// Load the session before the handler, save it after
pub async fn load_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let session = match session_cookie(request.headers(), &state.config.session.cookie_name) {
        Some(token) => match state.sessions.load(&token).await? {
            Some(data) => Session::from_parts(token, data),
            None => {
                debug!("Unknown or expired session token, starting a new session");
                Session::new()
            }
        },
        None => Session::new(),
    };

    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let session = handle.lock().await;
    if session.is_modified() {
        if let Some(retired) = session.retired_token() {
            state.sessions.destroy(retired).await?;
        }
        state
            .sessions
            .save(session.token(), session.data(), state.config.session_lifetime())
            .await?;
        response
            .headers_mut()
            .append(SET_COOKIE, session_set_cookie(&state.config.session, session.token())?);
    }

    Ok(response)
}
