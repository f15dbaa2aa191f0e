//! Request-scoped authentication
//!
//! The authenticated user id lives in the session. It is trusted only
//! after the user row is confirmed to still exist, and only then does the
//! request carry an [`AuthContext`].

use super::session::SessionHandle;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header::CACHE_CONTROL, HeaderValue},
    middleware::Next,
    response::Response,
};
use quotetable_common::{
    auth::{AuthContext, AUTHENTICATED_USER_ID_KEY},
    errors::{AppError, Result},
};
use tracing::debug;
use uuid::Uuid;

/// Attach an [`AuthContext`] when the session names an existing user
pub async fn authenticate(
    State(state): State<AppState>,
    session: SessionHandle,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user_id: Option<Uuid> = session.lock().await.get(AUTHENTICATED_USER_ID_KEY);

    if let Some(user_id) = user_id {
        if state.repos.users.exists(user_id).await? {
            request.extensions_mut().insert(AuthContext::new(user_id));
        } else {
            debug!(user_id = %user_id, "Session names a user that no longer exists");
        }
    }

    Ok(next.run(request).await)
}

/// Reject anonymous requests; authenticated responses are never cached
pub async fn require_authentication(request: Request, next: Next) -> Result<Response> {
    if request.extensions().get::<AuthContext>().is_none() {
        return Err(AppError::Unauthorized {
            message: "You must be logged in".to_string(),
        });
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}
