//! Signup, login and account handlers

use super::{flash, page, Page, Saved};
use crate::middleware::session::SessionHandle;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use quotetable_common::{
    auth::{AuthContext, AUTHENTICATED_USER_ID_KEY},
    db::models::{Quote, User},
    errors::{AppError, Result},
    validation::{ChangePasswordForm, LoginForm, ProfileForm, SignupForm, Validator},
};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct Profile {
    pub user: User,
    pub quotes: Vec<Quote>,
}

pub async fn signup(
    State(state): State<AppState>,
    session: SessionHandle,
    Json(form): Json<SignupForm>,
) -> Result<(StatusCode, Json<Saved>)> {
    form.validate().into_result()?;
    let id = state
        .repos
        .users
        .insert(&form.name, &form.email, &form.password)
        .await
        .map_err(AppError::into_field_error)?;

    flash(&session, "Your signup was successful. Please log in.").await?;
    Ok((StatusCode::CREATED, Json(Saved::new(id, "/user/login".to_string()))))
}

pub async fn login(
    State(state): State<AppState>,
    session: SessionHandle,
    Json(form): Json<LoginForm>,
) -> Result<Json<Saved>> {
    form.validate().into_result()?;
    let user_id = match state.repos.users.authenticate(&form.email, &form.password).await {
        Ok(id) => id,
        Err(AppError::InvalidCredentials) => {
            let mut v = Validator::new();
            v.add_non_field_error(
                "Authentication failed. Please check your credentials and try again.",
            );
            return Err(AppError::ValidationFailed(v));
        }
        Err(e) => return Err(e),
    };

    let mut session = session.lock().await;
    session.renew_token();
    session.put(AUTHENTICATED_USER_ID_KEY, user_id)?;

    Ok(Json(Saved::new(user_id, "/".to_string())))
}

pub async fn logout(session: SessionHandle, auth: AuthContext) -> Result<StatusCode> {
    {
        let mut session = session.lock().await;
        session.renew_token();
        session.remove(AUTHENTICATED_USER_ID_KEY);
    }
    flash(&session, "You've been logged out successfully!").await?;

    info!(user_id = %auth.user_id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// Public profile by slug, with the user's recent quotes
pub async fn profile(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: SessionHandle,
    auth: Option<AuthContext>,
) -> Result<Json<Page<Profile>>> {
    let user = state.repos.users.get_by_url_name(&slug).await?;
    let quotes = state.repos.quotes.get_by_user_id(user.id).await?;
    Ok(Json(page(&session, auth, Profile { user, quotes }).await))
}

/// The logged-in user's own account
pub async fn account(
    State(state): State<AppState>,
    auth: AuthContext,
    session: SessionHandle,
) -> Result<Json<Page<User>>> {
    let user = state.repos.users.get(auth.user_id).await?;
    Ok(Json(page(&session, Some(auth), user).await))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    session: SessionHandle,
    Json(form): Json<ProfileForm>,
) -> Result<Json<Saved>> {
    form.validate().into_result()?;
    state
        .repos
        .users
        .update(auth.user_id, &form.name, &form.email, form.phone())
        .await
        .map_err(AppError::into_field_error)?;

    flash(&session, "Your profile has been updated.").await?;
    Ok(Json(Saved::new(auth.user_id, "/account".to_string())))
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    session: SessionHandle,
    Json(form): Json<ChangePasswordForm>,
) -> Result<Json<Saved>> {
    form.validate().into_result()?;
    match state
        .repos
        .users
        .change_password(auth.user_id, &form.current_password, &form.new_password)
        .await
    {
        Ok(()) => {}
        Err(AppError::InvalidCredentials) => {
            let mut v = Validator::new();
            v.add_field_error("currentPassword", "Current password is incorrect");
            return Err(AppError::ValidationFailed(v));
        }
        Err(e) => return Err(e),
    }

    {
        let mut session = session.lock().await;
        session.renew_token();
    }
    flash(&session, "Your password has been updated!").await?;
    Ok(Json(Saved::new(auth.user_id, "/account".to_string())))
}
