//! Quote handlers

use super::{flash, page, parse_id, Page, Saved};
use crate::middleware::session::SessionHandle;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use quotetable_common::{
    auth::AuthContext,
    db::models::Quote,
    errors::{AppError, Result},
    validation::{QuoteForm, Validator},
};

/// A new author name that already exists is reported on the author field
fn author_conflict(err: AppError) -> AppError {
    match err {
        AppError::DuplicateName { .. } => {
            let mut v = Validator::new();
            v.add_field_error("author", "An author with this name already exists");
            AppError::ValidationFailed(v)
        }
        other => other,
    }
}

/// Home page listing
pub async fn latest(
    State(state): State<AppState>,
    session: SessionHandle,
    auth: Option<AuthContext>,
) -> Result<Json<Page<Vec<Quote>>>> {
    let quotes = state.repos.quotes.latest().await?;
    Ok(Json(page(&session, auth, quotes).await))
}

pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: SessionHandle,
    auth: Option<AuthContext>,
) -> Result<Json<Page<Quote>>> {
    let id = parse_id(&id, "quote")?;
    let quote = state.repos.quotes.get_with_author_and_book(id).await?;
    Ok(Json(page(&session, auth, quote).await))
}

/// Most recent quotes of the user behind a profile slug
pub async fn by_user(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    session: SessionHandle,
    auth: Option<AuthContext>,
) -> Result<Json<Page<Vec<Quote>>>> {
    let user_id = state.repos.users.get_id_by_url_name(&slug).await?;
    let quotes = state.repos.quotes.get_by_user_id(user_id).await?;
    Ok(Json(page(&session, auth, quotes).await))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    session: SessionHandle,
    Json(form): Json<QuoteForm>,
) -> Result<(StatusCode, Json<Saved>)> {
    let submission = form.into_submission()?;
    let id = state
        .repos
        .quotes
        .insert(auth.user_id, &submission)
        .await
        .map_err(author_conflict)?;

    flash(&session, "Quote successfully created!").await?;
    Ok((StatusCode::CREATED, Json(Saved::new(id, format!("/quotes/{id}")))))
}

pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: AuthContext,
    session: SessionHandle,
    Json(form): Json<QuoteForm>,
) -> Result<Json<Saved>> {
    let id = parse_id(&id, "quote")?;
    let existing = state.repos.quotes.get(id).await?;
    auth.require_owner(existing.user_id, "quote")?;

    let submission = form.into_submission()?;
    state
        .repos
        .quotes
        .update(id, auth.user_id, &submission)
        .await
        .map_err(author_conflict)?;

    flash(&session, "Quote successfully updated!").await?;
    Ok(Json(Saved::new(id, format!("/quotes/{id}"))))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: AuthContext,
    session: SessionHandle,
) -> Result<StatusCode> {
    let id = parse_id(&id, "quote")?;
    let existing = state.repos.quotes.get(id).await?;
    auth.require_owner(existing.user_id, "quote")?;

    state.repos.quotes.delete(id).await?;

    flash(&session, "Quote successfully deleted!").await?;
    Ok(StatusCode::NO_CONTENT)
}
