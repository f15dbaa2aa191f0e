//! Author handlers

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
    db::models::{AuthorWithCounts, Book, Quote},
    errors::{AppError, Result},
    validation::AuthorForm,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AuthorDetail {
    pub author: AuthorWithCounts,
    pub books: Vec<Book>,
    pub quotes: Vec<Quote>,
}

pub async fn list(
    State(state): State<AppState>,
    session: SessionHandle,
    auth: Option<AuthContext>,
) -> Result<Json<Page<Vec<AuthorWithCounts>>>> {
    let authors = state.repos.authors.get_all_with_counts().await?;
    Ok(Json(page(&session, auth, authors).await))
}

/// The author with counts, its books and its quotes
pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: SessionHandle,
    auth: Option<AuthContext>,
) -> Result<Json<Page<AuthorDetail>>> {
    let id = parse_id(&id, "author")?;
    let repos = &state.repos;

    let (author, books, quotes) = futures::try_join!(
        repos.authors.get_with_counts(id),
        repos.books.get_by_author_id(id),
        repos.quotes.get_by_author_id(id),
    )?;

    let detail = AuthorDetail {
        author,
        books,
        quotes,
    };
    Ok(Json(page(&session, auth, detail).await))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    session: SessionHandle,
    Json(form): Json<AuthorForm>,
) -> Result<(StatusCode, Json<Saved>)> {
    form.validate().into_result()?;
    let id = state
        .repos
        .authors
        .insert(auth.user_id, &form.name)
        .await
        .map_err(AppError::into_field_error)?;

    flash(&session, "Author successfully created!").await?;
    Ok((StatusCode::CREATED, Json(Saved::new(id, format!("/authors/{id}")))))
}
