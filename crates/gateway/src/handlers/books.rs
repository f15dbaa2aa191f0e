//! Book handlers

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
    db::models::{Book, Quote},
    errors::Result,
    validation::BookForm,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BookDetail {
    pub book: Book,
    pub quotes: Vec<Quote>,
}

pub async fn list(
    State(state): State<AppState>,
    session: SessionHandle,
    auth: Option<AuthContext>,
) -> Result<Json<Page<Vec<Book>>>> {
    let books = state.repos.books.get_all_with_authors().await?;
    Ok(Json(page(&session, auth, books).await))
}

pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    session: SessionHandle,
    auth: Option<AuthContext>,
) -> Result<Json<Page<BookDetail>>> {
    let id = parse_id(&id, "book")?;
    let book = state.repos.books.get(id).await?;
    let quotes = state.repos.quotes.get_by_book_id(id).await?;
    Ok(Json(page(&session, auth, BookDetail { book, quotes }).await))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    session: SessionHandle,
    Json(form): Json<BookForm>,
) -> Result<(StatusCode, Json<Saved>)> {
    let draft = form.into_draft()?;
    let id = state.repos.books.insert(auth.user_id, &draft).await?;

    flash(&session, "Book successfully created!").await?;
    Ok((StatusCode::CREATED, Json(Saved::new(id, format!("/books/{id}")))))
}

pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: AuthContext,
    session: SessionHandle,
    Json(form): Json<BookForm>,
) -> Result<Json<Saved>> {
    let id = parse_id(&id, "book")?;
    let existing = state.repos.books.get_without_author(id).await?;
    auth.require_owner(existing.user_id, "book")?;

    let draft = form.into_draft()?;
    state.repos.books.update(id, &draft).await?;

    flash(&session, "Book successfully updated!").await?;
    Ok(Json(Saved::new(id, format!("/books/{id}"))))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: AuthContext,
    session: SessionHandle,
) -> Result<StatusCode> {
    let id = parse_id(&id, "book")?;
    let existing = state.repos.books.get_without_author(id).await?;
    auth.require_owner(existing.user_id, "book")?;

    state.repos.books.delete(id).await?;

    flash(&session, "Book successfully deleted!").await?;
    Ok(StatusCode::NO_CONTENT)
}
