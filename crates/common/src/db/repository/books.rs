//! Book repository

use super::resolver::book_author;
use super::{exists, fetch_all, fetch_one, row_id, to_row, RepoSettings, Store};
use crate::db::models::{author, book, quote, Author, Book, BookChanges, NewBook, Quote};
use crate::errors::{AppError, Result};
use crate::metrics::record_enrichment_failure;
use crate::store::{eq, Select};
use crate::validation::BookDraft;
use chrono::Utc;
use futures::{stream, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct BookRepository {
    store: Store,
    settings: RepoSettings,
}

impl BookRepository {
    pub fn new(store: Store, settings: RepoSettings) -> Self {
        Self { store, settings }
    }

    /// Insert a book owned by `owner`, returning the new id
    pub async fn insert(&self, owner: Uuid, draft: &BookDraft) -> Result<i64> {
        draft.validate().into_result()?;

        let now = Utc::now();
        let row = to_row(&NewBook {
            title: &draft.title,
            publish_year: draft.publish_year,
            calendar_time: draft.calendar_time,
            isbn: &draft.isbn,
            source: &draft.source,
            user_id: owner,
            created_at: now,
            updated_at: now,
        })?;
        let stored = self.store.insert(book::TABLE, row).await?;

        let id = row_id(&stored, book::TABLE)?;
        info!(book_id = id, user_id = %owner, "Book created");
        Ok(id)
    }

    /// The book row alone, no author attached
    pub async fn get_without_author(&self, id: i64) -> Result<Book> {
        fetch_one(&self.store, &Select::from(book::TABLE).eq("id", id), "book", id).await
    }

    /// The book with its displayed author, see [`resolver`](super::resolver).
    /// Any failed fetch fails the call.
    pub async fn get(&self, id: i64) -> Result<Book> {
        let mut book = self.get_without_author(id).await?;
        book.author = Some(book_author(&self.store, id).await?);
        Ok(book)
    }

    /// Distinct books among the author's quotes, in first-quote order, each
    /// with the requested author attached. Books deleted since are skipped.
    pub async fn get_by_author_id(&self, author_id: i64) -> Result<Vec<Book>> {
        let author: Author = fetch_one(
            &self.store,
            &Select::from(author::TABLE).eq("id", author_id),
            "author",
            author_id,
        )
        .await?;
        let quotes: Vec<Quote> =
            fetch_all(&self.store, &Select::from(quote::TABLE).eq("author_id", author_id)).await?;

        let mut book_ids: Vec<i64> = Vec::new();
        for q in &quotes {
            if !book_ids.contains(&q.book_id) {
                book_ids.push(q.book_id);
            }
        }

        let fetched: Vec<Result<Book>> = stream::iter(book_ids)
            .map(|id| self.get_without_author(id))
            .buffered(self.settings.enrichment_concurrency)
            .collect()
            .await;

        let mut books = Vec::with_capacity(fetched.len());
        for result in fetched {
            match result {
                Ok(mut b) => {
                    b.author = Some(author.clone());
                    books.push(b);
                }
                // quotes outlive deleted books
                Err(AppError::NotFound { id, .. }) => {
                    warn!(author_id, book_id = %id, "Skipping deleted book");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(books)
    }

    pub async fn get_all(&self) -> Result<Vec<Book>> {
        fetch_all(&self.store, &Select::from(book::TABLE)).await
    }

    /// Every book with its displayed author.
    ///
    /// Best effort: a book whose author cannot be resolved is returned with
    /// no author instead of failing the list.
    pub async fn get_all_with_authors(&self) -> Result<Vec<Book>> {
        let books = self.get_all().await?;

        let enriched: Vec<Book> = stream::iter(books)
            .map(|mut b| async move {
                match book_author(&self.store, b.id).await {
                    Ok(author) => b.author = Some(author),
                    Err(e) => {
                        warn!(book_id = b.id, error = %e, "Failed to resolve book author");
                        record_enrichment_failure("author");
                    }
                }
                b
            })
            .buffered(self.settings.enrichment_concurrency)
            .collect()
            .await;

        Ok(enriched)
    }

    pub async fn update(&self, id: i64, draft: &BookDraft) -> Result<()> {
        draft.validate().into_result()?;

        let changes = to_row(&BookChanges {
            title: &draft.title,
            publish_year: draft.publish_year,
            calendar_time: draft.calendar_time,
            isbn: &draft.isbn,
            source: &draft.source,
            updated_at: Utc::now(),
        })?;
        let updated = self.store.update(book::TABLE, &[eq("id", id)], changes).await?;
        if updated.is_empty() {
            return Err(AppError::not_found("book", id));
        }

        info!(book_id = id, "Book updated");
        Ok(())
    }

    /// Quotes referencing the book are left in place
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.store.delete(book::TABLE, &[eq("id", id)]).await?;
        info!(book_id = id, "Book deleted");
        Ok(())
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        exists(&self.store, book::TABLE, id).await
    }
}
