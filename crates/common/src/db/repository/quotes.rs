//! Quote repository
//!
//! The quote write path resolves its author and book references first
//! (creating them when the submission carries new ones), then writes the
//! quote, then stamps the owner's last-quote time. Each step starts only
//! after the previous one succeeded.

use super::{
    exists, fetch_all, fetch_one, row_id, to_row, AuthorRepository, BookRepository, RepoSettings,
    Store, UserRepository,
};
use crate::db::models::{quote, NewQuote, Quote, QuoteChanges};
use crate::errors::{AppError, Result};
use crate::metrics::record_enrichment_failure;
use crate::store::{eq, Select};
use crate::validation::{AuthorRef, BookRef, QuoteSubmission};
use chrono::Utc;
use futures::{stream, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

/// Most recent quotes of one user
pub const USER_QUOTES_LIMIT: usize = 10;

#[derive(Clone)]
pub struct QuoteRepository {
    store: Store,
    authors: AuthorRepository,
    books: BookRepository,
    users: UserRepository,
    settings: RepoSettings,
}

impl QuoteRepository {
    pub fn new(
        store: Store,
        authors: AuthorRepository,
        books: BookRepository,
        users: UserRepository,
        settings: RepoSettings,
    ) -> Self {
        Self {
            store,
            authors,
            books,
            users,
            settings,
        }
    }

    async fn resolve_author(&self, owner: Uuid, author: &AuthorRef) -> Result<i64> {
        match author {
            AuthorRef::Existing(id) => {
                if self.authors.exists(*id).await? {
                    Ok(*id)
                } else {
                    Err(AppError::not_found("author", id))
                }
            }
            AuthorRef::New(name) => self.authors.insert(owner, name).await,
        }
    }

    async fn resolve_book(&self, owner: Uuid, book: &BookRef) -> Result<i64> {
        match book {
            BookRef::Existing(id) => {
                if self.books.exists(*id).await? {
                    Ok(*id)
                } else {
                    Err(AppError::not_found("book", id))
                }
            }
            BookRef::New(draft) => self.books.insert(owner, draft).await,
        }
    }

    /// Insert a quote owned by `owner`, creating its author and book first
    /// when the submission asks for new ones. Returns the quote id.
    pub async fn insert(&self, owner: Uuid, submission: &QuoteSubmission) -> Result<i64> {
        submission.validate().into_result()?;

        if !self.users.exists(owner).await? {
            return Err(AppError::not_found("user", owner));
        }

        let author_id = self.resolve_author(owner, &submission.author).await?;
        let book_id = self.resolve_book(owner, &submission.book).await?;

        let now = Utc::now();
        let row = to_row(&NewQuote {
            quote: &submission.quote,
            author_id,
            book_id,
            user_id: owner,
            page_number: &submission.page_number,
            is_private: submission.is_private,
            created_at: now,
            updated_at: now,
        })?;
        let stored = self.store.insert(quote::TABLE, row).await?;
        let id = row_id(&stored, quote::TABLE)?;

        self.users.touch_last_quote_added(owner).await?;

        info!(quote_id = id, author_id, book_id, user_id = %owner, "Quote created");
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Quote> {
        fetch_one(&self.store, &Select::from(quote::TABLE).eq("id", id), "quote", id).await
    }

    pub async fn get_by_author_id(&self, author_id: i64) -> Result<Vec<Quote>> {
        fetch_all(&self.store, &Select::from(quote::TABLE).eq("author_id", author_id)).await
    }

    pub async fn get_by_book_id(&self, book_id: i64) -> Result<Vec<Quote>> {
        fetch_all(&self.store, &Select::from(quote::TABLE).eq("book_id", book_id)).await
    }

    pub async fn get_by_user_id(&self, owner: Uuid) -> Result<Vec<Quote>> {
        fetch_all(
            &self.store,
            &Select::from(quote::TABLE)
                .eq("user_id", owner)
                .limit(USER_QUOTES_LIMIT),
        )
        .await
    }

    /// Quote, then its author, then its book. Any failure fails the call.
    pub async fn get_with_author_and_book(&self, id: i64) -> Result<Quote> {
        let mut quote = self.get(id).await?;
        quote.author = Some(self.authors.get(quote.author_id).await?);
        quote.book = Some(self.books.get_without_author(quote.book_id).await?);
        Ok(quote)
    }

    /// Most recent quotes, newest first, each with author and book.
    ///
    /// Best effort: a failed author or book fetch leaves that field empty
    /// on that quote only.
    pub async fn latest(&self) -> Result<Vec<Quote>> {
        let quotes: Vec<Quote> = fetch_all(
            &self.store,
            &Select::from(quote::TABLE)
                .order("created_at", false)
                .limit(self.settings.latest_limit),
        )
        .await?;

        let enriched: Vec<Quote> = stream::iter(quotes)
            .map(|q| self.enrich(q))
            .buffered(self.settings.enrichment_concurrency)
            .collect()
            .await;

        Ok(enriched)
    }

    async fn enrich(&self, mut quote: Quote) -> Quote {
        let (author, book) = futures::join!(
            self.authors.get(quote.author_id),
            self.books.get_without_author(quote.book_id),
        );

        match author {
            Ok(author) => quote.author = Some(author),
            Err(e) => {
                warn!(
                    quote_id = quote.id,
                    author_id = quote.author_id,
                    error = %e,
                    "Failed to attach author"
                );
                record_enrichment_failure("author");
            }
        }
        match book {
            Ok(book) => quote.book = Some(book),
            Err(e) => {
                warn!(
                    quote_id = quote.id,
                    book_id = quote.book_id,
                    error = %e,
                    "Failed to attach book"
                );
                record_enrichment_failure("book");
            }
        }
        quote
    }

    /// Rewrite a quote. References are resolved like on insert and the
    /// quote is stamped with `owner`.
    pub async fn update(&self, id: i64, owner: Uuid, submission: &QuoteSubmission) -> Result<i64> {
        submission.validate().into_result()?;

        let author_id = self.resolve_author(owner, &submission.author).await?;
        let book_id = self.resolve_book(owner, &submission.book).await?;

        let changes = to_row(&QuoteChanges {
            quote: &submission.quote,
            author_id,
            book_id,
            user_id: owner,
            page_number: &submission.page_number,
            is_private: submission.is_private,
            updated_at: Utc::now(),
        })?;
        let updated = self.store.update(quote::TABLE, &[eq("id", id)], changes).await?;
        if updated.is_empty() {
            return Err(AppError::not_found("quote", id));
        }

        info!(quote_id = id, author_id, book_id, "Quote updated");
        Ok(id)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.store.delete(quote::TABLE, &[eq("id", id)]).await?;
        info!(quote_id = id, "Quote deleted");
        Ok(())
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        exists(&self.store, quote::TABLE, id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::models::CalendarEra;
    use crate::db::repository::testing::fixture;
    use crate::errors::AppError;
    use crate::store::TableStore;
    use crate::validation::{AuthorRef, BookDraft, BookRef, QuoteForm, QuoteSubmission};
    use serde_json::json;
    use uuid::Uuid;

    fn submission(author: AuthorRef, book: BookRef) -> QuoteSubmission {
        QuoteSubmission {
            quote: "Whenever you find yourself on the side of the majority, it is time to pause \
                    and reflect."
                .into(),
            author,
            book,
            page_number: "7".into(),
            is_private: false,
        }
    }

    fn draft(title: &str) -> BookDraft {
        BookDraft {
            title: title.into(),
            publish_year: 1897,
            calendar_time: CalendarEra::AD,
            isbn: "9780486419466".into(),
            source: "Dover".into(),
        }
    }

    #[tokio::test]
    async fn test_new_author_with_selected_book() {
        let fx = fixture();
        let owner = fx.user("Ada Lovelace").await;
        for title in ["One", "Two", "Three"] {
            fx.repos.books.insert(owner, &draft(title)).await.unwrap();
        }

        let form = QuoteForm {
            quote: "The secret of getting ahead is getting started.".into(),
            author_selector: "".into(),
            new_author_name: "Mark Twain".into(),
            book_selector: "3".into(),
            ..Default::default()
        };
        let id = fx.repos.quotes.insert(owner, &form.into_submission().unwrap()).await.unwrap();

        let author = fx.repos.authors.get_by_name("Mark Twain").await.unwrap();
        let quote = fx.repos.quotes.get(id).await.unwrap();
        assert_eq!(quote.author_id, author.id);
        assert_eq!(quote.book_id, 3);
        assert_eq!(quote.user_id, Some(owner));
        assert_eq!(fx.store.row_count("books").await, 3);

        let user = fx.repos.users.get(owner).await.unwrap();
        assert!(user.last_quote_added_at.is_some());
    }

    #[tokio::test]
    async fn test_new_author_and_book() {
        let fx = fixture();
        let owner = fx.user("Ada Lovelace").await;
        let id = fx
            .repos
            .quotes
            .insert(
                owner,
                &submission(
                    AuthorRef::New("Mark Twain".into()),
                    BookRef::New(draft("Following the Equator")),
                ),
            )
            .await
            .unwrap();

        let quote = fx.repos.quotes.get_with_author_and_book(id).await.unwrap();
        assert_eq!(quote.author.unwrap().name, "Mark Twain");
        assert_eq!(quote.book.unwrap().title, "Following the Equator");
    }

    #[tokio::test]
    async fn test_failed_author_creation_writes_no_quote() {
        let fx = fixture();
        let owner = fx.user("Ada Lovelace").await;
        fx.repos.authors.insert(owner, "Mark Twain").await.unwrap();

        let err = fx
            .repos
            .quotes
            .insert(
                owner,
                &submission(AuthorRef::New("Mark Twain".into()), BookRef::New(draft("X"))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateName { .. }));
        assert_eq!(fx.store.row_count("quotes").await, 0);
        assert_eq!(fx.store.row_count("books").await, 0);
    }

    #[tokio::test]
    async fn test_missing_references() {
        let fx = fixture();
        let owner = fx.user("Ada Lovelace").await;

        let err = fx
            .repos
            .quotes
            .insert(owner, &submission(AuthorRef::Existing(9), BookRef::Existing(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::NotFound { ref resource_type, .. } if resource_type == "author"
        ));

        let err = fx
            .repos
            .quotes
            .insert(Uuid::new_v4(), &submission(AuthorRef::New("A".into()), BookRef::Existing(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::NotFound { ref resource_type, .. } if resource_type == "user"
        ));
        assert_eq!(fx.store.row_count("authors").await, 0);
    }

    #[tokio::test]
    async fn test_invalid_submission_touches_nothing() {
        let fx = fixture();
        let owner = fx.user("Ada Lovelace").await;
        let mut s = submission(AuthorRef::New("Mark Twain".into()), BookRef::Existing(1));
        s.quote = "q".repeat(19_001);

        assert!(matches!(
            fx.repos.quotes.insert(owner, &s).await,
            Err(AppError::ValidationFailed(_))
        ));
        assert_eq!(fx.store.row_count("authors").await, 0);
    }

    #[tokio::test]
    async fn test_lists_by_reference() {
        let fx = fixture();
        let owner = fx.user("Ada Lovelace").await;
        let a = fx.repos.authors.insert(owner, "Mark Twain").await.unwrap();
        let b = fx.repos.books.insert(owner, &draft("B")).await.unwrap();
        for _ in 0..12 {
            fx.repos
                .quotes
                .insert(owner, &submission(AuthorRef::Existing(a), BookRef::Existing(b)))
                .await
                .unwrap();
        }

        assert_eq!(fx.repos.quotes.get_by_author_id(a).await.unwrap().len(), 12);
        assert_eq!(fx.repos.quotes.get_by_book_id(b).await.unwrap().len(), 12);
        assert_eq!(fx.repos.quotes.get_by_user_id(owner).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_get_with_author_and_book_fails_on_any_step() {
        let fx = fixture();
        let owner = fx.user("Ada Lovelace").await;
        let id = fx
            .repos
            .quotes
            .insert(
                owner,
                &submission(AuthorRef::New("Mark Twain".into()), BookRef::New(draft("B"))),
            )
            .await
            .unwrap();
        let quote = fx.repos.quotes.get(id).await.unwrap();

        fx.store.fail_lookups("books", "id", quote.book_id).await;
        assert!(fx.repos.quotes.get_with_author_and_book(id).await.is_err());
    }

    #[tokio::test]
    async fn test_latest_is_newest_first_and_tolerates_failures() {
        let fx = fixture();
        let store = &fx.store;
        store.insert("authors", json!({"name": "A1"})).await.unwrap();
        store.insert("authors", json!({"name": "A2"})).await.unwrap();
        store
            .insert(
                "books",
                json!({
                    "title": "B1",
                    "publish_year": 1990,
                    "calendar_time": "A.D.",
                    "isbn": "1234567890123"
                }),
            )
            .await
            .unwrap();
        for (day, author_id) in [(1, 1), (3, 2), (2, 1)] {
            store
                .insert(
                    "quotes",
                    json!({
                        "quote": format!("day {day}"),
                        "author_id": author_id,
                        "book_id": 1,
                        "created_at": format!("2024-05-0{day}T08:00:00Z"),
                    }),
                )
                .await
                .unwrap();
        }
        store.fail_lookups("authors", "id", 2).await;

        let latest = fx.repos.quotes.latest().await.unwrap();
        let texts: Vec<&str> = latest.iter().map(|q| q.quote.as_str()).collect();
        assert_eq!(texts, vec!["day 3", "day 2", "day 1"]);

        // the failed author only downgrades its own quote
        assert!(latest[0].author.is_none());
        assert!(latest[0].book.is_some());
        assert_eq!(latest[1].author.as_ref().map(|a| a.name.as_str()), Some("A1"));
        assert_eq!(latest[2].author.as_ref().map(|a| a.name.as_str()), Some("A1"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let fx = fixture();
        let owner = fx.user("Ada Lovelace").await;
        let id = fx
            .repos
            .quotes
            .insert(
                owner,
                &submission(AuthorRef::New("Mark Twain".into()), BookRef::New(draft("B"))),
            )
            .await
            .unwrap();
        let before = fx.repos.quotes.get(id).await.unwrap();

        let mut changed = submission(
            AuthorRef::New("Samuel Clemens".into()),
            BookRef::Existing(before.book_id),
        );
        changed.is_private = true;
        assert_eq!(fx.repos.quotes.update(id, owner, &changed).await.unwrap(), id);

        let after = fx.repos.quotes.get(id).await.unwrap();
        assert!(after.is_private);
        assert_ne!(after.author_id, before.author_id);

        let existing = submission(
            AuthorRef::Existing(after.author_id),
            BookRef::Existing(after.book_id),
        );
        assert!(matches!(
            fx.repos.quotes.update(404, owner, &existing).await,
            Err(AppError::NotFound { .. })
        ));

        fx.repos.quotes.delete(id).await.unwrap();
        assert!(!fx.repos.quotes.exists(id).await.unwrap());
    }
}
