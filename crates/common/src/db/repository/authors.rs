//! Author repository

use super::{exists, fetch_all, fetch_one, row_id, to_row, Store};
use crate::db::models::{author, book, quote, Author, AuthorChanges, AuthorWithCounts, NewAuthor};
use crate::errors::{AppError, Result};
use crate::store::{eq, Select, StoreError};
use crate::validation::{validate_author_name, Validator};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

/// Columns of a quote needed for counting
#[derive(Debug, Deserialize)]
struct QuoteLink {
    author_id: i64,
    book_id: i64,
}

#[derive(Debug, Deserialize)]
struct BookKey {
    id: i64,
}

#[derive(Debug, Default)]
struct Tally {
    quotes: u64,
    books: HashSet<i64>,
}

fn duplicate_name(err: StoreError, name: &str) -> AppError {
    if err.violates(author::NAME_CONSTRAINT) {
        AppError::DuplicateName {
            name: name.to_string(),
        }
    } else {
        err.into()
    }
}

#[derive(Clone)]
pub struct AuthorRepository {
    store: Store,
}

impl AuthorRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn check_name(name: &str) -> Result<()> {
        let mut v = Validator::new();
        validate_author_name(&mut v, "name", name);
        v.into_result()
    }

    /// Insert an author owned by `owner`, returning the new id
    pub async fn insert(&self, owner: Uuid, name: &str) -> Result<i64> {
        Self::check_name(name)?;

        let row = to_row(&NewAuthor { name, user_id: owner })?;
        let stored = self
            .store
            .insert(author::TABLE, row)
            .await
            .map_err(|e| duplicate_name(e, name))?;

        let id = row_id(&stored, author::TABLE)?;
        info!(author_id = id, user_id = %owner, "Author created");
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Author> {
        fetch_one(&self.store, &Select::from(author::TABLE).eq("id", id), "author", id).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Author> {
        fetch_one(&self.store, &Select::from(author::TABLE).eq("name", name), "author", name).await
    }

    pub async fn get_all(&self) -> Result<Vec<Author>> {
        fetch_all(&self.store, &Select::from(author::TABLE)).await
    }

    /// Every author with its quote count and distinct book count.
    ///
    /// The three tables are read concurrently and aggregated here. Authors
    /// without quotes are reported with zero counts. A quote pointing at a
    /// book that no longer exists still counts as a quote, but not as a book.
    pub async fn get_all_with_counts(&self) -> Result<Vec<AuthorWithCounts>> {
        let authors_q = Select::from(author::TABLE);
        let books_q = Select::from(book::TABLE).columns(&["id"]);
        let quotes_q = Select::from(quote::TABLE).columns(&["author_id", "book_id"]);

        let (authors, books, quotes) = futures::try_join!(
            fetch_all::<Author>(&self.store, &authors_q),
            fetch_all::<BookKey>(&self.store, &books_q),
            fetch_all::<QuoteLink>(&self.store, &quotes_q),
        )?;
        debug!(
            authors = authors.len(),
            books = books.len(),
            quotes = quotes.len(),
            "Counting quotes per author"
        );

        let known_books: HashSet<i64> = books.into_iter().map(|b| b.id).collect();
        let mut tallies: HashMap<i64, Tally> = HashMap::new();
        for q in quotes {
            let tally = tallies.entry(q.author_id).or_default();
            tally.quotes += 1;
            if known_books.contains(&q.book_id) {
                tally.books.insert(q.book_id);
            }
        }

        Ok(authors
            .into_iter()
            .map(|author| {
                let (quote_count, book_count) = tallies
                    .get(&author.id)
                    .map(|t| (t.quotes, t.books.len() as u64))
                    .unwrap_or((0, 0));
                AuthorWithCounts {
                    author,
                    quote_count,
                    book_count,
                }
            })
            .collect())
    }

    /// One author with its counts, following the same rules as
    /// [`get_all_with_counts`](Self::get_all_with_counts)
    pub async fn get_with_counts(&self, id: i64) -> Result<AuthorWithCounts> {
        let author = self.get(id).await?;
        let books_q = Select::from(book::TABLE).columns(&["id"]);
        let quotes_q = Select::from(quote::TABLE)
            .columns(&["author_id", "book_id"])
            .eq("author_id", id);

        let (known, links) = futures::try_join!(
            fetch_all::<BookKey>(&self.store, &books_q),
            fetch_all::<QuoteLink>(&self.store, &quotes_q),
        )?;

        let known: HashSet<i64> = known.into_iter().map(|b| b.id).collect();
        let books: HashSet<i64> = links
            .iter()
            .map(|l| l.book_id)
            .filter(|b| known.contains(b))
            .collect();
        Ok(AuthorWithCounts {
            author,
            quote_count: links.len() as u64,
            book_count: books.len() as u64,
        })
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        exists(&self.store, author::TABLE, id).await
    }

    pub async fn update(&self, id: i64, name: &str) -> Result<i64> {
        Self::check_name(name)?;

        let updated = self
            .store
            .update(author::TABLE, &[eq("id", id)], to_row(&AuthorChanges { name })?)
            .await
            .map_err(|e| duplicate_name(e, name))?;
        if updated.is_empty() {
            return Err(AppError::not_found("author", id));
        }

        info!(author_id = id, "Author updated");
        Ok(id)
    }

    /// Quotes referencing the author are left in place
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.store.delete(author::TABLE, &[eq("id", id)]).await?;
        info!(author_id = id, "Author deleted");
        Ok(())
    }
}
