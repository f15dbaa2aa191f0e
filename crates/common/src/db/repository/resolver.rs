//! Displayed author of a book
//!
//! A book row carries no author. The author shown for a book is the author
//! of the first quote the store returns for it, or [`Author::unknown`] when
//! the book has no quotes. The order is whatever the store returns, so two
//! reads can disagree if that order is not stable.

use super::{fetch_all, fetch_one, Store};
use crate::db::models::{author, quote, Author, Quote};
use crate::errors::Result;
use crate::store::Select;

/// Author id of the first quote, if any
pub fn first_quote_author(quotes: &[Quote]) -> Option<i64> {
    quotes.first().map(|q| q.author_id)
}

/// Fetch the quotes of `book_id` and resolve its displayed author
pub async fn book_author(store: &Store, book_id: i64) -> Result<Author> {
    let query = Select::from(quote::TABLE).eq("book_id", book_id);
    let quotes: Vec<Quote> = fetch_all(store, &query).await?;

    match first_quote_author(&quotes) {
        Some(author_id) => {
            fetch_one(
                store,
                &Select::from(author::TABLE).eq("id", author_id),
                "author",
                author_id,
            )
            .await
        }
        None => Ok(Author::unknown()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(id: i64, author_id: i64) -> Quote {
        Quote {
            id,
            quote: format!("quote {id}"),
            author_id,
            book_id: 1,
            user_id: None,
            page_number: String::new(),
            is_private: false,
            created_at: None,
            updated_at: None,
            author: None,
            book: None,
        }
    }

    #[test]
    fn test_first_quote_wins() {
        assert_eq!(first_quote_author(&[quote(1, 7), quote(2, 9)]), Some(7));
        assert_eq!(first_quote_author(&[quote(2, 9), quote(1, 7)]), Some(9));
        assert_eq!(first_quote_author(&[]), None);
    }
}
