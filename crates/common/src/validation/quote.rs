//! Quote and author form checks
//!
//! A quote submission names its author and book either through a selector
//! (the id of an existing row) or through inline "new" fields. An empty
//! selector means the inline fields are used.

use super::book::{validate_book, BookDraft};
use super::{max_chars, no_invalid_characters, not_blank, Validator};
use crate::db::models::CalendarEra;
use crate::errors::Result;
use serde::Deserialize;

pub const QUOTE_MAX: usize = 19_000;
pub const AUTHOR_NAME_MAX: usize = 100;

pub fn validate_quote_text(v: &mut Validator, quote: &str) {
    v.check_field(not_blank(quote), "quote", "The quote field cannot be blank.");
    v.check_field(
        max_chars(quote, QUOTE_MAX),
        "quote",
        "The quote field is too long (max. 19,000 characters).",
    );
    v.check_field(
        no_invalid_characters(quote),
        "quote",
        "The quote field contains invalid characters.",
    );
}

/// Checks an author name, reporting under `key`
pub fn validate_author_name(v: &mut Validator, key: &str, name: &str) {
    v.check_field(not_blank(name), key, "The author field cannot be blank.");
    v.check_field(
        max_chars(name, AUTHOR_NAME_MAX),
        key,
        "The author field is too long (max. 100 characters).",
    );
    v.check_field(
        no_invalid_characters(name),
        key,
        "The author field contains invalid characters.",
    );
}

/// Existing author or one to create before the quote is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorRef {
    Existing(i64),
    New(String),
}

/// Existing book or one to create before the quote is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookRef {
    Existing(i64),
    New(BookDraft),
}

/// Decoded author create/edit form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorForm {
    #[serde(default)]
    pub name: String,
}

impl AuthorForm {
    pub fn validate(&self) -> Validator {
        let mut v = Validator::new();
        validate_author_name(&mut v, "name", &self.name);
        v
    }
}

/// Decoded quote create/edit form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteForm {
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub author_selector: String,
    #[serde(default)]
    pub new_author_name: String,
    #[serde(default)]
    pub book_selector: String,
    #[serde(default)]
    pub new_book_title: String,
    #[serde(default)]
    pub new_book_publish_year: i64,
    #[serde(default)]
    pub new_book_calendar_time: String,
    #[serde(default)]
    pub new_book_isbn: String,
    #[serde(default)]
    pub new_book_source: String,
    #[serde(default)]
    pub page_number: String,
    #[serde(default)]
    pub is_private: bool,
}

/// Validated quote payload handed to the quote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSubmission {
    pub quote: String,
    pub author: AuthorRef,
    pub book: BookRef,
    pub page_number: String,
    pub is_private: bool,
}

fn parse_selector(selector: &str) -> Option<Option<i64>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Some(None);
    }
    match selector.parse::<i64>() {
        Ok(id) if id > 0 => Some(Some(id)),
        _ => None,
    }
}

impl QuoteForm {
    /// Runs every check on the form, including the inline author/book
    /// fields when the matching selector is empty.
    pub fn validate(&self) -> Validator {
        let mut v = Validator::new();
        validate_quote_text(&mut v, &self.quote);

        match parse_selector(&self.author_selector) {
            Some(Some(_)) => {}
            Some(None) => validate_author_name(&mut v, "author", &self.new_author_name),
            None => v.add_field_error("author_selector", "Please choose a valid author."),
        }

        match parse_selector(&self.book_selector) {
            Some(Some(_)) => {}
            Some(None) => validate_book(
                &mut v,
                &self.new_book_title,
                self.new_book_publish_year,
                &self.new_book_calendar_time,
                &self.new_book_isbn,
                &self.new_book_source,
            ),
            None => v.add_field_error("book_selector", "Please choose a valid book."),
        }

        v
    }

    pub fn into_submission(self) -> Result<QuoteSubmission> {
        self.validate().into_result()?;

        let author = match parse_selector(&self.author_selector).flatten() {
            Some(id) => AuthorRef::Existing(id),
            None => AuthorRef::New(self.new_author_name),
        };

        let book = match parse_selector(&self.book_selector).flatten() {
            Some(id) => BookRef::Existing(id),
            None => BookRef::New(BookDraft {
                title: self.new_book_title,
                publish_year: i32::try_from(self.new_book_publish_year).unwrap_or_default(),
                calendar_time: CalendarEra::parse(&self.new_book_calendar_time).unwrap_or_default(),
                isbn: self.new_book_isbn,
                source: self.new_book_source,
            }),
        };

        Ok(QuoteSubmission {
            quote: self.quote,
            author,
            book,
            page_number: self.page_number,
            is_private: self.is_private,
        })
    }
}

impl QuoteSubmission {
    pub fn validate(&self) -> Validator {
        let mut v = Validator::new();
        validate_quote_text(&mut v, &self.quote);
        match &self.author {
            AuthorRef::Existing(id) => {
                v.check_field(*id > 0, "author_selector", "Please choose a valid author.")
            }
            AuthorRef::New(name) => validate_author_name(&mut v, "author", name),
        }
        match &self.book {
            BookRef::Existing(id) => {
                v.check_field(*id > 0, "book_selector", "Please choose a valid book.")
            }
            BookRef::New(draft) => draft.validate_into(&mut v),
        }
        v
    }
}
