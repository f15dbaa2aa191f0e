//! Entity models
//!
//! Row types decoded from the remote store, plus the typed payloads used
//! for every write. Each entity module exports its table name.

pub mod author;
pub mod book;
pub mod quote;
pub mod user;

pub use author::{Author, AuthorChanges, AuthorWithCounts, NewAuthor};
pub use book::{Book, BookChanges, CalendarEra, NewBook};
pub use quote::{NewQuote, Quote, QuoteChanges};
pub use user::{
    profile_slug, LastLoginStamp, LastQuoteStamp, NewUser, PasswordChange, User, UserChanges,
};
