//! Form validation
//!
//! A [`Validator`] collects the errors of a single form submission. It is
//! created per submission, handed to the entity checks by `&mut`, and read
//! back by the caller once every check has run. Checks never short-circuit,
//! so a submission reports all of its violations at once.

mod book;
mod quote;
mod user;

pub use book::{validate_book, BookDraft, BookForm};
pub use quote::{
    validate_author_name, validate_quote_text, AuthorForm, AuthorRef, BookRef, QuoteForm,
    QuoteSubmission,
};
pub use user::{
    validate_email, validate_name, validate_password, validate_phone, ChangePasswordForm,
    LoginForm, ProfileForm, SignupForm,
};

use crate::errors::{AppError, Result};
use regex_lite::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

/// Characters rejected in every free-text field
pub const INVALID_CHARACTERS: [char; 11] = ['[', ']', '{', '}', '\\', '|', '/', '+', '<', '>', '~'];

/// Error collector for one form submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validator {
    field_errors: BTreeMap<String, String>,
    non_field_errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff no field error and no non-field error was recorded
    pub fn is_valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    /// Record `message` under `key` unless the field already failed.
    pub fn add_field_error(&mut self, key: &str, message: &str) {
        self.field_errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    /// Record `message` under `key` when `ok` is false
    pub fn check_field(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_field_error(key, message);
        }
    }

    /// Append a form-level error. These are never deduplicated.
    pub fn add_non_field_error(&mut self, message: &str) {
        self.non_field_errors.push(message.to_string());
    }

    pub fn field_error(&self, key: &str) -> Option<&str> {
        self.field_errors.get(key).map(String::as_str)
    }

    pub fn field_errors(&self) -> &BTreeMap<String, String> {
        &self.field_errors
    }

    pub fn non_field_errors(&self) -> &[String] {
        &self.non_field_errors
    }

    pub fn into_parts(self) -> (BTreeMap<String, String>, Vec<String>) {
        (self.field_errors, self.non_field_errors)
    }

    /// `Ok(())` when valid, otherwise the collected errors as [`AppError::ValidationFailed`]
    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(AppError::ValidationFailed(self))
        }
    }
}

/// Returns true if a value is not empty after trimming whitespace
pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Returns true if a value has at least `n` characters
pub fn min_chars(value: &str, n: usize) -> bool {
    value.chars().count() >= n
}

/// Returns true if a value has no more than `n` characters
pub fn max_chars(value: &str, n: usize) -> bool {
    value.chars().count() <= n
}

/// Returns true if `value` is one of `permitted`
pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

/// Returns true if `min <= value <= max`
pub fn permitted_int(value: i64, min: i64, max: i64) -> bool {
    (min..=max).contains(&value)
}

/// Returns true if a slice contains no duplicate values
pub fn unique_values<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v))
}

/// Returns true if a value contains none of [`INVALID_CHARACTERS`]
pub fn no_invalid_characters(value: &str) -> bool {
    !value.chars().any(|c| INVALID_CHARACTERS.contains(&c))
}

/// Returns true if a value matches the regular expression
pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}
