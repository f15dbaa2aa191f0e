//! Book form checks

use super::{
    matches, max_chars, no_invalid_characters, not_blank, permitted_int, permitted_value, Validator,
};
use crate::db::models::CalendarEra;
use crate::errors::Result;
use regex_lite::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

static ISBN_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{13}$").expect("ISBN pattern compiles"));

pub const TITLE_MAX: usize = 200;
pub const SOURCE_MAX: usize = 500;
pub const PUBLISH_YEAR_MIN: i64 = 1;
pub const PUBLISH_YEAR_MAX: i64 = 3000;

/// Decoded book create/edit form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub publish_year: i64,
    #[serde(default)]
    pub calendar_time: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub source: String,
}

/// Book fields that passed validation, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub publish_year: i32,
    pub calendar_time: CalendarEra,
    pub isbn: String,
    pub source: String,
}

pub fn validate_book(
    v: &mut Validator,
    title: &str,
    publish_year: i64,
    calendar_time: &str,
    isbn: &str,
    source: &str,
) {
    validate_title(v, title);
    validate_publish_year(v, publish_year);
    validate_calendar_time(v, calendar_time);
    validate_isbn(v, isbn);
    validate_source(v, source);
}

fn validate_title(v: &mut Validator, title: &str) {
    v.check_field(not_blank(title), "title", "The title field cannot be blank");
    v.check_field(
        max_chars(title, TITLE_MAX),
        "title",
        "The title field cannot be more than 200 characters long",
    );
    v.check_field(
        no_invalid_characters(title),
        "title",
        "The title field contains invalid characters",
    );
}

fn validate_publish_year(v: &mut Validator, publish_year: i64) {
    v.check_field(
        permitted_int(publish_year, PUBLISH_YEAR_MIN, PUBLISH_YEAR_MAX),
        "publish_year",
        "This field must be between 1 and 3000",
    );
}

fn validate_calendar_time(v: &mut Validator, calendar_time: &str) {
    v.check_field(
        permitted_value(&calendar_time, &[CalendarEra::AD.as_str(), CalendarEra::BC.as_str()]),
        "calendar_time",
        "This field must be either A.D. or B.C.",
    );
}

fn validate_isbn(v: &mut Validator, isbn: &str) {
    v.check_field(not_blank(isbn), "isbn", "The ISBN field cannot be blank");
    v.check_field(matches(isbn, &ISBN_RX), "isbn", "This field must be a valid ISBN");
}

fn validate_source(v: &mut Validator, source: &str) {
    v.check_field(
        max_chars(source, SOURCE_MAX),
        "source",
        "The source field cannot be more than 500 characters long",
    );
    v.check_field(
        no_invalid_characters(source),
        "source",
        "The source field contains invalid characters",
    );
}

impl BookForm {
    pub fn validate(&self) -> Validator {
        let mut v = Validator::new();
        validate_book(
            &mut v,
            &self.title,
            self.publish_year,
            &self.calendar_time,
            &self.isbn,
            &self.source,
        );
        v
    }

    pub fn into_draft(self) -> Result<BookDraft> {
        self.validate().into_result()?;
        // both hold after validation
        let calendar_time = CalendarEra::parse(&self.calendar_time).unwrap_or_default();
        let publish_year = i32::try_from(self.publish_year).unwrap_or_default();
        Ok(BookDraft {
            title: self.title,
            publish_year,
            calendar_time,
            isbn: self.isbn,
            source: self.source,
        })
    }
}

impl BookDraft {
    pub fn validate_into(&self, v: &mut Validator) {
        validate_book(
            v,
            &self.title,
            i64::from(self.publish_year),
            self.calendar_time.as_str(),
            &self.isbn,
            &self.source,
        );
    }

    pub fn validate(&self) -> Validator {
        let mut v = Validator::new();
        self.validate_into(&mut v);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> BookForm {
        BookForm {
            title: "Life on the Mississippi".into(),
            publish_year: 1883,
            calendar_time: "A.D.".into(),
            isbn: "9780140390506".into(),
            source: "Penguin Classics".into(),
        }
    }

    #[test]
    fn test_valid_form_becomes_draft() {
        let draft = form().into_draft().unwrap();
        assert_eq!(draft.calendar_time, CalendarEra::AD);
        assert_eq!(draft.publish_year, 1883);
    }

    #[test]
    fn test_isbn_must_be_exactly_thirteen_digits() {
        for (isbn, ok) in [
            ("9780140390506", true),
            ("978014039050", false),
            ("97801403905067", false),
            ("978014039050X", false),
            ("978-014039050", false),
            ("٩٧٨٠١٤٠٣٩٠٥٠٦", false),
        ] {
            let mut f = form();
            f.isbn = isbn.into();
            assert_eq!(f.validate().field_error("isbn").is_none(), ok, "isbn {isbn}");
        }
    }

    #[test]
    fn test_length_boundaries() {
        let mut f = form();
        f.title = "t".repeat(200);
        f.source = "s".repeat(500);
        assert!(f.validate().is_valid());

        f.title = "t".repeat(201);
        f.source = "s".repeat(501);
        let v = f.validate();
        assert_eq!(
            v.field_error("title"),
            Some("The title field cannot be more than 200 characters long")
        );
        assert_eq!(
            v.field_error("source"),
            Some("The source field cannot be more than 500 characters long")
        );
    }

    #[test]
    fn test_year_and_era() {
        let mut f = form();
        f.publish_year = 0;
        f.calendar_time = "AD".into();
        let v = f.validate();
        assert!(v.field_error("publish_year").is_some());
        assert!(v.field_error("calendar_time").is_some());

        f.publish_year = 3000;
        f.calendar_time = "B.C.".into();
        assert!(f.validate().is_valid());

        f.publish_year = 3001;
        assert!(f.validate().field_error("publish_year").is_some());
    }

    #[test]
    fn test_all_checks_run_together() {
        let v = BookForm::default().validate();
        for key in ["title", "publish_year", "calendar_time", "isbn"] {
            assert!(v.field_error(key).is_some(), "{key} not reported");
        }
        assert_eq!(v.field_error("title"), Some("The title field cannot be blank"));
        // an empty source is allowed
        assert!(v.field_error("source").is_none());
    }
}
