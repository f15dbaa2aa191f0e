//! Book entity

use super::Author;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const TABLE: &str = "books";

/// Calendar era of a publish year
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalendarEra {
    #[default]
    #[serde(rename = "A.D.")]
    AD,
    #[serde(rename = "B.C.")]
    BC,
}

impl CalendarEra {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarEra::AD => "A.D.",
            CalendarEra::BC => "B.C.",
        }
    }

    /// Parse the stored form. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "A.D." => Some(CalendarEra::AD),
            "B.C." => Some(CalendarEra::BC),
            _ => None,
        }
    }
}

impl fmt::Display for CalendarEra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,

    pub title: String,

    pub publish_year: i32,

    #[serde(default)]
    pub calendar_time: CalendarEra,

    /// 13 ASCII digits
    pub isbn: String,

    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub user_id: Option<Uuid>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Displayed author, derived from the book's quotes at read time.
    /// Never stored on the row.
    #[serde(default, skip_deserializing)]
    pub author: Option<Author>,
}

#[derive(Debug, Serialize)]
pub struct NewBook<'a> {
    pub title: &'a str,
    pub publish_year: i32,
    pub calendar_time: CalendarEra,
    pub isbn: &'a str,
    pub source: &'a str,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BookChanges<'a> {
    pub title: &'a str,
    pub publish_year: i32,
    pub calendar_time: CalendarEra,
    pub isbn: &'a str,
    pub source: &'a str,
    pub updated_at: DateTime<Utc>,
}
