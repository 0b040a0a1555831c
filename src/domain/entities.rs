//! Domain entities mirrored from persistent storage.
//!
//! Records are also the payload of the search cache, so every record
//! round-trips through serde.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{Rating, Role};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub book_id: Uuid,
    pub content: String,
    pub rating: Rating,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A book together with its eagerly loaded relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub cover: Option<String>,
    pub pages: Option<i32>,
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub authors: Vec<AuthorRecord>,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

/// An author with the books they wrote; relations of those books are not loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorWithBooks {
    pub author: AuthorRecord,
    pub books: Vec<BookRecord>,
}
