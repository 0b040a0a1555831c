//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::domain::entities::{AuthorRecord, AuthorWithBooks, BookRecord, CommentRecord};
use crate::domain::types::Rating;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Normalized search criteria handed to the books repository.
///
/// `query` is matched as a substring; an empty string matches every book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookSearchFilter {
    pub query: String,
    pub genre: Option<String>,
    pub publication_year: Option<YearRange>,
}

/// Inclusive publication year bounds, passed through unchanged even when reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    /// Only a two-element list describes a range; anything else means no year filter.
    pub fn from_slice(years: &[i32]) -> Option<Self> {
        match years {
            [start, end] => Some(Self {
                start: *start,
                end: *end,
            }),
            _ => None,
        }
    }
}

/// One page of rows plus the number of rows matching without pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct Counted<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub book_id: Uuid,
    pub content: String,
    pub rating: Rating,
}

#[async_trait]
pub trait BooksRepo: Send + Sync {
    /// Books matching `filter` ordered by title then id, with authors and comments loaded.
    async fn search_books(
        &self,
        filter: &BookSearchFilter,
        page: PageRequest,
    ) -> Result<Counted<BookRecord>, RepoError>;

    async fn list_books(&self, page: PageRequest) -> Result<Counted<BookRecord>, RepoError>;

    async fn find_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError>;
}

#[async_trait]
pub trait AuthorsRepo: Send + Sync {
    async fn list_authors(&self, page: PageRequest) -> Result<Counted<AuthorRecord>, RepoError>;

    async fn find_author(&self, id: Uuid) -> Result<Option<AuthorWithBooks>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError>;
}
