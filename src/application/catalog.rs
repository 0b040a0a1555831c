//! Read access to books and authors, plus comment creation.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest, PaginationError, PaginationInput};
use crate::application::repos::{
    AuthorsRepo, BooksRepo, CommentsRepo, CreateCommentParams, RepoError,
};
use crate::domain::entities::{AuthorRecord, AuthorWithBooks, BookRecord, CommentRecord};
use crate::domain::error::DomainError;
use crate::domain::types::Rating;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateCommentCommand {
    pub book_id: Uuid,
    pub content: String,
    /// Defaults to one star.
    pub rating: Option<i32>,
}

pub struct CatalogService {
    books: Arc<dyn BooksRepo>,
    authors: Arc<dyn AuthorsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CatalogService {
    pub fn new(
        books: Arc<dyn BooksRepo>,
        authors: Arc<dyn AuthorsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            books,
            authors,
            comments,
        }
    }

    pub async fn list_books(&self, input: PaginationInput) -> Result<Page<BookRecord>, CatalogError> {
        let page = PageRequest::from_input(input)?;
        let counted = self.books.list_books(page).await?;
        Ok(Page::new(counted.items, page, counted.total))
    }

    pub async fn find_book(&self, id: Uuid) -> Result<BookRecord, CatalogError> {
        self.books
            .find_book(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Book", id).into())
    }

    pub async fn list_authors(
        &self,
        input: PaginationInput,
    ) -> Result<Page<AuthorRecord>, CatalogError> {
        let page = PageRequest::from_input(input)?;
        let counted = self.authors.list_authors(page).await?;
        Ok(Page::new(counted.items, page, counted.total))
    }

    pub async fn find_author(&self, id: Uuid) -> Result<AuthorWithBooks, CatalogError> {
        self.authors
            .find_author(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Author", id).into())
    }

    #[instrument(skip(self, command), fields(book_id = %command.book_id))]
    pub async fn create_comment(
        &self,
        command: CreateCommentCommand,
    ) -> Result<CommentRecord, CatalogError> {
        let content = command.content.trim();
        if content.is_empty() {
            return Err(DomainError::validation("comment content must not be empty").into());
        }
        let rating = match command.rating {
            Some(value) => Rating::new(value)?,
            None => Rating::default(),
        };

        if self.books.find_book(command.book_id).await?.is_none() {
            return Err(DomainError::not_found("Book", command.book_id).into());
        }

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                book_id: command.book_id,
                content: content.to_string(),
                rating,
            })
            .await
            .map_err(|err| match err {
                // Book deleted between the lookup and the insert.
                RepoError::InvalidInput { .. } => {
                    CatalogError::from(DomainError::not_found("Book", command.book_id))
                }
                other => other.into(),
            })?;

        info!(comment_id = %comment.id, rating = rating.get(), "Comment created");
        Ok(comment)
    }
}
