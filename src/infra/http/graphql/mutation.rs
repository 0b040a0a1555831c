use std::sync::Arc;

use async_graphql::{Context, ID, Object, Result};

use crate::application::catalog::{CatalogService, CreateCommentCommand};

use super::error::to_graphql_error;
use super::guard::RateLimitGuard;
use super::parse_id;
use super::types::Comment;

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Adds a comment to a book; `rating` defaults to one star.
    #[graphql(guard = "RateLimitGuard::new(\"createComment\")")]
    async fn create_comment(
        &self,
        ctx: &Context<'_>,
        book_id: ID,
        content: String,
        rating: Option<i32>,
    ) -> Result<Comment> {
        let service = ctx.data::<Arc<CatalogService>>()?;
        let command = CreateCommentCommand {
            book_id: parse_id(&book_id)?,
            content,
            rating,
        };
        service
            .create_comment(command)
            .await
            .map(Comment::from)
            .map_err(to_graphql_error)
    }
}
