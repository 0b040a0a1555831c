use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CommentsRepo, CreateCommentParams, RepoError},
    domain::entities::CommentRecord,
    domain::types::Rating,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(super) struct CommentRow {
    id: Uuid,
    book_id: Uuid,
    content: String,
    rating: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<CommentRow> for CommentRecord {
    type Error = RepoError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(row.rating).map_err(|err| RepoError::Integrity {
            message: format!("comment {}: {err}", row.id),
        })?;
        Ok(Self {
            id: row.id,
            book_id: row.book_id,
            content: row.content,
            rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (id, book_id, content, rating)
            VALUES ($1, $2, $3, $4)
            RETURNING id, book_id, content, rating, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.book_id)
        .bind(&params.content)
        .bind(params.rating.get())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        CommentRecord::try_from(row)
    }
}
