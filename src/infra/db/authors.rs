use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::PageRequest,
    application::repos::{AuthorsRepo, Counted, RepoError},
    domain::entities::{AuthorRecord, AuthorWithBooks},
    domain::types::Role,
};

use super::{BOOK_COLUMNS, PostgresRepositories, books::BookRow, map_sqlx_error};

/// Only users linked to at least one live book count as authors.
const AUTHOR_SCOPE: &str = "u.deleted_at IS NULL AND EXISTS (SELECT 1 FROM book_authors ba \
    INNER JOIN books b ON b.id = ba.book_id \
    WHERE ba.user_id = u.id AND b.deleted_at IS NULL)";

#[derive(sqlx::FromRow)]
pub(super) struct AuthorRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    role: Role,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<AuthorRow> for AuthorRecord {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl AuthorsRepo for PostgresRepositories {
    async fn list_authors(&self, page: PageRequest) -> Result<Counted<AuthorRecord>, RepoError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u WHERE ");
        count_qb.push(AUTHOR_SCOPE);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT u.id, u.first_name, u.last_name, u.email, u.role, u.created_at, u.updated_at \
             FROM users u WHERE ",
        );
        qb.push(AUTHOR_SCOPE);
        qb.push(" ORDER BY u.last_name ASC, u.first_name ASC, u.id ASC LIMIT ");
        qb.push_bind(i64::from(page.limit()));
        qb.push(" OFFSET ");
        qb.push_bind(page.offset() as i64);

        let rows: Vec<AuthorRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Counted {
            items: rows.into_iter().map(AuthorRecord::from).collect(),
            total: Self::convert_count(total)?,
        })
    }

    async fn find_author(&self, id: Uuid) -> Result<Option<AuthorWithBooks>, RepoError> {
        let row = sqlx::query_as::<_, AuthorRow>(
            r#"
            SELECT u.id, u.first_name, u.last_name, u.email, u.role, u.created_at, u.updated_at
            FROM users u
            WHERE u.id = $1 AND u.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(BOOK_COLUMNS);
        qb.push(
            " FROM books b INNER JOIN book_authors ba ON ba.book_id = b.id \
             WHERE b.deleted_at IS NULL AND ba.user_id = ",
        );
        qb.push_bind(id);
        qb.push(" ORDER BY b.title ASC, b.id ASC");

        let books: Vec<BookRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Some(AuthorWithBooks {
            author: AuthorRecord::from(row),
            books: books
                .into_iter()
                .map(|book| book.into_record(Vec::new(), Vec::new()))
                .collect(),
        }))
    }
}
