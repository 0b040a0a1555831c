use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::PageRequest,
    application::repos::{BookSearchFilter, BooksRepo, Counted, RepoError},
    domain::entities::{AuthorRecord, BookRecord, CommentRecord},
};

use super::{
    BOOK_COLUMNS, PostgresRepositories, authors::AuthorRow, comments::CommentRow, map_sqlx_error,
};

#[derive(sqlx::FromRow)]
pub(super) struct BookRow {
    id: Uuid,
    title: String,
    description: String,
    cover: Option<String>,
    pages: Option<i32>,
    genre: Option<String>,
    publication_year: Option<i32>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl BookRow {
    pub(super) fn into_record(
        self,
        authors: Vec<AuthorRecord>,
        comments: Vec<CommentRecord>,
    ) -> BookRecord {
        BookRecord {
            id: self.id,
            title: self.title,
            description: self.description,
            cover: self.cover,
            pages: self.pages,
            genre: self.genre,
            publication_year: self.publication_year,
            created_at: self.created_at,
            updated_at: self.updated_at,
            authors,
            comments,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookAuthorRow {
    book_id: Uuid,
    #[sqlx(flatten)]
    author: AuthorRow,
}

impl PostgresRepositories {
    async fn fetch_book_page(
        &self,
        filter: Option<&BookSearchFilter>,
        page: PageRequest,
    ) -> Result<Counted<BookRecord>, RepoError> {
        let mut count_qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books b WHERE b.deleted_at IS NULL");
        if let Some(filter) = filter {
            Self::apply_search_filter(&mut count_qb, filter);
        }
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(BOOK_COLUMNS);
        qb.push(" FROM books b WHERE b.deleted_at IS NULL");
        if let Some(filter) = filter {
            Self::apply_search_filter(&mut qb, filter);
        }
        qb.push(" ORDER BY b.title ASC, b.id ASC LIMIT ");
        qb.push_bind(i64::from(page.limit()));
        qb.push(" OFFSET ");
        qb.push_bind(page.offset() as i64);

        let rows: Vec<BookRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Counted {
            items: self.attach_relations(rows).await?,
            total: Self::convert_count(total)?,
        })
    }

    /// Loads authors and comments for a page of books in two queries.
    pub(super) async fn attach_relations(
        &self,
        rows: Vec<BookRow>,
    ) -> Result<Vec<BookRecord>, RepoError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

        let author_rows = sqlx::query_as::<_, BookAuthorRow>(
            r#"
            SELECT ba.book_id, u.id, u.first_name, u.last_name, u.email, u.role,
                   u.created_at, u.updated_at
            FROM book_authors ba
            INNER JOIN users u ON u.id = ba.user_id
            WHERE ba.book_id = ANY($1) AND u.deleted_at IS NULL
            ORDER BY u.last_name, u.first_name, u.id
            "#,
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let comment_rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, book_id, content, rating, created_at, updated_at
            FROM comments
            WHERE book_id = ANY($1) AND deleted_at IS NULL
            ORDER BY created_at, id
            "#,
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut authors: HashMap<Uuid, Vec<AuthorRecord>> = HashMap::new();
        for row in author_rows {
            authors
                .entry(row.book_id)
                .or_default()
                .push(AuthorRecord::from(row.author));
        }

        let mut comments: HashMap<Uuid, Vec<CommentRecord>> = HashMap::new();
        for row in comment_rows {
            let comment = CommentRecord::try_from(row)?;
            comments.entry(comment.book_id).or_default().push(comment);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                row.into_record(
                    authors.remove(&id).unwrap_or_default(),
                    comments.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }
}

#[async_trait]
impl BooksRepo for PostgresRepositories {
    async fn search_books(
        &self,
        filter: &BookSearchFilter,
        page: PageRequest,
    ) -> Result<Counted<BookRecord>, RepoError> {
        self.fetch_book_page(Some(filter), page).await
    }

    async fn list_books(&self, page: PageRequest) -> Result<Counted<BookRecord>, RepoError> {
        self.fetch_book_page(None, page).await
    }

    async fn find_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(BOOK_COLUMNS);
        qb.push(" FROM books b WHERE b.deleted_at IS NULL AND b.id = ");
        qb.push_bind(id);

        let row: Option<BookRow> = qb
            .build_query_as()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Ok(self.attach_relations(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }
}
