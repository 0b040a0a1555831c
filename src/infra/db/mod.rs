//! Postgres-backed repository implementations.

mod authors;
mod books;
mod comments;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{BookSearchFilter, RepoError};

const BOOK_COLUMNS: &str = "b.id, b.title, b.description, b.cover, b.pages, b.genre, \
    b.publication_year, b.created_at, b.updated_at";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Appends the search predicates; the caller has already opened a `WHERE` clause.
    ///
    /// The query text is bound as `%query%` for every column, so LIKE
    /// wildcards supplied by the client keep their meaning.
    fn apply_search_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &BookSearchFilter) {
        let pattern = format!("%{}%", filter.query);

        qb.push(" AND (b.title ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR b.description ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR b.genre ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(
            " OR EXISTS (SELECT 1 FROM book_authors ba \
             INNER JOIN users u ON u.id = ba.user_id \
             WHERE ba.book_id = b.id AND u.deleted_at IS NULL AND (u.first_name ILIKE ",
        );
        qb.push_bind(pattern.clone());
        qb.push(" OR u.last_name ILIKE ");
        qb.push_bind(pattern);
        qb.push(")))");

        if let Some(genre) = filter.genre.as_ref() {
            qb.push(" AND b.genre = ");
            qb.push_bind(genre.clone());
        }

        if let Some(range) = filter.publication_year {
            qb.push(" AND b.publication_year BETWEEN ");
            qb.push_bind(range.start);
            qb.push(" AND ");
            qb.push_bind(range.end);
        }
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
