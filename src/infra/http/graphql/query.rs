use std::sync::Arc;

use async_graphql::{Context, ID, Object, Result};

use crate::application::catalog::CatalogService;
use crate::application::search::SearchService;
use crate::infra::http::rate_limit::SEARCH_ENDPOINT;

use super::error::to_graphql_error;
use super::guard::RateLimitGuard;
use super::parse_id;
use super::types::{
    AuthorPage, AuthorProfile, Book, BookPage, PaginationArgs, SearchBooksInput,
    SearchBooksResult,
};

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Free-text book search with optional genre and publication-year filters.
    #[graphql(guard = "RateLimitGuard::new(SEARCH_ENDPOINT)")]
    async fn search(&self, ctx: &Context<'_>, input: SearchBooksInput) -> Result<SearchBooksResult> {
        let service = ctx.data::<Arc<SearchService>>()?;
        service
            .search(input.into())
            .await
            .map(SearchBooksResult::from)
            .map_err(to_graphql_error)
    }

    #[graphql(guard = "RateLimitGuard::new(\"books\")")]
    async fn books(
        &self,
        ctx: &Context<'_>,
        pagination: Option<PaginationArgs>,
    ) -> Result<BookPage> {
        let service = ctx.data::<Arc<CatalogService>>()?;
        service
            .list_books(pagination.into())
            .await
            .map(BookPage::from)
            .map_err(to_graphql_error)
    }

    #[graphql(guard = "RateLimitGuard::new(\"book\")")]
    async fn book(&self, ctx: &Context<'_>, id: ID) -> Result<Book> {
        let service = ctx.data::<Arc<CatalogService>>()?;
        service
            .find_book(parse_id(&id)?)
            .await
            .map(Book::from)
            .map_err(to_graphql_error)
    }

    #[graphql(guard = "RateLimitGuard::new(\"authors\")")]
    async fn authors(
        &self,
        ctx: &Context<'_>,
        pagination: Option<PaginationArgs>,
    ) -> Result<AuthorPage> {
        let service = ctx.data::<Arc<CatalogService>>()?;
        service
            .list_authors(pagination.into())
            .await
            .map(AuthorPage::from)
            .map_err(to_graphql_error)
    }

    #[graphql(guard = "RateLimitGuard::new(\"author\")")]
    async fn author(&self, ctx: &Context<'_>, id: ID) -> Result<AuthorProfile> {
        let service = ctx.data::<Arc<CatalogService>>()?;
        service
            .find_author(parse_id(&id)?)
            .await
            .map(AuthorProfile::from)
            .map_err(to_graphql_error)
    }
}
