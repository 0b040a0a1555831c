//! GraphQL schema for the catalog.
//!
//! Resolvers are thin: they convert GraphQL inputs, call the application
//! services, and map failures to errors carrying `extensions.code`. Every root
//! field passes through [`guard::RateLimitGuard`].
//!
//! ```graphql
//! query {
//!   search(input: { query: "tolkien", filters: { publicationYear: [1950, 1960] }, limit: 5 }) {
//!     books { title authors { lastName } }
//!     pagination { total lastPage hasNextPage }
//!     source
//!   }
//! }
//! ```

mod error;
mod guard;
mod mutation;
mod query;
pub mod types;

use std::sync::Arc;

use async_graphql::{EmptySubscription, ID, Schema, http::GraphiQLSource};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::{Extension, State},
    response::{Html, IntoResponse, Response},
};
use tracing::warn;
use uuid::Uuid;

use crate::application::catalog::CatalogService;
use crate::application::error::AppError;
use crate::application::search::SearchService;

use super::HttpState;
use super::middleware::{ClientIdentity, RequestContext};
use super::rate_limit::RateLimiter;

pub use error::to_graphql_error;
pub use guard::{RateLimitGuard, THROTTLED_CODE, THROTTLED_MESSAGE};
pub use mutation::MutationRoot;
pub use query::QueryRoot;

pub const GRAPHQL_PATH: &str = "/graphql";

pub type BookshelfSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(
    search: Arc<SearchService>,
    catalog: Arc<CatalogService>,
    limiter: RateLimiter,
) -> BookshelfSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(search)
        .data(catalog)
        .data(limiter)
        .finish()
}

pub(crate) fn parse_id(id: &ID) -> async_graphql::Result<Uuid> {
    Uuid::parse_str(id.as_str())
        .map_err(|_| to_graphql_error(AppError::validation(format!("invalid id `{}`", id.as_str()))))
}

pub async fn graphql_handler(
    State(state): State<HttpState>,
    Extension(client): Extension<ClientIdentity>,
    Extension(ctx): Extension<RequestContext>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let response = state.schema.execute(request.into_inner().data(client)).await;
    for err in &response.errors {
        warn!(
            target = "bookshelf::graphql",
            request_id = %ctx.request_id,
            path = ?err.path,
            message = %err.message,
            "operation returned an error",
        );
    }
    response.into()
}

pub async fn graphiql(State(state): State<HttpState>) -> Response {
    if !state.graphiql {
        return AppError::NotFound.into_response();
    }
    Html(GraphiQLSource::build().endpoint(GRAPHQL_PATH).finish()).into_response()
}
