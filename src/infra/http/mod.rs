pub mod graphql;
mod middleware;
pub mod rate_limit;

pub use graphql::{BookshelfSchema, build_schema};
pub use middleware::{ClientIdentity, ClientIdentityPolicy, RequestContext};
pub use rate_limit::{RateDecision, RateLimiter, RateRule};

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

use self::middleware::{log_responses, resolve_client, set_request_context};

/// Liveness probe for the backing database.
#[async_trait]
pub trait DatabaseHealth: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}

#[async_trait]
impl DatabaseHealth for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}

#[derive(Clone)]
pub struct HttpState {
    pub schema: BookshelfSchema,
    pub health: Arc<dyn DatabaseHealth>,
    pub graphiql: bool,
    pub client_policy: ClientIdentityPolicy,
}

pub fn build_router(state: HttpState) -> Router {
    let policy = state.client_policy;

    Router::new()
        .route(
            graphql::GRAPHQL_PATH,
            get(graphql::graphiql).post(graphql::graphql_handler),
        )
        .route("/health", get(health))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn_with_state(policy, resolve_client))
        .layer(axum_middleware::from_fn(set_request_context))
        .with_state(state)
}

async fn health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
