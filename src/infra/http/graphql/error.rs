use async_graphql::ErrorExtensions;
use axum::http::StatusCode;
use tracing::error;

use crate::application::error::AppError;

/// Converts an application failure into a GraphQL error with `extensions.code`.
///
/// Client errors keep their message; server errors expose only the generic
/// presentation text and are logged here.
pub fn to_graphql_error(err: impl Into<AppError>) -> async_graphql::Error {
    let err = err.into();
    let status = err.status_code();
    let code = error_code(status);

    let message = if status.is_server_error() {
        error!(
            target = "bookshelf::graphql",
            status = status.as_u16(),
            error = %err,
            "resolver failed",
        );
        err.presentation_message().to_string()
    } else {
        err.to_string()
    };

    async_graphql::Error::new(message).extend_with(|_, extensions| extensions.set("code", code))
}

fn error_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BAD_USER_INPUT",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::TOO_MANY_REQUESTS => "TOO_MANY_REQUESTS",
        StatusCode::SERVICE_UNAVAILABLE => "SERVICE_UNAVAILABLE",
        _ => "INTERNAL_SERVER_ERROR",
    }
}
