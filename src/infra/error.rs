use std::net::SocketAddr;

use thiserror::Error;

/// Failures raised while wiring the service together at startup.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind http listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog database unavailable: {message}")]
    Database { message: String },
    #[error("catalog migrations failed: {message}")]
    Migration { message: String },
    #[error("tracing subscriber could not be installed: {0}")]
    Telemetry(String),
    #[error("bookshelf is misconfigured: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
