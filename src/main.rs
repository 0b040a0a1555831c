use std::{net::SocketAddr, process, sync::Arc, time::Duration};

use bookshelf::{
    application::{
        catalog::CatalogService,
        error::AppError,
        repos::{AuthorsRepo, BooksRepo, CommentsRepo},
        search::SearchService,
    },
    cache::{self, CacheConfig, SearchCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ClientIdentityPolicy, HttpState, RateLimiter},
        telemetry,
    },
};
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::ClearCache(_) => run_clear_cache(settings).await,
    }
}

async fn run_clear_cache(settings: config::Settings) -> Result<(), AppError> {
    let cache = cache::connect(&CacheConfig::from(&settings.cache)).await;
    cache
        .clear()
        .await
        .map_err(|err| AppError::unexpected(format!("failed to clear search cache: {err}")))?;
    info!(target = "bookshelf::cache", "Search cache cleared");
    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_database(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;
    info!(target = "bookshelf::migrate", "Migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_database(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;
    let repositories = Arc::new(PostgresRepositories::new(pool));

    let cache_config = CacheConfig::from(&settings.cache);
    let search_cache = cache::connect(&cache_config).await;

    let books_repo: Arc<dyn BooksRepo> = repositories.clone();
    let authors_repo: Arc<dyn AuthorsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();

    let search = Arc::new(SearchService::new(
        books_repo.clone(),
        search_cache,
        cache_config.key_prefix.clone(),
    ));
    let catalog = Arc::new(CatalogService::new(books_repo, authors_repo, comments_repo));

    let limiter = RateLimiter::from_settings(&settings.rate_limit);
    let prune_handle = spawn_limiter_pruning(
        limiter.clone(),
        Duration::from_secs(u64::from(settings.rate_limit.window_seconds.get())),
    );

    let state = HttpState {
        schema: http::build_schema(search, catalog, limiter),
        health: repositories,
        graphiql: settings.server.graphiql,
        client_policy: ClientIdentityPolicy {
            trust_forwarded_for: settings.rate_limit.trust_forwarded_for,
        },
    };

    let result = serve_http(&settings, state).await;

    prune_handle.abort();
    let _ = prune_handle.await;

    result
}

async fn connect_database(settings: &config::Settings) -> Result<PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

fn spawn_limiter_pruning(limiter: RateLimiter, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.prune();
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(settings.server.addr, err)))?;

    info!(
        target = "bookshelf::http",
        addr = %settings.server.addr,
        graphiql = settings.server.graphiql,
        "Listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut server_rx = shutdown_rx.clone();
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = server_rx.wait_for(|stop| *stop).await;
    });

    let grace = settings.server.graceful_shutdown;
    let mut deadline_rx = shutdown_rx;
    let deadline = async move {
        let _ = deadline_rx.wait_for(|stop| *stop).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            info!(target = "bookshelf::http", "Server stopped");
        }
        _ = deadline => {
            warn!(
                target = "bookshelf::http",
                grace_seconds = grace.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "bookshelf::http", "Shutdown signal received");
}
