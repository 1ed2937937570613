use snippet_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router, new_template_cache,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point, responsible for initializing configuration,
/// logging, the database pool, the template cache, and the HTTP server. Every
/// startup failure is fatal; the process never comes up partially configured.
#[tokio::main]
async fn main() {
    // Load .env settings before the configuration is read.
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // RUST_LOG takes priority, with sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "snippet_portal=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON output for ingestion by centralized log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("application starting in {:?} mode", config.env);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: failed to connect to Postgres, check DATABASE_URL");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // Built once, before the server accepts any request.
    let templates = Arc::new(
        new_template_cache(&config.template_dir).expect("FATAL: failed to build template cache"),
    );

    let state = AppState {
        repo,
        templates,
        config: config.clone(),
    };
    let app = create_router(state);

    let listener = TcpListener::bind(&config.addr)
        .await
        .expect("FATAL: failed to bind listen address");

    tracing::info!("listening on {}", config.addr);
    axum::serve(listener, app)
        .await
        .expect("FATAL: server terminated unexpectedly");
}
