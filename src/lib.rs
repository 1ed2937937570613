use axum::{Router, extract::FromRef, routing::get};
use std::sync::Arc;
use tower_http::services::ServeDir;

// --- Module Structure ---

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod templates;

// --- Public Re-exports ---

// Makes the core state types easily accessible to the entry point and tests.
pub use config::AppConfig;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use templates::{TemplateCache, new_template_cache};

/// AppState
///
/// The single, thread-safe container holding all application dependencies:
/// the persistence handle, the template cache, and the loaded configuration.
/// Constructed once at startup, immutable afterward, and shared across all
/// in-flight requests — no handler reaches for ambient globals.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer, behind the repository trait object.
    pub repo: RepositoryState,
    /// Page-name -> render-ready bundle map, built before the server starts.
    pub templates: Arc<TemplateCache>,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

// FromRef impls let handlers pull individual components out of the shared state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for Arc<TemplateCache> {
    fn from_ref(app_state: &AppState) -> Arc<TemplateCache> {
        app_state.templates.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the application's routing table, mounts the static file service,
/// registers the shared state, and wraps the result in the standard
/// middleware chain. Unmatched paths fall through to the 404 handler.
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        // GET /
        .route("/", get(handlers::home))
        // GET /snippet?id=<n>
        .route("/snippet", get(handlers::show_snippet))
        // GET renders the form, POST validates and persists.
        .route(
            "/snippet/create",
            get(handlers::create_snippet_form).post(handlers::create_snippet),
        )
        // Static assets, served with the /static prefix stripped.
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .fallback(handlers::not_found)
        .with_state(state);

    middleware::wrap(router)
}
