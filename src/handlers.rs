use crate::{
    AppState,
    models::SnippetForm,
    repository::RepositoryError,
};
use axum::{
    Form,
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tera::Context;

/// render_page
///
/// Resolves a page bundle from the template cache and renders it to an owned
/// buffer. Only a fully rendered page ever reaches the client; on any failure
/// the caller responds with a generic 500 instead of partial HTML. A missing
/// bundle is a startup-time contract violation, not a client error.
fn render_page(state: &AppState, name: &str, ctx: &Context) -> Result<Html<String>, StatusCode> {
    let Some(bundle) = state.templates.get(name) else {
        tracing::error!(page = name, "template bundle missing from the cache");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };

    match bundle.render(name, ctx) {
        Ok(body) => Ok(Html(body)),
        Err(err) => {
            tracing::error!(page = name, error = %err, "template render failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// --- Handlers ---

/// home
///
/// GET / - renders the listing of the latest snippets.
pub async fn home(State(state): State<AppState>) -> Result<Html<String>, StatusCode> {
    let snippets = state.repo.latest().await.map_err(|err| {
        tracing::error!(error = %err, "failed to load latest snippets");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut ctx = Context::new();
    ctx.insert("snippets", &snippets);
    render_page(&state, "home", &ctx)
}

/// ShowSnippetQuery
///
/// Accepted query parameters for the single-snippet view. The id stays a raw
/// string here; the handler owns the decision of what an unusable value means.
#[derive(Deserialize)]
pub struct ShowSnippetQuery {
    pub id: Option<String>,
}

/// show_snippet
///
/// GET /snippet?id=n - renders one snippet. A missing, non-numeric, or
/// non-positive id is answered 404 exactly like a genuinely absent snippet:
/// either way the resource does not exist.
pub async fn show_snippet(
    State(state): State<AppState>,
    Query(query): Query<ShowSnippetQuery>,
) -> Result<Html<String>, StatusCode> {
    let id = match query.id.as_deref().and_then(|raw| raw.parse::<i64>().ok()) {
        Some(id) if id >= 1 => id,
        _ => {
            tracing::info!(id = ?query.id, "snippet lookup with unusable id");
            return Err(StatusCode::NOT_FOUND);
        }
    };

    match state.repo.get(id).await {
        Ok(snippet) => {
            let mut ctx = Context::new();
            ctx.insert("snippet", &snippet);
            render_page(&state, "show", &ctx)
        }
        Err(RepositoryError::NotFound) => {
            tracing::info!(id, "snippet not found");
            Err(StatusCode::NOT_FOUND)
        }
        Err(err) => {
            tracing::error!(id, error = %err, "failed to load snippet");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// create_snippet_form
///
/// GET /snippet/create - renders an empty creation form.
pub async fn create_snippet_form(
    State(state): State<AppState>,
) -> Result<Html<String>, StatusCode> {
    let mut ctx = Context::new();
    ctx.insert("form", &SnippetForm::default());
    ctx.insert("errors", &BTreeMap::<&str, &str>::new());
    render_page(&state, "create", &ctx)
}

/// create_snippet
///
/// POST /snippet/create - validates and persists a new snippet. On validation
/// failure the form is re-rendered with the submitted values and the error
/// map, and nothing is persisted. On success the client is redirected with a
/// 303 to the new snippet's view, so a refresh cannot replay the POST.
pub async fn create_snippet(
    State(state): State<AppState>,
    Form(form): Form<SnippetForm>,
) -> Result<Response, StatusCode> {
    let errors = form.validate();
    if !errors.is_empty() {
        let mut ctx = Context::new();
        ctx.insert("form", &form);
        ctx.insert("errors", &errors);
        let page = render_page(&state, "create", &ctx)?;
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
    }

    match state
        .repo
        .insert(&form.title, &form.content, form.expires_days())
        .await
    {
        Ok(id) => Ok(Redirect::to(&format!("/snippet?id={id}")).into_response()),
        Err(err) => {
            tracing::error!(error = %err, "failed to insert snippet");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// not_found
///
/// Fallback for any request no route matched.
pub async fn not_found(uri: Uri) -> StatusCode {
    tracing::info!(%uri, "no route matched");
    StatusCode::NOT_FOUND
}
