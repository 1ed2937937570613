use crate::models::Snippet;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// RepositoryError
///
/// Persistence failures as seen by the handlers. Handlers map `NotFound` to a
/// 404 and everything else to a 500; the underlying message is logged, never
/// echoed to the client.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("snippet not found")]
    NotFound,
    #[error("database query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// SnippetRepository
///
/// The abstract contract for snippet storage. Handlers only ever see this
/// trait, so the Postgres implementation can be swapped for the in-memory one
/// in tests.
///
/// `Send + Sync` and `async_trait` make the trait object (`Arc<dyn
/// SnippetRepository>`) shareable across Axum's task boundaries.
#[async_trait]
pub trait SnippetRepository: Send + Sync {
    /// Fetches one non-expired snippet by id.
    async fn get(&self, id: i64) -> Result<Snippet, RepositoryError>;

    /// Persists a new snippet expiring `expires_days` from now and returns its id.
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: i64,
    ) -> Result<i64, RepositoryError>;

    /// The ten most recently created non-expired snippets, newest first.
    async fn latest(&self) -> Result<Vec<Snippet>, RepositoryError>;
}

/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn SnippetRepository>;

// --- Postgres Implementation ---

/// PostgresRepository
///
/// The production implementation, backed by a PostgreSQL connection pool. The
/// pool handles concurrent access internally; nothing here holds locks.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnippetRepository for PostgresRepository {
    async fn get(&self, id: i64) -> Result<Snippet, RepositoryError> {
        // An expired snippet is indistinguishable from an absent one.
        sqlx::query_as::<_, Snippet>(
            "SELECT id, title, content, created, expires
             FROM snippets
             WHERE expires > now() AND id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: i64,
    ) -> Result<i64, RepositoryError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO snippets (title, content, created, expires)
             VALUES ($1, $2, now(), now() + make_interval(days => $3))
             RETURNING id",
        )
        .bind(title)
        .bind(content)
        .bind(expires_days as i32)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn latest(&self) -> Result<Vec<Snippet>, RepositoryError> {
        let snippets = sqlx::query_as::<_, Snippet>(
            "SELECT id, title, content, created, expires
             FROM snippets
             WHERE expires > now()
             ORDER BY created DESC
             LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(snippets)
    }
}

// --- In-Memory Implementation (For Tests) ---

/// MemoryRepository
///
/// An in-process implementation of `SnippetRepository` used by the test suite,
/// so the HTTP surface can be exercised without a running database. Ids are
/// assigned sequentially starting at 1, matching the Postgres sequence.
pub struct MemoryRepository {
    store: Mutex<MemoryStore>,
}

struct MemoryStore {
    next_id: i64,
    snippets: Vec<Snippet>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(MemoryStore {
                next_id: 1,
                snippets: Vec::new(),
            }),
        }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnippetRepository for MemoryRepository {
    async fn get(&self, id: i64) -> Result<Snippet, RepositoryError> {
        let store = self.store.lock().expect("snippet store lock poisoned");
        store
            .snippets
            .iter()
            .find(|snippet| snippet.id == id && snippet.expires > Utc::now())
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: i64,
    ) -> Result<i64, RepositoryError> {
        let mut store = self.store.lock().expect("snippet store lock poisoned");
        let id = store.next_id;
        store.next_id += 1;

        let created = Utc::now();
        store.snippets.push(Snippet {
            id,
            title: title.to_string(),
            content: content.to_string(),
            created,
            expires: created + Duration::days(expires_days),
        });
        Ok(id)
    }

    async fn latest(&self) -> Result<Vec<Snippet>, RepositoryError> {
        let store = self.store.lock().expect("snippet store lock poisoned");
        let mut latest: Vec<Snippet> = store
            .snippets
            .iter()
            .filter(|snippet| snippet.expires > Utc::now())
            .cloned()
            .collect();
        // Id as tiebreak: consecutive inserts can share a timestamp.
        latest.sort_by(|a, b| (b.created, b.id).cmp(&(a.created, a.id)));
        latest.truncate(10);
        Ok(latest)
    }
}
