use async_trait::async_trait;
use snippet_portal::{
    AppConfig, AppState, MemoryRepository, create_router, new_template_cache,
    models::Snippet,
    repository::{RepositoryError, RepositoryState, SnippetRepository},
};
use std::sync::Arc;
use tokio::net::TcpListener;

// --- Test Utilities ---

async fn spawn_app(repo: RepositoryState) -> String {
    let config = AppConfig::default();
    let templates = Arc::new(
        new_template_cache(&config.template_dir).expect("failed to build template cache"),
    );
    let state = AppState {
        repo,
        templates,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

/// Client that does not follow redirects, so 303 responses can be asserted.
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build client")
}

/// Repository double whose every operation fails, for the 500 paths.
struct FailingRepository;

#[async_trait]
impl SnippetRepository for FailingRepository {
    async fn get(&self, _id: i64) -> Result<Snippet, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn insert(
        &self,
        _title: &str,
        _content: &str,
        _expires_days: i64,
    ) -> Result<i64, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn latest(&self) -> Result<Vec<Snippet>, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
}

// --- Tests ---

#[tokio::test]
async fn home_lists_latest_snippets() {
    let repo = Arc::new(MemoryRepository::new());
    repo.insert("First snippet", "alpha body", 7).await.unwrap();
    repo.insert("Second snippet", "beta body", 7).await.unwrap();
    let address = spawn_app(repo).await;

    let response = client()
        .get(format!("{}/", address))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("Latest Snippets"));
    assert!(body.contains("First snippet"));
    assert!(body.contains("Second snippet"));
}

#[tokio::test]
async fn home_renders_with_no_snippets() {
    let address = spawn_app(Arc::new(MemoryRepository::new())).await;

    let response = client().get(format!("{}/", address)).send().await.unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("nothing to see here"));
}

#[tokio::test]
async fn show_snippet_renders_content() {
    let repo = Arc::new(MemoryRepository::new());
    let id = repo
        .insert("O snail", "Climb Mount Fuji,\nBut slowly, slowly!", 365)
        .await
        .unwrap();
    let address = spawn_app(repo).await;

    let response = client()
        .get(format!("{}/snippet?id={}", address, id))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("O snail"));
    assert!(body.contains("Climb Mount Fuji"));
}

#[tokio::test]
async fn unusable_snippet_ids_are_not_found() {
    let repo = Arc::new(MemoryRepository::new());
    repo.insert("Only one", "body", 7).await.unwrap();
    let address = spawn_app(repo).await;

    // Missing, zero, negative, garbage, and absent ids are all the same: 404.
    for path in [
        "/snippet",
        "/snippet?id=0",
        "/snippet?id=-3",
        "/snippet?id=abc",
        "/snippet?id=99",
    ] {
        let response = client()
            .get(format!("{}{}", address, path))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404, "expected 404 for {}", path);
    }
}

#[tokio::test]
async fn create_form_renders() {
    let address = spawn_app(Arc::new(MemoryRepository::new())).await;

    let response = client()
        .get(format!("{}/snippet/create", address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains(r#"<form action="/snippet/create" method="POST">"#));
    assert!(body.contains(r#"name="title""#));
    assert!(body.contains(r#"name="content""#));
}

#[tokio::test]
async fn created_snippet_is_reachable_via_the_redirect() {
    let address = spawn_app(Arc::new(MemoryRepository::new())).await;

    let response = client()
        .post(format!("{}/snippet/create", address))
        .form(&[
            ("title", "O snail"),
            ("content", "Climb Mount Fuji"),
            ("expires", "7"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 303);
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("redirect must carry a location")
        .to_string();
    assert!(location.starts_with("/snippet?id="));

    let shown = client()
        .get(format!("{}{}", address, location))
        .send()
        .await
        .unwrap();
    assert_eq!(shown.status(), 200);
    let body = shown.text().await.unwrap();
    assert!(body.contains("O snail"));
    assert!(body.contains("Climb Mount Fuji"));
}

#[tokio::test]
async fn blank_title_rerenders_the_form_and_persists_nothing() {
    let repo = Arc::new(MemoryRepository::new());
    let address = spawn_app(repo.clone()).await;

    let response = client()
        .post(format!("{}/snippet/create", address))
        .form(&[
            ("title", ""),
            ("content", "still here after a failed submit"),
            ("expires", "7"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 422);
    let body = response.text().await.unwrap();
    assert!(body.contains("This field cannot be blank"));
    // The submitted content is redisplayed for correction.
    assert!(body.contains("still here after a failed submit"));

    assert!(repo.latest().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let address = spawn_app(Arc::new(MemoryRepository::new())).await;

    let response = client()
        .get(format!("{}/snippet/archive", address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn static_assets_are_served_without_the_prefix() {
    let address = spawn_app(Arc::new(MemoryRepository::new())).await;

    let response = client()
        .get(format!("{}/static/css/main.css", address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/css"));
    assert!(response.text().await.unwrap().contains("font-family"));
}

#[tokio::test]
async fn repository_failure_is_a_generic_internal_error() {
    let address = spawn_app(Arc::new(FailingRepository)).await;

    let response = client().get(format!("{}/", address)).send().await.unwrap();

    assert_eq!(response.status(), 500);
    // No half-rendered page and no raw database error reaches the client.
    let body = response.text().await.unwrap();
    assert!(!body.contains("<html"));
    assert!(!body.contains("pool timed out"));
}

#[tokio::test]
async fn concurrent_reads_all_receive_complete_responses() {
    let repo = Arc::new(MemoryRepository::new());
    let id = repo
        .insert("Shared snippet", "read concurrently", 7)
        .await
        .unwrap();
    let address = spawn_app(repo).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let address = address.clone();
        handles.push(tokio::spawn(async move {
            let client = client();

            let home = client.get(format!("{}/", address)).send().await.unwrap();
            assert_eq!(home.status(), 200);
            let home_body = home.text().await.unwrap();
            assert!(home_body.contains("Shared snippet"));
            assert!(home_body.contains("</html>"));

            let shown = client
                .get(format!("{}/snippet?id={}", address, id))
                .send()
                .await
                .unwrap();
            assert_eq!(shown.status(), 200);
            let shown_body = shown.text().await.unwrap();
            assert!(shown_body.contains("read concurrently"));
            assert!(shown_body.contains("</html>"));
        }));
    }

    for handle in handles {
        handle.await.expect("concurrent request task failed");
    }
}
