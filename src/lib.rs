//! CMS Backend - library for app logic and testing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod media;
pub mod routes;
pub mod slug;
pub mod state;
pub mod store;
pub mod workflow;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use config::{AppConfig, MediaBackend};
use logging::config::LogSettings;
use media::MediaError;
use state::AppState;
use store::{EntityStore, MemoryStore, PgStore};

/// Files accepted in one blog request: the main image plus ten section images.
const MAX_FILES_PER_REQUEST: usize = 11;

/// Headroom for the text fields of a multipart body.
const FORM_OVERHEAD: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),

    #[error("media backend unavailable: {0}")]
    Media(#[from] MediaError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configure CORS from `ALLOWED_ORIGINS` / `FRONTEND_ORIGIN`.
/// Falls back to the local frontend dev server when none are configured.
pub fn configure_cors(origins: &[String]) -> CorsLayer {
    let mut allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        allowed = vec![
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ];
    }

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn api_routes() -> Router<AppState> {
    use routes::{
        auth, blog, categories, contact, health, project_categories, projects, sections, upload,
    };

    Router::new()
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/dashboard", get(auth::dashboard))
        // Categories
        .route("/api/categories", get(categories::list).post(categories::create))
        .route(
            "/api/categories/reorder",
            post(categories::reorder).put(categories::reorder),
        )
        .route(
            "/api/categories/{id}",
            get(categories::get)
                .put(categories::update)
                .delete(categories::delete),
        )
        // Sections
        .route("/api/sections", get(sections::list).post(sections::create))
        .route(
            "/api/sections/reorder",
            post(sections::reorder).put(sections::reorder),
        )
        .route(
            "/api/sections/{id}",
            get(sections::get)
                .put(sections::update)
                .delete(sections::delete),
        )
        .route("/api/sections/{id}/toggle", patch(sections::toggle))
        // Blog
        .route("/api/blog", get(blog::list).post(blog::create))
        .route("/api/blog/category-counts", get(blog::category_counts))
        .route("/api/blog/categories", post(blog::by_categories))
        .route(
            "/api/blog/slug/{slug}",
            get(blog::get_by_slug)
                .put(blog::update_by_slug)
                .delete(blog::delete_by_slug),
        )
        .route("/api/blog/category/{slug}", get(blog::by_category_slug))
        .route("/api/blog/category/id/{id}", get(blog::by_category_id))
        .route("/api/blog/section/{id}", get(blog::by_section))
        .route("/api/blog/{id}", put(blog::update).delete(blog::delete))
        // Projects
        .route("/api/projects", get(projects::list).post(projects::create))
        .route("/api/projects/category/{id}", get(projects::by_category))
        .route(
            "/api/projects/{id}",
            put(projects::update).delete(projects::delete),
        )
        .route(
            "/api/project-categories",
            get(project_categories::list).post(project_categories::create),
        )
        .route(
            "/api/project-categories/{id}",
            put(project_categories::update).delete(project_categories::delete),
        )
        // Contact
        .route("/api/contact/submit", post(contact::submit))
        .route("/api/contact/all", get(contact::list))
        .route("/api/contact/{id}", delete(contact::delete))
        // Uploads
        .route("/api/upload", post(upload::upload_image))
        .route("/api/upload/{filename}", delete(upload::delete_image))
        // Health
        .route("/health", get(health::health_ping))
        .route("/health/ready", get(health::health_ready))
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors(&state.config.allowed_origins);
    let body_limit = state.config.upload.max_file_size * MAX_FILES_PER_REQUEST + FORM_OVERHEAD;

    let mut router = api_routes();
    if let MediaBackend::Local { dir, public_prefix } = &state.config.media {
        let mount = match public_prefix.trim_end_matches('/') {
            p if p.starts_with('/') && p.len() > 1 => p.to_string(),
            _ => "/uploads".to_string(),
        };
        tracing::info!("Serving local media from {} at {}", dir.display(), mount);
        router = router.nest_service(&mount, ServeDir::new(dir));
    }

    router
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        // Multipart extraction has its own 2 MB default; both caps follow the upload config.
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}

/// Run the server (used by main).
pub async fn run() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();

    // Guards must outlive the server or buffered log lines are lost.
    let _log_guards = logging::init(&LogSettings::from_env());

    routes::health::init_start_time();

    let config = AppConfig::from_env();
    config.validate().map_err(StartupError::Config)?;

    let store: Arc<dyn EntityStore> = match &config.database {
        Some(db_config) => {
            let pool = db::init_pool(db_config).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set. Using the in-memory store; data is lost on restart.");
            Arc::new(MemoryStore::new())
        }
    };

    let media = media::build_relay(&config.media)?;
    tracing::info!("Media backend: {}", media.name());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| StartupError::Config(format!("invalid HOST/PORT: {e}")))?;

    let app = create_app(AppState::new(store, media, config));

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Category, DisplayStyle, Section, SectionType, Status};
    use crate::media::memory::MemoryRelay;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, 0x49, 0x48, 0x44, 0x52,
    ];
    const BOUNDARY: &str = "cms-test-boundary";

    struct TestApp {
        router: Router,
        state: AppState,
        relay: Arc<MemoryRelay>,
    }

    impl TestApp {
        fn new() -> Self {
            Self::with_relay(MemoryRelay::new())
        }

        fn with_relay(relay: MemoryRelay) -> Self {
            let relay = Arc::new(relay);
            let state = AppState::new(
                Arc::new(MemoryStore::new()),
                relay.clone(),
                AppConfig::for_tests(),
            );
            Self {
                router: create_app(state.clone()),
                state,
                relay,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let res = self.router.clone().oneshot(request).await.unwrap();
            let status = res.status();
            let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
                .await
                .unwrap();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, body)
        }

        async fn json(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Value,
        ) -> (StatusCode, Value) {
            let mut req = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json");
            if let Some(token) = token {
                req = req.header("authorization", format!("Bearer {token}"));
            }
            self.send(req.body(Body::from(body.to_string())).unwrap())
                .await
        }

        async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
            let mut req = Request::get(uri);
            if let Some(token) = token {
                req = req.header("authorization", format!("Bearer {token}"));
            }
            self.send(req.body(Body::empty()).unwrap()).await
        }

        async fn multipart(
            &self,
            method: Method,
            uri: &str,
            token: &str,
            fields: &[(&str, &str)],
            files: &[(&str, &str)],
        ) -> (StatusCode, Value) {
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .header("authorization", format!("Bearer {token}"))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(multipart_body(fields, files)))
                .unwrap();
            self.send(req).await
        }

        async fn register(&self, name: &str, email: &str) -> String {
            let (status, body) = self
                .json(
                    Method::POST,
                    "/api/auth/register",
                    None,
                    json!({ "name": name, "email": email, "password": "secret123" }),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            body["token"].as_str().unwrap().to_string()
        }

        async fn seed_category(&self, name: &str, order: i32) -> Category {
            let now = Utc::now();
            self.state
                .store
                .insert_category(&Category {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    slug: crate::slug::slugify(name),
                    description: None,
                    blog_count: 0,
                    status: Status::Published,
                    order,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap()
        }

        async fn seed_section(&self, title: &str, order: i32) -> Section {
            let now = Utc::now();
            self.state
                .store
                .insert_section(&Section {
                    id: Uuid::new_v4(),
                    title: title.to_string(),
                    description: None,
                    section_type: SectionType::Latest,
                    category: None,
                    limit: 6,
                    order,
                    is_active: true,
                    display_style: DisplayStyle::Grid,
                    custom_query: Default::default(),
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap()
        }

        /// Poll until the background cleanup has removed the object behind `url`.
        async fn wait_until_removed(&self, url: &str) -> bool {
            let path = url.trim_start_matches("memory://");
            for _ in 0..100 {
                if !self.relay.paths().iter().any(|p| p == path) {
                    return true;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            false
        }
    }

    fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, file_name) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(PNG);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn blog_fields<'a>(
        title: &'a str,
        category: &'a str,
        section: &'a str,
        sections: &'a str,
    ) -> Vec<(&'a str, &'a str)> {
        vec![
            ("title", title),
            ("description", "<p>Body</p>"),
            ("category", category),
            ("section", section),
            ("meta", r#"{"meta_title":"T","meta_description":"D"}"#),
            ("sections", sections),
            ("tags", r#"["rust"]"#),
            ("status", "published"),
        ]
    }

    #[tokio::test]
    async fn test_first_user_is_admin_and_dashboard_is_admin_only() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let author = app.register("Bob", "bob@example.com").await;

        let (status, body) = app.get("/api/dashboard", Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "admin");

        let (status, _) = app.get("/api/dashboard", Some(&author)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.get("/api/dashboard", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized - No token provided");

        let (status, body) = app
            .json(
                Method::POST,
                "/api/auth/register",
                None,
                json!({ "name": "Ada", "email": "ADA@example.com", "password": "secret123" }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "User already exists");
    }

    #[tokio::test]
    async fn test_login_returns_session() {
        let app = TestApp::new();
        app.register("Ada", "ada@example.com").await;

        let (status, body) = app
            .json(
                Method::POST,
                "/api/auth/login",
                None,
                json!({ "email": "ada@example.com", "password": "secret123" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["redirectTo"], "/dashboard");
        assert!(body["token"].as_str().is_some());

        let (status, _) = app
            .json(
                Method::POST,
                "/api/auth/login",
                None,
                json!({ "email": "ada@example.com", "password": "wrong-pass" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_category_name_conflicts() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;

        let (status, body) = app
            .json(Method::POST, "/api/categories", Some(&admin), json!({ "name": "Rust Tips" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["slug"], "rust-tips");

        let (status, _) = app
            .json(Method::POST, "/api/categories", Some(&admin), json!({ "name": "rust tips" }))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, list) = app.get("/api/categories", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blog_create_orders_sections_and_defaults_main_image() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let category = app.seed_category("News", 0).await;
        let section = app.seed_section("Home", 0).await;
        let (category_id, section_id) = (category.id.to_string(), section.id.to_string());

        let sections = r#"[{"section_title":"a","order":7},{"section_title":"b","order":3},{"section_title":"c"}]"#;
        let fields = blog_fields("Hello World", &category_id, &section_id, sections);
        let (status, body) = app
            .multipart(Method::POST, "/api/blog", &admin, &fields, &[])
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let blog = &body["blog"];
        assert_eq!(blog["slug"], "hello-world");
        assert_eq!(blog["mainImage"], "");
        let orders: Vec<i64> = blog["sections"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["order"].as_i64().unwrap())
            .collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(app.relay.len(), 0);
    }

    #[tokio::test]
    async fn test_blog_create_uploads_section_images_by_position() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let category = app.seed_category("News", 0).await;
        let section = app.seed_section("Home", 0).await;
        let (category_id, section_id) = (category.id.to_string(), section.id.to_string());

        let sections = r#"[{"section_title":"a"},{"section_title":"b","section_img":"https://old/b.png"}]"#;
        let fields = blog_fields("With Images", &category_id, &section_id, sections);
        let (status, body) = app
            .multipart(
                Method::POST,
                "/api/blog",
                &admin,
                &fields,
                &[("mainImage", "cover.png"), ("section_images", "first.png")],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let blog = &body["blog"];
        assert!(blog["mainImage"].as_str().unwrap().starts_with("memory://blog_images/"));
        assert!(blog["sections"][0]["section_img"]
            .as_str()
            .unwrap()
            .ends_with("__first.png"));
        assert_eq!(blog["sections"][1]["section_img"], "https://old/b.png");
        assert_eq!(app.relay.len(), 2);
    }

    #[tokio::test]
    async fn test_blog_create_rejects_unknown_category_without_uploading() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let section = app.seed_section("Home", 0).await;
        let (missing, section_id) = (Uuid::new_v4().to_string(), section.id.to_string());

        let fields = blog_fields("Orphan", &missing, &section_id, "[]");
        let (status, body) = app
            .multipart(Method::POST, "/api/blog", &admin, &fields, &[("mainImage", "cover.png")])
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid category ID");
        assert_eq!(app.relay.len(), 0);
    }

    #[tokio::test]
    async fn test_blog_create_reports_malformed_sections() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let category = app.seed_category("News", 0).await;
        let section = app.seed_section("Home", 0).await;
        let (category_id, section_id) = (category.id.to_string(), section.id.to_string());

        let fields = blog_fields("Broken", &category_id, &section_id, "{not json");
        let (status, body) = app
            .multipart(Method::POST, "/api/blog", &admin, &fields, &[])
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid sections format");
        assert_eq!(body["details"], "Sections must be a valid JSON array");
    }

    #[tokio::test]
    async fn test_concurrent_blogs_with_same_slug_one_conflicts() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let category = app.seed_category("News", 0).await;
        let section = app.seed_section("Home", 0).await;
        let (category_id, section_id) = (category.id.to_string(), section.id.to_string());

        let first = blog_fields("Same Title", &category_id, &section_id, "[]");
        let second = blog_fields("same title!", &category_id, &section_id, "[]");
        let (a, b) = tokio::join!(
            app.multipart(Method::POST, "/api/blog", &admin, &first, &[]),
            app.multipart(Method::POST, "/api/blog", &admin, &second, &[]),
        );

        let mut statuses = vec![a.0, b.0];
        statuses.sort();
        assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_no_blog() {
        let app = TestApp::with_relay(MemoryRelay::failing_on("broken"));
        let admin = app.register("Ada", "ada@example.com").await;
        let category = app.seed_category("News", 0).await;
        let section = app.seed_section("Home", 0).await;
        let (category_id, section_id) = (category.id.to_string(), section.id.to_string());

        let fields = blog_fields("Upload Fails", &category_id, &section_id, r#"[{}]"#);
        let (status, body) = app
            .multipart(
                Method::POST,
                "/api/blog",
                &admin,
                &fields,
                &[("mainImage", "ok.png"), ("section_images", "broken.png")],
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Error uploading image");

        let (_, blogs) = app.get("/api/blog", None).await;
        assert!(blogs.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_category_with_blogs_is_refused() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let category = app.seed_category("News", 0).await;
        let section = app.seed_section("Home", 0).await;
        let (category_id, section_id) = (category.id.to_string(), section.id.to_string());

        let fields = blog_fields("Keeper", &category_id, &section_id, "[]");
        let (status, _) = app
            .multipart(Method::POST, "/api/blog", &admin, &fields, &[])
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!("/api/categories/{category_id}");
        let (status, body) = app.json(Method::DELETE, &uri, Some(&admin), Value::Null).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Cannot delete category with existing blog posts");

        let (status, body) = app.get(&uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["blogCount"], 1);
        let (_, blogs) = app.get("/api/blog", None).await;
        assert_eq!(blogs.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reorder_is_all_or_nothing_for_categories_and_sections() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let first = app.seed_category("First", 0).await;
        let second = app.seed_category("Second", 1).await;
        let home = app.seed_section("Home", 0).await;
        let side = app.seed_section("Side", 1).await;

        let (status, _) = app
            .json(
                Method::PUT,
                "/api/categories/reorder",
                Some(&admin),
                json!({ "categories": [
                    { "id": first.id, "order": 5 },
                    { "id": Uuid::new_v4(), "order": 6 },
                ]}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let stored = app.state.store.get_category(first.id).await.unwrap().unwrap();
        assert_eq!(stored.order, 0);

        let (status, _) = app
            .json(
                Method::POST,
                "/api/sections/reorder",
                Some(&admin),
                json!({ "sections": [
                    { "id": home.id, "order": 9 },
                    { "id": side.id, "order": "soon" },
                ]}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let stored = app.state.store.get_section(home.id).await.unwrap().unwrap();
        assert_eq!(stored.order, 0);

        let (status, body) = app
            .json(
                Method::POST,
                "/api/categories/reorder",
                Some(&admin),
                json!({ "categories": [
                    { "id": first.id, "order": 2 },
                    { "_id": second.id, "order": "0" },
                ]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn test_sections_list_resolves_blogs_by_type() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let category = app.seed_category("News", 0).await;
        let section = app.seed_section("Home", 0).await;
        let (category_id, section_id) = (category.id.to_string(), section.id.to_string());

        let fields = blog_fields("Listed", &category_id, &section_id, "[]");
        app.multipart(Method::POST, "/api/blog", &admin, &fields, &[])
            .await;

        let (status, body) = app
            .json(
                Method::POST,
                "/api/sections",
                Some(&admin),
                json!({ "title": "By category", "type": "category" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Category is required for category type sections");

        let (status, _) = app
            .json(
                Method::POST,
                "/api/sections",
                Some(&admin),
                json!({ "title": "Featured", "type": "featured", "order": 1 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app.get("/api/sections", None).await;
        assert_eq!(status, StatusCode::OK);
        let sections = body.as_array().unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0]["title"], "Home");
        assert_eq!(sections[0]["blogs"].as_array().unwrap().len(), 1);
        assert!(sections[1]["blogs"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_and_delete_image() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;

        let (status, body) = app
            .multipart(Method::POST, "/api/upload", &admin, &[], &[("image", "photo.png")])
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["contentType"], "image/png");
        assert_eq!(body["size"], PNG.len());
        let filename = body["filename"].as_str().unwrap().to_string();
        assert!(filename.ends_with("__photo.png"));

        let uri = format!("/api/upload/{filename}");
        let (status, _) = app.json(Method::DELETE, &uri, Some(&admin), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = app.json(Method::DELETE, &uri, Some(&admin), Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Image not found");
    }

    #[tokio::test]
    async fn test_contact_submit_and_admin_listing() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;

        let (status, _) = app
            .json(
                Method::POST,
                "/api/contact/submit",
                None,
                json!({ "firstName": "Grace", "email": "g@example.com" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .json(
                Method::POST,
                "/api/contact/submit",
                None,
                json!({
                    "firstName": "Grace", "lastName": "Hopper", "phoneNumber": "555",
                    "email": "g@example.com", "address": "Arlington", "message": "Hi"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);

        let (status, body) = app.get("/api/contact/all", Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_same_named_section_images_get_distinct_objects() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let category = app.seed_category("News", 0).await;
        let section = app.seed_section("Home", 0).await;
        let (category_id, section_id) = (category.id.to_string(), section.id.to_string());

        let fields = blog_fields("Twins", &category_id, &section_id, r#"[{},{}]"#);
        let (status, body) = app
            .multipart(
                Method::POST,
                "/api/blog",
                &admin,
                &fields,
                &[("section_images", "image.png"), ("section_images", "image.png")],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let first = body["blog"]["sections"][0]["section_img"].as_str().unwrap();
        let second = body["blog"]["sections"][1]["section_img"].as_str().unwrap();
        assert_ne!(first, second);
        assert_eq!(app.relay.len(), 2);
    }

    #[tokio::test]
    async fn test_category_page_with_huge_limit_is_capped() {
        let app = TestApp::new();
        app.seed_category("News", 0).await;

        let (status, body) = app
            .get("/api/blog/category/news?page=3&limit=9223372036854775807", None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["pagination"]["limit"], 100);
        assert_eq!(body["pagination"]["page"], 3);
        assert!(body["blogs"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blog_update_keeps_omitted_fields_and_merges_meta() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let category = app.seed_category("News", 0).await;
        let section = app.seed_section("Home", 0).await;
        let (category_id, section_id) = (category.id.to_string(), section.id.to_string());

        let fields = blog_fields("Original Title", &category_id, &section_id, r#"[{"section_title":"a"}]"#);
        let (status, body) = app
            .multipart(Method::POST, "/api/blog", &admin, &fields, &[("mainImage", "cover.png")])
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["blog"]["_id"].as_str().unwrap().to_string();
        let old_cover = body["blog"]["mainImage"].as_str().unwrap().to_string();

        let (status, body) = app
            .multipart(
                Method::PUT,
                &format!("/api/blog/{id}"),
                &admin,
                &[("meta", r#"{"meta_description":"Fresh"}"#)],
                &[("mainImage", "fresh.png")],
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let blog = &body["blog"];
        assert_eq!(body["message"], "Blog post updated successfully");
        assert_eq!(blog["title"], "Original Title");
        assert_eq!(blog["slug"], "original-title");
        assert_eq!(blog["tags"], json!(["rust"]));
        assert_eq!(blog["sections"][0]["section_title"], "a");
        assert_eq!(blog["meta"]["meta_title"], "T");
        assert_eq!(blog["meta"]["meta_description"], "Fresh");
        assert_ne!(blog["mainImage"], old_cover.as_str());
        assert!(app.wait_until_removed(&old_cover).await);

        let (status, body) = app
            .multipart(
                Method::PUT,
                "/api/blog/slug/original-title",
                &admin,
                &[("title", "Renamed Post")],
                &[],
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["blog"]["slug"], "renamed-post");
        assert_eq!(body["blog"]["description"], "<p>Body</p>");

        let (status, _) = app.get("/api/blog/slug/original-title", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.get("/api/blog/slug/Renamed%20Post", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blog_reads_resolve_category_and_author() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;
        let category = app.seed_category("News", 0).await;
        let section = app.seed_section("Home", 0).await;
        let (category_id, section_id) = (category.id.to_string(), section.id.to_string());

        let fields = blog_fields("Populated", &category_id, &section_id, "[]");
        app.multipart(Method::POST, "/api/blog", &admin, &fields, &[])
            .await;

        let (status, body) = app.get("/api/blog/slug/populated", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["blog"]["category"]["name"], "News");
        assert_eq!(body["blog"]["category"]["slug"], "news");
        assert_eq!(body["blog"]["author"]["email"], "ada@example.com");
        assert!(body["blog"]["author"].get("passwordHash").is_none());

        let (_, list) = app.get("/api/blog", None).await;
        assert_eq!(list[0]["category"]["_id"], category_id.as_str());
        assert_eq!(list[0]["author"]["name"], "Ada");
    }

    #[tokio::test]
    async fn test_project_requires_main_image_and_update_appends_gallery() {
        let app = TestApp::new();
        let admin = app.register("Ada", "ada@example.com").await;

        let (status, body) = app
            .json(
                Method::POST,
                "/api/project-categories",
                Some(&admin),
                json!({ "name": "Bridges" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let category_id = body["data"]["_id"].as_str().unwrap().to_string();

        let fields = [
            ("title", "Golden Gate"),
            ("description", "<p>Suspension</p>"),
            ("category", category_id.as_str()),
        ];
        let (status, body) = app
            .multipart(Method::POST, "/api/projects", &admin, &fields, &[("additionalImages", "a.png")])
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Main image is required");
        assert_eq!(app.relay.len(), 0);

        let (status, body) = app
            .multipart(
                Method::POST,
                "/api/projects",
                &admin,
                &fields,
                &[("mainImage", "main.png"), ("additionalImages", "a.png")],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let project = &body["data"];
        let id = project["_id"].as_str().unwrap().to_string();
        let main = project["mainImage"].as_str().unwrap().to_string();
        let first_extra = project["additionalImages"][0].clone();

        let (status, body) = app
            .multipart(
                Method::PUT,
                &format!("/api/projects/{id}"),
                &admin,
                &[],
                &[("additionalImages", "b.png"), ("additionalImages", "b.png")],
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let extras = body["data"]["additionalImages"].as_array().unwrap();
        assert_eq!(extras.len(), 3);
        assert_eq!(extras[0], first_extra);
        assert_ne!(extras[1], extras[2]);
        assert_eq!(body["data"]["mainImage"], main.as_str());
        assert_eq!(body["data"]["title"], "Golden Gate");

        let (status, body) = app
            .multipart(
                Method::PUT,
                &format!("/api/projects/{id}"),
                &admin,
                &[],
                &[("mainImage", "new-main.png")],
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_ne!(body["data"]["mainImage"], main.as_str());
        assert!(app.wait_until_removed(&main).await);

        let (status, body) = app
            .get(&format!("/api/projects/category/{category_id}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
    }
}
