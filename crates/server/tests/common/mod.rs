//! Common test utilities for API testing with mocks.
//!
//! Builds an in-process router over file-backed stores with a scripted SMM
//! panel, so handler tests need no external infrastructure.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use spotlight_core::{
    create_audit_system, testing::MockSmmPanel, AuditStore, AuthConfig, AuthMethod,
    CampaignEngine, Config, DatabaseConfig, EngineConfig, OpenGate, PackageCatalog,
    ServerConfig, SmmPanel, SqliteAuditStore, SqliteCampaignStore, SqliteOrderSetStore,
    SqliteOrderStore, SqlitePackageStore, SqlitePlaylistDirectory, SqlitePurchaseLogStore,
    SubmissionService,
};

/// Re-export fixtures for test convenience
pub use spotlight_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_import() {
///     let fixture = TestFixture::new().await;
///     fixture.add_order("o1", &[("https://open.spotify.com/track/abc", "MOMENTUM")]);
///
///     let response = fixture.post("/api/v1/orders/o1/import", json!({})).await;
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock panel - script rates and failures
    pub panel: Arc<MockSmmPanel>,
    /// Order source - seed orders before importing
    pub orders: Arc<SqliteOrderStore>,
    /// Playlist directory - seed playlists before assigning slots
    pub playlists: Arc<SqlitePlaylistDirectory>,
    /// Temporary directory holding the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture with a configured mock panel.
    pub async fn new() -> Self {
        Self::build(true).await
    }

    /// Create a fixture whose panel has no API key.
    pub async fn without_panel() -> Self {
        Self::build(false).await
    }

    async fn build(with_panel: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::None,
                api_key: None,
                admin_name: "admin".to_string(),
            },
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            engine: EngineConfig::default(),
            smm_panel: None,
        };

        let audit_store: Arc<dyn AuditStore> =
            Arc::new(SqliteAuditStore::new(&db_path).expect("Failed to create audit store"));
        let campaigns =
            Arc::new(SqliteCampaignStore::new(&db_path).expect("Failed to create campaign store"));
        let orders = Arc::new(SqliteOrderStore::new(&db_path).expect("Failed to create order store"));
        let playlists = Arc::new(
            SqlitePlaylistDirectory::new(&db_path).expect("Failed to create playlist directory"),
        );
        let packages =
            Arc::new(SqlitePackageStore::new(&db_path).expect("Failed to create package store"));
        let order_sets =
            Arc::new(SqliteOrderSetStore::new(&db_path).expect("Failed to create order sets"));
        let purchase_logs =
            Arc::new(SqlitePurchaseLogStore::new(&db_path).expect("Failed to create purchase log"));

        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let panel = Arc::new(MockSmmPanel::new());
        let submissions = SubmissionService::new(
            with_panel.then(|| Arc::clone(&panel) as Arc<dyn SmmPanel>),
            order_sets,
            purchase_logs,
        );

        let engine = CampaignEngine::new(
            config.engine.clone(),
            campaigns,
            orders.clone(),
            playlists.clone(),
            PackageCatalog::new(packages),
            submissions,
        )
        .with_audit(audit_handle);

        let state = Arc::new(spotlight_server::state::AppState::new(
            config,
            Arc::new(OpenGate),
            audit_store,
            Arc::new(engine),
        ));
        let router = spotlight_server::api::create_router(state);

        Self {
            router,
            panel,
            orders,
            playlists,
            temp_dir,
        }
    }

    /// Seed a processing order with `(song link, package)` line items.
    pub fn add_order(&self, id: &str, items: &[(&str, &str)]) {
        self.orders
            .upsert(&fixtures::order(id, items))
            .expect("Failed to seed order");
    }

    pub fn add_playlist(&self, id: &str, name: &str) {
        self.playlists
            .upsert(&fixtures::playlist(id, name, true))
            .expect("Failed to seed playlist");
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a GET request and return the raw text body.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
