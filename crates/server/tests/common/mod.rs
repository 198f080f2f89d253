//! Common test utilities for in-process API testing with a mock engine.
//!
//! The fixture builds the real router over a `ConversionService` whose
//! engine is a `MockEngine`, so requests exercise sniffing, staging, read
//! back and cleanup without ffmpeg.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mediaforge_core::{
    testing::MockEngine, Config, ConversionService, ServiceConfig, StagingConfig, TempFileManager,
};
use mediaforge_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use mediaforge_core::testing::fixtures;

/// Test fixture for in-process API testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_convert() {
///     let fixture = TestFixture::new();
///     let response = fixture.post_bytes("/api/v1/convert/toAudio", fixtures::wav()).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock engine - configure output, failures and delays
    pub engine: Arc<MockEngine>,
    /// The service behind the router
    pub service: Arc<ConversionService>,
    /// Staging directory
    pub staging_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Body parsed as JSON (`Null` when it is not JSON).
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestFixture {
    /// Create a new test fixture with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a test fixture from a configuration. The staging directory is
    /// always replaced by a temp dir.
    pub fn with_config(mut config: Config) -> Self {
        let staging_dir = TempDir::new().expect("Failed to create staging dir");
        config.staging = StagingConfig::in_dir(staging_dir.path());

        let engine = Arc::new(MockEngine::new());
        let service = Arc::new(ConversionService::new(
            config.service.clone(),
            TempFileManager::new(config.staging.clone()),
            engine.clone(),
        ));
        let state = Arc::new(AppState::new(config, service.clone()));

        Self {
            router: create_router(state),
            engine,
            service,
            staging_dir,
        }
    }

    /// Fixture with a custom service configuration.
    pub fn with_service_config(service: ServiceConfig) -> Self {
        Self::with_config(Config {
            service,
            ..Config::default()
        })
    }

    /// Send a request and collect the response.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Make a POST request with a raw body
    pub async fn post_bytes(&self, path: &str, body: Vec<u8>) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/octet-stream")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Staging files still on disk.
    pub async fn residual_files(&self) -> usize {
        self.service
            .staging()
            .residual_files()
            .await
            .expect("Failed to list staging dir")
            .len()
    }
}
