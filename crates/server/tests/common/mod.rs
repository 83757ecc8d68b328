//! Common test utilities: an in-process router with mock collaborators.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use resow_core::config::{Config, TorznabConfig};
use resow_core::testing::{MockClientAdapter, MockSearchProvider};
use resow_core::{
    ApiKeyAuthenticator, Authenticator, DurationString, Notifier, Pipeline, Store, TorznabClient,
};
use resow_server::{create_router, AppState};

pub const TEST_API_KEY: &str = "test-api-key-0123456789";

/// In-process server fixture with mock search and client seams.
pub struct TestFixture {
    pub router: Router,
    pub provider: Arc<MockSearchProvider>,
    pub client: Arc<MockClientAdapter>,
    pub store: Arc<Store>,
    pub temp: TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let torrent_dir = temp.path().join("torrents");
        std::fs::create_dir(&torrent_dir).unwrap();

        let mut config = Config {
            torznab: TorznabConfig {
                urls: vec!["https://indexer.example/api?apikey=secret".to_string()],
            },
            ..Default::default()
        };
        config.search.torrent_dir = Some(torrent_dir);
        config.search.output_dir = temp.path().join("output");
        config.search.delay = DurationString::from_secs(0);
        config.auth.api_key = Some(TEST_API_KEY.to_string());

        let store = Arc::new(Store::in_memory().unwrap());
        let provider = Arc::new(MockSearchProvider::new());
        let client = Arc::new(MockClientAdapter::new());
        let pipeline = Arc::new(Pipeline::new(
            config.clone(),
            store.clone(),
            provider.clone(),
            client.clone(),
            Arc::new(Notifier::new(None)),
        ));
        let torznab = Arc::new(
            TorznabClient::new(
                std::time::Duration::from_secs(5),
                std::time::Duration::from_secs(5),
            )
            .unwrap(),
        );
        let authenticator: Arc<dyn Authenticator> =
            Arc::new(ApiKeyAuthenticator::new(TEST_API_KEY.to_string()));

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            store.clone(),
            pipeline,
            torznab,
            None,
        ));

        Self {
            router: create_router(state),
            provider,
            client,
            store,
            temp,
        }
    }

    pub async fn get(&self, path: &str, with_key: bool) -> (StatusCode, Value) {
        let mut request = Request::builder().uri(path).method("GET");
        if with_key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", TEST_API_KEY));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, path: &str, body: Value, with_key: bool) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .uri(path)
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json");
        if with_key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", TEST_API_KEY));
        }
        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
