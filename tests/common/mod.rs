#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use my_places::config::Config;
use my_places::domain::{Place, PlaceCategory, PlaceStatus};
use my_places::error::{PlacesError, Result};
use my_places::nonce::{NonceSigner, FORM_SUBMIT_ACTION};
use my_places::server::create_server;
use my_places::state::AppState;
use my_places::storage::{InMemoryStorage, Storage};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const NONCE_SECRET: &str = "integration-secret";
pub const ADMIN_TOKEN: &str = "admin-token";

pub fn test_config() -> Config {
    let mut config = Config::from_toml(
        r#"
        [server]
        public_url = "http://localhost:8080/"

        [database]
        path = ":memory:"
        "#,
    )
    .unwrap();
    config.security.nonce_secret = Some(NONCE_SECRET.to_string());
    config.security.admin_token = Some(ADMIN_TOKEN.to_string());
    config
}

pub fn app(config: &Config, storage: Arc<dyn Storage>) -> Router {
    create_server(AppState::new(config, storage).unwrap(), "static")
}

pub fn form_token() -> String {
    NonceSigner::new(NONCE_SECRET, 86_400).create(FORM_SUBMIT_ACTION)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    TestResponse {
        status,
        location,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub fn form_post(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.into()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn placetypes_body(ids: &[Uuid]) -> String {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    for id in ids {
        form.append_pair("placetypes[]", &id.to_string());
    }
    form.finish()
}

pub async fn category(storage: &dyn Storage, name: &str) -> Uuid {
    let mut category = PlaceCategory::new(name);
    storage.create_category(&mut category).await.unwrap();
    category.id.unwrap()
}

pub async fn published(storage: &dyn Storage, name: &str, categories: Vec<Uuid>) -> Place {
    let mut place = Place::new(name, PlaceStatus::Published)
        .with_address("Main St 1", "Lund")
        .with_coordinates(55.7050242, 13.1942046)
        .with_categories(categories);
    storage.create_place(&mut place).await.unwrap();
    place
}

/// Reads succeed; every place write fails.
pub struct ReadOnlyStorage {
    inner: InMemoryStorage,
}

impl ReadOnlyStorage {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStorage::new(),
        }
    }
}

#[async_trait]
impl Storage for ReadOnlyStorage {
    async fn create_category(&self, category: &mut PlaceCategory) -> Result<()> {
        self.inner.create_category(category).await
    }

    async fn get_all_categories(&self) -> Result<Vec<PlaceCategory>> {
        self.inner.get_all_categories().await
    }

    async fn create_place(&self, _place: &mut Place) -> Result<()> {
        Err(PlacesError::Api {
            message: "store is read-only".to_string(),
        })
    }

    async fn get_place_by_id(&self, place_id: Uuid) -> Result<Option<Place>> {
        self.inner.get_place_by_id(place_id).await
    }

    async fn query_places(&self, status: PlaceStatus, category_ids: &[Uuid]) -> Result<Vec<Place>> {
        self.inner.query_places(status, category_ids).await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_setting(key).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set_setting(key, value).await
    }
}
