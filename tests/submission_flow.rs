mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use my_places::domain::PlaceStatus;
use my_places::storage::{InMemoryStorage, Storage};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

fn suggestion_body(token: &str, name: &str, address: &str, city: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("action", "send_form")
        .append_pair("mp_name", name)
        .append_pair("mp_address", address)
        .append_pair("mp_city", city)
        .append_pair("_token", token)
        .finish()
}

fn submit_from(referer: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/submit")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::REFERER, referer)
        .body(Body::from(body))
        .unwrap()
}

fn query_of(location: &str) -> HashMap<String, String> {
    Url::parse(location)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[tokio::test]
async fn accepted_suggestion_is_stored_as_pending() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app(&test_config(), storage.clone());

    let body = suggestion_body(&form_token(), "Corner Cafe", "Main St 1", "Lund");
    let response = send(&app, submit_from("http://localhost:8080/places?page=2", body)).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let location = response.location.unwrap();
    assert!(location.starts_with("http://localhost:8080/places?"));
    let query = query_of(&location);
    assert_eq!(query["mp_form_submit_success"], "1");
    assert_eq!(query["page"], "2");
    assert!(!query.contains_key("mp_form_data[name]"));

    let pending = storage.query_places(PlaceStatus::Pending, &[]).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "Corner Cafe");
    assert_eq!(pending[0].city.as_deref(), Some("Lund"));

    // Suggestions stay out of the public query until promoted
    let listed = send(&app, form_post("/ajax/get_places", "")).await.json();
    assert_eq!(listed["success"], serde_json::json!(false));
}

#[tokio::test]
async fn missing_referer_redirects_to_public_url() {
    let app = app(&test_config(), Arc::new(InMemoryStorage::new()));
    let body = suggestion_body(&form_token(), "Corner Cafe", "", "");
    let response = send(&app, form_post("/submit", body)).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        response.location.as_deref(),
        Some("http://localhost:8080/?mp_form_submit_success=1")
    );
}

#[tokio::test]
async fn invalid_token_is_forbidden_and_stores_nothing() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app(&test_config(), storage.clone());

    let body = suggestion_body("0123456789abcdef0123456789abcdef", "Spam", "x", "y");
    let response = send(&app, submit_from("http://localhost:8080/", body)).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.location.is_none());
    assert!(storage
        .query_places(PlaceStatus::Pending, &[])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn failed_persist_echoes_the_entered_values() {
    let app = app(&test_config(), Arc::new(ReadOnlyStorage::new()));

    let body = suggestion_body(&form_token(), "Corner <b>Cafe</b>", "Main St 1", "Lund");
    let response = send(&app, submit_from("http://localhost:8080/", body)).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let location = response.location.unwrap();
    let query = query_of(&location);
    assert_eq!(query["mp_form_submit_success"], "0");
    assert_eq!(query["mp_form_data[name]"], "Corner Cafe");
    assert_eq!(query["mp_form_data[address]"], "Main St 1");
    assert_eq!(query["mp_form_data[city]"], "Lund");

    // Following the redirect re-populates the form
    let path = location.trim_start_matches("http://localhost:8080");
    let page = send(&app, get(path)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("something went wrong"));
    assert!(page.body.contains("value=\"Corner Cafe\""));
    assert!(page.body.contains("value=\"Main St 1\""));
}

#[tokio::test]
async fn index_renders_map_form_and_client_config() {
    let storage = Arc::new(InMemoryStorage::new());
    let cafe = category(storage.as_ref(), "Cafe").await;
    let app = app(&test_config(), storage);

    let page = send(&app, get("/?mp_form_submit_success=1")).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains(&format!("data-id=\"{cafe}\"")));
    assert!(page.body.contains("id=\"my-places-map\""));
    assert!(page.body.contains("Thanks for submitting a place suggestion!"));
    assert!(page.body.contains("name=\"_token\""));
    assert!(page
        .body
        .contains("\"ajax_url\":\"http://localhost:8080/ajax/get_places\""));
    assert!(!page.body.contains("[my_places_map]"));
    assert!(!page.body.contains("[my_places_form]"));
}

#[tokio::test]
async fn token_from_rendered_form_is_accepted() {
    let storage = Arc::new(InMemoryStorage::new());
    let app = app(&test_config(), storage.clone());

    let page = send(&app, get("/")).await.body;
    let marker = "name=\"_token\" value=\"";
    let start = page.find(marker).unwrap() + marker.len();
    let token = &page[start..start + 32];

    let body = suggestion_body(token, "From the page", "Main St 1", "Lund");
    let response = send(&app, submit_from("http://localhost:8080/", body)).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        storage.query_places(PlaceStatus::Pending, &[]).await.unwrap().len(),
        1
    );
}
