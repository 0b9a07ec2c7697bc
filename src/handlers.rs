use askama::Template;
use axum::{
    body::Bytes,
    extract::{Form, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::{NewPlace, PlaceCategory, PlaceStatus};
use crate::error::{PlacesError, Result};
use crate::protocol::{Envelope, PlaceMarker, PlaceRecord, PlacesRequest};
use crate::settings::MapSettings;
use crate::state::AppState;
use crate::submission::{FormStatus, SuggestionForm};
use crate::templates::{
    expand_placeholders, AdminSettingsTemplate, CategoryOption, ClientConfig, FormTemplate,
    MapTemplate, PageTemplate, FORM_PLACEHOLDER, MAP_PLACEHOLDER,
};

pub const GET_PLACES_PATH: &str = "/ajax/get_places";
pub const GET_PLACES_JSON_PATH: &str = "/ajax/get_places_json";
pub const SUBMIT_PATH: &str = "/submit";

#[derive(Deserialize)]
struct JsonPlacesBody {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    placetypes: Vec<String>,
}

/// Decode the body of a query request into `action` plus form-style pairs.
/// Accepts `application/json` bodies as well as the browser's url-encoded form.
fn decode_pairs(headers: &HeaderMap, body: &Bytes) -> Result<Vec<(String, String)>> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("application/json"));

    if is_json {
        if body.is_empty() {
            return Ok(Vec::new());
        }
        let parsed: JsonPlacesBody = serde_json::from_slice(body)
            .map_err(|e| PlacesError::InvalidRequest(format!("malformed JSON body: {e}")))?;
        let mut pairs: Vec<(String, String)> = parsed
            .placetypes
            .into_iter()
            .map(|id| ("placetypes".to_string(), id))
            .collect();
        if let Some(action) = parsed.action {
            pairs.push(("action".to_string(), action));
        }
        return Ok(pairs);
    }

    Ok(url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

fn decode_places_request(headers: &HeaderMap, body: &Bytes) -> Result<PlacesRequest> {
    PlacesRequest::try_from(decode_pairs(headers, body)?)
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "my_places",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn metrics() -> impl IntoResponse {
    crate::metrics::render()
}

/// `get_places`: markers with pre-rendered info-window content.
pub async fn get_places(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<PlaceMarker>>> {
    let request = decode_places_request(&headers, &body)?;
    debug!(placetypes = request.placetypes.len(), "get_places");
    Ok(Json(state.places.get_places(&request).await?))
}

/// `get_places_json`: structured place records.
pub async fn get_places_json(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<PlaceRecord>>> {
    let request = decode_places_request(&headers, &body)?;
    debug!(placetypes = request.placetypes.len(), "get_places_json");
    Ok(Json(state.places.get_places_json(&request).await?))
}

/// Single AJAX entry point dispatching on the `action` field.
pub async fn ajax(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let pairs = decode_pairs(&headers, &body)?;
    let action = pairs
        .iter()
        .find(|(k, _)| k == "action")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    let request = PlacesRequest::try_from(pairs)?;

    match action.as_str() {
        "get_places" => Ok(Json(state.places.get_places(&request).await?).into_response()),
        "get_places_json" => Ok(Json(state.places.get_places_json(&request).await?).into_response()),
        other => Err(PlacesError::InvalidRequest(format!("unknown action '{other}'"))),
    }
}

/// Suggestion form target. A bad token ends the request with 403 and no redirect.
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SuggestionForm>,
) -> Result<Redirect> {
    let referer = headers.get(header::REFERER).and_then(|v| v.to_str().ok());
    let outcome = state.submissions.submit(&form, referer).await?;
    Ok(Redirect::to(outcome.redirect()))
}

async fn render_map(state: &AppState) -> Result<String> {
    let categories = state.storage.get_all_categories().await?;
    Ok(MapTemplate {
        categories: categories.iter().map(CategoryOption::from).collect(),
    }
    .render()?)
}

fn render_form(state: &AppState, status: &FormStatus) -> Result<String> {
    Ok(FormTemplate::new(
        state.url_for(SUBMIT_PATH),
        state.submissions.form_token(),
        status,
    )
    .render()?)
}

/// Render arbitrary content with both placeholders expanded, inside the page chrome.
pub async fn render_content_page(
    state: &AppState,
    title: &str,
    content: &str,
    status: &FormStatus,
) -> Result<String> {
    let settings = state.settings.load().await?;
    let map_html = if content.contains(MAP_PLACEHOLDER) {
        render_map(state).await?
    } else {
        String::new()
    };
    let form_html = if content.contains(FORM_PLACEHOLDER) {
        render_form(state, status)?
    } else {
        String::new()
    };
    let body = expand_placeholders(content, || Ok(map_html), || Ok(form_html))?;

    let client_config = ClientConfig::new(state.url_for(GET_PLACES_PATH), &settings);
    Ok(PageTemplate {
        title: title.to_string(),
        client_config: client_config.to_script_json()?,
        api_key: settings.google_maps_api_key,
        body,
    }
    .render()?)
}

const DEFAULT_PAGE: &str = "<h1>Places</h1>\n[my_places_map]\n<h2>Suggest a place</h2>\n[my_places_form]";

pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Html<String>> {
    let status = FormStatus::from_query_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    Ok(Html(render_content_page(&state, "My Places", DEFAULT_PAGE, &status).await?))
}

// Admin routes

#[derive(Debug, Default, Deserialize)]
pub struct AdminQuery {
    pub token: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

fn require_admin(state: &AppState, headers: &HeaderMap, query_token: Option<&str>) -> Result<()> {
    let expected = state
        .admin_token
        .as_deref()
        .ok_or_else(|| PlacesError::Forbidden("admin is disabled".to_string()))?;

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match bearer.or(query_token) {
        Some(given) if given == expected => Ok(()),
        _ => Err(PlacesError::Forbidden("admin token required".to_string())),
    }
}

fn settings_action_url(state: &AppState, query: &AdminQuery) -> String {
    let mut url = state.url_for("/admin/settings");
    if let Some(token) = &query.token {
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("token", token)
            .finish();
        url.push('?');
        url.push_str(&encoded);
    }
    url
}

pub async fn admin_settings_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
) -> Result<Html<String>> {
    require_admin(&state, &headers, query.token.as_deref())?;
    let settings = state.settings.load().await?;
    let updated = matches!(query.updated.as_deref(), Some("true") | Some("1"));
    let page = AdminSettingsTemplate::new(settings_action_url(&state, &query), updated, &settings);
    Ok(Html(page.render()?))
}

pub async fn admin_save_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
    Form(settings): Form<MapSettings>,
) -> Result<Redirect> {
    require_admin(&state, &headers, query.token.as_deref())?;
    state.settings.save(&settings).await?;
    info!("Map settings saved");

    let mut target = settings_action_url(&state, &query);
    target.push(if query.token.is_some() { '&' } else { '?' });
    target.push_str("updated=true");
    Ok(Redirect::to(&target))
}

pub async fn admin_list_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PlaceCategory>>> {
    require_admin(&state, &headers, None)?;
    Ok(Json(state.storage.get_all_categories().await?))
}

#[derive(Debug, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

pub async fn admin_create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewCategory>,
) -> Result<(StatusCode, Json<PlaceCategory>)> {
    require_admin(&state, &headers, None)?;
    if input.name.trim().is_empty() {
        return Err(PlacesError::InvalidRequest("category name is required".to_string()));
    }
    let mut category = PlaceCategory::new(input.name.trim());
    state.storage.create_category(&mut category).await?;
    info!(category = %category.name, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// Admin-created places are published immediately.
pub async fn admin_create_place(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<NewPlace>,
) -> Result<(StatusCode, Json<PlaceRecord>)> {
    require_admin(&state, &headers, None)?;
    if input.name.trim().is_empty() {
        return Err(PlacesError::InvalidRequest("place name is required".to_string()));
    }
    let mut place = input.into_place(PlaceStatus::Published);
    state.storage.create_place(&mut place).await?;
    info!(place = %place.name, "Place published");
    Ok((StatusCode::CREATED, Json(PlaceRecord::from(&place))))
}
