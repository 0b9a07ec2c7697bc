//! Place query protocol: request decoding, the success/failure envelope,
//! marker payload rendering and the two query endpoints' logic.

use crate::domain::Place;
use crate::error::{PlacesError, Result};
use crate::metrics::PlacesMetrics;
use crate::repository::{CategoryFilter, PlaceRepository};
use askama::Template;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;
use uuid::Uuid;

pub const EMPTY_RESULT_MESSAGE: &str = "No places matching your selected criteria found.";

/// How a query with zero matches is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResultPolicy {
    /// `{success: false, data: {message}}`, indistinguishable in shape from an error.
    #[default]
    Failure,
    /// `{success: true, data: []}`.
    EmptySuccess,
}

/// Typed form of the `placetypes` request field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacesRequest {
    pub placetypes: Vec<Uuid>,
}

impl PlacesRequest {
    pub fn filter(&self) -> CategoryFilter {
        CategoryFilter::from_ids(self.placetypes.iter().copied())
    }

    /// Form pairs as a browser sends them (`placetypes[]=..` repeated, or plain `placetypes`).
    pub fn to_form_pairs(&self) -> Vec<(String, String)> {
        self.placetypes
            .iter()
            .map(|id| ("placetypes[]".to_string(), id.to_string()))
            .collect()
    }
}

fn is_placetypes_key(key: &str) -> bool {
    key == "placetypes"
        || (key.starts_with("placetypes[") && key.ends_with(']'))
}

impl TryFrom<Vec<(String, String)>> for PlacesRequest {
    type Error = PlacesError;

    /// Unrelated keys (such as `action`) are ignored and blank values skipped;
    /// anything that is not a category id is rejected.
    fn try_from(pairs: Vec<(String, String)>) -> Result<Self> {
        let mut placetypes = Vec::new();
        for (key, value) in pairs {
            if !is_placetypes_key(&key) {
                continue;
            }
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let id = Uuid::parse_str(value).map_err(|_| {
                PlacesError::InvalidRequest(format!("'{value}' is not a category id"))
            })?;
            placetypes.push(id);
        }
        Ok(Self { placetypes })
    }
}

/// The `{success, data}` wrapper used by both query endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Success(Vec<T>),
    Failure(String),
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireData<'a, T> {
    Items(&'a [T]),
    Message { message: &'a str },
}

#[derive(Serialize)]
struct WireEnvelope<'a, T> {
    success: bool,
    data: WireData<'a, T>,
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let wire = match self {
            Envelope::Success(items) => WireEnvelope {
                success: true,
                data: WireData::Items(items),
            },
            Envelope::Failure(message) => WireEnvelope {
                success: false,
                data: WireData::Message { message },
            },
        };
        wire.serialize(serializer)
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    success: bool,
    #[serde(default)]
    data: serde_json::Value,
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decode a response body. A failure without a message still decodes, with a generic one.
    pub fn from_json(body: &str) -> Result<Self> {
        let raw: RawEnvelope = serde_json::from_str(body)?;
        if raw.success {
            let items = match raw.data {
                serde_json::Value::Null => Vec::new(),
                data => serde_json::from_value(data)?,
            };
            Ok(Envelope::Success(items))
        } else {
            let message = raw
                .data
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Request failed")
                .to_string();
            Ok(Envelope::Failure(message))
        }
    }
}

/// Display payload for one pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub content: String,
}

/// Structured payload for the JSON variant of the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub categories: Vec<String>,
}

#[derive(Template)]
#[template(
    source = "{% if let Some(name) = name %}<p><b>{{ name }}</b></p>{% endif %}{% if let Some(line) = address_line %}<p>{{ line }}</p>{% endif %}{% if !categories.is_empty() %}<p><i>{{ categories }}</i></p>{% endif %}",
    ext = "html"
)]
struct InfoWindowContent<'a> {
    name: Option<&'a str>,
    address_line: Option<String>,
    categories: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Info-window HTML: bold name, then `address, city` only when both are set,
/// then the category labels in italics.
pub fn render_content(place: &Place) -> Result<String> {
    let address_line = match (non_empty(&place.address), non_empty(&place.city)) {
        (Some(address), Some(city)) => Some(format!("{address}, {city}")),
        _ => None,
    };
    let content = InfoWindowContent {
        name: Some(place.name.as_str()).filter(|n| !n.is_empty()),
        address_line,
        categories: place.categories.join(", "),
    };
    Ok(content.render()?)
}

impl PlaceMarker {
    pub fn from_place(place: &Place) -> Result<Self> {
        Ok(Self {
            latitude: place.latitude,
            longitude: place.longitude,
            content: render_content(place)?,
        })
    }
}

impl From<&Place> for PlaceRecord {
    fn from(place: &Place) -> Self {
        Self {
            id: place.id.unwrap_or_default(),
            latitude: place.latitude,
            longitude: place.longitude,
            name: Some(place.name.clone()).filter(|n| !n.is_empty()),
            address: place.address.clone().filter(|a| !a.is_empty()),
            city: place.city.clone().filter(|c| !c.is_empty()),
            categories: place.categories.clone(),
        }
    }
}

/// Server side of the query protocol. Reachable without any capability check.
#[derive(Clone)]
pub struct PlacesService {
    repository: PlaceRepository,
    empty_result: EmptyResultPolicy,
}

impl PlacesService {
    pub fn new(repository: PlaceRepository, empty_result: EmptyResultPolicy) -> Self {
        Self {
            repository,
            empty_result,
        }
    }

    async fn query<T>(&self, request: &PlacesRequest, build: impl Fn(&Place) -> Result<T>) -> Result<Envelope<T>> {
        PlacesMetrics::record_query();
        let places = self.repository.list_places(&request.filter()).await?;
        PlacesMetrics::record_result_size(places.len());

        if places.is_empty() {
            PlacesMetrics::record_empty_result();
            debug!(policy = ?self.empty_result, "Query matched no places");
            return Ok(match self.empty_result {
                EmptyResultPolicy::Failure => Envelope::Failure(EMPTY_RESULT_MESSAGE.to_string()),
                EmptyResultPolicy::EmptySuccess => Envelope::Success(Vec::new()),
            });
        }

        let items = places.iter().map(build).collect::<Result<Vec<T>>>()?;
        Ok(Envelope::Success(items))
    }

    /// `get_places`: pre-rendered info-window content per place.
    pub async fn get_places(&self, request: &PlacesRequest) -> Result<Envelope<PlaceMarker>> {
        self.query(request, PlaceMarker::from_place).await
    }

    /// `get_places_json`: structured records per place.
    pub async fn get_places_json(&self, request: &PlacesRequest) -> Result<Envelope<PlaceRecord>> {
        self.query(request, |place| Ok(PlaceRecord::from(place))).await
    }
}
