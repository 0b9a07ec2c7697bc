use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PlacesError;

/// Publication state of a place. Only `Published` places are ever served to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceStatus {
    Published,
    Pending,
}

impl PlaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceStatus::Published => "published",
            PlaceStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for PlaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaceStatus {
    type Err = PlacesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published" => Ok(PlaceStatus::Published),
            "pending" => Ok(PlaceStatus::Pending),
            other => Err(PlacesError::InvalidRequest(format!(
                "unknown place status '{other}'"
            ))),
        }
    }
}

/// A directory entry.
///
/// `category_ids` is what gets persisted; `categories` holds the labels and is
/// filled in by storage at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: Option<Uuid>,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub category_ids: Vec<Uuid>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub status: PlaceStatus,
    pub created_at: DateTime<Utc>,
}

impl Place {
    pub fn new(name: impl Into<String>, status: PlaceStatus) -> Self {
        Self {
            id: None,
            name: name.into(),
            address: None,
            city: None,
            latitude: 0.0,
            longitude: 0.0,
            category_ids: Vec::new(),
            categories: Vec::new(),
            status,
            created_at: Utc::now(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>, city: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self.city = Some(city.into());
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = coordinate(latitude);
        self.longitude = coordinate(longitude);
        self
    }

    /// Replace infinite or NaN coordinates with 0.0 so the place always serializes as numbers.
    pub fn normalize_coordinates(&mut self) {
        self.latitude = coordinate(self.latitude);
        self.longitude = coordinate(self.longitude);
    }

    pub fn with_categories(mut self, category_ids: Vec<Uuid>) -> Self {
        self.category_ids = category_ids;
        self
    }
}

fn coordinate(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// A tag used to filter places ("placetype").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCategory {
    pub id: Option<Uuid>,
    pub name: String,
}

impl PlaceCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// Admin-side input for creating a published place.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPlace {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

impl NewPlace {
    /// Missing or non-finite coordinates fall back to 0.0; no range check is made.
    pub fn into_place(self, status: PlaceStatus) -> Place {
        Place {
            id: None,
            name: self.name,
            address: self.address,
            city: self.city,
            latitude: self.latitude.map_or(0.0, coordinate),
            longitude: self.longitude.map_or(0.0, coordinate),
            category_ids: self.category_ids,
            categories: Vec::new(),
            status,
            created_at: Utc::now(),
        }
    }
}
