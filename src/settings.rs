//! Settings Store: the four map-provider values configured by administrators.
//!
//! Values are kept as the raw strings the admin entered. Numeric parsing only
//! happens when a viewport is needed, and never validates ranges.

use crate::error::{PlacesError, Result};
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    ApiKey,
    Latitude,
    Longitude,
    Zoom,
}

impl SettingKey {
    pub const ALL: [SettingKey; 4] = [
        SettingKey::ApiKey,
        SettingKey::Latitude,
        SettingKey::Longitude,
        SettingKey::Zoom,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SettingKey::ApiKey => "google_maps_api_key",
            SettingKey::Latitude => "google_maps_latitude",
            SettingKey::Longitude => "google_maps_longitude",
            SettingKey::Zoom => "google_maps_zoom",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SettingKey::ApiKey => "Google Maps API Key",
            SettingKey::Latitude => "Google Maps Default Latitude",
            SettingKey::Longitude => "Google Maps Default Longitude",
            SettingKey::Zoom => "Google Maps Default Zoom Level",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SettingKey {
    type Err = PlacesError;

    fn from_str(s: &str) -> Result<Self> {
        SettingKey::ALL
            .into_iter()
            .find(|key| key.name() == s)
            .ok_or_else(|| PlacesError::InvalidRequest(format!("unknown setting '{s}'")))
    }
}

/// Snapshot of all four settings, as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub google_maps_api_key: String,
    pub google_maps_latitude: String,
    pub google_maps_longitude: String,
    pub google_maps_zoom: String,
}

/// Parsed map defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
}

impl MapSettings {
    pub fn get(&self, key: SettingKey) -> &str {
        match key {
            SettingKey::ApiKey => &self.google_maps_api_key,
            SettingKey::Latitude => &self.google_maps_latitude,
            SettingKey::Longitude => &self.google_maps_longitude,
            SettingKey::Zoom => &self.google_maps_zoom,
        }
    }

    fn slot(&mut self, key: SettingKey) -> &mut String {
        match key {
            SettingKey::ApiKey => &mut self.google_maps_api_key,
            SettingKey::Latitude => &mut self.google_maps_latitude,
            SettingKey::Longitude => &mut self.google_maps_longitude,
            SettingKey::Zoom => &mut self.google_maps_zoom,
        }
    }
}

impl Viewport {
    /// Unparseable or empty values read as zero, the way the browser's `Number()` coercion
    /// ends up treating them on the map.
    pub fn parse(latitude: &str, longitude: &str, zoom: &str) -> Self {
        Self {
            latitude: latitude.trim().parse().unwrap_or(0.0),
            longitude: longitude.trim().parse().unwrap_or(0.0),
            zoom: zoom
                .trim()
                .parse::<f64>()
                .map(|z| z.clamp(0.0, u8::MAX as f64) as u8)
                .unwrap_or(0),
        }
    }
}

/// Read/write access to the settings, backed by the content store.
#[derive(Clone)]
pub struct SettingsStore {
    storage: Arc<dyn Storage>,
}

impl SettingsStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn get(&self, key: SettingKey) -> Result<Option<String>> {
        self.storage.get_setting(key.name()).await
    }

    pub async fn set(&self, key: SettingKey, value: &str) -> Result<()> {
        self.storage.set_setting(key.name(), value).await?;
        info!(setting = %key, "Setting updated");
        Ok(())
    }

    pub async fn load(&self) -> Result<MapSettings> {
        let mut settings = MapSettings::default();
        for key in SettingKey::ALL {
            if let Some(value) = self.get(key).await? {
                *settings.slot(key) = value;
            }
        }
        Ok(settings)
    }

    pub async fn save(&self, settings: &MapSettings) -> Result<()> {
        for key in SettingKey::ALL {
            self.set(key, settings.get(key)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    #[tokio::test]
    async fn save_then_load_keeps_raw_strings() {
        let store = SettingsStore::new(Arc::new(InMemoryStorage::new()));
        let settings = MapSettings {
            google_maps_api_key: "abc123".into(),
            google_maps_latitude: "55.7050242".into(),
            google_maps_longitude: "13.1942046".into(),
            google_maps_zoom: "12".into(),
        };
        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await.unwrap(), settings);
        assert_eq!(
            store.get(SettingKey::ApiKey).await.unwrap().as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn viewport_is_lenient() {
        let viewport = Viewport::parse("not a number", " 13.5 ", "14");
        assert_eq!(viewport.latitude, 0.0);
        assert_eq!(viewport.longitude, 13.5);
        assert_eq!(viewport.zoom, 14);
    }

    #[test]
    fn keys_parse_by_name() {
        assert_eq!(
            "google_maps_zoom".parse::<SettingKey>().unwrap(),
            SettingKey::Zoom
        );
        assert!("zoom".parse::<SettingKey>().is_err());
    }
}
