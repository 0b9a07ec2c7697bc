//! Presentation shell: map widget, suggestion form, page chrome and the admin
//! settings form, plus expansion of the two content placeholders.

use askama::Template;
use serde::Serialize;

use crate::domain::PlaceCategory;
use crate::settings::{MapSettings, SettingKey};
use crate::submission::FormStatus;

pub const MAP_PLACEHOLDER: &str = "[my_places_map]";
pub const FORM_PLACEHOLDER: &str = "[my_places_form]";

pub struct CategoryOption {
    pub id: String,
    pub name: String,
}

impl From<&PlaceCategory> for CategoryOption {
    fn from(category: &PlaceCategory) -> Self {
        Self {
            id: category.id.map(|id| id.to_string()).unwrap_or_default(),
            name: category.name.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "map.html")]
pub struct MapTemplate {
    pub categories: Vec<CategoryOption>,
}

#[derive(Template)]
#[template(path = "form.html")]
pub struct FormTemplate {
    pub action_url: String,
    pub token: String,
    pub submitted_ok: bool,
    pub submit_failed: bool,
    pub name: String,
    pub address: String,
    pub city: String,
}

impl FormTemplate {
    pub fn new(action_url: String, token: String, status: &FormStatus) -> Self {
        Self {
            action_url,
            token,
            submitted_ok: status.success == Some(true),
            submit_failed: status.success == Some(false),
            name: status.data.name.clone(),
            address: status.data.address.clone(),
            city: status.data.city.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "page.html")]
pub struct PageTemplate {
    pub title: String,
    pub client_config: String,
    pub api_key: String,
    pub body: String,
}

pub struct SettingsField {
    pub name: &'static str,
    pub label: &'static str,
    pub input_type: &'static str,
    pub step: Option<&'static str>,
    pub value: String,
}

#[derive(Template)]
#[template(path = "admin_settings.html")]
pub struct AdminSettingsTemplate {
    pub action_url: String,
    pub updated: bool,
    pub fields: Vec<SettingsField>,
}

impl AdminSettingsTemplate {
    pub fn new(action_url: String, updated: bool, settings: &MapSettings) -> Self {
        let fields = SettingKey::ALL
            .into_iter()
            .map(|key| {
                let (input_type, step) = match key {
                    SettingKey::ApiKey => ("text", None),
                    SettingKey::Latitude | SettingKey::Longitude => ("number", Some("0.0000001")),
                    SettingKey::Zoom => ("number", None),
                };
                SettingsField {
                    name: key.name(),
                    label: key.label(),
                    input_type,
                    step,
                    value: settings.get(key).to_string(),
                }
            })
            .collect();
        Self {
            action_url,
            updated,
            fields,
        }
    }
}

/// The `window.my_places_obj` object read once by the browser script.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct ClientConfig {
    pub ajax_url: String,
    pub google_maps_latitude: String,
    pub google_maps_longitude: String,
    pub google_maps_zoom: String,
}

impl ClientConfig {
    pub fn new(ajax_url: String, settings: &MapSettings) -> Self {
        Self {
            ajax_url,
            google_maps_latitude: settings.google_maps_latitude.clone(),
            google_maps_longitude: settings.google_maps_longitude.clone(),
            google_maps_zoom: settings.google_maps_zoom.clone(),
        }
    }

    /// JSON safe to inline inside a `<script>` element.
    pub fn to_script_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?.replace('<', "\\u003c"))
    }
}

/// Replace every placeholder occurrence with the rendered fragment.
/// Fragments are only rendered when their placeholder is present.
pub fn expand_placeholders<M, F>(content: &str, render_map: M, render_form: F) -> askama::Result<String>
where
    M: FnOnce() -> askama::Result<String>,
    F: FnOnce() -> askama::Result<String>,
{
    let mut out = content.to_string();
    if out.contains(MAP_PLACEHOLDER) {
        out = out.replace(MAP_PLACEHOLDER, &render_map()?);
    }
    if out.contains(FORM_PLACEHOLDER) {
        out = out.replace(FORM_PLACEHOLDER, &render_form()?);
    }
    Ok(out)
}
