//! Bulk loading of categories and published places from a TOML file.
//!
//! ```toml
//! [[categories]]
//! name = "Cafe"
//!
//! [[places]]
//! name = "Corner Cafe"
//! address = "Main St 1"
//! city = "Lund"
//! latitude = 55.70
//! longitude = 13.19
//! categories = ["Cafe"]
//! ```
//!
//! Places refer to categories by name. Categories already in the store are reused.

use crate::domain::{Place, PlaceCategory, PlaceStatus};
use crate::error::{PlacesError, Result};
use crate::storage::Storage;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct ImportFile {
    #[serde(default)]
    pub categories: Vec<ImportCategory>,
    #[serde(default)]
    pub places: Vec<ImportPlace>,
}

#[derive(Debug, Deserialize)]
pub struct ImportCategory {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportPlace {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub categories_created: usize,
    pub places_created: usize,
}

impl ImportFile {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Create everything in `file`. Stops at the first place that names an unknown category;
/// rows written before that point stay written.
pub async fn import(storage: &dyn Storage, file: ImportFile) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut by_name: HashMap<String, Uuid> = storage
        .get_all_categories()
        .await?
        .into_iter()
        .filter_map(|c| c.id.map(|id| (c.name, id)))
        .collect();

    for entry in file.categories {
        if by_name.contains_key(&entry.name) {
            debug!(category = %entry.name, "Category exists, reusing");
            continue;
        }
        let mut category = PlaceCategory::new(entry.name);
        storage.create_category(&mut category).await?;
        if let Some(id) = category.id {
            by_name.insert(category.name, id);
            summary.categories_created += 1;
        }
    }

    for entry in file.places {
        let category_ids = entry
            .categories
            .iter()
            .map(|name| {
                by_name.get(name).copied().ok_or_else(|| {
                    PlacesError::InvalidRequest(format!(
                        "place '{}' refers to unknown category '{}'",
                        entry.name, name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut place = Place::new(entry.name, PlaceStatus::Published)
            .with_coordinates(entry.latitude, entry.longitude)
            .with_categories(category_ids);
        place.address = entry.address;
        place.city = entry.city;
        storage.create_place(&mut place).await?;
        summary.places_created += 1;
    }

    info!(
        categories = summary.categories_created,
        places = summary.places_created,
        "Import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    const SAMPLE: &str = r#"
[[categories]]
name = "Cafe"

[[categories]]
name = "Bakery"

[[places]]
name = "Corner Cafe"
address = "Main St 1"
city = "Lund"
latitude = 55.7
longitude = 13.19
categories = ["Cafe", "Bakery"]

[[places]]
name = "Unlabelled"
"#;

    #[tokio::test]
    async fn imports_categories_and_published_places() {
        let storage = InMemoryStorage::new();
        let summary = import(&storage, ImportFile::from_toml(SAMPLE).unwrap())
            .await
            .unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                categories_created: 2,
                places_created: 2
            }
        );

        let places = storage
            .query_places(PlaceStatus::Published, &[])
            .await
            .unwrap();
        let cafe = places.iter().find(|p| p.name == "Corner Cafe").unwrap();
        assert_eq!(cafe.categories, vec!["Cafe".to_string(), "Bakery".to_string()]);
        assert_eq!(cafe.city.as_deref(), Some("Lund"));
    }

    #[tokio::test]
    async fn second_import_reuses_categories() {
        let storage = InMemoryStorage::new();
        import(&storage, ImportFile::from_toml(SAMPLE).unwrap())
            .await
            .unwrap();
        let again = import(&storage, ImportFile::from_toml(SAMPLE).unwrap())
            .await
            .unwrap();
        assert_eq!(again.categories_created, 0);
        assert_eq!(storage.get_all_categories().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_category_is_rejected() {
        let storage = InMemoryStorage::new();
        let file = ImportFile::from_toml(
            r#"
[[places]]
name = "Lost"
categories = ["Nowhere"]
"#,
        )
        .unwrap();
        let err = import(&storage, file).await.unwrap_err();
        assert!(matches!(err, PlacesError::InvalidRequest(_)));
    }
}
