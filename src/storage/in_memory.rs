use super::Storage;
use crate::domain::{Place, PlaceCategory, PlaceStatus};
use crate::error::{PlacesError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    categories: Arc<Mutex<HashMap<Uuid, PlaceCategory>>>,
    places: Arc<Mutex<HashMap<Uuid, Place>>>,
    settings: Arc<Mutex<HashMap<String, String>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            categories: Arc::new(Mutex::new(HashMap::new())),
            places: Arc::new(Mutex::new(HashMap::new())),
            settings: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

fn resolve_labels(place: &mut Place, categories: &HashMap<Uuid, PlaceCategory>) {
    place.categories = place
        .category_ids
        .iter()
        .filter_map(|id| categories.get(id).map(|c| c.name.clone()))
        .collect();
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_category(&self, category: &mut PlaceCategory) -> Result<()> {
        let id = Uuid::new_v4();
        category.id = Some(id);

        let mut categories = self.categories.lock().await;
        categories.insert(id, category.clone());

        debug!("Created category: {} with id {}", category.name, id);
        Ok(())
    }

    async fn get_all_categories(&self) -> Result<Vec<PlaceCategory>> {
        let categories = self.categories.lock().await;
        let mut all: Vec<PlaceCategory> = categories.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn create_place(&self, place: &mut Place) -> Result<()> {
        let categories = self.categories.lock().await;
        if let Some(unknown) = place.category_ids.iter().find(|id| !categories.contains_key(id)) {
            return Err(PlacesError::InvalidRequest(format!(
                "unknown category id {unknown}"
            )));
        }

        let id = Uuid::new_v4();
        place.id = Some(id);
        place.normalize_coordinates();
        resolve_labels(place, &categories);

        let mut places = self.places.lock().await;
        places.insert(id, place.clone());

        debug!("Created place: {} with id {} ({})", place.name, id, place.status);
        Ok(())
    }

    async fn get_place_by_id(&self, place_id: Uuid) -> Result<Option<Place>> {
        let categories = self.categories.lock().await;
        let places = self.places.lock().await;
        Ok(places.get(&place_id).cloned().map(|mut place| {
            resolve_labels(&mut place, &categories);
            place
        }))
    }

    async fn query_places(&self, status: PlaceStatus, category_ids: &[Uuid]) -> Result<Vec<Place>> {
        let categories = self.categories.lock().await;
        let places = self.places.lock().await;
        let mut matching: Vec<Place> = places
            .values()
            .filter(|p| p.status == status)
            .filter(|p| {
                category_ids.is_empty() || p.category_ids.iter().any(|id| category_ids.contains(id))
            })
            .cloned()
            .map(|mut place| {
                resolve_labels(&mut place, &categories);
                place
            })
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let settings = self.settings.lock().await;
        Ok(settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let mut settings = self.settings.lock().await;
        settings.insert(key.to_string(), value.to_string());
        debug!("Stored setting {}", key);
        Ok(())
    }
}
