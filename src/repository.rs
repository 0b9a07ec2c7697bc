use crate::domain::{Place, PlaceStatus};
use crate::error::Result;
use crate::storage::Storage;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Category restriction for a place query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    /// Every published place.
    #[default]
    All,
    /// Places tagged with at least one of these categories.
    AnyOf(BTreeSet<Uuid>),
}

impl CategoryFilter {
    /// An empty selection means "no filter", not "match nothing".
    pub fn from_ids<I: IntoIterator<Item = Uuid>>(ids: I) -> Self {
        let ids: BTreeSet<Uuid> = ids.into_iter().collect();
        if ids.is_empty() {
            CategoryFilter::All
        } else {
            CategoryFilter::AnyOf(ids)
        }
    }

    pub fn ids(&self) -> Vec<Uuid> {
        match self {
            CategoryFilter::All => Vec::new(),
            CategoryFilter::AnyOf(ids) => ids.iter().copied().collect(),
        }
    }

    pub fn matches(&self, place: &Place) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::AnyOf(ids) => place.category_ids.iter().any(|id| ids.contains(id)),
        }
    }
}

/// Place Repository: published places, optionally filtered by category.
#[derive(Clone)]
pub struct PlaceRepository {
    storage: Arc<dyn Storage>,
}

impl PlaceRepository {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// The complete matching set; there is no paging. Storage errors propagate as-is.
    pub async fn list_places(&self, filter: &CategoryFilter) -> Result<Vec<Place>> {
        let places = self
            .storage
            .query_places(PlaceStatus::Published, &filter.ids())
            .await?;
        debug!(count = places.len(), filter = ?filter, "Listed places");
        Ok(places)
    }
}
