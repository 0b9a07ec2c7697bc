use crate::domain::{Place, PlaceCategory, PlaceStatus};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

/// Storage trait for the place directory content store
#[async_trait]
pub trait Storage: Send + Sync {
    // Category operations
    async fn create_category(&self, category: &mut PlaceCategory) -> Result<()>;
    async fn get_all_categories(&self) -> Result<Vec<PlaceCategory>>;

    // Place operations
    async fn create_place(&self, place: &mut Place) -> Result<()>;
    async fn get_place_by_id(&self, place_id: Uuid) -> Result<Option<Place>>;

    /// Places with the given status. A non-empty `category_ids` keeps only places
    /// tagged with at least one of them. Category labels are resolved on every call.
    async fn query_places(&self, status: PlaceStatus, category_ids: &[Uuid]) -> Result<Vec<Place>>;

    // Settings operations
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}

/// Database path that selects [`InMemoryStorage`].
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Opens the backend named by a database path; `:memory:` selects [`InMemoryStorage`].
pub fn open_storage(path: &str) -> Result<std::sync::Arc<dyn Storage>> {
    if path == IN_MEMORY_PATH {
        Ok(std::sync::Arc::new(InMemoryStorage::new()))
    } else {
        Ok(std::sync::Arc::new(SqliteStorage::open(path)?))
    }
}
