use super::Storage;
use crate::domain::{Place, PlaceCategory, PlaceStatus};
use crate::error::{PlacesError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = r#"
    PRAGMA foreign_keys=ON;
    CREATE TABLE IF NOT EXISTS categories (
        id    TEXT PRIMARY KEY,
        name  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS places (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        address     TEXT,
        city        TEXT,
        latitude    REAL NOT NULL DEFAULT 0.0,
        longitude   REAL NOT NULL DEFAULT 0.0,
        status      TEXT NOT NULL,
        created_at  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS place_categories (
        place_id     TEXT NOT NULL REFERENCES places(id),
        category_id  TEXT NOT NULL REFERENCES categories(id),
        position     INTEGER NOT NULL,
        PRIMARY KEY (place_id, category_id)
    );
    CREATE INDEX IF NOT EXISTS idx_places_status ON places(status);
    CREATE TABLE IF NOT EXISTS settings (
        key    TEXT PRIMARY KEY,
        value  TEXT NOT NULL
    );
"#;

const PLACE_COLUMNS: &str = "p.id, p.name, p.address, p.city, p.latitude, p.longitude, p.status, p.created_at";

/// SQLite-backed content store
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

/// A `places` row before ids and timestamps are parsed
struct PlaceRow {
    id: String,
    name: String,
    address: Option<String>,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    status: String,
    created_at: String,
}

impl PlaceRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            city: row.get(3)?,
            latitude: row.get(4)?,
            longitude: row.get(5)?,
            status: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_place(self) -> Result<Place> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| PlacesError::Api {
                message: format!("Corrupt created_at on place {}: {e}", self.id),
            })?;
        let mut place = Place {
            id: Some(parse_id(&self.id)?),
            name: self.name,
            address: self.address,
            city: self.city,
            latitude: self.latitude.unwrap_or(0.0),
            longitude: self.longitude.unwrap_or(0.0),
            category_ids: Vec::new(),
            categories: Vec::new(),
            status: self.status.parse()?,
            created_at,
        };
        // Rows written before coordinates were normalized on insert
        place.normalize_coordinates();
        Ok(place)
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| PlacesError::Api {
        message: format!("Corrupt id '{raw}' in database: {e}"),
    })
}

impl SqliteStorage {
    /// Open (or create) the database file, creating parent directories and the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("Opened SQLite content store at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn load_categories(conn: &Connection, place: &mut Place) -> Result<()> {
        let place_id = place.id.map(|id| id.to_string()).unwrap_or_default();
        let mut stmt = conn.prepare(
            "SELECT pc.category_id, c.name FROM place_categories pc
             JOIN categories c ON c.id = pc.category_id
             WHERE pc.place_id = ?1 ORDER BY pc.position",
        )?;
        let rows = stmt
            .query_map(params![place_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        place.category_ids.clear();
        place.categories.clear();
        for (id, name) in rows {
            place.category_ids.push(parse_id(&id)?);
            place.categories.push(name);
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_category(&self, category: &mut PlaceCategory) -> Result<()> {
        let id = Uuid::new_v4();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO categories (id, name) VALUES (?1, ?2)",
            params![id.to_string(), category.name],
        )?;
        category.id = Some(id);

        debug!("Created category: {} with id {}", category.name, id);
        Ok(())
    }

    async fn get_all_categories(&self) -> Result<Vec<PlaceCategory>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, name)| {
                Ok(PlaceCategory {
                    id: Some(parse_id(&id)?),
                    name,
                })
            })
            .collect()
    }

    async fn create_place(&self, place: &mut Place) -> Result<()> {
        place.normalize_coordinates();
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        for category_id in &place.category_ids {
            let known: Option<String> = tx
                .query_row(
                    "SELECT name FROM categories WHERE id = ?1",
                    params![category_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if known.is_none() {
                return Err(PlacesError::InvalidRequest(format!(
                    "unknown category id {category_id}"
                )));
            }
        }

        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO places (id, name, address, city, latitude, longitude, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.to_string(),
                place.name,
                place.address,
                place.city,
                place.latitude,
                place.longitude,
                place.status.as_str(),
                place.created_at.to_rfc3339(),
            ],
        )?;
        for (position, category_id) in place.category_ids.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO place_categories (place_id, category_id, position)
                 VALUES (?1, ?2, ?3)",
                params![id.to_string(), category_id.to_string(), position as i64],
            )?;
        }
        tx.commit()?;

        place.id = Some(id);
        Self::load_categories(&conn, place)?;

        debug!("Created place: {} with id {} ({})", place.name, id, place.status);
        Ok(())
    }

    async fn get_place_by_id(&self, place_id: Uuid) -> Result<Option<Place>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                &format!("SELECT {PLACE_COLUMNS} FROM places p WHERE p.id = ?1"),
                params![place_id.to_string()],
                PlaceRow::from_row,
            )
            .optional()?;

        match row {
            Some(row) => {
                let mut place = row.into_place()?;
                Self::load_categories(&conn, &mut place)?;
                Ok(Some(place))
            }
            None => Ok(None),
        }
    }

    async fn query_places(&self, status: PlaceStatus, category_ids: &[Uuid]) -> Result<Vec<Place>> {
        let conn = self.conn.lock().await;

        let mut sql = format!("SELECT {PLACE_COLUMNS} FROM places p WHERE p.status = ?1");
        let mut bindings: Vec<String> = vec![status.as_str().to_string()];
        if !category_ids.is_empty() {
            // One JSON array parameter, so the filter size is not bound by SQLite's variable limit
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM place_categories pc
                   WHERE pc.place_id = p.id
                   AND pc.category_id IN (SELECT value FROM json_each(?2)))",
            );
            bindings.push(serde_json::to_string(category_ids)?);
        }
        sql.push_str(" ORDER BY p.name");

        let rows = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(bindings.iter()), PlaceRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut places = Vec::with_capacity(rows.len());
        for row in rows {
            let mut place = row.into_place()?;
            Self::load_categories(&conn, &mut place)?;
            places.push(place);
        }
        Ok(places)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )?;
        debug!("Stored setting {}", key);
        Ok(())
    }
}
