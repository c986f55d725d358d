use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// Storage keys shared with the browser client
pub const TOKEN_KEY: &str = "token";
pub const LEGACY_TOKEN_KEY: &str = "access_token";
pub const USER_KEY: &str = "user";
pub const LIKED_PLACES_KEY: &str = "likedPlaces";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create store directory: {0}")]
    DirectoryError(String),
    #[error("Stored value for '{key}' is not valid JSON: {source}")]
    JsonError {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Local persisted client state: a flat key/value table
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store and initialize the schema
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        let store = Store { conn };
        store.initialize_schema()?;

        Ok(store)
    }

    /// In-memory store for tests and throwaway sessions
    pub fn in_memory() -> Result<Self, StoreError> {
        let store = Store { conn: Connection::open_in_memory()? };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), StoreError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS storage (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM storage WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO storage (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![
                key,
                value,
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM storage WHERE key = ?1", rusqlite::params![key])?;
        Ok(())
    }

    /// Read and decode a JSON value
    pub fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::JsonError { key: key.to_string(), source }),
            None => Ok(None),
        }
    }

    pub fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)
            .map_err(|source| StoreError::JsonError { key: key.to_string(), source })?;
        self.set(key, &raw)
    }

    /// Liked place ids, None if never saved; a corrupt entry is treated as empty
    pub fn liked_places(&self) -> Result<Option<BTreeSet<u32>>, StoreError> {
        match self.get_json::<BTreeSet<u32>>(LIKED_PLACES_KEY) {
            Ok(liked) => Ok(liked),
            Err(StoreError::JsonError { .. }) => {
                tracing::warn!("Discarding unreadable likedPlaces entry");
                Ok(Some(BTreeSet::new()))
            }
            Err(e) => Err(e),
        }
    }

    pub fn set_liked_places(&self, liked: &BTreeSet<u32>) -> Result<(), StoreError> {
        self.set_json(LIKED_PLACES_KEY, liked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = Store::in_memory().unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);

        store.set(TOKEN_KEY, "abc").unwrap();
        store.set(TOKEN_KEY, "def").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("def"));

        store.remove(TOKEN_KEY).unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_liked_places_roundtrip_and_corruption() {
        let store = Store::in_memory().unwrap();
        assert_eq!(store.liked_places().unwrap(), None);

        let liked: BTreeSet<u32> = [2, 5].into_iter().collect();
        store.set_liked_places(&liked).unwrap();
        assert_eq!(store.liked_places().unwrap(), Some(liked));

        store.set(LIKED_PLACES_KEY, "not json").unwrap();
        assert_eq!(store.liked_places().unwrap(), Some(BTreeSet::new()));
    }

    #[test]
    fn test_store_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ecotrack.db");
        let path_str = path.to_str().unwrap();
        {
            let store = Store::new(path_str).unwrap();
            store.set(USER_KEY, "{}").unwrap();
        }
        let store = Store::new(path_str).unwrap();
        assert_eq!(store.get(USER_KEY).unwrap().as_deref(), Some("{}"));
    }
}
