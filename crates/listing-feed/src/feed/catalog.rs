use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use super::domain::{FeedConfig, PropertyRecord};

/// Point-in-time copy of the catalog a pass works from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    #[serde(default, deserialize_with = "readable_records")]
    pub properties: Vec<PropertyRecord>,
    #[serde(default)]
    pub feed_config: Option<FeedConfig>,
}

/// Rows are read one by one so a bad row never costs the whole catalog.
/// Only rows without a usable `id` (or that are not objects) are dropped.
fn readable_records<'de, D>(deserializer: D) -> Result<Vec<PropertyRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(rows
        .into_iter()
        .enumerate()
        .filter_map(|(row, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(row, error = %err, "unreadable catalog row dropped");
                None
            }
        })
        .collect())
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid catalog document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the back-office persistence layer.
///
/// The engine never changes listings; the only write is the publish
/// timestamp stored with the feed configuration.
pub trait CatalogSource: Send + Sync {
    /// Listings and feed configuration, read together.
    fn snapshot(&self) -> Result<CatalogSnapshot, CatalogError>;
    fn feed_config(&self) -> Result<Option<FeedConfig>, CatalogError>;
    fn record_publish(&self, last_update: DateTime<Utc>) -> Result<(), CatalogError>;
}

/// Catalog held in memory, optionally seeded from a JSON export of the
/// persistence layer (`{"properties": [...], "feedConfig": {...}}`).
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogSnapshot>,
}

impl InMemoryCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let snapshot = serde_json::from_reader(reader)?;
        Ok(Self::new(snapshot))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Inserts or replaces a listing by id, keeping the position of an
    /// existing entry. Returns `true` when an entry was replaced.
    pub fn upsert(&self, record: PropertyRecord) -> bool {
        let mut state = self.write();
        if let Some(existing) = state
            .properties
            .iter_mut()
            .find(|existing| existing.id == record.id)
        {
            *existing = record;
            return true;
        }
        state.properties.push(record);
        false
    }

    pub fn remove(&self, id: i64) -> bool {
        let mut state = self.write();
        let before = state.properties.len();
        state.properties.retain(|record| record.id != id);
        state.properties.len() != before
    }

    pub fn set_feed_config(&self, config: Option<FeedConfig>) {
        self.write().feed_config = config;
    }

    fn read(&self) -> RwLockReadGuard<'_, CatalogSnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CatalogSnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CatalogSource for InMemoryCatalog {
    fn snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        Ok(self.read().clone())
    }

    fn feed_config(&self) -> Result<Option<FeedConfig>, CatalogError> {
        Ok(self.read().feed_config.clone())
    }

    fn record_publish(&self, last_update: DateTime<Utc>) -> Result<(), CatalogError> {
        if let Some(config) = self.write().feed_config.as_mut() {
            config.last_update = Some(last_update);
        }
        Ok(())
    }
}
