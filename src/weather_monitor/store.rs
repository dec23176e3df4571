// weather_monitor - Weather poller with running temperature extremes
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::registry::Location;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record for {0} already exists")]
    Duplicate(Location),
    #[error("no record with id {id} for {location}")]
    Missing { id: Uuid, location: Location },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persisted aggregate state for one (city, country) key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    pub id: Uuid,
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub recorded_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl WeatherRecord {
    pub fn location(&self) -> Location {
        Location::new(self.country.clone(), self.city.clone())
    }
}

/// A record that has not been inserted yet and so has no identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub recorded_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Keyed storage for weather records.
///
/// Records are keyed by (country, city). Implementations must keep one history
/// row per successful `insert` or `save` so that `query_range` can return how a
/// key evolved over time. Each history row is a copy of the record as written,
/// with `recorded_at` set to the time of that write (`last_updated`).
#[async_trait]
pub trait WeatherStore: Send + Sync {
    /// Current record for the location, `None` if it has never been written.
    async fn find(&self, location: &Location) -> Result<Option<WeatherRecord>, StoreError>;

    /// Insert a record for a new key, assigning it an identity.
    async fn insert(&self, record: NewRecord) -> Result<WeatherRecord, StoreError>;

    /// Update an existing record in place. The identity must match the stored one.
    async fn save(&self, record: WeatherRecord) -> Result<WeatherRecord, StoreError>;

    /// Every current record, ordered by country then city.
    async fn all(&self) -> Result<Vec<WeatherRecord>, StoreError>;

    /// History rows for the location with `recorded_at` in `[start, end]`, oldest first.
    async fn query_range(
        &self,
        location: &Location,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WeatherRecord>, StoreError>;
}

type Key = (String, String);

fn key(location: &Location) -> Key {
    (location.country.clone(), location.city.clone())
}

#[derive(Debug, Default)]
struct Tables {
    current: BTreeMap<Key, WeatherRecord>,
    history: BTreeMap<Key, Vec<WeatherRecord>>,
}

impl Tables {
    fn append_history(&mut self, record: &WeatherRecord) {
        let mut row = record.clone();
        row.recorded_at = record.last_updated;
        self.history.entry(key(&record.location())).or_default().push(row);
    }
}

/// In-process `WeatherStore`, contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WeatherStore for MemoryStore {
    async fn find(&self, location: &Location) -> Result<Option<WeatherRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.current.get(&key(location)).cloned())
    }

    async fn insert(&self, record: NewRecord) -> Result<WeatherRecord, StoreError> {
        let location = Location::new(record.country.clone(), record.city.clone());
        let mut tables = self.tables.write().await;
        if tables.current.contains_key(&key(&location)) {
            return Err(StoreError::Duplicate(location));
        }

        let inserted = WeatherRecord {
            id: Uuid::new_v4(),
            city: record.city,
            country: record.country,
            temperature: record.temperature,
            min_temperature: record.min_temperature,
            max_temperature: record.max_temperature,
            recorded_at: record.recorded_at,
            last_updated: record.last_updated,
        };

        tables.append_history(&inserted);
        tables.current.insert(key(&location), inserted.clone());
        Ok(inserted)
    }

    async fn save(&self, record: WeatherRecord) -> Result<WeatherRecord, StoreError> {
        let location = record.location();
        let mut tables = self.tables.write().await;
        match tables.current.get(&key(&location)) {
            Some(existing) if existing.id == record.id => {}
            _ => {
                return Err(StoreError::Missing {
                    id: record.id,
                    location,
                })
            }
        }

        tables.append_history(&record);
        tables.current.insert(key(&location), record.clone());
        Ok(record)
    }

    async fn all(&self) -> Result<Vec<WeatherRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.current.values().cloned().collect())
    }

    async fn query_range(
        &self,
        location: &Location,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WeatherRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .history
            .get(&key(location))
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.recorded_at >= start && r.recorded_at <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod test {
    use super::{MemoryStore, NewRecord, StoreError, WeatherStore};
    use crate::registry::Location;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn new_record(country: &str, city: &str, temp: f64, now: DateTime<Utc>) -> NewRecord {
        NewRecord {
            city: city.to_owned(),
            country: country.to_owned(),
            temperature: temp,
            min_temperature: temp - 1.0,
            max_temperature: temp + 1.0,
            recorded_at: now,
            last_updated: now,
        }
    }

    #[tokio::test]
    async fn test_find_unknown_is_none() {
        let store = MemoryStore::new();
        let res = store.find(&Location::new("FR", "Paris")).await.unwrap();
        assert_eq!(None, res);
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let store = MemoryStore::new();
        let inserted = store.insert(new_record("FR", "Paris", 18.0, at(0))).await.unwrap();
        let found = store.find(&Location::new("FR", "Paris")).await.unwrap();

        assert_eq!(Some(inserted), found);
    }

    #[tokio::test]
    async fn test_insert_duplicate_key() {
        let store = MemoryStore::new();
        store.insert(new_record("FR", "Paris", 18.0, at(0))).await.unwrap();
        let res = store.insert(new_record("FR", "Paris", 19.0, at(1))).await;

        assert!(matches!(res, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_save_keeps_identity() {
        let store = MemoryStore::new();
        let mut record = store.insert(new_record("FR", "Paris", 18.0, at(0))).await.unwrap();
        let id = record.id;

        record.temperature = 21.5;
        record.last_updated = at(60);
        store.save(record).await.unwrap();

        let found = store.find(&Location::new("FR", "Paris")).await.unwrap().unwrap();
        assert_eq!(id, found.id);
        assert_eq!(21.5, found.temperature);
        assert_eq!(at(0), found.recorded_at);
    }

    #[tokio::test]
    async fn test_save_unknown_identity() {
        let store = MemoryStore::new();
        let mut record = store.insert(new_record("FR", "Paris", 18.0, at(0))).await.unwrap();
        record.id = Uuid::new_v4();

        let res = store.save(record).await;
        assert!(matches!(res, Err(StoreError::Missing { .. })));
    }

    #[tokio::test]
    async fn test_all_ordered_by_key() {
        let store = MemoryStore::new();
        store.insert(new_record("UK", "London", 12.0, at(0))).await.unwrap();
        store.insert(new_record("FR", "Paris", 18.0, at(0))).await.unwrap();
        store.insert(new_record("FR", "Lyon", 20.0, at(0))).await.unwrap();

        let cities: Vec<String> = store.all().await.unwrap().into_iter().map(|r| r.city).collect();
        assert_eq!(vec!["Lyon", "Paris", "London"], cities);
    }

    #[tokio::test]
    async fn test_query_range_uses_history() {
        let store = MemoryStore::new();
        let paris = Location::new("FR", "Paris");
        let mut record = store.insert(new_record("FR", "Paris", 18.0, at(0))).await.unwrap();

        for (i, temp) in [22.0, 10.0].iter().enumerate() {
            record.temperature = *temp;
            record.last_updated = at(60 * (i as i64 + 1));
            record = store.save(record).await.unwrap();
        }

        let rows = store.query_range(&paris, at(0), at(120)).await.unwrap();
        let temps: Vec<f64> = rows.iter().map(|r| r.temperature).collect();
        assert_eq!(vec![18.0, 22.0, 10.0], temps);
        assert_eq!(vec![at(0), at(60), at(120)], rows.iter().map(|r| r.recorded_at).collect::<Vec<_>>());

        // Both ends are inclusive
        let rows = store.query_range(&paris, at(60), at(60)).await.unwrap();
        assert_eq!(1, rows.len());
        assert_eq!(22.0, rows[0].temperature);

        let rows = store.query_range(&paris, at(121), at(121) + Duration::hours(1)).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_query_range_inverted_and_unknown() {
        let store = MemoryStore::new();
        let paris = Location::new("FR", "Paris");
        store.insert(new_record("FR", "Paris", 18.0, at(0))).await.unwrap();

        assert!(store.query_range(&paris, at(10), at(-10)).await.unwrap().is_empty());
        assert!(store
            .query_range(&Location::new("UK", "London"), at(-10), at(10))
            .await
            .unwrap()
            .is_empty());
    }
}
