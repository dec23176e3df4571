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

//! Audit trail of fetch attempts.
//!
//! Every attempt to fetch a reading produces a `FetchLog` entry, whether it
//! succeeded or not. Successful attempts also store the raw response body in a
//! `PayloadStore` under the entry's `blob_id`.

use crate::registry::Location;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("log entry {0}/{1} already exists")]
    Duplicate(String, String),
    #[error("audit storage unavailable: {0}")]
    Unavailable(String),
}

/// One fetch attempt.
///
/// Entries are partitioned by UTC day (`YYYYMMDD`) and identified within a
/// partition by `HHMMSS-xxxxxxxx` where the suffix is random.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchLog {
    pub partition_key: String,
    pub row_key: String,
    pub timestamp: DateTime<Utc>,
    pub country: String,
    pub city: String,
    pub is_success: bool,
    pub error_message: Option<String>,
    pub blob_id: String,
}

impl FetchLog {
    pub fn new(location: &Location, now: DateTime<Utc>, error_message: Option<String>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let row_key = format!("{}-{}", now.format("%H%M%S"), &suffix[..8]);

        FetchLog {
            partition_key: now.format("%Y%m%d").to_string(),
            blob_id: row_key.clone(),
            row_key,
            timestamp: now,
            country: location.country.clone(),
            city: location.city.clone(),
            is_success: error_message.is_none(),
            error_message,
        }
    }
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn add(&self, log: FetchLog) -> Result<(), AuditError>;

    /// Entries with a timestamp in `[start, end]`, newest first.
    async fn by_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<FetchLog>, AuditError>;

    async fn by_id(&self, partition_key: &str, row_key: &str) -> Result<Option<FetchLog>, AuditError>;
}

#[async_trait]
pub trait PayloadStore: Send + Sync {
    /// Store a payload, replacing any existing payload with the same id.
    async fn store(&self, blob_id: &str, payload: &str) -> Result<(), AuditError>;

    async fn get(&self, blob_id: &str) -> Result<Option<String>, AuditError>;
}

#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: RwLock<BTreeMap<(String, String), FetchLog>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn add(&self, log: FetchLog) -> Result<(), AuditError> {
        let key = (log.partition_key.clone(), log.row_key.clone());
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return Err(AuditError::Duplicate(key.0, key.1));
        }

        entries.insert(key, log);
        Ok(())
    }

    async fn by_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<FetchLog>, AuditError> {
        let entries = self.entries.read().await;
        let mut out: Vec<FetchLog> = entries
            .values()
            .filter(|l| l.timestamp >= start && l.timestamp <= end)
            .cloned()
            .collect();

        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(out)
    }

    async fn by_id(&self, partition_key: &str, row_key: &str) -> Result<Option<FetchLog>, AuditError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(partition_key.to_owned(), row_key.to_owned())).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPayloadStore {
    blobs: RwLock<HashMap<String, String>>,
}

impl MemoryPayloadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PayloadStore for MemoryPayloadStore {
    async fn store(&self, blob_id: &str, payload: &str) -> Result<(), AuditError> {
        let mut blobs = self.blobs.write().await;
        blobs.insert(blob_id.to_owned(), payload.to_owned());
        Ok(())
    }

    async fn get(&self, blob_id: &str) -> Result<Option<String>, AuditError> {
        let blobs = self.blobs.read().await;
        Ok(blobs.get(blob_id).cloned())
    }
}
