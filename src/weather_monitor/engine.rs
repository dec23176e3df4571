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

use crate::audit::{AuditError, AuditLog, FetchLog, PayloadStore};
use crate::client::{ClientError, Fetched, Reading, WeatherSource};
use crate::metrics::WeatherMetrics;
use crate::registry::{Location, Locations};
use crate::store::{NewRecord, StoreError, WeatherRecord, WeatherStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] ClientError),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

/// The single store call needed to persist a reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert {
    Insert(NewRecord),
    Save(WeatherRecord),
}

/// Decide how a reading changes the stored record for its location.
///
/// A new key is seeded with the bounds reported by the reading itself. An
/// existing key takes the new temperature unconditionally and widens its running
/// bounds against that temperature only, ignoring the reading's reported bounds.
/// Running bounds never narrow.
pub fn apply_reading(existing: Option<WeatherRecord>, reading: &Reading, now: DateTime<Utc>) -> Upsert {
    match existing {
        None => Upsert::Insert(NewRecord {
            city: reading.city.clone(),
            country: reading.country.clone(),
            temperature: reading.temperature,
            min_temperature: reading.min_temperature,
            max_temperature: reading.max_temperature,
            recorded_at: now,
            last_updated: now,
        }),
        Some(mut record) => {
            record.temperature = reading.temperature;
            record.min_temperature = record.min_temperature.min(reading.temperature);
            record.max_temperature = record.max_temperature.max(reading.temperature);
            record.last_updated = now;
            Upsert::Save(record)
        }
    }
}

/// Counts of what happened to each location during one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    /// Set when the pass did not run because another one was in progress.
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadLookup {
    Found(String),
    NoLog,
    NoPayload,
}

enum Outcome {
    Created,
    Updated,
}

/// Fetches readings for every registered location and applies them to the store.
pub struct Engine {
    locations: Locations,
    source: Arc<dyn WeatherSource>,
    store: Arc<dyn WeatherStore>,
    audit: Arc<dyn AuditLog>,
    payloads: Arc<dyn PayloadStore>,
    metrics: Option<WeatherMetrics>,
    pass: Mutex<()>,
}

impl Engine {
    pub fn new(
        locations: Locations,
        source: Arc<dyn WeatherSource>,
        store: Arc<dyn WeatherStore>,
        audit: Arc<dyn AuditLog>,
        payloads: Arc<dyn PayloadStore>,
    ) -> Self {
        Engine {
            locations,
            source,
            store,
            audit,
            payloads,
            metrics: None,
            pass: Mutex::new(()),
        }
    }

    pub fn with_metrics(mut self, metrics: WeatherMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn locations(&self) -> &Locations {
        &self.locations
    }

    /// Run one pass over every registered location.
    ///
    /// Locations are processed in registry order and a failure for one location
    /// never stops the others. If another pass is still running, this one is
    /// skipped entirely so that two passes never interleave updates to the same key.
    pub async fn update_all(&self) -> PassSummary {
        let _guard = match self.pass.try_lock() {
            Ok(g) => g,
            Err(_) => {
                tracing::warn!(message = "previous weather update pass still running, skipping");
                return PassSummary {
                    skipped: true,
                    ..PassSummary::default()
                };
            }
        };

        let mut summary = PassSummary::default();
        for location in self.locations.iter() {
            match self.update_location(location).await {
                Ok(Outcome::Created) => summary.created += 1,
                Ok(Outcome::Updated) => summary.updated += 1,
                Err(UpdateError::Fetch(e)) => {
                    summary.failed += 1;
                    tracing::error!(
                        message = "failed to fetch newest weather information",
                        location = %location,
                        error = %e,
                    );
                }
                Err(UpdateError::Store(e)) => {
                    summary.failed += 1;
                    tracing::error!(message = "failed to store weather information", location = %location, error = %e);
                }
            }
        }

        tracing::info!(
            message = "weather update pass complete",
            created = summary.created,
            updated = summary.updated,
            failed = summary.failed,
        );

        summary
    }

    async fn update_location(&self, location: &Location) -> Result<Outcome, UpdateError> {
        let res = self.source.fetch(location).await;
        self.record_attempt(location, &res).await;
        if let Some(m) = &self.metrics {
            m.fetch(location, res.is_ok());
        }

        let fetched = res?;
        let existing = self.store.find(location).await?;
        let (record, outcome) = match apply_reading(existing, &fetched.reading, Utc::now()) {
            Upsert::Insert(new) => (self.store.insert(new).await?, Outcome::Created),
            Upsert::Save(record) => (self.store.save(record).await?, Outcome::Updated),
        };

        tracing::debug!(
            message = "stored weather record",
            location = %location,
            temperature = record.temperature,
            min_temperature = record.min_temperature,
            max_temperature = record.max_temperature,
        );

        if let Some(m) = &self.metrics {
            m.record(&record);
        }

        Ok(outcome)
    }

    async fn record_attempt(&self, location: &Location, res: &Result<Fetched, ClientError>) {
        let log = FetchLog::new(location, Utc::now(), res.as_ref().err().map(|e| e.to_string()));
        let blob_id = log.blob_id.clone();

        // Payloads are only reachable through their log entry
        if let Err(e) = self.audit.add(log).await {
            tracing::error!(message = "failed to record fetch attempt", location = %location, error = %e);
            return;
        }

        if let Ok(fetched) = res {
            if let Err(e) = self.payloads.store(&blob_id, &fetched.payload).await {
                tracing::error!(message = "failed to store raw payload", blob_id = %blob_id, error = %e);
            }
        }
    }

    pub async fn current(&self, location: &Location) -> Result<Option<WeatherRecord>, StoreError> {
        self.store.find(location).await
    }

    pub async fn all(&self) -> Result<Vec<WeatherRecord>, StoreError> {
        self.store.all().await
    }

    pub async fn range(
        &self,
        location: &Location,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WeatherRecord>, StoreError> {
        self.store.query_range(location, start, end).await
    }

    pub async fn logs(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<FetchLog>, AuditError> {
        self.audit.by_time_range(start, end).await
    }

    pub async fn payload(&self, partition_key: &str, row_key: &str) -> Result<PayloadLookup, AuditError> {
        let log = match self.audit.by_id(partition_key, row_key).await? {
            Some(l) => l,
            None => return Ok(PayloadLookup::NoLog),
        };

        Ok(match self.payloads.get(&log.blob_id).await? {
            Some(p) => PayloadLookup::Found(p),
            None => PayloadLookup::NoPayload,
        })
    }
}
