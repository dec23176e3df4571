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
use crate::store::WeatherRecord;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct LocationLabels {
    country: String,
    city: String,
}

impl From<&Location> for LocationLabels {
    fn from(loc: &Location) -> Self {
        LocationLabels {
            country: loc.country.clone(),
            city: loc.city.clone(),
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct FetchLabels {
    country: String,
    city: String,
    result: String,
}

/// Holder for metrics that are updated after each fetch and upsert.
///
/// All metrics are created and registered upon call to `WeatherMetrics::new()`. Metrics
/// share the prefix "weather_" and have "country" and "city" labels.
#[derive(Debug, Clone)]
pub struct WeatherMetrics {
    temperature: Family<LocationLabels, Gauge<f64, AtomicU64>>,
    min_temperature: Family<LocationLabels, Gauge<f64, AtomicU64>>,
    max_temperature: Family<LocationLabels, Gauge<f64, AtomicU64>>,
    fetches: Family<FetchLabels, Counter>,
}

impl WeatherMetrics {
    pub fn new(reg: &mut Registry) -> Self {
        let temperature = Family::<LocationLabels, Gauge<f64, AtomicU64>>::default();
        let min_temperature = Family::<LocationLabels, Gauge<f64, AtomicU64>>::default();
        let max_temperature = Family::<LocationLabels, Gauge<f64, AtomicU64>>::default();
        let fetches = Family::<FetchLabels, Counter>::default();

        reg.register(
            "weather_temperature_degrees",
            "Latest temperature in celsius",
            temperature.clone(),
        );
        reg.register(
            "weather_min_temperature_degrees",
            "Lowest temperature observed in celsius",
            min_temperature.clone(),
        );
        reg.register(
            "weather_max_temperature_degrees",
            "Highest temperature observed in celsius",
            max_temperature.clone(),
        );
        reg.register("weather_fetches", "Fetch attempts by result", fetches.clone());

        Self {
            temperature,
            min_temperature,
            max_temperature,
            fetches,
        }
    }

    /// Set temperature gauges from the state of a record after an upsert.
    pub fn record(&self, record: &WeatherRecord) {
        let labels = LocationLabels::from(&record.location());
        self.temperature.get_or_create(&labels).set(record.temperature);
        self.min_temperature.get_or_create(&labels).set(record.min_temperature);
        self.max_temperature.get_or_create(&labels).set(record.max_temperature);
    }

    pub fn fetch(&self, location: &Location, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.fetches
            .get_or_create(&FetchLabels {
                country: location.country.clone(),
                city: location.city.clone(),
                result: result.to_owned(),
            })
            .inc();
    }
}
