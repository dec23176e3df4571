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

//! Weather poller that tracks running temperature extremes per location
//!
//! ## Features
//!
//! `weather_monitor` fetches current conditions for a fixed list of locations from the
//! [OpenWeatherMap] API at a regular interval. For each location it keeps a single record
//! holding the latest temperature along with the lowest and highest temperatures seen since
//! the record was created. Every fetch attempt is written to an audit log and the raw
//! response body of successful fetches is kept alongside it.
//!
//! Records are seeded from the minimum and maximum reported by the API on the first
//! successful fetch for a location. After that, the bounds only ever widen to include
//! each newly observed temperature.
//!
//! [OpenWeatherMap]: https://openweathermap.org/current
//!
//! ## API
//!
//! The following endpoints are exposed:
//!
//! * `GET /api/weather` - All current records.
//! * `GET /api/weather/{country}/{city}` - The current record for a location, 404 if there isn't one yet.
//! * `GET /api/weather/minmax?country=&city=&startDate=&endDate=` - Every update to a location
//!   between two RFC 3339 timestamps (inclusive).
//! * `GET /api/logs?from=&to=` - Fetch attempts between two RFC 3339 timestamps, newest first.
//! * `GET /api/payload?partitionKey=&rowKey=` - The raw response body of a fetch attempt.
//! * `GET /metrics` - Prometheus metrics.
//!
//! The following metrics are emitted:
//!
//! * `weather_temperature_degrees{country=$COUNTRY, city=$CITY}` - Latest temperature, in degrees celsius.
//! * `weather_min_temperature_degrees{country=$COUNTRY, city=$CITY}` - Lowest temperature seen, in degrees celsius.
//! * `weather_max_temperature_degrees{country=$COUNTRY, city=$CITY}` - Highest temperature seen, in degrees celsius.
//! * `weather_fetches_total{country=$COUNTRY, city=$CITY, result=$RESULT}` - Fetch attempts, by result.
//!
//! ## Build
//!
//! `weather_monitor` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! An OpenWeatherMap API key is required. It can be passed with `--api-key` or via the
//! `OPENWEATHER_API_KEY` environment variable. Locations are given as `COUNTRY/City`
//! and the flag may be repeated. When no locations are given, a default set of six
//! cities in the US, UK, and France is used.
//!
//! ```text
//! export OPENWEATHER_API_KEY=...
//! ./weather_monitor --location 'FR/Paris' --location 'UK/London' --refresh-secs 60
//! ```
//!
//! Records are kept in memory and are lost when the process exits.
//!

pub mod audit;
pub mod client;
pub mod engine;
pub mod http;
pub mod metrics;
pub mod registry;
pub mod store;
