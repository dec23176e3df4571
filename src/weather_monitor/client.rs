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
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Internal(#[from] reqwest::Error),
    #[error("invalid API URL {0}")]
    InvalidUrl(String),
    #[error("unknown location {0}")]
    UnknownLocation(Location),
    #[error("unexpected status {0} for {1}")]
    Unexpected(StatusCode, Url),
    #[error("malformed response: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("invalid reading: {0}")]
    Invalid(String),
}

/// A single observation for one location as reported by the weather source.
///
/// `min_temperature` and `max_temperature` are the bounds reported by the source
/// alongside the observation, not the running bounds kept by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub observed_at: DateTime<Utc>,
}

/// A reading along with the raw response body it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub reading: Reading,
    pub payload: String,
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, location: &Location) -> Result<Fetched, ClientError>;
}

#[derive(Debug)]
pub struct OpenWeatherClient {
    client: Client,
    weather_url: Url,
    api_key: String,
}

impl OpenWeatherClient {
    const USER_AGENT: &'static str = concat!("weather_monitor/", env!("CARGO_PKG_VERSION"));
    const JSON_RESPONSE: &'static str = "application/json";

    pub fn new<S: Into<String>>(client: Client, base_url: &str, api_key: S) -> Result<Self, ClientError> {
        let mut weather_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        weather_url
            .path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(base_url.to_owned()))?
            .pop_if_empty()
            .push("weather");

        Ok(OpenWeatherClient {
            client,
            weather_url,
            api_key: api_key.into(),
        })
    }

    async fn current(&self, location: &Location) -> Result<String, ClientError> {
        tracing::debug!(message = "making current weather request", url = %self.weather_url, location = %location);

        let query = format!("{},{}", location.city, location.country);
        let res = self
            .client
            .get(self.weather_url.clone())
            .query(&[("q", query.as_str()), ("units", "metric"), ("appid", self.api_key.as_str())])
            .header(USER_AGENT, Self::USER_AGENT)
            .header(ACCEPT, Self::JSON_RESPONSE)
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::OK {
            Ok(res.text().await?)
        } else if status == StatusCode::NOT_FOUND {
            Err(ClientError::UnknownLocation(location.clone()))
        } else {
            Err(ClientError::Unexpected(status, self.weather_url.clone()))
        }
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch(&self, location: &Location) -> Result<Fetched, ClientError> {
        let payload = self.current(location).await?;
        let reading = parse_reading(location, &payload)?;
        Ok(Fetched { reading, payload })
    }
}

/// Convert a raw `/weather` response body into a `Reading` for the location.
///
/// The reading is keyed by the requested location rather than whatever name the
/// API echoes back, so that it always matches the registry entry it came from.
pub fn parse_reading(location: &Location, body: &str) -> Result<Reading, ClientError> {
    let res: CurrentWeather = serde_json::from_str(body).map_err(ClientError::Parse)?;
    let main = res.main;

    for v in [main.temp, main.temp_min, main.temp_max] {
        if !v.is_finite() {
            return Err(ClientError::Invalid(format!("non-finite temperature {}", v)));
        }
    }

    let temperature = one_decimal(main.temp);
    let min_temperature = one_decimal(main.temp_min);
    let max_temperature = one_decimal(main.temp_max);

    if min_temperature > max_temperature {
        return Err(ClientError::Invalid(format!(
            "minimum {} above maximum {}",
            min_temperature, max_temperature
        )));
    }

    // New records are seeded from these bounds so they must bracket the temperature
    if temperature < min_temperature || temperature > max_temperature {
        return Err(ClientError::Invalid(format!(
            "temperature {} outside reported range {} to {}",
            temperature, min_temperature, max_temperature
        )));
    }

    let observed_at = res
        .dt
        .and_then(|dt| Utc.timestamp_opt(dt, 0).single())
        .unwrap_or_else(Utc::now);

    Ok(Reading {
        city: location.city.clone(),
        country: location.country.clone(),
        temperature,
        min_temperature,
        max_temperature,
        observed_at,
    })
}

fn one_decimal(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Deserialize, Debug)]
struct CurrentWeather {
    #[serde(rename = "main")]
    main: MainData,
    #[serde(rename = "dt")]
    dt: Option<i64>,
}

#[derive(Deserialize, Debug)]
struct MainData {
    #[serde(rename = "temp")]
    temp: f64,
    #[serde(rename = "temp_min")]
    temp_min: f64,
    #[serde(rename = "temp_max")]
    temp_max: f64,
}
