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

use crate::audit::{AuditError, FetchLog};
use crate::engine::{Engine, PayloadLookup};
use crate::registry::Location;
use crate::store::{StoreError, WeatherRecord};
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

const OPENMETRICS_FORMAT: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";
const JSON_FORMAT: &str = "application/json";

/// State shared by every request handler.
pub struct RequestContext {
    engine: Arc<Engine>,
    registry: Registry,
}

impl RequestContext {
    pub fn new(engine: Arc<Engine>, registry: Registry) -> Self {
        RequestContext { engine, registry }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    message: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(message = "error handling request", error = %self);
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let body = ErrorBody {
            status_code: status.as_u16(),
            message: "An unexpected error occurred. Please try again later.",
        };

        (status, Json(body)).into_response()
    }
}

/// Build the REST API and metrics routes.
pub fn router(context: Arc<RequestContext>) -> Router {
    Router::new()
        .route("/api/weather", get(all_records))
        .route("/api/weather/minmax", get(min_max))
        .route("/api/weather/:country/:city", get(one_record))
        .route("/api/logs", get(fetch_logs))
        .route("/api/payload", get(payload))
        .route("/metrics", get(text_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn all_records(State(context): State<Arc<RequestContext>>) -> Result<Json<Vec<WeatherRecord>>, ApiError> {
    Ok(Json(context.engine.all().await?))
}

async fn one_record(
    State(context): State<Arc<RequestContext>>,
    Path((country, city)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let location = Location::new(country, city);
    Ok(match context.engine.current(&location).await? {
        Some(r) => Json(r).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MinMaxParams {
    country: String,
    city: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
}

async fn min_max(
    State(context): State<Arc<RequestContext>>,
    Query(params): Query<MinMaxParams>,
) -> Result<Json<Vec<WeatherRecord>>, ApiError> {
    let location = Location::new(params.country, params.city);
    let records = context
        .engine
        .range(&location, params.start_date, params.end_date)
        .await?;

    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
struct LogParams {
    from: Option<String>,
    to: Option<String>,
}

fn parse_date(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|d| d.with_timezone(&Utc))
}

async fn fetch_logs(
    State(context): State<Arc<RequestContext>>,
    Query(params): Query<LogParams>,
) -> Result<Response, ApiError> {
    let (from, to) = match (parse_date(params.from.as_deref()), parse_date(params.to.as_deref())) {
        (Some(from), Some(to)) => (from, to),
        _ => {
            return Ok((
                StatusCode::BAD_REQUEST,
                "Please provide valid 'from' and 'to' date parameters",
            )
                .into_response())
        }
    };

    let logs: Vec<FetchLog> = context.engine.logs(from, to).await?;
    Ok(Json(logs).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayloadParams {
    partition_key: Option<String>,
    row_key: Option<String>,
}

async fn payload(
    State(context): State<Arc<RequestContext>>,
    Query(params): Query<PayloadParams>,
) -> Result<Response, ApiError> {
    let (partition_key, row_key) = match (params.partition_key, params.row_key) {
        (Some(p), Some(r)) if !p.is_empty() && !r.is_empty() => (p, r),
        _ => {
            return Ok((
                StatusCode::BAD_REQUEST,
                "Please provide 'partitionKey' and 'rowKey' parameters",
            )
                .into_response())
        }
    };

    Ok(match context.engine.payload(&partition_key, &row_key).await? {
        PayloadLookup::Found(body) => ([(CONTENT_TYPE, JSON_FORMAT)], body).into_response(),
        PayloadLookup::NoLog => (StatusCode::NOT_FOUND, "Log entry not found").into_response(),
        PayloadLookup::NoPayload => (StatusCode::NOT_FOUND, "Payload not found").into_response(),
    })
}

async fn text_metrics(State(context): State<Arc<RequestContext>>) -> Response {
    let mut buf = String::new();

    match encode(&mut buf, &context.registry) {
        Ok(_) => {
            tracing::debug!(message = "encoded prometheus metrics to text format", num_bytes = buf.len());
            ([(CONTENT_TYPE, OPENMETRICS_FORMAT)], buf).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
