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

use clap::Parser;
use prometheus_client::registry::Registry;
use reqwest::Client;
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, Level};
use weather_monitor::audit::{MemoryAuditLog, MemoryPayloadStore};
use weather_monitor::client::OpenWeatherClient;
use weather_monitor::engine::Engine;
use weather_monitor::http::RequestContext;
use weather_monitor::metrics::WeatherMetrics;
use weather_monitor::registry::{Location, Locations};
use weather_monitor::store::MemoryStore;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 5080);
const DEFAULT_REFRESH_SECS: u64 = 60;
const DEFAULT_TIMEOUT_MILLIS: u64 = 5000;
const DEFAULT_API_URL: &str = "https://api.openweathermap.org/data/2.5/";

#[derive(Debug, Parser)]
#[clap(name = "weather_monitor", version = clap::crate_version!())]
struct WeatherMonitorApplication {
    /// Location to poll, as COUNTRY/City (e.g. 'FR/Paris'). May be repeated. If not
    /// given, a default set of US, UK, and French cities is polled.
    #[clap(long = "location", value_name = "COUNTRY/City")]
    locations: Vec<Location>,

    /// API key for OpenWeatherMap
    #[clap(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL for the OpenWeatherMap API
    #[clap(long, default_value_t = DEFAULT_API_URL.into())]
    api_url: String,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Fetch weather for every location at this interval, in seconds.
    #[clap(long, default_value_t = DEFAULT_REFRESH_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    refresh_secs: u64,

    /// Timeout for fetching weather from the OpenWeatherMap API, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    timeout_millis: u64,

    /// Address to bind to. By default, weather_monitor will bind to public address since
    /// the purpose is to serve data to a dashboard running elsewhere.
    #[clap(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = WeatherMonitorApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let timeout = Duration::from_millis(opts.timeout_millis);
    let http_client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = OpenWeatherClient::new(http_client, &opts.api_url, opts.api_key.clone()).unwrap_or_else(|e| {
        tracing::error!(message = "invalid API URL", api_url = %opts.api_url, error = %e);
        process::exit(1)
    });

    let locations = if opts.locations.is_empty() {
        Locations::default()
    } else {
        Locations::new(opts.locations.clone())
    };

    let mut registry = Registry::default();
    let metrics = WeatherMetrics::new(&mut registry);
    let engine = Arc::new(
        Engine::new(
            locations,
            Arc::new(client),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryAuditLog::new()),
            Arc::new(MemoryPayloadStore::new()),
        )
        .with_metrics(metrics),
    );

    let mut interval = tokio::time::interval(Duration::from_secs(opts.refresh_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let poller = engine.clone();
    let api_url = opts.api_url.clone();

    tokio::spawn(async move {
        tracing::info!(
            message = "weather polling started",
            api_url = %api_url,
            locations = poller.locations().len(),
        );

        loop {
            let _ = interval.tick().await;
            poller
                .update_all()
                .instrument(tracing::span!(Level::DEBUG, "weather_pass"))
                .await;
        }
    });

    let context = Arc::new(RequestContext::new(engine, registry));
    let server = axum::Server::try_bind(&opts.bind)
        .unwrap_or_else(|e| {
            tracing::error!(message = "error binding to address", address = %opts.bind, error = %e);
            process::exit(1)
        })
        .serve(weather_monitor::http::router(context).into_make_service());

    tracing::info!(message = "server started", address = %server.local_addr());
    server
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}
