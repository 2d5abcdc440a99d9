#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line driver for the buffer search pipeline.
//!
//! `buffer` prints the search zone around a point as `GeoJSON`. `search`
//! runs the whole pipeline headless: it activates the bridge, draws the
//! point on an in-memory map, waits for the result and prints it.

mod table;

use std::path::PathBuf;
use std::sync::Arc;

use buffer_search_draw::LogNotifier;
use buffer_search_draw::headless::HeadlessMap;
use buffer_search_geometry::BufferRequest;
use buffer_search_lifecycle::host::HeadlessHost;
use buffer_search_lifecycle::{Pipeline, config};
use buffer_search_models::{Crs, Point, Unit};
use buffer_search_query::HttpTransport;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "buffer_search", about = "Point buffer search tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the buffer polygon around a point as `GeoJSON`
    Buffer {
        /// X coordinate (longitude for geographic CRS)
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Y coordinate (latitude for geographic CRS)
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Buffer distance
        #[arg(long, default_value = "1000")]
        distance: f64,
        /// Distance unit: meters, kilometers, m or km
        #[arg(long, default_value = "meters")]
        unit: String,
        /// CRS of the coordinates (e.g. "EPSG:4326", "EPSG:3857")
        #[arg(long, default_value = Crs::WGS84)]
        crs: String,
    },
    /// Search the configured layer around a point and print the results
    Search {
        /// X coordinate in the map CRS
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Y coordinate in the map CRS
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Buffer distance (overrides the config)
        #[arg(long)]
        distance: Option<f64>,
        /// Distance unit (overrides the config)
        #[arg(long)]
        unit: Option<String>,
        /// Path to a TOML config file. Uses the built-in default if omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Query endpoint URL (overrides the config and `BUFFER_SEARCH_ENDPOINT`)
        #[arg(long)]
        endpoint: Option<String>,
        /// Print the render model as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Buffer {
            lon,
            lat,
            distance,
            unit,
            crs,
        } => {
            let origin = Point::with_crs(lon, lat, Crs::new(crs));
            let buffer = BufferRequest::parse(origin, distance, &unit)?.generate()?;
            let geometry = geojson::Geometry::new(geojson::Value::from(&buffer.polygon));
            println!("{}", serde_json::to_string_pretty(&geometry)?);
        }
        Commands::Search {
            lon,
            lat,
            distance,
            unit,
            config: path,
            endpoint,
            json,
        } => {
            let mut search_config = config::load_config(path.as_deref())?;
            if let Some(endpoint) = endpoint {
                search_config.query.endpoint = endpoint;
            }
            if let Some(distance) = distance {
                search_config.buffer.distance = distance;
            }
            if let Some(unit) = unit {
                search_config.buffer.unit = unit.parse::<Unit>()?;
            }
            config::validate(&search_config)?;

            let transport = HttpTransport::new(&search_config.query)?;
            log::info!(
                "Searching layer '{}' at {}",
                search_config.layer.id,
                transport.endpoint()
            );

            let map = Arc::new(HeadlessMap::new(search_config.map_crs.clone()));
            let pipeline = Pipeline::from_config(
                &search_config,
                map.clone(),
                Arc::new(HeadlessHost::default()),
                Arc::new(LogNotifier),
                Arc::new(transport),
            )?;

            let mut updates = pipeline.presenter().updates();
            pipeline.bridge().set_active(true);
            if !map.finish_draw(lon, lat) {
                return Err("draw tool is not listening".into());
            }
            let model = updates.settled().await.ok_or("feature store closed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&model)?);
            } else {
                print!("{}", table::render_table(&model, &pipeline.presenter().view()));
            }
            pipeline.bridge().set_active(false);
        }
    }

    Ok(())
}
