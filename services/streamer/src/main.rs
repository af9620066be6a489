//! Weather streaming driver.
//!
//! - `inspect <url>`: list a container's variables, optionally decoding one
//! - `fetch --param --time`: progressively load the bracketing timestep pair
//!   into slots, logging each slice
//! - `cache stats|clear|evict|claim`: range cache control plane
//! - `pack --param --input ... --output`: build a container from raw `.bin`
//!   fields on an `O{n}` grid
//!
//! All reads go through the range cache, persisted to SQLite when
//! `--cache-db` is set.

mod cache;
mod fetch;
mod inspect;
mod pack;
mod source;
mod summary;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use progressive_fetch::FetchConfig;
use range_cache::CacheConfig;
use slot_allocator::SlotConfig;
use stream_common::{Param, Timestep};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cache::CacheAction;
use fetch::FetchRequest;
use pack::PackRequest;

#[derive(Parser, Debug)]
#[command(name = "streamer")]
#[command(about = "Progressive weather data streaming from range-addressed containers")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Bucket base URL
    #[arg(long, env = "STREAM_BASE_URL")]
    base_url: Option<String>,

    /// Forecast model
    #[arg(long, env = "STREAM_MODEL")]
    model: Option<String>,

    /// SQLite range cache database (in-memory when unset)
    #[arg(long, env = "STREAM_CACHE_DB")]
    cache_db: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the variables of a container
    Inspect {
        /// Container URL
        url: String,

        /// Decode this variable and print summary statistics
        #[arg(long)]
        variable: Option<String>,

        /// Cache data reads under this parameter's layer
        #[arg(long)]
        param: Option<Param>,
    },

    /// Load the pair of timesteps around a time
    Fetch {
        #[arg(long)]
        param: Param,

        /// Target time (RFC 3339)
        #[arg(long)]
        time: DateTime<Utc>,

        /// Model run, e.g. 2025-12-13T0600 (defaults to the last 6-hourly run)
        #[arg(long)]
        run: Option<Timestep>,

        /// Forecast hours listed for the run
        #[arg(long, default_value = "24")]
        hours: u32,
    },

    /// Range cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Build a container from raw little-endian f32 files
    Pack {
        #[arg(long)]
        param: Param,

        /// One file per slab, in slab order (u then v for wind)
        #[arg(long = "input", required = true)]
        inputs: Vec<PathBuf>,

        /// Container file to write
        #[arg(long)]
        output: PathBuf,

        /// Octahedral grid order, e.g. 1280 for O1280
        #[arg(long, default_value = "1280")]
        grid: u64,

        /// Points per chunk
        #[arg(long, default_value_t = pack::DEFAULT_CHUNK_POINTS)]
        chunk_points: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut cache_config = CacheConfig::from_env();
    if args.cache_db.is_some() {
        cache_config.db_path = args.cache_db.clone();
    }

    let mut fetch_config = FetchConfig::from_env();
    if let Some(base_url) = &args.base_url {
        fetch_config.base_url = base_url.clone();
    }
    if let Some(model) = &args.model {
        fetch_config.model = model.clone();
    }

    info!(base_url = %fetch_config.base_url, model = %fetch_config.model, "Starting streamer");

    match args.command {
        Command::Inspect {
            url,
            variable,
            param,
        } => {
            let cache = source::open_cache(&cache_config).await?;
            let source = source::build_source(&fetch_config, cache)?;
            inspect::run(source, &url, variable.as_deref(), param).await?;
        }
        Command::Fetch {
            param,
            time,
            run,
            hours,
        } => {
            let cache = source::open_cache(&cache_config).await?;
            let source = source::build_source(&fetch_config, cache)?;
            let slot_config = SlotConfig::from_env();
            let request = FetchRequest {
                param,
                time,
                run,
                hours,
            };
            fetch::run(source, &fetch_config, slot_config, request).await?;
        }
        Command::Cache { action } => {
            let cache = source::open_cache(&cache_config).await?;
            cache::run(cache, &action).await?;
        }
        Command::Pack {
            param,
            inputs,
            output,
            grid,
            chunk_points,
        } => {
            let request = PackRequest {
                param,
                inputs,
                output,
                grid,
                chunk_points,
            };
            let report = pack::run(&request).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch_command() {
        let args = Args::try_parse_from([
            "streamer",
            "--log-level",
            "debug",
            "fetch",
            "--param",
            "wind",
            "--time",
            "2025-12-13T07:30:00Z",
            "--run",
            "2025-12-13T0600",
        ])
        .unwrap();

        match args.command {
            Command::Fetch {
                param, run, hours, ..
            } => {
                assert_eq!(param, Param::Wind);
                assert_eq!(run, Some(Timestep::parse("2025-12-13T0600").unwrap()));
                assert_eq!(hours, 24);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_pack_command() {
        let args = Args::try_parse_from([
            "streamer",
            "pack",
            "--param",
            "wind",
            "--input",
            "u.bin",
            "--input",
            "v.bin",
            "--output",
            "out/2025-06-01T0000.om",
        ])
        .unwrap();

        match args.command {
            Command::Pack {
                param,
                inputs,
                grid,
                chunk_points,
                ..
            } => {
                assert_eq!(param, Param::Wind);
                assert_eq!(inputs, vec![PathBuf::from("u.bin"), PathBuf::from("v.bin")]);
                assert_eq!(grid, 1280);
                assert_eq!(chunk_points, pack::DEFAULT_CHUNK_POINTS);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_cache_command() {
        let args = Args::try_parse_from(["streamer", "cache", "clear", "--layer", "meta"]).unwrap();
        match args.command {
            Command::Cache { action } => assert_eq!(
                action,
                CacheAction::Clear {
                    layer: Some(stream_common::CacheLayer::Meta)
                }
            ),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
