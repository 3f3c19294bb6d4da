mod artwork;
mod display;
mod event;
mod net;
mod render;
mod track;
mod ui;

use crate::artwork::{ArtworkCache, ArtworkEndpoints, ArtworkResolver, cache::load_cache, types};
use crate::render::MediaLoader;
use crate::track::{TrackClient, lastfm};
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const API_KEY_ENV: &str = "LAST_FM_API_KEY";

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Full-screen album artwork for what a Last.fm user is playing")]
pub struct Config {
    /// Last.fm username to follow
    username: String,
    /// Image shown when nothing is playing (URL or local path)
    #[arg(long)]
    placeholder: Option<String>,
    /// Persist resolved artwork to this JSON file between runs
    #[arg(long)]
    cache_file: Option<PathBuf>,
    /// Frames per second of the render loop
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=240))]
    fps: u32,
    /// Scales the crossfade blur radius
    #[arg(long, default_value_t = 1.0)]
    pixel_density: f32,
    /// Enable backend logging to stderr (filter with RUST_LOG)
    #[arg(long)]
    pub debug_log: bool,
    /// Last.fm API base URL
    #[arg(long, default_value = lastfm::DEFAULT_LASTFM_API)]
    track_api: String,
    /// Album-art search endpoint
    #[arg(long, default_value = types::DEFAULT_SEARCH_URL)]
    search_api: String,
    /// Catalog search endpoint
    #[arg(long, default_value = types::DEFAULT_CATALOG_URL)]
    catalog_api: String,
    /// Artwork extraction endpoint
    #[arg(long, default_value = types::DEFAULT_EXTRACT_URL)]
    extract_api: String,
}

impl Config {
    fn endpoints(&self) -> ArtworkEndpoints {
        ArtworkEndpoints {
            search_url: self.search_api.clone(),
            catalog_url: self.catalog_api.clone(),
            extract_url: self.extract_api.clone(),
        }
    }
}

fn api_key_from_env() -> Result<String, Box<dyn Error + Send + Sync>> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(format!("{API_KEY_ENV} is not set").into()),
    }
}

fn init_logging(cfg: &Config) {
    if !cfg.debug_log {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cfg = Config::parse();
    init_logging(&cfg);
    let api_key = api_key_from_env()?;

    let cache = match &cfg.cache_file {
        Some(path) => load_cache(path).await,
        None => ArtworkCache::new(),
    };
    let resolver = ArtworkResolver::new(cfg.endpoints(), cache);
    let loader = MediaLoader::new(cfg.placeholder.clone());
    let tracks = TrackClient::new(cfg.track_api.clone(), api_key);

    // Start the screen with whatever is playing now; failures show the
    // placeholder until the first successful poll.
    let initial = tracks.resolve(&cfg.username).await;
    tracing::info!(user = %cfg.username, playing = ?initial, "Starting display");

    let result = ui::run(ui::ScreenConfig {
        username: cfg.username.clone(),
        initial,
        tracks,
        resolver,
        loader,
        placeholder: cfg.placeholder.clone(),
        fps: cfg.fps,
        pixel_density: cfg.pixel_density,
    })
    .await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        return Err(e);
    }
    Ok(())
}
