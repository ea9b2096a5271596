//! Fills the `anime_songs` table from the AnimeThemes catalog.
//!
//! ```bash
//! SUPABASE_URL=https://xyz.supabase.co SUPABASE_ANON_KEY=... \
//!     cargo run --features importer --bin song_importer -- --start-year 2022
//! ```

use anitunes::api::SupabaseClient;
use anitunes::config::AppConfig;
use anitunes::importer::{AnimeThemesClient, ImportOptions, SongImporter, DEFAULT_DELAY_MS, DEFAULT_START_YEAR};
use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "song_importer")]
#[command(about = "Import anime theme songs from AnimeThemes into the ranking database")]
#[command(version)]
struct Args {
    /// Project URL of the backend
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: String,

    /// Key used for the upserts
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    supabase_key: String,

    /// First year to import seasonal listings for
    #[arg(long, default_value_t = DEFAULT_START_YEAR)]
    start_year: i32,

    /// Pause between catalog pages in milliseconds
    #[arg(long, default_value_t = DEFAULT_DELAY_MS)]
    delay_ms: u64,

    /// Skip the long-running series listing
    #[arg(long)]
    skip_long_runners: bool,

    /// Import the four seasons of a single year and nothing else
    #[arg(long, value_name = "YEAR", conflicts_with = "start_year")]
    season_only: Option<i32>,
}

impl Args {
    fn options(&self) -> ImportOptions {
        let defaults = ImportOptions::default();
        match self.season_only {
            Some(year) => ImportOptions {
                start_year: year,
                end_year: year,
                delay_ms: self.delay_ms,
                long_runners: false,
                ..defaults
            },
            None => ImportOptions {
                start_year: self.start_year,
                delay_ms: self.delay_ms,
                long_runners: !self.skip_long_runners,
                ..defaults
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let options = args.options();
    if options.start_year > options.end_year {
        bail!(
            "start year {} is after the last year to import ({})",
            options.start_year,
            options.end_year
        );
    }

    let config = AppConfig::new(args.supabase_url.as_str(), args.supabase_key.as_str());
    let sink = SupabaseClient::new(&config);
    if !sink.is_configured() {
        bail!("--supabase-url and --supabase-key must not be empty");
    }

    info!(
        start_year = options.start_year,
        end_year = options.end_year,
        long_runners = options.long_runners,
        "starting import"
    );
    let importer = SongImporter::new(AnimeThemesClient::new(), sink, options);
    let summary = importer.run().await;

    println!(
        "Import completed: {} pages, {} rows, {} failed pages",
        summary.pages, summary.rows, summary.failed_pages
    );
    Ok(())
}
