//! # Camosun Catalog
//!
//! Scrapes academic program and course information from the Camosun College
//! websites and writes it as JSON records for later import into a graph
//! database.
//!
//! ## Usage
//!
//! ```sh
//! camosun_catalog -o ./data -t all
//! ```
//!
//! ## Architecture
//!
//! Each run is a straight pipeline, one request at a time:
//! 1. **Indexing**: walk the listing pages and collect detail links
//! 2. **Fetching**: download and parse each detail page (and program outline)
//! 3. **Output**: write the records as a JSON array per target

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod fetch;
mod models;
mod outputs;
mod scrapers;
mod utils;

use cli::Cli;
use config::load_config;
use fetch::build_fetcher;
use outputs::json;
use scrapers::{courses, programs};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(started_at = %Local::now().to_rfc3339(), "camosun_catalog starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = load_config(args.config.as_deref()).await?;
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    debug!(?config, "Effective configuration");

    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let fetcher = build_fetcher(&config)?;
    let backup = !args.no_backup;

    // ---- Programs ----
    if let Some(ref url) = args.program_url {
        let programs = programs::scrape_single_program(&fetcher, &config, url).await?;
        json::write_records(&programs, &args.output_dir, &config.programs_file, backup).await?;
    } else if args.target.includes_programs() {
        let programs = programs::scrape_all_programs(&fetcher, &config, args.limit).await?;
        info!(count = programs.len(), "Scraped programs");
        json::write_records(&programs, &args.output_dir, &config.programs_file, backup).await?;
    }

    // ---- Courses ----
    if args.program_url.is_none() && args.target.includes_courses() {
        let courses = courses::scrape_all_courses(&fetcher, &config, args.limit).await?;
        info!(count = courses.len(), "Scraped courses");
        json::write_records(&courses, &args.output_dir, &config.courses_file, backup).await?;
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
