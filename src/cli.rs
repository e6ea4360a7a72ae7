//! Command-line interface definitions.
//!
//! Flags override the optional YAML config file, which overrides the
//! built-in defaults in [`crate::config::ScrapeConfig`].

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// What a run scrapes.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Programs from the main site, with outline curriculum
    Programs,
    /// Courses from the academic calendar
    Courses,
    /// Programs, then courses
    All,
}

impl Target {
    pub fn includes_programs(self) -> bool {
        matches!(self, Target::Programs | Target::All)
    }

    pub fn includes_courses(self) -> bool {
        matches!(self, Target::Courses | Target::All)
    }
}

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Scrape every program into ./data/camosun_programs.json
/// camosun_catalog
///
/// # Programs and courses, first 5 of each, into ./out
/// camosun_catalog -o ./out -t all -l 5
///
/// # Check the parser against one live program page
/// camosun_catalog --program-url https://camosun.ca/programs-courses/find-program/nursing
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the JSON files
    #[arg(short, long, default_value = "data")]
    pub output_dir: PathBuf,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// What to scrape
    #[arg(short, long, value_enum, default_value_t = Target::Programs)]
    pub target: Target,

    /// Only scrape the first N discovered programs or courses
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Scrape a single program page instead of walking the listing
    #[arg(long)]
    pub program_url: Option<String>,

    /// Retries per request after the first attempt
    #[arg(long, env = "CAMOSUN_MAX_RETRIES")]
    pub max_retries: Option<usize>,

    /// Do not copy an existing output file to `<file>.bak` before overwriting
    #[arg(long)]
    pub no_backup: bool,
}
