//! Scrape configuration.
//!
//! Defaults target the live Camosun College sites. An optional YAML file can
//! override any subset of fields, and a few CLI flags override the file.
//!
//! ```yaml
//! # scrape.yaml
//! page_delay_ms: 500
//! item_delay_ms: 1000
//! max_retries: 3
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Desktop browser User-Agent; the sites serve reduced pages to unknown agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Main college site, used to resolve program links.
    pub base_url: String,
    /// Path of the "find a program" listing under `base_url`.
    pub programs_path: String,
    /// Upper bound on listing pages walked when no empty page is seen.
    pub max_listing_pages: u32,

    /// Academic calendar site, used to resolve course links.
    pub calendar_url: String,
    /// First course listing page under `calendar_url`.
    pub courses_path: String,
    /// Paginated course listing URL; `{page}` is replaced with the page number.
    pub course_page_template: String,
    /// Last paginated course listing page to request.
    pub max_course_pages: u32,

    pub user_agent: String,
    pub timeout_secs: u64,
    /// Retries per request after the first attempt; `0` disables retrying.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,

    /// Pause between listing page requests.
    pub page_delay_ms: u64,
    /// Pause between detail page requests.
    pub item_delay_ms: u64,

    pub programs_file: String,
    pub courses_file: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://camosun.ca".to_string(),
            programs_path: "/programs-courses/find-program".to_string(),
            max_listing_pages: 100,
            calendar_url: "https://calendar.camosun.ca".to_string(),
            courses_path: "/content.php?catoid=25&navoid=2223".to_string(),
            course_page_template: "https://calendar.camosun.ca/content.php?catoid=25&catoid=25&navoid=2223&filter%5Bitem_type%5D=3&filter%5Bonly_active%5D=1&filter%5B3%5D=1&filter%5Bcpage%5D={page}#acalog_template_course_filter".to_string(),
            max_course_pages: 13,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            page_delay_ms: 1000,
            item_delay_ms: 2000,
            programs_file: "camosun_programs.json".to_string(),
            courses_file: "camosun_courses.json".to_string(),
        }
    }
}

impl ScrapeConfig {
    /// Parse a YAML document; missing fields keep their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, Box<dyn Error>> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Load configuration from `path`, or the defaults when no path is given.
#[instrument(level = "info")]
pub async fn load_config(path: Option<&Path>) -> Result<ScrapeConfig, Box<dyn Error>> {
    let Some(path) = path else {
        info!("No config file given; using defaults");
        return Ok(ScrapeConfig::default());
    };

    let yaml = fs::read_to_string(path).await?;
    let config = ScrapeConfig::from_yaml(&yaml)?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}
