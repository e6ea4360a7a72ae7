//! Program scraper for the main college site.
//!
//! Two-phase pattern:
//!
//! 1. **Indexing**: walk the "find a program" listing pages
//!    (`/programs-courses/find-program?page=%2C{n}`) and collect detail links
//! 2. **Fetching**: download each program page, parse the fixed page
//!    structure, and follow the program outline link when there is one
//!
//! Missing page sections leave fields empty. Only fetch failures are errors.

use crate::config::ScrapeConfig;
use crate::fetch::{PageFetcher, polite_pause};
use crate::models::{Program, ProgramLink};
use crate::scrapers::outline::{parse_outline_courses, parse_outline_details};
use crate::utils::{absolute_url, element_text, truncate_for_log};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

macro_rules! selector {
    ($name:ident, $css:literal) => {
        static $name: Lazy<Selector> = Lazy::new(|| Selector::parse($css).unwrap());
    };
}

selector!(VIEWS_ROW, "div.views-row");
selector!(ANCHOR, "a");
selector!(PAGE_TITLE, "h1.page_title");
selector!(INTRO_TEXT, "div.intro-text");
selector!(GLANCE_INFO, "div.program_glance__info");
selector!(GLANCE_TITLE, "p.info-title");
selector!(GLANCE_VALUE, "p:not(.info-title)");
selector!(PROGRAM_TAB, "#program_tab");
selector!(MORE_TAB, "#more_tab");
selector!(TAB_CONTENT, "div:not(.intro-text-about):not(.image-about)");
selector!(OUTLINE_BUTTON, "a.button.cta_button");
selector!(MONEY_TAB, "#money_tab");
selector!(ADMISSION_TAB, "#admission_tab");

/// URL of listing page `page` (zero based).
///
/// The site paginates with a `page` query value of `",{n}"`, URL-encoded.
pub fn listing_page_url(programs_url: &str, page: u32) -> String {
    format!(
        "{}?page={}",
        programs_url,
        urlencoding::encode(&format!(",{page}"))
    )
}

/// Extract program links from one listing page.
///
/// Each `div.views-row` contributes its first anchor, if that anchor has an href.
pub fn parse_program_links(html: &str, base: &Url) -> Vec<ProgramLink> {
    let document = Html::parse_document(html);
    document
        .select(&VIEWS_ROW)
        .filter_map(|row| {
            let anchor = row.select(&ANCHOR).next()?;
            let url = absolute_url(base, anchor.value().attr("href")?)?;
            Some(ProgramLink {
                name: element_text(anchor),
                url,
            })
        })
        .collect()
}

/// Walk listing pages from page 0 and collect every program link.
///
/// Stops at the first page that fails to fetch, has no links, or repeats
/// links already seen, or at `config.max_listing_pages`. Links are
/// de-duplicated by URL in discovery order.
///
/// # Arguments
///
/// * `fetcher` - Source of listing page bodies
/// * `config` - Supplies `base_url`, `programs_path`, the page cap and the pause
///
/// # Returns
///
/// Every program link found before pagination stopped.
///
/// # Errors
///
/// Returns an error only when `base_url` or `programs_path` do not form a
/// valid URL. Page fetch failures end pagination instead.
#[instrument(level = "info", skip_all)]
pub async fn index_programs<F: PageFetcher>(
    fetcher: &F,
    config: &ScrapeConfig,
) -> Result<Vec<ProgramLink>, Box<dyn Error>> {
    let base = Url::parse(&config.base_url)?;
    let programs_url = base.join(&config.programs_path)?.to_string();

    let mut links: Vec<ProgramLink> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for page in 0..config.max_listing_pages {
        let page_url = listing_page_url(&programs_url, page);
        info!(page, url = %page_url, "Fetching program listing page");

        let html = match fetcher.fetch(&page_url).await {
            Ok(html) => html,
            Err(e) => {
                error!(page, url = %page_url, error = %e, "Listing page fetch failed; stopping pagination");
                break;
            }
        };

        let page_links = parse_program_links(&html, &base);
        if page_links.is_empty() {
            debug!(page, "Listing page has no programs; last page reached");
            break;
        }
        if page_links.iter().all(|l| seen.contains(&l.url)) {
            warn!(page, "Listing page repeats earlier programs; stopping pagination");
            break;
        }

        seen.extend(page_links.iter().map(|l| l.url.clone()));
        links.extend(page_links);
        polite_pause(config.page_delay_ms).await;
    }

    let links: Vec<ProgramLink> = links.into_iter().unique_by(|l| l.url.clone()).collect();
    info!(count = links.len(), "Indexed program links");
    Ok(links)
}

/// The first tab content `div` that is not the intro or image block.
fn tab_content(tab: ElementRef<'_>) -> Option<ElementRef<'_>> {
    tab.select(&TAB_CONTENT).next()
}

fn apply_glance_entry(program: &mut Program, title: &str, value: String) {
    if title.contains("credential") {
        program.credential = value;
    } else if title.contains("work experience") {
        program.work_experience = value;
    } else if title.contains("study options") {
        program.study_options = value;
    } else if title.contains("open to international") {
        program.open_to_international = value;
    } else if title.contains("area of study") {
        program.area_of_study = value;
    } else if title.contains("length") {
        program.length = value;
    } else if title.contains("location") || title.contains("campus") {
        program.location = value;
    } else if title.contains("start") {
        program.start_date = value;
    } else if !title.is_empty() {
        program.metadata.insert(title.to_string(), value);
    }
}

/// Parse a program detail page.
///
/// Outline fields are not filled here; see [`scrape_program`].
pub fn parse_program_details(html: &str, url: &str, base: &Url) -> Program {
    let document = Html::parse_document(html);
    let mut program = Program::new(url);

    if let Some(title) = document.select(&PAGE_TITLE).next() {
        program.title = element_text(title);
    }
    if let Some(intro) = document.select(&INTRO_TEXT).next() {
        program.intro_text = element_text(intro);
    }

    for glance in document.select(&GLANCE_INFO) {
        let Some(title) = glance.select(&GLANCE_TITLE).next() else {
            continue;
        };
        let title = element_text(title).to_lowercase();
        if let Some(value) = glance.select(&GLANCE_VALUE).next() {
            apply_glance_entry(&mut program, &title, element_text(value));
        }
    }

    if let Some(overview) = document.select(&PROGRAM_TAB).next().and_then(tab_content) {
        program.overview = element_text(overview);
    }

    let outline_href = document
        .select(&MORE_TAB)
        .next()
        .and_then(tab_content)
        .and_then(|content| content.select(&OUTLINE_BUTTON).next())
        .and_then(|button| button.value().attr("href"));
    if let Some(outline) = outline_href.and_then(|href| absolute_url(base, href)) {
        program.program_outline_url = outline;
    }

    if let Some(money) = document.select(&MONEY_TAB).next() {
        program.tuition_info = element_text(money);
    }
    if let Some(admission) = document.select(&ADMISSION_TAB).next() {
        program.admission_requirements = element_text(admission);
    }

    program
}

/// Fetch and parse one program, including its outline page.
///
/// A failed outline fetch is logged and the program is returned without
/// curriculum. When the link has no name the page title is used.
#[instrument(level = "info", skip_all, fields(url = %link.url))]
pub async fn scrape_program<F: PageFetcher>(
    fetcher: &F,
    link: &ProgramLink,
    base: &Url,
) -> Result<Program, Box<dyn Error>> {
    let html = fetcher.fetch(&link.url).await?;
    let mut program = parse_program_details(&html, &link.url, base);
    program.name = if link.name.is_empty() {
        program.title.clone()
    } else {
        link.name.clone()
    };

    if !program.program_outline_url.is_empty() {
        match fetcher.fetch(&program.program_outline_url).await {
            Ok(outline) => {
                program.curriculum = parse_outline_courses(&outline);
                parse_outline_details(&outline, &mut program);
            }
            Err(e) => {
                warn!(outline = %program.program_outline_url, error = %e, "Outline fetch failed; keeping program without curriculum");
            }
        }
    }

    info!(
        title = %program.title,
        courses = program.curriculum.len(),
        "Parsed program"
    );
    Ok(program)
}

/// Scrape each link in order, pausing between requests.
///
/// Failed programs are logged and skipped without failing the batch.
#[instrument(level = "info", skip_all, fields(count = links.len()))]
pub async fn scrape_programs<F: PageFetcher>(
    fetcher: &F,
    links: &[ProgramLink],
    config: &ScrapeConfig,
) -> Result<Vec<Program>, Box<dyn Error>> {
    let base = Url::parse(&config.base_url)?;
    let base = &base;
    let total = links.len();

    let programs: Vec<Program> = stream::iter(links.iter().enumerate())
        .then(|(i, link)| async move {
            if i > 0 {
                polite_pause(config.item_delay_ms).await;
            }
            info!(index = i + 1, total, name = %link.name, "Processing program");
            match scrape_program(fetcher, link, base).await {
                Ok(program) => Some(program),
                Err(e) => {
                    error!(name = %link.name, url = %link.url, error = %e, "Program fetch failed");
                    None
                }
            }
        })
        .filter_map(std::future::ready)
        .collect()
        .await;

    info!(
        scraped = programs.len(),
        failed = total - programs.len(),
        "Fetched program pages"
    );
    Ok(programs)
}

/// Index every program, keep at most `limit` links, and scrape them.
pub async fn scrape_all_programs<F: PageFetcher>(
    fetcher: &F,
    config: &ScrapeConfig,
    limit: Option<usize>,
) -> Result<Vec<Program>, Box<dyn Error>> {
    let mut links = index_programs(fetcher, config).await?;
    if let Some(limit) = limit {
        links.truncate(limit);
    }
    scrape_programs(fetcher, &links, config).await
}

/// Scrape one program page given directly, skipping the listing.
///
/// The program name falls back to the page title.
#[instrument(level = "info", skip(fetcher, config))]
pub async fn scrape_single_program<F: PageFetcher>(
    fetcher: &F,
    config: &ScrapeConfig,
    url: &str,
) -> Result<Vec<Program>, Box<dyn Error>> {
    let base = Url::parse(&config.base_url)?;
    let link = ProgramLink {
        name: String::new(),
        url: url.to_string(),
    };
    let program = scrape_program(fetcher, &link, &base).await?;
    debug!(
        overview = %truncate_for_log(&program.overview, 200),
        "Single program result"
    );
    Ok(vec![program])
}
