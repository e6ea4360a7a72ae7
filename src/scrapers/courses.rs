//! Course scraper for the academic calendar.
//!
//! The calendar lists courses across a first listing page plus numbered
//! filter pages (`filter[cpage]=N`). Each course page carries its code and
//! title in `#course_preview_title` and everything else in one
//! `td.block_content` cell delimited by `<hr>` rules and `<strong>` labels.

use crate::config::ScrapeConfig;
use crate::fetch::{PageFetcher, polite_pause};
use crate::models::{Course, CourseLink};
use crate::utils::{absolute_url, clean_text, element_text};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use std::error::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

static COURSE_ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"td.width a[href*="preview_course"]"#).unwrap());
static COURSE_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("#course_preview_title").unwrap());
static BLOCK_CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("td.block_content").unwrap());
static STRONG: Lazy<Selector> = Lazy::new(|| Selector::parse("strong").unwrap());
static LIST_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());
static LIST: Lazy<Selector> = Lazy::new(|| Selector::parse("ul").unwrap());

const REQUISITES_MARKER: &str = "Prerequisites";

/// Paginated listing URL for `page`.
pub fn course_page_url(template: &str, page: u32) -> String {
    template.replace("{page}", &page.to_string())
}

/// Extract course links from a listing page.
pub fn parse_course_links(html: &str, base: &Url) -> Vec<CourseLink> {
    let document = Html::parse_document(html);
    document
        .select(&COURSE_ANCHOR)
        .filter_map(|anchor| {
            let url = absolute_url(base, anchor.value().attr("href")?)?;
            Some(CourseLink {
                code: element_text(anchor),
                url,
            })
        })
        .collect()
}

/// Collect course links from the first listing page and the numbered pages.
///
/// A failed first page is logged and pagination still runs. Paginated pages
/// stop at the first failure or empty page, or after `max_course_pages`.
#[instrument(level = "info", skip_all)]
pub async fn index_courses<F: PageFetcher>(
    fetcher: &F,
    config: &ScrapeConfig,
) -> Result<Vec<CourseLink>, Box<dyn Error>> {
    let base = Url::parse(&config.calendar_url)?;
    let first_url = base.join(&config.courses_path)?.to_string();
    let mut links = Vec::new();

    info!(url = %first_url, "Fetching first course listing page");
    match fetcher.fetch(&first_url).await {
        Ok(html) => links.extend(parse_course_links(&html, &base)),
        Err(e) => error!(url = %first_url, error = %e, "First course listing page failed"),
    }

    for page in 2..=config.max_course_pages {
        polite_pause(config.page_delay_ms).await;
        let page_url = course_page_url(&config.course_page_template, page);
        info!(page, url = %page_url, "Fetching course listing page");

        let html = match fetcher.fetch(&page_url).await {
            Ok(html) => html,
            Err(e) => {
                info!(page, error = %e, "No content for course page; assuming last page reached");
                break;
            }
        };
        let page_links = parse_course_links(&html, &base);
        if page_links.is_empty() {
            info!(page, "No courses on page; ending pagination");
            break;
        }
        links.extend(page_links);
    }

    let links: Vec<CourseLink> = links.into_iter().unique_by(|l| l.url.clone()).collect();
    info!(count = links.len(), "Indexed course links");
    Ok(links)
}

/// Description text and requisite heading from the content cell.
///
/// The description is every text node after the second `<hr>` up to the
/// `Prerequisites` marker. The heading is the first text node after it.
fn description_and_heading(content: ElementRef<'_>) -> (String, Option<String>) {
    let mut rules_seen = 0usize;
    let mut parts: Vec<&str> = Vec::new();
    let mut after_marker = false;

    for node in content.descendants() {
        match node.value() {
            Node::Element(el) if el.name() == "hr" => rules_seen += 1,
            Node::Text(text) if rules_seen >= 2 => {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if after_marker {
                    return (clean_text(&parts.join(" ")), Some(clean_text(text)));
                }
                if text.trim_end_matches(':') == REQUISITES_MARKER {
                    after_marker = true;
                } else {
                    parts.push(text);
                }
            }
            _ => {}
        }
    }
    (clean_text(&parts.join(" ")), None)
}

fn apply_label(course: &mut Course, label: &str, value: String) {
    let key = label.to_lowercase();
    if key.contains("credit") {
        course.credits = value;
    } else if key.contains("hour") {
        course.hours = value;
    } else if key.contains("prerequisite") {
        course
            .prerequisites
            .entry(label.trim_end_matches(':').to_string())
            .or_default()
            .push(value);
    } else if key.contains("corequisite") {
        course.corequisites = value;
    } else if key.contains("restriction") {
        course.restrictions = value;
    } else if key.contains("note") {
        course.notes = value;
    }
}

/// Parse a course detail page.
pub fn parse_course_details(html: &str, url: &str) -> Course {
    let document = Html::parse_document(html);
    let mut course = Course::new(url);

    if let Some(title) = document.select(&COURSE_TITLE).next() {
        let title = element_text(title);
        match title.split_once(" - ").or_else(|| title.split_once('-')) {
            Some((code, name)) => {
                course.code = code.trim().to_string();
                course.title = name.trim().to_string();
            }
            None => course.title = title,
        }
    }

    let Some(content) = document.select(&BLOCK_CONTENT).next() else {
        debug!(%url, "Course page has no content cell");
        return course;
    };

    let (description, heading) = description_and_heading(content);
    course.description = description;
    if let Some(heading) = heading {
        let items: Vec<String> = content
            .select(&LIST)
            .next()
            .map(|list| list.select(&LIST_ITEM).map(element_text).collect())
            .unwrap_or_default();
        course.prerequisites.insert(heading, items);
    }

    for strong in content.select(&STRONG) {
        let label = element_text(strong);
        let value = strong
            .next_sibling()
            .and_then(|sibling| sibling.value().as_text().map(|t| clean_text(t)))
            .unwrap_or_default();
        if !value.is_empty() {
            apply_label(&mut course, &label, value);
        }
    }

    course
}

/// Fetch and parse one course. The listing code is used when the page has none.
#[instrument(level = "info", skip_all, fields(code = %link.code))]
pub async fn scrape_course<F: PageFetcher>(
    fetcher: &F,
    link: &CourseLink,
) -> Result<Course, Box<dyn Error>> {
    let html = fetcher.fetch(&link.url).await?;
    let mut course = parse_course_details(&html, &link.url);
    if course.code.is_empty() {
        course.code = link.code.clone();
    }
    debug!(title = %course.title, "Parsed course");
    Ok(course)
}

/// Scrape each course link in order, pausing between requests.
#[instrument(level = "info", skip_all, fields(count = links.len()))]
pub async fn scrape_courses<F: PageFetcher>(
    fetcher: &F,
    links: &[CourseLink],
    config: &ScrapeConfig,
) -> Vec<Course> {
    let total = links.len();

    let courses: Vec<Course> = stream::iter(links.iter().enumerate())
        .then(|(i, link)| async move {
            if i > 0 {
                polite_pause(config.item_delay_ms).await;
            }
            info!(index = i + 1, total, code = %link.code, "Processing course");
            match scrape_course(fetcher, link).await {
                Ok(course) => Some(course),
                Err(e) => {
                    error!(code = %link.code, url = %link.url, error = %e, "Course fetch failed");
                    None
                }
            }
        })
        .filter_map(std::future::ready)
        .collect()
        .await;

    info!(
        scraped = courses.len(),
        failed = total - courses.len(),
        "Fetched course pages"
    );
    courses
}

/// Index every course, keep at most `limit` links, and scrape them.
pub async fn scrape_all_courses<F: PageFetcher>(
    fetcher: &F,
    config: &ScrapeConfig,
    limit: Option<usize>,
) -> Result<Vec<Course>, Box<dyn Error>> {
    let mut links = index_courses(fetcher, config).await?;
    if let Some(limit) = limit {
        links.truncate(limit);
    }
    Ok(scrape_courses(fetcher, &links, config).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StaticFetcher;

    const FIRST_PAGE: &str = "https://calendar.camosun.ca/content.php?catoid=25&navoid=2223";

    fn test_config() -> ScrapeConfig {
        ScrapeConfig {
            page_delay_ms: 0,
            item_delay_ms: 0,
            course_page_template: "https://calendar.camosun.ca/content.php?navoid=2223&cpage={page}"
                .to_string(),
            ..ScrapeConfig::default()
        }
    }

    fn listing(codes: &[(&str, &str)]) -> String {
        let rows: String = codes
            .iter()
            .map(|(coid, code)| {
                format!(
                    r#"<tr><td class="width"><a href="preview_course_nopop.php?catoid=25&amp;coid={coid}">{code}</a></td></tr>"#
                )
            })
            .collect();
        format!(
            r#"<html><body><table>{rows}<tr><td class="width"><a href="content.php?page=2">2</a></td></tr></table></body></html>"#
        )
    }

    const COURSE_PAGE: &str = r#"
        <html><body><table><tr>
        <td class="block_content">
          <h1 id="course_preview_title">ENGL 151 - Academic Writing Strategies</h1>
          <hr>
          <strong>Credits:</strong> 3<br>
          <strong>Hours:</strong> 4 per week<br>
          <strong>Notes:</strong> Offered online<br>
          <hr>
          Students develop writing strategies
          for academic essays.
          <br>
          <p><strong>Prerequisites</strong></p>
          <p>One of:</p>
          <ul>
            <li>C in English 12</li>
            <li>C in ENGL 103</li>
          </ul>
        </td>
        </tr></table></body></html>
    "#;

    #[test]
    fn test_course_page_url() {
        assert_eq!(
            course_page_url("https://x/c.php?cpage={page}#top", 3),
            "https://x/c.php?cpage=3#top"
        );
    }

    #[test]
    fn test_parse_course_links_filters_non_course_anchors() {
        let base = Url::parse("https://calendar.camosun.ca").unwrap();
        let links = parse_course_links(&listing(&[("101", "ENGL 151"), ("102", "MATH 115")]), &base);

        assert_eq!(
            links,
            vec![
                CourseLink {
                    code: "ENGL 151".to_string(),
                    url: "https://calendar.camosun.ca/preview_course_nopop.php?catoid=25&coid=101"
                        .to_string(),
                },
                CourseLink {
                    code: "MATH 115".to_string(),
                    url: "https://calendar.camosun.ca/preview_course_nopop.php?catoid=25&coid=102"
                        .to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_course_details() {
        let course = parse_course_details(COURSE_PAGE, "https://calendar.camosun.ca/c/1");

        assert_eq!(course.code, "ENGL 151");
        assert_eq!(course.title, "Academic Writing Strategies");
        assert_eq!(course.credits, "3");
        assert_eq!(course.hours, "4 per week");
        assert_eq!(course.notes, "Offered online");
        assert_eq!(
            course.description,
            "Students develop writing strategies for academic essays."
        );
        assert_eq!(
            course.prerequisites["One of:"],
            vec!["C in English 12", "C in ENGL 103"]
        );
        assert_eq!(course.prerequisites.len(), 1);
    }

    #[test]
    fn test_parse_course_details_inline_prerequisite() {
        let html = r#"<table><tr><td class="block_content">
            <h1 id="course_preview_title">Special Topics</h1>
            <strong>Prerequisite:</strong> Instructor permission
            </td></tr></table>"#;
        let course = parse_course_details(html, "https://calendar.camosun.ca/c/2");

        assert_eq!(course.code, "");
        assert_eq!(course.title, "Special Topics");
        assert_eq!(course.prerequisites["Prerequisite"], vec!["Instructor permission"]);
        assert!(course.description.is_empty());
    }

    #[tokio::test]
    async fn test_index_courses_paginates() {
        let config = test_config();
        let fetcher = StaticFetcher::new()
            .with_page(FIRST_PAGE, &listing(&[("1", "ENGL 151")]))
            .with_page(
                &course_page_url(&config.course_page_template, 2),
                &listing(&[("1", "ENGL 151"), ("2", "MATH 115")]),
            )
            .with_page(&course_page_url(&config.course_page_template, 3), &listing(&[]));

        let links = index_courses(&fetcher, &config).await.unwrap();
        let codes: Vec<&str> = links.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["ENGL 151", "MATH 115"]);
        assert_eq!(fetcher.requests.borrow().len(), 3);
    }

    #[tokio::test]
    async fn test_index_courses_continues_past_failed_first_page() {
        let config = test_config();
        let fetcher = StaticFetcher::new()
            .with_page(
                &course_page_url(&config.course_page_template, 2),
                &listing(&[("2", "MATH 115")]),
            )
            .with_page(&course_page_url(&config.course_page_template, 3), &listing(&[]));

        let links = index_courses(&fetcher, &config).await.unwrap();
        let codes: Vec<&str> = links.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["MATH 115"]);
        assert_eq!(fetcher.requests.borrow()[0], FIRST_PAGE);
    }

    #[tokio::test]
    async fn test_index_courses_stops_on_failed_page() {
        let config = test_config();
        let fetcher = StaticFetcher::new()
            .with_page(FIRST_PAGE, &listing(&[("1", "ENGL 151")]))
            .with_page(
                &course_page_url(&config.course_page_template, 2),
                &listing(&[("2", "MATH 115")]),
            )
            .with_page(
                &course_page_url(&config.course_page_template, 4),
                &listing(&[("4", "CHEM 110")]),
            );

        let links = index_courses(&fetcher, &config).await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(
            *fetcher.requests.borrow(),
            vec![
                FIRST_PAGE.to_string(),
                course_page_url(&config.course_page_template, 2),
                course_page_url(&config.course_page_template, 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_index_courses_respects_page_cap() {
        let config = ScrapeConfig {
            max_course_pages: 2,
            ..test_config()
        };
        let fetcher = StaticFetcher::new()
            .with_page(FIRST_PAGE, &listing(&[("1", "ENGL 151")]))
            .with_page(
                &course_page_url(&config.course_page_template, 2),
                &listing(&[("2", "MATH 115")]),
            )
            .with_page(
                &course_page_url(&config.course_page_template, 3),
                &listing(&[("3", "CHEM 110")]),
            );

        let links = index_courses(&fetcher, &config).await.unwrap();
        let codes: Vec<&str> = links.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["ENGL 151", "MATH 115"]);
        assert_eq!(fetcher.requests.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_scrape_all_courses_uses_listing_code_fallback() {
        let config = test_config();
        let course_url = "https://calendar.camosun.ca/preview_course_nopop.php?catoid=25&coid=9";
        let fetcher = StaticFetcher::new()
            .with_page(FIRST_PAGE, &listing(&[("9", "ART 100"), ("10", "ART 101")]))
            .with_page(
                course_url,
                r#"<h1 id="course_preview_title">Drawing</h1>"#,
            );

        let courses = scrape_all_courses(&fetcher, &config, None).await.unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].code, "ART 100");
        assert_eq!(courses[0].title, "Drawing");
    }
}
