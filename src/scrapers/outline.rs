//! Program outline parsing.
//!
//! Program pages on the main site link to an outline page on the academic
//! calendar (`calendar.camosun.ca/preview_program.php?...`). The outline
//! carries the curriculum and a small credential table that the main site
//! does not.

use crate::models::Program;
use crate::utils::{clean_text, element_text, extract_table_rows};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

static COURSE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([A-Z]{2,5}\s*\d{3,4}[A-Z]?)\s*-?\s*(.*?)(?:\s*\((\d+\.?\d*)\s*credits?\))?$")
        .unwrap()
});
static COURSE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[A-Z]{2,5}\s*\d{3,4}[A-Z]?$").unwrap());

static CONTENT_ROOTS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [".block_content", "#gateway_container", "div.main"]
        .into_iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| Selector::parse(".program_description").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static CORE_ITEMS: Lazy<Selector> = Lazy::new(|| Selector::parse(".acalog-core ul li").unwrap());
static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());

/// First matching content container, or the document root.
fn content_root(document: &Html) -> ElementRef<'_> {
    CONTENT_ROOTS
        .iter()
        .find_map(|sel| document.select(sel).next())
        .unwrap_or_else(|| document.root_element())
}

/// Turn one curriculum line into `"CODE - Title"`, if it looks like a course.
pub fn parse_course_line(text: &str) -> Option<String> {
    let text = clean_text(text);
    let caps = COURSE_LINE.captures(&text)?;
    let code = caps.get(1)?.as_str().trim();
    let title = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
    Some(format!("{code} - {title}"))
}

/// Fill credential, credit and code fields from the outline description table.
///
/// Only the first table of the first `.program_description` is read; its
/// cells are consecutive label/value pairs. Unknown labels go to
/// `program.metadata`. A page without the table leaves `program` untouched.
pub fn parse_outline_details(html: &str, program: &mut Program) {
    let document = Html::parse_document(html);
    let root = content_root(&document);
    let cells: Vec<String> = root
        .select(&DESCRIPTION)
        .next()
        .and_then(|description| description.select(&TABLE).next())
        .map(|table| table.select(&CELL).map(element_text).collect())
        .unwrap_or_default();

    if cells.is_empty() {
        warn!(url = %program.program_outline_url, "Outline has no program description table");
        return;
    }

    for pair in cells.chunks_exact(2) {
        let label = pair[0].to_lowercase();
        let value = pair[1].clone();

        if label.contains("credential") {
            program.credential = value;
        } else if label.contains("total credits") {
            program.total_credits = value;
        } else if label.contains("program code") {
            program.program_code = value;
        } else if label.contains("cip") {
            program.cip = value;
        } else if !label.is_empty() {
            program.metadata.insert(label, value);
        }
    }
}

/// Curriculum entries from the outline page.
///
/// Reads `.acalog-core` list items first. When none of them look like
/// courses, falls back to any table whose first column holds course codes.
pub fn parse_outline_courses(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let courses: Vec<String> = document
        .select(&CORE_ITEMS)
        .filter_map(|li| parse_course_line(&element_text(li)))
        .collect();
    if !courses.is_empty() {
        debug!(count = courses.len(), "Parsed curriculum list");
        return courses;
    }

    let root = content_root(&document);
    let from_tables: Vec<String> = root
        .select(&TABLE)
        .flat_map(extract_table_rows)
        .filter_map(|row| {
            let mut cells = row.into_iter().map(|(_, value)| value);
            let code = cells.next()?;
            let title = cells.next().unwrap_or_default();
            COURSE_CODE.is_match(&code).then(|| format!("{code} - {title}"))
        })
        .collect();
    debug!(count = from_tables.len(), "Parsed curriculum tables");
    from_tables
}
