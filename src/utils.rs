//! Text, URL and file system helpers shared by the scrapers and writers.
//!
//! - Whitespace normalisation for scraped text
//! - Absolute URL resolution for scraped hrefs
//! - Header-keyed extraction of HTML tables
//! - String truncation for log fields
//! - Output directory validation and backup copies

use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use std::error::Error;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

static THEAD_TH: Lazy<Selector> = Lazy::new(|| Selector::parse("thead th").unwrap());
static TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static TH_OR_TD: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").unwrap());
static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

/// Collapse every run of whitespace (including line breaks) to one space and trim.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_text("  Full-time\n\n  2 years "), "Full-time 2 years");
/// ```
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All text nodes under `element`, joined with spaces and cleaned.
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Resolve `href` against `base`.
///
/// Absolute URLs are returned unchanged. Returns `None` for an empty href or
/// one that cannot be joined.
pub fn absolute_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if let Ok(parsed) = Url::parse(href) {
        return Some(parsed.to_string());
    }
    base.join(href).ok().map(|u| u.to_string())
}

/// One table row as `(header, cell text)` pairs in column order.
pub type TableRow = Vec<(String, String)>;

/// Extract an HTML table as one entry per data row, paired with column headers.
///
/// Headers come from `thead th`; without a `thead` the first row's cells are
/// the headers and that row is not returned as data. Rows without `td` cells
/// are skipped and cells beyond the last header are dropped.
pub fn extract_table_rows(table: ElementRef<'_>) -> Vec<TableRow> {
    let mut headers: Vec<String> = table.select(&THEAD_TH).map(element_text).collect();
    let mut rows: Vec<ElementRef<'_>> = table.select(&TR).collect();

    if headers.is_empty() {
        let Some(first) = rows.first() else {
            return Vec::new();
        };
        headers = first.select(&TH_OR_TD).map(element_text).collect();
        rows.remove(0);
    }

    rows.into_iter()
        .filter_map(|row| {
            let data: TableRow = row
                .select(&TD)
                .zip(headers.iter())
                .map(|(cell, header)| (header.clone(), element_text(cell)))
                .collect();
            (!data.is_empty()).then_some(data)
        })
        .collect()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a marker file.
///
/// # Arguments
///
/// * `path` - Output directory to check
///
/// # Returns
///
/// `Ok(())` once a file could be created inside `path`.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or written to.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let marker = path.join(".write_check");
    stdfs::File::create(&marker)?;
    let _ = stdfs::remove_file(&marker);
    info!("Output directory is writable");
    Ok(())
}

/// Copy `path` to `<path>.bak` if it exists.
///
/// Returns the backup path, or `None` when there was nothing to back up.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn backup_file(path: &Path) -> Result<Option<PathBuf>, Box<dyn Error>> {
    if !fs::try_exists(path).await? {
        debug!("No existing file to back up");
        return Ok(None);
    }

    let mut backup = path.as_os_str().to_owned();
    backup.push(".bak");
    let backup = PathBuf::from(backup);

    if let Err(e) = fs::copy(path, &backup).await {
        warn!(backup = %backup.display(), error = %e, "Backup copy failed");
        return Err(e.into());
    }
    info!(backup = %backup.display(), "Created backup");
    Ok(Some(backup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "camosun_catalog_utils_{}_{}",
            name,
            std::process::id()
        ));
        let _ = stdfs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Full-time\n\n  2 years "), "Full-time 2 years");
        assert_eq!(clean_text("\t\n "), "");
        assert_eq!(clean_text("single"), "single");
    }

    #[test]
    fn test_element_text_joins_nested_nodes() {
        let doc = Html::parse_fragment("<li><a href='#'>ENGL 151</a>- Academic Writing</li>");
        let li = doc.select(&Selector::parse("li").unwrap()).next().unwrap();
        assert_eq!(element_text(li), "ENGL 151 - Academic Writing");
    }

    #[test]
    fn test_absolute_url() {
        let base = Url::parse("https://camosun.ca").unwrap();
        assert_eq!(
            absolute_url(&base, "/programs-courses/nursing").as_deref(),
            Some("https://camosun.ca/programs-courses/nursing")
        );
        assert_eq!(
            absolute_url(&base, "https://calendar.camosun.ca/preview_program.php?poid=1").as_deref(),
            Some("https://calendar.camosun.ca/preview_program.php?poid=1")
        );
        assert_eq!(absolute_url(&base, "   "), None);
    }

    #[test]
    fn test_extract_table_rows_with_thead() {
        let doc = Html::parse_document(
            "<table><thead><tr><th>Code</th><th>Title</th></tr></thead>
             <tbody><tr><td>ENGL 151</td><td>Academic Writing</td><td>extra</td></tr>
             <tr></tr></tbody></table>",
        );
        let table = doc.select(&Selector::parse("table").unwrap()).next().unwrap();
        let rows = extract_table_rows(table);

        assert_eq!(
            rows,
            vec![vec![
                ("Code".to_string(), "ENGL 151".to_string()),
                ("Title".to_string(), "Academic Writing".to_string()),
            ]]
        );
    }

    #[test]
    fn test_extract_table_rows_first_row_headers() {
        let doc = Html::parse_document(
            "<table><tr><td>Code</td><td>Title</td></tr>
             <tr><td>MATH 100</td><td>Calculus I</td></tr></table>",
        );
        let table = doc.select(&Selector::parse("table").unwrap()).next().unwrap();
        let rows = extract_table_rows(table);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], ("Code".to_string(), "MATH 100".to_string()));
    }

    #[test]
    fn test_extract_table_rows_empty_table() {
        let doc = Html::parse_document("<table></table>");
        let table = doc.select(&Selector::parse("table").unwrap()).next().unwrap();
        assert!(extract_table_rows(table).is_empty());
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let result = truncate_for_log("ééééé", 2);
        assert!(result.starts_with("éé…"));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_directory() {
        let dir = temp_dir("writable").join("nested");
        ensure_writable_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
        assert!(!dir.join(".write_check").exists());
        let _ = stdfs::remove_dir_all(dir.parent().unwrap());
    }

    #[tokio::test]
    async fn test_backup_file() {
        let dir = temp_dir("backup");
        stdfs::create_dir_all(&dir).unwrap();
        let file = dir.join("camosun_programs.json");

        assert_eq!(backup_file(&file).await.unwrap(), None);

        stdfs::write(&file, "[]").unwrap();
        let backup = backup_file(&file).await.unwrap().unwrap();
        assert_eq!(backup, dir.join("camosun_programs.json.bak"));
        assert_eq!(stdfs::read_to_string(&backup).unwrap(), "[]");
        let _ = stdfs::remove_dir_all(&dir);
    }
}
