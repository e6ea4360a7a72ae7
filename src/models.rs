//! Data models for scraped catalogue pages.
//!
//! This module defines the records written to the JSON output:
//! - [`ProgramLink`] / [`Program`]: discovered program URLs and the parsed program pages
//! - [`CourseLink`] / [`Course`]: discovered course URLs and the parsed course pages
//!
//! All records are flat. Fields that could not be found on a page stay empty
//! rather than being omitted, so every record in a file has the same shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A program detail link found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProgramLink {
    /// Anchor text from the listing row.
    pub name: String,
    /// Absolute URL of the program detail page.
    pub url: String,
}

/// One scraped program page.
///
/// The `url` is the only identifier. Outline-derived fields
/// (`curriculum`, `total_credits`, `program_code`, `cip`) are only filled when
/// the page links to a program outline on the academic calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Program {
    pub url: String,
    pub name: String,
    pub title: String,
    pub intro_text: String,
    pub overview: String,
    pub credential: String,
    pub work_experience: String,
    pub study_options: String,
    pub open_to_international: String,
    pub area_of_study: String,
    pub length: String,
    pub location: String,
    pub start_date: String,
    pub program_outline_url: String,
    /// Courses as `"CODE - Title"` entries.
    pub curriculum: Vec<String>,
    pub total_credits: String,
    pub program_code: String,
    pub cip: String,
    pub tuition_info: String,
    pub admission_requirements: String,
    /// Unrecognised glance entries and outline rows, keyed by lower-cased label.
    pub metadata: BTreeMap<String, String>,
}

impl Program {
    /// An empty record for `url`.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }
}

/// A course detail link found on a course listing page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CourseLink {
    /// Course code as shown in the listing, e.g. `"ENGL 151"`.
    pub code: String,
    pub url: String,
}

/// One scraped course page from the academic calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Course {
    pub url: String,
    pub code: String,
    pub title: String,
    pub description: String,
    pub credits: String,
    pub hours: String,
    /// Requisite heading mapped to its listed items.
    pub prerequisites: BTreeMap<String, Vec<String>>,
    pub corequisites: String,
    pub restrictions: String,
    pub notes: String,
}

impl Course {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }
}
