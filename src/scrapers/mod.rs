//! Catalogue scrapers.
//!
//! Each scraper follows the same two-phase pattern:
//!
//! 1. **Indexing**: walk listing pages and collect detail URLs
//! 2. **Fetching**: download and parse each detail page, one at a time
//!
//! | Target | Module | Site |
//! |--------|--------|------|
//! | Programs | [`programs`] | `camosun.ca` "find a program" listing |
//! | Program outlines | [`outline`] | `calendar.camosun.ca` outline pages linked from programs |
//! | Courses | [`courses`] | `calendar.camosun.ca` course catalogue |
//!
//! All scrapers take a [`crate::fetch::PageFetcher`] so fixture tests can
//! serve pages from memory. Failed detail pages are logged and skipped.

pub mod courses;
pub mod outline;
pub mod programs;
