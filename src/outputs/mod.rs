//! Output writers.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── camosun_programs.json
//! ├── camosun_programs.json.bak   # previous run, unless --no-backup
//! └── camosun_courses.json
//! ```

pub mod json;
