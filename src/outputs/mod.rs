//! Run outputs: the release file and the skip log.
//!
//! # Submodules
//!
//! - [`records`]: Writes accepted releases to a CSV file named after the date window
//! - [`skip_log`]: Append-only log of sites that produced no records and why
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── 2024_05_09-2024_05_16.csv   # company,title,url
//!
//! skipped_sites.log               # one line per skipped site, appended across runs
//! ```

pub mod records;
pub mod skip_log;
