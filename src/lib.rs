//! # zipsed
//!
//! Batch-edit zip archive members by piping them through a shell filter
//! command.
//!
//! Given a list of archives, an optional regex matched against each
//! member's full internal path and an external command, every matching
//! member is fed to the command's stdin and replaced with its stdout.
//! An archive is only rewritten when at least one member actually
//! changed; non-matching members, directories and untouched archives
//! keep their bytes exactly.
//!
//! ## Example
//!
//! ```no_run
//! use regex::Regex;
//! use zipsed::{UpdateOptions, ZipUpdater};
//!
//! #[tokio::main]
//! async fn main() {
//!     let updater = ZipUpdater::new(UpdateOptions {
//!         command: "xmllint --format -".to_string(),
//!         pattern: Some(Regex::new(r"\.xml$").unwrap()),
//!         verbose: false,
//!     });
//!
//!     let failures = updater.update_all(&["bundle.zip".to_string()]).await;
//!     assert_eq!(failures, 0);
//! }
//! ```

pub mod cli;
pub mod filter;
pub mod io;
pub mod update;
pub mod zip;

pub use cli::Cli;
pub use filter::{FilterOutcome, run_filter};
pub use io::{LocalFileReader, ReadAt};
pub use update::{UpdateOptions, UpdateOutcome, ZipUpdater};
pub use zip::{ZipFileEntry, ZipParser, ZipWriter};
