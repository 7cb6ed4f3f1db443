//! taski core library: task/log parser, tags, agenda grouping, note scanning
//! and configuration.
//!
//! Public API surface:
//! - [`parser`]: line matchers and the two extraction operations
//! - [`tags`]: `#tag` extraction and tag grouping
//! - [`agenda`]: date-grouped views over parsed records
//! - [`scan`]: Markdown note discovery
//! - [`config`]: `~/.taski/config.yaml` load / save
//! - [`paths`]: conventional per-user locations

pub mod agenda;
pub mod config;
pub mod error;
pub mod parser;
pub mod paths;
pub mod scan;
pub mod tags;
pub mod types;

pub use config::TaskiConfig;
pub use error::CoreError;
pub use parser::{extract_all_dates, extract_for_date, parse_document};
pub use types::{DatedTaskRecord, LogEntry, ParsedTaskRecord, Task};
