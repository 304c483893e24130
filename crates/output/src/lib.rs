//! Tick file output for the tickpack pipeline.
//!
//! This crate handles:
//! - Rendering aggregation tables as tick records
//! - Serialized appends to per-ticker, per-date tick files
//! - Bundling the output tree into a `.tar.gz`

pub mod archive;
pub mod formatter;
pub mod sink;

pub use archive::{archive_directory, ArchiveStats};
pub use formatter::{format_source_time, parse_date_folder, TickFormatter};
pub use sink::OutputSink;
