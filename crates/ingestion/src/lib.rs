//! Raw order-book log ingestion for the tickpack pipeline.
//!
//! This crate handles:
//! - Gzip + CSV decoding of one log file
//! - Folding rows into per-file (timestamp, price) buckets

pub mod aggregation;
pub mod decoder;

pub use aggregation::{AggregationTable, FoldStats};
pub use decoder::RecordDecoder;
