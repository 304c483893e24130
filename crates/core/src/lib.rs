//! Core types and configuration for the tickpack pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Raw event and aggregation types (actions, buckets, tick records)
//! - Configuration structures
//! - Common error types and run reports

pub mod config;
pub mod error;
pub mod report;
pub mod types;

pub use config::Config;
pub use error::{Error, Result, RowParseError};
pub use report::{RunReport, SkippedFile, TickerOutcome, TickerReport};
pub use types::*;
