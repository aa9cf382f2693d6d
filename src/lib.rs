//! # COCH - Configuration conformance metrics
//!
//! Extraction pipeline turning nested search-aggregation responses into
//! flat per-config-file conformance records.
//!
//! Config files observed by two provisioning paths (a per-host "vm"
//! variant and a centrally managed "storage" variant) are aggregated
//! upstream into a bucket tree keyed by config file id, latest write
//! timestamp, and key/value/type triple. This crate walks that tree,
//! reconstructs each file's identity, classifies it as a comparison
//! target or an optimal baseline, scores its lines, and pairs vm
//! baselines with their storage counterparts.
//!
//! ## Quick Start
//!
//! ```rust
//! use coch::{parse_document, PipelineConfig};
//!
//! let raw = br#"{"aggregations": {"CONFIG_FILE_ID": {"buckets": [
//!     {"key": "p__mod__v1__host-1__prov__-etc-app-conf",
//!      "TIMESTAMP": {"buckets": [{"key": 1613630700000,
//!          "KEY_VALUE_TYPE": {"buckets": [
//!              {"key": "port 8080 int", "1": {"value": 2.0},
//!               "MAX": {"value": 1.0}, "MIN": {"value": 1.0}}
//!          ]}}]}}
//! ]}}}"#;
//!
//! let outcome = parse_document(raw, &PipelineConfig::default()).unwrap();
//! assert_eq!(outcome.diffs.len(), 1);
//! assert_eq!(outcome.diffs[0].average, 2.0);
//! ```
//!
//! ## Modules
//!
//! - [`bucket`]: Typed navigation over the untyped aggregation tree
//! - [`identity`]: Identifier splitting and role classification
//! - [`line`]: Per-line extraction and scoring
//! - [`metric`]: Record aggregation, baseline merging, exported score
//! - [`pipeline`]: Whole-document walk
//! - [`config`]: Explicit pipeline configuration
//! - [`error`]: Error types

// Modules
pub mod bucket;
pub mod config;
pub mod error;
pub mod identity;
pub mod line;
pub mod metric;
pub mod pipeline;

// Public API re-exports
pub use config::PipelineConfig;
pub use error::{CochError, InvalidIdentity, Result, ShapeError};
pub use identity::{ConfigFileIdentity, Role, OPTIMAL_SENTINEL};
pub use line::{ConfigFileLine, LineCategory, BOTH_SCORE, STORAGE_ONLY_SCORE, VM_ONLY_SCORE};
pub use metric::{merge_optimals, BucketSummary, ConfigMetric, LineTally};
pub use pipeline::{parse_document, parse_value, ParseOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
