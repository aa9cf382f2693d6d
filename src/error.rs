//! Error types for the conformance pipeline
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, CochError>;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum CochError {
    /// Aggregation document does not match the expected bucket shape
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    /// Config file identifier does not split into the expected labels
    #[error("invalid identity: {0}")]
    Identity(#[from] InvalidIdentity),

    /// Aggregation response is not valid JSON
    #[error("malformed aggregation document: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid pipeline configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised while navigating an aggregation bucket tree
///
/// A shape violation means the response does not match the aggregation
/// schema the query asked for. It aborts extraction of the offending
/// document; it is never silently defaulted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// Expected a JSON object
    #[error("expected an object while reading {context}")]
    NotAnObject { context: String },

    /// A named field is absent
    #[error("missing field {field:?}")]
    MissingField { field: String },

    /// A field is present but not shaped as `{field: {"buckets": [...]}}`
    #[error("field {field:?} is not a bucket list")]
    NotABucketList { field: String },

    /// A bucket list is empty where at least one bucket is required
    #[error("bucket list {field:?} is empty")]
    EmptyBuckets { field: String },

    /// A sub-aggregation is not shaped as `{field: {"value": <number>}}`
    #[error("field {field:?} has no numeric value")]
    NotAScalar { field: String },

    /// A bucket key has the wrong scalar type
    #[error("bucket key is not a {expected}")]
    KeyType { expected: &'static str },
}

/// A config file identifier that does not split into the configured
/// number of labels.
///
/// The error retains the degraded single-element fallback `[raw]` so a
/// caller can both count the failure and keep the raw identifier around;
/// nothing downstream consumes the fallback beyond that.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("id {raw:?} does not split into {expected} labels with delimiter {delimiter:?}")]
pub struct InvalidIdentity {
    /// The identifier as received
    pub raw: String,
    /// The delimiter the split was attempted with
    pub delimiter: String,
    /// The expected label count
    pub expected: usize,
    /// Single-element fallback: the raw identifier, unsplit
    pub fallback: Vec<String>,
}
