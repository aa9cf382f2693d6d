// COCH - Configuration conformance metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Line extraction and scoring
//!
//! A config file line is one key/value/type triple observed at the file's
//! most recent timestamp. Its score encodes either a comparison value
//! (normal targets) or a sentinel marking which side of a baseline pair
//! reported the triple. Summing the sentinels during the optimal merge is
//! what distinguishes vm-only (1), storage-only (1000), and both-agree
//! (1001) triples from genuine value differences.

use crate::bucket;
use crate::error::ShapeError;
use crate::identity::Role;
use serde::Serialize;
use serde_json::Value;

/// Score of a triple reported only by the vm side.
pub const VM_ONLY_SCORE: f64 = 1.0;
/// Score of a triple reported only by the storage side.
pub const STORAGE_ONLY_SCORE: f64 = 1000.0;
/// Post-merge score of a triple both sides reported identically.
pub const BOTH_SCORE: f64 = 1001.0;

/// Categorical reading of a line score.
///
/// The numeric sentinels stay on the wire for dashboard compatibility;
/// inside the pipeline they are matched through this enum only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCategory {
    /// Only the vm side reported the triple
    VmOnly,
    /// Only the storage side reported the triple
    StorageOnly,
    /// Both sides reported the triple identically
    Both,
    /// Both sides reported the triple with differing values
    Differs,
}

impl LineCategory {
    /// Read the category a score encodes. Sentinel comparison is exact
    /// on purpose; any non-sentinel score means the values differ.
    #[allow(clippy::float_cmp)]
    pub fn from_score(score: f64) -> Self {
        if score == VM_ONLY_SCORE {
            LineCategory::VmOnly
        } else if score == STORAGE_ONLY_SCORE {
            LineCategory::StorageOnly
        } else if score == BOTH_SCORE {
            LineCategory::Both
        } else {
            LineCategory::Differs
        }
    }
}

/// One key/value/type triple observed for a config file at its latest
/// timestamp. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigFileLine {
    /// Raw identifier of the owning config file
    pub config_file_id: String,
    /// The `key value type` triple, as keyed by the aggregation
    pub key_value_type: String,
    /// Score derived from the triple's min/max/cardinality statistics,
    /// or a role sentinel
    pub score: f64,
}

/// Epoch milliseconds of the file's most recent observed write.
///
/// The query sorts timestamp buckets by descending key and caps them to
/// one, so the first bucket is the latest.
pub fn latest_timestamp(file_node: &Value) -> Result<i64, ShapeError> {
    bucket::key_millis(bucket::first_bucket(file_node, bucket::TIMESTAMP)?)
}

/// Walk one config file's bucket subtree and produce its lines.
pub fn extract_lines(file_node: &Value, role: Role) -> Result<Vec<ConfigFileLine>, ShapeError> {
    let config_file_id = bucket::key_str(file_node)?;
    let latest = bucket::first_bucket(file_node, bucket::TIMESTAMP)?;

    let mut lines = Vec::new();
    for leaf in bucket::buckets(latest, bucket::KEY_VALUE_TYPE)? {
        lines.push(ConfigFileLine {
            config_file_id: config_file_id.to_string(),
            key_value_type: bucket::key_str(leaf)?.to_string(),
            score: line_score(leaf, role)?,
        });
    }
    Ok(lines)
}

/// Score one key/value/type leaf bucket.
///
/// Normal targets score `((min + max) * cardinality) / 2` from the
/// nested sub-aggregations; baselines score their side's sentinel.
fn line_score(leaf: &Value, role: Role) -> Result<f64, ShapeError> {
    match role {
        Role::Diff => {
            let min = bucket::scalar(leaf, bucket::MIN)?;
            let max = bucket::scalar(leaf, bucket::MAX)?;
            let count = bucket::scalar(leaf, bucket::CARDINALITY)?;
            Ok(((min + max) * count) / 2.0)
        }
        Role::StorageOptimal => Ok(STORAGE_ONLY_SCORE),
        Role::VmOptimal => Ok(VM_ONLY_SCORE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file_node() -> Value {
        json!({
            "key": "p__mod__v1__host-1__prov__file",
            "TIMESTAMP": {
                "buckets": [
                    {
                        "key": 1613630700000_i64,
                        "KEY_VALUE_TYPE": {
                            "buckets": [
                                {
                                    "key": "port 8080 int",
                                    "1": {"value": 2.0},
                                    "MAX": {"value": 1.0},
                                    "MIN": {"value": 1.0}
                                },
                                {
                                    "key": "user root string",
                                    "1": {"value": 1.0},
                                    "MAX": {"value": 4.0},
                                    "MIN": {"value": 2.0}
                                }
                            ]
                        }
                    }
                ]
            }
        })
    }

    #[test]
    fn test_latest_timestamp() {
        assert_eq!(latest_timestamp(&file_node()).unwrap(), 1613630700000);
    }

    #[test]
    fn test_extract_diff_lines() {
        let lines = extract_lines(&file_node(), Role::Diff).unwrap();
        assert_eq!(lines.len(), 2);
        // (1 + 1) * 2 / 2
        assert_eq!(lines[0].score, 2.0);
        assert_eq!(lines[0].key_value_type, "port 8080 int");
        // (2 + 4) * 1 / 2
        assert_eq!(lines[1].score, 3.0);
        assert_eq!(lines[0].config_file_id, "p__mod__v1__host-1__prov__file");
    }

    #[test]
    fn test_extract_baseline_lines_use_sentinels() {
        let storage = extract_lines(&file_node(), Role::StorageOptimal).unwrap();
        assert!(storage.iter().all(|l| l.score == STORAGE_ONLY_SCORE));

        let vm = extract_lines(&file_node(), Role::VmOptimal).unwrap();
        assert!(vm.iter().all(|l| l.score == VM_ONLY_SCORE));
    }

    #[test]
    fn test_extract_missing_timestamp_is_shape_error() {
        let node = json!({"key": "x", "doc_count": 1});
        assert!(extract_lines(&node, Role::Diff).is_err());
    }

    #[test]
    fn test_extract_empty_timestamp_buckets() {
        let node = json!({"key": "x", "TIMESTAMP": {"buckets": []}});
        assert_eq!(
            extract_lines(&node, Role::Diff).unwrap_err(),
            ShapeError::EmptyBuckets {
                field: "TIMESTAMP".to_string()
            }
        );
    }

    #[test]
    fn test_diff_score_requires_subaggregations() {
        let node = json!({
            "key": "x",
            "TIMESTAMP": {"buckets": [
                {"key": 1_i64, "KEY_VALUE_TYPE": {"buckets": [{"key": "a b c"}]}}
            ]}
        });
        assert!(extract_lines(&node, Role::Diff).is_err());
        // Baseline roles never read the sub-aggregations
        assert!(extract_lines(&node, Role::VmOptimal).is_ok());
    }

    #[test]
    fn test_line_category_from_score() {
        assert_eq!(LineCategory::from_score(1.0), LineCategory::VmOnly);
        assert_eq!(LineCategory::from_score(1000.0), LineCategory::StorageOnly);
        assert_eq!(LineCategory::from_score(1001.0), LineCategory::Both);
        assert_eq!(LineCategory::from_score(500.0), LineCategory::Differs);
        assert_eq!(LineCategory::from_score(1000.0001), LineCategory::Differs);
    }
}
