// COCH - Configuration conformance metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Bucket tree navigation
//!
//! Typed accessors over an untyped aggregation response. Every accessor
//! returns an explicit [`ShapeError`] on a schema mismatch instead of
//! panicking; the response either matches the aggregation the query asked
//! for or the document is rejected.

use crate::error::ShapeError;
use serde_json::Value;

/// Aggregation name for the per-config-file terms bucket.
pub const CONFIG_FILE_ID: &str = "CONFIG_FILE_ID";
/// Aggregation name for the per-file timestamp terms bucket.
pub const TIMESTAMP: &str = "TIMESTAMP";
/// Aggregation name for the key/value/type terms bucket.
pub const KEY_VALUE_TYPE: &str = "KEY_VALUE_TYPE";
/// Sub-aggregation holding the per-bucket maximum metric value.
pub const MAX: &str = "MAX";
/// Sub-aggregation holding the per-bucket minimum metric value.
pub const MIN: &str = "MIN";
/// Sub-aggregation holding the per-bucket metric cardinality.
pub const CARDINALITY: &str = "1";

/// Return the bucket's `"key"` field.
pub fn key(node: &Value) -> Result<&Value, ShapeError> {
    let obj = node.as_object().ok_or_else(|| ShapeError::NotAnObject {
        context: "bucket".to_string(),
    })?;
    obj.get("key").ok_or_else(|| ShapeError::MissingField {
        field: "key".to_string(),
    })
}

/// Return the bucket's `"key"` field as a string.
pub fn key_str(node: &Value) -> Result<&str, ShapeError> {
    key(node)?
        .as_str()
        .ok_or(ShapeError::KeyType { expected: "string" })
}

/// Return the bucket's `"key"` field as a number.
pub fn key_num(node: &Value) -> Result<f64, ShapeError> {
    key(node)?
        .as_f64()
        .ok_or(ShapeError::KeyType { expected: "number" })
}

/// Return the bucket's `"key"` field as epoch milliseconds.
pub fn key_millis(node: &Value) -> Result<i64, ShapeError> {
    Ok(key_num(node)? as i64)
}

/// Return the `"buckets"` list nested under `field`.
///
/// The node must be shaped as `{field: {"buckets": [...]}}`.
pub fn buckets<'a>(node: &'a Value, field: &str) -> Result<&'a [Value], ShapeError> {
    let obj = node.as_object().ok_or_else(|| ShapeError::NotAnObject {
        context: format!("parent of {field:?}"),
    })?;
    let nested = obj.get(field).ok_or_else(|| ShapeError::MissingField {
        field: field.to_string(),
    })?;
    nested
        .get("buckets")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| ShapeError::NotABucketList {
            field: field.to_string(),
        })
}

/// Return the first bucket of the `"buckets"` list under `field`.
///
/// An empty list is a [`ShapeError::EmptyBuckets`], not a panic.
pub fn first_bucket<'a>(node: &'a Value, field: &str) -> Result<&'a Value, ShapeError> {
    buckets(node, field)?
        .first()
        .ok_or_else(|| ShapeError::EmptyBuckets {
            field: field.to_string(),
        })
}

/// Return the scalar of a `{field: {"value": <number>}}` sub-aggregation.
pub fn scalar(node: &Value, field: &str) -> Result<f64, ShapeError> {
    node.get(field)
        .and_then(|v| v.get("value"))
        .and_then(Value::as_f64)
        .ok_or_else(|| ShapeError::NotAScalar {
            field: field.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_str() {
        let node = json!({"key": "abc", "KEYWORD": {"buckets": [{"key": "bar"}]}});
        assert_eq!(key_str(&node).unwrap(), "abc");
    }

    #[test]
    fn test_key_missing() {
        let node = json!({"doc_count": 3});
        assert_eq!(
            key(&node),
            Err(ShapeError::MissingField {
                field: "key".to_string()
            })
        );
    }

    #[test]
    fn test_key_on_non_object() {
        assert!(key(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_key_millis() {
        let node = json!({"key": 1613630700000_i64});
        assert_eq!(key_millis(&node).unwrap(), 1613630700000);
    }

    #[test]
    fn test_key_wrong_type() {
        let node = json!({"key": 42});
        assert_eq!(
            key_str(&node),
            Err(ShapeError::KeyType { expected: "string" })
        );
    }

    #[test]
    fn test_buckets() {
        let node = json!({"key": "abc", "KEYWORD": {"buckets": [{"foo": "bar"}, {"fizz": "buzz"}]}});
        let got = buckets(&node, "KEYWORD").unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0], json!({"foo": "bar"}));
    }

    #[test]
    fn test_buckets_missing_field() {
        let node = json!({"key": "abc"});
        assert_eq!(
            buckets(&node, "TIMESTAMP"),
            Err(ShapeError::MissingField {
                field: "TIMESTAMP".to_string()
            })
        );
    }

    #[test]
    fn test_buckets_not_a_list() {
        let node = json!({"TIMESTAMP": {"buckets": "oops"}});
        assert_eq!(
            buckets(&node, "TIMESTAMP"),
            Err(ShapeError::NotABucketList {
                field: "TIMESTAMP".to_string()
            })
        );
    }

    #[test]
    fn test_first_bucket_empty() {
        let node = json!({"TIMESTAMP": {"buckets": []}});
        assert_eq!(
            first_bucket(&node, "TIMESTAMP").unwrap_err(),
            ShapeError::EmptyBuckets {
                field: "TIMESTAMP".to_string()
            }
        );
    }

    #[test]
    fn test_scalar() {
        let node = json!({"MIN": {"value": 1.5}, "MAX": {"value": 4.0}, "1": {"value": 2.0}});
        assert_eq!(scalar(&node, "MIN").unwrap(), 1.5);
        assert_eq!(scalar(&node, "MAX").unwrap(), 4.0);
        assert_eq!(scalar(&node, CARDINALITY).unwrap(), 2.0);
    }

    #[test]
    fn test_scalar_missing() {
        let node = json!({"MIN": {"count": 1.5}});
        assert!(scalar(&node, "MIN").is_err());
        assert!(scalar(&node, "MAX").is_err());
    }
}
