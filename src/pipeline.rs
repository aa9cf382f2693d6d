// COCH - Configuration conformance metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Aggregation document walk
//!
//! Turns one raw aggregation response into emitted conformance records:
//! navigate the config-file buckets, split and classify each identity,
//! extract and tally lines, then merge baseline pairs.

use crate::bucket;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::identity::{ConfigFileIdentity, Role};
use crate::line;
use crate::metric::{merge_optimals, ConfigMetric, LineTally};
use serde_json::Value;
use std::collections::BTreeMap;

/// Everything extracted from one aggregation document.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Normal comparison targets, in bucket order
    pub diffs: Vec<ConfigMetric>,
    /// Merged vm/storage baseline records, ordered by raw identifier
    pub optimals: Vec<ConfigMetric>,
    /// Identifiers that did not split into the configured labels
    pub invalid_identities: u64,
}

/// Parse one raw aggregation response into conformance records.
///
/// An identifier with the wrong label count is counted and skipped; a
/// shape violation aborts the whole document with an error so the caller
/// can drop this task's contribution for the cycle.
pub fn parse_document(raw: &[u8], config: &PipelineConfig) -> Result<ParseOutcome> {
    let document: Value = serde_json::from_slice(raw)?;
    parse_value(&document, config)
}

/// Like [`parse_document`], over an already-parsed JSON tree.
pub fn parse_value(document: &Value, config: &PipelineConfig) -> Result<ParseOutcome> {
    let aggregations =
        document
            .get("aggregations")
            .ok_or_else(|| crate::error::ShapeError::MissingField {
                field: "aggregations".to_string(),
            })?;

    let mut outcome = ParseOutcome::default();
    let mut vm_optimal: BTreeMap<String, ConfigMetric> = BTreeMap::new();
    let mut storage_optimal: BTreeMap<String, ConfigMetric> = BTreeMap::new();

    for file_node in bucket::buckets(aggregations, bucket::CONFIG_FILE_ID)? {
        let raw_id = bucket::key_str(file_node)?;

        let identity =
            match ConfigFileIdentity::split(raw_id, &config.delimiter, config.arity()) {
                Ok(identity) => identity,
                Err(_) => {
                    outcome.invalid_identities += 1;
                    continue;
                }
            };

        let role = identity.classify(config.role_slot, config.target_slot);
        let lines = line::extract_lines(file_node, role)?;
        let timestamp = line::latest_timestamp(file_node)?;

        let mut metric = ConfigMetric {
            timestamp,
            identity,
            lines,
            both_count: 0,
            storage_count: 0,
            vm_count: 0,
            average: 0.0,
        };

        match role {
            Role::Diff => {
                LineTally::from_scores(metric.lines.iter().map(|l| l.score)).apply(&mut metric);
                outcome.diffs.push(metric);
            }
            Role::StorageOptimal => {
                storage_optimal.insert(raw_id.to_string(), metric);
            }
            Role::VmOptimal => {
                vm_optimal.insert(raw_id.to_string(), metric);
            }
        }
    }

    outcome.optimals = merge_optimals(
        vm_optimal,
        storage_optimal,
        &config.delimiter,
        config.target_slot,
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    fn diff_file(raw_id: &str) -> Value {
        json!({
            "key": raw_id,
            "TIMESTAMP": {"buckets": [{
                "key": 1613630700000_i64,
                "KEY_VALUE_TYPE": {"buckets": [
                    {"key": "port 8080 int", "1": {"value": 2.0},
                     "MAX": {"value": 1.0}, "MIN": {"value": 1.0}}
                ]}
            }]}
        })
    }

    #[test]
    fn test_parse_single_diff() {
        let doc = json!({"aggregations": {"CONFIG_FILE_ID": {"buckets": [
            diff_file("p__mod__v1__host-1__prov__file")
        ]}}});
        let outcome = parse_value(&doc, &config()).unwrap();
        assert_eq!(outcome.diffs.len(), 1);
        assert!(outcome.optimals.is_empty());
        assert_eq!(outcome.invalid_identities, 0);

        let m = &outcome.diffs[0];
        assert_eq!(m.timestamp, 1613630700000);
        assert_eq!(m.average, 2.0);
        assert_eq!(m.lines.len(), 1);
    }

    #[test]
    fn test_parse_counts_invalid_identity() {
        let doc = json!({"aggregations": {"CONFIG_FILE_ID": {"buckets": [
            {"key": "not-a-valid-id"},
            diff_file("p__mod__v1__host-1__prov__file")
        ]}}});
        let outcome = parse_value(&doc, &config()).unwrap();
        assert_eq!(outcome.invalid_identities, 1);
        assert_eq!(outcome.diffs.len(), 1);
    }

    #[test]
    fn test_parse_missing_aggregations() {
        let outcome = parse_document(br#"{"took": 3}"#, &config());
        assert!(outcome.is_err());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(parse_document(b"not json", &config()).is_err());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let doc = json!({"aggregations": {"CONFIG_FILE_ID": {"buckets": [
            diff_file("p__mod__v1__host-1__prov__file"),
            diff_file("p__mod__v1__host-2__prov__file")
        ]}}});
        let raw = serde_json::to_vec(&doc).unwrap();

        let first = parse_document(&raw, &config()).unwrap();
        let second = parse_document(&raw, &config()).unwrap();
        assert_eq!(
            serde_json::to_string(&first.diffs).unwrap(),
            serde_json::to_string(&second.diffs).unwrap()
        );
    }
}
