// COCH - Configuration conformance metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Conformance metric records
//!
//! Reduces a config file's lines into category counts and an averaged
//! score, pairs vm baselines with their storage counterparts, and folds
//! the counts into the single exported scalar.

use crate::identity::ConfigFileIdentity;
use crate::line::{ConfigFileLine, LineCategory};
use serde::Serialize;
use std::collections::BTreeMap;

/// One emitted conformance record for a config file.
///
/// Counts and average are overwritten once by the optimal merge for
/// vm-side baselines; Diff records are immutable after creation.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigMetric {
    /// Epoch millis of the file's latest observed write
    pub timestamp: i64,
    /// The split identity the record is labeled with
    #[serde(skip)]
    pub identity: ConfigFileIdentity,
    /// Constituent lines, kept for the merge step
    pub lines: Vec<ConfigFileLine>,
    /// Lines both sides reported identically
    pub both_count: u64,
    /// Lines only the storage side reported
    pub storage_count: u64,
    /// Lines only the vm side reported
    pub vm_count: u64,
    /// Plain average line score
    pub average: f64,
}

impl ConfigMetric {
    /// Fold the category counts and the average into one sortable
    /// scalar: `both*1e9 + storage*1e6 + vm*1e3 + average/10`.
    ///
    /// Disagreement categories dominate the ordering; average drift only
    /// breaks ties within a category combination.
    pub fn aggregated_score(&self) -> f64 {
        let bc = self.both_count as f64 * 1e9;
        let sc = self.storage_count as f64 * 1e6;
        let vc = self.vm_count as f64 * 1e3;
        bc + sc + vc + self.average / 10.0
    }
}

/// Category counts and average over a set of line scores.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LineTally {
    /// Lines scoring the both-agree sentinel
    pub both: u64,
    /// Lines scoring the storage-only sentinel
    pub storage: u64,
    /// Lines scoring the vm-only sentinel
    pub vm: u64,
    /// Plain average score; 0.0 over an empty set
    pub average: f64,
}

impl LineTally {
    /// Single pass over the scores: sum for the average, tally the
    /// sentinel categories. The average of no lines is defined as 0.0.
    pub fn from_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut tally = LineTally::default();
        let mut sum = 0.0;
        let mut count = 0u64;

        for score in scores {
            sum += score;
            count += 1;
            match LineCategory::from_score(score) {
                LineCategory::VmOnly => tally.vm += 1,
                LineCategory::StorageOnly => tally.storage += 1,
                LineCategory::Both => tally.both += 1,
                LineCategory::Differs => {}
            }
        }

        if count > 0 {
            tally.average = sum / count as f64;
        }
        tally
    }

    /// Write this tally into a record's derived fields.
    pub fn apply(&self, metric: &mut ConfigMetric) {
        metric.both_count = self.both;
        metric.storage_count = self.storage;
        metric.vm_count = self.vm;
        metric.average = self.average;
    }
}

/// Pair each vm-side baseline with its storage-side counterpart and
/// recompute its counts and average.
///
/// Matched pairs merge by key/value/type triple, summing per-triple
/// scores across both line sets, then re-tally over the summed map: a
/// triple both sides reported sums to 1001, one-sided triples keep their
/// sentinel. An unmatched vm record defaults to all-vm counts with
/// average 1 (presumed vm-only, no baseline to compare against).
///
/// Storage records without a vm counterpart are dropped; the vm side
/// drives the enumeration. Input maps are ordered by raw identifier so
/// the output order is deterministic.
pub fn merge_optimals(
    vm_optimal: BTreeMap<String, ConfigMetric>,
    storage_optimal: BTreeMap<String, ConfigMetric>,
    delimiter: &str,
    target_slot: usize,
) -> Vec<ConfigMetric> {
    let mut merged = Vec::with_capacity(vm_optimal.len());

    for (_, mut vm) in vm_optimal {
        let counterpart = vm.identity.storage_counterpart(delimiter, target_slot);

        match storage_optimal.get(&counterpart) {
            Some(storage) => {
                merged_tally(&vm.lines, &storage.lines).apply(&mut vm);
            }
            None => {
                vm.both_count = 0;
                vm.storage_count = 0;
                vm.vm_count = vm.lines.len() as u64;
                vm.average = 1.0;
            }
        }
        merged.push(vm);
    }

    merged
}

/// Sum both line sets by key/value/type triple and tally the sums.
fn merged_tally(vm_lines: &[ConfigFileLine], storage_lines: &[ConfigFileLine]) -> LineTally {
    let mut by_triple: BTreeMap<&str, f64> = BTreeMap::new();
    for line in vm_lines.iter().chain(storage_lines) {
        *by_triple.entry(line.key_value_type.as_str()).or_insert(0.0) += line.score;
    }
    LineTally::from_scores(by_triple.into_values())
}

/// Per-(index, component) count of observed buckets, an operational
/// signal independent of the classification pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSummary {
    /// Index the aggregation was queried against
    pub index: String,
    /// Component the query filtered on
    pub component: String,
    /// Number of string-keyed buckets observed in the raw response
    pub buckets: usize,
}

impl BucketSummary {
    /// Count string-keyed buckets by scanning the raw response text for
    /// `"key":"` occurrences. Numeric bucket keys (timestamps) are not
    /// counted.
    pub fn from_raw(index: &str, component: &str, raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        Self {
            index: index.to_string(),
            component: component.to_string(),
            buckets: text.matches(r#""key":""#).count(),
        }
    }
}
