// COCH Exporter - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus surface of the exporter.
//!
//! All collectors live in an [`ExporterMetrics`] value owning its own
//! registry; the poll loop publishes a full cycle outcome at once and
//! the HTTP handler encodes the registry on demand.

use crate::poller::CycleOutcome;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

/// The exporter's collectors and their registry.
pub struct ExporterMetrics {
    registry: Registry,

    /// Per-config-file conformance average, labeled with the split
    /// identity of normal comparison targets.
    conformance: GaugeVec,

    /// Aggregated score of merged vm/storage baseline pairs, labeled
    /// with the vm record's split identity.
    optimal: GaugeVec,

    /// Observed bucket count per queried (index, component) pair.
    buckets: GaugeVec,

    /// Config file ids that did not split into the configured labels.
    invalid: Gauge,
}

impl ExporterMetrics {
    /// Build and register all collectors. `label_names` are the identity
    /// labels exported on the per-file gauges.
    pub fn new(label_names: &[String]) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();

        let conformance = GaugeVec::new(
            Opts::new("conformance_checker_gauge", "Conformance Checker Gauge"),
            &names,
        )?;
        registry.register(Box::new(conformance.clone()))?;

        let optimal = GaugeVec::new(
            Opts::new(
                "conformance_checker_optimal_gauge",
                "Conformance Checker Optimal Gauge",
            ),
            &names,
        )?;
        registry.register(Box::new(optimal.clone()))?;

        let buckets = GaugeVec::new(
            Opts::new(
                "conformance_checker_buckets_gauge",
                "Conformance Checker Buckets Gauge",
            ),
            &["index", "component"],
        )?;
        registry.register(Box::new(buckets.clone()))?;

        let invalid = Gauge::new(
            "conformance_checker_invalid_config_file_id_gauge",
            "Conformance Checker Invalid Config File ID Gauge",
        )?;
        registry.register(Box::new(invalid.clone()))?;

        Ok(Self {
            registry,
            conformance,
            optimal,
            buckets,
            invalid,
        })
    }

    /// Replace the previous cycle's series with this cycle's records.
    ///
    /// The vectors are reset first so files that disappeared upstream
    /// stop being exported.
    pub fn publish(&self, outcome: &CycleOutcome) {
        self.conformance.reset();
        for diff in &outcome.diffs {
            let values: Vec<&str> = diff.identity.labels().iter().map(String::as_str).collect();
            self.conformance.with_label_values(&values).set(diff.average);
        }

        self.optimal.reset();
        for merged in &outcome.optimals {
            let values: Vec<&str> = merged.identity.labels().iter().map(String::as_str).collect();
            self.optimal
                .with_label_values(&values)
                .set(merged.aggregated_score());
        }

        self.buckets.reset();
        for summary in &outcome.summaries {
            self.buckets
                .with_label_values(&[&summary.index, &summary.component])
                .set(summary.buckets as f64);
        }

        self.invalid.set(outcome.invalid_identities as f64);
    }

    /// Encode the registry to Prometheus text format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }
}
