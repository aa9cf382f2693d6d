// COCH - Configuration conformance metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Pipeline configuration
//!
//! The extraction pipeline is driven by an explicit configuration value
//! passed in by the caller; there is no global mutable state.

use crate::error::CochError;

/// Configuration consumed by the extraction pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Delimiter the config file identifier is split on
    pub delimiter: String,

    /// Ordered label names; their count fixes the identity arity
    pub labels: Vec<String>,

    /// Identity slot inspected for the `optimal` role marker
    pub role_slot: usize,

    /// Identity slot carrying the hostname, or the `optimal` sentinel
    /// for storage-side baselines
    pub target_slot: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            delimiter: "__".to_string(),
            labels: (1..=6).map(|i| format!("label_{i}")).collect(),
            role_slot: 1,
            target_slot: 3,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration, validating that both slots fall inside
    /// the label sequence.
    pub fn new(
        delimiter: impl Into<String>,
        labels: Vec<String>,
        role_slot: usize,
        target_slot: usize,
    ) -> Result<Self, CochError> {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            return Err(CochError::InvalidConfig("delimiter is empty".to_string()));
        }
        if labels.is_empty() {
            return Err(CochError::InvalidConfig("no labels configured".to_string()));
        }
        if role_slot >= labels.len() {
            return Err(CochError::InvalidConfig(format!(
                "role slot {} out of range for {} labels",
                role_slot,
                labels.len()
            )));
        }
        if target_slot >= labels.len() {
            return Err(CochError::InvalidConfig(format!(
                "target slot {} out of range for {} labels",
                target_slot,
                labels.len()
            )));
        }
        Ok(Self {
            delimiter,
            labels,
            role_slot,
            target_slot,
        })
    }

    /// Number of labels a valid identity must split into.
    pub fn arity(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.delimiter, "__");
        assert_eq!(config.arity(), 6);
        assert_eq!(config.labels[0], "label_1");
        assert_eq!(config.labels[5], "label_6");
        assert_eq!(config.role_slot, 1);
        assert_eq!(config.target_slot, 3);
    }

    #[test]
    fn test_new_validates_slots() {
        let labels: Vec<String> = (1..=4).map(|i| format!("l{i}")).collect();
        assert!(PipelineConfig::new("__", labels.clone(), 1, 3).is_ok());
        assert!(PipelineConfig::new("__", labels.clone(), 4, 3).is_err());
        assert!(PipelineConfig::new("__", labels.clone(), 1, 4).is_err());
        assert!(PipelineConfig::new("", labels, 1, 3).is_err());
    }

    #[test]
    fn test_new_rejects_empty_labels() {
        assert!(PipelineConfig::new("__", Vec::new(), 0, 0).is_err());
    }
}
