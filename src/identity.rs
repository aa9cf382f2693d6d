// COCH - Configuration conformance metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Config file identity
//!
//! A config file identifier is a delimited string such as
//! `project-a__terraform-module__v1_4_7__host-01__prov-xyz__-etc-app-conf`.
//! Splitting it yields an ordered label sequence whose length must match
//! the configured label count. Two fixed slots carry role information:
//! the role slot marks optimal baselines, the target slot carries either
//! a hostname or the `optimal` sentinel.

use crate::error::InvalidIdentity;

/// Sentinel marking a storage-side baseline in the target slot, and the
/// value written into that slot when deriving a vm record's storage
/// counterpart key.
pub const OPTIMAL_SENTINEL: &str = "optimal";

/// Classification of a config file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Normal comparison target
    Diff,
    /// Centrally managed baseline
    StorageOptimal,
    /// Per-host baseline
    VmOptimal,
}

/// Ordered label sequence reconstructed from a config file identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFileIdentity {
    raw: String,
    labels: Vec<String>,
}

impl ConfigFileIdentity {
    /// Split `raw` on `delimiter` into exactly `arity` labels.
    ///
    /// Any other label count is an [`InvalidIdentity`]; the error carries
    /// the single-element fallback `[raw]` for callers that count the
    /// failure but keep the identifier.
    pub fn split(raw: &str, delimiter: &str, arity: usize) -> Result<Self, InvalidIdentity> {
        let labels: Vec<String> = raw.split(delimiter).map(str::to_string).collect();
        if labels.len() != arity {
            return Err(InvalidIdentity {
                raw: raw.to_string(),
                delimiter: delimiter.to_string(),
                expected: arity,
                fallback: vec![raw.to_string()],
            });
        }
        Ok(Self {
            raw: raw.to_string(),
            labels,
        })
    }

    /// The identifier as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The ordered label values.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Classify the record this identity belongs to.
    ///
    /// The role slot label carries a naming convention (a module name
    /// suffixed `--optimal`), so it is a substring check; the target slot
    /// is an exact match against the sentinel. Both slots are validated
    /// against the arity when the configuration is built, so indexing
    /// here cannot go out of range.
    pub fn classify(&self, role_slot: usize, target_slot: usize) -> Role {
        if self.labels[role_slot].contains(OPTIMAL_SENTINEL) {
            if self.labels[target_slot] == OPTIMAL_SENTINEL {
                return Role::StorageOptimal;
            }
            return Role::VmOptimal;
        }
        Role::Diff
    }

    /// Derive the raw identifier of this record's storage-side
    /// counterpart: the same labels with the target slot replaced by the
    /// sentinel, rejoined on `delimiter`.
    pub fn storage_counterpart(&self, delimiter: &str, target_slot: usize) -> String {
        let mut labels = self.labels.clone();
        labels[target_slot] = OPTIMAL_SENTINEL.to_string();
        labels.join(delimiter)
    }
}
