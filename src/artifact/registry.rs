// =============================================================================
// Strategy Registry — in-memory binding of artifacts to implementations
// =============================================================================
//
// Rebuilt wholesale by the loader and swapped in as a single `Arc`; readers
// take a snapshot per cycle and never observe a partially updated registry.
// Entries are keyed by strategy name in a BTreeMap so iteration order is
// sorted and stable.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::strategies::Strategy;

/// One hash-verified artifact bound to its implementation.
#[derive(Clone)]
pub struct RegistryEntry {
    pub strategy_name: String,
    pub implementation: Arc<dyn Strategy>,
    pub params: Value,
    pub risk_profile: Value,
    pub artifact_id: String,
    pub artifact_hash: String,
    pub artifact_created_at: String,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("strategy_name", &self.strategy_name)
            .field("artifact_id", &self.artifact_id)
            .field("artifact_hash", &self.artifact_hash)
            .finish_non_exhaustive()
    }
}

/// Serialisable view of an entry for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntrySummary {
    pub strategy_name: String,
    pub artifact_id: String,
    pub artifact_hash: String,
    pub artifact_created_at: String,
    pub risk_profile: Value,
}

/// Immutable mapping of strategy name to registry entry.
#[derive(Debug, Default)]
pub struct StrategyRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: RegistryEntry) {
        self.entries.insert(entry.strategy_name.clone(), entry);
    }

    pub fn get(&self, strategy_name: &str) -> Option<&RegistryEntry> {
        self.entries.get(strategy_name)
    }

    /// Entries in sorted strategy-name order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summaries(&self) -> Vec<RegistryEntrySummary> {
        self.iter()
            .map(|e| RegistryEntrySummary {
                strategy_name: e.strategy_name.clone(),
                artifact_id: e.artifact_id.clone(),
                artifact_hash: e.artifact_hash.clone(),
                artifact_created_at: e.artifact_created_at.clone(),
                risk_profile: e.risk_profile.clone(),
            })
            .collect()
    }
}
