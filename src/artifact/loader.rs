// =============================================================================
// Artifact Loader — binds approved artifacts to strategy implementations
// =============================================================================
//
// Runs at startup and on operator-triggered refresh. Every candidate is
// hash-verified before it can reach the registry; a mismatch is a security
// event that skips the artifact without aborting the load. When several
// approved artifacts exist for one strategy name, the most recently created
// verified one wins.
//
// The produced registry replaces the live one atomically (a single Arc
// swap); in-flight cycles keep their snapshot.
// =============================================================================

use tracing::{error, info, warn};

use crate::artifact::registry::{RegistryEntry, StrategyRegistry};
use crate::artifact::store::ArtifactStore;
use crate::strategies;

#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    store: ArtifactStore,
}

impl ArtifactLoader {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Build a fresh registry from every approved-equivalent artifact.
    ///
    /// A store failure or an empty approved set yields an empty registry:
    /// the runtime stays up and administrable, generating zero signals until
    /// a refresh finds something loadable.
    pub fn load_approved_strategies(&self) -> StrategyRegistry {
        let artifacts = match self.store.list_approved() {
            Ok(artifacts) => artifacts,
            Err(e) => {
                error!(error = %e, "failed to list approved artifacts; registry left empty");
                return StrategyRegistry::empty();
            }
        };

        if artifacts.is_empty() {
            warn!("no approved artifacts found; registry is empty until a refresh");
            return StrategyRegistry::empty();
        }

        let mut registry = StrategyRegistry::empty();
        for artifact in artifacts {
            if let Err(e) = artifact.verify_hash() {
                error!(
                    security_event = true,
                    artifact_id = %artifact.id,
                    error = %e,
                    "artifact failed hash verification; skipping"
                );
                continue;
            }

            let implementation = match strategies::resolve(&artifact.strategy.name) {
                Some(implementation) => implementation,
                None => {
                    warn!(
                        artifact_id = %artifact.id,
                        strategy = %artifact.strategy.name,
                        "no implementation for strategy; skipping"
                    );
                    continue;
                }
            };

            // Keep the most recently created artifact per strategy name.
            if let Some(existing) = registry.get(&artifact.strategy.name) {
                if existing.artifact_created_at.as_str() >= artifact.created_at.as_str() {
                    continue;
                }
            }

            registry.insert(RegistryEntry {
                strategy_name: artifact.strategy.name.clone(),
                implementation,
                params: artifact.strategy.params.clone(),
                risk_profile: artifact.risk_profile.clone(),
                artifact_id: artifact.id.clone(),
                artifact_hash: artifact.payload_hash.clone(),
                artifact_created_at: artifact.created_at.clone(),
            });
        }

        info!(
            strategies = registry.len(),
            "strategy registry loaded from approved artifacts"
        );
        registry
    }

    /// Rebuild the registry and swap it into the shared state. Returns the
    /// number of bound strategies.
    pub fn refresh(&self, app: &crate::app_state::AppState) -> usize {
        let registry = self.load_approved_strategies();
        let count = registry.len();
        app.swap_registry(registry);
        info!(strategies = count, "registry refreshed");
        count
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::domain::{
        Artifact, ArtifactState, DataWindow, StrategyRef, ValidationMetrics, ValidationRecord,
        SCHEMA_VERSION,
    };
    use crate::db::Database;
    use serde_json::json;

    fn fixture() -> (Database, ArtifactStore, ArtifactLoader) {
        let db = Database::in_memory().unwrap();
        let store = ArtifactStore::new(db.clone());
        let loader = ArtifactLoader::new(store.clone());
        (db, store, loader)
    }

    fn approved(store: &ArtifactStore, id: &str, strategy: &str, created_at: &str) {
        let mut artifact = Artifact {
            id: id.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            strategy: StrategyRef {
                name: strategy.to_string(),
                version: "1.0.0".to_string(),
                code_ref: format!("abc:{strategy}"),
                params: json!({"period": 14}),
            },
            data_window: DataWindow {
                from: "2024-01-01T00:00:00.000000Z".to_string(),
                to: "2024-05-31T00:00:00.000000Z".to_string(),
                symbols: vec!["AAPL".to_string()],
            },
            validation: ValidationRecord {
                backtest_run_id: format!("bt-{id}"),
                metrics: ValidationMetrics {
                    sharpe: 1.2,
                    max_drawdown: 0.08,
                    win_rate: 0.52,
                    total_trades: 80,
                    profit_factor: 1.3,
                },
                determinism_seed: 3,
                report_uri: None,
            },
            risk_profile: json!({"max_position_pct": 0.2}),
            created_by: "research".to_string(),
            created_at: created_at.to_string(),
            payload_hash: String::new(),
            payload_uri: None,
            signature: None,
            state: ArtifactState::Draft,
        };
        artifact.payload_hash = artifact.compute_hash().unwrap();
        store.create(&artifact).unwrap();
        store
            .update_state(id, ArtifactState::Validated, "op", "")
            .unwrap();
        store
            .update_state(id, ArtifactState::Reviewed, "op", "")
            .unwrap();
        store
            .update_state(id, ArtifactState::Approved, "op", "")
            .unwrap();
    }

    #[test]
    fn empty_store_loads_empty_registry() {
        let (_db, _store, loader) = fixture();
        assert!(loader.load_approved_strategies().is_empty());
    }

    #[test]
    fn loads_verified_approved_artifacts() {
        let (_db, store, loader) = fixture();
        approved(&store, "a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z");
        approved(&store, "a-2", "macd_crossover", "2024-06-01T00:00:00.000000Z");

        let registry = loader.load_approved_strategies();
        assert_eq!(registry.len(), 2);
        let entry = registry.get("rsi_momentum").unwrap();
        assert_eq!(entry.artifact_id, "a-1");
        assert!(entry.artifact_hash.starts_with("sha256:"));
    }

    #[test]
    fn draft_artifacts_are_not_loaded() {
        let (_db, store, loader) = fixture();
        approved(&store, "a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z");
        // A draft for another strategy must not appear.
        let mut artifact = store.get_by_id("a-1").unwrap();
        artifact.id = "a-2".to_string();
        artifact.strategy.name = "macd_crossover".to_string();
        artifact.state = ArtifactState::Draft;
        artifact.payload_hash = artifact.compute_hash().unwrap();
        store.create(&artifact).unwrap();

        let registry = loader.load_approved_strategies();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("macd_crossover").is_none());
    }

    #[test]
    fn hash_mismatch_skips_artifact_but_not_load() {
        let (db, store, loader) = fixture();
        approved(&store, "good", "rsi_momentum", "2024-06-01T00:00:00.000000Z");
        approved(&store, "bad", "macd_crossover", "2024-06-01T00:00:00.000000Z");

        // Corrupt the bad artifact's params behind the store's back: its
        // stored hash no longer matches the canonical payload.
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE strategy_artifacts SET params = '{\"period\": 2}' WHERE id = 'bad'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let registry = loader.load_approved_strategies();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("rsi_momentum").is_some());
        assert!(registry.get("macd_crossover").is_none());
    }

    #[test]
    fn unknown_implementation_is_skipped() {
        let (_db, store, loader) = fixture();
        approved(&store, "a-1", "quantum_leap", "2024-06-01T00:00:00.000000Z");
        assert!(loader.load_approved_strategies().is_empty());
    }

    #[test]
    fn latest_created_artifact_wins_per_strategy() {
        let (_db, store, loader) = fixture();
        approved(&store, "older", "rsi_momentum", "2024-06-01T00:00:00.000000Z");
        approved(&store, "newer", "rsi_momentum", "2024-06-03T00:00:00.000000Z");

        let registry = loader.load_approved_strategies();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("rsi_momentum").unwrap().artifact_id, "newer");
    }

    #[test]
    fn revocation_takes_effect_on_next_load() {
        let (_db, store, loader) = fixture();
        approved(&store, "a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z");
        assert_eq!(loader.load_approved_strategies().len(), 1);

        store
            .update_state("a-1", ArtifactState::Revoked, "op", "compromised")
            .unwrap();
        assert!(loader.load_approved_strategies().is_empty());
    }

    #[test]
    fn active_artifacts_load_like_approved() {
        let (_db, store, loader) = fixture();
        approved(&store, "a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z");
        store
            .update_state("a-1", ArtifactState::Active, "op", "live")
            .unwrap();
        assert_eq!(loader.load_approved_strategies().len(), 1);
    }
}
