// =============================================================================
// Artifact Store — transactional persistence for artifacts and their audit
// trail
// =============================================================================
//
// Exclusive owner of the `strategy_artifacts` table and its satellites
// (approvals, promotions, validation reports). Writes re-verify integrity:
// `create` recomputes the hash before insert, and `update_state` performs
// read -> allow-list check -> state+hash update -> promotion append inside a
// single immediate transaction, so concurrent callers serialise on the row.
// =============================================================================

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::artifact::domain::{Artifact, ArtifactState, DomainError};
use crate::clock;
use crate::db::Database;
use crate::types::ApprovalType;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// =============================================================================
// Audit rows
// =============================================================================

/// Operator sign-off attached to an artifact. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: String,
    pub artifact_id: String,
    pub approver_id: String,
    pub approved_at: DateTime<Utc>,
    pub approval_type: ApprovalType,
    pub notes: Option<String>,
}

/// Append-only record of one state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    pub artifact_id: String,
    pub from_state: ArtifactState,
    pub to_state: ArtifactState,
    pub promoted_by: String,
    pub promoted_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Append-only validation attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub id: String,
    pub artifact_id: String,
    pub backtest_run_id: String,
    pub report_uri: Option<String>,
    pub metrics: serde_json::Value,
    pub determinism_verified: bool,
    pub generated_at: DateTime<Utc>,
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    db: Database,
}

impl ArtifactStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Insert a new artifact. The caller must have set `payload_hash`; the
    /// store recomputes it and rejects a mismatch. New artifacts must be
    /// DRAFT.
    pub fn create(&self, artifact: &Artifact) -> Result<(), StoreError> {
        if artifact.state != ArtifactState::Draft {
            return Err(StoreError::Domain(DomainError::InvalidPayload {
                id: artifact.id.clone(),
                reason: format!("new artifacts must be DRAFT, got {}", artifact.state),
            }));
        }
        // Re-verify on write: an artifact whose stored hash does not match
        // its payload must never reach the table.
        artifact.verify_hash()?;

        let params_json = serde_json::to_string(&artifact.strategy.params)?;
        let window_json = serde_json::to_string(&artifact.data_window)?;
        let validation_json = serde_json::to_string(&artifact.validation)?;
        let risk_json = serde_json::to_string(&artifact.risk_profile)?;

        let result = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO strategy_artifacts
                 (id, schema_version, strategy_name, strategy_version, code_ref,
                  params, data_window, validation, risk_profile, created_by,
                  created_at, payload_hash, payload_uri, signature, state)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    artifact.id,
                    artifact.schema_version,
                    artifact.strategy.name,
                    artifact.strategy.version,
                    artifact.strategy.code_ref,
                    params_json,
                    window_json,
                    validation_json,
                    risk_json,
                    artifact.created_by,
                    artifact.created_at,
                    artifact.payload_hash,
                    artifact.payload_uri,
                    artifact.signature,
                    artifact.state.as_str(),
                ],
            )?;
            Ok(())
        });

        match result {
            Ok(()) => {
                info!(artifact_id = %artifact.id, strategy = %artifact.strategy.name, "artifact created");
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::UniqueViolation(artifact.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn get_by_id(&self, id: &str) -> Result<Artifact, StoreError> {
        self.db
            .with_conn(|conn| {
                conn.query_row(
                    &format!("{SELECT_ARTIFACT} WHERE id = ?1"),
                    params![id],
                    artifact_from_row,
                )
                .optional()
            })?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn get_by_hash(&self, hash: &str) -> Result<Artifact, StoreError> {
        self.db
            .with_conn(|conn| {
                conn.query_row(
                    &format!("{SELECT_ARTIFACT} WHERE payload_hash = ?1"),
                    params![hash],
                    artifact_from_row,
                )
                .optional()
            })?
            .ok_or_else(|| StoreError::NotFound(hash.to_string()))
    }

    /// All artifacts in an approved-equivalent state, in one query.
    pub fn list_approved(&self) -> Result<Vec<Artifact>, StoreError> {
        let artifacts = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_ARTIFACT} WHERE state IN ('APPROVED', 'ACTIVE')
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map([], artifact_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        Ok(artifacts)
    }

    /// Most recent approved-equivalent artifact for one strategy name.
    pub fn get_latest_approved(&self, strategy_name: &str) -> Result<Artifact, StoreError> {
        self.db
            .with_conn(|conn| {
                conn.query_row(
                    &format!(
                        "{SELECT_ARTIFACT}
                         WHERE strategy_name = ?1 AND state IN ('APPROVED', 'ACTIVE')
                         ORDER BY created_at DESC LIMIT 1"
                    ),
                    params![strategy_name],
                    artifact_from_row,
                )
                .optional()
            })?
            .ok_or_else(|| StoreError::NotFound(strategy_name.to_string()))
    }

    /// Artifacts filtered by state, or all of them, newest first.
    pub fn list(&self, state: Option<ArtifactState>) -> Result<Vec<Artifact>, StoreError> {
        let artifacts = self.db.with_conn(|conn| {
            match state {
                Some(s) => {
                    let mut stmt = conn.prepare(&format!(
                        "{SELECT_ARTIFACT} WHERE state = ?1 ORDER BY created_at DESC"
                    ))?;
                    let rows = stmt.query_map(params![s.as_str()], artifact_from_row)?;
                    rows.collect::<Result<Vec<_>, _>>()
                }
                None => {
                    let mut stmt =
                        conn.prepare(&format!("{SELECT_ARTIFACT} ORDER BY created_at DESC"))?;
                    let rows = stmt.query_map([], artifact_from_row)?;
                    rows.collect::<Result<Vec<_>, _>>()
                }
            }
        })?;
        Ok(artifacts)
    }

    // -------------------------------------------------------------------------
    // State transitions
    // -------------------------------------------------------------------------

    /// Apply a state transition and append the promotion audit row, all in
    /// one transaction. The payload hash covers `state`, so it is recomputed
    /// and persisted alongside.
    pub fn update_state(
        &self,
        id: &str,
        new_state: ArtifactState,
        actor: &str,
        reason: &str,
    ) -> Result<Artifact, StoreError> {
        let promoted_at = clock::now();

        // Inner Result carries domain-level failures out of the closure;
        // returning early before commit rolls the transaction back.
        let outcome: Result<Result<Artifact, StoreError>, rusqlite::Error> =
            self.db.with_conn(|conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let mut artifact = match tx
                    .query_row(
                        &format!("{SELECT_ARTIFACT} WHERE id = ?1"),
                        params![id],
                        artifact_from_row,
                    )
                    .optional()?
                {
                    Some(a) => a,
                    None => return Ok(Err(StoreError::NotFound(id.to_string()))),
                };

                let from_state = artifact.state;
                if !from_state.can_transition_to(new_state) {
                    return Ok(Err(StoreError::Domain(DomainError::InvalidTransition {
                        from: from_state,
                        to: new_state,
                    })));
                }

                artifact.state = new_state;
                let new_hash = match artifact.compute_hash() {
                    Ok(h) => h,
                    Err(e) => return Ok(Err(StoreError::Domain(e))),
                };
                artifact.payload_hash = new_hash.clone();

                tx.execute(
                    "UPDATE strategy_artifacts SET state = ?1, payload_hash = ?2 WHERE id = ?3",
                    params![new_state.as_str(), new_hash, id],
                )?;

                tx.execute(
                    "INSERT INTO artifact_promotions
                     (id, artifact_id, from_state, to_state, promoted_by, promoted_at, reason)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        Uuid::new_v4().to_string(),
                        id,
                        from_state.as_str(),
                        new_state.as_str(),
                        actor,
                        clock::fmt_ts(promoted_at),
                        reason,
                    ],
                )?;

                tx.commit()?;
                Ok(Ok(artifact))
            });

        match outcome {
            Ok(Ok(artifact)) => {
                info!(
                    artifact_id = %id,
                    to_state = %new_state,
                    actor,
                    "artifact state updated"
                );
                Ok(artifact)
            }
            Ok(Err(e)) => Err(e),
            Err(e) => Err(e.into()),
        }
    }

    // -------------------------------------------------------------------------
    // Audit rows
    // -------------------------------------------------------------------------

    pub fn create_approval(&self, approval: &Approval) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO artifact_approvals
                 (id, artifact_id, approver_id, approved_at, approval_type, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    approval.id,
                    approval.artifact_id,
                    approval.approver_id,
                    clock::fmt_ts(approval.approved_at),
                    approval.approval_type.as_str(),
                    approval.notes,
                ],
            )?;
            Ok(())
        })?;
        debug!(artifact_id = %approval.artifact_id, approver = %approval.approver_id, "approval recorded");
        Ok(())
    }

    pub fn create_validation_report(&self, report: &ValidationReport) -> Result<(), StoreError> {
        let metrics_json = serde_json::to_string(&report.metrics)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO artifact_validation_reports
                 (id, artifact_id, backtest_run_id, report_uri, metrics,
                  determinism_verified, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    report.id,
                    report.artifact_id,
                    report.backtest_run_id,
                    report.report_uri,
                    metrics_json,
                    report.determinism_verified as i32,
                    clock::fmt_ts(report.generated_at),
                ],
            )?;
            Ok(())
        })?;
        debug!(artifact_id = %report.artifact_id, run_id = %report.backtest_run_id, "validation report recorded");
        Ok(())
    }

    pub fn list_approvals(&self, artifact_id: &str) -> Result<Vec<Approval>, StoreError> {
        let approvals = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, artifact_id, approver_id, approved_at, approval_type, notes
                 FROM artifact_approvals WHERE artifact_id = ?1 ORDER BY approved_at, rowid",
            )?;
            let rows = stmt.query_map(params![artifact_id], |row| {
                let approved_at: String = row.get(3)?;
                let approval_type: String = row.get(4)?;
                Ok(Approval {
                    id: row.get(0)?,
                    artifact_id: row.get(1)?,
                    approver_id: row.get(2)?,
                    approved_at: clock::parse_ts(&approved_at).unwrap_or_default(),
                    approval_type: approval_type
                        .parse()
                        .unwrap_or(ApprovalType::Technical),
                    notes: row.get(5)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        Ok(approvals)
    }

    pub fn list_promotions(&self, artifact_id: &str) -> Result<Vec<Promotion>, StoreError> {
        let promotions = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, artifact_id, from_state, to_state, promoted_by, promoted_at, reason
                 FROM artifact_promotions WHERE artifact_id = ?1 ORDER BY promoted_at, rowid",
            )?;
            let rows = stmt.query_map(params![artifact_id], |row| {
                let from_state: String = row.get(2)?;
                let to_state: String = row.get(3)?;
                let promoted_at: String = row.get(5)?;
                Ok(Promotion {
                    id: row.get(0)?,
                    artifact_id: row.get(1)?,
                    from_state: from_state.parse().unwrap_or(ArtifactState::Draft),
                    to_state: to_state.parse().unwrap_or(ArtifactState::Draft),
                    promoted_by: row.get(4)?,
                    promoted_at: clock::parse_ts(&promoted_at).unwrap_or_default(),
                    reason: row.get(6)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        Ok(promotions)
    }
}

// =============================================================================
// Row mapping
// =============================================================================

const SELECT_ARTIFACT: &str = "SELECT id, schema_version, strategy_name, strategy_version, \
     code_ref, params, data_window, validation, risk_profile, created_by, created_at, \
     payload_hash, payload_uri, signature, state FROM strategy_artifacts";

fn artifact_from_row(row: &rusqlite::Row<'_>) -> Result<Artifact, rusqlite::Error> {
    use crate::artifact::domain::{DataWindow, StrategyRef, ValidationRecord};

    let parse_json = |idx: usize, text: String| -> Result<serde_json::Value, rusqlite::Error> {
        serde_json::from_str(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    };

    let params: String = row.get(5)?;
    let window: String = row.get(6)?;
    let validation: String = row.get(7)?;
    let risk: String = row.get(8)?;
    let state: String = row.get(14)?;

    let window: DataWindow = serde_json::from_str(&window).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let validation: ValidationRecord = serde_json::from_str(&validation).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Artifact {
        id: row.get(0)?,
        schema_version: row.get(1)?,
        strategy: StrategyRef {
            name: row.get(2)?,
            version: row.get(3)?,
            code_ref: row.get(4)?,
            params: parse_json(5, params)?,
        },
        data_window: window,
        validation,
        risk_profile: parse_json(8, risk)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
        payload_hash: row.get(11)?,
        payload_uri: row.get(12)?,
        signature: row.get(13)?,
        state: state.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                14,
                rusqlite::types::Type::Text,
                format!("bad artifact state: {state}").into(),
            )
        })?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::domain::{
        DataWindow, StrategyRef, ValidationMetrics, ValidationRecord, SCHEMA_VERSION,
    };
    use serde_json::json;

    fn store() -> ArtifactStore {
        ArtifactStore::new(Database::in_memory().unwrap())
    }

    fn draft(id: &str, strategy: &str, created_at: &str) -> Artifact {
        let mut artifact = Artifact {
            id: id.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            strategy: StrategyRef {
                name: strategy.to_string(),
                version: "1.0.0".to_string(),
                code_ref: format!("abc123:{strategy}"),
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
                    sharpe: 1.5,
                    max_drawdown: 0.1,
                    win_rate: 0.55,
                    total_trades: 100,
                    profit_factor: 1.4,
                },
                determinism_seed: 1,
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
        artifact
    }

    fn promote_to_approved(store: &ArtifactStore, id: &str) {
        store
            .update_state(id, ArtifactState::Validated, "op", "validated")
            .unwrap();
        store
            .update_state(id, ArtifactState::Reviewed, "op", "reviewed")
            .unwrap();
        store
            .update_state(id, ArtifactState::Approved, "op", "approved")
            .unwrap();
    }

    // ---- create ----------------------------------------------------------

    #[test]
    fn create_and_fetch_roundtrip() {
        let store = store();
        let artifact = draft("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z");
        store.create(&artifact).unwrap();

        let fetched = store.get_by_id("a-1").unwrap();
        assert_eq!(fetched, artifact);
        fetched.verify_hash().unwrap();

        let by_hash = store.get_by_hash(&artifact.payload_hash).unwrap();
        assert_eq!(by_hash.id, "a-1");
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let store = store();
        let a = draft("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z");
        store.create(&a).unwrap();
        // Same id, different payload (and hence hash).
        let b = draft("a-1", "macd_crossover", "2024-06-02T00:00:00.000000Z");
        assert!(matches!(
            store.create(&b),
            Err(StoreError::UniqueViolation(_))
        ));
    }

    #[test]
    fn create_rejects_tampered_hash() {
        let store = store();
        let mut artifact = draft("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z");
        artifact.payload_hash = format!("sha256:{}", "0".repeat(64));
        assert!(matches!(
            store.create(&artifact),
            Err(StoreError::Domain(DomainError::HashMismatch { .. }))
        ));
    }

    #[test]
    fn create_rejects_non_draft() {
        let store = store();
        let mut artifact = draft("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z");
        artifact.state = ArtifactState::Approved;
        artifact.payload_hash = artifact.compute_hash().unwrap();
        assert!(store.create(&artifact).is_err());
    }

    #[test]
    fn get_missing_is_not_found() {
        assert!(matches!(
            store().get_by_id("nope"),
            Err(StoreError::NotFound(_))
        ));
    }

    // ---- state transitions ----------------------------------------------

    #[test]
    fn update_state_walks_the_chain_and_rehashes() {
        let store = store();
        let artifact = draft("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z");
        let original_hash = artifact.payload_hash.clone();
        store.create(&artifact).unwrap();

        let updated = store
            .update_state("a-1", ArtifactState::Validated, "op", "backtest clean")
            .unwrap();
        assert_eq!(updated.state, ArtifactState::Validated);
        assert_ne!(updated.payload_hash, original_hash);
        // The stored row verifies against its own recomputed hash.
        store.get_by_id("a-1").unwrap().verify_hash().unwrap();
    }

    #[test]
    fn update_state_rejects_forbidden_transition() {
        let store = store();
        store
            .create(&draft("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z"))
            .unwrap();
        let err = store
            .update_state("a-1", ArtifactState::Active, "op", "skip the queue")
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::InvalidTransition { .. })
        ));
        // And nothing was written.
        assert_eq!(store.get_by_id("a-1").unwrap().state, ArtifactState::Draft);
        assert!(store.list_promotions("a-1").unwrap().is_empty());
    }

    #[test]
    fn update_state_appends_promotion_audit_row() {
        let store = store();
        store
            .create(&draft("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z"))
            .unwrap();
        promote_to_approved(&store, "a-1");

        let promotions = store.list_promotions("a-1").unwrap();
        assert_eq!(promotions.len(), 3);
        for p in &promotions {
            assert!(
                p.from_state.can_transition_to(p.to_state),
                "{} -> {} must be in the allow-list",
                p.from_state,
                p.to_state
            );
        }
        assert_eq!(promotions[2].to_state, ArtifactState::Approved);
        assert_eq!(promotions[2].promoted_by, "op");
    }

    #[test]
    fn update_state_missing_artifact() {
        assert!(matches!(
            store().update_state("ghost", ArtifactState::Validated, "op", ""),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn revoked_is_a_dead_end() {
        let store = store();
        store
            .create(&draft("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z"))
            .unwrap();
        store
            .update_state("a-1", ArtifactState::Revoked, "op", "compromised")
            .unwrap();
        assert!(store
            .update_state("a-1", ArtifactState::Draft, "op", "undo")
            .is_err());
    }

    // ---- approved listing -----------------------------------------------

    #[test]
    fn list_approved_returns_approved_and_active_only() {
        let store = store();
        for (id, name, ts) in [
            ("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z"),
            ("a-2", "macd_crossover", "2024-06-02T00:00:00.000000Z"),
            ("a-3", "ma_crossover", "2024-06-03T00:00:00.000000Z"),
        ] {
            store.create(&draft(id, name, ts)).unwrap();
        }
        promote_to_approved(&store, "a-1");
        promote_to_approved(&store, "a-2");
        store
            .update_state("a-2", ArtifactState::Active, "op", "live")
            .unwrap();
        // a-3 stays DRAFT.

        let approved = store.list_approved().unwrap();
        let ids: Vec<&str> = approved.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"a-1") && ids.contains(&"a-2"));
    }

    #[test]
    fn latest_approved_orders_by_created_at() {
        let store = store();
        store
            .create(&draft("old", "rsi_momentum", "2024-06-01T00:00:00.000000Z"))
            .unwrap();
        store
            .create(&draft("new", "rsi_momentum", "2024-06-05T00:00:00.000000Z"))
            .unwrap();
        promote_to_approved(&store, "old");
        promote_to_approved(&store, "new");

        let latest = store.get_latest_approved("rsi_momentum").unwrap();
        assert_eq!(latest.id, "new");
    }

    #[test]
    fn latest_approved_missing_strategy() {
        assert!(matches!(
            store().get_latest_approved("nothing"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn update_state_is_visible_to_subsequent_reads() {
        let store = store();
        store
            .create(&draft("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z"))
            .unwrap();
        promote_to_approved(&store, "a-1");
        assert_eq!(store.list_approved().unwrap().len(), 1);

        store
            .update_state("a-1", ArtifactState::Revoked, "op", "pulled")
            .unwrap();
        assert!(store.list_approved().unwrap().is_empty());
    }

    // ---- audit rows ------------------------------------------------------

    #[test]
    fn approvals_roundtrip() {
        let store = store();
        store
            .create(&draft("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z"))
            .unwrap();

        let approval = Approval {
            id: Uuid::new_v4().to_string(),
            artifact_id: "a-1".to_string(),
            approver_id: "risk-officer".to_string(),
            approved_at: clock::now(),
            approval_type: ApprovalType::Risk,
            notes: Some("within limits".to_string()),
        };
        store.create_approval(&approval).unwrap();

        let approvals = store.list_approvals("a-1").unwrap();
        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].approver_id, "risk-officer");
        assert_eq!(approvals[0].approval_type, ApprovalType::Risk);
    }

    #[test]
    fn validation_report_roundtrip() {
        let store = store();
        store
            .create(&draft("a-1", "rsi_momentum", "2024-06-01T00:00:00.000000Z"))
            .unwrap();

        let report = ValidationReport {
            id: Uuid::new_v4().to_string(),
            artifact_id: "a-1".to_string(),
            backtest_run_id: "bt-99".to_string(),
            report_uri: Some("s3://reports/bt-99".to_string()),
            metrics: json!({"sharpe": 2.0}),
            determinism_verified: true,
            generated_at: clock::now(),
        };
        store.create_validation_report(&report).unwrap();
    }
}
