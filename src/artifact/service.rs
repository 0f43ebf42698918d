// =============================================================================
// Promotion Service — the operator surface over the artifact store
// =============================================================================
//
// Implements the promotion workflow: draft creation, hash-verified reads,
// state promotion, and validation reports with auto-promotion DRAFT ->
// VALIDATED on a successful report. The HTTP layer is a thin adapter over
// these operations.
// =============================================================================

use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::artifact::domain::{
    Artifact, ArtifactState, DataWindow, StrategyRef, ValidationRecord, SCHEMA_VERSION,
};
use crate::artifact::store::{ArtifactStore, StoreError, ValidationReport};
use crate::clock;

/// Payload accepted by `create_artifact`. The service assigns id, creation
/// time, schema version, DRAFT state, and the payload hash.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftRequest {
    pub strategy: StrategyRef,
    pub data_window: DataWindow,
    pub validation: ValidationRecord,
    pub risk_profile: Value,
    pub created_by: String,
    #[serde(default)]
    pub payload_uri: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

/// Payload accepted by `validate`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationRequest {
    pub backtest_run_id: String,
    pub metrics: Value,
    pub determinism_verified: bool,
    #[serde(default)]
    pub report_uri: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ArtifactService {
    store: ArtifactStore,
}

impl ArtifactService {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Direct access to the underlying store for audit reads.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Create a DRAFT artifact from a request, hashing the canonical payload.
    pub fn create_artifact(&self, draft: DraftRequest) -> Result<Artifact, StoreError> {
        let mut artifact = Artifact {
            id: format!("art-{}", Uuid::new_v4()),
            schema_version: SCHEMA_VERSION.to_string(),
            strategy: draft.strategy,
            data_window: draft.data_window,
            validation: draft.validation,
            risk_profile: draft.risk_profile,
            created_by: draft.created_by,
            created_at: clock::fmt_ts(clock::now()),
            payload_hash: String::new(),
            payload_uri: draft.payload_uri,
            signature: draft.signature,
            state: ArtifactState::Draft,
        };
        artifact.payload_hash = artifact.compute_hash()?;

        self.store.create(&artifact)?;
        Ok(artifact)
    }

    /// Fetch an artifact, refusing to return one whose stored hash does not
    /// match its payload.
    pub fn get_artifact(&self, id: &str) -> Result<Artifact, StoreError> {
        let artifact = self.store.get_by_id(id)?;
        artifact.verify_hash()?;
        Ok(artifact)
    }

    /// Artifacts (optionally filtered by state), newest first.
    pub fn list_artifacts(
        &self,
        state: Option<ArtifactState>,
    ) -> Result<Vec<Artifact>, StoreError> {
        self.store.list(state)
    }

    /// Promote an artifact along the state machine.
    pub fn promote(
        &self,
        id: &str,
        target_state: ArtifactState,
        actor: &str,
        reason: &str,
    ) -> Result<Artifact, StoreError> {
        self.store.update_state(id, target_state, actor, reason)
    }

    /// Attach a validation report. A report with `determinism_verified` set
    /// auto-promotes a DRAFT artifact to VALIDATED.
    pub fn validate(
        &self,
        id: &str,
        request: ValidationRequest,
    ) -> Result<ValidationReport, StoreError> {
        let artifact = self.store.get_by_id(id)?;

        let report = ValidationReport {
            id: format!("vr-{}", Uuid::new_v4()),
            artifact_id: artifact.id.clone(),
            backtest_run_id: request.backtest_run_id,
            report_uri: request.report_uri,
            metrics: request.metrics,
            determinism_verified: request.determinism_verified,
            generated_at: clock::now(),
        };
        self.store.create_validation_report(&report)?;

        if request.determinism_verified && artifact.state == ArtifactState::Draft {
            self.store.update_state(
                id,
                ArtifactState::Validated,
                "validation",
                &format!("validation report {} verified", report.id),
            )?;
            info!(artifact_id = %id, report_id = %report.id, "artifact auto-promoted to VALIDATED");
        }

        Ok(report)
    }
}
