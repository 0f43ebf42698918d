// =============================================================================
// Artifact Domain — canonical payload, SHA-256 integrity, state machine
// =============================================================================
//
// An artifact is the signed, immutable description of a strategy
// parameterisation and the validation that justified it. Its identity is the
// SHA-256 of the canonical payload bytes:
//
//   - object keys sorted at every nesting level,
//   - arrays in insertion order,
//   - no whitespace,
//   - floats in shortest round-trip decimal form.
//
// serde_json provides exactly this: its object representation is a BTreeMap
// (sorted keys) and float formatting is shortest-round-trip. The canonical
// field set is fixed; `payload_hash` itself is never part of the hashed
// bytes, while `state` is, so every state transition re-hashes.
//
// State machine (allow-list, everything else is forbidden):
//
//   DRAFT → VALIDATED → REVIEWED → APPROVED → ACTIVE → DEPRECATED
//   VALIDATED → DRAFT (re-draft)
//   any non-REVOKED state → REVOKED
// =============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use thiserror::Error;

/// Prefix carried by every payload hash.
pub const HASH_PREFIX: &str = "sha256:";

/// Current artifact schema version.
pub const SCHEMA_VERSION: &str = "1";

// =============================================================================
// Errors
// =============================================================================

/// Integrity failures in the artifact domain. None of these may ever be
/// silently swallowed by a caller.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A value in the payload cannot be canonicalised (e.g. a non-finite
    /// float).
    #[error("invalid payload for artifact {id}: {reason}")]
    InvalidPayload { id: String, reason: String },

    /// Recomputed hash differs from the stored one. The artifact must not be
    /// used.
    #[error("payload hash mismatch for artifact {id}")]
    HashMismatch { id: String },

    /// Transition not present in the allow-list.
    #[error("invalid artifact state transition {from} -> {to}")]
    InvalidTransition {
        from: ArtifactState,
        to: ArtifactState,
    },
}

// =============================================================================
// State machine
// =============================================================================

/// Lifecycle state of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArtifactState {
    Draft,
    Validated,
    Reviewed,
    Approved,
    Active,
    Deprecated,
    Revoked,
}

impl ArtifactState {
    pub const ALL: [ArtifactState; 7] = [
        Self::Draft,
        Self::Validated,
        Self::Reviewed,
        Self::Approved,
        Self::Active,
        Self::Deprecated,
        Self::Revoked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Validated => "VALIDATED",
            Self::Reviewed => "REVIEWED",
            Self::Approved => "APPROVED",
            Self::Active => "ACTIVE",
            Self::Deprecated => "DEPRECATED",
            Self::Revoked => "REVOKED",
        }
    }

    /// Whether `self -> to` appears in the transition allow-list.
    pub fn can_transition_to(&self, to: ArtifactState) -> bool {
        use ArtifactState::*;
        matches!(
            (*self, to),
            (Draft, Validated)
                | (Validated, Reviewed)
                | (Validated, Draft)
                | (Reviewed, Approved)
                | (Approved, Active)
                | (Active, Deprecated)
                | (Draft, Revoked)
                | (Validated, Revoked)
                | (Reviewed, Revoked)
                | (Approved, Revoked)
                | (Active, Revoked)
                | (Deprecated, Revoked)
        )
    }

    /// States the trader runtime will bind into its registry.
    pub fn is_loadable(&self) -> bool {
        matches!(self, Self::Approved | Self::Active)
    }
}

impl std::fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "VALIDATED" => Ok(Self::Validated),
            "REVIEWED" => Ok(Self::Reviewed),
            "APPROVED" => Ok(Self::Approved),
            "ACTIVE" => Ok(Self::Active),
            "DEPRECATED" => Ok(Self::Deprecated),
            "REVOKED" => Ok(Self::Revoked),
            other => Err(format!("unknown artifact state: {other}")),
        }
    }
}

// =============================================================================
// Payload structs
// =============================================================================

/// Binding to a concrete strategy implementation plus its parameters.
/// `params` stays an opaque JSON object for forward compatibility; consumers
/// read the keys they know with explicit defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRef {
    pub name: String,
    pub version: String,
    /// Pins the implementation in the code base, e.g. a commit + symbol pair.
    pub code_ref: String,
    pub params: Value,
}

/// The data slice the validation ran over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataWindow {
    pub from: String,
    pub to: String,
    pub symbols: Vec<String>,
}

/// Headline backtest metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: u64,
    pub profit_factor: f64,
}

/// The validation run that justified this artifact's existence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub backtest_run_id: String,
    pub metrics: ValidationMetrics,
    pub determinism_seed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_uri: Option<String>,
}

// =============================================================================
// Artifact
// =============================================================================

/// An immutable, hash-identified strategy authorisation.
///
/// Payload fields never change after creation; only `state` moves, through
/// the allow-list, and `payload_hash` follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub schema_version: String,
    pub strategy: StrategyRef,
    pub data_window: DataWindow,
    pub validation: ValidationRecord,
    /// Opaque risk constraints; the execution engine reads
    /// `max_position_pct`, `max_daily_loss`, `allowed_order_types`,
    /// `max_position_size_usd` with defaults when absent.
    pub risk_profile: Value,
    pub created_by: String,
    pub created_at: String,
    pub payload_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub state: ArtifactState,
}

impl Artifact {
    /// Canonical payload bytes: the exact input to the integrity hash.
    pub fn canonical_payload(&self) -> Result<Vec<u8>, DomainError> {
        let invalid = |reason: String| DomainError::InvalidPayload {
            id: self.id.clone(),
            reason,
        };

        let mut payload = Map::new();
        payload.insert("id".to_string(), Value::String(self.id.clone()));
        payload.insert(
            "schema_version".to_string(),
            Value::String(self.schema_version.clone()),
        );
        payload.insert(
            "strategy".to_string(),
            serde_json::to_value(&self.strategy).map_err(|e| invalid(e.to_string()))?,
        );
        payload.insert(
            "data_window".to_string(),
            serde_json::to_value(&self.data_window).map_err(|e| invalid(e.to_string()))?,
        );
        payload.insert(
            "validation".to_string(),
            serde_json::to_value(&self.validation).map_err(|e| invalid(e.to_string()))?,
        );
        payload.insert("risk_profile".to_string(), self.risk_profile.clone());
        payload.insert(
            "created_by".to_string(),
            Value::String(self.created_by.clone()),
        );
        payload.insert(
            "created_at".to_string(),
            Value::String(self.created_at.clone()),
        );
        if let Some(uri) = &self.payload_uri {
            payload.insert("payload_uri".to_string(), Value::String(uri.clone()));
        }
        if let Some(sig) = &self.signature {
            payload.insert("signature".to_string(), Value::String(sig.clone()));
        }
        payload.insert(
            "state".to_string(),
            Value::String(self.state.as_str().to_string()),
        );

        serde_json::to_vec(&Value::Object(payload)).map_err(|e| invalid(e.to_string()))
    }

    /// `sha256:<hex>` over the canonical payload.
    pub fn compute_hash(&self) -> Result<String, DomainError> {
        let bytes = self.canonical_payload()?;
        let digest = Sha256::digest(&bytes);
        Ok(format!("{HASH_PREFIX}{}", hex::encode(digest)))
    }

    /// Recompute the hash and compare it with the stored one in constant
    /// time. A mismatch is fatal: the caller must refuse to use the artifact.
    pub fn verify_hash(&self) -> Result<(), DomainError> {
        let expected = self.compute_hash()?;
        if constant_time_eq(expected.as_bytes(), self.payload_hash.as_bytes()) {
            Ok(())
        } else {
            Err(DomainError::HashMismatch {
                id: self.id.clone(),
            })
        }
    }

    /// Whether the trader runtime may bind this artifact.
    pub fn is_loadable(&self) -> bool {
        self.state.is_loadable()
    }

    /// Validate a transition against the allow-list without applying it.
    pub fn check_transition(&self, to: ArtifactState) -> Result<(), DomainError> {
        if self.state.can_transition_to(to) {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                from: self.state,
                to,
            })
        }
    }
}

/// Byte comparison without early exit on the first difference. Length is not
/// secret; content comparison is branch-free.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
