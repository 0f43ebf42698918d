// =============================================================================
// Strategy Artifacts — domain, persistence, loading, promotion
// =============================================================================

pub mod domain;
pub mod loader;
pub mod registry;
pub mod service;
pub mod store;

pub use domain::{Artifact, ArtifactState, DomainError};
pub use registry::{RegistryEntry, StrategyRegistry};
