//! Tessera Common - Shared types and utilities
//!
//! This crate provides the foundational pieces used across all Tessera
//! components:
//! - Error types and connection-failure classification
//! - Identifier validation and slug helpers
//! - Deterministic permission keys and credential generation

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::{Remediation, TesseraError};
pub use utils::{generate_password, is_valid_identifier, permission_key, slugify};

/// Connection name repointed at a tenant's dedicated database during
/// request handling
pub const TENANT_CONNECTION: &str = "tenant";

/// Prefix for ephemeral connection names used by fleet migration runs
pub const FLEET_CONNECTION_PREFIX: &str = "fleet-";
