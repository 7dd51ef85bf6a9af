//! Error types for Tessera
//!
//! This module defines:
//! - `TesseraError`: application-specific error enum
//! - `Remediation`: operator-facing explanation plus ordered resolution steps
//!   for connection-class failures

use serde::Serialize;

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum TesseraError {
    #[error("caused: {0}")]
    IllegalArgument(String),

    #[error("database '{0}' does not exist")]
    DatabaseMissing(String),

    #[error("database connectivity failure: {0}")]
    Connectivity(String),

    #[error("migration set '{0}' is not registered")]
    MigrationSetUnknown(String),

    #[error("migration unit '{unit}' not found in set '{set}'")]
    MigrationUnitMissing { set: String, unit: String },

    #[error("migration unit '{unit}' failed: {message}")]
    MigrationFailed { unit: String, message: String },

    #[error("bootstrap failed for tenant {tenant_id}: {message}")]
    BootstrapFailed { tenant_id: i64, message: String },

    #[error("tenant '{0}' not exist")]
    TenantNotExist(i64),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

/// Operator-facing remediation for a failure: a one-line explanation and an
/// ordered list of resolution steps. Missing-database and general
/// connectivity failures need different remediation, so each error class
/// carries its own.
#[derive(Clone, Debug, Serialize)]
pub struct Remediation {
    pub explanation: String,
    pub steps: Vec<&'static str>,
}

impl TesseraError {
    /// Remediation guidance for connection-class errors.
    ///
    /// Returns `None` for errors that are not operator-recoverable
    /// connection problems.
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            TesseraError::DatabaseMissing(name) => Some(Remediation {
                explanation: format!(
                    "The physical database '{}' has not been created yet.",
                    name
                ),
                steps: vec![
                    "Run `tessera fleet-migrate` to create and migrate the database",
                    "Or create the database manually and re-run the migration",
                    "Verify the entity's `database` field matches the intended name",
                ],
            }),
            TesseraError::Connectivity(message) => Some(Remediation {
                explanation: format!("The database server could not be reached: {}", message),
                steps: vec![
                    "Check that the database server is running and accepting connections",
                    "Verify host, port, and credentials in the connection configuration",
                    "Check network reachability and firewall rules from this host",
                ],
            }),
            _ => None,
        }
    }
}
