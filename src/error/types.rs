//! Error types for the Lumo deployer.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::DeploymentOutcome;

/// Main error type for a deployment run.
#[derive(Error, Debug)]
pub enum DeployError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A precondition failed before any host mutation was attempted.
    #[error("Precondition failed: {kind}")]
    Precondition { kind: PreconditionKind },

    /// The artifact could not be fetched or failed verification.
    #[error("Artifact fetch failed for {url}: {message}")]
    ArtifactFetch { url: String, message: String },

    /// The current binary could not be snapshotted before an upgrade.
    #[error("Backup of {path} failed: {message}")]
    Backup { path: PathBuf, message: String },

    /// Ownership or mode could not be applied.
    #[error("Permission error on {path}: {message}")]
    Permission { path: PathBuf, message: String },

    /// The service definition could not be written or reloaded.
    #[error("Service definition install failed: {message}")]
    DefinitionInstall { message: String },

    /// A fresh install did not become active. There is nothing to roll back to.
    #[error("Service '{service}' did not become active after a fresh install")]
    InstallHealthCheck { service: String },

    /// The upgrade failed and the restored binary did not recover the service either.
    #[error("Service '{service}' is down after rollback: {message}")]
    CriticalRecovery { service: String, message: String },

    /// Validation errors.
    #[error("Validation error: {kind}")]
    Validation { kind: ValidationErrorKind },

    /// Subprocess execution errors.
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// Template-related errors.
    #[error("Template error: {message}")]
    Template { message: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Precondition failure kinds.
#[derive(Error, Debug)]
pub enum PreconditionKind {
    #[error("refusing to run as root (uid 0); mutations are performed through explicit elevation")]
    RunningAsRoot,

    #[error("required tool '{tool}' was not found")]
    MissingTool { tool: String },

    #[error("artifact source is not usable: {message}")]
    SourceUnavailable { message: String },
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Path must be absolute: {path}")]
    RelativePath { path: PathBuf },

    #[error("Path traversal detected in: {path}")]
    PathTraversal { path: PathBuf },

    #[error("Invalid service name: {service}")]
    InvalidServiceName { service: String },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },
}

/// Command error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Command execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Command timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

impl DeployError {
    /// The deployment outcome this error terminates the run with, if it
    /// corresponds to one of the reportable outcomes.
    ///
    /// Fatal step failures (fetch, backup, permission, definition, fresh
    /// install health) have no dedicated outcome and simply exit non-zero.
    pub fn outcome(&self) -> Option<DeploymentOutcome> {
        match self {
            DeployError::Precondition { .. } => Some(DeploymentOutcome::PreconditionFailed),
            DeployError::CriticalRecovery { .. } => Some(DeploymentOutcome::UpgradeRollbackFailed),
            _ => None,
        }
    }

    /// Whether the operator should be pointed at the service journal.
    pub fn needs_log_inspection(&self) -> bool {
        matches!(
            self,
            DeployError::InstallHealthCheck { .. } | DeployError::CriticalRecovery { .. }
        )
    }
}

/// Result type alias for deployment operations.
pub type DeployResult<T> = Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_maps_to_outcome() {
        let err = DeployError::Precondition {
            kind: PreconditionKind::RunningAsRoot,
        };
        assert_eq!(err.outcome(), Some(DeploymentOutcome::PreconditionFailed));
        assert!(!err.needs_log_inspection());
    }

    #[test]
    fn test_critical_recovery_maps_to_outcome() {
        let err = DeployError::CriticalRecovery {
            service: "lumo-agent".to_string(),
            message: "still inactive".to_string(),
        };
        assert_eq!(err.outcome(), Some(DeploymentOutcome::UpgradeRollbackFailed));
        assert!(err.needs_log_inspection());
    }

    #[test]
    fn test_step_failures_have_no_outcome() {
        let err = DeployError::ArtifactFetch {
            url: "https://example.invalid/bin".to_string(),
            message: "HTTP 404".to_string(),
        };
        assert!(err.outcome().is_none());

        let err = DeployError::Backup {
            path: PathBuf::from("/opt/lumo/lumo-agent"),
            message: "disk full".to_string(),
        };
        assert!(err.outcome().is_none());
    }

    #[test]
    fn test_error_display() {
        let err = DeployError::Precondition {
            kind: PreconditionKind::MissingTool {
                tool: "systemctl".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "Precondition failed: required tool 'systemctl' was not found"
        );
    }
}
