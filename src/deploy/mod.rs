//! Deployment core.
//!
//! Classifies the run, swaps the binary, installs the unit definition, and
//! verifies health with automatic rollback for upgrades.

pub mod definition;
pub mod detector;
pub mod health;
pub mod orchestrator;
pub mod swap;

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DeployError;

pub use definition::{DefinitionManager, ServiceDefinition};
pub use detector::detect;
pub use health::{HealthState, HealthVerifier, RollbackPlan};
pub use orchestrator::Orchestrator;
pub use swap::{BinarySwapManager, ServiceIdentity};

/// Whether this run installs the service for the first time or replaces
/// an existing binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentKind {
    FreshInstall,
    Upgrade,
}

impl fmt::Display for DeploymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentKind::FreshInstall => write!(f, "fresh install"),
            DeploymentKind::Upgrade => write!(f, "upgrade"),
        }
    }
}

/// Terminal result of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentOutcome {
    FreshInstallSucceeded,
    UpgradeSucceeded,
    /// The new binary failed; the previous one was restored and is running.
    UpgradeRolledBack,
    /// The new binary failed and the restored one did not come up either.
    UpgradeRollbackFailed,
    PreconditionFailed,
}

impl DeploymentOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> u8 {
        match self {
            DeploymentOutcome::FreshInstallSucceeded
            | DeploymentOutcome::UpgradeSucceeded
            | DeploymentOutcome::UpgradeRolledBack => 0,
            DeploymentOutcome::UpgradeRollbackFailed | DeploymentOutcome::PreconditionFailed => 1,
        }
    }
}

impl fmt::Display for DeploymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentOutcome::FreshInstallSucceeded => "fresh-install-succeeded",
            DeploymentOutcome::UpgradeSucceeded => "upgrade-succeeded",
            DeploymentOutcome::UpgradeRolledBack => "upgrade-rolled-back-succeeded",
            DeploymentOutcome::UpgradeRollbackFailed => "upgrade-rolled-back-failed",
            DeploymentOutcome::PreconditionFailed => "precondition-failed",
        };
        write!(f, "{}", s)
    }
}

/// Summary of one invocation, produced once at the end of the run.
#[derive(Debug)]
pub struct DeploymentReport {
    pub deployment_id: Uuid,
    pub service: String,
    /// `None` when the run stopped before classification.
    pub kind: Option<DeploymentKind>,
    pub result: Result<DeploymentOutcome, DeployError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DeploymentReport {
    /// The reportable outcome, if the run ended in one.
    pub fn outcome(&self) -> Option<DeploymentOutcome> {
        match &self.result {
            Ok(outcome) => Some(*outcome),
            Err(e) => e.outcome(),
        }
    }

    /// Process exit code: 0 for the three success outcomes, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match &self.result {
            Ok(outcome) => outcome.exit_code(),
            Err(_) => 1,
        }
    }

    /// One human-readable line describing how the run ended.
    pub fn summary(&self) -> String {
        match &self.result {
            Ok(DeploymentOutcome::UpgradeRolledBack) => format!(
                "{}: the new version of '{}' failed to start and was rolled back; the previous version is running",
                DeploymentOutcome::UpgradeRolledBack,
                self.service
            ),
            Ok(outcome) => format!("{}: '{}' is running", outcome, self.service),
            Err(e) => match e.outcome() {
                Some(outcome) => format!("{}: {}", outcome, e),
                None => format!("deployment failed: {}", e),
            },
        }
    }

    /// Whether the operator should be told to inspect the service journal.
    pub fn needs_log_inspection(&self) -> bool {
        match &self.result {
            Ok(DeploymentOutcome::UpgradeRolledBack) => true,
            Ok(_) => false,
            Err(e) => e.needs_log_inspection(),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
