//! Post-start health verification and rollback.
//!
//! Drives the service from `Starting` to a terminal state. For an upgrade,
//! a failed health check restores the backup and starts the previous
//! version again.

use std::fmt;
use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::{DeployError, DeployResult};
use crate::executor::PrivilegedFs;
use crate::services::ServiceControl;

use super::swap::{restore_backup, ServiceIdentity};
use super::DeploymentOutcome;

/// Lifecycle of the service during one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Healthy,
    Unhealthy,
    RollingBack,
    RolledBackHealthy,
    RolledBackUnhealthy,
}

impl HealthState {
    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: HealthState) -> bool {
        use HealthState::*;
        matches!(
            (self, next),
            (Starting, Healthy)
                | (Starting, Unhealthy)
                | (Unhealthy, RollingBack)
                | (RollingBack, RolledBackHealthy)
                | (RollingBack, RolledBackUnhealthy)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HealthState::Healthy | HealthState::RolledBackHealthy | HealthState::RolledBackUnhealthy
        )
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthState::Starting => "starting",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::RollingBack => "rolling-back",
            HealthState::RolledBackHealthy => "rolled-back-healthy",
            HealthState::RolledBackUnhealthy => "rolled-back-unhealthy",
        };
        write!(f, "{}", s)
    }
}

/// What a rollback needs: the canonical binary, its backup, the owner to
/// re-apply after restoring, and the elevated tools that do the copying.
pub struct RollbackPlan<'a> {
    pub files: &'a PrivilegedFs,
    pub binary: &'a Path,
    pub backup: &'a Path,
    pub identity: &'a ServiceIdentity,
}

/// Starts the service and checks that it stays up.
pub struct HealthVerifier<'a> {
    control: &'a dyn ServiceControl,
    service: &'a str,
    settle: Duration,
    state: HealthState,
}

impl<'a> HealthVerifier<'a> {
    pub fn new(control: &'a dyn ServiceControl, service: &'a str, settle: Duration) -> Self {
        Self {
            control,
            service,
            settle,
            state: HealthState::Starting,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    /// Enable and start a newly installed service.
    ///
    /// There is nothing to roll back to, so an unhealthy result is an
    /// `InstallHealthCheck` error.
    pub fn verify_fresh_install(&mut self) -> DeployResult<DeploymentOutcome> {
        self.control.enable(self.service)?;
        info!(service = %self.service, "Service enabled");

        if let Err(e) = self.control.start(self.service) {
            warn!(service = %self.service, error = %e, "Start request failed");
        }

        if self.check() {
            self.advance(HealthState::Healthy);
            return Ok(DeploymentOutcome::FreshInstallSucceeded);
        }

        self.advance(HealthState::Unhealthy);
        error!(service = %self.service, "Service is not active after install");
        Err(DeployError::InstallHealthCheck {
            service: self.service.to_string(),
        })
    }

    /// Restart onto the new binary; roll back to the backup if it does not
    /// come up.
    pub fn verify_upgrade(&mut self, plan: &RollbackPlan<'_>) -> DeployResult<DeploymentOutcome> {
        if let Err(e) = self.control.restart(self.service) {
            warn!(service = %self.service, error = %e, "Restart request failed");
        }

        if self.check() {
            self.advance(HealthState::Healthy);
            match plan.files.remove_file(plan.backup) {
                Ok(()) => info!(backup = %plan.backup.display(), "Backup removed"),
                Err(e) => warn!(
                    backup = %plan.backup.display(),
                    error = %e,
                    "Failed to remove backup"
                ),
            }
            return Ok(DeploymentOutcome::UpgradeSucceeded);
        }

        self.advance(HealthState::Unhealthy);
        warn!(service = %self.service, "New version is not active, rolling back");
        self.roll_back(plan)
    }

    fn roll_back(&mut self, plan: &RollbackPlan<'_>) -> DeployResult<DeploymentOutcome> {
        self.advance(HealthState::RollingBack);

        if let Err(e) = self.control.stop(self.service) {
            warn!(service = %self.service, error = %e, "Stop before rollback failed");
        }

        if let Err(e) = restore_backup(plan.files, plan.backup, plan.binary, plan.identity) {
            self.advance(HealthState::RolledBackUnhealthy);
            error!(service = %self.service, error = %e, "Failed to restore backup");
            return Err(DeployError::CriticalRecovery {
                service: self.service.to_string(),
                message: format!("backup could not be restored: {}", e),
            });
        }
        info!(path = %plan.binary.display(), "Previous binary restored");

        if let Err(e) = self.control.start(self.service) {
            warn!(service = %self.service, error = %e, "Start after rollback failed");
        }

        if self.check() {
            self.advance(HealthState::RolledBackHealthy);
            return Ok(DeploymentOutcome::UpgradeRolledBack);
        }

        self.advance(HealthState::RolledBackUnhealthy);
        error!(service = %self.service, "Restored version is not active either");
        Err(DeployError::CriticalRecovery {
            service: self.service.to_string(),
            message: "the restored version is not active".to_string(),
        })
    }

    /// Wait for the settle delay, then ask whether the unit is active.
    /// A failed query counts as inactive.
    fn check(&self) -> bool {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }

        match self.control.is_active(self.service) {
            Ok(active) => active,
            Err(e) => {
                warn!(service = %self.service, error = %e, "Could not query service state");
                false
            }
        }
    }

    fn advance(&mut self, next: HealthState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal health transition {} -> {}",
            self.state,
            next
        );
        info!(service = %self.service, from = %self.state, to = %next, "Health state changed");
        self.state = next;
    }
}
