//! Service control traits.
//!
//! Defines the narrow interface the deployer uses to drive the service
//! manager.

use crate::error::DeployResult;

/// Control interface for one managed service unit.
///
/// The deployer only requests transitions and observes run state; process
/// supervision itself belongs to the service manager. Implementations must
/// treat `start` on a running unit and `stop` on a stopped unit as no-ops.
///
/// # Example
///
/// ```ignore
/// let control = Systemctl::new(&settings.systemd);
/// control.ensure_available()?;
/// control.reload_definitions()?;
/// control.restart("lumo-agent")?;
/// assert!(control.is_active("lumo-agent")?);
/// ```
pub trait ServiceControl {
    /// Start the unit.
    fn start(&self, name: &str) -> DeployResult<()>;

    /// Stop the unit.
    fn stop(&self, name: &str) -> DeployResult<()>;

    /// Restart the unit, starting it if it was stopped.
    fn restart(&self, name: &str) -> DeployResult<()>;

    /// Enable the unit so it starts at boot.
    fn enable(&self, name: &str) -> DeployResult<()>;

    /// Whether the unit is currently active.
    ///
    /// An inactive, failed, or unknown unit is reported as `false`, not as
    /// an error. Errors mean the service manager itself could not be queried.
    fn is_active(&self, name: &str) -> DeployResult<bool>;

    /// Ask the service manager to re-read unit definitions.
    fn reload_definitions(&self) -> DeployResult<()>;

    /// Check that the service manager tooling is present.
    ///
    /// Called before any host mutation; failure is a precondition error.
    fn ensure_available(&self) -> DeployResult<()>;
}
