//! systemd service control.
//!
//! Drives units through `systemctl`. Mutating calls go through the
//! configured elevation prefix; the read-only `is-active` query does not.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::SystemdConfig;
use crate::error::{CommandErrorKind, DeployError, DeployResult, PreconditionKind};
use crate::executor::{sanitize_output, SubprocessBuilder};

use super::traits::ServiceControl;

/// `ServiceControl` backed by the systemctl CLI.
#[derive(Debug, Clone)]
pub struct Systemctl {
    program: String,
    elevate_with: Vec<String>,
    timeout: Duration,
}

impl Systemctl {
    pub fn new(config: &SystemdConfig) -> Self {
        Self {
            program: config.systemctl.clone(),
            elevate_with: config.elevate_with.clone(),
            timeout: config.command_timeout(),
        }
    }

    /// Run a mutating systemctl action and fail on a non-zero exit.
    fn run_action(&self, args: &[&str]) -> DeployResult<()> {
        let result = SubprocessBuilder::new(&self.program)
            .args(args.iter().copied())
            .elevated(&self.elevate_with)
            .timeout(self.timeout)
            .run()?;

        if !result.success {
            let stderr = sanitize_output(&result.stderr, 5);
            warn!(
                action = %args.join(" "),
                exit_code = ?result.exit_code,
                stderr = %stderr,
                "systemctl action failed"
            );
            return Err(DeployError::Command {
                kind: CommandErrorKind::ExecutionFailed {
                    message: format!("systemctl {} failed: {}", args.join(" "), stderr),
                },
            });
        }

        debug!(action = %args.join(" "), "systemctl action succeeded");
        Ok(())
    }
}

impl ServiceControl for Systemctl {
    fn start(&self, name: &str) -> DeployResult<()> {
        self.run_action(&["start", name])
    }

    fn stop(&self, name: &str) -> DeployResult<()> {
        self.run_action(&["stop", name])
    }

    fn restart(&self, name: &str) -> DeployResult<()> {
        self.run_action(&["restart", name])
    }

    fn enable(&self, name: &str) -> DeployResult<()> {
        self.run_action(&["enable", name])
    }

    fn is_active(&self, name: &str) -> DeployResult<bool> {
        let result = SubprocessBuilder::new(&self.program)
            .args(["is-active", "--quiet", name])
            .timeout(self.timeout)
            .run()?;

        debug!(service = %name, active = result.success, "Queried service state");
        Ok(result.success)
    }

    fn reload_definitions(&self) -> DeployResult<()> {
        self.run_action(&["daemon-reload"])
    }

    fn ensure_available(&self) -> DeployResult<()> {
        let tools = std::iter::once(&self.program).chain(self.elevate_with.first());
        for tool in tools {
            match which::which(tool) {
                Ok(path) => debug!(tool = %tool, path = %path.display(), "Found required tool"),
                Err(_) => {
                    return Err(DeployError::Precondition {
                        kind: PreconditionKind::MissingTool { tool: tool.clone() },
                    })
                }
            }
        }
        info!(systemctl = %self.program, "Service manager available");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(program: &str, elevate_with: &[&str]) -> Systemctl {
        Systemctl::new(&SystemdConfig {
            systemctl: program.to_string(),
            elevate_with: elevate_with.iter().map(|s| s.to_string()).collect(),
            command_timeout_seconds: 5,
            ..SystemdConfig::default()
        })
    }

    #[test]
    fn test_successful_actions() {
        // `true` accepts any arguments and exits 0.
        let ctl = control("true", &[]);
        assert!(ctl.start("lumo-agent").is_ok());
        assert!(ctl.stop("lumo-agent").is_ok());
        assert!(ctl.restart("lumo-agent").is_ok());
        assert!(ctl.enable("lumo-agent").is_ok());
        assert!(ctl.reload_definitions().is_ok());
        assert!(ctl.is_active("lumo-agent").unwrap());
    }

    #[test]
    fn test_failed_action_is_error() {
        let ctl = control("false", &[]);
        assert!(matches!(
            ctl.start("lumo-agent"),
            Err(DeployError::Command {
                kind: CommandErrorKind::ExecutionFailed { .. }
            })
        ));
    }

    #[test]
    fn test_inactive_is_not_error() {
        let ctl = control("false", &[]);
        assert!(!ctl.is_active("lumo-agent").unwrap());
    }

    #[test]
    fn test_elevated_action() {
        let ctl = control("true", &["env"]);
        assert!(ctl.restart("lumo-agent").is_ok());
    }

    #[test]
    fn test_missing_systemctl() {
        let ctl = control("systemctl-does-not-exist-12345", &[]);
        assert!(matches!(
            ctl.ensure_available(),
            Err(DeployError::Precondition {
                kind: PreconditionKind::MissingTool { .. }
            })
        ));
    }

    #[test]
    fn test_missing_elevation_tool() {
        let ctl = control("true", &["sudo-does-not-exist-12345", "-n"]);
        let err = ctl.ensure_available().unwrap_err();
        assert!(err.to_string().contains("sudo-does-not-exist-12345"));
    }

    #[test]
    fn test_available_tools() {
        let ctl = control("true", &["env"]);
        assert!(ctl.ensure_available().is_ok());
    }
}
