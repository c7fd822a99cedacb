//! Deployment orchestration.
//!
//! Runs preconditions, classification, the binary swap, definition install
//! and health verification in order, stopping at the first fatal error.

use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::artifact::{
    ArtifactSource, ArtifactVerifier, HttpArtifactSource, NoVerification, Sha256Digest,
};
use crate::config::Settings;
use crate::error::{DeployError, DeployResult, PreconditionKind};
use crate::executor::PrivilegedFs;
use crate::services::{ServiceControl, Systemctl};
use crate::templates::TemplateEngine;

use super::definition::{DefinitionManager, ServiceDefinition};
use super::detector::detect;
use super::health::{HealthVerifier, RollbackPlan};
use super::swap::{BinarySwapManager, ServiceIdentity};
use super::{DeploymentKind, DeploymentOutcome, DeploymentReport};

/// Owns everything one deployment run needs.
pub struct Orchestrator {
    settings: Settings,
    control: Box<dyn ServiceControl>,
    source: Box<dyn ArtifactSource>,
    verifier: Box<dyn ArtifactVerifier>,
    engine: TemplateEngine,
    files: PrivilegedFs,
    identity: ServiceIdentity,
    invoker_uid: u32,
}

impl Orchestrator {
    /// Build an orchestrator around the given service manager and artifact
    /// source. The integrity check follows `artifact.sha256`.
    pub fn new(
        settings: Settings,
        control: Box<dyn ServiceControl>,
        source: Box<dyn ArtifactSource>,
    ) -> DeployResult<Self> {
        let verifier: Box<dyn ArtifactVerifier> = match &settings.artifact.sha256 {
            Some(digest) => Box::new(Sha256Digest::new(digest)),
            None => Box::new(NoVerification),
        };
        let engine = TemplateEngine::with_overrides(&settings.paths.templates_dir)?;
        let identity = ServiceIdentity::new(&settings.service.user, &settings.service.group);
        let files = PrivilegedFs::new(
            &settings.systemd.elevate_with,
            settings.systemd.command_timeout(),
        );

        Ok(Self {
            settings,
            control,
            source,
            verifier,
            engine,
            files,
            identity,
            invoker_uid: nix::unistd::geteuid().as_raw(),
        })
    }

    /// Build an orchestrator that drives systemctl and downloads over HTTP.
    pub fn from_settings(settings: Settings) -> DeployResult<Self> {
        let control = Box::new(Systemctl::new(&settings.systemd));
        let source = Box::new(HttpArtifactSource::new(Duration::from_secs(
            settings.artifact.timeout_seconds,
        ))?);
        Self::new(settings, control, source)
    }

    /// Override the effective uid used for the root check.
    pub fn with_invoker_uid(mut self, uid: u32) -> Self {
        self.invoker_uid = uid;
        self
    }

    /// Check everything that must hold before the host is touched.
    pub fn check_preconditions(&self) -> DeployResult<()> {
        if self.settings.security.refuse_root && self.invoker_uid == 0 {
            return Err(DeployError::Precondition {
                kind: PreconditionKind::RunningAsRoot,
            });
        }

        self.control.ensure_available()?;
        self.files.ensure_available()?;
        self.source.ensure_available(&self.settings.artifact.url)?;

        info!("Preconditions satisfied");
        Ok(())
    }

    /// Run one deployment and return its outcome.
    pub fn run(&self) -> DeployResult<DeploymentOutcome> {
        let mut kind = None;
        self.execute(&mut kind)
    }

    /// Run one deployment and wrap the result in a report.
    pub fn run_report(&self) -> DeploymentReport {
        let deployment_id = Uuid::new_v4();
        let service = self.settings.service.name.clone();
        let span = info_span!("deployment", %deployment_id, service = %service);
        let _guard = span.enter();

        let started_at = Utc::now();
        let mut kind = None;
        let result = self.execute(&mut kind);
        let finished_at = Utc::now();

        let report = DeploymentReport {
            deployment_id,
            service,
            kind,
            result,
            started_at,
            finished_at,
        };

        match &report.result {
            Ok(outcome) => info!(
                outcome = %outcome,
                duration_ms = report.duration_ms(),
                "Deployment finished"
            ),
            Err(e) => error!(
                error = %e,
                duration_ms = report.duration_ms(),
                "Deployment failed"
            ),
        }

        report
    }

    fn execute(&self, kind_out: &mut Option<DeploymentKind>) -> DeployResult<DeploymentOutcome> {
        self.check_preconditions()?;

        let service = self.settings.service.name.as_str();
        let binary = self.settings.install.binary_path();
        let url = self.settings.artifact.url.as_str();

        let kind = detect(&binary)?;
        *kind_out = Some(kind);
        info!(kind = %kind, path = %binary.display(), "Deployment classified");

        let swap = BinarySwapManager::new(
            self.control.as_ref(),
            self.source.as_ref(),
            self.verifier.as_ref(),
            &self.files,
            service,
            &self.identity,
        );
        let backup = match kind {
            DeploymentKind::FreshInstall => {
                swap.install_fresh(url, &binary)?;
                None
            }
            DeploymentKind::Upgrade => match swap.upgrade(url, &binary) {
                Ok(backup) => Some(backup),
                Err(e) => {
                    warn!(
                        service = %service,
                        "Upgrade aborted; the service is left stopped with the previous binary in place"
                    );
                    return Err(e);
                }
            },
        };

        let definition = ServiceDefinition::from_settings(&self.settings);
        DefinitionManager::new(
            self.control.as_ref(),
            &self.engine,
            &self.files,
            &self.settings.systemd.unit_dir,
        )
        .install(&definition)?;

        let mut verifier =
            HealthVerifier::new(self.control.as_ref(), service, self.settings.health.settle());
        match backup {
            None => verifier.verify_fresh_install(),
            Some(backup) => verifier.verify_upgrade(&RollbackPlan {
                files: &self.files,
                binary: &binary,
                backup: &backup,
                identity: &self.identity,
            }),
        }
    }
}
