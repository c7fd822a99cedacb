//! Service definition management.
//!
//! Renders the systemd unit for the managed service. The text is written
//! to a scratch file by the invoker, then installed next to the unit and
//! renamed over it through the elevation prefix, so the unit directory
//! never holds a partial file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{DeployError, DeployResult};
use crate::executor::PrivilegedFs;
use crate::services::ServiceControl;
use crate::templates::{TemplateEngine, SERVICE_UNIT_TEMPLATE};

/// Mode of the installed unit file.
pub const UNIT_MODE: u32 = 0o644;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
struct EnvironmentVar {
    key: String,
    value: String,
}

/// Everything the unit template needs, resolved from settings.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDefinition {
    #[serde(skip)]
    pub name: String,
    pub description: String,
    pub after: Vec<String>,
    pub wants: Vec<String>,
    pub user: String,
    pub group: String,
    pub working_directory: String,
    pub exec_start: String,
    pub restart_sec: u64,
    environment: Vec<EnvironmentVar>,
    pub placeholders: Vec<String>,
}

impl ServiceDefinition {
    pub fn from_settings(settings: &Settings) -> Self {
        let service = &settings.service;

        // BTreeMap iteration keeps the rendered order stable across runs.
        let environment = service
            .environment
            .iter()
            .map(|(key, value)| EnvironmentVar {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();

        Self {
            name: service.name.clone(),
            description: service.description.clone(),
            after: service.after.clone(),
            wants: service.wants.clone(),
            user: service.user.clone(),
            group: service.group.clone(),
            working_directory: service.working_directory.display().to_string(),
            exec_start: settings.install.binary_path().display().to_string(),
            restart_sec: service.restart_sec,
            environment,
            placeholders: service.placeholder_environment.clone(),
        }
    }

    /// File name of the unit, e.g. `lumo-agent.service`.
    pub fn unit_file_name(&self) -> String {
        format!("{}.service", self.name)
    }
}

/// Writes unit definitions and tells the service manager to reload them.
pub struct DefinitionManager<'a> {
    control: &'a dyn ServiceControl,
    engine: &'a TemplateEngine,
    files: &'a PrivilegedFs,
    unit_dir: &'a Path,
}

impl<'a> DefinitionManager<'a> {
    pub fn new(
        control: &'a dyn ServiceControl,
        engine: &'a TemplateEngine,
        files: &'a PrivilegedFs,
        unit_dir: &'a Path,
    ) -> Self {
        Self {
            control,
            engine,
            files,
            unit_dir,
        }
    }

    /// Render the unit text for `definition`.
    pub fn render(&self, definition: &ServiceDefinition) -> DeployResult<String> {
        let context = serde_json::to_value(definition).map_err(|e| DeployError::DefinitionInstall {
            message: format!("Failed to build template context: {}", e),
        })?;

        self.engine
            .render(SERVICE_UNIT_TEMPLATE, &context)
            .map_err(|e| DeployError::DefinitionInstall {
                message: e.to_string(),
            })
    }

    /// Render, write atomically, and reload. Returns the unit file path.
    pub fn install(&self, definition: &ServiceDefinition) -> DeployResult<PathBuf> {
        let content = self.render(definition)?;
        let unit_path = self.unit_dir.join(definition.unit_file_name());

        self.write_atomic(&unit_path, content.as_bytes())?;
        info!(path = %unit_path.display(), "Service definition written");

        self.control
            .reload_definitions()
            .map_err(|e| DeployError::DefinitionInstall {
                message: format!("Failed to reload service definitions: {}", e),
            })?;
        debug!(service = %definition.name, "Service manager reloaded definitions");

        Ok(unit_path)
    }

    fn write_atomic(&self, path: &Path, content: &[u8]) -> DeployResult<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let scratch = std::env::temp_dir().join(format!(
            "lumo-deploy.{}.{}.render",
            file_name,
            Uuid::new_v4().simple()
        ));
        let staged = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        let result = write_scratch(&scratch, content)
            .and_then(|_| self.files.install(&scratch, &staged, UNIT_MODE, None))
            .and_then(|_| {
                self.files.rename(&staged, path).map_err(|e| {
                    if let Err(cleanup) = self.files.remove_file(&staged) {
                        warn!(path = %staged.display(), error = %cleanup, "Failed to remove staged unit");
                    }
                    e
                })
            });

        if let Err(e) = fs::remove_file(&scratch) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %scratch.display(), error = %e, "Failed to remove scratch file");
            }
        }

        result.map_err(|e| DeployError::DefinitionInstall {
            message: format!("Failed to write '{}': {}", path.display(), e),
        })
    }
}

fn write_scratch(path: &Path, content: &[u8]) -> DeployResult<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content)?;
    file.sync_all()?;
    Ok(())
}
