//! Configuration settings for the Lumo deployer.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::DeployError;
use crate::validation::{
    validate_absolute_path, validate_artifact_url, validate_environment, validate_file_name,
    validate_identity_name, validate_service_name, validate_sha256, validate_unit_path,
    validate_unit_value,
};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/lumo/deploy.toml";

/// Main configuration structure for a deployment run.
///
/// Every section has defaults, so an empty file (or no file at all) yields
/// the standard Lumo agent deployment.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub artifact: ArtifactConfig,
    #[serde(default)]
    pub systemd: SystemdConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Managed service identity and unit contents.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Systemd unit name, without the `.service` suffix.
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Unit description.
    #[serde(default = "default_description")]
    pub description: String,
    /// User the service runs as and owns the binary.
    #[serde(default = "default_identity")]
    pub user: String,
    /// Group the service runs as and owns the binary.
    #[serde(default = "default_identity")]
    pub group: String,
    /// Working directory of the service process.
    #[serde(default = "default_install_dir")]
    pub working_directory: PathBuf,
    /// Delay between automatic restarts, in seconds.
    #[serde(default = "default_restart_sec")]
    pub restart_sec: u64,
    /// Units this service is ordered after.
    #[serde(default = "default_dependencies")]
    pub after: Vec<String>,
    /// Units this service wants started alongside it.
    #[serde(default = "default_dependencies")]
    pub wants: Vec<String>,
    /// Environment assignments written into the unit.
    #[serde(default = "default_environment")]
    pub environment: BTreeMap<String, String>,
    /// Secret-shaped variables rendered as commented, unset placeholders.
    #[serde(default = "default_placeholder_environment")]
    pub placeholder_environment: Vec<String>,
}

/// Where the binary lives on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallConfig {
    /// Directory holding the binary.
    #[serde(default = "default_install_dir")]
    pub dir: PathBuf,
    /// File name of the binary inside `dir`.
    #[serde(default = "default_binary_name")]
    pub binary_name: String,
}

/// Artifact source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// Download location of the binary.
    #[serde(default = "default_artifact_url")]
    pub url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: u64,
    /// Optional expected SHA-256 digest (hex) of the artifact.
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Service manager configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemdConfig {
    /// The systemctl executable.
    #[serde(default = "default_systemctl")]
    pub systemctl: String,
    /// Directory the unit file is written to.
    #[serde(default = "default_unit_dir")]
    pub unit_dir: PathBuf,
    /// Command prefix used to elevate service manager calls and filesystem
    /// changes (e.g. `sudo -n`). Empty runs them directly.
    #[serde(default = "default_elevate_with")]
    pub elevate_with: Vec<String>,
    /// Timeout for each systemctl invocation, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
}

/// Post-start health check configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Time to let the service settle after start before checking it, in seconds.
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: u64,
}

/// Paths configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Directory containing operator template overrides.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,
}

/// Security configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Refuse to run when invoked as uid 0.
    #[serde(default = "default_refuse_root")]
    pub refuse_root: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_service_name() -> String {
    "lumo-agent".to_string()
}

fn default_description() -> String {
    "Lumo Agent".to_string()
}

fn default_identity() -> String {
    "lumo".to_string()
}

fn default_install_dir() -> PathBuf {
    PathBuf::from("/opt/lumo")
}

fn default_restart_sec() -> u64 {
    5
}

fn default_dependencies() -> Vec<String> {
    vec![
        "network-online.target".to_string(),
        "docker.service".to_string(),
    ]
}

fn default_environment() -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("RUST_LOG".to_string(), "info".to_string());
    env.insert("LUMO_DATA_DIR".to_string(), "/opt/lumo/data".to_string());
    env
}

fn default_placeholder_environment() -> Vec<String> {
    vec!["API_TOKEN".to_string()]
}

fn default_binary_name() -> String {
    "lumo-agent".to_string()
}

fn default_artifact_url() -> String {
    "https://downloads.lumopanel.com/agent/latest/lumo-agent-linux-x86_64".to_string()
}

fn default_fetch_timeout() -> u64 {
    300
}

fn default_systemctl() -> String {
    "systemctl".to_string()
}

fn default_unit_dir() -> PathBuf {
    PathBuf::from("/etc/systemd/system")
}

fn default_elevate_with() -> Vec<String> {
    vec!["sudo".to_string(), "-n".to_string()]
}

fn default_command_timeout() -> u64 {
    60
}

fn default_settle_seconds() -> u64 {
    3
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("/etc/lumo/templates")
}

fn default_refuse_root() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            description: default_description(),
            user: default_identity(),
            group: default_identity(),
            working_directory: default_install_dir(),
            restart_sec: default_restart_sec(),
            after: default_dependencies(),
            wants: default_dependencies(),
            environment: default_environment(),
            placeholder_environment: default_placeholder_environment(),
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            dir: default_install_dir(),
            binary_name: default_binary_name(),
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            url: default_artifact_url(),
            timeout_seconds: default_fetch_timeout(),
            sha256: None,
        }
    }
}

impl Default for SystemdConfig {
    fn default() -> Self {
        Self {
            systemctl: default_systemctl(),
            unit_dir: default_unit_dir(),
            elevate_with: default_elevate_with(),
            command_timeout_seconds: default_command_timeout(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            settle_seconds: default_settle_seconds(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            templates_dir: default_templates_dir(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            refuse_root: default_refuse_root(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl InstallConfig {
    /// Canonical path of the installed binary.
    pub fn binary_path(&self) -> PathBuf {
        self.dir.join(&self.binary_name)
    }
}

impl SystemdConfig {
    /// Timeout applied to each systemctl call.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }
}

impl HealthConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_seconds)
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DeployError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DeployError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            DeployError::Config { message } => DeployError::Config {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Load the default configuration file, falling back to built-in
    /// defaults when it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, DeployError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            let settings = Self::default();
            settings.validate()?;
            Ok(settings)
        }
    }

    /// Parse and validate settings from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, DeployError> {
        let settings: Settings = toml::from_str(content).map_err(|e| DeployError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), DeployError> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(DeployError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        // Validate log format
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(DeployError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        validate_service_name(&self.service.name)?;
        validate_unit_value("service.description", &self.service.description)?;
        validate_identity_name("service.user", &self.service.user)?;
        validate_identity_name("service.group", &self.service.group)?;
        validate_absolute_path(&self.service.working_directory)?;
        validate_unit_path("service.working_directory", &self.service.working_directory)?;
        validate_environment(&self.service.environment, &self.service.placeholder_environment)?;
        for unit in self.service.after.iter().chain(&self.service.wants) {
            validate_service_name(unit)?;
        }

        validate_absolute_path(&self.install.dir)?;
        validate_file_name("install.binary_name", &self.install.binary_name)?;
        validate_unit_path("install.dir", &self.install.binary_path())?;

        validate_artifact_url(&self.artifact.url)?;
        if let Some(digest) = &self.artifact.sha256 {
            validate_sha256(digest)?;
        }
        if self.artifact.timeout_seconds == 0 {
            return Err(DeployError::Config {
                message: "artifact.timeout_seconds must be greater than zero".to_string(),
            });
        }

        validate_absolute_path(&self.systemd.unit_dir)?;
        if self.systemd.systemctl.is_empty() {
            return Err(DeployError::Config {
                message: "systemd.systemctl cannot be empty".to_string(),
            });
        }
        if self.systemd.command_timeout_seconds == 0 {
            return Err(DeployError::Config {
                message: "systemd.command_timeout_seconds must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
