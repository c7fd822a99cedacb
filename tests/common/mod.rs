//! Shared fixtures for deployment integration tests.
//!
//! `FakeSystemd` tracks whether the unit was started and reports it active
//! only when the installed binary does not contain the `crash` marker, so a
//! test chooses health outcomes through the payload bytes.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use nix::unistd::{getgid, getuid, Group, User};
use tempfile::TempDir;

use lumo_deploy::artifact::ArtifactSource;
use lumo_deploy::config::Settings;
use lumo_deploy::deploy::swap::backup_path_for;
use lumo_deploy::error::{DeployError, DeployResult, PreconditionKind};
use lumo_deploy::services::ServiceControl;

pub const CRASH_MARKER: &[u8] = b"crash";
pub const SERVICE: &str = "lumo-agent";
pub const ARTIFACT_URL: &str = "https://downloads.example.test/lumo-agent";

#[derive(Default)]
struct SystemdState {
    running: bool,
    calls: Vec<String>,
}

/// In-memory stand-in for systemd.
#[derive(Clone)]
pub struct FakeSystemd {
    binary: PathBuf,
    available: bool,
    state: Arc<Mutex<SystemdState>>,
}

impl FakeSystemd {
    pub fn new(binary: &Path) -> Self {
        Self {
            binary: binary.to_path_buf(),
            available: true,
            state: Arc::new(Mutex::new(SystemdState::default())),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Mark the unit as already running before the deployment starts.
    pub fn running(self) -> Self {
        self.state.lock().unwrap().running = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Whether the unit is up on a healthy binary, without recording a call.
    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running && self.binary_is_healthy()
    }

    fn binary_is_healthy(&self) -> bool {
        match fs::read(&self.binary) {
            Ok(bytes) => !bytes.windows(CRASH_MARKER.len()).any(|w| w == CRASH_MARKER),
            Err(_) => false,
        }
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn set_running(&self, name: &str, action: &str, running: bool) -> DeployResult<()> {
        self.record(format!("{} {}", action, name));
        self.state.lock().unwrap().running = running;
        Ok(())
    }
}

impl ServiceControl for FakeSystemd {
    fn start(&self, name: &str) -> DeployResult<()> {
        self.set_running(name, "start", true)
    }

    fn stop(&self, name: &str) -> DeployResult<()> {
        self.set_running(name, "stop", false)
    }

    fn restart(&self, name: &str) -> DeployResult<()> {
        self.set_running(name, "restart", true)
    }

    fn enable(&self, name: &str) -> DeployResult<()> {
        self.record(format!("enable {}", name));
        Ok(())
    }

    fn is_active(&self, name: &str) -> DeployResult<bool> {
        self.record(format!("is-active {}", name));
        Ok(self.is_running())
    }

    fn reload_definitions(&self) -> DeployResult<()> {
        self.record("daemon-reload".to_string());
        Ok(())
    }

    fn ensure_available(&self) -> DeployResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(DeployError::Precondition {
                kind: PreconditionKind::MissingTool {
                    tool: "systemctl".to_string(),
                },
            })
        }
    }
}

/// Serves one fixed payload, or fails every fetch.
#[derive(Clone)]
pub struct FakeSource {
    payload: Option<Vec<u8>>,
    available: bool,
    fetches: Arc<Mutex<u32>>,
}

impl FakeSource {
    pub fn serving(payload: &[u8]) -> Self {
        Self {
            payload: Some(payload.to_vec()),
            available: true,
            fetches: Arc::new(Mutex::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            payload: None,
            available: true,
            fetches: Arc::new(Mutex::new(0)),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn fetches(&self) -> u32 {
        *self.fetches.lock().unwrap()
    }
}

impl ArtifactSource for FakeSource {
    fn fetch(&self, url: &str, dest: &Path) -> DeployResult<u64> {
        *self.fetches.lock().unwrap() += 1;
        match &self.payload {
            Some(bytes) => {
                fs::write(dest, bytes)?;
                Ok(bytes.len() as u64)
            }
            None => Err(DeployError::ArtifactFetch {
                url: url.to_string(),
                message: "Server returned 503 Service Unavailable".to_string(),
            }),
        }
    }

    fn ensure_available(&self, _url: &str) -> DeployResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(DeployError::Precondition {
                kind: PreconditionKind::SourceUnavailable {
                    message: "no route to host".to_string(),
                },
            })
        }
    }
}

/// A throwaway host root with install and unit directories.
pub struct TestHost {
    pub root: TempDir,
    pub settings: Settings,
}

impl TestHost {
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp directory");
        let unit_dir = root.path().join("etc/systemd/system");
        fs::create_dir_all(&unit_dir).expect("Failed to create unit dir");

        let user = User::from_uid(getuid()).unwrap().unwrap();
        let group = Group::from_gid(getgid()).unwrap().unwrap();

        let mut settings = Settings::default();
        settings.service.name = SERVICE.to_string();
        settings.service.user = user.name;
        settings.service.group = group.name;
        settings.service.working_directory = root.path().join("opt/lumo");
        settings.install.dir = root.path().join("opt/lumo");
        settings.install.binary_name = SERVICE.to_string();
        settings.artifact.url = ARTIFACT_URL.to_string();
        settings.systemd.unit_dir = unit_dir;
        settings.paths.templates_dir = root.path().join("etc/lumo/templates");
        settings.health.settle_seconds = 0;
        // The test user owns the host root, so no elevation is needed.
        settings.systemd.elevate_with = Vec::new();

        Self { root, settings }
    }

    pub fn binary(&self) -> PathBuf {
        self.settings.install.binary_path()
    }

    pub fn backup(&self) -> PathBuf {
        backup_path_for(&self.binary())
    }

    pub fn unit_file(&self) -> PathBuf {
        self.settings
            .systemd
            .unit_dir
            .join(format!("{}.service", SERVICE))
    }

    /// Put an existing binary in place, as a previous deployment would have.
    pub fn install_existing(&self, bytes: &[u8]) {
        fs::create_dir_all(&self.settings.install.dir).unwrap();
        fs::write(self.binary(), bytes).unwrap();
    }

    /// Every file under the host root, relative and sorted.
    pub fn snapshot(&self) -> Vec<String> {
        fn walk(dir: &Path, base: &Path, out: &mut Vec<String>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                out.push(path.strip_prefix(base).unwrap().display().to_string());
                if path.is_dir() {
                    walk(&path, base, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self.root.path(), self.root.path(), &mut out);
        out.sort();
        out
    }
}
