//! Elevated filesystem operations.
//!
//! The deployer runs unprivileged. Anything that touches the install
//! directory or the unit directory is performed by coreutils run through
//! the configured elevation prefix, so ownership can be set to the service
//! identity without ambient root.

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{CommandErrorKind, DeployError, DeployResult, PreconditionKind};

use super::output::sanitize_output;
use super::subprocess::SubprocessBuilder;

/// Tools invoked through the elevation prefix.
const TOOLS: &[&str] = &["mkdir", "install", "mv", "cp", "rm"];

/// Owner and group applied by `install -o/-g`.
#[derive(Debug, Clone, Copy)]
pub struct Ownership<'a> {
    pub user: &'a str,
    pub group: &'a str,
}

/// Runs filesystem mutations through an elevation prefix such as `sudo -n`.
#[derive(Debug, Clone)]
pub struct PrivilegedFs {
    elevate_with: Vec<String>,
    timeout: Duration,
}

impl PrivilegedFs {
    /// An empty `elevate_with` runs every tool directly.
    pub fn new(elevate_with: &[String], timeout: Duration) -> Self {
        Self {
            elevate_with: elevate_with.to_vec(),
            timeout,
        }
    }

    /// Check that the elevation program and every tool used here can be
    /// found.
    pub fn ensure_available(&self) -> DeployResult<()> {
        let tools = self
            .elevate_with
            .first()
            .map(String::as_str)
            .into_iter()
            .chain(TOOLS.iter().copied());
        for tool in tools {
            if which::which(tool).is_err() {
                return Err(DeployError::Precondition {
                    kind: PreconditionKind::MissingTool {
                        tool: tool.to_string(),
                    },
                });
            }
        }
        Ok(())
    }

    /// `mkdir -p <dir>`
    pub fn create_dir_all(&self, dir: &Path) -> DeployResult<()> {
        self.run("mkdir", vec!["-p".to_string(), path_arg(dir)])
    }

    /// `install -m <mode> [-o <user> -g <group>] <src> <dest>`
    pub fn install(
        &self,
        src: &Path,
        dest: &Path,
        mode: u32,
        owner: Option<Ownership<'_>>,
    ) -> DeployResult<()> {
        self.run("install", install_args(src, dest, mode, owner))
    }

    /// `mv -f -T <src> <dest>`: an atomic rename within one filesystem.
    pub fn rename(&self, src: &Path, dest: &Path) -> DeployResult<()> {
        self.run(
            "mv",
            vec![
                "-f".to_string(),
                "-T".to_string(),
                path_arg(src),
                path_arg(dest),
            ],
        )
    }

    /// `cp -p <src> <dest>`, keeping mode and owner.
    pub fn copy(&self, src: &Path, dest: &Path) -> DeployResult<()> {
        self.run(
            "cp",
            vec!["-p".to_string(), path_arg(src), path_arg(dest)],
        )
    }

    /// `rm -f <path>`
    pub fn remove_file(&self, path: &Path) -> DeployResult<()> {
        self.run("rm", vec!["-f".to_string(), path_arg(path)])
    }

    fn run(&self, program: &str, args: Vec<String>) -> DeployResult<()> {
        let result = SubprocessBuilder::new(program)
            .args(&args)
            .elevated(&self.elevate_with)
            .timeout(self.timeout)
            .run()?;

        if !result.success {
            return Err(DeployError::Command {
                kind: CommandErrorKind::ExecutionFailed {
                    message: format!(
                        "{} {} failed: {}",
                        program,
                        args.join(" "),
                        sanitize_output(&result.stderr, 5)
                    ),
                },
            });
        }

        debug!(program = %program, args = ?args, "Filesystem operation completed");
        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn install_args(src: &Path, dest: &Path, mode: u32, owner: Option<Ownership<'_>>) -> Vec<String> {
    let mut args = vec!["-m".to_string(), format!("{:04o}", mode)];
    if let Some(owner) = owner {
        args.extend([
            "-o".to_string(),
            owner.user.to_string(),
            "-g".to_string(),
            owner.group.to_string(),
        ]);
    }
    args.push(path_arg(src));
    args.push(path_arg(dest));
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn direct() -> PrivilegedFs {
        PrivilegedFs::new(&[], Duration::from_secs(10))
    }

    #[test]
    fn test_install_args_with_owner() {
        let args = install_args(
            Path::new("/tmp/stage"),
            Path::new("/opt/lumo/.lumo-agent.tmp"),
            0o755,
            Some(Ownership {
                user: "daemon",
                group: "daemon",
            }),
        );
        assert_eq!(
            args,
            vec![
                "-m",
                "0755",
                "-o",
                "daemon",
                "-g",
                "daemon",
                "/tmp/stage",
                "/opt/lumo/.lumo-agent.tmp"
            ]
        );
    }

    #[test]
    fn test_install_args_without_owner() {
        let args = install_args(Path::new("/a"), Path::new("/b"), 0o644, None);
        assert_eq!(args, vec!["-m", "0644", "/a", "/b"]);
    }

    #[test]
    fn test_mkdir_install_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let files = direct();
        let target_dir = dir.path().join("opt/lumo");
        let src = dir.path().join("src");
        fs::write(&src, b"payload").unwrap();

        files.create_dir_all(&target_dir).unwrap();
        let staged = target_dir.join(".staged");
        files.install(&src, &staged, 0o750, None).unwrap();
        let dest = target_dir.join("bin");
        files.rename(&staged, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert!(!staged.exists());
        assert_eq!(
            fs::metadata(&dest).unwrap().permissions().mode() & 0o777,
            0o750
        );
    }

    #[test]
    fn test_copy_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let files = direct();
        let src = dir.path().join("a");
        let copy = dir.path().join("b");
        fs::write(&src, b"v1").unwrap();

        files.copy(&src, &copy).unwrap();
        assert_eq!(fs::read(&copy).unwrap(), b"v1");

        files.remove_file(&copy).unwrap();
        assert!(!copy.exists());
        // rm -f on a missing file is not an error
        files.remove_file(&copy).unwrap();
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = direct().copy(&dir.path().join("absent"), &dir.path().join("b"));
        assert!(matches!(
            result,
            Err(DeployError::Command {
                kind: CommandErrorKind::ExecutionFailed { .. }
            })
        ));
    }

    #[test]
    fn test_operations_go_through_elevation_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("elevated.log");
        let wrapper = dir.path().join("elevate");
        fs::write(
            &wrapper,
            format!("#!/bin/sh\necho \"$1\" >> '{}'\nexec \"$@\"\n", log.display()),
        )
        .unwrap();
        fs::set_permissions(&wrapper, fs::Permissions::from_mode(0o755)).unwrap();

        let files = PrivilegedFs::new(&[path_arg(&wrapper)], Duration::from_secs(10));
        let target = dir.path().join("target");
        files.create_dir_all(&target).unwrap();
        files.remove_file(&target.join("x")).unwrap();

        assert_eq!(fs::read_to_string(&log).unwrap(), "mkdir\nrm\n");
    }

    #[test]
    fn test_tools_available() {
        assert!(direct().ensure_available().is_ok());
    }

    #[test]
    fn test_missing_elevation_program() {
        let files = PrivilegedFs::new(
            &["lumo-no-such-elevator".to_string()],
            Duration::from_secs(10),
        );
        assert!(matches!(
            files.ensure_available(),
            Err(DeployError::Precondition {
                kind: PreconditionKind::MissingTool { .. }
            })
        ));
    }
}
