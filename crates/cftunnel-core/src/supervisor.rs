//! Background-service supervisor: installs, removes and toggles the unit that
//! keeps a tunnel's launch script running.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cmd::run_tool;
use crate::error::{Error, Result};
use crate::store::io_error;
use crate::templates;

/// Directory for system-level systemd units.
pub const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";

/// Everything needed to render and install one service unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    /// Unit name without the `.service` suffix.
    pub name: String,
    /// Absolute path of the managed command.
    pub exec_path: PathBuf,
    pub description: String,
    /// OS user the service runs as.
    pub run_as: String,
}

/// Running state reported by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    Inactive,
    /// The supervisor itself could not be queried (e.g. not installed).
    Unknown,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Manual steps that finish an install the process lacked privilege for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remediation {
    pub unit_path: PathBuf,
    /// Literal unit file text that could not be written.
    pub unit_content: String,
    /// Write the unit file, reload the unit database, enable and start.
    pub commands: [String; 3],
}

impl Remediation {
    pub fn new(unit_name: &str, unit_path: PathBuf, unit_content: String) -> Self {
        let write = format!(
            "sudo bash -c 'cat > {}' << 'EOF'\n{unit_content}EOF",
            unit_path.display()
        );
        Self {
            commands: [
                write,
                "sudo systemctl daemon-reload".to_string(),
                format!("sudo systemctl enable --now {unit_name}"),
            ],
            unit_path,
            unit_content,
        }
    }
}

/// Result of [`Supervisor::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Unit written, enabled and started.
    Installed,
    /// Unit could not be written for lack of privilege; nothing was started.
    NeedsPrivilege(Remediation),
}

/// Soft failures collected during a best-effort uninstall.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub failures: Vec<String>,
}

impl UninstallReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A local facility that keeps a long-running process alive.
pub trait Supervisor {
    /// Write the unit, reload, enable and start it.
    fn install(&self, unit: &UnitSpec) -> Result<InstallOutcome>;

    /// Stop, disable and remove the unit, then reload. Every step runs even
    /// if an earlier one fails.
    fn uninstall(&self, unit_name: &str) -> UninstallReport;

    fn is_active(&self, unit_name: &str) -> ServiceState;

    /// Enable or disable the unit, optionally starting/stopping it now.
    fn set_enabled(&self, unit_name: &str, enabled: bool, now: bool) -> Result<()>;
}

/// [`Supervisor`] backed by `systemctl` and unit files on disk.
#[derive(Debug, Clone)]
pub struct SystemdSupervisor {
    unit_dir: PathBuf,
    systemctl: String,
    /// Run mutating `systemctl` calls through `sudo`.
    sudo: bool,
    timeout: Option<Duration>,
}

impl Default for SystemdSupervisor {
    fn default() -> Self {
        Self {
            unit_dir: PathBuf::from(DEFAULT_UNIT_DIR),
            systemctl: "systemctl".to_string(),
            sudo: false,
            timeout: None,
        }
    }
}

impl SystemdSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_unit_dir(mut self, unit_dir: impl Into<PathBuf>) -> Self {
        self.unit_dir = unit_dir.into();
        self
    }

    #[must_use]
    pub fn with_systemctl(mut self, systemctl: impl Into<String>) -> Self {
        self.systemctl = systemctl.into();
        self
    }

    #[must_use]
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn unit_path(&self, unit_name: &str) -> PathBuf {
        self.unit_dir.join(format!("{unit_name}.service"))
    }

    /// Run a mutating `systemctl` command, through sudo when configured.
    fn systemctl(&self, description: &str, args: &[&str]) -> Result<()> {
        tracing::info!("{description}");
        let output = if self.sudo {
            let mut sudo_args = vec![self.systemctl.as_str()];
            sudo_args.extend_from_slice(args);
            run_tool("sudo", sudo_args.as_slice(), self.timeout)?
        } else {
            run_tool(&self.systemctl, args, self.timeout)?
        };

        if !output.success() {
            return Err(Error::Supervisor(format!(
                "{description} failed ({}): {}",
                output.status,
                output.message()
            )));
        }
        Ok(())
    }

    fn remove_unit_file(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            tracing::debug!("unit file {} already absent", path.display());
            return Ok(());
        }
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied && self.sudo => {
                let path_str = path.to_string_lossy();
                let output = run_tool("sudo", &["rm", "-f", &*path_str], self.timeout)?;
                if !output.success() {
                    return Err(Error::PermissionDenied(format!(
                        "failed to remove {}: {}",
                        path.display(),
                        output.message()
                    )));
                }
            }
            Err(e) => return Err(io_error(format!("failed to remove {}", path.display()), e)),
        }
        tracing::info!("removed systemd service file {}", path.display());
        Ok(())
    }
}

impl Supervisor for SystemdSupervisor {
    fn install(&self, unit: &UnitSpec) -> Result<InstallOutcome> {
        let path = self.unit_path(&unit.name);
        let content = templates::systemd_unit(unit);

        tracing::info!("writing systemd unit: {}", path.display());
        match fs::write(&path, &content) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                tracing::warn!(
                    "could not write {} due to permission errors: {e}",
                    path.display()
                );
                return Ok(InstallOutcome::NeedsPrivilege(Remediation::new(
                    &unit.name, path, content,
                )));
            }
            Err(e) => return Err(io_error(format!("failed to write {}", path.display()), e)),
        }

        self.systemctl("reloading systemd daemon", &["daemon-reload"])?;
        self.systemctl(
            &format!("enabling service {}", unit.name),
            &["enable", &unit.name],
        )?;
        self.systemctl(
            &format!("starting service {}", unit.name),
            &["start", &unit.name],
        )?;
        tracing::info!("tunnel service {} started and enabled", unit.name);
        Ok(InstallOutcome::Installed)
    }

    fn uninstall(&self, unit_name: &str) -> UninstallReport {
        let mut report = UninstallReport::default();
        let mut soft = |result: Result<()>| {
            if let Err(e) = result {
                tracing::warn!("{e}");
                report.failures.push(e.to_string());
            }
        };

        soft(self.systemctl(
            &format!("stopping service {unit_name}"),
            &["stop", unit_name],
        ));
        soft(self.systemctl(
            &format!("disabling service {unit_name}"),
            &["disable", unit_name],
        ));
        soft(self.remove_unit_file(&self.unit_path(unit_name)));
        soft(self.systemctl("reloading systemd daemon", &["daemon-reload"]));

        report
    }

    fn is_active(&self, unit_name: &str) -> ServiceState {
        match run_tool(&self.systemctl, &["is-active", unit_name], self.timeout) {
            Ok(output) if output.stdout.trim() == "active" => ServiceState::Active,
            Ok(_) => ServiceState::Inactive,
            Err(e) => {
                tracing::warn!("could not check service status: {e}");
                ServiceState::Unknown
            }
        }
    }

    fn set_enabled(&self, unit_name: &str, enabled: bool, now: bool) -> Result<()> {
        let verb = if enabled { "enable" } else { "disable" };
        let mut args = vec![verb];
        if now {
            args.push("--now");
        }
        args.push(unit_name);
        let description = if enabled {
            format!("activating service {unit_name}")
        } else {
            format!("deactivating service {unit_name}")
        };
        self.systemctl(&description, &args)
    }
}
