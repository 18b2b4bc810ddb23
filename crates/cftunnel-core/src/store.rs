//! Local config store: one directory per tunnel under a configurable root.
//!
//! Each tunnel directory holds the routing config (`config.yml`) and the
//! launch script (`start_tunnel.sh`). The directory's existence is what makes
//! a tunnel name taken.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::templates;
use crate::tunnel::validate_name;

/// File name of the routing config inside a tunnel directory.
pub const CONFIG_FILE: &str = "config.yml";

/// File name of the launch script inside a tunnel directory.
pub const LAUNCH_SCRIPT: &str = "start_tunnel.sh";

/// Deterministic paths of one tunnel's directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelPaths {
    pub dir: PathBuf,
    pub config: PathBuf,
    pub launch_script: PathBuf,
}

impl TunnelPaths {
    fn in_dir(dir: PathBuf) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            launch_script: dir.join(LAUNCH_SCRIPT),
            dir,
        }
    }
}

/// Map an I/O failure, keeping privilege errors distinct.
pub(crate) fn io_error(context: String, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::PermissionDenied {
        Error::PermissionDenied(format!("{context}: {e}"))
    } else {
        Error::fs(context, e)
    }
}

/// The directory tree holding every tunnel's local artifacts.
///
/// A plain value: switching the base directory means building a new store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store root if it does not exist yet.
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| io_error(format!("failed to create {}", self.root.display()), e))
    }

    /// Absolute paths for a tunnel, whether or not it exists.
    pub fn paths(&self, name: &str) -> TunnelPaths {
        let dir = self.root.join(name);
        let dir = std::path::absolute(&dir).unwrap_or(dir);
        TunnelPaths::in_dir(dir)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.paths(name).dir.is_dir()
    }

    /// Claim the directory for `name`. Fails rather than reusing an existing
    /// directory; `create_dir` makes the check and the creation one step.
    pub fn reserve(&self, name: &str) -> Result<TunnelPaths> {
        validate_name(name)?;
        self.ensure_root()?;

        let paths = self.paths(name);
        match fs::create_dir(&paths.dir) {
            Ok(()) => {
                tracing::info!("reserved tunnel directory {}", paths.dir.display());
                Ok(paths)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::AlreadyExists {
                name: name.to_string(),
                path: paths.dir,
            }),
            Err(e) => Err(io_error(
                format!("failed to create {}", paths.dir.display()),
                e,
            )),
        }
    }

    /// Write `config.yml` with the hostname rule followed by the catch-all.
    pub fn write_routing_config(
        &self,
        paths: &TunnelPaths,
        name: &str,
        hostname: &str,
        service_url: &str,
        credentials_path: &Path,
    ) -> Result<PathBuf> {
        let content = templates::routing_config(name, credentials_path, hostname, service_url);
        fs::write(&paths.config, content)
            .map_err(|e| io_error(format!("failed to write {}", paths.config.display()), e))?;
        tracing::info!("created config file at {}", paths.config.display());
        Ok(paths.config.clone())
    }

    /// Write the launch script for `paths.config` and mark it executable.
    pub fn write_launch_script(&self, paths: &TunnelPaths, client: &str) -> Result<PathBuf> {
        let content = templates::launch_script(client, &paths.config);
        let script = &paths.launch_script;
        fs::write(script, content)
            .map_err(|e| io_error(format!("failed to write {}", script.display()), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(script, fs::Permissions::from_mode(0o755)).map_err(|e| {
                io_error(format!("failed to set permissions on {}", script.display()), e)
            })?;
        }

        tracing::info!("created startup script at {}", script.display());
        Ok(script.clone())
    }

    pub fn read_routing_config(&self, name: &str) -> Result<String> {
        let path = self.paths(name).config;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(io_error(format!("failed to read {}", path.display()), e)),
        }
    }

    /// Recursively delete a tunnel directory. Already-missing is success.
    pub fn remove(&self, name: &str) -> Result<()> {
        let dir = self.paths(name).dir;
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!("removed tunnel directory {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("tunnel directory {} already absent", dir.display());
                Ok(())
            }
            Err(e) => Err(io_error(format!("failed to remove {}", dir.display()), e)),
        }
    }

    /// Names of all tunnel directories. A missing root is an empty store.
    pub fn list(&self) -> Result<BTreeSet<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => {
                return Err(io_error(
                    format!("failed to list {}", self.root.display()),
                    e,
                ));
            }
        };

        let mut names = BTreeSet::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| io_error(format!("failed to list {}", self.root.display()), e))?;
            if entry.path().is_dir() {
                names.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}
