//! Remote tunnel registry: issues and revokes tunnel identities.

use std::path::PathBuf;
use std::time::Duration;

use crate::cmd::{run_interactive, run_tool};
use crate::error::{Error, Result};

/// Outcome of asking the registry to revoke an identity.
///
/// Only `Deleted` is a clean success; the other two are soft failures that
/// never stop a teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityRemoval {
    Deleted,
    /// The registry says there is no such tunnel.
    AlreadyAbsent(String),
    /// Any other registry-side failure (auth, network, ...), raw text kept.
    Failed(String),
}

/// Issues and revokes named tunnel identities.
pub trait Registry {
    /// Register `name` and return the path of the issued credential file.
    fn create_identity(&self, name: &str) -> Result<PathBuf>;

    /// Revoke `name`. `Err` is reserved for invocation failures (tool
    /// missing, timeout); registry-side refusals come back as
    /// [`IdentityRemoval`] values.
    fn delete_identity(&self, name: &str) -> Result<IdentityRemoval>;
}

/// Find the credential file path in `tunnel create` output.
///
/// Expects a line like `Tunnel credentials written to /root/.cloudflared/<id>.json.
/// cloudflared chose this file ...`: the path runs from `to ` up to the next `. `.
pub fn locate_credentials(output: &str) -> Option<PathBuf> {
    output
        .lines()
        .filter(|line| line.contains(".json"))
        .find_map(|line| {
            let (_, rest) = line.split_once("to ")?;
            let path = rest.split_once(". ").map_or(rest, |(path, _)| path);
            let path = path.trim().trim_end_matches('.');
            (!path.is_empty()).then(|| PathBuf::from(path))
        })
}

fn is_name_conflict(message: &str) -> bool {
    message.to_ascii_lowercase().contains("already exists")
}

/// Split delete failures into "nothing to delete" and genuine errors.
fn classify_delete_failure(message: String) -> IdentityRemoval {
    let lower = message.to_ascii_lowercase();
    let absent = ["not found", "does not exist", "no tunnel"]
        .iter()
        .any(|needle| lower.contains(needle));
    if absent {
        IdentityRemoval::AlreadyAbsent(message)
    } else {
        IdentityRemoval::Failed(message)
    }
}

/// [`Registry`] backed by the `cloudflared` command-line client.
#[derive(Debug, Clone)]
pub struct CloudflaredRegistry {
    program: String,
    timeout: Option<Duration>,
}

impl CloudflaredRegistry {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The client binary, also used as the command in launch scripts.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the browser-based account login attached to the terminal.
    pub fn login(&self) -> Result<()> {
        tracing::info!("launching '{} tunnel login'", self.program);
        let status = run_interactive(&self.program, &["tunnel", "login"])?;
        if !status.success() {
            return Err(Error::Registry(format!("login failed ({status})")));
        }
        Ok(())
    }
}

impl Registry for CloudflaredRegistry {
    fn create_identity(&self, name: &str) -> Result<PathBuf> {
        tracing::info!("creating Cloudflare tunnel '{name}'");
        let output = run_tool(&self.program, &["tunnel", "create", name], self.timeout)?;

        if !output.success() {
            let message = output.message();
            if is_name_conflict(&message) {
                return Err(Error::NameConflict {
                    name: name.to_string(),
                    message,
                });
            }
            return Err(Error::Registry(format!(
                "tunnel create {name} failed ({}): {message}",
                output.status
            )));
        }

        tracing::info!("{}", output.stdout.trim());
        locate_credentials(&output.stdout)
            .or_else(|| locate_credentials(&output.stderr))
            .ok_or_else(|| Error::CredentialsNotFound {
                output: format!("{}{}", output.stdout, output.stderr),
            })
    }

    fn delete_identity(&self, name: &str) -> Result<IdentityRemoval> {
        tracing::info!("deleting Cloudflare tunnel '{name}'");
        let output = run_tool(&self.program, &["tunnel", "delete", name], self.timeout)?;
        if output.success() {
            return Ok(IdentityRemoval::Deleted);
        }
        Ok(classify_delete_failure(output.message()))
    }
}
