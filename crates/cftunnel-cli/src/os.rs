use anyhow::{Context, Result, bail};
use nix::unistd::{User, geteuid, getuid};

/// Check if the current process is running as root.
pub fn is_root() -> bool {
    geteuid().is_root()
}

/// Login name of the person running the tool; tunnel services run as this
/// user. Under `sudo` that is the invoking user from `SUDO_USER`, not root.
pub fn current_user() -> Result<String> {
    if let Some(name) = sudo_user(std::env::var("SUDO_USER").ok(), is_root()) {
        return Ok(name);
    }
    let uid = getuid();
    match User::from_uid(uid).context("failed to look up the current user")? {
        Some(user) => Ok(user.name),
        None => bail!("no passwd entry for uid {uid}"),
    }
}

/// The `SUDO_USER` name, if the process is root and it names a real,
/// non-root account.
fn sudo_user(var: Option<String>, root: bool) -> Option<String> {
    let name = var.filter(|name| root && !name.is_empty() && name != "root")?;
    match User::from_name(&name) {
        Ok(Some(user)) => Some(user.name),
        _ => {
            tracing::warn!("ignoring SUDO_USER={name}: no such user");
            None
        }
    }
}
