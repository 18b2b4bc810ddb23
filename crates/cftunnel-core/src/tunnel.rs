//! Tunnel data model and input validation.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::TunnelPaths;

/// Prefix of every systemd unit managed by cftunnel.
pub const UNIT_PREFIX: &str = "cloudflare-tunnel-";

/// Longest accepted tunnel name.
const MAX_NAME_LEN: usize = 64;

/// Schemes that route to a network host and therefore need one.
const HOST_SCHEMES: &[&str] = &["http", "https", "ws", "wss", "tcp", "ssh", "rdp", "smb"];

/// Hostless services understood by the tunnel client.
const LOCAL_SCHEMES: &[&str] = &["unix", "unix+tls", "http_status"];

/// Service unit name for a tunnel (without the `.service` suffix).
pub fn unit_name(name: &str) -> String {
    format!("{UNIT_PREFIX}{name}")
}

/// What the operator asks for when creating a tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSpec {
    pub name: String,
    /// Public DNS hostname routed to this tunnel.
    pub hostname: String,
    /// Local service the tunnel forwards to (e.g. `http://localhost:8000`).
    pub service_url: String,
}

impl TunnelSpec {
    pub fn new(
        name: impl Into<String>,
        hostname: impl Into<String>,
        service_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            service_url: service_url.into(),
        }
    }

    /// Reject values that would produce a broken config or an unsafe path.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_hostname(&self.hostname)?;
        validate_service_url(&self.service_url)
    }
}

/// A fully provisioned tunnel and everything derived from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunnel {
    pub name: String,
    pub hostname: String,
    pub service_url: String,
    /// Credential file issued by the registry. Immutable after creation.
    pub credentials_path: PathBuf,
    pub paths: TunnelPaths,
    pub unit_name: String,
}

/// Conceptual lifecycle position of a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    Absent,
    Reserved,
    Registered,
    Configured,
    ServicePending,
    Active,
    Inactive,
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absent => "absent",
            Self::Reserved => "reserved",
            Self::Registered => "registered",
            Self::Configured => "configured",
            Self::ServicePending => "service pending",
            Self::Active => "active",
            Self::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

/// Tunnel names become directory names and unit names, so only a
/// conservative character set is allowed.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("tunnel name must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "tunnel name must be at most {MAX_NAME_LEN} characters (got {})",
            name.len()
        )));
    }
    if name.starts_with('.') || name.starts_with('-') {
        return Err(Error::InvalidInput(format!(
            "tunnel name '{name}' must not start with '.' or '-'"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(Error::InvalidInput(format!(
            "tunnel name '{name}' contains invalid character '{bad}' \
             (allowed: letters, digits, '.', '_', '-')"
        )));
    }
    Ok(())
}

/// Looser check for tunnels already on disk: any name that is a single
/// entry directly under the store root. Directories made by other tools may
/// not satisfy [`validate_name`] but must still be manageable.
pub fn validate_existing_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(entry)), None) if entry.to_str() == Some(name) => Ok(()),
        _ => Err(Error::InvalidInput(format!(
            "tunnel name '{name}' is not a single directory name"
        ))),
    }
}

fn validate_hostname(hostname: &str) -> Result<()> {
    if hostname.is_empty() {
        return Err(Error::InvalidInput("DNS hostname must not be empty".into()));
    }
    if hostname.contains(|c: char| c.is_whitespace() || c == '/') {
        return Err(Error::InvalidInput(format!(
            "DNS hostname '{hostname}' must be a bare hostname (e.g. myapp.mydomain.com)"
        )));
    }
    Ok(())
}

fn validate_service_url(service_url: &str) -> Result<()> {
    let parsed = url::Url::parse(service_url).map_err(|e| {
        Error::InvalidInput(format!(
            "service URL '{service_url}' is not valid ({e}); expected e.g. http://localhost:8000"
        ))
    })?;
    let scheme = parsed.scheme();
    if HOST_SCHEMES.contains(&scheme) {
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(Error::InvalidInput(format!(
                "service URL '{service_url}' has no host"
            )));
        }
        return Ok(());
    }
    if LOCAL_SCHEMES.contains(&scheme) {
        return Ok(());
    }
    Err(Error::InvalidInput(format!(
        "service URL '{service_url}' has unsupported scheme '{scheme}'; \
         expected e.g. http://localhost:8000"
    )))
}
