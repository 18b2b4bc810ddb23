//! cftunnel core library
//!
//! Provisions, tears down and monitors Cloudflare tunnels that bind a public
//! hostname to a local service:
//! - Config store: one directory per tunnel (routing config + launch script)
//! - Registry client: `cloudflared tunnel create/delete`
//! - Service supervisor: systemd units that keep each tunnel running
//! - Lifecycle manager: create/delete/status across all three

pub mod cmd;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod store;
pub mod supervisor;
pub mod templates;
pub mod tracing_init;
pub mod tunnel;

pub use error::{Error, Result};
pub use lifecycle::{
    Activation, CreateOutcome, DeleteOutcome, DeleteReport, TunnelManager, TunnelStatus,
};
pub use registry::{CloudflaredRegistry, IdentityRemoval, Registry};
pub use store::{ConfigStore, TunnelPaths};
pub use supervisor::{
    InstallOutcome, Remediation, ServiceState, Supervisor, SystemdSupervisor, UnitSpec,
    UninstallReport,
};
pub use tunnel::{Tunnel, TunnelSpec, TunnelState};
