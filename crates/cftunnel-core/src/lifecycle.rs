//! Tunnel lifecycle manager.
//!
//! Composes the config store, the registry and the service supervisor into
//! create / delete / status operations. Create is forward-only: a failure
//! after the directory is reserved leaves it in place for the operator, and a
//! retry fails fast with `AlreadyExists`. Delete is best-effort and keeps
//! going past registry or supervisor failures; only a failed directory
//! removal is a hard error.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::registry::{IdentityRemoval, Registry};
use crate::store::{ConfigStore, TunnelPaths};
use crate::supervisor::{InstallOutcome, Remediation, ServiceState, Supervisor, UnitSpec};
use crate::tunnel::{Tunnel, TunnelSpec, TunnelState, unit_name, validate_existing_name};

/// Default tunnel client invoked by launch scripts.
pub const DEFAULT_CLIENT: &str = "cloudflared";

/// How far activation got at the end of a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// Service installed, enabled and started.
    Active,
    /// Config and launch script are in place, but the service unit must be
    /// installed by hand with elevated privilege.
    ManualStepsRequired(Remediation),
}

/// Successful result of [`TunnelManager::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub tunnel: Tunnel,
    pub activation: Activation,
}

impl CreateOutcome {
    pub const fn state(&self) -> TunnelState {
        match self.activation {
            Activation::Active => TunnelState::Active,
            Activation::ManualStepsRequired(_) => TunnelState::Configured,
        }
    }
}

/// What a completed teardown ran into along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub name: String,
    /// Soft failures from stopping/removing the service unit.
    pub service_failures: Vec<String>,
    pub identity: IdentityRemoval,
}

impl DeleteReport {
    /// Human-readable soft failures, in the order they happened.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = self.service_failures.clone();
        match &self.identity {
            IdentityRemoval::Deleted => {}
            IdentityRemoval::AlreadyAbsent(msg) => {
                warnings.push(format!("tunnel was already absent from the registry: {msg}"));
            }
            IdentityRemoval::Failed(msg) => {
                warnings.push(format!("could not delete tunnel from the registry: {msg}"));
            }
        }
        warnings
    }
}

/// Result of [`TunnelManager::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// No directory for this name; nothing was touched.
    NotFound,
    /// The caller declined the confirmation; nothing was touched.
    Cancelled,
    Deleted(DeleteReport),
}

/// Observable state of one existing tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelStatus {
    pub name: String,
    pub unit_name: String,
    pub service: ServiceState,
    pub paths: TunnelPaths,
}

fn log_left_in_place(paths: &TunnelPaths, e: &Error) {
    tracing::warn!(
        "create stopped ({e}); {} was left in place, inspect it and delete the tunnel before retrying",
        paths.dir.display()
    );
}

/// Sole writer of tunnel directories and their service units.
#[derive(Debug, Clone)]
pub struct TunnelManager<R, S> {
    store: ConfigStore,
    registry: R,
    supervisor: S,
    /// OS user the tunnel services run as.
    run_as: String,
    /// Tunnel client command written into launch scripts.
    client: String,
}

impl<R: Registry, S: Supervisor> TunnelManager<R, S> {
    pub fn new(store: ConfigStore, registry: R, supervisor: S, run_as: impl Into<String>) -> Self {
        Self {
            store,
            registry,
            supervisor,
            run_as: run_as.into(),
            client: DEFAULT_CLIENT.to_string(),
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    /// Same manager over a different config store (e.g. after the base
    /// directory setting changed).
    #[must_use]
    pub fn with_store(mut self, store: ConfigStore) -> Self {
        self.store = store;
        self
    }

    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub const fn registry(&self) -> &R {
        &self.registry
    }

    pub const fn supervisor(&self) -> &S {
        &self.supervisor
    }

    /// Provision a tunnel across the config store, registry and supervisor.
    pub fn create(&self, spec: &TunnelSpec) -> Result<CreateOutcome> {
        spec.validate()?;
        let name = spec.name.as_str();

        let paths = self.store.reserve(name)?;
        tracing::debug!(tunnel = name, state = %TunnelState::Reserved);

        let credentials_path = self
            .registry
            .create_identity(name)
            .inspect_err(|e| log_left_in_place(&paths, e))?;
        tracing::debug!(tunnel = name, state = %TunnelState::Registered);

        self.store
            .write_routing_config(
                &paths,
                name,
                &spec.hostname,
                &spec.service_url,
                &credentials_path,
            )
            .and_then(|_| self.store.write_launch_script(&paths, &self.client))
            .inspect_err(|e| log_left_in_place(&paths, e))?;
        tracing::debug!(tunnel = name, state = %TunnelState::Configured);

        let tunnel = Tunnel {
            name: name.to_string(),
            hostname: spec.hostname.clone(),
            service_url: spec.service_url.clone(),
            credentials_path,
            unit_name: unit_name(name),
            paths,
        };

        let unit = UnitSpec {
            name: tunnel.unit_name.clone(),
            exec_path: tunnel.paths.launch_script.clone(),
            description: format!("Cloudflare Tunnel for {name}"),
            run_as: self.run_as.clone(),
        };
        tracing::debug!(tunnel = name, state = %TunnelState::ServicePending);

        let activation = match self.supervisor.install(&unit) {
            Ok(InstallOutcome::Installed) => Activation::Active,
            Ok(InstallOutcome::NeedsPrivilege(remediation)) => {
                tracing::warn!(
                    "could not install the service for '{name}'; manual steps are required"
                );
                Activation::ManualStepsRequired(remediation)
            }
            Err(e) => {
                log_left_in_place(&tunnel.paths, &e);
                return Err(e);
            }
        };

        let outcome = CreateOutcome { tunnel, activation };
        tracing::info!("tunnel '{name}' created ({})", outcome.state());
        Ok(outcome)
    }

    /// Tear down a tunnel's service, registry identity and directory.
    ///
    /// `confirm` is asked before anything destructive happens. Every teardown
    /// step is attempted regardless of earlier soft failures.
    pub fn delete<E, F>(&self, name: &str, confirm: F) -> std::result::Result<DeleteOutcome, E>
    where
        E: From<Error>,
        F: FnOnce(&TunnelPaths) -> std::result::Result<bool, E>,
    {
        validate_existing_name(name)?;
        if !self.store.exists(name) {
            tracing::info!("tunnel '{name}' not found");
            return Ok(DeleteOutcome::NotFound);
        }

        let paths = self.store.paths(name);
        if !confirm(&paths)? {
            tracing::info!("deletion of '{name}' cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        let unit = unit_name(name);
        tracing::info!("stopping and removing service '{unit}'");
        let service = self.supervisor.uninstall(&unit);

        let identity = match self.registry.delete_identity(name) {
            Ok(removal) => removal,
            Err(e) => IdentityRemoval::Failed(e.to_string()),
        };
        match &identity {
            IdentityRemoval::Deleted => {
                tracing::info!("deleted tunnel '{name}' from the registry");
            }
            IdentityRemoval::AlreadyAbsent(msg) => {
                tracing::warn!("tunnel '{name}' was already absent from the registry: {msg}");
            }
            IdentityRemoval::Failed(msg) => {
                tracing::warn!("could not delete tunnel '{name}' from the registry: {msg}");
            }
        }

        self.store.remove(name)?;

        tracing::info!("tunnel '{name}' deleted");
        Ok(DeleteOutcome::Deleted(DeleteReport {
            name: name.to_string(),
            service_failures: service.failures,
            identity,
        }))
    }

    /// Names of all tunnels in the store.
    pub fn list(&self) -> Result<BTreeSet<String>> {
        self.store.list()
    }

    /// Every tunnel with its current service state.
    pub fn overview(&self) -> Result<Vec<TunnelStatus>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .map(|name| self.status_of(name))
            .collect())
    }

    pub fn status(&self, name: &str) -> Result<TunnelStatus> {
        self.require_existing(name)?;
        Ok(self.status_of(name.to_string()))
    }

    fn status_of(&self, name: String) -> TunnelStatus {
        let unit_name = unit_name(&name);
        TunnelStatus {
            service: self.supervisor.is_active(&unit_name),
            paths: self.store.paths(&name),
            unit_name,
            name,
        }
    }

    /// Enable and start the tunnel's service.
    pub fn activate(&self, name: &str) -> Result<()> {
        self.require_existing(name)?;
        self.supervisor.set_enabled(&unit_name(name), true, true)
    }

    /// Disable and stop the tunnel's service.
    pub fn deactivate(&self, name: &str) -> Result<()> {
        self.require_existing(name)?;
        self.supervisor.set_enabled(&unit_name(name), false, true)
    }

    /// Raw routing config text.
    pub fn view_config(&self, name: &str) -> Result<String> {
        validate_existing_name(name)?;
        self.store.read_routing_config(name)
    }

    fn require_existing(&self, name: &str) -> Result<()> {
        validate_existing_name(name)?;
        if self.store.exists(name) {
            Ok(())
        } else {
            Err(Error::NotFound {
                name: name.to_string(),
            })
        }
    }
}
