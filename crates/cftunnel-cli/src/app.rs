//! Command handlers shared by the subcommands and the interactive menu.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Args;
use cftunnel_core::{
    CloudflaredRegistry, ConfigStore, SystemdSupervisor, TunnelManager, TunnelPaths, TunnelSpec,
};

use crate::settings::Settings;
use crate::{os, prompt, report};

/// Lifecycle manager wired to `cloudflared` and systemd.
pub type Manager = TunnelManager<CloudflaredRegistry, SystemdSupervisor>;

/// Arguments for the `create` subcommand.
#[derive(Debug, Default, Args)]
pub struct CreateArgs {
    /// Tunnel name (letters, digits, '.', '_' and '-')
    #[arg(long)]
    pub name: Option<String>,

    /// Public DNS name routed to the tunnel (e.g. `myapp.example.com`)
    #[arg(long)]
    pub hostname: Option<String>,

    /// Local service URL (e.g. `http://localhost:8000`)
    #[arg(long)]
    pub service_url: Option<String>,
}

/// Build the manager for `tunnels_dir` from the stored settings.
pub fn build_manager(settings: &Settings, tunnels_dir: PathBuf) -> Result<Manager> {
    let timeout = settings.command_timeout();
    let registry =
        CloudflaredRegistry::new(settings.cloudflared_bin.clone()).with_timeout(timeout);
    let supervisor = SystemdSupervisor::new()
        .with_sudo(!os::is_root())
        .with_timeout(timeout);
    let run_as = os::current_user()?;
    tracing::debug!(
        "tunnels in {}, services run as {run_as}",
        tunnels_dir.display()
    );
    Ok(
        TunnelManager::new(ConfigStore::new(tunnels_dir), registry, supervisor, run_as)
            .with_client(settings.cloudflared_bin.clone()),
    )
}

/// One CLI session: settings plus the manager built from them.
pub struct App {
    manager: Manager,
    settings: Settings,
    settings_path: PathBuf,
    non_interactive: bool,
}

impl App {
    /// `tunnels_dir` overrides the stored directory for this session only.
    pub fn new(
        settings: Settings,
        settings_path: PathBuf,
        tunnels_dir: Option<PathBuf>,
        non_interactive: bool,
    ) -> Result<Self> {
        let dir = tunnels_dir.unwrap_or_else(|| settings.tunnels_dir.clone());
        Ok(Self {
            manager: build_manager(&settings, dir)?,
            settings,
            settings_path,
            non_interactive,
        })
    }

    pub const fn manager(&self) -> &Manager {
        &self.manager
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    fn tunnels_dir(&self) -> &Path {
        self.manager.store().root()
    }

    /// Use `name` if given, otherwise let the user pick an existing tunnel.
    /// `None` when the user backs out of the picker.
    pub fn pick_tunnel(&self, name: Option<String>, prompt_text: &str) -> Result<Option<String>> {
        if let Some(name) = name {
            return Ok(Some(name));
        }
        if self.non_interactive {
            bail!("a tunnel name is required in non-interactive mode");
        }
        let names: Vec<String> = self.manager.list()?.into_iter().collect();
        if names.is_empty() {
            bail!("no tunnels found in {}", self.tunnels_dir().display());
        }
        prompt::prompt_select_tunnel(prompt_text, &names)
    }

    pub fn create(&self, args: CreateArgs) -> Result<()> {
        let name = prompt::prompt_tunnel_name(self.non_interactive, args.name)?;
        let hostname = prompt::prompt_hostname(self.non_interactive, args.hostname)?;
        let service_url = prompt::prompt_service_url(self.non_interactive, args.service_url)?;

        let outcome = self
            .manager
            .create(&TunnelSpec::new(name, hostname, service_url))?;
        report::created(&outcome);
        Ok(())
    }

    /// Delete a tunnel. Without `yes`, asks first; in non-interactive mode
    /// `yes` is required.
    pub fn delete(&self, name: Option<String>, yes: bool) -> Result<()> {
        let Some(name) = self.pick_tunnel(name, "Tunnel to delete")? else {
            return Ok(());
        };
        let non_interactive = self.non_interactive;
        let outcome = self.manager.delete(&name, |paths: &TunnelPaths| -> Result<bool> {
            if yes {
                return Ok(true);
            }
            if non_interactive {
                bail!("refusing to delete '{name}' without --yes in non-interactive mode");
            }
            prompt::confirm_delete(&name, &paths.dir)
        })?;
        report::deleted(&name, &outcome);
        Ok(())
    }

    pub fn list(&self) -> Result<()> {
        let tunnels = self.manager.overview()?;
        report::overview(self.tunnels_dir(), &tunnels);
        Ok(())
    }

    pub fn status(&self, name: &str) -> Result<()> {
        report::status(&self.manager.status(name)?);
        Ok(())
    }

    pub fn activate(&self, name: &str) -> Result<()> {
        self.manager.activate(name)?;
        report::line(&format!("Service for '{name}' activated."));
        Ok(())
    }

    pub fn deactivate(&self, name: &str) -> Result<()> {
        self.manager.deactivate(name)?;
        report::line(&format!("Service for '{name}' deactivated."));
        Ok(())
    }

    pub fn show_config(&self, name: &str) -> Result<()> {
        let content = self.manager.view_config(name)?;
        report::config(name, &content);
        Ok(())
    }

    /// Browser-based Cloudflare login for `cloudflared`.
    pub fn login(&self) -> Result<()> {
        if self.non_interactive {
            bail!("login needs a browser and cannot run in non-interactive mode");
        }
        self.manager.registry().login()?;
        report::line("Cloudflare login completed.");
        Ok(())
    }

    pub fn show_settings(&self) {
        report::settings(&self.settings_path, &self.settings, self.tunnels_dir());
    }

    /// Persist a new tunnels directory and switch this session to it.
    pub fn set_tunnels_dir(&mut self, dir: &Path) -> Result<()> {
        self.settings.set_tunnels_dir(dir)?;
        self.settings.save(&self.settings_path)?;
        self.manager = self
            .manager
            .clone()
            .with_store(ConfigStore::new(self.settings.tunnels_dir.clone()));
        tracing::info!(
            "tunnel config directory changed to {}",
            self.settings.tunnels_dir.display()
        );
        Ok(())
    }
}
