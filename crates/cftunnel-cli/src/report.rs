//! Human-readable output on stdout. Progress and warnings go through
//! `tracing` to stderr.

use std::path::Path;

use cftunnel_core::{
    Activation, CreateOutcome, DeleteOutcome, Remediation, ServiceState, TunnelStatus,
};

use crate::settings::Settings;

#[allow(clippy::print_stdout)]
pub fn created(outcome: &CreateOutcome) {
    let tunnel = &outcome.tunnel;
    println!();
    println!("Tunnel '{}' created ({}).", tunnel.name, outcome.state());
    println!();
    println!("  Hostname:      {}", tunnel.hostname);
    println!("  Service:       {}", tunnel.service_url);
    println!("  Config:        {}", tunnel.paths.config.display());
    println!("  Launch script: {}", tunnel.paths.launch_script.display());
    println!("  Credentials:   {}", tunnel.credentials_path.display());
    println!("  Unit:          {}", tunnel.unit_name);
    println!();

    if let Activation::ManualStepsRequired(fix) = &outcome.activation {
        manual_steps(fix);
    }
}

#[allow(clippy::print_stdout)]
fn manual_steps(fix: &Remediation) {
    println!("---");
    println!("Could not install the systemd service due to permission errors.");
    println!(
        "Run the following commands with sudo to complete the setup ({}):",
        fix.unit_path.display()
    );
    println!();
    for command in &fix.commands {
        println!("{command}");
    }
    println!("---");
}

#[allow(clippy::print_stdout)]
pub fn deleted(name: &str, outcome: &DeleteOutcome) {
    match outcome {
        DeleteOutcome::NotFound => println!("Tunnel '{name}' not found."),
        DeleteOutcome::Cancelled => println!("Deletion cancelled."),
        DeleteOutcome::Deleted(report) => {
            let warnings = report.warnings();
            if warnings.is_empty() {
                println!("Tunnel '{name}' deleted successfully.");
            } else {
                println!("Tunnel '{name}' deleted with warnings:");
                for warning in &warnings {
                    println!("  - {warning}");
                }
            }
        }
    }
}

fn state_label(state: ServiceState) -> &'static str {
    match state {
        ServiceState::Active => "● active",
        ServiceState::Inactive => "● inactive",
        ServiceState::Unknown => "? unknown",
    }
}

#[allow(clippy::print_stdout)]
pub fn overview(root: &Path, tunnels: &[TunnelStatus]) {
    if tunnels.is_empty() {
        println!("No tunnels found in {}.", root.display());
        return;
    }
    let width = tunnels
        .iter()
        .map(|t| t.name.len())
        .max()
        .unwrap_or(0)
        .max("TUNNEL".len());
    println!("{:<width$}  {:<10}  UNIT", "TUNNEL", "SERVICE");
    for tunnel in tunnels {
        println!(
            "{:<width$}  {:<10}  {}",
            tunnel.name,
            state_label(tunnel.service),
            tunnel.unit_name
        );
    }
}

#[allow(clippy::print_stdout)]
pub fn status(status: &TunnelStatus) {
    println!("Tunnel:    {}", status.name);
    println!("Service:   {} ({})", state_label(status.service), status.unit_name);
    if status.service == ServiceState::Unknown {
        println!("           could not query systemctl; is it installed?");
    }
    println!("Directory: {}", status.paths.dir.display());
    println!("Config:    {}", status.paths.config.display());
}

#[allow(clippy::print_stdout)]
pub fn config(name: &str, content: &str) {
    println!("# {name}");
    print!("{content}");
    if !content.ends_with('\n') {
        println!();
    }
}

#[allow(clippy::print_stdout)]
pub fn settings(path: &Path, settings: &Settings, effective_dir: &Path) {
    println!("Settings file:   {}", path.display());
    println!("Tunnels dir:     {}", settings.tunnels_dir.display());
    if effective_dir != settings.tunnels_dir {
        println!("  (this run:     {})", effective_dir.display());
    }
    println!("cloudflared:     {}", settings.cloudflared_bin);
    match settings.command_timeout() {
        Some(timeout) => println!("Command timeout: {}s", timeout.as_secs()),
        None => println!("Command timeout: none"),
    }
}

#[allow(clippy::print_stdout)]
pub fn line(message: &str) {
    println!("{message}");
}
