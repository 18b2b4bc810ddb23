use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use cftunnel_cli::app::{App, CreateArgs};
use cftunnel_cli::settings::Settings;

/// Provision Cloudflare tunnels as systemd services.
#[derive(Debug, Parser)]
#[command(name = "cftunnel", version, about)]
struct Cli {
    /// Run without interactive prompts (use CLI flags)
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Show debug logs, including every external command line
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: ~/.cftunnel/settings.json)
    #[arg(long = "settings", global = true, value_name = "PATH")]
    settings_file: Option<PathBuf>,

    /// Use this tunnels directory for this run without saving it
    #[arg(long, global = true, value_name = "DIR")]
    tunnels_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register a tunnel, write its config and start it as a service
    Create(CreateArgs),
    /// Stop the service, delete the tunnel from Cloudflare and remove its files
    Delete {
        name: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List tunnels with their service state
    List,
    /// Show the service state of one tunnel
    Status { name: Option<String> },
    /// Enable and start a tunnel's service
    Activate { name: Option<String> },
    /// Disable and stop a tunnel's service
    Deactivate { name: Option<String> },
    /// Print a tunnel's routing config
    Config { name: Option<String> },
    /// Log in to Cloudflare with `cloudflared tunnel login`
    Login,
    /// Show or change stored settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    /// Print the current settings
    Show,
    /// Change the directory tunnel configs are kept in
    SetDir { dir: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    cftunnel_core::tracing_init::init_tracing(default_filter, cli.log_json);

    let settings_path = match cli.settings_file {
        Some(path) => path,
        None => Settings::default_path().context("cannot determine home directory")?,
    };
    let settings = Settings::load(&settings_path);
    let mut app = App::new(settings, settings_path, cli.tunnels_dir, cli.non_interactive)?;

    let Some(command) = cli.command else {
        if cli.non_interactive {
            bail!("a subcommand is required in non-interactive mode");
        }
        return cftunnel_cli::menu::run(&mut app);
    };

    match command {
        Commands::Create(args) => app.create(args)?,
        Commands::Delete { name, yes } => app.delete(name, yes)?,
        Commands::List => app.list()?,
        Commands::Status { name } => with_tunnel(&app, name, App::status)?,
        Commands::Activate { name } => with_tunnel(&app, name, App::activate)?,
        Commands::Deactivate { name } => with_tunnel(&app, name, App::deactivate)?,
        Commands::Config { name } => with_tunnel(&app, name, App::show_config)?,
        Commands::Login => app.login()?,
        Commands::Settings(SettingsCommand::Show) => app.show_settings(),
        Commands::Settings(SettingsCommand::SetDir { dir }) => app.set_tunnels_dir(&dir)?,
    }

    Ok(())
}

/// Resolve the tunnel name (prompting if missing) and run `action` on it.
fn with_tunnel(
    app: &App,
    name: Option<String>,
    action: fn(&App, &str) -> Result<()>,
) -> Result<()> {
    match app.pick_tunnel(name, "Select a tunnel")? {
        Some(name) => action(app, &name),
        None => Ok(()),
    }
}
