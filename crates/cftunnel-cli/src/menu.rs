//! Interactive menu, shown when no subcommand is given.

use anyhow::Result;
use dialoguer::Select;

use crate::app::{App, CreateArgs};
use crate::{prompt, report};

const MAIN_ITEMS: &[&str] = &[
    "Create a new tunnel",
    "Delete a tunnel",
    "Manage a tunnel",
    "Settings",
    "Exit",
];

const MANAGE_ITEMS: &[&str] = &[
    "Activate service",
    "Deactivate service",
    "View config",
    "Back",
];

const SETTINGS_ITEMS: &[&str] = &["Change tunnel config directory", "Cloudflare login", "Back"];

fn select(prompt_text: &str, items: &[&str]) -> Result<Option<usize>> {
    let selection = Select::new()
        .with_prompt(prompt_text)
        .items(items)
        .default(0)
        .interact_opt()?;
    Ok(selection)
}

/// Failed actions are logged and the menu keeps going.
fn report_failure(result: Result<()>) {
    if let Err(e) = result {
        tracing::error!("{e:#}");
    }
}

/// Run the main menu until the user exits.
pub fn run(app: &mut App) -> Result<()> {
    loop {
        report::line("");
        report_failure(app.list());
        report::line("");

        match select("Cloudflare Tunnel Manager", MAIN_ITEMS)? {
            Some(0) => {
                report_failure(app.create(CreateArgs::default()));
                prompt::pause()?;
            }
            Some(1) => {
                report_failure(app.delete(None, false));
                prompt::pause()?;
            }
            Some(2) => manage(app)?,
            Some(3) => settings(app)?,
            _ => return Ok(()),
        }
    }
}

fn manage(app: &App) -> Result<()> {
    let name = match app.pick_tunnel(None, "Select a tunnel") {
        Ok(Some(name)) => name,
        Ok(None) => return Ok(()),
        Err(e) => {
            tracing::error!("{e:#}");
            return prompt::pause();
        }
    };

    loop {
        report::line("");
        report_failure(app.status(&name));

        let result = match select(&format!("Manage '{name}'"), MANAGE_ITEMS)? {
            Some(0) => app.activate(&name),
            Some(1) => app.deactivate(&name),
            Some(2) => app.show_config(&name),
            _ => return Ok(()),
        };
        report_failure(result);
        prompt::pause()?;
    }
}

fn settings(app: &mut App) -> Result<()> {
    loop {
        report::line("");
        app.show_settings();

        match select("Settings", SETTINGS_ITEMS)? {
            Some(0) => {
                let dir = prompt::prompt_directory(&app.settings().tunnels_dir)?;
                report_failure(app.set_tunnels_dir(&dir));
                prompt::pause()?;
            }
            Some(1) => {
                report_failure(app.login());
                prompt::pause()?;
            }
            _ => return Ok(()),
        }
    }
}
