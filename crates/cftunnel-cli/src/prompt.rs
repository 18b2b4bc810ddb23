use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use dialoguer::{Confirm, Input, Select};

/// Use `value` if given, otherwise ask for it; in non-interactive mode the
/// matching `--flag` is required.
fn text_or_prompt(
    non_interactive: bool,
    value: Option<String>,
    flag: &str,
    prompt: &str,
) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }
    if non_interactive {
        bail!("--{flag} is required in non-interactive mode");
    }
    let value: String = Input::new().with_prompt(prompt).interact_text()?;
    Ok(value)
}

/// Prompt for the tunnel name.
pub fn prompt_tunnel_name(non_interactive: bool, value: Option<String>) -> Result<String> {
    text_or_prompt(non_interactive, value, "name", "Tunnel name")
}

/// Prompt for the public DNS name.
pub fn prompt_hostname(non_interactive: bool, value: Option<String>) -> Result<String> {
    text_or_prompt(
        non_interactive,
        value,
        "hostname",
        "DNS name (e.g. myapp.example.com)",
    )
}

/// Prompt for the local service URL.
pub fn prompt_service_url(non_interactive: bool, value: Option<String>) -> Result<String> {
    text_or_prompt(
        non_interactive,
        value,
        "service-url",
        "Local service URL (e.g. http://localhost:8000)",
    )
}

/// Prompt user to pick one of `names`. `None` when the user backs out.
pub fn prompt_select_tunnel(prompt_text: &str, names: &[String]) -> Result<Option<String>> {
    let selection = Select::new()
        .with_prompt(prompt_text)
        .items(names)
        .default(0)
        .interact_opt()?;
    Ok(selection.and_then(|idx| names.get(idx).cloned()))
}

/// Ask before tearing a tunnel down.
pub fn confirm_delete(name: &str, dir: &Path) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Delete tunnel '{name}'? This stops its service, deletes it from Cloudflare \
             and removes {}",
            dir.display()
        ))
        .default(false)
        .interact()?;
    Ok(confirmed)
}

/// Prompt for a new tunnels directory.
pub fn prompt_directory(current: &Path) -> Result<PathBuf> {
    let dir: String = Input::new()
        .with_prompt("Directory for tunnel configs")
        .default(current.display().to_string())
        .interact_text()?;
    Ok(PathBuf::from(dir))
}

/// Wait for Enter so output stays on screen between menu screens.
pub fn pause() -> Result<()> {
    let _: String = Input::new()
        .with_prompt("Press Enter to continue")
        .allow_empty(true)
        .interact_text()?;
    Ok(())
}
