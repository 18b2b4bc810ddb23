use std::path::Path;

use crate::supervisor::UnitSpec;

/// Fallback service for requests whose host matches no ingress rule.
pub const CATCH_ALL_SERVICE: &str = "http_status:404";

/// Generate the tunnel routing config (`config.yml`).
///
/// The catch-all rule must stay last: ingress rules are evaluated in order.
pub fn routing_config(
    name: &str,
    credentials_path: &Path,
    hostname: &str,
    service_url: &str,
) -> String {
    format!(
        r"tunnel: {name}
credentials-file: {credentials}
ingress:
  - hostname: {hostname}
    service: {service_url}
  - service: {CATCH_ALL_SERVICE}
",
        credentials = credentials_path.display(),
    )
}

/// Generate the launch script that runs the tunnel client against a config.
pub fn launch_script(client: &str, config_path: &Path) -> String {
    format!(
        r"#!/bin/bash
exec {client} tunnel --config {config} run
",
        client = shell_quote(client),
        config = shell_quote(&config_path.to_string_lossy()),
    )
}

/// Generate the systemd unit file for a tunnel service.
pub fn systemd_unit(unit: &UnitSpec) -> String {
    format!(
        r"[Unit]
Description={description}
After=network-online.target
Wants=network-online.target

[Service]
ExecStart={exec}
Restart=always
RestartSec=5
User={user}

[Install]
WantedBy=multi-user.target
",
        description = unit.description,
        exec = systemd_quote(&unit.exec_path.to_string_lossy()),
        user = unit.run_as,
    )
}

/// Single-quote a word for POSIX shells unless it is plainly safe.
fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ':'));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Double-quote an `ExecStart=` path when it contains whitespace.
fn systemd_quote(path: &str) -> String {
    if path.contains(char::is_whitespace) {
        format!("\"{}\"", path.replace('\\', r"\\").replace('"', "\\\""))
    } else {
        path.to_string()
    }
}
