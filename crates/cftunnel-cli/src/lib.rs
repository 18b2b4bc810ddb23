//! cftunnel command line: settings, prompts, the interactive menu and the
//! handlers behind each subcommand.

pub mod app;
pub mod menu;
pub mod os;
pub mod prompt;
pub mod report;
pub mod settings;
