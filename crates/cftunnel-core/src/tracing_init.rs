//! Log setup for `cftunnel`.
//!
//! Progress from the lifecycle steps (`reserved tunnel directory ...`,
//! `reloading systemd daemon`, registry warnings) is written to stderr, so
//! tunnel tables, routing configs and remediation commands printed on stdout
//! can be piped or copied as-is.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter` (`"info"`, or `"debug"` with
/// `--verbose` to see every `cloudflared`/`systemctl` command line).
/// `log_json` switches to one JSON object per line for log collectors.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);

    if log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
