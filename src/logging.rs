//! logging
//!
//! Structured logging to stderr, so CI log streams carry the failure reason
//! while stdout stays free for command output.
//!
//! `RUST_LOG` takes precedence. Otherwise the level follows the global
//! flags: `--debug` shows debug events, `--quiet` only warnings and errors.

use tracing_subscriber::EnvFilter;

use crate::ui::output::Verbosity;

/// Default filter directive for a verbosity.
pub fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Normal => "info",
        Verbosity::Debug => "simplepub=debug,info",
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_follow_verbosity() {
        assert_eq!(default_directive(Verbosity::Quiet), "warn");
        assert_eq!(default_directive(Verbosity::Normal), "info");
        assert!(default_directive(Verbosity::Debug).contains("debug"));
    }
}
