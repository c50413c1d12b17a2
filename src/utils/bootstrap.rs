//! Bootstrap utilities for processes embedding the badge client.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LOG_ENV_VAR;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing with the BADGE_LOG environment variable.
///
/// Defaults to "info" level if BADGE_LOG is not set. The library itself
/// never installs a subscriber; call this from the host process.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Same as [`init_tracing`] but tolerates an already-installed subscriber.
///
/// Returns false when another subscriber was set first.
pub fn try_init_tracing() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_refused() {
        try_init_tracing();
        assert!(!try_init_tracing());
    }
}
