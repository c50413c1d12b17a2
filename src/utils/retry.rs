//! Backoff for re-registering the broadcast subscription.
//!
//! Uses `backon` for exponential backoff with jitter. Requests themselves are
//! never retried; only the subscription handshake that follows a service
//! (re)appearance is, because the service may still be finishing its own
//! startup when its socket shows up.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

/// Backoff for the broadcast registration handshake.
///
/// - Min delay: 50ms
/// - Max delay: 1s
/// - Max attempts: `attempts` (first try included)
/// - Jitter enabled
pub fn register_backoff(attempts: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(1))
        .with_max_times(attempts.saturating_sub(1))
        .with_jitter()
}

/// Delays to sleep between attempts, in order.
pub fn register_delays(attempts: usize) -> impl Iterator<Item = Duration> {
    register_backoff(attempts).build()
}
