//! Service availability monitor.
//!
//! Tracks whether the badge service is reachable and which components are
//! waiting to hear about it coming back.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::transport::ServiceLocator;
use crate::utils::lock;

/// Last known reachability of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    NotReady,
    Ready,
}

/// Components that observe readiness changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observer {
    /// Deferred task queue is waiting to drain.
    Tasks,
    /// Change subscription must be re-registered on appearance.
    Subscription,
}

/// Asynchronous readiness notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEvent {
    Appeared,
    Vanished,
}

#[derive(Debug, Default)]
struct Armed {
    tasks: bool,
    subscription: bool,
}

impl Armed {
    fn slot(&mut self, observer: Observer) -> &mut bool {
        match observer {
            Observer::Tasks => &mut self.tasks,
            Observer::Subscription => &mut self.subscription,
        }
    }
}

pub struct ServiceMonitor {
    locator: Arc<dyn ServiceLocator>,
    state: Mutex<ServiceState>,
    armed: Mutex<Armed>,
}

impl ServiceMonitor {
    pub fn new(locator: Arc<dyn ServiceLocator>) -> Self {
        Self {
            locator,
            state: Mutex::new(ServiceState::NotReady),
            armed: Mutex::new(Armed::default()),
        }
    }

    /// Look the service up now and record the outcome.
    ///
    /// Fails closed: a lookup that cannot be performed reads as not ready.
    pub fn is_ready(&self) -> bool {
        let ready = match self.locator.lookup() {
            Ok(ready) => ready,
            Err(e) => {
                warn!(error = %e, "Service lookup failed, treating as not ready");
                false
            }
        };
        self.record(if ready {
            ServiceState::Ready
        } else {
            ServiceState::NotReady
        });
        ready
    }

    /// Last recorded state, without a lookup.
    pub fn state(&self) -> ServiceState {
        *lock(&self.state)
    }

    /// Record a state learned elsewhere (a reply, a subscription).
    pub fn record(&self, state: ServiceState) {
        let previous = std::mem::replace(&mut *lock(&self.state), state);
        if previous != state {
            debug!(?previous, ?state, "Service state changed");
        }
    }

    /// Apply an appeared/vanished event to the state.
    pub fn apply(&self, event: ServiceEvent) {
        let state = match event {
            ServiceEvent::Appeared => ServiceState::Ready,
            ServiceEvent::Vanished => ServiceState::NotReady,
        };
        info!(?event, "Badge service availability changed");
        self.record(state);
    }

    /// Start observing readiness for `observer`. Returns false if already armed.
    pub fn arm(&self, observer: Observer) -> bool {
        let mut armed = lock(&self.armed);
        let slot = armed.slot(observer);
        if *slot {
            return false;
        }
        *slot = true;
        debug!(?observer, "Readiness observer armed");
        true
    }

    /// Stop observing readiness for `observer`. Returns false if not armed.
    pub fn disarm(&self, observer: Observer) -> bool {
        let mut armed = lock(&self.armed);
        let slot = armed.slot(observer);
        if !*slot {
            return false;
        }
        *slot = false;
        debug!(?observer, "Readiness observer disarmed");
        true
    }

    pub fn is_armed(&self, observer: Observer) -> bool {
        *lock(&self.armed).slot(observer)
    }

    /// True if anything is waiting on readiness changes.
    pub fn has_observers(&self) -> bool {
        let armed = lock(&self.armed);
        armed.tasks || armed.subscription
    }
}
