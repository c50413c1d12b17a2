//! Change notification subscriber.
//!
//! Fans out the service's badge broadcasts to registered listeners. The
//! transport subscription is open exactly while at least one listener is
//! registered.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::monitor::{Observer, ServiceMonitor, ServiceState};
use super::request::RequestClient;
use super::{run_guarded, same_handle};
use crate::error::{BadgeError, Result};
use crate::proto::Packet;
use crate::transport::BroadcastHandler;
use crate::utils::lock;
use crate::utils::retry::register_delays;

/// Broadcast commands, indexed by the action code each one carries.
pub const NOTIFY_COMMANDS: [&str; 4] = [
    "insert_badge_notify",
    "delete_badge_notify",
    "set_badge_count_notify",
    "set_disp_option_notify",
];
const NOTIFY_SIGNATURE: &str = "isi";

/// What happened to a badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BadgeAction {
    Create = 0,
    Remove = 1,
    Update = 2,
    ChangedDisplay = 3,
    ServiceReady = 4,
}

impl BadgeAction {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(BadgeAction::Create),
            1 => Some(BadgeAction::Remove),
            2 => Some(BadgeAction::Update),
            3 => Some(BadgeAction::ChangedDisplay),
            4 => Some(BadgeAction::ServiceReady),
            _ => None,
        }
    }

    /// The only action a broadcast `command` may carry.
    ///
    /// `ServiceReady` is produced locally and never arrives on the wire.
    pub fn for_notify(command: &str) -> Option<Self> {
        let index = NOTIFY_COMMANDS.iter().position(|c| *c == command)?;
        Self::from_code(index as i32)
    }
}

/// A badge change delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeChange {
    pub action: BadgeAction,
    /// `None` only for [`BadgeAction::ServiceReady`].
    pub app_id: Option<String>,
    /// Count for `Update`, 0/1 display flag for `ChangedDisplay`.
    pub count: u32,
}

impl BadgeChange {
    pub fn service_ready() -> Self {
        Self {
            action: BadgeAction::ServiceReady,
            app_id: None,
            count: 0,
        }
    }

    /// Decode a broadcast packet. Returns `None` for anything malformed.
    pub fn from_packet(packet: &Packet) -> Option<Self> {
        let expected = BadgeAction::for_notify(&packet.command)?;
        if !packet.matches(NOTIFY_SIGNATURE) {
            return None;
        }
        let action = BadgeAction::from_code(packet.int_at(0)?)?;
        if action != expected {
            return None;
        }
        let app_id = packet.str_at(1)?.to_string();
        let value = packet.int_at(2)?;
        if action == BadgeAction::ChangedDisplay && !(value == 0 || value == 1) {
            return None;
        }
        Some(Self {
            action,
            app_id: Some(app_id),
            count: value as u32,
        })
    }
}

/// Receives badge changes.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, change: &BadgeChange);
}

impl<F> ChangeListener for F
where
    F: Fn(&BadgeChange) + Send + Sync,
{
    fn on_change(&self, change: &BadgeChange) {
        self(change)
    }
}

/// Shared handle to a listener. Identity is the allocation.
pub type ListenerHandle = Arc<dyn ChangeListener>;

pub struct ChangeSubscriber {
    requests: Arc<RequestClient>,
    monitor: Arc<ServiceMonitor>,
    listeners: Mutex<Vec<ListenerHandle>>,
    /// Serializes opening the transport subscription.
    activation: AsyncMutex<()>,
    register_attempts: usize,
}

impl ChangeSubscriber {
    pub fn new(
        requests: Arc<RequestClient>,
        monitor: Arc<ServiceMonitor>,
        register_attempts: usize,
    ) -> Self {
        Self {
            requests,
            monitor,
            listeners: Mutex::new(Vec::new()),
            activation: AsyncMutex::new(()),
            register_attempts: register_attempts.max(1),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn as_handler(self: &Arc<Self>) -> Arc<dyn BroadcastHandler> {
        Arc::new(Relay(Arc::downgrade(self)))
    }

    /// Register `listener`, opening the subscription if it is the first.
    ///
    /// A listener that is already registered is replaced in place. If the
    /// subscription cannot be opened the listener is not kept.
    pub async fn register(self: &Arc<Self>, listener: ListenerHandle) -> Result<()> {
        let _activation = self.activation.lock().await;

        let first = {
            let mut listeners = lock(&self.listeners);
            if let Some(slot) = listeners.iter_mut().find(|l| same_handle(&**l, &listener)) {
                *slot = listener;
                debug!("Listener already registered, replaced");
                return Ok(());
            }
            listeners
                .try_reserve(1)
                .map_err(|_| BadgeError::OutOfMemory)?;
            listeners.push(listener.clone());
            listeners.len() == 1
        };

        if first {
            if let Err(e) = self.requests.subscribe(self.as_handler()).await {
                warn!(error = %e, "Failed to subscribe to badge changes");
                lock(&self.listeners).retain(|l| !same_handle(l, &listener));
                return Err(e);
            }
            if !self.settle_activation() {
                return Ok(());
            }
            info!("Subscribed to badge changes");
        }
        Ok(())
    }

    /// Arm the subscription observer unless every listener left while the
    /// subscription was being opened, in which case close it again.
    fn settle_activation(&self) -> bool {
        let listeners = lock(&self.listeners);
        if listeners.is_empty() {
            self.requests.unsubscribe();
            return false;
        }
        self.monitor.arm(Observer::Subscription);
        true
    }

    /// Unregister `listener`, closing the subscription after the last one.
    ///
    /// Safe to call from inside a listener.
    pub fn unregister(&self, listener: &ListenerHandle) -> Result<()> {
        let now_empty = {
            let mut listeners = lock(&self.listeners);
            let index = listeners
                .iter()
                .position(|l| same_handle(l, listener))
                .ok_or(BadgeError::NotExist)?;
            listeners.remove(index);
            listeners.is_empty()
        };

        if now_empty {
            self.requests.unsubscribe();
            self.monitor.disarm(Observer::Subscription);
            info!("Unsubscribed from badge changes");
        }
        Ok(())
    }

    /// Deliver `change` to every listener registered at the time of the call.
    pub fn dispatch(&self, change: &BadgeChange) {
        let snapshot = lock(&self.listeners).clone();
        debug!(action = ?change.action, listeners = snapshot.len(), "Dispatching badge change");
        for listener in snapshot {
            run_guarded("change_listener", || listener.on_change(change));
        }
    }

    /// Re-open the subscription after the service (re)appeared, then tell
    /// listeners the service is ready.
    pub async fn reactivate(self: &Arc<Self>) -> Result<()> {
        {
            let _activation = self.activation.lock().await;
            if lock(&self.listeners).is_empty() {
                return Ok(());
            }

            self.requests.unsubscribe();
            let mut delays = register_delays(self.register_attempts);
            loop {
                let e = match self.requests.subscribe(self.as_handler()).await {
                    Ok(()) => break,
                    Err(e) => e,
                };
                match delays.next() {
                    Some(delay) if e.is_service_unavailable() => {
                        debug!(error = %e, ?delay, "Re-registration failed, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    _ => {
                        warn!(error = %e, "Giving up on re-registration");
                        return Err(e);
                    }
                }
            }
            if !self.settle_activation() {
                return Ok(());
            }
            info!("Re-registered for badge changes");
        }

        self.dispatch(&BadgeChange::service_ready());
        Ok(())
    }

    /// Drop the transport subscription but keep listeners for later.
    pub fn suspend(&self) {
        self.requests.unsubscribe();
    }
}

/// Handler given to the transport. Weak so the transport does not keep the
/// subscriber alive.
struct Relay(Weak<ChangeSubscriber>);

impl BroadcastHandler for Relay {
    fn handle_broadcast(&self, packet: &Packet) {
        if let Some(subscriber) = self.0.upgrade() {
            subscriber.handle_broadcast(packet);
        }
    }

    fn handle_closed(&self) {
        if let Some(subscriber) = self.0.upgrade() {
            subscriber.handle_closed();
        }
    }
}

impl BroadcastHandler for ChangeSubscriber {
    fn handle_broadcast(&self, packet: &Packet) {
        match BadgeChange::from_packet(packet) {
            Some(change) => self.dispatch(&change),
            None => warn!(
                command = %packet.command,
                signature = %packet.signature(),
                "Dropping malformed badge broadcast"
            ),
        }
    }

    /// The service dropped the channel, most likely by exiting. Mark it not
    /// ready so the next successful lookup is an appearance and the
    /// subscription gets re-registered.
    fn handle_closed(&self) {
        warn!("Badge service closed the broadcast channel");
        self.monitor.record(ServiceState::NotReady);
    }
}
