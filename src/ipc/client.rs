//! Owning context for the IPC core.
//!
//! One `BadgeIpcClient` holds the task queue, the listener set, the monitor
//! and the request client, and routes readiness events between them. Hosts
//! construct it once and share it behind an `Arc`.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::monitor::{Observer, ServiceEvent, ServiceMonitor, ServiceState};
use super::request::{ReplyPayload, Request, RequestClient};
use super::subscriber::{ChangeSubscriber, ListenerHandle};
use super::tasks::{TaskHandle, TaskQueue};
use crate::config::BadgeConfig;
use crate::error::Result;
use crate::transport::{BadgeTransport, ServiceLocator};

pub struct BadgeIpcClient {
    monitor: Arc<ServiceMonitor>,
    requests: Arc<RequestClient>,
    tasks: TaskQueue,
    subscriber: Arc<ChangeSubscriber>,
}

impl BadgeIpcClient {
    pub fn new(
        transport: Arc<dyn BadgeTransport>,
        locator: Arc<dyn ServiceLocator>,
        config: &BadgeConfig,
    ) -> Self {
        let monitor = Arc::new(ServiceMonitor::new(locator));
        let requests = Arc::new(RequestClient::new(
            transport,
            monitor.clone(),
            config.request_timeout(),
        ));
        let tasks = TaskQueue::new(monitor.clone());
        let subscriber = Arc::new(ChangeSubscriber::new(
            requests.clone(),
            monitor.clone(),
            config.register_attempts,
        ));

        Self {
            monitor,
            requests,
            tasks,
            subscriber,
        }
    }

    pub fn monitor(&self) -> &ServiceMonitor {
        &self.monitor
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    pub fn subscriber(&self) -> &Arc<ChangeSubscriber> {
        &self.subscriber
    }

    /// Synchronous readiness check.
    pub fn is_ready(&self) -> bool {
        self.monitor.is_ready()
    }

    pub async fn call(&self, request: Request) -> Result<ReplyPayload> {
        self.requests.call(request).await
    }

    pub fn add_task(&self, task: TaskHandle) -> Result<()> {
        self.tasks.enqueue(task)
    }

    pub fn remove_task(&self, task: &TaskHandle) -> Result<()> {
        self.tasks.remove(task)
    }

    pub async fn register_listener(&self, listener: ListenerHandle) -> Result<()> {
        self.subscriber.register(listener).await
    }

    pub fn unregister_listener(&self, listener: &ListenerHandle) -> Result<()> {
        self.subscriber.unregister(listener)
    }

    /// React to the service appearing or vanishing.
    ///
    /// On appearance the subscription is re-registered first, then queued
    /// tasks run. On disappearance queued tasks stay queued and the
    /// subscription is dropped until the next appearance.
    pub async fn handle_service_event(&self, event: ServiceEvent) {
        self.monitor.apply(event);

        match event {
            ServiceEvent::Appeared => {
                if self.monitor.is_armed(Observer::Subscription) {
                    if let Err(e) = self.subscriber.reactivate().await {
                        warn!(error = %e, "Failed to re-register for badge changes");
                        // next successful lookup retries
                        self.monitor.record(ServiceState::NotReady);
                    }
                }
                if self.monitor.is_armed(Observer::Tasks) {
                    self.tasks.drain_and_run();
                }
            }
            ServiceEvent::Vanished => {
                if self.monitor.is_armed(Observer::Subscription) {
                    self.subscriber.suspend();
                }
            }
        }
    }

    /// Poll the service locator every `interval` and turn readiness edges
    /// into [`ServiceEvent`]s.
    ///
    /// Polls only while some observer is armed. A `NotReady` recorded between
    /// ticks, for instance by the service closing the broadcast channel,
    /// counts as a drop, so a restart faster than one interval is still
    /// seen as an appearance. The task ends once the client is dropped.
    pub fn spawn_watcher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let client: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_seen: Option<bool> = None;

            loop {
                ticker.tick().await;
                let Some(client) = client.upgrade() else {
                    debug!("Badge client dropped, readiness watcher exiting");
                    break;
                };

                if !client.monitor.has_observers() {
                    last_seen = None;
                    continue;
                }

                let recorded = client.monitor.state() == ServiceState::Ready;
                let was_ready = last_seen.map_or(recorded, |seen| seen && recorded);
                let ready = client.monitor.is_ready();
                last_seen = Some(ready);

                match (was_ready, ready) {
                    (false, true) => client.handle_service_event(ServiceEvent::Appeared).await,
                    (true, false) => client.handle_service_event(ServiceEvent::Vanished).await,
                    _ => {}
                }
            }
        })
    }
}
