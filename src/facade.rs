//! Badge facade for application code.
//!
//! Thin entry points over the IPC core: validate arguments, resolve the
//! caller for writes, then hand off to the request client, the listener set
//! or the deferred task queue.
//!
//! # Example
//!
//! ```ignore
//! use badge_client::{Badge, BadgeConfig};
//!
//! let badge = Badge::builder(BadgeConfig::load(None)?).build();
//! let _watcher = badge.spawn_watcher();
//!
//! badge.create("org.example.mail", None).await?;
//! badge.set_count("org.example.mail", 3).await?;
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::caller::{resolver_for, CallerResolver, FixedCaller};
use crate::config::BadgeConfig;
use crate::error::{BadgeError, Result};
use crate::ipc::{BadgeIpcClient, ListenerHandle, ReplyPayload, Request, TaskHandle};
use crate::setting::BadgeProperty;
use crate::store::{join_grantees, BadgeStore, ForeachVisitor};
use crate::transport::{BadgeTransport, MockTransport, ServiceLocator, UdsTransport};

/// Builder for [`Badge`].
pub struct BadgeBuilder {
    config: BadgeConfig,
    transport: Option<Arc<dyn BadgeTransport>>,
    locator: Option<Arc<dyn ServiceLocator>>,
    store: Option<Arc<dyn BadgeStore>>,
    caller: Option<Arc<dyn CallerResolver>>,
}

impl BadgeBuilder {
    pub fn new(config: BadgeConfig) -> Self {
        Self {
            config,
            transport: None,
            locator: None,
            store: None,
            caller: None,
        }
    }

    /// Use `transport` for requests and subscriptions.
    pub fn with_transport(mut self, transport: Arc<dyn BadgeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use `locator` for readiness lookups.
    pub fn with_locator(mut self, locator: Arc<dyn ServiceLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Use one mock for both transport and lookups.
    pub fn with_mock(self, mock: Arc<MockTransport>) -> Self {
        self.with_transport(mock.clone()).with_locator(mock)
    }

    /// Store backing `foreach`. Without one `foreach` fails with `FromStore`.
    pub fn with_store(mut self, store: Arc<dyn BadgeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_caller(mut self, caller: Arc<dyn CallerResolver>) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Shorthand for a fixed caller identity.
    pub fn with_caller_id(self, caller: impl Into<String>) -> Self {
        self.with_caller(Arc::new(FixedCaller(caller.into())))
    }

    /// Build the facade. Missing parts default to the Unix socket transport
    /// at the configured path and the configured or process caller.
    pub fn build(self) -> Badge {
        let uds = Arc::new(UdsTransport::from_config(&self.config));
        let transport: Arc<dyn BadgeTransport> = match self.transport {
            Some(transport) => transport,
            None => uds.clone(),
        };
        let locator: Arc<dyn ServiceLocator> = match self.locator {
            Some(locator) => locator,
            None => uds,
        };
        let caller = self.caller.unwrap_or_else(|| resolver_for(&self.config));

        let ipc = Arc::new(BadgeIpcClient::new(transport, locator, &self.config));

        Badge {
            ipc,
            store: self.store,
            caller,
            config: self.config,
        }
    }
}

/// Per-process badge API.
pub struct Badge {
    ipc: Arc<BadgeIpcClient>,
    store: Option<Arc<dyn BadgeStore>>,
    caller: Arc<dyn CallerResolver>,
    config: BadgeConfig,
}

fn require(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(BadgeError::InvalidParameter);
    }
    Ok(())
}

fn unexpected(payload: ReplyPayload) -> BadgeError {
    debug!(?payload, "Unexpected reply payload");
    BadgeError::Io
}

impl Badge {
    pub fn builder(config: BadgeConfig) -> BadgeBuilder {
        BadgeBuilder::new(config)
    }

    pub fn config(&self) -> &BadgeConfig {
        &self.config
    }

    /// The IPC core behind this facade.
    pub fn ipc(&self) -> &Arc<BadgeIpcClient> {
        &self.ipc
    }

    /// Start the readiness watcher at the configured interval.
    pub fn spawn_watcher(&self) -> JoinHandle<()> {
        self.ipc.spawn_watcher(self.config.watch_interval())
    }

    fn caller(&self) -> Result<String> {
        self.caller.resolve().ok_or(BadgeError::InvalidCaller)
    }

    async fn send(&self, request: Request) -> Result<()> {
        match self.ipc.call(request).await? {
            ReplyPayload::Status => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    // ========================================================================
    // Badge records
    // ========================================================================

    /// Create a badge for `app_id`. The caller is always a writable grantee;
    /// `writable` adds another.
    pub async fn create(&self, app_id: &str, writable: Option<&str>) -> Result<()> {
        require(app_id)?;
        let caller = self.caller()?;
        let writable = join_grantees(&caller, writable);
        self.send(Request::Insert {
            app_id: app_id.to_string(),
            writable,
            caller,
        })
        .await
    }

    pub async fn remove(&self, app_id: &str) -> Result<()> {
        require(app_id)?;
        let caller = self.caller()?;
        self.send(Request::Delete {
            app_id: app_id.to_string(),
            caller,
        })
        .await
    }

    pub async fn set_count(&self, app_id: &str, count: u32) -> Result<()> {
        require(app_id)?;
        let caller = self.caller()?;
        self.send(Request::SetCount {
            app_id: app_id.to_string(),
            caller,
            count,
        })
        .await
    }

    pub async fn get_count(&self, app_id: &str) -> Result<u32> {
        require(app_id)?;
        match self
            .ipc
            .call(Request::GetCount {
                app_id: app_id.to_string(),
            })
            .await?
        {
            ReplyPayload::Count(count) => Ok(count),
            other => Err(unexpected(other)),
        }
    }

    pub async fn set_display(&self, app_id: &str, display: bool) -> Result<()> {
        require(app_id)?;
        let caller = self.caller()?;
        self.send(Request::SetDisplay {
            app_id: app_id.to_string(),
            caller,
            display,
        })
        .await
    }

    pub async fn get_display(&self, app_id: &str) -> Result<bool> {
        require(app_id)?;
        match self
            .ipc
            .call(Request::GetDisplay {
                app_id: app_id.to_string(),
            })
            .await?
        {
            ReplyPayload::Display(display) => Ok(display),
            other => Err(unexpected(other)),
        }
    }

    /// Whether the service holds a badge for `app_id`.
    pub async fn exists(&self, app_id: &str) -> Result<bool> {
        match self.get_count(app_id).await {
            Ok(_) => Ok(true),
            Err(BadgeError::NotExist) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Visit every badge in the attached store. `NotExist` if there are none.
    ///
    /// The service has no enumeration request, so without a store this
    /// fails with `FromStore`.
    pub fn foreach(&self, visitor: &mut dyn ForeachVisitor) -> Result<()> {
        match &self.store {
            Some(store) => store.foreach(visitor),
            None => {
                warn!("No badge store attached, cannot enumerate badges");
                Err(BadgeError::FromStore)
            }
        }
    }

    // ========================================================================
    // Change notifications
    // ========================================================================

    pub async fn register_changed(&self, listener: ListenerHandle) -> Result<()> {
        self.ipc.register_listener(listener).await
    }

    pub fn unregister_changed(&self, listener: &ListenerHandle) -> Result<()> {
        self.ipc.unregister_listener(listener)
    }

    // ========================================================================
    // Readiness and deferred work
    // ========================================================================

    pub fn is_service_ready(&self) -> bool {
        self.ipc.is_ready()
    }

    /// Run `task` once the service next becomes ready.
    pub fn add_deferred_task(&self, task: TaskHandle) -> Result<()> {
        self.ipc.add_task(task)
    }

    pub fn remove_deferred_task(&self, task: &TaskHandle) -> Result<()> {
        self.ipc.remove_task(task)
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub async fn setting_property_set(
        &self,
        app_id: &str,
        property: &str,
        value: &str,
    ) -> Result<()> {
        require(app_id)?;
        require(value)?;
        let property = BadgeProperty::from_name(property).ok_or(BadgeError::InvalidParameter)?;
        self.send(Request::SetProperty {
            app_id: app_id.to_string(),
            property: property.name().to_string(),
            value: value.to_string(),
        })
        .await
    }

    pub async fn setting_property_get(&self, app_id: &str, property: &str) -> Result<String> {
        require(app_id)?;
        let property = BadgeProperty::from_name(property).ok_or(BadgeError::InvalidParameter)?;
        match self
            .ipc
            .call(Request::GetProperty {
                app_id: app_id.to_string(),
                property: property.name().to_string(),
            })
            .await?
        {
            ReplyPayload::Property(value) if value.is_empty() => {
                Ok(property.default_value().to_string())
            }
            ReplyPayload::Property(value) => Ok(value),
            other => Err(unexpected(other)),
        }
    }
}
