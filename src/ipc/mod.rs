//! Client-side IPC core.
//!
//! ```text
//! Badge (facade)
//!    │
//!    ▼
//! BadgeIpcClient ──► RequestClient ──► BadgeTransport ──► service
//!    │                    ▲
//!    ├──► TaskQueue       │
//!    ├──► ChangeSubscriber ◄── broadcasts
//!    └──► ServiceMonitor ◄── ServiceLocator
//! ```
//!
//! Registries (tasks, listeners) are keyed by callback identity: two handles
//! are the same entry iff they point at the same allocation.

pub mod client;
pub mod monitor;
pub mod request;
pub mod subscriber;
pub mod tasks;


use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

pub use client::BadgeIpcClient;
pub use monitor::{Observer, ServiceEvent, ServiceMonitor, ServiceState};
pub use request::{Operation, ReplyPayload, Request, RequestClient};
pub use subscriber::{BadgeAction, BadgeChange, ChangeListener, ChangeSubscriber, ListenerHandle};
pub use tasks::{DeferredTask, TaskHandle, TaskQueue};

/// Identity comparison for callback handles.
///
/// Compares data pointers only, so the same closure reached through
/// different vtables still counts as one entry.
pub(crate) fn same_handle<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Run a caller-supplied callback, containing any panic.
///
/// Returns false if the callback panicked.
pub(crate) fn run_guarded(kind: &'static str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(_) => {
            error!(callback = kind, "Callback panicked");
            false
        }
    }
}
