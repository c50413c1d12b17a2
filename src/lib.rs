//! Badge client
//!
//! Client side of the launcher badge service: per-application unread
//! counts and display flags, proxied to the service over a Unix socket.
//!
//! - [`facade::Badge`]: the API applications call
//! - [`ipc`]: request/reply, change subscription, deferred tasks, readiness
//! - [`transport`]: the socket seam and its mock

pub mod caller;
pub mod config;
pub mod error;
pub mod facade;
pub mod ipc;
pub mod proto;
pub mod setting;
pub mod store;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use config::BadgeConfig;
pub use error::{status_of, BadgeError, Result};
pub use facade::{Badge, BadgeBuilder};
pub use ipc::{BadgeAction, BadgeChange, ChangeListener, DeferredTask, ListenerHandle, TaskHandle};
