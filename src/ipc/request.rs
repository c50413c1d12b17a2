//! Request/reply client.
//!
//! Every operation has a fixed positional layout:
//!
//! | command | request | reply |
//! |---|---|---|
//! | `insert_badge` | `sss` app, writable, caller | `i` |
//! | `delete_badge` | `ss` app, caller | `i` |
//! | `set_badge_count` | `ssi` app, caller, count | `i` |
//! | `get_badge_count` | `s` app | `ii` status, count |
//! | `set_disp_option` | `ssi` app, caller, flag | `i` |
//! | `get_disp_option` | `s` app | `ii` status, flag |
//! | `set_noti_property` | `sss` app, property, value | `i` (extra ignored) |
//! | `get_noti_property` | `ss` app, property | `is` status, value |
//! | `service_register` | (none) | `i` |

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::monitor::{ServiceMonitor, ServiceState};
use crate::error::{BadgeError, Result};
use crate::proto::{Arg, Packet};
use crate::transport::{BadgeTransport, BroadcastHandler, TransportError};

/// Operations understood by the badge service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    InsertBadge,
    DeleteBadge,
    SetBadgeCount,
    GetBadgeCount,
    SetDisplayOption,
    GetDisplayOption,
    SetProperty,
    GetProperty,
    ServiceRegister,
}

impl Operation {
    /// Wire command name.
    pub fn command(&self) -> &'static str {
        match self {
            Operation::InsertBadge => "insert_badge",
            Operation::DeleteBadge => "delete_badge",
            Operation::SetBadgeCount => "set_badge_count",
            Operation::GetBadgeCount => "get_badge_count",
            Operation::SetDisplayOption => "set_disp_option",
            Operation::GetDisplayOption => "get_disp_option",
            Operation::SetProperty => "set_noti_property",
            Operation::GetProperty => "get_noti_property",
            Operation::ServiceRegister => "service_register",
        }
    }

    /// Reverse of [`Operation::command`].
    pub fn from_command(command: &str) -> Option<Self> {
        let op = match command {
            "insert_badge" => Operation::InsertBadge,
            "delete_badge" => Operation::DeleteBadge,
            "set_badge_count" => Operation::SetBadgeCount,
            "get_badge_count" => Operation::GetBadgeCount,
            "set_disp_option" => Operation::SetDisplayOption,
            "get_disp_option" => Operation::GetDisplayOption,
            "set_noti_property" => Operation::SetProperty,
            "get_noti_property" => Operation::GetProperty,
            "service_register" | "badge_service_register" => Operation::ServiceRegister,
            _ => return None,
        };
        Some(op)
    }
}

/// One request with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Insert {
        app_id: String,
        writable: String,
        caller: String,
    },
    Delete {
        app_id: String,
        caller: String,
    },
    SetCount {
        app_id: String,
        caller: String,
        count: u32,
    },
    GetCount {
        app_id: String,
    },
    SetDisplay {
        app_id: String,
        caller: String,
        display: bool,
    },
    GetDisplay {
        app_id: String,
    },
    SetProperty {
        app_id: String,
        property: String,
        value: String,
    },
    GetProperty {
        app_id: String,
        property: String,
    },
    ServiceRegister,
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::Insert { .. } => Operation::InsertBadge,
            Request::Delete { .. } => Operation::DeleteBadge,
            Request::SetCount { .. } => Operation::SetBadgeCount,
            Request::GetCount { .. } => Operation::GetBadgeCount,
            Request::SetDisplay { .. } => Operation::SetDisplayOption,
            Request::GetDisplay { .. } => Operation::GetDisplayOption,
            Request::SetProperty { .. } => Operation::SetProperty,
            Request::GetProperty { .. } => Operation::GetProperty,
            Request::ServiceRegister => Operation::ServiceRegister,
        }
    }

    /// Serialize into the operation's positional layout.
    pub fn to_packet(&self) -> Packet {
        let args = match self {
            Request::Insert {
                app_id,
                writable,
                caller,
            } => vec![Arg::str(app_id), Arg::str(writable), Arg::str(caller)],
            Request::Delete { app_id, caller } => vec![Arg::str(app_id), Arg::str(caller)],
            Request::SetCount {
                app_id,
                caller,
                count,
            } => vec![
                Arg::str(app_id),
                Arg::str(caller),
                // unsigned on the client, 32-bit signed on the wire
                Arg::int(*count as i32),
            ],
            Request::GetCount { app_id } | Request::GetDisplay { app_id } => {
                vec![Arg::str(app_id)]
            }
            Request::SetDisplay {
                app_id,
                caller,
                display,
            } => vec![Arg::str(app_id), Arg::str(caller), Arg::int(*display as i32)],
            Request::SetProperty {
                app_id,
                property,
                value,
            } => vec![Arg::str(app_id), Arg::str(property), Arg::str(value)],
            Request::GetProperty { app_id, property } => {
                vec![Arg::str(app_id), Arg::str(property)]
            }
            Request::ServiceRegister => Vec::new(),
        };
        Packet::request(self.operation().command(), args)
    }
}

/// Decoded reply payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
    /// Status-only reply.
    Status,
    Count(u32),
    Display(bool),
    Property(String),
}

/// Decode a reply for `op`. Non-zero status codes are returned verbatim.
pub fn decode_reply(op: Operation, reply: &Packet) -> Result<ReplyPayload> {
    let status = reply.int_at(0).ok_or_else(|| {
        warn!(command = op.command(), signature = %reply.signature(), "Reply without status");
        BadgeError::Io
    })?;
    BadgeError::check(status)?;

    let payload = match op {
        Operation::GetBadgeCount => reply.int_at(1).map(|c| ReplyPayload::Count(c as u32)),
        Operation::GetDisplayOption => match reply.int_at(1) {
            Some(0) => Some(ReplyPayload::Display(false)),
            Some(1) => Some(ReplyPayload::Display(true)),
            _ => None,
        },
        Operation::GetProperty => reply
            .str_at(1)
            .map(|v| ReplyPayload::Property(v.to_string())),
        _ => Some(ReplyPayload::Status),
    };

    payload.ok_or_else(|| {
        warn!(command = op.command(), signature = %reply.signature(), "Malformed reply payload");
        BadgeError::Io
    })
}

/// Sends requests to the service with a bounded wait.
pub struct RequestClient {
    transport: Arc<dyn BadgeTransport>,
    monitor: Arc<ServiceMonitor>,
    timeout: Duration,
    initialized: OnceCell<()>,
}

impl RequestClient {
    pub fn new(
        transport: Arc<dyn BadgeTransport>,
        monitor: Arc<ServiceMonitor>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            monitor,
            timeout,
            initialized: OnceCell::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn ensure_init(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| self.transport.init())
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!(error = %e, "Transport initialization failed");
                BadgeError::Io
            })
    }

    /// Send `request` and wait at most the configured timeout for its reply.
    #[tracing::instrument(name = "badge.request", skip_all, fields(op = request.operation().command()))]
    pub async fn call(&self, request: Request) -> Result<ReplyPayload> {
        self.ensure_init().await?;

        let op = request.operation();
        let outcome = tokio::time::timeout(self.timeout, self.transport.request(request.to_packet())).await;
        let reply = self.settle(outcome)?;
        decode_reply(op, &reply)
    }

    /// Open the broadcast subscription and register with the service.
    #[tracing::instrument(name = "badge.request", skip_all, fields(op = "service_register"))]
    pub async fn subscribe(&self, handler: Arc<dyn BroadcastHandler>) -> Result<()> {
        self.ensure_init().await?;

        let register = Request::ServiceRegister.to_packet();
        let outcome = tokio::time::timeout(self.timeout, self.transport.subscribe(register, handler)).await;
        let reply = match self.settle(outcome) {
            Ok(reply) => reply,
            Err(e) => {
                self.transport.unsubscribe();
                return Err(e);
            }
        };

        if let Err(e) = decode_reply(Operation::ServiceRegister, &reply) {
            self.transport.unsubscribe();
            return Err(e);
        }
        Ok(())
    }

    /// Close the broadcast subscription.
    pub fn unsubscribe(&self) {
        self.transport.unsubscribe();
    }

    /// Turn a bounded transport outcome into a reply or a status.
    fn settle(
        &self,
        outcome: std::result::Result<
            std::result::Result<Packet, TransportError>,
            tokio::time::error::Elapsed,
        >,
    ) -> Result<Packet> {
        match outcome {
            Ok(Ok(reply)) => {
                self.monitor.record(ServiceState::Ready);
                Ok(reply)
            }
            Ok(Err(e)) if e.is_access_denied() => {
                warn!(error = %e, "Service refused the connection");
                Err(BadgeError::PermissionDenied)
            }
            Ok(Err(e)) => {
                if self.monitor.is_ready() {
                    warn!(error = %e, "Request failed");
                    Err(BadgeError::Io)
                } else {
                    debug!(error = %e, "Service not ready");
                    Err(BadgeError::ServiceNotReady)
                }
            }
            Err(_) => {
                if self.monitor.is_ready() {
                    warn!(timeout = ?self.timeout, "Request timed out");
                    Err(BadgeError::Timeout)
                } else {
                    debug!("Service not ready after timeout");
                    Err(BadgeError::ServiceNotReady)
                }
            }
        }
    }
}
