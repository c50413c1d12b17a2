//! Transport seam between the badge client core and the badge service.
//!
//! The core never touches sockets directly. It talks to:
//! - [`BadgeTransport`]: request/reply and the broadcast subscription
//! - [`ServiceLocator`]: side-effect free "is the service there?" lookup
//!
//! Implementations:
//! - `UdsTransport`: Unix domain socket, length-prefixed packets
//! - `MockTransport`: in-memory, scriptable, for tests and embedding

use std::sync::Arc;

use async_trait::async_trait;

use crate::proto::Packet;

pub mod codec;
pub mod mock;
pub mod uds;

pub use mock::MockTransport;
pub use uds::UdsTransport;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur below the request client.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Connection closed by service")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode failed: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Classify a socket error the way the request client cares about.
    pub fn from_connect(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::PermissionDenied => TransportError::AccessDenied(err.to_string()),
            ErrorKind::NotFound | ErrorKind::ConnectionRefused => {
                TransportError::Connection(err.to_string())
            }
            _ => TransportError::Io(err),
        }
    }

    /// True if the service rejected us for lack of privilege.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, TransportError::AccessDenied(_))
    }
}

/// Receiver for unsolicited packets from the service.
///
/// Called on the transport's delivery path; must not block.
pub trait BroadcastHandler: Send + Sync {
    fn handle_broadcast(&self, packet: &Packet);

    /// The service ended the channel. Not called after `unsubscribe`.
    fn handle_closed(&self) {}
}

/// Request/reply and subscription access to the badge service.
#[async_trait]
pub trait BadgeTransport: Send + Sync {
    /// One-time setup, run lazily before the first request.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Send one request and wait for its reply.
    ///
    /// Deadlines are enforced by the caller; implementations may wait forever.
    async fn request(&self, packet: Packet) -> Result<Packet>;

    /// Open the broadcast channel.
    ///
    /// Sends `register` on the channel, returns the service's reply to it, and
    /// from then on feeds every notify packet to `handler`. Replaces any
    /// previous subscription.
    async fn subscribe(
        &self,
        register: Packet,
        handler: Arc<dyn BroadcastHandler>,
    ) -> Result<Packet>;

    /// Close the broadcast channel. No-op if none is open.
    fn unsubscribe(&self);
}

/// Name lookup for the badge service.
pub trait ServiceLocator: Send + Sync {
    /// Returns whether the service currently answers at its address.
    ///
    /// `Err` means the lookup itself could not be performed.
    fn lookup(&self) -> Result<bool>;
}
