//! Unix domain socket transport.
//!
//! Requests use one connection each (connect, send, read one reply, close).
//! The broadcast subscription keeps a dedicated connection open: the client
//! sends `service_register` on it, reads the reply, and from then on the
//! service pushes notify packets down the same stream.
//!
//! ```text
//! ┌──────────────┐  request/reply (oneshot)  ┌──────────────┐
//! │ BadgeIpc     │──────────────────────────▶│    Badge     │
//! │ Client       │                           │   Service    │
//! │              │◀──────────────────────────│              │
//! └──────────────┘  notify (subscription)    └──────────────┘
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::codec::{read_packet, write_packet};
use super::{BadgeTransport, BroadcastHandler, Result, ServiceLocator, TransportError};
use crate::config::BadgeConfig;
use crate::proto::{Packet, PacketKind};
use crate::utils::lock;

/// `sun_path` capacity minus the terminating NUL.
const MAX_SOCKET_PATH_LEN: usize = 107;

/// Badge transport over a Unix domain socket.
pub struct UdsTransport {
    socket_path: PathBuf,
    /// Reader task of the broadcast connection.
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl UdsTransport {
    /// Create a transport for the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            subscription: Mutex::new(None),
        }
    }

    /// Create a transport from client configuration.
    pub fn from_config(config: &BadgeConfig) -> Self {
        Self::new(config.socket_path.clone())
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// True while a broadcast reader is running.
    pub fn is_subscribed(&self) -> bool {
        lock(&self.subscription)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn connect(&self) -> Result<UnixStream> {
        UnixStream::connect(&self.socket_path)
            .await
            .map_err(TransportError::from_connect)
    }
}

fn expect_reply(packet: Packet, command: &str) -> Result<Packet> {
    if packet.kind() != PacketKind::Reply || packet.command != command {
        return Err(TransportError::Protocol(format!(
            "expected reply to {}, got {:?} {}",
            command,
            packet.kind(),
            packet.command
        )));
    }
    Ok(packet)
}

#[async_trait]
impl BadgeTransport for UdsTransport {
    async fn init(&self) -> Result<()> {
        let len = self.socket_path.as_os_str().len();
        if len == 0 || len > MAX_SOCKET_PATH_LEN {
            return Err(TransportError::Connection(format!(
                "unusable socket path {}",
                self.socket_path.display()
            )));
        }
        debug!(socket = %self.socket_path.display(), "UDS transport initialized");
        Ok(())
    }

    async fn request(&self, packet: Packet) -> Result<Packet> {
        let mut stream = self.connect().await?;
        write_packet(&mut stream, &packet).await?;
        let reply = read_packet(&mut stream).await?;
        expect_reply(reply, &packet.command)
    }

    async fn subscribe(
        &self,
        register: Packet,
        handler: Arc<dyn BroadcastHandler>,
    ) -> Result<Packet> {
        self.unsubscribe();

        let mut stream = self.connect().await?;
        write_packet(&mut stream, &register).await?;
        let reply = expect_reply(read_packet(&mut stream).await?, &register.command)?;

        let socket = self.socket_path.clone();
        let handle = tokio::spawn(async move {
            loop {
                match read_packet(&mut stream).await {
                    Ok(packet) if packet.kind() == PacketKind::Notify => {
                        handler.handle_broadcast(&packet);
                    }
                    Ok(packet) => {
                        debug!(command = %packet.command, "Ignoring non-notify packet on broadcast channel");
                    }
                    Err(TransportError::Closed) => {
                        info!(socket = %socket.display(), "Broadcast channel closed by service");
                        break;
                    }
                    Err(e) => {
                        warn!(socket = %socket.display(), error = %e, "Broadcast channel failed");
                        break;
                    }
                }
            }
            handler.handle_closed();
        });

        *lock(&self.subscription) = Some(handle);
        info!(socket = %self.socket_path.display(), "Broadcast channel opened");
        Ok(reply)
    }

    fn unsubscribe(&self) {
        if let Some(handle) = lock(&self.subscription).take() {
            handle.abort();
            debug!(socket = %self.socket_path.display(), "Broadcast channel closed");
        }
    }
}

impl ServiceLocator for UdsTransport {
    /// Connect and hang up. A socket file left behind by a dead service refuses
    /// the connection and reads as not ready.
    fn lookup(&self) -> Result<bool> {
        match std::os::unix::net::UnixStream::connect(&self.socket_path) {
            Ok(_) => Ok(true),
            // the service is there; the request path reports the denial
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Ok(true),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::InvalidInput
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

impl Drop for UdsTransport {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
