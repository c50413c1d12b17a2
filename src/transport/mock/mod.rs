//! In-memory badge transport.
//!
//! Scriptable stand-in for the badge service. Requests are answered by a
//! responder closure; broadcasts are pushed by the test through
//! [`MockTransport::broadcast`].

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{BadgeTransport, BroadcastHandler, Result, ServiceLocator, TransportError};
use crate::proto::{Arg, Packet};
use crate::utils::lock;

type Responder = Arc<dyn Fn(&Packet) -> Packet + Send + Sync>;

#[derive(Default)]
struct MockState {
    reachable: bool,
    lookup_error: bool,
    hang: bool,
    init_failure: bool,
    fail_subscribe: bool,
    requests: Vec<Packet>,
    init_count: usize,
    subscribe_count: usize,
    handler: Option<Arc<dyn BroadcastHandler>>,
}

/// Mock transport for testing.
///
/// Starts reachable, answering every request with status 0.
pub struct MockTransport {
    state: Mutex<MockState>,
    responder: Mutex<Responder>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                reachable: true,
                ..MockState::default()
            }),
            responder: Mutex::new(Arc::new(|packet: &Packet| {
                Packet::reply(packet.command.clone(), vec![Arg::int(0)])
            })),
        }
    }

    /// Whether the service answers lookups and requests.
    pub fn set_reachable(&self, reachable: bool) {
        lock(&self.state).reachable = reachable;
    }

    /// Make lookups fail outright.
    pub fn set_lookup_error(&self, fail: bool) {
        lock(&self.state).lookup_error = fail;
    }

    /// Make requests never complete.
    pub fn set_hang(&self, hang: bool) {
        lock(&self.state).hang = hang;
    }

    /// Make `init` fail.
    pub fn set_init_failure(&self, fail: bool) {
        lock(&self.state).init_failure = fail;
    }

    /// Make `subscribe` fail at the transport level.
    pub fn set_fail_subscribe(&self, fail: bool) {
        lock(&self.state).fail_subscribe = fail;
    }

    /// Replace the function that produces replies.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&Packet) -> Packet + Send + Sync + 'static,
    {
        *lock(&self.responder) = Arc::new(responder);
    }

    /// All requests seen so far, including subscription registrations.
    pub fn requests(&self) -> Vec<Packet> {
        lock(&self.state).requests.clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.state).requests.len()
    }

    pub fn init_count(&self) -> usize {
        lock(&self.state).init_count
    }

    pub fn subscribe_count(&self) -> usize {
        lock(&self.state).subscribe_count
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.state).handler.is_some()
    }

    /// Deliver a packet to the current subscriber.
    ///
    /// Returns false if nobody is subscribed.
    pub fn broadcast(&self, packet: Packet) -> bool {
        let handler = lock(&self.state).handler.clone();
        match handler {
            Some(handler) => {
                handler.handle_broadcast(&packet);
                true
            }
            None => false,
        }
    }

    /// End the subscription from the service side, as a crash would.
    ///
    /// Returns false if nobody is subscribed.
    pub fn close_subscription(&self) -> bool {
        let handler = lock(&self.state).handler.take();
        match handler {
            Some(handler) => {
                handler.handle_closed();
                true
            }
            None => false,
        }
    }

    fn respond(&self, packet: &Packet) -> Packet {
        let responder = lock(&self.responder).clone();
        responder(packet)
    }

    fn unreachable_error() -> TransportError {
        TransportError::Connection("mock service unreachable".to_string())
    }
}

#[async_trait]
impl BadgeTransport for MockTransport {
    async fn init(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.init_count += 1;
        if state.init_failure {
            return Err(TransportError::Connection("mock init failure".to_string()));
        }
        Ok(())
    }

    async fn request(&self, packet: Packet) -> Result<Packet> {
        let hang = {
            let mut state = lock(&self.state);
            state.requests.push(packet.clone());
            if !state.reachable {
                return Err(Self::unreachable_error());
            }
            state.hang
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(self.respond(&packet))
    }

    async fn subscribe(
        &self,
        register: Packet,
        handler: Arc<dyn BroadcastHandler>,
    ) -> Result<Packet> {
        {
            let mut state = lock(&self.state);
            state.requests.push(register.clone());
            state.subscribe_count += 1;
            if !state.reachable {
                return Err(Self::unreachable_error());
            }
            if state.fail_subscribe {
                return Err(TransportError::Closed);
            }
        }
        let reply = self.respond(&register);
        lock(&self.state).handler = Some(handler);
        Ok(reply)
    }

    fn unsubscribe(&self) {
        lock(&self.state).handler = None;
    }
}

impl ServiceLocator for MockTransport {
    fn lookup(&self) -> Result<bool> {
        let state = lock(&self.state);
        if state.lookup_error {
            return Err(TransportError::Protocol("mock lookup failure".to_string()));
        }
        Ok(state.reachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize, AtomicUsize);

    impl BroadcastHandler for Counter {
        fn handle_broadcast(&self, _packet: &Packet) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn handle_closed(&self) {
            self.1.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter() -> Arc<Counter> {
        Arc::new(Counter(AtomicUsize::new(0), AtomicUsize::new(0)))
    }

    #[tokio::test]
    async fn test_default_reply_is_ok_status() {
        let mock = MockTransport::new();
        let reply = mock
            .request(Packet::request("delete_badge", vec![]))
            .await
            .unwrap();
        assert_eq!(reply.command, "delete_badge");
        assert_eq!(reply.int_at(0), Some(0));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_fails_requests_and_lookup() {
        let mock = MockTransport::new();
        mock.set_reachable(false);
        assert!(!mock.lookup().unwrap());
        assert!(mock
            .request(Packet::request("get_badge_count", vec![]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscriber_until_unsubscribed() {
        let mock = MockTransport::new();
        let counter = counter();
        assert!(!mock.broadcast(Packet::notify("x", vec![])));

        mock.subscribe(Packet::request("service_register", vec![]), counter.clone())
            .await
            .unwrap();
        assert!(mock.broadcast(Packet::notify("x", vec![])));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        mock.unsubscribe();
        assert!(!mock.is_subscribed());
        assert!(!mock.broadcast(Packet::notify("x", vec![])));
        assert_eq!(counter.1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_close_subscription_notifies_handler() {
        let mock = MockTransport::new();
        let counter = counter();
        assert!(!mock.close_subscription());

        mock.subscribe(Packet::request("service_register", vec![]), counter.clone())
            .await
            .unwrap();
        assert!(mock.close_subscription());
        assert_eq!(counter.1.load(Ordering::SeqCst), 1);
        assert!(!mock.is_subscribed());
    }

    #[test]
    fn test_lookup_error() {
        let mock = MockTransport::new();
        mock.set_lookup_error(true);
        assert!(mock.lookup().is_err());
    }
}
