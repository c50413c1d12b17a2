//! Test utilities.
//!
//! `FakeService` turns a [`MockTransport`] into a working badge service
//! backed by a [`MemoryBadgeStore`]: requests are applied to the store and
//! successful writes are broadcast to the subscriber, like the real service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::error::{BadgeError, Result, STATUS_OK};
use crate::ipc::{BadgeAction, BadgeChange, ChangeListener, Operation};
use crate::proto::{Arg, Packet};
use crate::setting::BadgeProperty;
use crate::store::{BadgeStore, MemoryBadgeStore};
use crate::transport::MockTransport;

/// In-process badge service answering through a mock transport.
pub struct FakeService {
    pub mock: Arc<MockTransport>,
    pub store: Arc<MemoryBadgeStore>,
    properties: Mutex<HashMap<(String, String), String>>,
}

impl FakeService {
    /// Create a service and install it as the mock's responder.
    pub fn start() -> Arc<Self> {
        let service = Arc::new(Self {
            mock: Arc::new(MockTransport::new()),
            store: Arc::new(MemoryBadgeStore::new()),
            properties: Mutex::new(HashMap::new()),
        });

        let weak: Weak<Self> = Arc::downgrade(&service);
        service.mock.set_responder(move |packet| match weak.upgrade() {
            Some(service) => service.handle(packet),
            None => Packet::reply(packet.command.clone(), vec![Arg::int(-8)]),
        });
        service
    }

    fn handle(&self, packet: &Packet) -> Packet {
        let command = packet.command.clone();
        let (status, extra) = match self.apply(packet) {
            Ok((extra, notify)) => {
                if let Some(notify) = notify {
                    self.mock.broadcast(notify);
                }
                (STATUS_OK, extra)
            }
            Err(e) => (e.code(), None),
        };

        let mut args = vec![Arg::int(status)];
        args.extend(extra);
        Packet::reply(command, args)
    }

    fn apply(&self, packet: &Packet) -> Result<(Option<Arg>, Option<Packet>)> {
        let op = Operation::from_command(&packet.command).ok_or(BadgeError::InvalidParameter)?;
        let s = |i| packet.str_at(i).ok_or(BadgeError::InvalidParameter);
        let n = |i| packet.int_at(i).ok_or(BadgeError::InvalidParameter);

        match op {
            Operation::InsertBadge => {
                let app_id = s(0)?;
                self.store.insert(app_id, s(1)?, s(2)?)?;
                Ok((None, Some(notify("insert_badge_notify", BadgeAction::Create, app_id, 0))))
            }
            Operation::DeleteBadge => {
                let app_id = s(0)?;
                self.store.remove(app_id, s(1)?)?;
                Ok((None, Some(notify("delete_badge_notify", BadgeAction::Remove, app_id, 0))))
            }
            Operation::SetBadgeCount => {
                let app_id = s(0)?;
                let count = n(2)?;
                self.store.set_count(app_id, s(1)?, count as u32)?;
                Ok((
                    None,
                    Some(notify("set_badge_count_notify", BadgeAction::Update, app_id, count)),
                ))
            }
            Operation::GetBadgeCount => {
                let count = self.store.get_count(s(0)?)?;
                Ok((Some(Arg::int(count as i32)), None))
            }
            Operation::SetDisplayOption => {
                let app_id = s(0)?;
                let flag = n(2)?;
                self.store.set_display(app_id, s(1)?, flag != 0)?;
                Ok((
                    None,
                    Some(notify(
                        "set_disp_option_notify",
                        BadgeAction::ChangedDisplay,
                        app_id,
                        flag,
                    )),
                ))
            }
            Operation::GetDisplayOption => {
                let display = self.store.get_display(s(0)?)?;
                Ok((Some(Arg::int(display as i32)), None))
            }
            Operation::SetProperty => {
                let key = (s(0)?.to_string(), s(1)?.to_string());
                self.properties
                    .lock()
                    .unwrap()
                    .insert(key, s(2)?.to_string());
                Ok((None, None))
            }
            Operation::GetProperty => {
                let property =
                    BadgeProperty::from_name(s(1)?).ok_or(BadgeError::InvalidParameter)?;
                let key = (s(0)?.to_string(), property.name().to_string());
                // unset settings come back empty
                let value = self
                    .properties
                    .lock()
                    .unwrap()
                    .get(&key)
                    .cloned()
                    .unwrap_or_default();
                Ok((Some(Arg::str(value)), None))
            }
            Operation::ServiceRegister => Ok((None, None)),
        }
    }
}

/// Build a broadcast packet.
pub fn notify(command: &str, action: BadgeAction, app_id: &str, value: i32) -> Packet {
    Packet::notify(
        command,
        vec![Arg::int(action.code()), Arg::str(app_id), Arg::int(value)],
    )
}

/// Listener that records every change it sees.
#[derive(Default)]
pub struct RecordingListener {
    changes: Mutex<Vec<BadgeChange>>,
    calls: AtomicUsize,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn changes(&self) -> Vec<BadgeChange> {
        self.changes.lock().unwrap().clone()
    }
}

impl ChangeListener for RecordingListener {
    fn on_change(&self, change: &BadgeChange) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.changes.lock().unwrap().push(change.clone());
    }
}
