use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{BadgeRecord, BadgeStore, ForeachVisitor};
use crate::error::{BadgeError, Result};
use crate::utils::lock;

/// In-process badge store, ordered by application id.
#[derive(Default)]
pub struct MemoryBadgeStore {
    records: Mutex<BTreeMap<String, BadgeRecord>>,
}

impl MemoryBadgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    /// Snapshot of one record.
    pub fn record(&self, app_id: &str) -> Option<BadgeRecord> {
        lock(&self.records).get(app_id).cloned()
    }

    fn update<F>(&self, app_id: &str, caller: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut BadgeRecord),
    {
        let mut records = lock(&self.records);
        let record = records.get_mut(app_id).ok_or(BadgeError::NotExist)?;
        if !record.writable_by(app_id, caller) {
            return Err(BadgeError::PermissionDenied);
        }
        f(record);
        Ok(())
    }
}

impl BadgeStore for MemoryBadgeStore {
    fn insert(&self, app_id: &str, writable: &str, caller: &str) -> Result<()> {
        if app_id.is_empty() || caller.is_empty() {
            return Err(BadgeError::InvalidParameter);
        }
        let mut records = lock(&self.records);
        if records.contains_key(app_id) {
            return Err(BadgeError::AlreadyExists);
        }
        records.insert(app_id.to_string(), BadgeRecord::new(caller, writable));
        Ok(())
    }

    fn remove(&self, app_id: &str, caller: &str) -> Result<()> {
        let mut records = lock(&self.records);
        let record = records.get(app_id).ok_or(BadgeError::NotExist)?;
        if !record.writable_by(app_id, caller) {
            return Err(BadgeError::PermissionDenied);
        }
        records.remove(app_id);
        Ok(())
    }

    fn set_count(&self, app_id: &str, caller: &str, count: u32) -> Result<()> {
        self.update(app_id, caller, |r| r.count = count)
    }

    fn get_count(&self, app_id: &str) -> Result<u32> {
        lock(&self.records)
            .get(app_id)
            .map(|r| r.count)
            .ok_or(BadgeError::NotExist)
    }

    fn set_display(&self, app_id: &str, caller: &str, display: bool) -> Result<()> {
        self.update(app_id, caller, |r| r.display = display)
    }

    fn get_display(&self, app_id: &str) -> Result<bool> {
        lock(&self.records)
            .get(app_id)
            .map(|r| r.display)
            .ok_or(BadgeError::NotExist)
    }

    fn exists(&self, app_id: &str) -> Result<bool> {
        Ok(lock(&self.records).contains_key(app_id))
    }

    fn foreach(&self, visitor: &mut dyn ForeachVisitor) -> Result<()> {
        let snapshot: Vec<(String, u32)> = lock(&self.records)
            .iter()
            .map(|(app_id, r)| (app_id.clone(), r.count))
            .collect();
        if snapshot.is_empty() {
            return Err(BadgeError::NotExist);
        }
        for (app_id, count) in &snapshot {
            visitor.visit(app_id, *count);
        }
        Ok(())
    }
}
