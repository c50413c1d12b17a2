//! Badge record store.
//!
//! The service owns the authoritative table; this is the read/write model
//! of it used for existence checks, enumeration, and by in-process service
//! stand-ins.

mod memory;

pub use memory::MemoryBadgeStore;

use std::collections::BTreeSet;

use crate::error::Result;

/// Separator of the writable grantee list on the wire.
pub const GRANTEE_SEPARATOR: char = ' ';

/// One badge as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeRecord {
    pub owner: String,
    pub writable_grantees: BTreeSet<String>,
    pub count: u32,
    pub display: bool,
}

impl BadgeRecord {
    pub fn new(owner: impl Into<String>, writable: &str) -> Self {
        let owner = owner.into();
        let mut writable_grantees = parse_grantees(writable);
        writable_grantees.insert(owner.clone());
        Self {
            owner,
            writable_grantees,
            count: 0,
            display: true,
        }
    }

    /// True if `caller` may modify the badge of `app_id`.
    pub fn writable_by(&self, app_id: &str, caller: &str) -> bool {
        caller == app_id || caller == self.owner || self.writable_grantees.contains(caller)
    }
}

/// Split a wire grantee list into identities.
pub fn parse_grantees(writable: &str) -> BTreeSet<String> {
    writable
        .split(GRANTEE_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join grantees for the wire, putting `caller` first when absent.
pub fn join_grantees(caller: &str, writable: Option<&str>) -> String {
    match writable {
        Some(extra) if !extra.is_empty() => {
            if parse_grantees(extra).contains(caller) {
                extra.to_string()
            } else {
                format!("{caller}{GRANTEE_SEPARATOR}{extra}")
            }
        }
        _ => caller.to_string(),
    }
}

/// Visitor for [`BadgeStore::foreach`].
pub trait ForeachVisitor {
    fn visit(&mut self, app_id: &str, count: u32);
}

impl<F> ForeachVisitor for F
where
    F: FnMut(&str, u32),
{
    fn visit(&mut self, app_id: &str, count: u32) {
        self(app_id, count)
    }
}

/// Badge record lifecycle.
///
/// Outcomes:
/// - `insert` of an existing badge: `AlreadyExists`
/// - any operation on a missing badge: `NotExist`
/// - a write by a caller without a grant: `PermissionDenied`
/// - `foreach` over an empty store: `NotExist`
pub trait BadgeStore: Send + Sync {
    fn insert(&self, app_id: &str, writable: &str, caller: &str) -> Result<()>;

    fn remove(&self, app_id: &str, caller: &str) -> Result<()>;

    fn set_count(&self, app_id: &str, caller: &str, count: u32) -> Result<()>;

    fn get_count(&self, app_id: &str) -> Result<u32>;

    fn set_display(&self, app_id: &str, caller: &str, display: bool) -> Result<()>;

    fn get_display(&self, app_id: &str) -> Result<bool>;

    fn exists(&self, app_id: &str) -> Result<bool>;

    fn foreach(&self, visitor: &mut dyn ForeachVisitor) -> Result<()>;
}
