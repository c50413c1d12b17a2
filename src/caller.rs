//! Caller identity resolution.
//!
//! The service authorizes writes by the identity the client reports, so
//! every mutating request carries one.

use std::sync::Arc;

use tracing::warn;

use crate::config::BadgeConfig;

const CMDLINE_PATH: &str = "/proc/self/cmdline";

/// Produces the identity of the calling application.
pub trait CallerResolver: Send + Sync {
    /// `None` if the identity cannot be determined.
    fn resolve(&self) -> Option<String>;
}

/// Identity of the current process: its first command-line argument.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCaller;

impl ProcessCaller {
    fn from_cmdline() -> Option<String> {
        let raw = std::fs::read(CMDLINE_PATH).ok()?;
        let first = raw.split(|b| *b == 0).next()?;
        if first.is_empty() {
            return None;
        }
        String::from_utf8(first.to_vec()).ok()
    }

    fn from_exe() -> Option<String> {
        let exe = std::env::current_exe().ok()?;
        exe.file_name()?.to_str().map(str::to_string)
    }
}

impl CallerResolver for ProcessCaller {
    fn resolve(&self) -> Option<String> {
        let caller = Self::from_cmdline().or_else(Self::from_exe);
        if caller.is_none() {
            warn!("Could not determine caller identity");
        }
        caller
    }
}

/// A caller identity fixed at construction.
#[derive(Debug, Clone)]
pub struct FixedCaller(pub String);

impl CallerResolver for FixedCaller {
    fn resolve(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.clone())
        }
    }
}

/// Resolver for `config`: the configured caller if set, else the process.
pub fn resolver_for(config: &BadgeConfig) -> Arc<dyn CallerResolver> {
    match &config.caller {
        Some(caller) => Arc::new(FixedCaller(caller.clone())),
        None => Arc::new(ProcessCaller),
    }
}
