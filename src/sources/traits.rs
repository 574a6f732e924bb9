//! Traits for the components that feed the snapshot store
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::connection::{RawConnection, NOT_AVAILABLE};
use crate::error::{MonitorError, ResolveFailure};
use log::debug;

/// Trait that every connection table backend must implement
pub trait ConnectionSource: Send {
    /// Short name used in log output
    fn name(&self) -> &str;

    /// Pull the full current inet connection table.
    fn enumerate(&self) -> Result<Vec<RawConnection>, MonitorError>;
}

/// Trait that maps a pid to a process name
pub trait ProcessResolver: Send {
    /// Reload whatever process table backs the lookups. Called once per snapshot build.
    fn refresh(&mut self) {}

    /// Look up the process name for `pid`.
    fn lookup(&self, pid: Option<u32>) -> Result<String, ResolveFailure>;

    /// Like `lookup`, but degrades every failure to `N/A`.
    fn resolve(&self, pid: Option<u32>) -> String {
        match self.lookup(pid) {
            Ok(name) => name,
            Err(reason) => {
                debug!("pid {:?} unresolved: {}", pid, reason);
                NOT_AVAILABLE.to_string()
            }
        }
    }
}

/// Cooperative cancellation flag shared between a host and a snapshot build.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
