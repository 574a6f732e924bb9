//! Saved connection tables for offline replay
//!
//! A capture pairs the raw connection rows with the pid to name map observed
//! at the same moment, so it can stand in for both the live connection source
//! and the live process resolver.
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::connection::{RawConnection, NOT_AVAILABLE};
use crate::error::{MonitorError, ResolveFailure};
use crate::sources::traits::{ConnectionSource, ProcessResolver};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureFile {
    #[serde(default)]
    pub timestamp: Option<String>,
    pub connections: Vec<RawConnection>,
    #[serde(default)]
    pub processes: BTreeMap<u32, String>,
}

impl CaptureFile {
    pub fn new(connections: Vec<RawConnection>, processes: BTreeMap<u32, String>) -> Self {
        Self {
            timestamp: None,
            connections,
            processes,
        }
    }

    /// Take a capture of the live table using the given backends.
    pub fn record(
        source: &dyn ConnectionSource,
        resolver: &mut dyn ProcessResolver,
    ) -> Result<Self, MonitorError> {
        let connections = source.enumerate()?;
        resolver.refresh();

        let mut processes = BTreeMap::new();
        for pid in connections.iter().filter_map(|c| c.pid) {
            if processes.contains_key(&pid) {
                continue;
            }
            let name = resolver.resolve(Some(pid));
            if name != NOT_AVAILABLE {
                processes.insert(pid, name);
            }
        }

        Ok(Self {
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
            connections,
            processes,
        })
    }

    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let text = fs::read_to_string(path)
            .map_err(|e| MonitorError::Capture(format!("{}: {}", path.display(), e)))?;
        let capture: CaptureFile = serde_json::from_str(&text)
            .map_err(|e| MonitorError::Capture(format!("{}: {}", path.display(), e)))?;
        info!(
            "Loaded capture {} with {} connections",
            path.display(),
            capture.connections.len()
        );
        Ok(capture)
    }

    pub fn save(&self, path: &Path) -> Result<(), MonitorError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl ConnectionSource for CaptureFile {
    fn name(&self) -> &str {
        "capture"
    }

    fn enumerate(&self) -> Result<Vec<RawConnection>, MonitorError> {
        Ok(self.connections.clone())
    }
}

impl ProcessResolver for CaptureFile {
    fn lookup(&self, pid: Option<u32>) -> Result<String, ResolveFailure> {
        let pid = pid.ok_or(ResolveFailure::NoPid)?;
        self.processes
            .get(&pid)
            .cloned()
            .ok_or(ResolveFailure::Exited)
    }
}
