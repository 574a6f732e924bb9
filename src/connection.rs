//! Connection data structures shared by the sources, the snapshot store and the formatters
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::MonitorError;

/// Placeholder used for a missing remote peer and for unresolvable processes.
pub const NOT_AVAILABLE: &str = "N/A";

/// Column headers shared by every export format, in order.
pub const COLUMNS: [&str; 4] = ["Local", "Remote", "Status", "Process"];

/// One row of the OS connection table, before process resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConnection {
    pub local: SocketAddr,
    pub remote: Option<SocketAddr>,
    pub status: String,
    pub pid: Option<u32>,
}

/// Structure to hold a resolved connection, values exactly as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub local_address: String,
    pub remote_address: String,
    pub status: String,
    pub process_name: String,
}

impl ConnectionRecord {
    pub fn from_raw(raw: &RawConnection, process_name: String) -> Self {
        Self {
            local_address: format_address(Some(raw.local)),
            remote_address: format_address(raw.remote),
            status: raw.status.clone(),
            process_name,
        }
    }

    /// Field values in column order.
    pub fn fields(&self) -> [&str; 4] {
        [
            &self.local_address,
            &self.remote_address,
            &self.status,
            &self.process_name,
        ]
    }
}

/// Render an endpoint as `ip:port`, or `N/A` when there is none.
pub fn format_address(addr: Option<SocketAddr>) -> String {
    match addr {
        Some(addr) => format!("{}:{}", addr.ip(), addr.port()),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Classification bucket of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    System,
    User,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::System => write!(f, "system"),
            Bucket::User => write!(f, "user"),
        }
    }
}

/// Content-derived identifier of a record within one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(u32);

impl RecordId {
    /// Hash the identifying fields of a raw connection. `salt` is bumped by
    /// the snapshot builder when two records land on the same id.
    pub fn derive(raw: &RawConnection, salt: u32) -> Self {
        let mut hasher = DefaultHasher::new();
        raw.local.hash(&mut hasher);
        raw.remote.hash(&mut hasher);
        raw.pid.hash(&mut hasher);
        salt.hash(&mut hasher);
        let h = hasher.finish();
        RecordId((h ^ (h >> 32)) as u32)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for RecordId {
    fn from(value: u32) -> Self {
        RecordId(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.len() > 8 {
            return Err(MonitorError::InvalidRecordId(s.to_string()));
        }
        u32::from_str_radix(trimmed, 16)
            .map(RecordId)
            .map_err(|_| MonitorError::InvalidRecordId(s.to_string()))
    }
}

impl Serialize for RecordId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
