//! Custom error types for the application
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Permission denied reading the connection table: {0}")]
    PermissionDenied(String),
    #[error("Failed to enumerate connections: {0}")]
    Enumeration(String),
    #[error("Snapshot build was cancelled")]
    Cancelled,
    #[error("No records selected for export")]
    ExportPrecondition,
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to write export to {}: {source}", path.display())]
    ExportIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Render error: {0}")]
    Render(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Capture error: {0}")]
    Capture(String),
    #[error("Invalid record id: {0}")]
    InvalidRecordId(String),
    #[error("Unknown sort field: {0} (expected local, remote, status or process)")]
    UnknownSortField(String),
    #[error("Unknown sort direction: {0} (expected asc or desc)")]
    UnknownSortDirection(String),
    #[error("No record with id {0} in the current snapshot")]
    UnknownRecord(String),
}

impl MonitorError {
    /// Wrap an I/O failure that happened while producing an export file.
    pub fn export_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MonitorError::ExportIo {
            path: path.into(),
            source,
        }
    }
}

/// Why a pid could not be turned into a process name.
///
/// Never surfaced to the host: the resolver degrades these to `"N/A"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveFailure {
    #[error("connection has no owning process")]
    NoPid,
    #[error("process has exited")]
    Exited,
    #[error("access to process denied")]
    AccessDenied,
    #[error("process is a zombie")]
    Zombie,
}
