//! Output format traits and the file exporter
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use tempfile::NamedTempFile;

use crate::connection::ConnectionRecord;
use crate::error::MonitorError;
use crate::snapshot::Snapshot;

/// Trait for export formatters. Output is the complete file body.
pub trait OutputFormatter: Send + Sync {
    fn format_records(&self, records: &[ConnectionRecord]) -> Result<Vec<u8>, MonitorError>;
}

/// Trait for formatters that present a whole snapshot to the operator
pub trait SnapshotFormatter: Send + Sync {
    fn format_snapshot(&self, snapshot: &Snapshot) -> Result<String, MonitorError>;
}

/// File formats an export can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Tsv,
    Csv,
    Xlsx,
    Html,
}

impl ExportFormat {
    /// Pick the format from the target file extension.
    pub fn from_path(path: &Path) -> Result<Self, MonitorError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "txt" | "tsv" => Ok(ExportFormat::Tsv),
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            "html" | "htm" => Ok(ExportFormat::Html),
            _ => Err(MonitorError::UnsupportedFormat(if ext.is_empty() {
                format!("{} has no extension", path.display())
            } else {
                format!(".{}", ext)
            })),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Tsv => "tab-delimited text",
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx workbook",
            ExportFormat::Html => "html table",
        }
    }

    fn formatter(self) -> Box<dyn OutputFormatter> {
        match self {
            ExportFormat::Tsv => Box::new(crate::formats::tsv::TsvFormatter),
            ExportFormat::Csv => Box::new(crate::formats::csv::CsvFormatter),
            ExportFormat::Xlsx => Box::new(crate::formats::xlsx::XlsxFormatter),
            ExportFormat::Html => Box::new(crate::formats::html::HtmlFormatter),
        }
    }
}

/// How a snapshot is printed to the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    Table,
    Json,
}

impl DisplayFormat {
    pub fn render(self, snapshot: &Snapshot) -> Result<String, MonitorError> {
        let formatter: Box<dyn SnapshotFormatter> = match self {
            DisplayFormat::Table => Box::new(crate::formats::table::TableFormatter),
            DisplayFormat::Json => Box::new(crate::formats::json::JsonFormatter),
        };
        formatter.format_snapshot(snapshot)
    }
}

/// Outcome of a successful export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub rows: usize,
}

/// Writes record sets to files, choosing the format from the extension
pub struct Exporter;

impl Exporter {
    /// Export `records` to `path`.
    ///
    /// Nothing touches the filesystem unless there is at least one record and
    /// the extension is recognised. The file is written next to the target and
    /// renamed into place, so a failed export never leaves a partial file.
    pub fn export(records: &[ConnectionRecord], path: &Path) -> Result<ExportReport, MonitorError> {
        if records.is_empty() {
            return Err(MonitorError::ExportPrecondition);
        }
        let format = ExportFormat::from_path(path)?;
        let content = format.formatter().format_records(records)?;
        write_atomically(path, &content)?;

        info!(
            "Exported {} records as {} to {}",
            records.len(),
            format.name(),
            path.display()
        );
        Ok(ExportReport {
            path: path.to_path_buf(),
            format,
            rows: records.len(),
        })
    }
}

fn write_atomically(path: &Path, content: &[u8]) -> Result<(), MonitorError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        // NamedTempFile would report a bare NotFound; keep the target in the message.
        return Err(MonitorError::export_io(
            path,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("directory {} does not exist", dir.display()),
            ),
        ));
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix(".connscope-");
    // Created with the usual 0666 request so the umask decides, as for any new file.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut tmp: NamedTempFile = builder
        .tempfile_in(dir)
        .map_err(|e| MonitorError::export_io(path, e))?;

    // Replacing a file keeps its mode.
    if let Ok(existing) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .map_err(|e| MonitorError::export_io(path, e))?;
    }

    tmp.write_all(content)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| MonitorError::export_io(path, e))?;
    tmp.persist(path)
        .map_err(|e| MonitorError::export_io(path, e.error))?;
    Ok(())
}
