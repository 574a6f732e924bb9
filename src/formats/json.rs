//! JSON output formatter
use crate::connection::{Bucket, RecordId};
use crate::error::MonitorError;
use crate::formats::traits::SnapshotFormatter;
use crate::snapshot::{Filter, Snapshot, SortOrder};
use serde::Serialize;

#[derive(Serialize)]
struct OutputWrapper<'a> {
    view: &'a Filter,
    sort: Option<SortOrder>,
    timestamp: String,
    generation: u64,
    count: usize,
    results: Vec<JsonRecord<'a>>,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    id: RecordId,
    bucket: Bucket,
    pid: Option<u32>,
    local: &'a str,
    remote: &'a str,
    status: &'a str,
    process: &'a str,
}

/// JSON formatter that outputs a snapshot with its metadata
pub struct JsonFormatter;

impl SnapshotFormatter for JsonFormatter {
    fn format_snapshot(&self, snapshot: &Snapshot) -> Result<String, MonitorError> {
        let results = snapshot
            .entries()
            .iter()
            .map(|e| JsonRecord {
                id: e.id,
                bucket: e.bucket,
                pid: e.pid,
                local: &e.record.local_address,
                remote: &e.record.remote_address,
                status: &e.record.status,
                process: &e.record.process_name,
            })
            .collect();

        let wrapper = OutputWrapper {
            view: &snapshot.filter,
            sort: snapshot.sort,
            timestamp: snapshot.taken_at.to_rfc3339(),
            generation: snapshot.generation,
            count: snapshot.len(),
            results,
        };

        let json = serde_json::to_string_pretty(&wrapper)?;
        Ok(json)
    }
}
