//! Text (table) output formatter
use crate::error::MonitorError;
use crate::formats::traits::SnapshotFormatter;
use crate::snapshot::Snapshot;
use prettytable::{Cell, Row, Table};

/// Text formatter that outputs a snapshot in a human-readable table format
pub struct TableFormatter;

impl SnapshotFormatter for TableFormatter {
    fn format_snapshot(&self, snapshot: &Snapshot) -> Result<String, MonitorError> {
        let mut table = Table::new();
        table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        // Header
        table.set_titles(Row::new(vec![
            Cell::new("ID").style_spec("c"),
            Cell::new("LOCAL").style_spec("c"),
            Cell::new("REMOTE").style_spec("c"),
            Cell::new("STATUS").style_spec("c"),
            Cell::new("PROCESS").style_spec("c"),
        ]));

        // Data rows
        for entry in snapshot.entries() {
            let record = &entry.record;
            table.add_row(Row::new(vec![
                Cell::new(&entry.id.to_string()),
                Cell::new(&record.local_address),
                Cell::new(&record.remote_address),
                Cell::new(&record.status),
                Cell::new(&record.process_name),
            ]));
        }

        Ok(format!("{}{} connections\n", table, snapshot.len()))
    }
}
