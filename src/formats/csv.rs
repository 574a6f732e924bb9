//! CSV output formatter
use crate::connection::{ConnectionRecord, COLUMNS};
use crate::error::MonitorError;
use crate::formats::traits::OutputFormatter;
use csv::{Writer, WriterBuilder};

/// CSV formatter that outputs data in comma-separated values format
pub struct CsvFormatter;

impl OutputFormatter for CsvFormatter {
    fn format_records(&self, records: &[ConnectionRecord]) -> Result<Vec<u8>, MonitorError> {
        write_delimited(builder().from_writer(vec![]), records)
    }
}

/// Header plus one row per record through an already configured writer.
pub(crate) fn write_delimited(
    mut wtr: Writer<Vec<u8>>,
    records: &[ConnectionRecord],
) -> Result<Vec<u8>, MonitorError> {
    wtr.write_record(COLUMNS)?;
    for record in records {
        wtr.write_record(record.fields())?;
    }
    wtr.flush()?;
    wtr.into_inner()
        .map_err(|e| MonitorError::Render(e.to_string()))
}

/// Builder shared with the tab-delimited formatter so both terminate lines the same way.
pub(crate) fn builder() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder.terminator(csv::Terminator::Any(b'\n'));
    builder
}
