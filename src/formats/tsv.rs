//! Tab-delimited text formatter
use crate::connection::ConnectionRecord;
use crate::error::MonitorError;
use crate::formats::csv::{builder, write_delimited};
use crate::formats::traits::OutputFormatter;

/// Same layout as CSV with a literal tab between fields
pub struct TsvFormatter;

impl OutputFormatter for TsvFormatter {
    fn format_records(&self, records: &[ConnectionRecord]) -> Result<Vec<u8>, MonitorError> {
        write_delimited(builder().delimiter(b'\t').from_writer(vec![]), records)
    }
}
