//! Spreadsheet workbook formatter
use rust_xlsxwriter::{Format, Workbook};

use crate::connection::{ConnectionRecord, COLUMNS};
use crate::error::MonitorError;
use crate::formats::traits::OutputFormatter;

const SHEET_NAME: &str = "Sheet1";

/// Single-sheet workbook: bold header row followed by one row per record
pub struct XlsxFormatter;

impl OutputFormatter for XlsxFormatter {
    fn format_records(&self, records: &[ConnectionRecord]) -> Result<Vec<u8>, MonitorError> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(SHEET_NAME)?;

            for (col, title) in COLUMNS.iter().enumerate() {
                worksheet.write_string_with_format(0, col as u16, *title, &header)?;
            }
            for (row, record) in records.iter().enumerate() {
                for (col, value) in record.fields().iter().enumerate() {
                    worksheet.write_string(row as u32 + 1, col as u16, *value)?;
                }
            }
        }
        Ok(workbook.save_to_buffer()?)
    }
}
