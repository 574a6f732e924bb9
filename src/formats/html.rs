//! HTML table formatter
use std::fmt::Write;

use crate::connection::{ConnectionRecord, COLUMNS};
use crate::error::MonitorError;
use crate::formats::traits::OutputFormatter;

/// A single `<table>` with a header row and one body row per record
pub struct HtmlFormatter;

impl OutputFormatter for HtmlFormatter {
    fn format_records(&self, records: &[ConnectionRecord]) -> Result<Vec<u8>, MonitorError> {
        let mut out = String::new();
        out.push_str("<table border=\"1\" class=\"dataframe\">\n");
        out.push_str("  <thead>\n    <tr style=\"text-align: right;\">\n");
        for title in COLUMNS {
            push_cell(&mut out, "th", title)?;
        }
        out.push_str("    </tr>\n  </thead>\n  <tbody>\n");
        for record in records {
            out.push_str("    <tr>\n");
            for value in record.fields() {
                push_cell(&mut out, "td", value)?;
            }
            out.push_str("    </tr>\n");
        }
        out.push_str("  </tbody>\n</table>\n");
        Ok(out.into_bytes())
    }
}

fn push_cell(out: &mut String, tag: &str, value: &str) -> Result<(), MonitorError> {
    writeln!(out, "      <{tag}>{}</{tag}>", escape(value))
        .map_err(|e| MonitorError::Render(e.to_string()))
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
