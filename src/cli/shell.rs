//! Interactive session over one snapshot store
//!
//! Each input line is one operator action. Selections taken here stay valid
//! across sorts because record ids come from record content, not row position.
use std::io::{BufRead, Write};
use std::path::Path;

use log::warn;

use crate::connection::RecordId;
use crate::error::MonitorError;
use crate::formats::traits::{DisplayFormat, Exporter};
use crate::selection::SelectionSet;
use crate::snapshot::{SnapshotStore, SortField};

const HELP: &str = "\
Commands:
  refresh [TEXT]        re-read connections, keeping processes containing TEXT
  search TEXT           same as refresh TEXT
  sort FIELD [asc|desc] sort each bucket by local, remote, status or process
  drill NAME            show only connections of process NAME
  open ID               drill into the process owning record ID
  select ID...          replace the selection with the given record ids
  selection             show the selected records
  clear                 empty the selection
  export PATH           write the selection; format from extension (txt, csv, xlsx, html)
  show                  print the current snapshot
  help                  this text
  quit                  leave the session
";

/// What the host should do after a command
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Output(String),
    Quit,
}

pub struct Session {
    store: SnapshotStore,
    selection: SelectionSet,
    format: DisplayFormat,
}

impl Session {
    pub fn new(store: SnapshotStore) -> Self {
        Self {
            store,
            selection: SelectionSet::new(),
            format: DisplayFormat::Table,
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Run one command line against the session.
    pub fn execute(&mut self, line: &str) -> Result<Outcome, MonitorError> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command.to_lowercase().as_str() {
            "" => Ok(Outcome::Output(String::new())),
            "refresh" | "search" => {
                let filter = if rest.is_empty() { None } else { Some(rest) };
                self.store.refresh(filter)?;
                self.show()
            }
            "sort" => {
                let mut args = rest.split_whitespace();
                let field: SortField = args
                    .next()
                    .ok_or_else(|| MonitorError::UnknownSortField(String::new()))?
                    .parse()?;
                let ascending = match args.next() {
                    None => true,
                    Some(dir) if dir.eq_ignore_ascii_case("asc") => true,
                    Some(dir) if dir.eq_ignore_ascii_case("desc") => false,
                    Some(dir) => return Err(MonitorError::UnknownSortDirection(dir.to_string())),
                };
                self.store.sort_by(field, ascending);
                self.show()
            }
            "drill" => {
                if rest.is_empty() {
                    return Ok(Outcome::Output("drill needs a process name\n".to_string()));
                }
                self.store.drill_down(rest)?;
                self.show()
            }
            "open" => {
                let id: RecordId = rest.parse()?;
                let snapshot = self.store.current();
                let entry = snapshot
                    .get(id)
                    .ok_or_else(|| MonitorError::UnknownRecord(id.to_string()))?;
                let process = entry.record.process_name.clone();
                self.store.drill_down(&process)?;
                self.show()
            }
            "select" => {
                let ids = rest
                    .split_whitespace()
                    .map(str::parse)
                    .collect::<Result<Vec<RecordId>, _>>()?;
                self.selection.replace(ids);
                Ok(Outcome::Output(format!("{} selected\n", self.selection.len())))
            }
            "selection" => {
                let snapshot = self.store.current();
                let (records, missing) = snapshot.select(&self.selection);
                let mut out = String::new();
                for record in &records {
                    out.push_str(&record.fields().join("  "));
                    out.push('\n');
                }
                if !missing.is_empty() {
                    out.push_str(&format!("{} selected ids are not in the current view\n", missing.len()));
                }
                Ok(Outcome::Output(out))
            }
            "clear" => {
                self.selection.clear();
                Ok(Outcome::Output("selection cleared\n".to_string()))
            }
            "export" => {
                if rest.is_empty() {
                    return Ok(Outcome::Output("export needs a file path\n".to_string()));
                }
                let snapshot = self.store.current();
                let (records, missing) = snapshot.select(&self.selection);
                for id in &missing {
                    warn!("Selected record {} is not in the current snapshot; skipping", id);
                }
                let report = Exporter::export(&records, Path::new(rest))?;
                Ok(Outcome::Output(format!(
                    "Exported {} records to {}\n",
                    report.rows,
                    report.path.display()
                )))
            }
            "show" => self.show(),
            "help" | "?" => Ok(Outcome::Output(HELP.to_string())),
            "quit" | "exit" => Ok(Outcome::Quit),
            other => Ok(Outcome::Output(format!(
                "unknown command {:?}; type help for a list\n",
                other
            ))),
        }
    }

    /// Read commands until end of input or `quit`. Errors are printed and the session continues.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> std::io::Result<()> {
        write!(output, "{}", HELP)?;
        match self.execute("refresh") {
            Ok(Outcome::Output(text)) => write!(output, "{}", text)?,
            Ok(Outcome::Quit) => return Ok(()),
            Err(e) => writeln!(output, "Error: {}", e)?,
        }

        write!(output, "> ")?;
        output.flush()?;
        for line in input.lines() {
            match self.execute(&line?) {
                Ok(Outcome::Output(text)) => write!(output, "{}", text)?,
                Ok(Outcome::Quit) => break,
                Err(e) => writeln!(output, "Error: {}", e)?,
            }
            write!(output, "> ")?;
            output.flush()?;
        }
        Ok(())
    }

    fn show(&self) -> Result<Outcome, MonitorError> {
        let snapshot = self.store.current();
        Ok(Outcome::Output(self.format.render(&snapshot)?))
    }
}
