//! Main entry point for connscope
use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};

use connscope::classifier::Classifier;
use connscope::cli::args::{Cli, Command, SortArgs};
use connscope::cli::shell::Session;
use connscope::connection::RecordId;
use connscope::formats::traits::{DisplayFormat, Exporter};
use connscope::selection::SelectionSet;
use connscope::snapshot::{Snapshot, SnapshotStore};
use connscope::sources::capture::CaptureFile;
use connscope::sources::netstat::NetstatSource;
use connscope::sources::process::SysinfoResolver;
use connscope::sources::traits::{ConnectionSource, ProcessResolver};

fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();
    init_logging(&cli);

    match &cli.command {
        Command::Capture { output } => {
            let capture = CaptureFile::record(&NetstatSource, &mut SysinfoResolver::new())
                .context("Failed to read the connection table")?;
            capture
                .save(output)
                .with_context(|| format!("Failed to write capture {}", output.display()))?;
            println!(
                "Captured {} connections to {}",
                capture.connections.len(),
                output.display()
            );
        }
        Command::List {
            filter,
            sort,
            format,
        } => {
            let mut store = build_store(&cli)?;
            store.refresh(filter.as_deref())?;
            let snapshot = apply_sort(&mut store, sort);
            print_snapshot(&snapshot, (*format).into())?;
        }
        Command::Drill {
            process,
            sort,
            format,
        } => {
            let mut store = build_store(&cli)?;
            store.drill_down(process)?;
            let snapshot = apply_sort(&mut store, sort);
            print_snapshot(&snapshot, (*format).into())?;
        }
        Command::Export {
            output,
            filter,
            process,
            sort,
            select,
            all,
        } => {
            let mut store = build_store(&cli)?;
            match process {
                Some(name) => store.drill_down(name)?,
                None => store.refresh(filter.as_deref())?,
            };
            let snapshot = apply_sort(&mut store, sort);

            let mut selection = SelectionSet::new();
            if *all {
                selection.replace(snapshot.entries().iter().map(|e| e.id));
            } else {
                let ids = select
                    .iter()
                    .map(|s| s.parse::<RecordId>())
                    .collect::<Result<Vec<_>, _>>()?;
                selection.replace(ids);
            }

            let (records, missing) = snapshot.select(&selection);
            for id in &missing {
                warn!("Selected record {} is not in the current snapshot; skipping", id);
            }
            let report = Exporter::export(&records, output)?;
            println!(
                "Exported {} records ({}) to {}",
                report.rows,
                report.format.name(),
                report.path.display()
            );
        }
        Command::Shell => {
            let mut session = Session::new(build_store(&cli)?);
            let stdin = io::stdin();
            session
                .run(stdin.lock(), io::stdout())
                .context("Interactive session failed")?;
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Pick live or replayed backends and wire them into a store.
fn build_store(cli: &Cli) -> Result<SnapshotStore> {
    let classifier = Classifier::extended(&cli.system_processes);

    let (source, resolver): (Box<dyn ConnectionSource>, Box<dyn ProcessResolver>) =
        match &cli.capture {
            Some(path) => {
                let capture = CaptureFile::load(path)?;
                (Box::new(capture.clone()), Box::new(capture))
            }
            None => (Box::new(NetstatSource), Box::new(SysinfoResolver::new())),
        };
    info!("Using {} connection source", source.name());

    Ok(SnapshotStore::new(source, resolver, classifier))
}

fn apply_sort(store: &mut SnapshotStore, sort: &SortArgs) -> std::sync::Arc<Snapshot> {
    match sort.order() {
        Some((field, ascending)) => store.sort_by(field, ascending),
        None => store.current(),
    }
}

fn print_snapshot(snapshot: &Snapshot, format: DisplayFormat) -> Result<()> {
    let content = format.render(snapshot)?;
    println!("{}", content);
    Ok(())
}
