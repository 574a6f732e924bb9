//! Library crate for the connection snapshot and query engine

pub mod classifier;
pub mod connection;
pub mod error;
pub mod selection;
pub mod snapshot;

// Connection table and process backends
pub mod sources {
    pub mod capture;
    pub mod netstat;
    pub mod process;
    pub mod traits;
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod shell;
}

// Format modules
pub mod formats {
    pub mod csv;
    pub mod html;
    pub mod json;
    pub mod table;
    pub mod traits;
    pub mod tsv;
    pub mod xlsx;
}
